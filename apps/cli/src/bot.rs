use hitline_domain::{Chart, Lane};
use hitline_engine::InputEvent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Taps are released this long after they are pressed.
const TAP_RELEASE_MS: f64 = 60.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Press,
    Release,
}

/// Input the bot will deliver when the session reaches `at_ms` (elapsed time).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledInput {
    pub at_ms: f64,
    pub lane: Lane,
    pub action: Action,
}

impl ScheduledInput {
    pub fn event(&self) -> InputEvent {
        match self.action {
            Action::Press => InputEvent::press(self.lane),
            Action::Release => InputEvent::release(self.lane),
        }
    }
}

/// Plays a chart with seeded timing noise and optional skipped notes.
#[derive(Clone, Debug)]
pub struct AutoPlayer {
    pub jitter_ms: f64,
    pub miss_rate: f64,
    pub seed: u64,
}

impl AutoPlayer {
    pub fn new(jitter_ms: f64, miss_rate: f64, seed: u64) -> Self {
        Self {
            jitter_ms: jitter_ms.abs(),
            miss_rate: miss_rate.clamp(0.0, 1.0),
            seed,
        }
    }

    pub fn schedule(&self, chart: &Chart) -> Vec<ScheduledInput> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut inputs = Vec::with_capacity(chart.notes.len() * 2);
        for note in &chart.notes {
            if self.miss_rate > 0.0 && rng.gen_bool(self.miss_rate) {
                continue;
            }
            let press = (note.time_ms + self.jitter(&mut rng)).max(0.0);
            let release = if note.is_hold() {
                (note.end_time_ms + self.jitter(&mut rng)).max(press)
            } else {
                press + TAP_RELEASE_MS
            };
            inputs.push(ScheduledInput {
                at_ms: press,
                lane: note.lane,
                action: Action::Press,
            });
            inputs.push(ScheduledInput {
                at_ms: release,
                lane: note.lane,
                action: Action::Release,
            });
        }
        inputs.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        inputs
    }

    fn jitter(&self, rng: &mut StdRng) -> f64 {
        if self.jitter_ms == 0.0 {
            0.0
        } else {
            rng.gen_range(-self.jitter_ms..=self.jitter_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitline_domain::{Note, TempoMap};

    fn chart() -> Chart {
        let lane = Lane::new(1).unwrap();
        Chart::new(
            "bot",
            "Bot",
            TempoMap::constant(120.0),
            vec![Note::tap(1, lane, 1000.0), Note::hold(2, lane, 2000.0, 3000.0)],
        )
    }

    #[test]
    fn perfect_bot_hits_on_time() {
        let schedule = AutoPlayer::new(0.0, 0.0, 1).schedule(&chart());
        let times: Vec<f64> = schedule.iter().map(|input| input.at_ms).collect();
        assert_eq!(times, vec![1000.0, 1060.0, 2000.0, 3000.0]);
        assert_eq!(schedule[3].action, Action::Release);
    }

    #[test]
    fn jitter_stays_in_bounds_and_is_seeded() {
        let bot = AutoPlayer::new(30.0, 0.0, 9);
        let a = bot.schedule(&chart());
        assert_eq!(a, bot.schedule(&chart()));
        let first_press = a.iter().find(|input| input.action == Action::Press).unwrap();
        assert!((first_press.at_ms - 1000.0).abs() <= 30.0);
    }

    #[test]
    fn full_miss_rate_skips_everything() {
        assert!(AutoPlayer::new(0.0, 1.0, 3).schedule(&chart()).is_empty());
    }
}
