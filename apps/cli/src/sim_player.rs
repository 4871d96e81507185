use hitline_domain::TimeSource;
use hitline_media::{MediaPlayer, PlayerError, PlayerState};

/// In-process stand-in for an external player. Its position runs off the
/// same time source as the session, optionally drifting by a fixed fraction.
pub struct SimulatedPlayer<T: TimeSource> {
    clock: T,
    state: PlayerState,
    anchor_seconds: f64,
    anchor_ms: f64,
    rate: f64,
    drift: f64,
}

impl<T: TimeSource> SimulatedPlayer<T> {
    pub fn new(clock: T, drift: f64) -> Self {
        let anchor_ms = clock.now_ms();
        Self {
            clock,
            state: PlayerState::Unstarted,
            anchor_seconds: 0.0,
            anchor_ms,
            rate: 1.0,
            drift,
        }
    }

    fn position(&self) -> f64 {
        if self.state != PlayerState::Playing {
            return self.anchor_seconds;
        }
        let played_ms = self.clock.now_ms() - self.anchor_ms;
        self.anchor_seconds + played_ms / 1000.0 * self.rate * (1.0 + self.drift)
    }

    fn reanchor(&mut self) {
        self.anchor_seconds = self.position();
        self.anchor_ms = self.clock.now_ms();
    }
}

impl<T: TimeSource> MediaPlayer for SimulatedPlayer<T> {
    fn play(&mut self) -> Result<(), PlayerError> {
        self.reanchor();
        self.state = PlayerState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        self.reanchor();
        self.state = PlayerState::Paused;
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64, _allow_seek_ahead: bool) -> Result<(), PlayerError> {
        if !seconds.is_finite() {
            return Err(PlayerError::failed("seekTo", format!("bad position {seconds}")));
        }
        self.anchor_seconds = seconds.max(0.0);
        self.anchor_ms = self.clock.now_ms();
        if self.state == PlayerState::Unstarted {
            self.state = PlayerState::Cued;
        }
        Ok(())
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<(), PlayerError> {
        if rate <= 0.0 || !rate.is_finite() {
            return Err(PlayerError::failed("setPlaybackRate", format!("bad rate {rate}")));
        }
        self.reanchor();
        self.rate = rate;
        Ok(())
    }

    fn current_time(&self) -> Result<f64, PlayerError> {
        Ok(self.position())
    }

    fn state(&self) -> Result<PlayerState, PlayerError> {
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitline_domain::ManualClock;

    #[test]
    fn position_advances_only_while_playing() {
        let clock = ManualClock::new();
        let mut player = SimulatedPlayer::new(clock.clone(), 0.0);
        player.seek_to(10.0, true).unwrap();
        clock.advance(1000.0);
        assert_eq!(player.current_time().unwrap(), 10.0);
        player.play().unwrap();
        clock.advance(2000.0);
        assert_eq!(player.current_time().unwrap(), 12.0);
        player.pause().unwrap();
        clock.advance(5000.0);
        assert_eq!(player.current_time().unwrap(), 12.0);
    }

    #[test]
    fn drift_and_rate_scale_progress() {
        let clock = ManualClock::new();
        let mut player = SimulatedPlayer::new(clock.clone(), 0.5);
        player.set_playback_rate(2.0).unwrap();
        player.play().unwrap();
        clock.advance(1000.0);
        assert_eq!(player.current_time().unwrap(), 3.0);
        assert!(player.set_playback_rate(0.0).is_err());
    }
}
