use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use hitline_domain::{Chart, ManualClock, SessionReport, SystemClock, TimeSource};
use hitline_engine::{driver, DriverHandles, EngineConfig, Session};
use hitline_media::PlayerEvent;
use hitline_services::{ChartSource, DirectoryChartSource};
use tracing::{debug, info};

use crate::bot::{Action, ScheduledInput};
use crate::sim_player::SimulatedPlayer;

/// Media behaviour of the simulated player.
#[derive(Clone, Copy, Debug)]
pub struct PlayerSetup {
    pub ready_after_ms: f64,
    pub drift: f64,
}

/// Loads `path` through a directory chart source rooted at its parent.
pub async fn load_chart(path: &Path) -> Result<Chart> {
    let id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("chart path {} has no file name", path.display()))?;
    let root = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    DirectoryChartSource::new(root).load(id).await
}

/// Steps a session frame by frame on a manual clock, as fast as possible.
pub fn simulate(
    chart: Chart,
    config: EngineConfig,
    schedule: &[ScheduledInput],
    setup: PlayerSetup,
) -> SessionReport {
    let clock = ManualClock::new();
    let frame_ms = 1000.0 / config.frame_rate_hz;
    let pre_roll_ms = config.timeline.pre_roll_ms.max(0.0);
    let mut session = Session::new(chart, config, clock.clone());
    let mut pending_ready = session
        .attach_player(Box::new(SimulatedPlayer::new(clock.clone(), setup.drift)))
        .map(|generation| (generation, setup.ready_after_ms));
    session.start();

    let mut inputs = schedule.iter().peekable();
    let mut frames = 0u64;
    while !session.is_finished() {
        clock.advance(frame_ms);
        let now = clock.now_ms();
        if let Some((generation, at)) = pending_ready {
            if now >= at {
                session.handle_player_event(PlayerEvent::ready(generation));
                pending_ready = None;
            }
        }
        while let Some(input) = inputs.next_if(|input| pre_roll_ms + input.at_ms <= now) {
            let arrival = pre_roll_ms + input.at_ms;
            match input.action {
                Action::Press => {
                    session.handle_press_at(input.lane, arrival);
                }
                Action::Release => {
                    session.handle_release_at(input.lane, arrival);
                }
            }
        }
        session.tick();
        frames += 1;
    }
    debug!(frames, "simulation finished");
    session.report()
}

/// Plays a session in wall-clock time through the async driver.
pub async fn realtime(
    chart: Chart,
    config: EngineConfig,
    schedule: Vec<ScheduledInput>,
    setup: PlayerSetup,
) -> Result<SessionReport> {
    let pre_roll_ms = config.timeline.pre_roll_ms.max(0.0);
    let clock = SystemClock::new();
    let mut session = Session::new(chart, config, clock);
    let generation = session.attach_player(Box::new(SimulatedPlayer::new(clock, setup.drift)));

    let (handles, channels) = driver::channels(64);
    let DriverHandles {
        inputs,
        player_events,
        shutdown,
    } = handles;

    if let Some(generation) = generation {
        let delay = Duration::from_secs_f64(setup.ready_after_ms.max(0.0) / 1000.0);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if player_events.send(PlayerEvent::ready(generation)).await.is_err() {
                debug!("session finished before the player became ready");
            }
        });
    }

    let origin = tokio::time::Instant::now();
    tokio::spawn(async move {
        for input in schedule {
            let offset = Duration::from_secs_f64((pre_roll_ms + input.at_ms).max(0.0) / 1000.0);
            tokio::time::sleep_until(origin + offset).await;
            if inputs.send(input.event()).await.is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            let _ = shutdown.send(true);
        }
    });

    let mut last_second = i64::MIN;
    let report = driver::run(&mut session, channels, |snapshot| {
        let second = (snapshot.elapsed_ms / 1000.0).floor() as i64;
        if second != last_second {
            last_second = second;
            info!(
                elapsed_s = second,
                combo = snapshot.score.combo,
                accuracy = snapshot.accuracy,
                media = ?snapshot.media,
                "progress"
            );
        }
    })
    .await;
    Ok(report)
}
