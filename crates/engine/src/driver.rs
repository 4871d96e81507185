use hitline_domain::{Lane, SessionReport, TimeSource};
use hitline_media::PlayerEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::clock::ClockPhase;
use crate::session::{Session, SessionSnapshot};

/// Input delivered to a running session. `at_ms` is the arrival time on the
/// session's time source; `None` means "now".
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum InputEvent {
    Press { lane: Lane, at_ms: Option<f64> },
    Release { lane: Lane, at_ms: Option<f64> },
    Pause,
    Resume,
}

impl InputEvent {
    pub fn press(lane: Lane) -> Self {
        Self::Press { lane, at_ms: None }
    }

    pub fn release(lane: Lane) -> Self {
        Self::Release { lane, at_ms: None }
    }
}

/// Message boundary between the session and the outside world.
pub struct DriverChannels {
    pub inputs: mpsc::Receiver<InputEvent>,
    pub player_events: mpsc::Receiver<PlayerEvent>,
    /// Flipping to `true` aborts the session.
    pub shutdown: watch::Receiver<bool>,
}

/// Sending halves matching a [`DriverChannels`].
pub struct DriverHandles {
    pub inputs: mpsc::Sender<InputEvent>,
    pub player_events: mpsc::Sender<PlayerEvent>,
    pub shutdown: watch::Sender<bool>,
}

pub fn channels(capacity: usize) -> (DriverHandles, DriverChannels) {
    let (input_tx, input_rx) = mpsc::channel(capacity);
    let (player_tx, player_rx) = mpsc::channel(capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    (
        DriverHandles {
            inputs: input_tx,
            player_events: player_tx,
            shutdown: shutdown_tx,
        },
        DriverChannels {
            inputs: input_rx,
            player_events: player_rx,
            shutdown: shutdown_rx,
        },
    )
}

/// Runs `session` to completion on the current task.
///
/// Ticks at the configured frame rate. Inputs and player events are applied
/// between ticks, never during one. `observer` sees a snapshot after each tick.
pub async fn run<T, F>(
    session: &mut Session<T>,
    channels: DriverChannels,
    mut observer: F,
) -> SessionReport
where
    T: TimeSource,
    F: FnMut(&SessionSnapshot),
{
    let DriverChannels {
        mut inputs,
        mut player_events,
        mut shutdown,
    } = channels;

    if session.phase() == ClockPhase::Idle {
        session.start();
    }
    let mut interval = tokio::time::interval(session.config().frame_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut shutdown_open = true;

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed(), if shutdown_open => {
                if changed.is_err() {
                    shutdown_open = false;
                    continue;
                }
                if *shutdown.borrow() {
                    info!("shutdown requested");
                    session.abort();
                    break;
                }
            }
            Some(input) = inputs.recv() => apply_input(session, input),
            Some(event) = player_events.recv() => {
                session.handle_player_event(event);
            }
            _ = interval.tick() => {
                let report = session.tick();
                observer(&session.snapshot());
                if report.ended {
                    break;
                }
            }
        }
    }

    let report = session.report();
    debug!(accuracy = report.accuracy, aborted = report.aborted, "driver finished");
    report
}

fn apply_input<T: TimeSource>(session: &mut Session<T>, input: InputEvent) {
    match input {
        InputEvent::Press { lane, at_ms } => {
            match at_ms {
                Some(at) => session.handle_press_at(lane, at),
                None => session.handle_press(lane),
            };
        }
        InputEvent::Release { lane, at_ms } => {
            match at_ms {
                Some(at) => session.handle_release_at(lane, at),
                None => session.handle_release(lane),
            };
        }
        InputEvent::Pause => session.pause(),
        InputEvent::Resume => session.resume(),
    }
}
