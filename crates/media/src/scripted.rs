use std::cell::RefCell;
use std::rc::Rc;

use crate::player::{MediaPlayer, PlayerError, PlayerState};

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    SeekTo { seconds: f64, allow_seek_ahead: bool },
    SetPlaybackRate(f64),
}

#[derive(Debug)]
struct Script {
    commands: Vec<PlayerCommand>,
    position: f64,
    state: PlayerState,
    failing: bool,
}

/// Player double that records commands and reports a position set by the caller.
///
/// Clones share state, so a test can keep one handle while the controller owns another.
#[derive(Clone, Debug)]
pub struct ScriptedPlayer {
    script: Rc<RefCell<Script>>,
}

impl ScriptedPlayer {
    pub fn new() -> Self {
        Self {
            script: Rc::new(RefCell::new(Script {
                commands: Vec::new(),
                position: 0.0,
                state: PlayerState::Unstarted,
                failing: false,
            })),
        }
    }

    pub fn set_position(&self, seconds: f64) {
        self.script.borrow_mut().position = seconds;
    }

    /// Makes every subsequent command fail. Position queries keep working.
    pub fn set_failing(&self, failing: bool) {
        self.script.borrow_mut().failing = failing;
    }

    pub fn commands(&self) -> Vec<PlayerCommand> {
        self.script.borrow().commands.clone()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.script
            .borrow()
            .commands
            .iter()
            .filter_map(|command| match command {
                PlayerCommand::SeekTo { seconds, .. } => Some(*seconds),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.script.borrow_mut().commands.clear();
    }

    fn issue(&self, command: PlayerCommand, name: &'static str) -> Result<(), PlayerError> {
        let mut script = self.script.borrow_mut();
        if script.failing {
            return Err(PlayerError::failed(name, "scripted failure"));
        }
        match &command {
            PlayerCommand::Play => script.state = PlayerState::Playing,
            PlayerCommand::Pause => script.state = PlayerState::Paused,
            PlayerCommand::SeekTo { seconds, .. } => script.position = *seconds,
            PlayerCommand::SetPlaybackRate(_) => {}
        }
        script.commands.push(command);
        Ok(())
    }
}

impl Default for ScriptedPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaPlayer for ScriptedPlayer {
    fn play(&mut self) -> Result<(), PlayerError> {
        self.issue(PlayerCommand::Play, "play")
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        self.issue(PlayerCommand::Pause, "pause")
    }

    fn seek_to(&mut self, seconds: f64, allow_seek_ahead: bool) -> Result<(), PlayerError> {
        self.issue(
            PlayerCommand::SeekTo {
                seconds,
                allow_seek_ahead,
            },
            "seekTo",
        )
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<(), PlayerError> {
        self.issue(PlayerCommand::SetPlaybackRate(rate), "setPlaybackRate")
    }

    fn current_time(&self) -> Result<f64, PlayerError> {
        Ok(self.script.borrow().position)
    }

    fn state(&self) -> Result<PlayerState, PlayerError> {
        Ok(self.script.borrow().state)
    }
}
