pub mod clock;
pub mod config;
pub mod driver;
pub mod feedback;
pub mod judging;
pub mod session;

pub use clock::{ClockPhase, GameClock, Timeline};
pub use config::{ConfigError, EngineConfig, TimelineSettings};
pub use driver::{channels, run, DriverChannels, DriverHandles, InputEvent};
pub use feedback::{FeedbackEvent, FeedbackQueue};
pub use judging::{HitPhase, Judge, NoteState, Resolution};
pub use session::{NoteView, Session, SessionSnapshot, TickReport};
