// Pipeline execution module
// Sessions route samples to recognizers, the engine drives them and the
// journal records what came out

pub mod engine;
pub mod journal;
pub mod session;

pub use engine::{ActionRouter, Engine, EngineClock, EngineError, PoseEstimator};
pub use journal::{read_journal, ActionJournal, JournalEntry, JournalError};
pub use session::{ButtonConfig, ComboMode, InertialSession, PoseSession};
