// Swordsense - Motion to Action Recognition Core
// Module declarations

pub mod arbiter;
pub mod bus;
pub mod config;
pub mod events;
pub mod features;
pub mod pipeline;
pub mod recognizers;
pub mod sample;

pub use arbiter::{Arbitrator, ArbiterConfig};
pub use bus::{EventBus, Subscriber, SubscriberError};
pub use config::{ConfigError, EngineConfig};
pub use events::{Action, ActionEvent, Proposal, SourceId, SourceKind};
pub use pipeline::{ActionJournal, Engine, EngineError, InertialSession, PoseEstimator, PoseSession};
pub use sample::{InertialSample, PoseFrame, RawInertialRecord, SampleError};
