// Action event module
// Action alphabet, source identity, proposals and accepted events

pub mod types;

pub use types::{Action, ActionEvent, Proposal, SourceId, SourceKind};
