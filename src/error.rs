// Typed errors with thiserror. Surface meaningful messages to JS.
//
// Only boundary problems (malformed JSON, bad config) are errors. Runtime
// audio/image failures are recovered in the sequencer and never reach this
// type.

use thiserror::Error;

/// Engine error types.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid scene list: {0}")]
    InvalidScenes(String),

    #[error("Invalid host event: {0}")]
    InvalidEvent(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
