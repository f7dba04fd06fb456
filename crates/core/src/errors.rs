use thiserror::Error;

/// Request problems caught before any remote submission. Fully recoverable
/// by the caller retrying with corrected input.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message text is required")]
    MissingText,
    #[error("caller id is required")]
    MissingCallerId,
    #[error("agent id is required")]
    MissingAgentId,
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingText => "Please include a message to send.",
            Self::MissingCallerId => "The request is missing the caller identity.",
            Self::MissingAgentId => "The request is missing the agent identity.",
        }
    }
}

/// History recording failed. Logged only; never aborts or alters a turn's
/// outcome, because the reasoning engine holds the authoritative thread
/// history remotely.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("persistence failure: {0}")]
pub struct PersistenceError(pub String);
