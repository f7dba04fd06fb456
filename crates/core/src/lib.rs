//! Shared domain types for the parley conversational agent platform.
//!
//! This crate holds everything the other layers agree on:
//! - The turn model (`Turn`, `TurnRequest`, identifier newtypes) and the
//!   `TurnStore` persistence seam the orchestrator records history through.
//! - The capability invocation protocol (`CapabilityInvocation`,
//!   `CapabilityResult`, `ResultShape`, `InvocationContext`).
//! - The request-validation and persistence error taxonomy.
//! - The heuristic reply-language detector.
//! - The layered configuration loader.

pub mod capability;
pub mod config;
pub mod errors;
pub mod language;
pub mod turn;

pub use capability::{
    CapabilityInvocation, CapabilityResult, InvocationContext, ResultShape,
};
pub use errors::{PersistenceError, ValidationError};
pub use language::Language;
pub use turn::{AgentId, CallerId, ConversationId, MessageRole, Turn, TurnRequest, TurnStore};
