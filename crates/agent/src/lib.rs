//! Tool-augmented run orchestration.
//!
//! This crate is the core of parley: it drives a single user turn through an
//! asynchronous reasoning job, dispatches the capability calls the job
//! requests, and brings the job to a terminal state while recording the
//! exchange exactly once.
//!
//! # Architecture
//!
//! 1. **Capability handlers** (`capabilities::{calendar, search, email}`) -
//!    validate an untyped argument bag into a typed request, perform the
//!    side effect through a provider seam, and shape the result.
//! 2. **Capability registry** (`capabilities`) - name → handler lookup; an
//!    unknown name becomes a failed result, never an error that escapes.
//! 3. **Run orchestrator** (`orchestrator`) - the submit/poll/dispatch state
//!    machine with its bounded poll policy.
//!
//! # Safety principle
//!
//! The reasoning engine decides *which* capabilities to call; this crate
//! decides *whether and how* each call runs. Every provider call is scoped
//! by the caller and agent identity in the [`InvocationContext`], and no
//! unvalidated argument bag ever reaches a provider.

pub mod capabilities;
pub mod orchestrator;

pub use capabilities::{
    Capability, CapabilityFailure, CapabilityRegistry, ProviderError,
};
pub use orchestrator::{
    OrchestrationError, PollPolicy, RunOrchestrator, TurnDriver, TurnOutcome,
};

pub use parley_core::InvocationContext;
