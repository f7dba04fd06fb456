//! Client for the remote reasoning engine.
//!
//! The engine interprets a conversation turn as an asynchronous job: the
//! caller submits the user text, polls the job until it reaches a terminal
//! status, and resolves any capability calls the job requests along the way.
//! This crate defines that protocol as the [`ReasoningEngine`] trait plus an
//! HTTP implementation; the engine's internal reasoning is a black box.

pub mod client;
pub mod job;

pub use client::{EngineError, HttpReasoningEngine, ReasoningEngine};
pub use job::{JobSnapshot, JobStatus, SubmittedJob};
