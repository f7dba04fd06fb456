//! The run orchestrator: drives one conversational turn through a remote
//! reasoning job until it reaches a terminal state.
//!
//! The state machine is `Submitted → Polling → {NeedsCapability, Completed,
//! Failed, Cancelled, Expired}`, where `NeedsCapability` returns to
//! `Polling` once a complete result batch has been submitted. The attempt
//! cap and fixed sleep intervals bound worst-case latency; there is no
//! external cancellation signal, so a turn runs to completion or timeout
//! even if the caller goes away.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use parley_core::capability::batch_answers_invocations;
use parley_core::config::EngineConfig;
use parley_core::language::{self, Language};
use parley_core::{
    CapabilityResult, InvocationContext, TurnRequest, TurnStore, ValidationError,
};
use parley_engine::{EngineError, JobStatus, ReasoningEngine};

use crate::capabilities::CapabilityRegistry;

/// Bounds on the polling loop. The defaults match moderate-latency engine
/// deployments; tests use [`PollPolicy::immediate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    pub tool_round_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 40,
            poll_interval: Duration::from_millis(900),
            tool_round_backoff: Duration::from_millis(600),
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.poll_max_attempts,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            tool_round_backoff: Duration::from_millis(config.tool_backoff_ms),
        }
    }

    /// Zero sleeps; polling is still capped. For tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, poll_interval: Duration::ZERO, tool_round_backoff: Duration::ZERO }
    }
}

/// A turn that could not be brought to a successful terminal state.
///
/// Capability failures never appear here: they are reported back into the
/// remote job as failed tool results. Persistence failures never appear
/// here either: history is best-effort.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("turn submission failed: {0}")]
    Submit(#[source] EngineError),
    #[error("job polling failed: {0}")]
    Poll(#[source] EngineError),
    #[error("capability result submission failed: {0}")]
    SubmitResults(#[source] EngineError),
    #[error("reply retrieval failed: {0}")]
    Reply(#[source] EngineError),
    #[error("reasoning job ended in terminal status `{status}`")]
    Terminal { status: JobStatus },
    #[error("reasoning job did not complete within {attempts} poll attempts")]
    Timeout { attempts: u32 },
}

impl OrchestrationError {
    /// Non-technical message suitable for end users; the full error stays
    /// in logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Invalid(error) => error.user_message(),
            Self::Timeout { .. } => {
                "The assistant is taking longer than expected. Please try again."
            }
            Self::Submit(_) | Self::Poll(_) | Self::SubmitResults(_) | Self::Reply(_)
            | Self::Terminal { .. } => {
                "The assistant could not complete that request. Please try again shortly."
            }
        }
    }
}

/// The result of a completed turn, handed back to the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply_text: String,
    pub thread_id: String,
    pub tools_invoked: Vec<String>,
    pub language: Language,
}

/// Seam between the gateway and the orchestrator, so HTTP handlers can be
/// tested against a scripted driver.
#[async_trait]
pub trait TurnDriver: Send + Sync {
    async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome, OrchestrationError>;
}

pub struct RunOrchestrator<E> {
    engine: E,
    registry: CapabilityRegistry,
    store: Arc<dyn TurnStore>,
    policy: PollPolicy,
}

impl<E> RunOrchestrator<E>
where
    E: ReasoningEngine,
{
    pub fn new(
        engine: E,
        registry: CapabilityRegistry,
        store: Arc<dyn TurnStore>,
        policy: PollPolicy,
    ) -> Self {
        Self { engine, registry, store, policy }
    }

    async fn drive(&self, request: TurnRequest) -> Result<TurnOutcome, OrchestrationError> {
        request.validate()?;

        // The user message is recorded exactly once, before submission. A
        // turn may legitimately end up with a user message and no reply.
        if let Err(error) =
            self.store.record_user_message(&request.conversation_id, &request.text).await
        {
            warn!(
                event_name = "turn.persistence.user_message_failed",
                conversation_id = %request.conversation_id,
                error = %error,
                "failed to record user message; continuing"
            );
        }

        let language = language::detect(&request.text);
        let submission = format!("{}\n\n{}", request.text, language.reply_directive());

        let submitted = self
            .engine
            .submit_turn(request.thread_id.as_deref(), &submission)
            .await
            .map_err(OrchestrationError::Submit)?;
        info!(
            event_name = "turn.submitted",
            conversation_id = %request.conversation_id,
            job_id = %submitted.job_id,
            thread_id = %submitted.thread_id,
            language = language.code(),
            "turn submitted to reasoning engine"
        );

        let context = InvocationContext {
            caller_id: request.caller_id.clone(),
            agent_id: request.agent_id.clone(),
        };
        let mut tools_invoked: Vec<String> = Vec::new();
        let mut attempts: u32 = 0;

        loop {
            if attempts >= self.policy.max_attempts {
                warn!(
                    event_name = "turn.timeout",
                    conversation_id = %request.conversation_id,
                    job_id = %submitted.job_id,
                    attempts,
                    "reasoning job did not complete within the attempt cap"
                );
                return Err(OrchestrationError::Timeout { attempts });
            }
            attempts += 1;

            let snapshot = self
                .engine
                .poll_job(&submitted.job_id)
                .await
                .map_err(OrchestrationError::Poll)?;

            match snapshot.status {
                JobStatus::Completed => break,
                JobStatus::Failed | JobStatus::Cancelled | JobStatus::Expired => {
                    return Err(OrchestrationError::Terminal { status: snapshot.status });
                }
                JobStatus::NeedsCapability => {
                    let mut results: Vec<CapabilityResult> =
                        Vec::with_capacity(snapshot.pending_calls.len());
                    for invocation in &snapshot.pending_calls {
                        tools_invoked.push(invocation.name.clone());
                        results.push(self.registry.dispatch(invocation, &context).await);
                    }
                    // The remote protocol requires all outstanding calls to
                    // be resolved together before the job advances.
                    debug_assert!(batch_answers_invocations(&snapshot.pending_calls, &results));
                    debug!(
                        event_name = "turn.capability_batch",
                        conversation_id = %request.conversation_id,
                        job_id = %submitted.job_id,
                        batch_size = results.len(),
                        "submitting capability result batch"
                    );
                    self.engine
                        .submit_results(&submitted.job_id, &results)
                        .await
                        .map_err(OrchestrationError::SubmitResults)?;
                    tokio::time::sleep(self.policy.tool_round_backoff).await;
                }
                JobStatus::Queued | JobStatus::InProgress => {
                    tokio::time::sleep(self.policy.poll_interval).await;
                }
            }
        }

        let reply = self
            .engine
            .latest_reply(&submitted.thread_id)
            .await
            .map_err(OrchestrationError::Reply)?;

        if let Err(error) =
            self.store.record_assistant_message(&request.conversation_id, &reply).await
        {
            warn!(
                event_name = "turn.persistence.assistant_message_failed",
                conversation_id = %request.conversation_id,
                error = %error,
                "failed to record assistant message; continuing"
            );
        }

        info!(
            event_name = "turn.completed",
            conversation_id = %request.conversation_id,
            job_id = %submitted.job_id,
            attempts,
            tools = tools_invoked.len(),
            "turn completed"
        );

        Ok(TurnOutcome {
            reply_text: reply,
            thread_id: submitted.thread_id,
            tools_invoked,
            language,
        })
    }
}

#[async_trait]
impl<E> TurnDriver for RunOrchestrator<E>
where
    E: ReasoningEngine,
{
    async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome, OrchestrationError> {
        self.drive(request).await
    }
}
