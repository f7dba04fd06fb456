//! Capability registry and handler contract.
//!
//! Every handler implements [`Capability`]: validate the argument bag,
//! perform the side effect through its provider seam, and return a payload
//! the registry shapes per [`ResultShape`]. Dispatch never propagates an
//! error past the registry boundary; unknown names, bad arguments, and
//! provider outages all become failed [`CapabilityResult`]s the reasoning
//! engine can react to.

mod args;
pub mod calendar;
pub mod email;
pub mod search;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use parley_core::{CapabilityInvocation, CapabilityResult, InvocationContext, ResultShape};

pub use calendar::{
    CalendarEvent, CalendarProvider, CreateEventCapability, EventWindow, HttpCalendarProvider,
    ListEventsCapability, NewEvent,
};
pub use email::{HttpMailProvider, MailProvider, OutboundEmail, SendEmailCapability};
pub use search::{HttpSearchProvider, SearchHit, SearchProvider, WebSearchCapability};

/// A provider (calendar/search/mail backend) was unreachable or rejected
/// the call. The detail is for logs only; callers show a generic message.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// Why a capability invocation failed. `user_message` is safe to hand back
/// to the reasoning engine (and ultimately the user); `detail` carries the
/// raw cause for logging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityFailure {
    pub user_message: String,
    pub detail: String,
}

impl CapabilityFailure {
    pub fn invalid_args(capability: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            user_message: format!("{capability}: {message}"),
            detail: format!("{capability}: invalid arguments: {message}"),
        }
    }

    pub fn provider(user_message: impl Into<String>, error: &ProviderError) -> Self {
        Self { user_message: user_message.into(), detail: error.0.clone() }
    }
}

/// One side-effecting operation the reasoning engine may invoke by name.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;

    /// How the registry renders this capability's success payload.
    fn shape(&self) -> ResultShape;

    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        context: &InvocationContext,
    ) -> Result<Value, CapabilityFailure>;
}

/// Name → handler lookup used by the orchestrator to route invocations.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<&'static str, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handler set over the given provider seams.
    pub fn builtin(
        calendar: Arc<dyn CalendarProvider>,
        search: Arc<dyn SearchProvider>,
        mail: Arc<dyn MailProvider>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(ListEventsCapability::new(calendar.clone()));
        registry.register(CreateEventCapability::new(calendar));
        registry.register(WebSearchCapability::new(search));
        registry.register(SendEmailCapability::new(mail));
        registry
    }

    pub fn register<C>(&mut self, capability: C)
    where
        C: Capability + 'static,
    {
        self.capabilities.insert(capability.name(), Arc::new(capability));
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.capabilities.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Routes one invocation to its handler and packages the outcome.
    ///
    /// This is infallible by design: whatever goes wrong inside a handler is
    /// reported back to the reasoning engine as a failed result so it can
    /// recover or inform the user.
    pub async fn dispatch(
        &self,
        invocation: &CapabilityInvocation,
        context: &InvocationContext,
    ) -> CapabilityResult {
        let Some(capability) = self.capabilities.get(invocation.name.as_str()) else {
            warn!(
                event_name = "capability.unknown",
                capability = %invocation.name,
                call_id = %invocation.call_id,
                "reasoning engine requested a capability that is not registered"
            );
            return CapabilityResult::failure(
                invocation.call_id.clone(),
                format!("unknown capability `{}`", invocation.name),
            );
        };

        match capability.invoke(&invocation.arguments, context).await {
            Ok(payload) => {
                let output = shape_output(capability.shape(), payload);
                CapabilityResult::success(invocation.call_id.clone(), output)
            }
            Err(failure) => {
                warn!(
                    event_name = "capability.failed",
                    capability = %invocation.name,
                    call_id = %invocation.call_id,
                    detail = %failure.detail,
                    "capability invocation failed"
                );
                CapabilityResult::failure(invocation.call_id.clone(), failure.user_message)
            }
        }
    }
}

fn shape_output(shape: ResultShape, payload: Value) -> String {
    match (shape, payload) {
        // Narrative payloads are already prose for the engine to read.
        (ResultShape::Narrative, Value::String(text)) => text,
        (ResultShape::Narrative, other) => other.to_string(),
        (ResultShape::Structured, other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use parley_core::{AgentId, CallerId};

    use super::*;

    struct StaticCapability {
        name: &'static str,
        shape: ResultShape,
        outcome: Result<Value, CapabilityFailure>,
    }

    #[async_trait]
    impl Capability for StaticCapability {
        fn name(&self) -> &'static str {
            self.name
        }

        fn shape(&self) -> ResultShape {
            self.shape
        }

        async fn invoke(
            &self,
            _arguments: &Map<String, Value>,
            _context: &InvocationContext,
        ) -> Result<Value, CapabilityFailure> {
            self.outcome.clone()
        }
    }

    fn context() -> InvocationContext {
        InvocationContext {
            caller_id: CallerId("caller-1".to_string()),
            agent_id: AgentId("agent-1".to_string()),
        }
    }

    fn invocation(name: &str) -> CapabilityInvocation {
        CapabilityInvocation {
            call_id: "call-1".to_string(),
            name: name.to_string(),
            arguments: Map::new(),
        }
    }

    #[tokio::test]
    async fn unknown_capability_yields_failed_result_not_error() {
        let registry = CapabilityRegistry::new();

        let result = registry.dispatch(&invocation("unsupported_tool"), &context()).await;

        assert!(!result.ok);
        assert_eq!(result.call_id, "call-1");
        assert_eq!(result.output, "unknown capability `unsupported_tool`");
    }

    #[tokio::test]
    async fn structured_success_is_rendered_as_compact_json() {
        let mut registry = CapabilityRegistry::new();
        registry.register(StaticCapability {
            name: "create_event",
            shape: ResultShape::Structured,
            outcome: Ok(serde_json::json!({"event_id": "evt-9"})),
        });

        let result = registry.dispatch(&invocation("create_event"), &context()).await;

        assert!(result.ok);
        assert_eq!(result.output, r#"{"event_id":"evt-9"}"#);
    }

    #[tokio::test]
    async fn narrative_success_stays_plain_text() {
        let mut registry = CapabilityRegistry::new();
        registry.register(StaticCapability {
            name: "web_search",
            shape: ResultShape::Narrative,
            outcome: Ok(Value::String("1. Rust — rust-lang.org".to_string())),
        });

        let result = registry.dispatch(&invocation("web_search"), &context()).await;

        assert!(result.ok);
        assert_eq!(result.output, "1. Rust — rust-lang.org");
    }

    #[tokio::test]
    async fn handler_failure_surfaces_user_message_only() {
        let mut registry = CapabilityRegistry::new();
        registry.register(StaticCapability {
            name: "send_email",
            shape: ResultShape::Structured,
            outcome: Err(CapabilityFailure::provider(
                "The email service is unavailable right now.",
                &ProviderError("connect ECONNREFUSED 10.0.0.4:587".to_string()),
            )),
        });

        let result = registry.dispatch(&invocation("send_email"), &context()).await;

        assert!(!result.ok);
        assert_eq!(result.output, "The email service is unavailable right now.");
        assert!(!result.output.contains("ECONNREFUSED"));
    }

    #[test]
    fn names_are_sorted_for_stable_reporting() {
        let mut registry = CapabilityRegistry::new();
        registry.register(StaticCapability {
            name: "web_search",
            shape: ResultShape::Narrative,
            outcome: Ok(Value::Null),
        });
        registry.register(StaticCapability {
            name: "create_event",
            shape: ResultShape::Structured,
            outcome: Ok(Value::Null),
        });

        assert_eq!(registry.names(), vec!["create_event", "web_search"]);
    }
}
