use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One capability call requested by the reasoning engine during a poll.
///
/// The argument bag is untyped at this layer; each handler validates it into
/// a typed request struct before any provider call is made.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInvocation {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// The paired outcome for a [`CapabilityInvocation`], keyed by the same
/// call id. `output` carries the shaped success payload, or the user-safe
/// failure message when `ok` is false.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub call_id: String,
    pub ok: bool,
    pub output: String,
}

impl CapabilityResult {
    pub fn success(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), ok: true, output: output.into() }
    }

    pub fn failure(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), ok: false, output: message.into() }
    }
}

/// How a capability's success payload is rendered for the reasoning engine.
///
/// Narrative capabilities (search) return prose the engine reads as source
/// material; structured capabilities (calendar, email) return compact JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    Narrative,
    Structured,
}

/// Identity scope for a capability's side effect: whose account the call
/// touches and which configured agent it runs on behalf of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationContext {
    pub caller_id: crate::turn::CallerId,
    pub agent_id: crate::turn::AgentId,
}

/// Verifies a result batch answers a poll's pending invocations exactly:
/// one result per call id, no extras, no gaps. The remote protocol does not
/// advance a job until the full batch is present, and submitting a partial
/// batch is undefined behavior, so callers assert this before submission.
pub fn batch_answers_invocations(
    invocations: &[CapabilityInvocation],
    results: &[CapabilityResult],
) -> bool {
    if invocations.len() != results.len() {
        return false;
    }
    invocations.iter().all(|invocation| {
        results.iter().filter(|result| result.call_id == invocation.call_id).count() == 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(call_id: &str) -> CapabilityInvocation {
        CapabilityInvocation {
            call_id: call_id.to_string(),
            name: "web_search".to_string(),
            arguments: Map::new(),
        }
    }

    #[test]
    fn complete_batch_answers_invocations() {
        let invocations = vec![invocation("call-1"), invocation("call-2")];
        let results = vec![
            CapabilityResult::success("call-2", "{}"),
            CapabilityResult::failure("call-1", "unknown capability"),
        ];

        assert!(batch_answers_invocations(&invocations, &results));
    }

    #[test]
    fn missing_result_fails_batch_check() {
        let invocations = vec![invocation("call-1"), invocation("call-2")];
        let results = vec![CapabilityResult::success("call-1", "{}")];

        assert!(!batch_answers_invocations(&invocations, &results));
    }

    #[test]
    fn invented_result_fails_batch_check() {
        let invocations = vec![invocation("call-1")];
        let results = vec![CapabilityResult::success("call-99", "{}")];

        assert!(!batch_answers_invocations(&invocations, &results));
    }

    #[test]
    fn duplicate_result_for_one_call_fails_batch_check() {
        let invocations = vec![invocation("call-1"), invocation("call-2")];
        let results = vec![
            CapabilityResult::success("call-1", "{}"),
            CapabilityResult::success("call-1", "{}"),
        ];

        assert!(!batch_answers_invocations(&invocations, &results));
    }
}
