use serde::{Deserialize, Serialize};

use parley_core::CapabilityInvocation;

/// Lifecycle of a remote reasoning job.
///
/// `NeedsCapability` is the only status that hands control back to the
/// caller mid-run: the job is parked until every pending capability call in
/// the poll response has a submitted result. `Completed` is the sole
/// success-terminal status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    #[serde(rename = "requires_action")]
    NeedsCapability,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::Expired)
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::NeedsCapability => "requires_action",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Handle returned by submitting a turn.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubmittedJob {
    pub job_id: String,
    pub thread_id: String,
}

/// One poll observation. `pending_calls` is populated only when the status
/// is [`JobStatus::NeedsCapability`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    #[serde(default)]
    pub pending_calls: Vec<CapabilityInvocation>,
}

impl JobSnapshot {
    pub fn terminal(status: JobStatus) -> Self {
        Self { status, pending_calls: Vec::new() }
    }

    pub fn needs_capability(pending_calls: Vec<CapabilityInvocation>) -> Self {
        Self { status: JobStatus::NeedsCapability, pending_calls }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_classified() {
        for status in
            [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled, JobStatus::Expired]
        {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
        for status in [JobStatus::Queued, JobStatus::InProgress, JobStatus::NeedsCapability] {
            assert!(!status.is_terminal(), "{status} should not be terminal");
        }
    }

    #[test]
    fn status_round_trips_through_wire_form() {
        for status in [
            JobStatus::Queued,
            JobStatus::InProgress,
            JobStatus::NeedsCapability,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
            JobStatus::Expired,
        ] {
            let wire = format!("\"{}\"", status.as_wire());
            let parsed: JobStatus = serde_json::from_str(&wire).expect("status should parse");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn snapshot_without_pending_calls_parses() {
        let snapshot: JobSnapshot =
            serde_json::from_str(r#"{"status":"in_progress"}"#).expect("snapshot should parse");
        assert_eq!(snapshot.status, JobStatus::InProgress);
        assert!(snapshot.pending_calls.is_empty());
    }

    #[test]
    fn requires_action_snapshot_carries_calls() {
        let snapshot: JobSnapshot = serde_json::from_str(
            r#"{
                "status": "requires_action",
                "pending_calls": [
                    {"call_id": "call-1", "name": "web_search", "arguments": {"query": "rust"}}
                ]
            }"#,
        )
        .expect("snapshot should parse");

        assert_eq!(snapshot.status, JobStatus::NeedsCapability);
        assert_eq!(snapshot.pending_calls.len(), 1);
        assert_eq!(snapshot.pending_calls[0].name, "web_search");
    }

    #[test]
    fn unknown_wire_status_fails_to_parse() {
        let result = serde_json::from_str::<JobStatus>("\"paused\"");
        assert!(result.is_err());
    }
}
