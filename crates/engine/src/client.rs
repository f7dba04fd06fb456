use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use parley_core::config::EngineConfig;
use parley_core::{CapabilityInvocation, CapabilityResult};
use thiserror::Error;

use crate::job::{JobSnapshot, SubmittedJob};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine transport failure: {0}")]
    Http(#[from] reqwest::Error),
    #[error("engine rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("engine returned no assistant reply for thread `{thread_id}`")]
    EmptyReply { thread_id: String },
}

/// Narrow request/poll/submit protocol the orchestrator drives a turn
/// through. Implementations must be safe to share across concurrent turns.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Submits the user turn, creating a new thread when `thread_id` is
    /// `None`, and returns the job handle to poll.
    async fn submit_turn(
        &self,
        thread_id: Option<&str>,
        text: &str,
    ) -> Result<SubmittedJob, EngineError>;

    async fn poll_job(&self, job_id: &str) -> Result<JobSnapshot, EngineError>;

    /// Submits one result per pending capability call. The remote job does
    /// not advance until the batch is complete, so callers must never submit
    /// a partial batch.
    async fn submit_results(
        &self,
        job_id: &str,
        results: &[CapabilityResult],
    ) -> Result<(), EngineError>;

    /// Most recent assistant-authored message on the thread.
    async fn latest_reply(&self, thread_id: &str) -> Result<String, EngineError>;
}

pub struct HttpReasoningEngine {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

#[derive(Serialize)]
struct SubmitTurnBody<'a> {
    model: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct ResultsBody<'a> {
    results: &'a [CapabilityResult],
}

#[derive(Deserialize)]
struct ThreadCreated {
    thread_id: String,
}

#[derive(Deserialize)]
struct ReplyBody {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl HttpReasoningEngine {
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        Err(EngineError::Api { status: status.as_u16(), message })
    }

    async fn create_thread(&self) -> Result<String, EngineError> {
        let response = self
            .authorize(self.http.post(format!("{}/v1/threads", self.base_url)))
            .send()
            .await?;
        let created: ThreadCreated = Self::check(response).await?.json().await?;
        Ok(created.thread_id)
    }
}

#[async_trait]
impl ReasoningEngine for HttpReasoningEngine {
    async fn submit_turn(
        &self,
        thread_id: Option<&str>,
        text: &str,
    ) -> Result<SubmittedJob, EngineError> {
        let thread_id = match thread_id {
            Some(id) => id.to_string(),
            None => self.create_thread().await?,
        };

        let response = self
            .authorize(self.http.post(format!("{}/v1/threads/{thread_id}/turns", self.base_url)))
            .json(&SubmitTurnBody { model: &self.model, text })
            .send()
            .await?;
        let job: SubmittedJob = Self::check(response).await?.json().await?;
        Ok(job)
    }

    async fn poll_job(&self, job_id: &str) -> Result<JobSnapshot, EngineError> {
        let response = self
            .authorize(self.http.get(format!("{}/v1/jobs/{job_id}", self.base_url)))
            .send()
            .await?;
        let snapshot: JobSnapshot = Self::check(response).await?.json().await?;
        Ok(snapshot)
    }

    async fn submit_results(
        &self,
        job_id: &str,
        results: &[CapabilityResult],
    ) -> Result<(), EngineError> {
        let response = self
            .authorize(self.http.post(format!("{}/v1/jobs/{job_id}/results", self.base_url)))
            .json(&ResultsBody { results })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<String, EngineError> {
        let response = self
            .authorize(self.http.get(format!("{}/v1/threads/{thread_id}/reply", self.base_url)))
            .send()
            .await?;
        let reply: ReplyBody = Self::check(response).await?.json().await?;
        match reply.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(EngineError::EmptyReply { thread_id: thread_id.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use parley_core::config::EngineConfig;

    use super::*;

    fn config() -> EngineConfig {
        EngineConfig {
            base_url: "http://localhost:9090/".to_string(),
            api_key: None,
            model: "reason-1".to_string(),
            timeout_secs: 5,
            poll_max_attempts: 40,
            poll_interval_ms: 900,
            tool_backoff_ms: 600,
        }
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let engine = HttpReasoningEngine::from_config(&config()).expect("client should build");
        assert_eq!(engine.base_url, "http://localhost:9090");
    }

    #[test]
    fn api_error_displays_status_and_message() {
        let error = EngineError::Api { status: 503, message: "overloaded".to_string() };
        assert_eq!(error.to_string(), "engine rejected the request (503): overloaded");
    }

    #[test]
    fn results_body_serializes_call_ids() {
        let results = vec![
            CapabilityResult::success("call-1", "{\"event_id\":\"evt-9\"}"),
            CapabilityResult::failure("call-2", "unknown capability"),
        ];
        let body = serde_json::to_value(ResultsBody { results: &results })
            .expect("body should serialize");

        assert_eq!(body["results"][0]["call_id"], "call-1");
        assert_eq!(body["results"][0]["ok"], true);
        assert_eq!(body["results"][1]["ok"], false);
    }
}
