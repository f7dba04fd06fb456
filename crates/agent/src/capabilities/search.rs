//! Web search capability.
//!
//! Search is a narrative capability: the reasoning engine consumes the
//! results as reading material, so the success payload is rendered as
//! numbered prose rather than structured JSON.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};

use parley_core::config::ProviderEndpoint;
use parley_core::{InvocationContext, ResultShape};

use super::args::{optional_u64, required_str};
use super::{Capability, CapabilityFailure, ProviderError};

const SEARCH_UNAVAILABLE: &str = "Web search is unavailable right now.";
const DEFAULT_MAX_RESULTS: u64 = 5;
const MAX_RESULTS_CAP: u64 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        context: &InvocationContext,
        query: &str,
        max_results: u64,
    ) -> Result<Vec<SearchHit>, ProviderError>;
}

pub struct WebSearchCapability {
    provider: Arc<dyn SearchProvider>,
}

impl WebSearchCapability {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    fn render(query: &str, hits: &[SearchHit]) -> String {
        if hits.is_empty() {
            return format!("No results found for \"{query}\".");
        }

        let mut narrative = format!("Search results for \"{query}\":\n");
        for (index, hit) in hits.iter().enumerate() {
            narrative.push_str(&format!(
                "{}. {} — {}\n   {}\n",
                index + 1,
                hit.title,
                hit.url,
                hit.snippet
            ));
        }
        narrative
    }
}

#[async_trait]
impl Capability for WebSearchCapability {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Narrative
    }

    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        context: &InvocationContext,
    ) -> Result<Value, CapabilityFailure> {
        let query = required_str("web_search", arguments, "query")?;
        let max_results = optional_u64("web_search", arguments, "max_results")?
            .unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 || max_results > MAX_RESULTS_CAP {
            return Err(CapabilityFailure::invalid_args(
                "web_search",
                format!("`max_results` must be in range 1..={MAX_RESULTS_CAP}"),
            ));
        }

        let hits = self
            .provider
            .search(context, query, max_results)
            .await
            .map_err(|error| CapabilityFailure::provider(SEARCH_UNAVAILABLE, &error))?;
        Ok(Value::String(Self::render(query, &hits)))
    }
}

pub struct HttpSearchProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpSearchProvider {
    pub fn from_endpoint(
        endpoint: &ProviderEndpoint,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| ProviderError(format!("search client build failed: {error}")))?;
        Ok(Self {
            http,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
        })
    }
}

#[derive(Deserialize)]
struct SearchBody {
    results: Vec<SearchHit>,
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(
        &self,
        context: &InvocationContext,
        query: &str,
        max_results: u64,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let mut request = self.http.get(format!("{}/v1/search", self.base_url)).query(&[
            ("q", query),
            ("limit", &max_results.to_string()),
            ("agent_id", context.agent_id.0.as_str()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| ProviderError(format!("search request failed: {error}")))?;
        if !response.status().is_success() {
            return Err(ProviderError(format!(
                "search rejected with status {}",
                response.status()
            )));
        }
        let body: SearchBody = response
            .json()
            .await
            .map_err(|error| ProviderError(format!("search decode failed: {error}")))?;
        Ok(body.results)
    }
}

#[cfg(test)]
mod tests {
    use parley_core::{AgentId, CallerId};
    use serde_json::json;

    use super::*;

    struct FakeSearch {
        hits: Vec<SearchHit>,
        outage: bool,
    }

    #[async_trait]
    impl SearchProvider for FakeSearch {
        async fn search(
            &self,
            _context: &InvocationContext,
            _query: &str,
            _max_results: u64,
        ) -> Result<Vec<SearchHit>, ProviderError> {
            if self.outage {
                return Err(ProviderError("dns lookup failed".to_string()));
            }
            Ok(self.hits.clone())
        }
    }

    fn context() -> InvocationContext {
        InvocationContext {
            caller_id: CallerId("caller-1".to_string()),
            agent_id: AgentId("agent-1".to_string()),
        }
    }

    fn arguments(json: Value) -> Map<String, Value> {
        json.as_object().expect("arguments must be an object").clone()
    }

    fn hit(title: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            snippet: format!("About {title}."),
        }
    }

    #[tokio::test]
    async fn results_are_rendered_as_numbered_prose() {
        let capability = WebSearchCapability::new(Arc::new(FakeSearch {
            hits: vec![hit("rust"), hit("tokio")],
            outage: false,
        }));

        let payload = capability
            .invoke(&arguments(json!({"query": "async runtimes"})), &context())
            .await
            .expect("search should succeed");

        let narrative = payload.as_str().expect("narrative payload must be a string");
        assert!(narrative.starts_with("Search results for \"async runtimes\":"));
        assert!(narrative.contains("1. rust — https://example.com/rust"));
        assert!(narrative.contains("2. tokio — https://example.com/tokio"));
        // Never raw JSON for narrative capabilities.
        assert!(!narrative.contains('{'));
    }

    #[tokio::test]
    async fn empty_results_still_read_as_prose() {
        let capability =
            WebSearchCapability::new(Arc::new(FakeSearch { hits: Vec::new(), outage: false }));

        let payload = capability
            .invoke(&arguments(json!({"query": "nonexistent widget"})), &context())
            .await
            .expect("search should succeed");

        assert_eq!(payload.as_str(), Some("No results found for \"nonexistent widget\"."));
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let capability =
            WebSearchCapability::new(Arc::new(FakeSearch { hits: Vec::new(), outage: false }));

        let failure = capability
            .invoke(&arguments(json!({"query": "   "})), &context())
            .await
            .expect_err("blank query must fail");

        assert!(failure.user_message.starts_with("web_search:"));
    }

    #[tokio::test]
    async fn oversized_max_results_is_rejected() {
        let capability =
            WebSearchCapability::new(Arc::new(FakeSearch { hits: Vec::new(), outage: false }));

        let failure = capability
            .invoke(&arguments(json!({"query": "rust", "max_results": 50})), &context())
            .await
            .expect_err("cap must be enforced");

        assert!(failure.user_message.contains("1..=10"));
    }

    #[tokio::test]
    async fn outage_maps_to_generic_message_with_detail_retained() {
        let capability =
            WebSearchCapability::new(Arc::new(FakeSearch { hits: Vec::new(), outage: true }));

        let failure = capability
            .invoke(&arguments(json!({"query": "rust"})), &context())
            .await
            .expect_err("outage must fail");

        assert_eq!(failure.user_message, SEARCH_UNAVAILABLE);
        assert_eq!(failure.detail, "dns lookup failed");
    }
}
