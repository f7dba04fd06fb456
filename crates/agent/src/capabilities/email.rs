//! Outbound email capability.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use parley_core::config::ProviderEndpoint;
use parley_core::{InvocationContext, ResultShape};

use super::args::required_str;
use super::{Capability, CapabilityFailure, ProviderError};

const MAIL_UNAVAILABLE: &str = "The email service is unavailable right now.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Sends on behalf of the caller's account; returns the provider's
    /// message id.
    async fn send(
        &self,
        context: &InvocationContext,
        email: &OutboundEmail,
    ) -> Result<String, ProviderError>;
}

pub struct SendEmailCapability {
    provider: Arc<dyn MailProvider>,
}

impl SendEmailCapability {
    pub fn new(provider: Arc<dyn MailProvider>) -> Self {
        Self { provider }
    }

    fn parse_email(arguments: &Map<String, Value>) -> Result<OutboundEmail, CapabilityFailure> {
        let to = required_str("send_email", arguments, "to")?;
        if !to.contains('@') {
            return Err(CapabilityFailure::invalid_args(
                "send_email",
                format!("`to` must be an email address, got `{to}`"),
            ));
        }
        let subject = required_str("send_email", arguments, "subject")?;
        let body = required_str("send_email", arguments, "body")?;
        Ok(OutboundEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        })
    }
}

#[async_trait]
impl Capability for SendEmailCapability {
    fn name(&self) -> &'static str {
        "send_email"
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Structured
    }

    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        context: &InvocationContext,
    ) -> Result<Value, CapabilityFailure> {
        let email = Self::parse_email(arguments)?;
        let message_id = self
            .provider
            .send(context, &email)
            .await
            .map_err(|error| CapabilityFailure::provider(MAIL_UNAVAILABLE, &error))?;
        Ok(json!({
            "message_id": message_id,
            "to": email.to,
            "status": "sent",
        }))
    }
}

pub struct HttpMailProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpMailProvider {
    pub fn from_endpoint(
        endpoint: &ProviderEndpoint,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| ProviderError(format!("mail client build failed: {error}")))?;
        Ok(Self {
            http,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
        })
    }
}

#[derive(Deserialize)]
struct SentBody {
    message_id: String,
}

#[async_trait]
impl MailProvider for HttpMailProvider {
    async fn send(
        &self,
        context: &InvocationContext,
        email: &OutboundEmail,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/accounts/{}/messages", self.base_url, context.caller_id.0);
        let mut request =
            self.http.post(url).query(&[("agent_id", context.agent_id.0.as_str())]).json(email);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| ProviderError(format!("mail send failed: {error}")))?;
        if !response.status().is_success() {
            return Err(ProviderError(format!(
                "mail send rejected with status {}",
                response.status()
            )));
        }
        let body: SentBody = response
            .json()
            .await
            .map_err(|error| ProviderError(format!("mail send decode failed: {error}")))?;
        Ok(body.message_id)
    }
}
