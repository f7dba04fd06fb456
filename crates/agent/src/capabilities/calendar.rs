//! Calendar capabilities: list events in a window and create an event.
//!
//! Both handlers are structured-result capabilities; the reasoning engine
//! receives compact JSON it can quote fields from. All provider calls are
//! scoped by the caller's account via the invocation context.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use parley_core::config::ProviderEndpoint;
use parley_core::{InvocationContext, ResultShape};

use super::args::{optional_str, parse_timestamp, required_str};
use super::{Capability, CapabilityFailure, ProviderError};

const CALENDAR_UNAVAILABLE: &str = "The calendar service is unavailable right now.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendees: Vec<String>,
}

/// Backend seam for the calendar side effects. Implementations own their
/// own retry policy; the registry never retries.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn list_events(
        &self,
        context: &InvocationContext,
        window: &EventWindow,
    ) -> Result<Vec<CalendarEvent>, ProviderError>;

    /// Returns the created event's provider id.
    async fn create_event(
        &self,
        context: &InvocationContext,
        event: &NewEvent,
    ) -> Result<String, ProviderError>;
}

pub struct ListEventsCapability {
    provider: Arc<dyn CalendarProvider>,
}

impl ListEventsCapability {
    pub fn new(provider: Arc<dyn CalendarProvider>) -> Self {
        Self { provider }
    }

    fn parse_window(arguments: &Map<String, Value>) -> Result<EventWindow, CapabilityFailure> {
        let now = Utc::now();
        let from = match optional_str("list_events", arguments, "from")? {
            Some(raw) => parse_timestamp("list_events", "from", raw)?,
            None => now,
        };
        let to = match optional_str("list_events", arguments, "to")? {
            Some(raw) => parse_timestamp("list_events", "to", raw)?,
            None => now + chrono::Duration::days(7),
        };
        if from >= to {
            return Err(CapabilityFailure::invalid_args(
                "list_events",
                "`from` must be earlier than `to`",
            ));
        }
        Ok(EventWindow { from, to })
    }
}

#[async_trait]
impl Capability for ListEventsCapability {
    fn name(&self) -> &'static str {
        "list_events"
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Structured
    }

    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        context: &InvocationContext,
    ) -> Result<Value, CapabilityFailure> {
        let window = Self::parse_window(arguments)?;
        let events = self
            .provider
            .list_events(context, &window)
            .await
            .map_err(|error| CapabilityFailure::provider(CALENDAR_UNAVAILABLE, &error))?;
        Ok(json!({
            "from": window.from.to_rfc3339(),
            "to": window.to.to_rfc3339(),
            "events": events,
        }))
    }
}

pub struct CreateEventCapability {
    provider: Arc<dyn CalendarProvider>,
}

impl CreateEventCapability {
    pub fn new(provider: Arc<dyn CalendarProvider>) -> Self {
        Self { provider }
    }

    fn parse_event(arguments: &Map<String, Value>) -> Result<NewEvent, CapabilityFailure> {
        let title = required_str("create_event", arguments, "title")?.to_string();
        let start_raw = required_str("create_event", arguments, "start")?;
        let end_raw = required_str("create_event", arguments, "end")?;
        let start = parse_timestamp("create_event", "start", start_raw)?;
        let end = parse_timestamp("create_event", "end", end_raw)?;
        if start >= end {
            return Err(CapabilityFailure::invalid_args(
                "create_event",
                "`start` must be earlier than `end`",
            ));
        }

        let attendees = match arguments.get("attendees") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut attendees = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(address) if address.contains('@') => {
                            attendees.push(address.clone());
                        }
                        other => {
                            return Err(CapabilityFailure::invalid_args(
                                "create_event",
                                format!("`attendees` entries must be email addresses, got `{other}`"),
                            ));
                        }
                    }
                }
                attendees
            }
            Some(_) => {
                return Err(CapabilityFailure::invalid_args(
                    "create_event",
                    "`attendees` must be an array of email addresses",
                ));
            }
        };

        Ok(NewEvent { title, start, end, attendees })
    }
}

#[async_trait]
impl Capability for CreateEventCapability {
    fn name(&self) -> &'static str {
        "create_event"
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Structured
    }

    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        context: &InvocationContext,
    ) -> Result<Value, CapabilityFailure> {
        let event = Self::parse_event(arguments)?;
        let event_id = self
            .provider
            .create_event(context, &event)
            .await
            .map_err(|error| CapabilityFailure::provider(CALENDAR_UNAVAILABLE, &error))?;
        Ok(json!({
            "event_id": event_id,
            "title": event.title,
            "start": event.start.to_rfc3339(),
            "end": event.end.to_rfc3339(),
            "status": "confirmed",
        }))
    }
}

/// HTTP calendar backend. Every request carries the caller's account in the
/// path and the owning agent as a query parameter, so no call can touch
/// another user's calendar.
pub struct HttpCalendarProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpCalendarProvider {
    pub fn from_endpoint(endpoint: &ProviderEndpoint, timeout_secs: u64) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| ProviderError(format!("calendar client build failed: {error}")))?;
        Ok(Self {
            http,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }
}

#[derive(Deserialize)]
struct EventsBody {
    events: Vec<CalendarEvent>,
}

#[derive(Deserialize)]
struct CreatedBody {
    event_id: String,
}

#[async_trait]
impl CalendarProvider for HttpCalendarProvider {
    async fn list_events(
        &self,
        context: &InvocationContext,
        window: &EventWindow,
    ) -> Result<Vec<CalendarEvent>, ProviderError> {
        let url = format!("{}/v1/accounts/{}/events", self.base_url, context.caller_id.0);
        let response = self
            .authorize(self.http.get(url).query(&[
                ("agent_id", context.agent_id.0.as_str()),
                ("from", &window.from.to_rfc3339()),
                ("to", &window.to.to_rfc3339()),
            ]))
            .send()
            .await
            .map_err(|error| ProviderError(format!("calendar list failed: {error}")))?;
        if !response.status().is_success() {
            return Err(ProviderError(format!(
                "calendar list rejected with status {}",
                response.status()
            )));
        }
        let body: EventsBody = response
            .json()
            .await
            .map_err(|error| ProviderError(format!("calendar list decode failed: {error}")))?;
        Ok(body.events)
    }

    async fn create_event(
        &self,
        context: &InvocationContext,
        event: &NewEvent,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/accounts/{}/events", self.base_url, context.caller_id.0);
        let response = self
            .authorize(self.http.post(url).query(&[("agent_id", context.agent_id.0.as_str())]))
            .json(event)
            .send()
            .await
            .map_err(|error| ProviderError(format!("calendar create failed: {error}")))?;
        if !response.status().is_success() {
            return Err(ProviderError(format!(
                "calendar create rejected with status {}",
                response.status()
            )));
        }
        let body: CreatedBody = response
            .json()
            .await
            .map_err(|error| ProviderError(format!("calendar create decode failed: {error}")))?;
        Ok(body.event_id)
    }
}
