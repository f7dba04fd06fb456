//! Argument-bag validation helpers shared by the capability handlers.
//!
//! Invocations arrive as untyped JSON maps; each helper pulls one field out
//! with a capability-scoped error message so nothing unvalidated reaches a
//! provider.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::CapabilityFailure;

pub(crate) fn required_str<'a>(
    capability: &str,
    arguments: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, CapabilityFailure> {
    match arguments.get(key) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value),
        Some(Value::String(_)) => Err(CapabilityFailure::invalid_args(
            capability,
            format!("`{key}` must not be blank"),
        )),
        Some(_) => {
            Err(CapabilityFailure::invalid_args(capability, format!("`{key}` must be a string")))
        }
        None => Err(CapabilityFailure::invalid_args(capability, format!("`{key}` is required"))),
    }
}

pub(crate) fn optional_str<'a>(
    capability: &str,
    arguments: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, CapabilityFailure> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => {
            Err(CapabilityFailure::invalid_args(capability, format!("`{key}` must be a string")))
        }
    }
}

pub(crate) fn optional_u64(
    capability: &str,
    arguments: &Map<String, Value>,
    key: &str,
) -> Result<Option<u64>, CapabilityFailure> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(value)) => value.as_u64().map(Some).ok_or_else(|| {
            CapabilityFailure::invalid_args(
                capability,
                format!("`{key}` must be a non-negative integer"),
            )
        }),
        Some(_) => Err(CapabilityFailure::invalid_args(
            capability,
            format!("`{key}` must be a non-negative integer"),
        )),
    }
}

pub(crate) fn parse_timestamp(
    capability: &str,
    key: &str,
    raw: &str,
) -> Result<DateTime<Utc>, CapabilityFailure> {
    DateTime::parse_from_rfc3339(raw).map(|parsed| parsed.with_timezone(&Utc)).map_err(|_| {
        CapabilityFailure::invalid_args(
            capability,
            format!("`{key}` must be an RFC 3339 timestamp, got `{raw}`"),
        )
    })
}
