//! The Event Model: normalizes a handler's return value into internal
//! event records, and centralizes stream-id construction.
//!
//! `meta` (`{ts, version}`) is deliberately **not** assigned here: the
//! Event Log assigns it during append so that `version` reflects true
//! append order.

use crate::event::EventData;
use crate::registry::{HandlerOutput, Registry};
use crate::stream::StreamId;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while normalizing a handler's output into events.
#[derive(Error, Debug)]
pub enum EventModelError {
    /// The handler returned a shape the event model doesn't recognize, or
    /// named an event with no registration.
    #[error("event malformed: {0}")]
    Malformed(String),

    /// The event's data failed its registered schema.
    #[error("event data invalid for {event_name}")]
    Invalid {
        /// The event that failed validation.
        event_name: String,
        /// The schema validator's explanation payload.
        explain: Value,
    },
}

/// Deterministically stringify a value for use in a stream id.
///
/// Raw strings are used unquoted; numbers and booleans use their natural
/// `Display`; anything else falls back to its compact JSON rendering.
#[must_use]
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Render a name under its namespace, if any: `"<ns>.<name>"`.
#[must_use]
pub fn namespaced(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{ns}.{name}"),
        None => name.to_string(),
    }
}

/// Build the full stream id `"<app>:<agg>:<id>"` for one aggregate
/// instance.
#[must_use]
pub fn stream_id(app_name: &str, aggregate_name: &str, aggregate_id: &Value) -> StreamId {
    StreamId::new(format!(
        "{app_name}:{aggregate_name}:{}",
        stringify_value(aggregate_id)
    ))
}

/// Lift a handler's return value into a sequence of `(name, data)` pairs.
/// An empty result means "no events".
#[must_use]
pub fn lift(output: HandlerOutput) -> Vec<(String, Value)> {
    match output {
        HandlerOutput::None => Vec::new(),
        HandlerOutput::One(name, data) => vec![(name, data)],
        HandlerOutput::Many(pairs) => pairs,
    }
}

/// Validate each `(name, data)` pair against its registered event schema and
/// produce the internal `{type, data}` record.
///
/// # Errors
///
/// Returns [`EventModelError::Malformed`] if a name has no event
/// registration, or [`EventModelError::Invalid`] if the data fails the
/// event's schema.
pub fn validate_and_build(
    pairs: Vec<(String, Value)>,
    registry: &Registry,
) -> Result<Vec<EventData>, EventModelError> {
    pairs
        .into_iter()
        .map(|(name, data)| {
            let resolved = registry
                .event(&name)
                .ok_or_else(|| EventModelError::Malformed(format!("unregistered event: {name}")))?;
            resolved
                .event
                .schema
                .validate(&data)
                .map_err(|explain| EventModelError::Invalid {
                    event_name: name.clone(),
                    explain,
                })?;
            Ok(EventData::new(name, data))
        })
        .collect()
}
