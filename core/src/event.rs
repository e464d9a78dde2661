//! Events: immutable facts produced by commands and persisted in order.
//!
//! Events in this crate carry a dynamically-typed payload
//! (`serde_json::Value`) rather than a Rust enum variant, since the
//! registry resolves event names, schemas, and reducers at runtime (see
//! [`crate::registry`]). Wire encoding is left to the [`crate::log::EventLog`]
//! adapter; this module only defines the shapes that flow between the
//! runtime and a backend.

use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `{ts, version}`: when an event was appended and its position in its
/// aggregate stream.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Wall-clock time the event was appended.
    pub ts: DateTime<Utc>,
    /// Position within the aggregate stream.
    pub version: Version,
}

impl EventMeta {
    /// Construct a new `EventMeta`.
    #[must_use]
    pub const fn new(ts: DateTime<Utc>, version: Version) -> Self {
        Self { ts, version }
    }
}

/// `{type, data}`: an event before it has been assigned append metadata.
///
/// This is the shape produced by the Event Model from a handler's
/// return value, before the Event Log assigns `meta`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// The registered event name.
    pub event_type: String,
    /// The event's payload.
    pub data: serde_json::Value,
}

impl EventData {
    /// Construct a new unmeta'd event.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

/// `{type, data, meta}`: a fully recorded event as returned from
/// [`crate::log::EventLog::append`] or [`crate::log::EventLog::read`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// The registered event name.
    pub event_type: String,
    /// The event's payload.
    pub data: serde_json::Value,
    /// Append timestamp and stream position.
    pub meta: EventMeta,
}

impl RecordedEvent {
    /// Construct a recorded event from its unmeta'd form and assigned meta.
    #[must_use]
    pub const fn new(event: EventData, meta: EventMeta) -> Self {
        Self {
            event_type: event.event_type,
            data: event.data,
            meta,
        }
    }
}

impl fmt::Display for RecordedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RecordedEvent {{ type: {}, version: {} }}",
            self.event_type, self.meta.version
        )
    }
}
