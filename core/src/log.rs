//! The Event Log abstract contract: per-stream append-with-expected-version,
//! ranged read, subscription cursors, and snapshot put/get. Concrete
//! backends (the `eventide-redis` crate, or
//! `eventide-testing`'s in-memory adapter) implement [`EventLog`].
//!
//! # Dyn Compatibility
//!
//! Like the event store trait this one is descended from, `EventLog`
//! returns explicit `Pin<Box<dyn Future>>` rather than using `async fn`, so
//! that an `Arc<dyn EventLog>` can be shared across the dispatcher,
//! rehydrator, and subscription runner.

use crate::event::{EventData, EventMeta, RecordedEvent};
use crate::stream::StreamId;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// A caller-scoped idempotency key for a single append attempt.
///
/// Re-submitting an `append` with a `TxnId` that was already recorded for a
/// stream returns the previously-recorded metadata instead of appending
/// again.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TxnId(String);

impl TxnId {
    /// Wrap an existing string as a `TxnId`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh, unique transaction id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{:032x}", rand::random::<u128>()))
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `{current-version, last-txn-id}`: persisted alongside each stream for
/// optimistic concurrency and duplicate-append suppression.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct StreamMetadata {
    /// The version of the last event appended to this stream.
    pub current_version: Option<Version>,
    /// The `TxnId` of the last successful append, for idempotent replay.
    pub last_txn_id: Option<TxnId>,
}

/// An opaque snapshot of aggregate state at a given version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken and which version it reflects.
    pub meta: EventMeta,
    /// The snapshotted aggregate state.
    pub data: serde_json::Value,
}

/// Where a new subscription's cursor should begin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartFrom {
    /// Deliver every event ever appended to the target stream.
    Origin,
    /// Deliver only events appended after the subscription attaches.
    Latest,
}

/// Parameters for [`EventLog::subscribe`].
#[derive(Clone)]
pub struct SubscribeOptions {
    /// Cursor starting position.
    pub start_from: StartFrom,
    /// The stream to subscribe to; `None` means the global all-events
    /// fan-out stream (the default).
    pub stream_id: Option<StreamId>,
}

impl SubscribeOptions {
    /// Subscribe to the global all-events stream from the given position.
    #[must_use]
    pub const fn new(start_from: StartFrom) -> Self {
        Self {
            start_from,
            stream_id: None,
        }
    }

    /// Restrict this subscription to a single aggregate stream.
    #[must_use]
    pub fn on_stream(mut self, stream_id: StreamId) -> Self {
        self.stream_id = Some(stream_id);
        self
    }
}

/// A handler invoked once per delivered event.
///
/// At-least-once delivery: a handler may be invoked more than once for the
/// same event.
pub type SubscriptionHandler =
    Arc<dyn Fn(RecordedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Errors raised by an [`EventLog`] implementation.
#[derive(Error, Debug)]
pub enum LogError {
    /// Optimistic concurrency conflict: `expected_version` did not match the
    /// stream's `current_version` at append time.
    #[error("concurrency conflict on {stream_id}: expected {expected}, found {actual}")]
    ConcurrencyError {
        /// The stream where the conflict occurred.
        stream_id: StreamId,
        /// The version the caller expected.
        expected: Version,
        /// The stream's actual current version.
        actual: Version,
    },

    /// Transport or storage failure.
    #[error("backend error: {0}")]
    BackendError(String),

    /// Failed to (de)serialize an event or snapshot payload.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// The abstract Event Log contract.
///
/// Implementations must be `Send + Sync` so that an `Arc<dyn EventLog>` can
/// be shared across the dispatcher, rehydrator, and subscription runner.
pub trait EventLog: Send + Sync {
    /// The canonical version denoting "no events yet" for this backend.
    fn initial_version(&self) -> Version {
        Version::INITIAL
    }

    /// Atomically append `events` to `stream_id`, gated by `expected_version`.
    ///
    /// If `txn_id` matches the stream's `last_txn_id`, this is a no-op that
    /// returns the previously-recorded events (idempotent replay). Otherwise,
    /// if `expected_version` matches the stream's `current_version`, each
    /// event is assigned an increasing version and appended; otherwise the
    /// call fails with [`LogError::ConcurrencyError`].
    ///
    /// # Errors
    ///
    /// Returns [`LogError::ConcurrencyError`] on a version mismatch, or
    /// [`LogError::BackendError`]/[`LogError::SerializationError`] on
    /// transport or encoding failure.
    fn append(
        &self,
        stream_id: StreamId,
        txn_id: TxnId,
        expected_version: Version,
        events: Vec<EventData>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, LogError>> + Send + '_>>;

    /// Read events from `stream_id` with `version > start_version`, in order.
    ///
    /// `start_version` defaults to [`EventLog::initial_version`] when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::BackendError`] on transport failure or
    /// [`LogError::SerializationError`] if a stored event cannot be decoded.
    fn read(
        &self,
        stream_id: StreamId,
        start_version: Option<Version>,
        limit: Option<usize>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, LogError>> + Send + '_>>;

    /// Register a durable cursor under `subscriber_name` and invoke
    /// `handler` for each event in order, at-least-once.
    ///
    /// Re-subscribing with the same `subscriber_name` continues from the
    /// persisted cursor rather than restarting.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::BackendError`] if the cursor cannot be
    /// registered with the backend.
    fn subscribe(
        &self,
        subscriber_name: String,
        handler: SubscriptionHandler,
        options: SubscribeOptions,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>>;

    /// Persist a snapshot for `stream_id`, overwriting any prior snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::BackendError`] on transport failure.
    fn save_snapshot(
        &self,
        stream_id: StreamId,
        snapshot: Snapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>>;

    /// Load the most recently saved snapshot for `stream_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::BackendError`] on transport failure or
    /// [`LogError::SerializationError`] if the stored snapshot cannot be
    /// decoded.
    fn get_snapshot(
        &self,
        stream_id: StreamId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Snapshot>, LogError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_error_display() {
        let error = LogError::ConcurrencyError {
            stream_id: StreamId::new("app:agg:1"),
            expected: Version::new(1, 0),
            actual: Version::new(2, 0),
        };
        let display = format!("{error}");
        assert!(display.contains("expected 1-0"));
        assert!(display.contains("found 2-0"));
    }

    #[test]
    fn txn_id_generate_is_unique() {
        let a = TxnId::generate();
        let b = TxnId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn subscribe_options_defaults_to_global_stream() {
        let opts = SubscribeOptions::new(StartFrom::Latest);
        assert!(opts.stream_id.is_none());
        let opts = opts.on_stream(StreamId::new("app:agg:1"));
        assert_eq!(opts.stream_id.map(|s| s.into_inner()), Some("app:agg:1".to_string()));
    }
}
