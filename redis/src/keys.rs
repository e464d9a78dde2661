//! Redis key and stream-id construction: the exact on-disk key layout.

use eventide_core::stream::StreamId;

/// `es:stream/all-events`: the global fan-out stream every append also
/// writes to, and the default subscription source.
pub const ALL_EVENTS_STREAM: &str = "es:stream/all-events";

/// The per-aggregate Redis stream key for `stream_id`.
#[must_use]
pub fn stream_key(stream_id: &StreamId) -> String {
    format!("es:stream/{}", stream_id.as_str())
}

/// The metadata key (`{current-version, last-txn-id}`) for `stream_id`.
#[must_use]
pub fn meta_key(stream_id: &StreamId) -> String {
    format!("es:meta/{}", stream_id.as_str())
}

/// The snapshot key for `stream_id`.
#[must_use]
pub fn snapshot_key(stream_id: &StreamId) -> String {
    format!("es:snapshot/{}", stream_id.as_str())
}
