//! Wire encoding for stream entries and the per-stream metadata record.
//!
//! Stream entries use `bincode`, the same codec [`eventide_core::event`]
//! documents for the event payload itself; the adapter treats both
//! entry fields as opaque blobs.

use eventide_core::event::{EventData, EventMeta, RecordedEvent};
use eventide_core::log::{Snapshot, TxnId};
use eventide_core::version::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while encoding or decoding Redis stream/meta payloads.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Failed to bincode-encode a value for storage.
    #[error("failed to encode: {0}")]
    Encode(String),
    /// Failed to bincode-decode a stored value.
    #[error("failed to decode: {0}")]
    Decode(String),
}

/// The persisted form of a stream's metadata record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetaRecord {
    /// The stream's last-assigned version, or `None` before any append.
    pub current_version: Option<Version>,
    /// The `TxnId` of the last successful append.
    pub last_txn_id: Option<String>,
}

impl MetaRecord {
    /// Encode this record to bytes for `SET`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if bincode encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode a record previously written by [`MetaRecord::encode`].
    ///
    /// `None` (key absent) decodes to the default record.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the bytes are not a valid record.
    pub fn decode(bytes: Option<&[u8]>) -> Result<Self, CodecError> {
        match bytes {
            None => Ok(Self::default()),
            Some(bytes) => {
                bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
            }
        }
    }

    /// Whether `txn_id` matches the last recorded append's txn id.
    #[must_use]
    pub fn is_replay_of(&self, txn_id: &TxnId) -> bool {
        self.last_txn_id.as_deref() == Some(txn_id.as_str())
    }
}

/// Encode an event's `meta` and `event` stream-entry fields.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if either field fails to bincode-encode.
pub fn encode_entry_fields(
    event: &EventData,
    meta: EventMeta,
) -> Result<(Vec<u8>, Vec<u8>), CodecError> {
    let meta_bytes = bincode::serialize(&meta).map_err(|e| CodecError::Encode(e.to_string()))?;
    let event_bytes = bincode::serialize(event).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok((meta_bytes, event_bytes))
}

/// Decode a stream entry's `meta` and `event` fields back into a
/// [`RecordedEvent`].
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if either field cannot be decoded.
pub fn decode_entry_fields(
    meta_bytes: &[u8],
    event_bytes: &[u8],
) -> Result<RecordedEvent, CodecError> {
    let meta: EventMeta =
        bincode::deserialize(meta_bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
    let event: EventData =
        bincode::deserialize(event_bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok(RecordedEvent::new(event, meta))
}

/// Render the Redis stream entry id for `version`, matching the wire
/// format `"<base>-<batch>"` exactly (Redis itself uses `"<ms>-<seq>"` ids,
/// so the assigned version doubles as a valid explicit entry id).
#[must_use]
pub fn entry_id(version: Version) -> String {
    version.to_string()
}

/// The inclusive upper bound entry id covering every `batch` index sharing
/// `base`, for re-reading the events a given append assigned (idempotent
/// replay).
#[must_use]
pub fn entry_id_range_end(base: u64) -> String {
    format!("{base}-{}", u32::MAX)
}

/// Encode a snapshot for storage under its `es:snapshot/*` key.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if bincode encoding fails.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(snapshot).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a snapshot previously written by [`encode_snapshot`].
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not a valid snapshot.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
