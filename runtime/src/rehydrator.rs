//! The Aggregate Rehydrator: produces current aggregate state by
//! folding its event stream, optionally starting from a snapshot.
//!
//! Rehydration is pure (the same stream always folds to the same result),
//! so it is safe to repeat after a concurrency failure.

use crate::error::RuntimeError;
use chrono::{DateTime, Utc};
use eventide_core::event::EventMeta;
use eventide_core::event_model;
use eventide_core::log::EventLog;
use eventide_core::registry::Registry;
use eventide_core::version::Version;
use serde_json::Value;

/// The result of folding an aggregate's stream: its meta (timestamp and
/// version of the last applied event) and its data.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateState {
    /// Timestamp and version of the last event folded into `data`.
    pub meta: EventMeta,
    /// The folded aggregate data.
    pub data: Value,
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_else(Utc::now)
}

/// Rehydrate `aggregate_name`/`aggregate_id` by folding its stream.
///
/// # Errors
///
/// Returns [`RuntimeError::BackendError`] if the log cannot be read, or
/// [`RuntimeError::ApplicationNotStarted`]-adjacent configuration errors
/// are surfaced by the caller when `aggregate_name` is unregistered.
pub async fn rehydrate(
    app_name: &str,
    registry: &Registry,
    event_log: &dyn EventLog,
    aggregate_name: &str,
    aggregate_id: &Value,
) -> Result<AggregateState, RuntimeError> {
    let aggregate = registry
        .aggregate(aggregate_name)
        .ok_or_else(|| RuntimeError::CommandUnknown(aggregate_name.to_string()))?;

    let stream_id = event_model::stream_id(app_name, aggregate_name, aggregate_id);

    let mut state = if aggregate.snapshot {
        match event_log.get_snapshot(stream_id.clone()).await? {
            Some(snapshot) => AggregateState {
                meta: snapshot.meta,
                data: snapshot.data,
            },
            None => AggregateState {
                meta: EventMeta::new(unix_epoch(), Version::INITIAL),
                data: Value::Null,
            },
        }
    } else {
        AggregateState {
            meta: EventMeta::new(unix_epoch(), Version::INITIAL),
            data: Value::Null,
        }
    };

    let events = event_log
        .read(stream_id, Some(state.meta.version), None)
        .await?;

    for event in events {
        let reducer = registry.reducer_for(&event.event_type);
        state.data = reducer(&state.data, &event.data);
        state.meta = event.meta;
    }

    Ok(state)
}
