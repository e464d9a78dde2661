//! The Dispatcher: the entry point user code calls to execute a
//! command, plus `get-aggregate` for reading current aggregate state.

use crate::app::Application;
use crate::error::RuntimeError;
use crate::metrics::DispatchMetrics;
use crate::pipeline;
use crate::rehydrator::rehydrate;
use eventide_core::event::RecordedEvent;
use serde_json::Value;
use std::time::Instant;

/// Dispatch `command_name` with `data`, running the full command pipeline
/// to completion before returning (synchronous and blocking from the
/// caller's perspective).
///
/// # Errors
///
/// - [`RuntimeError::ApplicationNotStarted`] if `app` has been stopped.
/// - [`RuntimeError::CommandUnknown`] if no command is registered under
///   `command_name`.
/// - [`RuntimeError::CommandInvalid`] if `data` fails the command's schema.
/// - Any pipeline error from [`pipeline::run`].
pub async fn dispatch(
    app: &Application,
    command_name: &str,
    data: Value,
) -> Result<Vec<RecordedEvent>, RuntimeError> {
    if !app.is_running() {
        return Err(RuntimeError::ApplicationNotStarted);
    }

    let resolved = app
        .registry()
        .command(command_name)
        .ok_or_else(|| RuntimeError::CommandUnknown(command_name.to_string()))?;

    resolved
        .command
        .schema
        .validate(&data)
        .map_err(|explain| RuntimeError::CommandInvalid {
            command_name: command_name.to_string(),
            explain,
        })?;

    let started = Instant::now();
    let result = pipeline::run(
        app.name(),
        app.registry(),
        app.event_log(),
        resolved,
        data,
    )
    .await;

    match &result {
        Ok(_) => DispatchMetrics::record(started.elapsed()),
        Err(_) => DispatchMetrics::record_error(),
    }

    result
}

/// Rehydrate `aggregate_name`/`id` and return its current data.
///
/// # Errors
///
/// [`RuntimeError::ApplicationNotStarted`] if `app` has been stopped, or any
/// error [`rehydrate`] raises.
pub async fn get_aggregate(
    app: &Application,
    aggregate_name: &str,
    id: Value,
) -> Result<Value, RuntimeError> {
    if !app.is_running() {
        return Err(RuntimeError::ApplicationNotStarted);
    }

    let state = rehydrate(
        app.name(),
        app.registry(),
        app.event_log().as_ref(),
        aggregate_name,
        &id,
    )
    .await?;

    Ok(state.data)
}
