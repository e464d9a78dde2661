//! The Command Pipeline: context interceptor (enter) → user
//! interceptors (enter) → handler interceptor → user interceptors (leave,
//! reverse order) → context interceptor (leave: fold, validate, append).

use crate::error::RuntimeError;
use crate::metrics::LogMetrics;
use crate::rehydrator::rehydrate;
use eventide_core::event_model::{self, EventModelError};
use eventide_core::event::RecordedEvent;
use eventide_core::log::{EventLog, LogError, TxnId};
use eventide_core::pipeline::Context;
use eventide_core::registry::{Registry, ResolvedCommand};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

fn map_event_model_error(command_name: &str, error: EventModelError) -> RuntimeError {
    let reason = match error {
        EventModelError::Malformed(reason) => reason,
        EventModelError::Invalid { event_name, explain } => {
            format!("event {event_name} failed schema validation: {explain}")
        }
    };
    RuntimeError::EventMalformed {
        command_name: command_name.to_string(),
        reason,
    }
}

/// Run the full command pipeline for an already-resolved command.
///
/// Returns the events appended (with assigned meta), or an empty vector if
/// the handler chose to emit nothing.
///
/// # Errors
///
/// Any of [`RuntimeError`]'s command-path variants, surfaced synchronously
/// to the caller with no automatic retry.
pub async fn run(
    app_name: &str,
    registry: &Registry,
    event_log: Arc<dyn EventLog>,
    resolved: ResolvedCommand,
    command_data: Value,
) -> Result<Vec<RecordedEvent>, RuntimeError> {
    let aggregate_id = command_data
        .get(&resolved.command.id_field)
        .cloned()
        .ok_or_else(|| RuntimeError::EventMalformed {
            command_name: resolved.command.name.clone(),
            reason: format!("command data missing id field `{}`", resolved.command.id_field),
        })?;

    // 1. Context interceptor (enter).
    let aggregate_state = rehydrate(
        app_name,
        registry,
        event_log.as_ref(),
        &resolved.aggregate.name,
        &aggregate_id,
    )
    .await?;

    let mut ctx = Context::new(resolved.command.clone(), command_data, event_log.clone());
    ctx.state
        .insert(resolved.aggregate.name.clone(), aggregate_state.data.clone());
    ctx.meta
        .insert(resolved.aggregate.name.clone(), aggregate_state.meta);

    // 2. User interceptors (enter, in declared order).
    for interceptor in &resolved.command.interceptors {
        ctx = interceptor
            .enter(ctx)
            .await
            .map_err(RuntimeError::BusinessRuleViolation)?;
    }

    // 3. Handler interceptor (enter).
    let handler_state = ctx
        .state
        .get(&resolved.aggregate.name)
        .cloned()
        .unwrap_or(Value::Null);
    let handler_output = (resolved.command.handler)(&handler_state, &ctx.command_data)
        .map_err(RuntimeError::BusinessRuleViolation)?;
    let pairs = event_model::lift(handler_output);
    ctx.events = event_model::validate_and_build(pairs, registry)
        .map_err(|e| map_event_model_error(&resolved.command.name, e))?;

    // 4. User interceptors (leave, in reverse order).
    for interceptor in resolved.command.interceptors.iter().rev() {
        ctx = interceptor
            .leave(ctx)
            .await
            .map_err(RuntimeError::BusinessRuleViolation)?;
    }

    // 5. Context interceptor (leave).
    if ctx.events.is_empty() {
        return Ok(Vec::new());
    }

    let current_meta = ctx
        .meta
        .get(&resolved.aggregate.name)
        .copied()
        .unwrap_or(aggregate_state.meta);

    let mut folded = ctx
        .state
        .get(&resolved.aggregate.name)
        .cloned()
        .unwrap_or(Value::Null);
    for event in &ctx.events {
        let reducer = registry.reducer_for(&event.event_type);
        folded = reducer(&folded, &event.data);
    }

    resolved
        .aggregate
        .schema
        .validate(&folded)
        .map_err(|explain| RuntimeError::AggregateInvalid {
            aggregate_name: resolved.aggregate.name.clone(),
            explain,
        })?;

    let txn_id = TxnId::generate();
    let stream_id = event_model::stream_id(app_name, &resolved.aggregate.name, &aggregate_id);
    let started = Instant::now();
    let result = event_log
        .append(stream_id, txn_id, current_meta.version, ctx.events)
        .await;

    match &result {
        Ok(recorded) => LogMetrics::record_append(recorded.len(), started.elapsed()),
        Err(LogError::ConcurrencyError { .. }) => LogMetrics::record_conflict(),
        Err(_) => {}
    }

    Ok(result?)
}
