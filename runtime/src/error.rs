//! The runtime's error taxonomy.
//!
//! Command-path errors surface synchronously to the `dispatch` caller with
//! no automatic retry. Subscription-side handler errors never reach this
//! type: they are caught, logged, and acknowledged by the subscription
//! runner.

use eventide_core::log::LogError;
use eventide_core::stream::StreamId;
use eventide_core::version::Version;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by [`crate::dispatcher::dispatch`] and the pipeline it runs.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `dispatch` was called with no running application.
    #[error("no application is currently started")]
    ApplicationNotStarted,

    /// No command registration exists under the given name.
    #[error("unknown command: {0}")]
    CommandUnknown(String),

    /// The command's input failed its registered schema.
    #[error("command input invalid for {command_name}")]
    CommandInvalid {
        /// The command that rejected its input.
        command_name: String,
        /// The schema validator's explanation payload.
        explain: Value,
    },

    /// The handler's return value did not conform to the event shape.
    /// Indicates a handler bug, not a runtime fault.
    #[error("handler for {command_name} returned a malformed event: {reason}")]
    EventMalformed {
        /// The command whose handler misbehaved.
        command_name: String,
        /// What was wrong with the shape.
        reason: String,
    },

    /// Applying the handler's events would violate the aggregate's schema.
    /// The append never happens.
    #[error("resulting aggregate state invalid for {aggregate_name}")]
    AggregateInvalid {
        /// The aggregate whose schema rejected the folded state.
        aggregate_name: String,
        /// The schema validator's explanation payload.
        explain: Value,
    },

    /// Optimistic concurrency control detected a conflicting writer.
    #[error("concurrency conflict on stream {stream_id}")]
    ConcurrencyError {
        /// The stream where the conflict occurred.
        stream_id: StreamId,
        /// The version the caller expected.
        expected: Version,
        /// The stream's actual current version.
        actual: Version,
    },

    /// The user handler raised a business-rule violation.
    #[error("business rule violation: {0}")]
    BusinessRuleViolation(Value),

    /// A transport/storage failure propagated up from the Event Log.
    #[error("backend error: {0}")]
    BackendError(String),
}

impl From<LogError> for RuntimeError {
    fn from(error: LogError) -> Self {
        match error {
            LogError::ConcurrencyError {
                stream_id,
                expected,
                actual,
            } => Self::ConcurrencyError {
                stream_id,
                expected,
                actual,
            },
            LogError::BackendError(message) | LogError::SerializationError(message) => {
                Self::BackendError(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_unknown_display() {
        let error = RuntimeError::CommandUnknown("open-account".to_string());
        assert_eq!(error.to_string(), "unknown command: open-account");
    }

    #[test]
    fn log_error_maps_to_concurrency_error() {
        let log_error = LogError::ConcurrencyError {
            stream_id: StreamId::new("app:agg:1"),
            expected: Version::new(1, 0),
            actual: Version::new(2, 0),
        };
        let runtime_error: RuntimeError = log_error.into();
        assert!(matches!(
            runtime_error,
            RuntimeError::ConcurrencyError { .. }
        ));
    }
}
