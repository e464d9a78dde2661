//! Application lifecycle: `start-application` wires a [`Registry`] to
//! an [`EventLog`] and attaches every registered subscription; the returned
//! handle is what [`crate::dispatcher`] calls `dispatch`/`get-aggregate`
//! against.

use crate::error::RuntimeError;
use crate::subscription;
use eventide_core::log::EventLog;
use eventide_core::registry::Registry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A running application: an immutable [`Registry`] paired with the
/// [`EventLog`] it dispatches against.
///
/// `Application` is the thing `dispatch` needs, but it is possible to hold
/// an `Arc<Application>` past [`stop_application`] (other clones may still
/// be in flight), so it also tracks whether it is still accepting work:
/// callers get [`RuntimeError::ApplicationNotStarted`] rather than a silent
/// write to a log nobody is reading from anymore.
pub struct Application {
    name: String,
    registry: Registry,
    event_log: Arc<dyn EventLog>,
    running: AtomicBool,
}

impl Application {
    /// The application's namespace, used to build stream ids.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The application's command/event/aggregate catalogue.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A clone of the application's event log handle.
    #[must_use]
    pub fn event_log(&self) -> Arc<dyn EventLog> {
        self.event_log.clone()
    }

    /// Whether this application is still accepting `dispatch` calls.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Start an application: attach every subscription the registry declares to
/// `event_log`, then return a shared handle ready for `dispatch`.
///
/// # Errors
///
/// Returns [`RuntimeError::BackendError`] if a subscription cannot be
/// registered with the backend.
pub async fn start_application(
    name: impl Into<String>,
    registry: Registry,
    event_log: Arc<dyn EventLog>,
) -> Result<Arc<Application>, RuntimeError> {
    subscription::attach_all(&registry, &event_log).await?;

    Ok(Arc::new(Application {
        name: name.into(),
        registry,
        event_log,
        running: AtomicBool::new(true),
    }))
}

/// Stop an application: further `dispatch`/`get-aggregate` calls against
/// this handle fail with [`RuntimeError::ApplicationNotStarted`].
///
/// Subscription delivery already in flight inside the backend is not
/// forcibly cancelled; backends are expected to stop driving a subscriber's
/// consumer group once its handler starts erroring persistently, but this
/// runtime does not assume any particular shutdown hook from them.
pub fn stop_application(app: &Application) {
    app.running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests assert start/stop succeeds
mod tests {
    use super::*;
    use eventide_core::event::RecordedEvent;
    use eventide_core::log::{LogError, Snapshot, SubscribeOptions, SubscriptionHandler, TxnId};
    use eventide_core::stream::StreamId;
    use eventide_core::version::Version;
    use std::future::Future;
    use std::pin::Pin;

    #[derive(Default)]
    struct NullLog;

    impl EventLog for NullLog {
        fn append(
            &self,
            _stream_id: StreamId,
            _txn_id: TxnId,
            _expected_version: Version,
            _events: Vec<eventide_core::event::EventData>,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, LogError>> + Send + '_>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn read(
            &self,
            _stream_id: StreamId,
            _start_version: Option<Version>,
            _limit: Option<usize>,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, LogError>> + Send + '_>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn subscribe(
            &self,
            _subscriber_name: String,
            _handler: SubscriptionHandler,
            _options: SubscribeOptions,
        ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }

        fn save_snapshot(
            &self,
            _stream_id: StreamId,
            _snapshot: Snapshot,
        ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }

        fn get_snapshot(
            &self,
            _stream_id: StreamId,
        ) -> Pin<Box<dyn Future<Output = Result<Option<Snapshot>, LogError>> + Send + '_>> {
            Box::pin(async { Ok(None) })
        }
    }

    #[tokio::test]
    async fn start_then_stop_flips_running_flag() {
        let app = start_application("shop", Registry::new(), Arc::new(NullLog))
            .await
            .expect("starts");
        assert!(app.is_running());
        stop_application(&app);
        assert!(!app.is_running());
    }
}
