//! The Subscription Runner: attaches every registered subscription
//! to the Event Log when an application starts.
//!
//! The polling loop, consumer-group bookkeeping, and bounded worker pool all
//! live inside the Event Log backend; this module's job is just to
//! wrap each subscription's handler with event-name filtering (the backend
//! fans out every event on the stream it reads) and hand it to
//! [`EventLog::subscribe`].

use crate::error::RuntimeError;
use crate::metrics::SubscriptionMetrics;
use eventide_core::event::RecordedEvent;
use eventide_core::log::{EventLog, SubscribeOptions, SubscriptionHandler};
use eventide_core::registry::Registry;
use std::sync::Arc;

/// Attaches every `(event-name, subscription)` pair in `registry` to
/// `event_log`.
///
/// Returns once every subscription has been registered with the backend;
/// delivery itself continues in the background.
///
/// # Errors
///
/// Returns [`RuntimeError::BackendError`] if any subscription fails to
/// register. Subscriptions already attached are left running.
pub async fn attach_all(
    registry: &Registry,
    event_log: &Arc<dyn EventLog>,
) -> Result<(), RuntimeError> {
    for (event_name, subscription) in registry.subscriptions() {
        let event_name = event_name.to_string();
        let handler = subscription.handler.clone();

        let wrapped: SubscriptionHandler = Arc::new(move |recorded: RecordedEvent| {
            let event_name = event_name.clone();
            let handler = handler.clone();
            Box::pin(async move {
                if recorded.event_type != event_name {
                    return;
                }
                match handler(&recorded.data).await {
                    Ok(()) => SubscriptionMetrics::record_delivery(),
                    Err(explain) => {
                        SubscriptionMetrics::record_handler_error();
                        tracing::warn!(
                            event = %recorded.event_type,
                            ?explain,
                            "subscription handler failed; event acknowledged regardless"
                        );
                    }
                }
            })
        });

        let mut options = SubscribeOptions::new(subscription.start_from);
        if let Some(stream_id) = subscription.stream_filter.clone() {
            options = options.on_stream(stream_id);
        }

        event_log
            .subscribe(subscription.subscriber_name.clone(), wrapped, options)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests assert the attach call succeeds
mod tests {
    use super::*;
    use eventide_core::event::{EventData, EventMeta};
    use eventide_core::log::{LogError, Snapshot, StartFrom};
    use eventide_core::registry::SubscriptionConfig;
    use eventide_core::stream::StreamId;
    use eventide_core::version::Version;
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLog {
        registered: Mutex<Vec<String>>,
    }

    impl EventLog for RecordingLog {
        fn append(
            &self,
            _stream_id: StreamId,
            _txn_id: eventide_core::log::TxnId,
            _expected_version: Version,
            _events: Vec<EventData>,
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
            subscriber_name: String,
            handler: SubscriptionHandler,
            _options: SubscribeOptions,
        ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>> {
            self.registered
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(subscriber_name);
            Box::pin(async move {
                handler(RecordedEvent::new(
                    EventData::new("account-opened", json!({})),
                    EventMeta::new(chrono::Utc::now(), Version::new(1, 0)),
                ))
                .await;
                Ok(())
            })
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
    async fn attaches_every_registered_subscription() {
        let mut registry = Registry::new();
        registry.define_event(eventide_core::registry::EventConfig {
            name: "account-opened".to_string(),
            command_name: "open-account".to_string(),
            schema: Arc::new(eventide_core::registry::AlwaysValid),
            subscriptions: std::collections::HashMap::new(),
        });

        let invocations = Arc::new(AtomicUsize::new(0));
        let counted = invocations.clone();
        registry.define_subscription(
            "account-opened",
            SubscriptionConfig {
                subscriber_name: "welcome-emailer".to_string(),
                event_name: "account-opened".to_string(),
                start_from: StartFrom::Origin,
                handler: Arc::new(move |_data| {
                    let counted = counted.clone();
                    Box::pin(async move {
                        counted.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
                stream_filter: None,
            },
        );

        let log: Arc<dyn EventLog> = Arc::new(RecordingLog::default());
        attach_all(&registry, &log).await.expect("attach succeeds");

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }
}
