//! An in-memory [`EventLog`] for unit and integration tests.
//!
//! There is no teacher precedent for this exact shape (the production
//! adapter lives in `eventide-redis`), but the append/read/subscribe
//! contract it satisfies is the same one [`EventLog`] defines, so tests
//! written against this log exercise real dispatcher and rehydrator code
//! paths without a Redis instance.

use eventide_core::event::{EventData, EventMeta, RecordedEvent};
use eventide_core::log::{
    EventLog, LogError, Snapshot, StartFrom, SubscribeOptions, SubscriptionHandler, TxnId,
};
use eventide_core::stream::StreamId;
use eventide_core::version::Version;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::clock::{Clock, SystemClock};

#[derive(Default)]
struct StreamEntry {
    events: Vec<RecordedEvent>,
    last_txn_id: Option<TxnId>,
    last_txn_events: Vec<RecordedEvent>,
}

impl StreamEntry {
    fn current_version(&self) -> Version {
        self.events
            .last()
            .map_or(Version::INITIAL, |e| e.meta.version)
    }
}

struct SubscriberEntry {
    handler: SubscriptionHandler,
    stream_filter: Option<String>,
}

#[derive(Default)]
struct Inner {
    streams: HashMap<String, StreamEntry>,
    all_events: Vec<(String, RecordedEvent)>,
    snapshots: HashMap<String, Snapshot>,
    subscribers: HashMap<String, SubscriberEntry>,
}

/// An [`EventLog`] backed entirely by in-process memory.
///
/// Every stream, subscription cursor, and snapshot lives only as long as
/// this value does; nothing survives a process restart, which is the
/// point: tests want a clean log every run, not state left over from the
/// last one.
pub struct InMemoryEventLog {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventLog {
    /// Construct an empty log using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Construct an empty log stamping events using `clock` (a
    /// [`crate::clock::FixedClock`] for deterministic assertions).
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl EventLog for InMemoryEventLog {
    fn append(
        &self,
        stream_id: StreamId,
        txn_id: TxnId,
        expected_version: Version,
        events: Vec<EventData>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, LogError>> + Send + '_>> {
        Box::pin(async move {
            let ts = self.clock.now();
            let key = stream_id.as_str().to_string();

            // Compute the append (or detect the idempotent replay / conflict)
            // and snapshot the subscribers to notify, then drop the lock
            // before calling into any handler.
            let (recorded, to_notify) = {
                let mut inner = self.lock();
                let entry = inner.streams.entry(key.clone()).or_default();

                if entry.last_txn_id.as_ref() == Some(&txn_id) {
                    return Ok(entry.last_txn_events.clone());
                }

                let current_version = entry.current_version();
                if current_version != expected_version {
                    return Err(LogError::ConcurrencyError {
                        stream_id,
                        expected: expected_version,
                        actual: current_version,
                    });
                }

                let base = current_version.next_base().base();
                let recorded: Vec<RecordedEvent> = events
                    .into_iter()
                    .enumerate()
                    .map(|(batch, event)| {
                        RecordedEvent::new(
                            event,
                            EventMeta::new(ts, Version::new(base, batch as u32)),
                        )
                    })
                    .collect();

                entry.events.extend(recorded.iter().cloned());
                entry.last_txn_id = Some(txn_id);
                entry.last_txn_events = recorded.clone();

                for event in &recorded {
                    inner.all_events.push((key.clone(), event.clone()));
                }

                let to_notify: Vec<SubscriptionHandler> = inner
                    .subscribers
                    .values()
                    .filter(|sub| sub.stream_filter.as_deref().is_none_or(|s| s == key))
                    .map(|sub| sub.handler.clone())
                    .collect();

                (recorded, to_notify)
            };

            for handler in to_notify {
                for event in &recorded {
                    handler(event.clone()).await;
                }
            }

            Ok(recorded)
        })
    }

    fn read(
        &self,
        stream_id: StreamId,
        start_version: Option<Version>,
        limit: Option<usize>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RecordedEvent>, LogError>> + Send + '_>> {
        let start_version = start_version.unwrap_or(Version::INITIAL);
        Box::pin(async move {
            let inner = self.lock();
            let events = inner
                .streams
                .get(stream_id.as_str())
                .map(|entry| {
                    entry
                        .events
                        .iter()
                        .filter(|e| e.meta.version > start_version)
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let events = match limit {
                Some(limit) => events.into_iter().take(limit).collect(),
                None => events,
            };
            Ok(events)
        })
    }

    fn subscribe(
        &self,
        subscriber_name: String,
        handler: SubscriptionHandler,
        options: SubscribeOptions,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>> {
        Box::pin(async move {
            let filter = options.stream_id.as_ref().map(|s| s.as_str().to_string());

            let backlog: Vec<RecordedEvent> = {
                let inner = self.lock();
                if inner.subscribers.contains_key(&subscriber_name) {
                    Vec::new()
                } else {
                    match options.start_from {
                        StartFrom::Latest => Vec::new(),
                        StartFrom::Origin => match &filter {
                            Some(stream) => inner
                                .streams
                                .get(stream.as_str())
                                .map(|e| e.events.clone())
                                .unwrap_or_default(),
                            None => inner
                                .all_events
                                .iter()
                                .map(|(_, event)| event.clone())
                                .collect(),
                        },
                    }
                }
            };

            for event in &backlog {
                handler(event.clone()).await;
            }

            self.lock()
                .subscribers
                .entry(subscriber_name)
                .or_insert_with(|| SubscriberEntry {
                    handler,
                    stream_filter: filter,
                });

            Ok(())
        })
    }

    fn save_snapshot(
        &self,
        stream_id: StreamId,
        snapshot: Snapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogError>> + Send + '_>> {
        Box::pin(async move {
            self.lock()
                .snapshots
                .insert(stream_id.into_inner(), snapshot);
            Ok(())
        })
    }

    fn get_snapshot(
        &self,
        stream_id: StreamId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Snapshot>, LogError>> + Send + '_>> {
        Box::pin(async move { Ok(self.lock().snapshots.get(stream_id.as_str()).cloned()) })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests fail loudly on unexpected append/read/subscribe errors
mod tests {
    use super::*;
    use crate::clock::test_clock;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn append_then_read_round_trips() {
        let log = InMemoryEventLog::new();
        let stream = StreamId::new("shop:bank-account:acct-1");
        let recorded = log
            .append(
                stream.clone(),
                TxnId::new("txn-1"),
                Version::INITIAL,
                vec![EventData::new("account-opened", json!({"balance": 0.0}))],
            )
            .await
            .expect("append succeeds");
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].meta.version, Version::new(1, 0));

        let read = log.read(stream, None, None).await.expect("read succeeds");
        assert_eq!(read, recorded);
    }

    #[tokio::test]
    async fn duplicate_txn_id_is_idempotent() {
        let log = InMemoryEventLog::new();
        let stream = StreamId::new("shop:bank-account:acct-1");
        let first = log
            .append(
                stream.clone(),
                TxnId::new("txn-1"),
                Version::INITIAL,
                vec![EventData::new("account-opened", json!({}))],
            )
            .await
            .expect("first append succeeds");
        let second = log
            .append(
                stream.clone(),
                TxnId::new("txn-1"),
                Version::INITIAL,
                vec![EventData::new("account-opened", json!({}))],
            )
            .await
            .expect("second append is a no-op replay");
        assert_eq!(first, second);
        let read = log.read(stream, None, None).await.expect("read succeeds");
        assert_eq!(read.len(), 1);
    }

    #[tokio::test]
    async fn mismatched_expected_version_conflicts() {
        let log = InMemoryEventLog::new();
        let stream = StreamId::new("shop:bank-account:acct-1");
        log.append(
            stream.clone(),
            TxnId::new("txn-1"),
            Version::INITIAL,
            vec![EventData::new("account-opened", json!({}))],
        )
        .await
        .expect("first append succeeds");

        let result = log
            .append(
                stream,
                TxnId::new("txn-2"),
                Version::INITIAL,
                vec![EventData::new("money-deposited", json!({}))],
            )
            .await;
        assert!(matches!(result, Err(LogError::ConcurrencyError { .. })));
    }

    #[tokio::test]
    async fn subscribe_delivers_future_appends() {
        let log = InMemoryEventLog::new();
        let stream = StreamId::new("shop:bank-account:acct-1");
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();

        log.subscribe(
            "welcome-emailer".to_string(),
            Arc::new(move |_event| {
                let counted = counted.clone();
                Box::pin(async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                })
            }),
            SubscribeOptions::new(StartFrom::Latest),
        )
        .await
        .expect("subscribe succeeds");

        log.append(
            stream,
            TxnId::new("txn-1"),
            Version::INITIAL,
            vec![EventData::new("account-opened", json!({}))],
        )
        .await
        .expect("append succeeds");

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fixed_clock_stamps_append_timestamps() {
        let log = InMemoryEventLog::with_clock(Arc::new(test_clock()));
        let stream = StreamId::new("shop:bank-account:acct-1");
        let recorded = log
            .append(
                stream,
                TxnId::new("txn-1"),
                Version::INITIAL,
                vec![EventData::new("account-opened", json!({}))],
            )
            .await
            .expect("append succeeds");
        assert_eq!(recorded[0].meta.ts, test_clock().now());
    }
}
