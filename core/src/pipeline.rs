//! The interceptor chain and the context threaded through it.
//!
//! The command pipeline that drives this chain lives in
//! `eventide-runtime::pipeline`; the trait and context type live here so
//! that [`crate::registry::CommandConfig`] can hold a command's registered
//! interceptors without the core crate depending on the runtime crate.

use crate::event::{EventData, EventMeta};
use crate::log::EventLog;
use crate::registry::CommandConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The mutable-looking context threaded through a command's interceptor
/// chain: `{command-conf, command-data, state, events, meta, event-store-client}`.
pub struct Context {
    /// The resolved configuration for the command being executed.
    pub command_config: CommandConfig,
    /// The raw input data the caller supplied to `dispatch`.
    pub command_data: Value,
    /// Aggregate state, keyed by aggregate name. The context interceptor
    /// places the target aggregate's rehydrated state here under its own
    /// name.
    pub state: HashMap<String, Value>,
    /// Events produced by the handler interceptor, pending validation and
    /// append.
    pub events: Vec<EventData>,
    /// Rehydration metadata, keyed by aggregate name.
    pub meta: HashMap<String, EventMeta>,
    /// The running application's event log, available to interceptors that
    /// need to read other streams.
    pub event_log: Arc<dyn EventLog>,
}

impl Context {
    /// Construct a fresh context before the context interceptor has run.
    #[must_use]
    pub fn new(command_config: CommandConfig, command_data: Value, event_log: Arc<dyn EventLog>) -> Self {
        Self {
            command_config,
            command_data,
            state: HashMap::new(),
            events: Vec::new(),
            meta: HashMap::new(),
            event_log,
        }
    }
}

/// A boxed future returned from an interceptor phase.
pub type InterceptorFuture<'a> = Pin<Box<dyn Future<Output = Result<Context, Value>> + Send + 'a>>;

/// An `{enter, leave}` capability pair wrapping command execution.
///
/// Both phases default to a no-op pass-through; implementors override
/// whichever phase they enrich. Enter phases run in declared order; leave
/// phases run in reverse.
pub trait Interceptor: Send + Sync {
    /// Runs before the handler. Enrich `ctx.state` or other top-level
    /// fields; side-effectful reads (fetching reference data, another
    /// aggregate) belong here rather than in the handler.
    fn enter(&self, ctx: Context) -> InterceptorFuture<'_> {
        Box::pin(async move { Ok(ctx) })
    }

    /// Runs after the handler, in reverse declared order.
    fn leave(&self, ctx: Context) -> InterceptorFuture<'_> {
        Box::pin(async move { Ok(ctx) })
    }
}
