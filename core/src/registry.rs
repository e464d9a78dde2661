//! The Registry: a catalogue of aggregate/command/event/subscription
//! configurations plus the per-event reducer map.
//!
//! Rather than a process-wide `static`, the registry is an explicit
//! container constructed before the application starts and passed by
//! reference into every layer above it. This keeps the runtime testable:
//! tests build their own `Registry` rather than reaching into global state.

use crate::log::StartFrom;
use crate::pipeline::Interceptor;
use crate::reducer::deep_merge;
use crate::stream::StreamId;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A schema validator capability: `validate(value) -> ok | explanation`.
/// The data-shape validation machinery itself is out of scope; this crate
/// only defines the capability contract and a permissive default.
pub trait SchemaValidator: Send + Sync {
    /// Validate `value`, returning an explanation payload on failure.
    fn validate(&self, value: &Value) -> Result<(), Value>;
}

/// A reference-counted, shareable schema validator.
pub type SchemaRef = Arc<dyn SchemaValidator>;

/// A schema validator that accepts every value. The default when a
/// configuration omits an explicit schema reference.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysValid;

impl SchemaValidator for AlwaysValid {
    fn validate(&self, _value: &Value) -> Result<(), Value> {
        Ok(())
    }
}

/// A per-event-name reducer function: `(aggregate-state, event-data) -> aggregate-state`.
pub type ReducerFn = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// What a command handler returns before the Event Model normalizes it:
/// nothing, a single `(name, data)` pair, or a sequence of pairs.
#[derive(Clone, Debug, PartialEq)]
pub enum HandlerOutput {
    /// The handler chose to emit no events (a no-op command).
    None,
    /// A single event.
    One(String, Value),
    /// Multiple events, in emission order.
    Many(Vec<(String, Value)>),
}

/// A command's handler: `(state, command-data) -> events`.
///
/// Must be deterministic and free of side effects; enrichment belongs in
/// interceptors.
pub type HandlerFn = Arc<dyn Fn(&Value, &Value) -> Result<HandlerOutput, Value> + Send + Sync>;

/// A subscription's handler: invoked with an event's payload, returning an
/// explanation payload on failure (caught and logged, not retried).
pub type SubscriptionHandlerFn =
    Arc<dyn Fn(&Value) -> Pin<Box<dyn Future<Output = Result<(), Value>> + Send>> + Send + Sync>;

/// Aggregate configuration: name, id-field, schema, snapshot flag.
#[derive(Clone)]
pub struct AggregateConfig {
    /// The aggregate's symbolic name.
    pub name: String,
    /// The attribute name used to extract the id from command data and
    /// resulting state.
    pub id_field: String,
    /// Schema reference validating the folded aggregate state.
    pub schema: SchemaRef,
    /// Whether this aggregate's rehydration may start from a snapshot.
    pub snapshot: bool,
    /// Free-form documentation.
    pub doc: Option<String>,
}

impl AggregateConfig {
    /// Construct an aggregate configuration with a permissive schema and no
    /// snapshotting.
    #[must_use]
    pub fn new(name: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: id_field.into(),
            schema: Arc::new(AlwaysValid),
            snapshot: false,
            doc: None,
        }
    }

    /// Override the schema validator.
    #[must_use]
    pub fn with_schema(mut self, schema: SchemaRef) -> Self {
        self.schema = schema;
        self
    }

    /// Enable snapshotting for this aggregate.
    #[must_use]
    pub const fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = snapshot;
        self
    }
}

/// Command configuration: name, target aggregate, schema, interceptors,
/// emitted event names, handler.
#[derive(Clone)]
pub struct CommandConfig {
    /// The command's symbolic name.
    pub name: String,
    /// The aggregate this command targets.
    pub aggregate_name: String,
    /// The attribute name used to extract the aggregate id from command
    /// data; inherited from the aggregate if unspecified at registration.
    pub id_field: String,
    /// Schema reference validating the command's input.
    pub schema: SchemaRef,
    /// User interceptors, in declared `enter` order.
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    /// The names of events this command may emit.
    pub emits: Vec<String>,
    /// The command's handler function.
    pub handler: HandlerFn,
}

/// Event configuration: name, originating command, schema, and the
/// subscriptions registered against it.
#[derive(Clone)]
pub struct EventConfig {
    /// The event's symbolic name.
    pub name: String,
    /// The command that produces this event.
    pub command_name: String,
    /// Schema reference validating the event's data.
    pub schema: SchemaRef,
    /// Subscriptions registered for this event, keyed by subscriber name.
    pub subscriptions: HashMap<String, SubscriptionConfig>,
}

/// Subscription configuration: subscriber name, starting position,
/// handler, optional stream filter.
#[derive(Clone)]
pub struct SubscriptionConfig {
    /// The durable cursor id used by the Event Log.
    pub subscriber_name: String,
    /// The event name this subscriber filters for when reading the
    /// all-events fan-out.
    pub event_name: String,
    /// Where the cursor should start if this is a new subscription.
    pub start_from: StartFrom,
    /// The subscriber's handler.
    pub handler: SubscriptionHandlerFn,
    /// A specific aggregate stream to read instead of the global
    /// all-events fan-out (`None` is the default).
    pub stream_filter: Option<StreamId>,
}

/// A command configuration joined with its target aggregate's
/// configuration.
#[derive(Clone)]
pub struct ResolvedCommand {
    /// The command configuration.
    pub command: CommandConfig,
    /// The inlined target aggregate configuration.
    pub aggregate: AggregateConfig,
}

/// An event configuration joined with its originating command's
/// configuration.
#[derive(Clone)]
pub struct ResolvedEvent {
    /// The event configuration.
    pub event: EventConfig,
    /// The inlined originating command configuration.
    pub command: CommandConfig,
}

/// The in-memory catalogue of aggregate/command/event/subscription
/// configurations, plus the event-reducer map.
///
/// Constructed before the application starts and treated as immutable
/// thereafter; registration races are avoided by convention, not locking.
#[derive(Default)]
pub struct Registry {
    aggregates: HashMap<String, AggregateConfig>,
    commands: HashMap<String, CommandConfig>,
    events: HashMap<String, EventConfig>,
    reducers: HashMap<String, ReducerFn>,
}

impl Registry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an aggregate configuration.
    pub fn define_aggregate(&mut self, config: AggregateConfig) {
        self.aggregates.insert(config.name.clone(), config);
    }

    /// Register a command configuration.
    pub fn define_command(&mut self, config: CommandConfig) {
        self.commands.insert(config.name.clone(), config);
    }

    /// Register an event configuration.
    pub fn define_event(&mut self, config: EventConfig) {
        self.events.insert(config.name.clone(), config);
    }

    /// Register a subscription against an already-registered event.
    ///
    /// Multiple registrations under the same `subscriber_name` for the same
    /// event are permitted: the later registration simply replaces the
    /// earlier one in this table, and the subscription runner's
    /// consumer-group creation is itself idempotent.
    pub fn define_subscription(&mut self, event_name: &str, subscription: SubscriptionConfig) {
        if let Some(event) = self.events.get_mut(event_name) {
            event
                .subscriptions
                .insert(subscription.subscriber_name.clone(), subscription);
        }
    }

    /// Register an override reducer for `event_name`, preempting the
    /// default deep merge.
    pub fn register_event_reducer(&mut self, event_name: impl Into<String>, reducer: ReducerFn) {
        self.reducers.insert(event_name.into(), reducer);
    }

    /// Look up an aggregate configuration by name.
    #[must_use]
    pub fn aggregate(&self, name: &str) -> Option<&AggregateConfig> {
        self.aggregates.get(name)
    }

    /// Look up a command configuration joined with its target aggregate.
    #[must_use]
    pub fn command(&self, name: &str) -> Option<ResolvedCommand> {
        let command = self.commands.get(name)?.clone();
        let aggregate = self.aggregates.get(&command.aggregate_name)?.clone();
        Some(ResolvedCommand { command, aggregate })
    }

    /// Look up an event configuration joined with its originating command.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<ResolvedEvent> {
        let event = self.events.get(name)?.clone();
        let command = self.commands.get(&event.command_name)?.clone();
        Some(ResolvedEvent { event, command })
    }

    /// The reducer registered for `event_name`, or the default deep merge.
    #[must_use]
    pub fn reducer_for(&self, event_name: &str) -> ReducerFn {
        self.reducers
            .get(event_name)
            .cloned()
            .unwrap_or_else(|| Arc::new(deep_merge))
    }

    /// Every `(event_name, SubscriptionConfig)` pair across the registry, in
    /// no particular order, for the subscription runner to attach at start.
    pub fn subscriptions(&self) -> impl Iterator<Item = (&str, &SubscriptionConfig)> {
        self.events.values().flat_map(|event| {
            event
                .subscriptions
                .values()
                .map(move |sub| (event.name.as_str(), sub))
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests assert on resolved lookups directly
mod tests {
    use super::*;
    use serde_json::json;

    fn no_op_handler() -> HandlerFn {
        Arc::new(|_state, _data| Ok(HandlerOutput::None))
    }

    #[test]
    fn define_and_resolve_command_joins_aggregate() {
        let mut registry = Registry::new();
        registry.define_aggregate(AggregateConfig::new("bank-account", "account_id"));
        registry.define_command(CommandConfig {
            name: "open-account".to_string(),
            aggregate_name: "bank-account".to_string(),
            id_field: "account_id".to_string(),
            schema: Arc::new(AlwaysValid),
            interceptors: Vec::new(),
            emits: vec!["account-opened".to_string()],
            handler: no_op_handler(),
        });

        let resolved = registry.command("open-account").expect("command exists");
        assert_eq!(resolved.aggregate.name, "bank-account");
        assert_eq!(resolved.command.id_field, "account_id");
    }

    #[test]
    fn unknown_command_resolves_to_none() {
        let registry = Registry::new();
        assert!(registry.command("nope").is_none());
    }

    #[test]
    fn reducer_for_falls_back_to_deep_merge() {
        let registry = Registry::new();
        let reducer = registry.reducer_for("money-deposited");
        let merged = reducer(&json!({"balance": 0.0}), &json!({"balance": 25.17}));
        assert_eq!(merged, json!({"balance": 25.17}));
    }

    #[test]
    fn reducer_for_prefers_registered_override() {
        let mut registry = Registry::new();
        registry.register_event_reducer(
            "money-deposited",
            Arc::new(|state, event| {
                let balance = state.get("balance").and_then(Value::as_f64).unwrap_or(0.0);
                let amount = event.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
                json!({"balance": balance + amount})
            }),
        );
        let reducer = registry.reducer_for("money-deposited");
        let merged = reducer(&json!({"balance": 10.0}), &json!({"amount": 5.0}));
        assert_eq!(merged, json!({"balance": 15.0}));
    }
}
