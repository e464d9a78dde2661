//! Bank account domain: the aggregate, commands, events, and reducers used
//! to exercise the eventide runtime end to end, built around the dynamic
//! [`Registry`] rather than compile-time macro-generated reducers.

use eventide_core::registry::{
    AggregateConfig, CommandConfig, EventConfig, HandlerOutput, Registry, SchemaValidator,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// The aggregate's symbolic name.
pub const AGGREGATE: &str = "bank-account";
/// The command-data/aggregate-state attribute holding the account id.
pub const ID_FIELD: &str = "account_id";

/// Generate a fresh, unique account id.
///
/// Account ids are caller-supplied (the dispatcher extracts the aggregate id
/// from `command_data` before the handler ever runs), so "open an account"
/// call sites generate the id themselves, the same way `TxnId::generate`
/// mints a fresh idempotency key.
#[must_use]
pub fn new_account_id() -> String {
    format!("acct-{:016x}", rand::random::<u64>())
}

/// Rejects a folded balance below zero: the aggregate schema that blocks
/// an over-withdrawal from ever reaching the log.
#[derive(Debug, Default, Clone, Copy)]
struct NonNegativeBalance;

impl SchemaValidator for NonNegativeBalance {
    fn validate(&self, value: &Value) -> Result<(), Value> {
        match value.get("balance").and_then(Value::as_f64) {
            Some(balance) if balance < 0.0 => Err(json!({
                "error": "balance would go negative",
                "balance": balance,
            })),
            _ => Ok(()),
        }
    }
}

fn account_opened_handler() -> eventide_core::registry::HandlerFn {
    Arc::new(|_state, data| {
        let account_id = data.get(ID_FIELD).cloned().unwrap_or(Value::Null);
        let account_type = data
            .get("account_type")
            .cloned()
            .unwrap_or(Value::String("checking".to_string()));
        Ok(HandlerOutput::One(
            "account-opened".to_string(),
            json!({
                ID_FIELD: account_id,
                "account_type": account_type,
                "balance": 0.0,
            }),
        ))
    })
}

fn deposit_money_handler() -> eventide_core::registry::HandlerFn {
    Arc::new(|_state, data| {
        let amount = data.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
        Ok(HandlerOutput::One(
            "money-deposited".to_string(),
            json!({"amount": amount}),
        ))
    })
}

fn withdraw_money_handler() -> eventide_core::registry::HandlerFn {
    Arc::new(|_state, data| {
        let amount = data.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
        Ok(HandlerOutput::One(
            "money-withdrawn".to_string(),
            json!({"amount": amount}),
        ))
    })
}

fn change_account_type_handler() -> eventide_core::registry::HandlerFn {
    Arc::new(|state, data| {
        let requested = data
            .get("account_type")
            .cloned()
            .unwrap_or(Value::String("checking".to_string()));
        let current = state.get("account_type").cloned().unwrap_or(Value::Null);
        if current == requested {
            return Ok(HandlerOutput::None);
        }
        Ok(HandlerOutput::One(
            "account-type-changed".to_string(),
            json!({"account_type": requested}),
        ))
    })
}

/// `money-deposited`'s reducer: `balance += amount` rather than the default
/// deep merge.
fn money_deposited_reducer() -> eventide_core::registry::ReducerFn {
    Arc::new(|state, event| {
        let balance = state.get("balance").and_then(Value::as_f64).unwrap_or(0.0);
        let amount = event.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
        let mut next = state.clone();
        next["balance"] = json!(balance + amount);
        next
    })
}

/// `money-withdrawn`'s reducer: `balance -= amount`.
fn money_withdrawn_reducer() -> eventide_core::registry::ReducerFn {
    Arc::new(|state, event| {
        let balance = state.get("balance").and_then(Value::as_f64).unwrap_or(0.0);
        let amount = event.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
        let mut next = state.clone();
        next["balance"] = json!(balance - amount);
        next
    })
}

/// Build the bank-account domain's registry: one aggregate, four commands,
/// four events, and the two custom reducers above.
///
/// Callers wanting a subscription on top attach their own handler via
/// [`Registry::define_subscription`] after calling this, since the
/// subscription handler is call-site-specific (a CLI printer, a test
/// counter, ...).
#[must_use]
pub fn registry() -> Registry {
    let mut registry = Registry::new();

    registry.define_aggregate(
        AggregateConfig::new(AGGREGATE, ID_FIELD).with_schema(Arc::new(NonNegativeBalance)),
    );

    registry.define_command(CommandConfig {
        name: "open-account".to_string(),
        aggregate_name: AGGREGATE.to_string(),
        id_field: ID_FIELD.to_string(),
        schema: Arc::new(eventide_core::registry::AlwaysValid),
        interceptors: Vec::new(),
        emits: vec!["account-opened".to_string()],
        handler: account_opened_handler(),
    });
    registry.define_event(EventConfig {
        name: "account-opened".to_string(),
        command_name: "open-account".to_string(),
        schema: Arc::new(eventide_core::registry::AlwaysValid),
        subscriptions: std::collections::HashMap::new(),
    });

    registry.define_command(CommandConfig {
        name: "deposit-money".to_string(),
        aggregate_name: AGGREGATE.to_string(),
        id_field: ID_FIELD.to_string(),
        schema: Arc::new(eventide_core::registry::AlwaysValid),
        interceptors: Vec::new(),
        emits: vec!["money-deposited".to_string()],
        handler: deposit_money_handler(),
    });
    registry.define_event(EventConfig {
        name: "money-deposited".to_string(),
        command_name: "deposit-money".to_string(),
        schema: Arc::new(eventide_core::registry::AlwaysValid),
        subscriptions: std::collections::HashMap::new(),
    });
    registry.register_event_reducer("money-deposited", money_deposited_reducer());

    registry.define_command(CommandConfig {
        name: "withdraw-money".to_string(),
        aggregate_name: AGGREGATE.to_string(),
        id_field: ID_FIELD.to_string(),
        schema: Arc::new(eventide_core::registry::AlwaysValid),
        interceptors: Vec::new(),
        emits: vec!["money-withdrawn".to_string()],
        handler: withdraw_money_handler(),
    });
    registry.define_event(EventConfig {
        name: "money-withdrawn".to_string(),
        command_name: "withdraw-money".to_string(),
        schema: Arc::new(eventide_core::registry::AlwaysValid),
        subscriptions: std::collections::HashMap::new(),
    });
    registry.register_event_reducer("money-withdrawn", money_withdrawn_reducer());

    registry.define_command(CommandConfig {
        name: "change-account-type".to_string(),
        aggregate_name: AGGREGATE.to_string(),
        id_field: ID_FIELD.to_string(),
        schema: Arc::new(eventide_core::registry::AlwaysValid),
        interceptors: Vec::new(),
        emits: vec!["account-type-changed".to_string()],
        handler: change_account_type_handler(),
    });
    registry.define_event(EventConfig {
        name: "account-type-changed".to_string(),
        command_name: "change-account-type".to_string(),
        schema: Arc::new(eventide_core::registry::AlwaysValid),
        subscriptions: std::collections::HashMap::new(),
    });

    registry
}
