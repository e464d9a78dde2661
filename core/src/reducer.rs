//! The default event reducer: a recursive deep merge.
//!
//! For mapping values, keys merge recursively; for every other value
//! (including sequences), the event's value replaces the prior state's
//! value outright. Per-event overrides registered in
//! [`crate::registry::Registry::register_event_reducer`] preempt this
//! default entirely (they are not combined with it).

use serde_json::{Map, Value};

/// Fold `event_data` into `state` using the deep-merge default.
#[must_use]
pub fn deep_merge(state: &Value, event_data: &Value) -> Value {
    match (state, event_data) {
        (Value::Object(base), Value::Object(incoming)) => {
            let mut merged = base.clone();
            merge_object(&mut merged, incoming);
            Value::Object(merged)
        }
        _ => event_data.clone(),
    }
}

fn merge_object(base: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, incoming_value) in incoming {
        match base.get(key) {
            Some(Value::Object(existing)) if incoming_value.is_object() => {
                let mut merged = existing.clone();
                if let Value::Object(incoming_nested) = incoming_value {
                    merge_object(&mut merged, incoming_nested);
                }
                base.insert(key.clone(), Value::Object(merged));
            }
            _ => {
                base.insert(key.clone(), incoming_value.clone());
            }
        }
    }
}
