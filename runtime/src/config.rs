//! Configuration recognized by [`crate::app::start_application`].
//!
//! The runtime's configuration surface is intentionally small: it selects
//! and parameterizes the event-store backend. Everything else (registering
//! aggregates, commands, events, subscriptions) happens through the
//! [`eventide_core::registry::Registry`] directly, not through config.

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Event-store backend selection and connection options.
    pub event_store: EventStoreConfig,
}

/// `event-store.*` configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventStoreConfig {
    /// Backend selector. `"redis"` is the only value this crate ships an
    /// adapter for; other backends are interchangeable through
    /// [`eventide_core::log::EventLog`].
    #[serde(rename = "type")]
    pub backend: String,

    /// Connection pool options passed through to the backend, opaque to
    /// the runtime.
    #[serde(default)]
    pub pool: serde_json::Value,

    /// Connection spec (e.g. a URI) passed through to the backend, opaque
    /// to the runtime.
    pub spec: serde_json::Value,
}
