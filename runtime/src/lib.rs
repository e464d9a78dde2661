//! # Eventide Runtime
//!
//! The event-sourcing runtime: resolves commands against a [`Registry`],
//! rehydrates aggregates by folding their event streams, runs the command
//! pipeline's interceptor chain, and attaches subscriptions to an
//! [`eventide_core::log::EventLog`] when an application starts.
//!
//! ## Core Components
//!
//! - [`app`]: `start_application`/`stop_application` lifecycle, owning the
//!   registry and event log an application dispatches against.
//! - [`dispatcher`]: the `dispatch`/`get_aggregate` entry points.
//! - [`pipeline`]: the command pipeline's interceptor chain executor.
//! - [`rehydrator`]: folds an aggregate's stream into its current state.
//! - [`subscription`]: attaches registered subscriptions at application
//!   start.
//! - [`config`]: `event-store.*` configuration recognized by `start_application`.
//! - [`error`]: the runtime's error taxonomy.
//! - [`metrics`]: Prometheus counters/histograms for the dispatch, append,
//!   and subscription hot paths.
//!
//! ## Example
//!
//! ```ignore
//! use eventide_runtime::app::start_application;
//! use eventide_runtime::dispatcher::dispatch;
//! use eventide_core::registry::Registry;
//!
//! let registry = Registry::new();
//! // ... define_aggregate / define_command / define_event ...
//! let app = start_application("shop", registry, event_log).await?;
//! let events = dispatch(&app, "open-account", serde_json::json!({"account_id": "acct-1"})).await?;
//! ```

pub mod app;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod rehydrator;
pub mod subscription;
