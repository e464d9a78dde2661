//! # Eventide Core
//!
//! Core traits and types for the `eventide` event-sourcing runtime.
//!
//! This crate holds the parts of the system that the runtime, adapters, and
//! test doubles all share: stream identity and versioning, the dynamic
//! event model, the abstract Event Log contract, the registry, the default
//! reducer, and the interceptor-chain types the command pipeline runs.
//!
//! ## Core concepts
//!
//! - **Aggregate**: a transactionally-consistent domain entity, identified
//!   by a single id and rehydrated by folding its event stream.
//! - **Command**: a named request to mutate an aggregate.
//! - **Event**: an immutable fact produced by a command.
//! - **Registry**: the catalogue of aggregate/command/event/subscription
//!   configurations an application registers before starting.
//! - **Event Log**: the append/read/subscribe/snapshot contract a concrete
//!   backend (e.g. `eventide-redis`) implements.

pub mod event;
pub mod event_model;
pub mod log;
pub mod pipeline;
pub mod reducer;
pub mod registry;
pub mod stream;
pub mod version;
