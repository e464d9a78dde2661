//! # Eventide Testing
//!
//! In-memory [`eventide_core::log::EventLog`] and deterministic clock for
//! testing eventide applications without a Redis instance.
//!
//! ## Example
//!
//! ```
//! use eventide_testing::log::InMemoryEventLog;
//! use std::sync::Arc;
//!
//! let log: Arc<dyn eventide_core::log::EventLog> = Arc::new(InMemoryEventLog::new());
//! ```

pub mod clock;
pub mod log;

pub use clock::{test_clock, FixedClock};
pub use log::InMemoryEventLog;
