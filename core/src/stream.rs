//! Event stream identification.
//!
//! A [`StreamId`] names the ordered sequence of events belonging to one
//! aggregate instance. Stream IDs in this crate are always constructed by
//! [`crate::event_model::stream_id`] from an application name, aggregate
//! name, and aggregate id; callers outside that function should treat
//! `StreamId` as opaque.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an event stream (one aggregate instance).
///
/// # Examples
///
/// ```
/// use eventide_core::stream::StreamId;
///
/// let stream_id = StreamId::new("shop:bank-account:acct-1");
/// assert_eq!(stream_id.as_str(), "shop:bank-account:acct-1");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// Create a new `StreamId` from an already-formatted string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the stream ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `StreamId` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_stream_id() {
        let id = StreamId::new("app:agg:123");
        assert_eq!(id.as_str(), "app:agg:123");
    }

    #[test]
    fn from_string() {
        let id = StreamId::from("app:agg:123");
        assert_eq!(id.as_str(), "app:agg:123");

        let id2 = StreamId::from("app:agg:456".to_string());
        assert_eq!(id2.as_str(), "app:agg:456");
    }

    #[test]
    fn display() {
        let id = StreamId::new("app:agg:123");
        assert_eq!(format!("{id}"), "app:agg:123");
    }

    #[test]
    fn equality() {
        let id1 = StreamId::new("app:agg:123");
        let id2 = StreamId::new("app:agg:123");
        let id3 = StreamId::new("app:agg:456");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn into_inner() {
        let id = StreamId::new("app:agg:123");
        let string = id.into_inner();
        assert_eq!(string, "app:agg:123");
    }
}
