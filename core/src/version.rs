//! Stream version numbers for optimistic concurrency control.
//!
//! A [`Version`] identifies a single event's position within an aggregate
//! stream. Versions are a `(base, batch)` pair: `base` increments by one
//! per append call, and `batch` is the zero-based index of the event
//! within that append. N events appended together share a `base` and
//! occupy `batch` values `0..N`. The pair renders on the wire as
//! `"<base>-<batch>"`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a version string does not parse as `"<base>-<batch>"`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version string: {0}")]
pub struct ParseVersionError(String);

/// Total order over a single aggregate stream.
///
/// # Examples
///
/// ```
/// use eventide_core::version::Version;
///
/// let v = Version::INITIAL.next_base();
/// assert_eq!(v.to_string(), "1-0");
/// assert_eq!(v.batch(1).to_string(), "1-1");
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    base: u64,
    batch: u32,
}

impl Version {
    /// The version denoting "no events yet".
    pub const INITIAL: Self = Self { base: 0, batch: 0 };

    /// Construct a version directly from its `(base, batch)` components.
    #[must_use]
    pub const fn new(base: u64, batch: u32) -> Self {
        Self { base, batch }
    }

    /// The `base` component: the append attempt this version belongs to.
    #[must_use]
    pub const fn base(self) -> u64 {
        self.base
    }

    /// The `batch` component: this event's position within its append.
    #[must_use]
    pub const fn batch_index(self) -> u32 {
        self.batch
    }

    /// The version one append ahead of this one, at `batch` 0.
    ///
    /// Used to derive the `base` a new append should claim from the
    /// stream's `current-version`.
    #[must_use]
    pub const fn next_base(self) -> Self {
        Self {
            base: self.base + 1,
            batch: 0,
        }
    }

    /// This version's `base` with a different `batch` index.
    #[must_use]
    pub const fn batch(self, batch: u32) -> Self {
        Self {
            base: self.base,
            batch,
        }
    }

    /// Whether this is [`Version::INITIAL`].
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.base == 0 && self.batch == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.batch)
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base_str, batch_str) = s
            .split_once('-')
            .ok_or_else(|| ParseVersionError(s.to_string()))?;
        let base = base_str
            .parse::<u64>()
            .map_err(|_| ParseVersionError(s.to_string()))?;
        let batch = batch_str
            .parse::<u32>()
            .map_err(|_| ParseVersionError(s.to_string()))?;
        Ok(Self { base, batch })
    }
}
