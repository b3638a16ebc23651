//! Error types for memkit.
//!
//! Cache operations never fail: misses are `None` and an over-limit cache is
//! an expected transient state. Errors only come from two places:
//!
//! - [`ConfigError`]: returned by [`MemoryCacheBuilder::try_build`] when a
//!   configuration cannot be honoured (zero trim interval, designated release
//!   without a context, worker thread spawn failure).
//! - [`InvariantError`]: returned by `check_invariants` methods when the
//!   index, recency list and counters disagree.
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//! use memkit::builder::MemoryCacheBuilder;
//!
//! let err = MemoryCacheBuilder::new()
//!     .auto_trim_interval(Some(Duration::ZERO))
//!     .try_build::<u64, String>()
//!     .unwrap_err();
//! assert!(err.to_string().contains("auto_trim_interval"));
//! ```
//!
//! [`MemoryCacheBuilder::try_build`]: crate::builder::MemoryCacheBuilder::try_build

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// The index, recency list and aggregates disagree.
///
/// The message names the first check that failed, e.g. a dangling link or a
/// cost total that does not match the resident entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A configuration that cannot be honoured, or a worker thread that could not
/// be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}
