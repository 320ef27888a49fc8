//! Typed errors for the feature data access layer
//!
//! Most plumbing in this crate propagates `anyhow` results; the variants
//! below are the conditions callers are expected to react to, and they
//! survive the `anyhow` boundary via `Error::downcast_ref::<FeatureDbError>`.

/// Errors callers must be able to distinguish
#[derive(Debug, thiserror::Error)]
pub enum FeatureDbError {
    /// Selection or request binds more SQL parameters than the store allows.
    /// Recoverable: re-issue a smaller selection. The active cache has been
    /// cleared when this is returned from a selection change.
    #[error("selection of {requested} items needs {params} query parameters, limit is {limit}")]
    CapacityExceeded {
        requested: usize,
        params: usize,
        limit: usize,
    },

    /// Binary blob length is not an exact multiple of the record size.
    /// Fatal for the record; the surrounding fetch is aborted.
    #[error("binary record truncated: {len} bytes is not a multiple of the {record_size}-byte record")]
    TruncatedRecord { len: usize, record_size: usize },

    /// A sorted-order or block-structure assumption did not hold. Indicates
    /// a logic bug or corrupted store, never ordinary data sparsity.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl FeatureDbError {
    /// True when the caller can recover by shrinking the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FeatureDbError::CapacityExceeded { .. })
    }
}
