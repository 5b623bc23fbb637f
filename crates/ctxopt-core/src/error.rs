//! Error types for ctxopt-core.
//!
//! Uses a hierarchical error enum so callers can pattern-match on
//! the subsystem that failed. Validation errors and index
//! inconsistencies are raised immediately, compression errors are
//! recovered locally by the orchestrator, and embedding/cancellation
//! errors propagate unchanged.

use thiserror::Error;

/// Top-level error type for all ctxopt-core operations.
#[derive(Debug, Error)]
pub enum OmniError {
    /// Malformed input: empty content, missing id, wrong embedding
    /// dimension, negative budget, and similar caller mistakes.
    #[error("validation error: {details}")]
    Validation {
        /// What's wrong with the input.
        details: String,
    },

    /// The embedding collaborator failed. Never raised by the core itself.
    #[error("embedding error: {details}")]
    Embedding {
        /// Human-readable error description from the collaborator.
        details: String,
    },

    /// Inconsistency detected by the vector index (duplicate id in a
    /// batch, corrupt counters).
    #[error("index error: {details}")]
    Index {
        /// Diagnostic details.
        details: String,
    },

    /// Arithmetic safety failure in the relevance scorer. Never expected
    /// in practice; kept as a defensive category so scoring bugs surface
    /// as typed errors instead of silent NaNs.
    #[error("scoring error: {details}")]
    Scoring {
        /// Diagnostic details.
        details: String,
    },

    /// Unreachable under the selector's invariants. Retained so the
    /// selector cannot mask a bug by silently returning an empty
    /// selection when candidates exist.
    #[error("selection error: {details}")]
    Selection {
        /// Diagnostic details.
        details: String,
    },

    /// A single chunk failed to compress. The orchestrator recovers by
    /// emitting that chunk uncompressed; this variant exists for callers
    /// that want to observe the degraded path.
    #[error("compression error for chunk {chunk_id}: {details}")]
    Compression {
        /// Id of the chunk that failed to compress.
        chunk_id: String,
        /// Diagnostic details.
        details: String,
    },

    /// Cooperative cancellation was observed. No partial result is
    /// returned alongside this error.
    #[error("operation cancelled")]
    Cancelled,

    /// Serialization/deserialization of a metrics snapshot failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results in ctxopt-core.
pub type OmniResult<T> = Result<T, OmniError>;
