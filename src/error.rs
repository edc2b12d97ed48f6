//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! Variants that can be the outcome of a shared computation are `Clone` so a
//! single flight result can be handed to every concurrent waiter; foreign
//! error sources are wrapped in `Arc` for that reason.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Malformed key or TTL (caller bug, not retried)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The application compute callback failed; surfaced as-is to every
    /// waiter of the flight, never retried by the cache
    #[error("Compute failed: {0}")]
    ComputeFailed(Arc<anyhow::Error>),

    /// A typed value could not be serialized; nothing was stored
    #[error("Serialization failed: {0}")]
    Serialization(Arc<serde_json::Error>),

    /// A stored payload could not be deserialized to the requested type;
    /// the entry is left untouched
    #[error("Deserialization failed: {0}")]
    Deserialization(Arc<serde_json::Error>),

    /// Caller-initiated abort of a pending `get_or_compute`
    #[error("Operation cancelled")]
    Cancelled,
}

// == Constructors ==
impl CacheError {
    /// Wraps an application callback error.
    pub fn compute_failed(err: anyhow::Error) -> Self {
        Self::ComputeFailed(Arc::new(err))
    }

    /// Wraps a serialization failure.
    pub fn serialization(err: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(err))
    }

    /// Wraps a deserialization failure.
    pub fn deserialization(err: serde_json::Error) -> Self {
        Self::Deserialization(Arc::new(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
