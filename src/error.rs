use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced directly to callers of [`crate::Log`].
#[derive(Error, Debug)]
pub enum LogError {
    #[error("unknown log level: {0}")]
    UnknownLevel(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{transport} transport: '{option}' option is required")]
    MissingOption {
        transport: &'static str,
        option: &'static str,
    },

    #[error("{transport} transport: {reason}")]
    InvalidOption {
        transport: &'static str,
        reason: String,
    },

    /// The transport's asynchronous initialization failed; every write
    /// queued behind the readiness gate observes the same failure.
    #[error("transport initialization failed: {0}")]
    Init(Arc<TransportError>),

    #[error("{0} transport is closed")]
    Closed(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failure reported by a backing-store client behind one of the
    /// [`crate::port`] traits.
    #[error("backend error: {0}")]
    Backend(anyhow::Error),
}
