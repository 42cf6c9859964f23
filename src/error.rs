//! Error type shared by every store operation.

use thiserror::Error;
use tracing::warn;

/// Result alias used throughout the store.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the graph store.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A referenced node or edge does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up (`"node"` or `"edge"`).
        kind: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },
    /// Malformed caller input.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The persistence collaborator failed (I/O, SQL or property encoding).
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),
    /// The store failed to load, or was used before loading.
    #[error("initialization error: {0}")]
    Initialization(String),
}

impl GraphError {
    pub(crate) fn node_not_found(id: impl Into<String>) -> Self {
        GraphError::NotFound {
            kind: "node",
            id: id.into(),
        }
    }

    pub(crate) fn edge_not_found(source: &str, target: &str) -> Self {
        GraphError::NotFound {
            kind: "edge",
            id: format!("{source}->{target}"),
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        GraphError::Validation(msg.into())
    }

    /// Returns `true` for [`GraphError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound { .. })
    }
}

pub(crate) fn log_persistence_failure(op: &str, err: &rusqlite::Error) {
    warn!(operation = op, error = %err, "persistence call failed");
}
