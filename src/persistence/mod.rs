//! Durable storage for the graph.
//!
//! The store never touches SQL directly. It hands closures to a
//! [`Persistence`] executor, which runs them against a live connection and
//! maps failures into [`GraphError::Persistence`](crate::GraphError).
//! Statements for the two graph tables live in [`rows`].

pub mod rows;
mod sqlite;

use rusqlite::Connection;

use crate::error::Result;

pub use sqlite::SqlitePersistence;

/// Executor for read/write operations against durable storage.
pub trait Persistence: Send + Sync {
    /// Runs `op` against a connection and returns its result.
    fn execute<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>;
}

impl<P: Persistence + ?Sized> Persistence for std::sync::Arc<P> {
    fn execute<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        (**self).execute(op)
    }
}
