//! Associa: an in-process associative memory graph.
//!
//! Typed nodes are joined by directed, weighted edges and queried through
//! neighborhood expansion, strength-weighted shortest paths, community
//! detection, centrality and label/property search. Every mutation is
//! written through to SQLite before it becomes visible in memory.
//!
//! ```no_run
//! use associa::{Config, EdgeType, GraphStore, NodeType, Properties, SqlitePersistence};
//!
//! # fn main() -> associa::Result<()> {
//! let config = Config::default();
//! let db = SqlitePersistence::open("memory.db", &config.persistence)?;
//! let store = GraphStore::open(db, config)?;
//!
//! let a = store.create_node(NodeType::Concept, "machine learning", Properties::new())?;
//! let b = store.create_node(NodeType::Concept, "deep learning", Properties::new())?;
//! store.create_edge(&a, &b, EdgeType::Hierarchical, 0.8, Properties::new())?;
//!
//! let hits = store.search_nodes("learning", &Default::default())?;
//! assert_eq!(hits.len(), 2);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod store;

pub use config::{Config, ConfigError, PersistenceConfig, SyncMode};
pub use error::{GraphError, Result};
pub use metrics::{MetricsSnapshot, OperationMetrics};
pub use model::{
    Centrality, Communities, CommunityMethod, Direction, Edge, EdgeKey, EdgeType, GraphPath,
    GraphStatistics, Node, NodeId, NodeType, Properties, PropertyValue, SearchResult, Strength,
};
pub use persistence::{Persistence, SqlitePersistence};
pub use store::{GraphStore, NeighborhoodQuery, PathQuery, SearchFilter};
