//! The associative graph store.
//!
//! [`GraphStore`] owns the in-memory tables behind a single
//! `parking_lot::RwLock`: mutations hold the write guard across both the
//! persistence write and the index update, queries share read guards and
//! copy their results out. Persistence is written first, so a failed write
//! leaves memory untouched; after a crash, [`GraphStore::initialize`]
//! rebuilds everything from storage.

mod analysis;
mod index;
mod mutation;
mod search;
mod traversal;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info};

use crate::config::Config;
use crate::error::{GraphError, Result};
use crate::metrics::OperationMetrics;
use crate::model::{Direction, Edge, EdgeType, Node, NodeId, NodeType};
use crate::persistence::{rows, Persistence};

use index::GraphIndex;

pub use search::SearchFilter;
pub use traversal::{NeighborhoodQuery, PathQuery};

/// In-memory associative graph written through to a [`Persistence`] backend.
///
/// Readers share a lock and see a consistent snapshot; writers are
/// serialized and persist before they publish.
pub struct GraphStore<P: Persistence> {
    persistence: P,
    config: Config,
    index: RwLock<GraphIndex>,
    ready: AtomicBool,
    next_id: AtomicU64,
    version: AtomicU64,
    metrics: OperationMetrics,
    betweenness_cache: Mutex<HashMap<NodeId, (u64, f64)>>,
}

impl<P: Persistence> std::fmt::Debug for GraphStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("ready", &self.ready.load(Ordering::Acquire))
            .field("version", &self.version.load(Ordering::Acquire))
            .field("config", &self.config)
            .finish()
    }
}

impl<P: Persistence> GraphStore<P> {
    /// Creates an empty, unloaded store. Every operation except
    /// [`initialize`](Self::initialize) fails until it succeeds.
    pub fn new(persistence: P, config: Config) -> Self {
        Self {
            persistence,
            config,
            index: RwLock::new(GraphIndex::default()),
            ready: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            version: AtomicU64::new(0),
            metrics: OperationMetrics::new(),
            betweenness_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Constructs and initializes in one step.
    pub fn open(persistence: P, config: Config) -> Result<Self> {
        let store = Self::new(persistence, config);
        store.initialize()?;
        Ok(store)
    }

    /// Loads all persisted nodes and edges and rebuilds every derived index.
    ///
    /// Any in-memory state is discarded; storage is authoritative.
    pub fn initialize(&self) -> Result<()> {
        let mut index = self.index.write();
        self.ready.store(false, Ordering::Release);

        let loaded = self.persistence.execute(|conn| {
            rows::ensure_schema(conn)?;
            Ok((rows::load_nodes(conn)?, rows::load_edges(conn)?))
        });
        let (nodes, edges) = match loaded {
            Ok(tables) => tables,
            Err(err) => {
                error!(error = %err, "failed to load graph");
                return Err(GraphError::Initialization(format!(
                    "failed to load graph: {err}"
                )));
            }
        };

        let loaded_edges = edges.len();
        *index = GraphIndex::from_tables(nodes, edges);
        self.next_id
            .store(index.nodes.len() as u64, Ordering::Release);
        self.betweenness_cache.lock().clear();
        self.bump_version();
        self.ready.store(true, Ordering::Release);

        info!(
            nodes = index.nodes.len(),
            edges = index.edges.len(),
            skipped_edges = loaded_edges - index.edges.len(),
            "graph store initialized"
        );
        Ok(())
    }

    /// Whether the last [`initialize`](Self::initialize) succeeded.
    pub fn is_initialized(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Tuning knobs the store was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The storage backend.
    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Query counters for this store.
    pub fn metrics(&self) -> &OperationMetrics {
        &self.metrics
    }

    /// Structural version, bumped by every successful mutation.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// The node with `id`.
    pub fn get_node(&self, id: &str) -> Result<Node> {
        Ok(self.read()?.node(id)?.clone())
    }

    /// The edge `source -> target`.
    pub fn get_edge(&self, source: &str, target: &str) -> Result<Edge> {
        Ok(self.read()?.require_edge(source, target)?.clone())
    }

    /// Whether a node with `id` exists.
    pub fn contains_node(&self, id: &str) -> Result<bool> {
        Ok(self.read()?.contains_node(id))
    }

    /// Number of nodes.
    pub fn node_count(&self) -> Result<usize> {
        Ok(self.read()?.nodes.len())
    }

    /// Number of edges.
    pub fn edge_count(&self) -> Result<usize> {
        Ok(self.read()?.edges.len())
    }

    /// All nodes, ordered by id.
    pub fn nodes(&self) -> Result<Vec<Node>> {
        Ok(self.read()?.nodes.values().cloned().collect())
    }

    /// Nodes of one type, ordered by id.
    pub fn nodes_by_type(&self, node_type: NodeType) -> Result<Vec<Node>> {
        Ok(self
            .read()?
            .nodes
            .values()
            .filter(|n| n.node_type == node_type)
            .cloned()
            .collect())
    }

    /// Edges of one type, in insertion order.
    pub fn edges_by_type(&self, edge_type: EdgeType) -> Result<Vec<Edge>> {
        let index = self.read()?;
        Ok(index
            .edge_type_index
            .get(&edge_type)
            .into_iter()
            .flatten()
            .filter_map(|key| index.edges.get(key))
            .cloned()
            .collect())
    }

    /// Ids adjacent to `id` in `direction`.
    pub fn neighbors(&self, id: &str, direction: Direction) -> Result<Vec<NodeId>> {
        let index = self.read()?;
        index.node(id)?;
        Ok(index
            .neighbors(id, direction)
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Consistency problems between the edge table, the derived indices and
    /// the persisted row counts. Empty when the store is healthy.
    pub fn verify_integrity(&self) -> Result<Vec<String>> {
        let index = self.read()?;
        let mut issues = index.integrity_issues();
        let (stored_nodes, stored_edges) = self.persistence.execute(rows::count_rows)?;
        if stored_nodes != index.nodes.len() as u64 {
            issues.push(format!(
                "{stored_nodes} nodes persisted, {} in memory",
                index.nodes.len()
            ));
        }
        if stored_edges != index.edges.len() as u64 {
            issues.push(format!(
                "{stored_edges} edges persisted, {} in memory",
                index.edges.len()
            ));
        }
        Ok(issues)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, GraphIndex>> {
        let guard = self.index.read();
        self.ensure_ready()?;
        Ok(guard)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, GraphIndex>> {
        let guard = self.index.write();
        self.ensure_ready()?;
        Ok(guard)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(GraphError::Initialization(
                "graph store used before a successful initialize()".into(),
            ))
        }
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use rusqlite::Connection;

    use super::*;
    use crate::model::Properties;
    use crate::persistence::SqlitePersistence;

    /// Delegates to SQLite until `fail` is set, then rejects every call.
    struct Flaky {
        inner: SqlitePersistence,
        fail: AtomicBool,
    }

    impl Persistence for Flaky {
        fn execute<T, F>(&self, op: F) -> Result<T>
        where
            F: FnOnce(&Connection) -> rusqlite::Result<T>,
        {
            if self.fail.load(Ordering::Acquire) {
                return Err(GraphError::Persistence(rusqlite::Error::InvalidQuery));
            }
            self.inner.execute(op)
        }
    }

    fn flaky_store() -> GraphStore<Flaky> {
        let persistence = Flaky {
            inner: SqlitePersistence::open_in_memory().unwrap(),
            fail: AtomicBool::new(false),
        };
        GraphStore::open(persistence, Config::default()).unwrap()
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let store = flaky_store();
        let a = store
            .create_node(NodeType::Concept, "a", Properties::new())
            .unwrap();
        let b = store
            .create_node(NodeType::Concept, "b", Properties::new())
            .unwrap();
        let version = store.version();

        store.persistence().fail.store(true, Ordering::Release);
        let err = store
            .create_edge(&a, &b, EdgeType::Causal, 0.4, Properties::new())
            .unwrap_err();
        assert!(matches!(err, GraphError::Persistence(_)));
        assert!(store
            .create_node(NodeType::Event, "c", Properties::new())
            .is_err());

        assert_eq!(store.edge_count().unwrap(), 0);
        assert_eq!(store.node_count().unwrap(), 2);
        assert_eq!(store.version(), version);
        store.persistence().fail.store(false, Ordering::Release);
        assert!(store.verify_integrity().unwrap().is_empty());
    }

    #[test]
    fn failed_load_keeps_store_closed() {
        let persistence = Flaky {
            inner: SqlitePersistence::open_in_memory().unwrap(),
            fail: AtomicBool::new(true),
        };
        let store = GraphStore::new(persistence, Config::default());
        assert!(matches!(
            store.initialize(),
            Err(GraphError::Initialization(_))
        ));
        assert!(!store.is_initialized());
        assert!(matches!(
            store.node_count(),
            Err(GraphError::Initialization(_))
        ));
    }

    #[test]
    fn generated_ids_are_unique() {
        let store = flaky_store();
        let ids: std::collections::HashSet<_> = (0..50)
            .map(|i| {
                store
                    .create_node(NodeType::Memory, format!("m{i}"), Properties::new())
                    .unwrap()
            })
            .collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn betweenness_cache_tracks_mutations() {
        let store = GraphStore::open(SqlitePersistence::open_in_memory().unwrap(), Config::default())
            .unwrap();
        for id in ["a", "b", "c"] {
            store
                .create_node_with_id(id, NodeType::Entity, id, Properties::new())
                .unwrap();
        }
        store
            .create_edge("a", "b", EdgeType::Sequential, 0.5, Properties::new())
            .unwrap();
        assert_eq!(store.get_node_centrality("b").unwrap().betweenness_centrality, 0.0);

        store
            .create_edge("b", "c", EdgeType::Sequential, 0.5, Properties::new())
            .unwrap();
        assert_eq!(store.get_node_centrality("b").unwrap().betweenness_centrality, 0.5);
    }
}
