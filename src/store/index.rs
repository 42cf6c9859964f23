use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::warn;

use crate::error::{GraphError, Result};
use crate::model::{Direction, Edge, EdgeKey, EdgeType, Node, NodeId, PropertyValue};

/// Authoritative node/edge tables plus the views derived from them.
///
/// `nodes` and `edges` are the source of truth. Adjacency lists, the
/// edge-type index and the property index can always be rebuilt from them.
#[derive(Debug, Default, Clone)]
pub(crate) struct GraphIndex {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) edges: HashMap<EdgeKey, Edge>,
    pub(crate) outgoing: HashMap<NodeId, Vec<NodeId>>,
    pub(crate) incoming: HashMap<NodeId, Vec<NodeId>>,
    pub(crate) property_index: HashMap<String, BTreeSet<NodeId>>,
    pub(crate) edge_type_index: HashMap<EdgeType, Vec<EdgeKey>>,
}

pub(crate) fn property_key(key: &str, value: &PropertyValue) -> String {
    format!("property:{key}:{value}")
}

pub(crate) fn folded_property_key(key: &str, value: &PropertyValue) -> String {
    format!("property:{key}:{}", value.to_string().to_lowercase())
}

impl GraphIndex {
    /// Builds every index from freshly loaded tables. Edges whose endpoints
    /// are missing are dropped.
    pub(crate) fn from_tables(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut index = GraphIndex::default();
        for node in nodes {
            index.insert_node(node);
        }
        for edge in edges {
            if !index.contains_node(&edge.source_id) || !index.contains_node(&edge.target_id) {
                warn!(
                    source = %edge.source_id,
                    target = %edge.target_id,
                    "skipping persisted edge with missing endpoint"
                );
                continue;
            }
            index.insert_edge(edge);
        }
        index
    }

    pub(crate) fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub(crate) fn node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::node_not_found(id))
    }

    pub(crate) fn edge(&self, source: &str, target: &str) -> Option<&Edge> {
        self.edges.get(&(source.to_string(), target.to_string()))
    }

    pub(crate) fn require_edge(&self, source: &str, target: &str) -> Result<&Edge> {
        self.edge(source, target)
            .ok_or_else(|| GraphError::edge_not_found(source, target))
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> Option<Node> {
        if let Some(old) = self.nodes.get(&node.id).cloned() {
            self.unindex_node(&old);
        }
        self.index_node(&node);
        self.nodes.insert(node.id.clone(), node)
    }

    fn index_node(&mut self, node: &Node) {
        for (key, value) in &node.properties {
            self.property_index
                .entry(property_key(key, value))
                .or_default()
                .insert(node.id.clone());
            self.property_index
                .entry(folded_property_key(key, value))
                .or_default()
                .insert(node.id.clone());
        }
    }

    fn unindex_node(&mut self, node: &Node) {
        for (key, value) in &node.properties {
            for index_key in [property_key(key, value), folded_property_key(key, value)] {
                if let Some(ids) = self.property_index.get_mut(&index_key) {
                    ids.remove(&node.id);
                    if ids.is_empty() {
                        self.property_index.remove(&index_key);
                    }
                }
            }
        }
    }

    /// Inserts or replaces the edge keyed by `(source, target)`. Returns the
    /// replaced edge, if any.
    pub(crate) fn insert_edge(&mut self, edge: Edge) -> Option<Edge> {
        let key = edge.key();
        let edge_type = edge.edge_type;
        let previous = self.edges.insert(key.clone(), edge);
        match &previous {
            Some(old) => {
                if old.edge_type != edge_type {
                    self.unindex_edge_type(old.edge_type, &key);
                    self.edge_type_index.entry(edge_type).or_default().push(key);
                }
            }
            None => self.index_edge(key, edge_type),
        }
        previous
    }

    fn index_edge(&mut self, key: EdgeKey, edge_type: EdgeType) {
        let (source, target) = &key;
        self.outgoing
            .entry(source.clone())
            .or_default()
            .push(target.clone());
        self.incoming
            .entry(target.clone())
            .or_default()
            .push(source.clone());
        self.edge_type_index.entry(edge_type).or_default().push(key);
    }

    fn unindex_edge_type(&mut self, edge_type: EdgeType, key: &EdgeKey) {
        if let Some(keys) = self.edge_type_index.get_mut(&edge_type) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.edge_type_index.remove(&edge_type);
            }
        }
    }

    pub(crate) fn remove_edge(&mut self, source: &str, target: &str) -> Option<Edge> {
        let key = (source.to_string(), target.to_string());
        let edge = self.edges.remove(&key)?;
        if let Some(targets) = self.outgoing.get_mut(source) {
            targets.retain(|t| t != target);
            if targets.is_empty() {
                self.outgoing.remove(source);
            }
        }
        if let Some(sources) = self.incoming.get_mut(target) {
            sources.retain(|s| s != source);
            if sources.is_empty() {
                self.incoming.remove(target);
            }
        }
        self.unindex_edge_type(edge.edge_type, &key);
        Some(edge)
    }

    /// Removes a node and every edge touching it.
    pub(crate) fn remove_node(&mut self, id: &str) -> Option<(Node, Vec<Edge>)> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        let mut touching: Vec<EdgeKey> = self
            .outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(|t| (id.to_string(), t.clone()))
            .collect();
        touching.extend(
            self.incoming
                .get(id)
                .into_iter()
                .flatten()
                .filter(|s| s.as_str() != id)
                .map(|s| (s.clone(), id.to_string())),
        );

        let removed = touching
            .iter()
            .filter_map(|(s, t)| self.remove_edge(s, t))
            .collect();

        let node = self.nodes.remove(id)?;
        self.unindex_node(&node);
        self.outgoing.remove(id);
        self.incoming.remove(id);
        Some((node, removed))
    }

    pub(crate) fn outgoing_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(move |target| self.edge(id, target))
    }

    pub(crate) fn incoming_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(move |source| self.edge(source, id))
    }

    /// Neighbor ids regardless of direction: incoming first, then outgoing.
    /// A node linked both ways appears twice.
    pub(crate) fn undirected_neighbors(&self, id: &str) -> Vec<&str> {
        let incoming = self.incoming.get(id).into_iter().flatten();
        let outgoing = self.outgoing.get(id).into_iter().flatten();
        incoming
            .chain(outgoing)
            .map(String::as_str)
            .filter(|n| *n != id)
            .collect()
    }

    pub(crate) fn neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        match direction {
            Direction::Outgoing => self
                .outgoing
                .get(id)
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect(),
            Direction::Incoming => self
                .incoming
                .get(id)
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect(),
            Direction::Both => self.undirected_neighbors(id),
        }
    }

    pub(crate) fn out_degree(&self, id: &str) -> usize {
        self.outgoing.get(id).map_or(0, Vec::len)
    }

    pub(crate) fn in_degree(&self, id: &str) -> usize {
        self.incoming.get(id).map_or(0, Vec::len)
    }

    pub(crate) fn degree(&self, id: &str) -> usize {
        self.out_degree(id) + self.in_degree(id)
    }

    pub(crate) fn property_candidates(&self, index_key: &str) -> impl Iterator<Item = &Node> {
        self.property_index
            .get(index_key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.nodes.get(id))
    }

    /// Cross-checks the derived views against the edge table.
    pub(crate) fn integrity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for (source, target) in self.edges.keys() {
            if !self.contains_node(source) || !self.contains_node(target) {
                issues.push(format!("edge {source}->{target} references a missing node"));
            }
        }

        let mut out_counts: HashMap<&str, usize> = HashMap::new();
        let mut in_counts: HashMap<&str, usize> = HashMap::new();
        for (source, target) in self.edges.keys() {
            *out_counts.entry(source.as_str()).or_default() += 1;
            *in_counts.entry(target.as_str()).or_default() += 1;
        }
        for id in self.nodes.keys() {
            let expected_out = out_counts.get(id.as_str()).copied().unwrap_or(0);
            let expected_in = in_counts.get(id.as_str()).copied().unwrap_or(0);
            if self.out_degree(id) != expected_out {
                issues.push(format!(
                    "node {id}: outgoing list has {} entries, edge table has {expected_out}",
                    self.out_degree(id)
                ));
            }
            if self.in_degree(id) != expected_in {
                issues.push(format!(
                    "node {id}: incoming list has {} entries, edge table has {expected_in}",
                    self.in_degree(id)
                ));
            }
        }

        let typed: usize = self.edge_type_index.values().map(Vec::len).sum();
        if typed != self.edges.len() {
            issues.push(format!(
                "edge-type index holds {typed} keys for {} edges",
                self.edges.len()
            ));
        }

        for (index_key, ids) in &self.property_index {
            for id in ids {
                if !self.contains_node(id) {
                    issues.push(format!("property index {index_key} references missing node {id}"));
                }
            }
        }

        issues
    }
}
