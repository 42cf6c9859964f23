use std::sync::atomic::Ordering;

use time::OffsetDateTime;
use tracing::debug;

use super::GraphStore;
use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeType, Node, NodeId, NodeType, Properties};
use crate::persistence::{rows, Persistence};

fn validate_strength(strength: f64) -> Result<()> {
    if strength.is_finite() && (0.0..=1.0).contains(&strength) {
        Ok(())
    } else {
        Err(GraphError::validation(format!(
            "edge strength must be within [0, 1], got {strength}"
        )))
    }
}

/// JSON has no NaN or infinity, so such floats would reload as `null`.
fn validate_properties(properties: &Properties) -> Result<()> {
    match properties.iter().find(|(_, value)| !value.is_finite()) {
        Some((key, value)) => Err(GraphError::validation(format!(
            "property '{key}' holds a non-finite float: {value}"
        ))),
        None => Ok(()),
    }
}

impl<P: Persistence> GraphStore<P> {
    /// Creates a node under a freshly generated id and returns that id.
    pub fn create_node(
        &self,
        node_type: NodeType,
        label: impl Into<String>,
        properties: Properties,
    ) -> Result<NodeId> {
        validate_properties(&properties)?;
        let mut index = self.write()?;
        let id = loop {
            let candidate = self.generate_id();
            if !index.contains_node(&candidate) {
                break candidate;
            }
        };
        let node = Node::new(id.clone(), node_type, label).with_properties(properties);

        self.persistence.execute(|conn| rows::upsert_node(conn, &node))?;
        index.insert_node(node);
        self.bump_version();
        debug!(node = %id, %node_type, "created node");
        Ok(id)
    }

    /// Creates a node under a caller-chosen id. Fails if the id is taken.
    pub fn create_node_with_id(
        &self,
        id: impl Into<NodeId>,
        node_type: NodeType,
        label: impl Into<String>,
        properties: Properties,
    ) -> Result<NodeId> {
        let id = id.into();
        if id.is_empty() {
            return Err(GraphError::validation("node id must not be empty"));
        }
        validate_properties(&properties)?;
        let mut index = self.write()?;
        if index.contains_node(&id) {
            return Err(GraphError::validation(format!("node '{id}' already exists")));
        }
        let node = Node::new(id.clone(), node_type, label).with_properties(properties);

        self.persistence.execute(|conn| rows::upsert_node(conn, &node))?;
        index.insert_node(node);
        self.bump_version();
        debug!(node = %id, %node_type, "created node");
        Ok(id)
    }

    /// Creates or replaces the edge `source -> target`.
    ///
    /// Returns `true` when the pair was new and `false` when an existing edge
    /// was overwritten. Both endpoints are checked before anything changes.
    pub fn create_edge(
        &self,
        source: &str,
        target: &str,
        edge_type: EdgeType,
        strength: f64,
        properties: Properties,
    ) -> Result<bool> {
        validate_strength(strength)?;
        validate_properties(&properties)?;
        let mut index = self.write()?;
        index.node(source)?;
        index.node(target)?;

        let edge = Edge::new(source, target, edge_type, strength).with_properties(properties);
        self.persistence.execute(|conn| rows::upsert_edge(conn, &edge))?;
        let replaced = index.insert_edge(edge).is_some();
        self.bump_version();
        debug!(source, target, %edge_type, strength, replaced, "stored edge");
        Ok(!replaced)
    }

    /// Sets the strength of an existing edge.
    pub fn update_edge_strength(&self, source: &str, target: &str, strength: f64) -> Result<()> {
        validate_strength(strength)?;
        let mut index = self.write()?;
        let mut edge = index.require_edge(source, target)?.clone();
        edge.strength = strength;

        self.persistence.execute(|conn| rows::upsert_edge(conn, &edge))?;
        index.insert_edge(edge);
        self.bump_version();
        debug!(source, target, strength, "updated edge strength");
        Ok(())
    }

    /// Records a read of `id`: bumps its access count and timestamp.
    pub fn access_node(&self, id: &str) -> Result<Node> {
        let mut index = self.write()?;
        let mut node = index.node(id)?.clone();
        node.access_count = node.access_count.saturating_add(1);
        node.last_accessed = OffsetDateTime::now_utc();

        self.persistence.execute(|conn| rows::upsert_node(conn, &node))?;
        index.insert_node(node.clone());
        Ok(node)
    }

    /// Records an access to the edge and returns it.
    pub fn access_edge(&self, source: &str, target: &str) -> Result<Edge> {
        let mut index = self.write()?;
        let mut edge = index.require_edge(source, target)?.clone();
        edge.access_count = edge.access_count.saturating_add(1);

        self.persistence.execute(|conn| rows::upsert_edge(conn, &edge))?;
        index.insert_edge(edge.clone());
        Ok(edge)
    }

    /// Removes the edge and returns it.
    pub fn delete_edge(&self, source: &str, target: &str) -> Result<Edge> {
        let mut index = self.write()?;
        index.require_edge(source, target)?;

        self.persistence
            .execute(|conn| rows::delete_edge_row(conn, source, target))?;
        let edge = index
            .remove_edge(source, target)
            .ok_or_else(|| GraphError::edge_not_found(source, target))?;
        self.bump_version();
        debug!(source, target, "deleted edge");
        Ok(edge)
    }

    /// Deletes a node and every edge touching it. Returns the removed edges.
    pub fn delete_node(&self, id: &str) -> Result<Vec<Edge>> {
        let mut index = self.write()?;
        index.node(id)?;

        self.persistence.execute(|conn| rows::delete_node_rows(conn, id))?;
        let (_, removed) = index
            .remove_node(id)
            .ok_or_else(|| GraphError::node_not_found(id))?;
        self.bump_version();
        debug!(node = id, edges = removed.len(), "deleted node");
        Ok(removed)
    }

    fn generate_id(&self) -> NodeId {
        let counter = self.next_id.fetch_add(1, Ordering::AcqRel);
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        format!("node_{counter}_{nanos}")
    }
}
