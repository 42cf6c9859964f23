//! Plain-data records shared by the store, persistence and the CLI.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::GraphError;

/// Unique node identifier.
pub type NodeId = String;

/// Property bag carried by nodes and edges.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Kind of knowledge a node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A recorded experience or observation.
    Memory,
    /// An abstract idea.
    Concept,
    /// Something that happened.
    Event,
    /// A person, place or thing.
    Entity,
    /// A reified relation between other nodes.
    Relationship,
    /// A point or span in time.
    Temporal,
}

impl NodeType {
    /// Every node type, in declaration order.
    pub const ALL: [NodeType; 6] = [
        NodeType::Memory,
        NodeType::Concept,
        NodeType::Event,
        NodeType::Entity,
        NodeType::Relationship,
        NodeType::Temporal,
    ];

    /// Lowercase name used in storage and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Memory => "memory",
            NodeType::Concept => "concept",
            NodeType::Event => "event",
            NodeType::Entity => "entity",
            NodeType::Relationship => "relationship",
            NodeType::Temporal => "temporal",
        }
    }
}

impl FromStr for NodeType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| GraphError::validation(format!("unknown node type '{s}'")))
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of association an edge expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// The endpoints resemble each other.
    Similarity,
    /// The source brings about the target.
    Causal,
    /// The endpoints are related in time.
    Temporal,
    /// The source contains or generalizes the target.
    Hierarchical,
    /// A loose, untyped association.
    Associative,
    /// The target follows the source.
    Sequential,
}

impl EdgeType {
    /// Every edge type, in declaration order.
    pub const ALL: [EdgeType; 6] = [
        EdgeType::Similarity,
        EdgeType::Causal,
        EdgeType::Temporal,
        EdgeType::Hierarchical,
        EdgeType::Associative,
        EdgeType::Sequential,
    ];

    /// Lowercase name used in storage and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Similarity => "similarity",
            EdgeType::Causal => "causal",
            EdgeType::Temporal => "temporal",
            EdgeType::Hierarchical => "hierarchical",
            EdgeType::Associative => "associative",
            EdgeType::Sequential => "sequential",
        }
    }

    /// Multiplier applied to neighborhood relevance scores.
    pub fn relevance_boost(&self) -> f64 {
        match self {
            EdgeType::Causal => 1.2,
            EdgeType::Similarity | EdgeType::Temporal | EdgeType::Sequential => 1.1,
            EdgeType::Hierarchical | EdgeType::Associative => 1.0,
        }
    }
}

impl FromStr for EdgeType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| GraphError::validation(format!("unknown edge type '{s}'")))
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named strength levels for callers that do not compute their own weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    /// 0.2
    Weak,
    /// 0.5
    Moderate,
    /// 0.8
    Strong,
    /// 1.0
    VeryStrong,
}

impl Strength {
    /// Numeric edge strength of the level.
    pub fn value(self) -> f64 {
        match self {
            Strength::Weak => 0.2,
            Strength::Moderate => 0.5,
            Strength::Strong => 0.8,
            Strength::VeryStrong => 1.0,
        }
    }
}

impl From<Strength> for f64 {
    fn from(strength: Strength) -> Self {
        strength.value()
    }
}

/// Dynamically typed property value.
///
/// Serialized untagged so the persisted JSON is a plain object readable by
/// any other client of the tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// JSON `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A finite float. NaN and infinities are refused on write, since JSON
    /// cannot carry them.
    Float(f64),
    /// A string.
    String(String),
    /// A list of values.
    List(Vec<PropertyValue>),
    /// A nested object.
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Whether every float inside the value is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            PropertyValue::Float(x) => x.is_finite(),
            PropertyValue::List(items) => items.iter().all(PropertyValue::is_finite),
            PropertyValue::Map(entries) => entries.values().all(PropertyValue::is_finite),
            _ => true,
        }
    }

    /// The string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => f.write_str("null"),
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::String(s) => f.write_str(s),
            PropertyValue::List(_) | PropertyValue::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// A typed unit of knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id.
    pub id: NodeId,
    /// What kind of knowledge the node holds.
    pub node_type: NodeType,
    /// Human-readable label, matched by text search.
    pub label: String,
    /// Arbitrary attributes.
    pub properties: Properties,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Number of explicit accesses.
    pub access_count: u64,
    /// Time of the last explicit access, or creation.
    #[serde(with = "time::serde::rfc3339")]
    pub last_accessed: OffsetDateTime,
}

impl Node {
    /// A fresh node with no properties, created now.
    pub fn new(id: impl Into<NodeId>, node_type: NodeType, label: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: id.into(),
            node_type,
            label: label.into(),
            properties: Properties::new(),
            created_at: now,
            access_count: 0,
            last_accessed: now,
        }
    }

    /// Replaces the property bag.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}

/// A directed, weighted association between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Id of the node the edge leaves.
    pub source_id: NodeId,
    /// Id of the node the edge enters.
    pub target_id: NodeId,
    /// Kind of association.
    pub edge_type: EdgeType,
    /// Confidence in `[0, 1]`.
    pub strength: f64,
    /// Arbitrary attributes.
    pub properties: Properties,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Number of explicit accesses.
    pub access_count: u64,
}

impl Edge {
    /// A fresh edge with no properties, created now.
    pub fn new(
        source_id: impl Into<NodeId>,
        target_id: impl Into<NodeId>,
        edge_type: EdgeType,
        strength: f64,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            edge_type,
            strength,
            properties: Properties::new(),
            created_at: OffsetDateTime::now_utc(),
            access_count: 0,
        }
    }

    /// Replaces the property bag.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// The `(source, target)` pair identifying the edge.
    pub fn key(&self) -> EdgeKey {
        (self.source_id.clone(), self.target_id.clone())
    }

    /// Traversal cost: strong associations are cheap.
    pub fn distance(&self) -> f64 {
        (1.0 - self.strength).max(0.0)
    }
}

/// Natural key of an edge: `(source_id, target_id)`.
pub type EdgeKey = (NodeId, NodeId);

/// Which adjacency list to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Targets of edges leaving the node.
    Outgoing,
    /// Sources of edges entering the node.
    Incoming,
    /// Both, outgoing first.
    Both,
}

/// A walk through the graph, detached from the store's internals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphPath {
    /// Nodes in walking order, starting at the source.
    pub nodes: Vec<Node>,
    /// Edges between consecutive nodes.
    pub edges: Vec<Edge>,
    /// Weakest edge strength along the path; 1.0 for a single-node path.
    pub total_strength: f64,
}

impl GraphPath {
    pub(crate) fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let total_strength = edges
            .iter()
            .map(|e| e.strength)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |m| m.min(s))))
            .unwrap_or(1.0);
        Self {
            nodes,
            edges,
            total_strength,
        }
    }

    /// Number of nodes on the path.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the path holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edges traversed.
    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    /// Ids of the nodes in walking order.
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Whether the path visits `node_id`.
    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == node_id)
    }
}

/// One hit of a neighborhood or text search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// The matching node.
    pub node: Node,
    /// How the node was reached; a single-node path for text search.
    pub path: GraphPath,
    /// Ranking score, higher is better.
    pub relevance_score: f64,
    /// Hops from the start node; 0 for text search.
    pub search_depth: usize,
}

/// Structural importance of one node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Centrality {
    /// Degree over the number of other nodes.
    pub degree_centrality: f64,
    /// Share of ordered node pairs whose shortest path runs through the node.
    pub betweenness_centrality: f64,
    /// Reachable nodes over the summed node counts of the paths to them.
    pub closeness_centrality: f64,
    /// Incoming plus outgoing edges.
    pub total_connections: usize,
}

/// Community detection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityMethod {
    /// Greedy strength-based merging.
    Louvain,
    /// Majority label spreading.
    LabelPropagation,
    /// Weakly connected components.
    ConnectedComponents,
}

impl FromStr for CommunityMethod {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "louvain" => Ok(CommunityMethod::Louvain),
            "label_propagation" => Ok(CommunityMethod::LabelPropagation),
            "connected_components" => Ok(CommunityMethod::ConnectedComponents),
            other => Err(GraphError::validation(format!(
                "unsupported community detection method '{other}'"
            ))),
        }
    }
}

/// Community label mapped to its sorted members.
pub type Communities = BTreeMap<String, Vec<NodeId>>;

/// Aggregate report over the whole graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStatistics {
    /// Node count.
    pub total_nodes: usize,
    /// Edge count.
    pub total_edges: usize,
    /// Node count per type.
    pub node_types: BTreeMap<NodeType, usize>,
    /// Edge count per type.
    pub edge_types: BTreeMap<EdgeType, usize>,
    /// Number of weakly connected components.
    pub connected_components: usize,
    /// Node count of the largest component.
    pub largest_component_size: usize,
    /// Mean incoming plus outgoing edges per node.
    pub average_degree: f64,
    /// Mean edge strength.
    pub average_edge_strength: f64,
    /// Edges over `n * (n - 1)`.
    pub density: f64,
    /// Neighborhood searches run by this store.
    pub search_operations: u64,
    /// Shortest-path queries run by this store.
    pub path_finding_operations: u64,
    /// Community detection runs by this store.
    pub community_detection_operations: u64,
}
