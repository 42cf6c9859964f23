//! Label and property search plus whole-graph statistics.

use tracing::debug;

use super::index::{folded_property_key, property_key};
use super::GraphStore;
use crate::error::Result;
use crate::model::{GraphPath, GraphStatistics, Node, NodeType, Properties, PropertyValue, SearchResult};
use crate::persistence::Persistence;

/// Optional narrowing for [`GraphStore::search_nodes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    /// Node types to keep. `None` (or an empty list) keeps every type.
    pub node_types: Option<Vec<NodeType>>,
    /// Each matching `(key, value)` pair adds `1 / len` to a node's score.
    pub property_filters: Option<Properties>,
    /// Defaults to `Config::default_search_limit`.
    pub limit: Option<usize>,
}

impl SearchFilter {
    /// A filter that admits everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts results to these node types.
    pub fn node_types(mut self, types: impl IntoIterator<Item = NodeType>) -> Self {
        self.node_types = Some(types.into_iter().collect());
        self
    }

    /// Adds a `(key, value)` pair that contributes to the score.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.property_filters
            .get_or_insert_with(Properties::new)
            .insert(key.into(), value.into());
        self
    }

    /// Caps the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn admits(&self, node: &Node) -> bool {
        match &self.node_types {
            Some(types) if !types.is_empty() => types.contains(&node.node_type),
            _ => true,
        }
    }

    fn property_score(&self, node: &Node) -> f64 {
        match &self.property_filters {
            Some(filters) if !filters.is_empty() => {
                let matched = filters
                    .iter()
                    .filter(|(key, value)| node.properties.get(*key) == Some(*value))
                    .count();
                matched as f64 / filters.len() as f64
            }
            _ => 0.0,
        }
    }
}

impl<P: Persistence> GraphStore<P> {
    /// Scores nodes by a case-insensitive label substring match (1.0) plus
    /// the fraction of property filters they satisfy. Nodes scoring zero are
    /// dropped; the rest come back best first.
    pub fn search_nodes(&self, query: &str, filter: &SearchFilter) -> Result<Vec<SearchResult>> {
        let index = self.read()?;
        let needle = query.to_lowercase();

        let mut results: Vec<SearchResult> = index
            .nodes
            .values()
            .filter(|node| filter.admits(node))
            .filter_map(|node| {
                let label_score = if node.label.to_lowercase().contains(&needle) {
                    1.0
                } else {
                    0.0
                };
                let score = label_score + filter.property_score(node);
                (score > 0.0).then(|| SearchResult {
                    node: node.clone(),
                    path: GraphPath::new(vec![node.clone()], Vec::new()),
                    relevance_score: score,
                    search_depth: 0,
                })
            })
            .collect();

        results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        results.truncate(filter.limit.unwrap_or(self.config.default_search_limit));
        debug!(query, found = results.len(), "node search finished");
        Ok(results)
    }

    /// Nodes whose property `key` equals `value` exactly.
    pub fn find_nodes_by_property(&self, key: &str, value: &PropertyValue) -> Result<Vec<Node>> {
        let index = self.read()?;
        Ok(index
            .property_candidates(&property_key(key, value))
            .filter(|node| node.properties.get(key) == Some(value))
            .cloned()
            .collect())
    }

    /// Nodes whose property `key` renders to `text`, ignoring case.
    pub fn find_nodes_by_property_ci(&self, key: &str, text: &str) -> Result<Vec<Node>> {
        let index = self.read()?;
        let folded = text.to_lowercase();
        let index_key = folded_property_key(key, &PropertyValue::String(folded.clone()));
        Ok(index
            .property_candidates(&index_key)
            .filter(|node| {
                node.properties
                    .get(key)
                    .is_some_and(|v| v.to_string().to_lowercase() == folded)
            })
            .cloned()
            .collect())
    }

    /// Counts, degree and strength averages, density, components and the
    /// operation counters.
    pub fn get_graph_statistics(&self) -> Result<GraphStatistics> {
        let index = self.read()?;
        let mut stats = GraphStatistics {
            total_nodes: index.nodes.len(),
            total_edges: index.edges.len(),
            ..GraphStatistics::default()
        };

        for node in index.nodes.values() {
            *stats.node_types.entry(node.node_type).or_default() += 1;
        }
        for edge in index.edges.values() {
            *stats.edge_types.entry(edge.edge_type).or_default() += 1;
        }

        let components = index.connected_components();
        stats.connected_components = components.len();
        stats.largest_component_size = components.iter().map(Vec::len).max().unwrap_or(0);

        let n = stats.total_nodes;
        let e = stats.total_edges;
        let degree_sum: usize = index.nodes.keys().map(|id| index.degree(id)).sum();
        stats.average_degree = degree_sum as f64 / n.max(1) as f64;
        stats.average_edge_strength =
            index.edges.values().map(|edge| edge.strength).sum::<f64>() / e.max(1) as f64;
        stats.density = if n > 1 {
            e as f64 / (n * (n - 1)) as f64
        } else {
            0.0
        };

        let ops = self.metrics.snapshot();
        stats.search_operations = ops.search_operations;
        stats.path_finding_operations = ops.path_finding_operations;
        stats.community_detection_operations = ops.community_detection_operations;
        Ok(stats)
    }
}
