//! Neighborhood expansion and strength-weighted shortest paths.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use tracing::debug;

use super::index::GraphIndex;
use super::GraphStore;
use crate::error::Result;
use crate::model::{Edge, EdgeType, GraphPath, Node, SearchResult};
use crate::persistence::Persistence;

/// Parameters for [`GraphStore::find_connected_nodes`].
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodQuery {
    /// Edge types to follow. `None` (or an empty list) follows every type.
    pub edge_types: Option<Vec<EdgeType>>,
    /// Inclusive lower bound on edge strength.
    pub min_strength: Option<f64>,
    /// Number of BFS levels to expand.
    pub max_depth: usize,
    /// Result cap; defaults to `Config::max_search_results`.
    pub limit: Option<usize>,
}

impl Default for NeighborhoodQuery {
    fn default() -> Self {
        Self {
            edge_types: None,
            min_strength: None,
            max_depth: 1,
            limit: None,
        }
    }
}

impl NeighborhoodQuery {
    /// Direct neighbors, every edge type, default limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Follows only these edge types.
    pub fn edge_types(mut self, types: impl IntoIterator<Item = EdgeType>) -> Self {
        self.edge_types = Some(types.into_iter().collect());
        self
    }

    /// Skips edges weaker than `strength`.
    pub fn min_strength(mut self, strength: f64) -> Self {
        self.min_strength = Some(strength);
        self
    }

    /// Expands up to `depth` levels.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Caps the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn follows(&self, edge: &Edge) -> bool {
        type_allowed(self.edge_types.as_deref(), edge.edge_type)
            && self.min_strength.map_or(true, |min| edge.strength >= min)
    }
}

/// Parameters for [`GraphStore::find_shortest_path`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathQuery {
    /// Edge types to follow. `None` (or an empty list) follows every type.
    pub edge_types: Option<Vec<EdgeType>>,
    /// Bound on the summed `1 - strength` distance of a path; defaults to
    /// `Config::max_path_length`.
    pub max_length: Option<f64>,
}

impl PathQuery {
    /// Every edge type, default distance bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Follows only these edge types.
    pub fn edge_types(mut self, types: impl IntoIterator<Item = EdgeType>) -> Self {
        self.edge_types = Some(types.into_iter().collect());
        self
    }

    /// Caps the accumulated distance of an acceptable path.
    pub fn max_length(mut self, distance: f64) -> Self {
        self.max_length = Some(distance);
        self
    }
}

fn type_allowed(filter: Option<&[EdgeType]>, edge_type: EdgeType) -> bool {
    match filter {
        Some(types) if !types.is_empty() => types.contains(&edge_type),
        _ => true,
    }
}

/// Heap entry ordered so that `BinaryHeap` pops the cheapest node first,
/// preferring fewer hops and then the smaller id on equal cost.
#[derive(Debug, PartialEq)]
struct Frontier<'a> {
    cost: f64,
    hops: usize,
    node: &'a str,
}

impl Eq for Frontier<'_> {}

impl Ord for Frontier<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.hops.cmp(&self.hops))
            .then_with(|| other.node.cmp(self.node))
    }
}

impl PartialOrd for Frontier<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest-path tree rooted at one source.
#[derive(Debug)]
pub(crate) struct ShortestPaths<'a> {
    source: &'a str,
    best: HashMap<&'a str, (f64, usize)>,
    parent: HashMap<&'a str, &'a Edge>,
}

impl<'a> ShortestPaths<'a> {
    /// Reachable nodes other than the source.
    pub(crate) fn reached(&self) -> impl Iterator<Item = &'a str> + '_ {
        let source = self.source;
        self.best.keys().copied().filter(move |n| *n != source)
    }

    pub(crate) fn hops_to(&self, target: &str) -> Option<usize> {
        self.best.get(target).map(|&(_, hops)| hops)
    }

    /// Edges from the source to `target`, in walking order.
    pub(crate) fn edges_to(&self, target: &str) -> Option<Vec<&'a Edge>> {
        if !self.best.contains_key(target) {
            return None;
        }
        let mut edges = Vec::new();
        let mut current = target;
        while current != self.source {
            let edge = self.parent.get(current)?;
            edges.push(*edge);
            current = edge.source_id.as_str();
        }
        edges.reverse();
        Some(edges)
    }

    /// Whether the tree's path to `target` passes through `via`.
    pub(crate) fn passes_through(&self, target: &str, via: &str) -> bool {
        if !self.best.contains_key(target) {
            return false;
        }
        let mut current = target;
        while current != self.source {
            if current == via {
                return true;
            }
            match self.parent.get(current) {
                Some(edge) => current = edge.source_id.as_str(),
                None => return false,
            }
        }
        current == via
    }
}

impl GraphIndex {
    /// Dijkstra over outgoing edges with `1 - strength` as the cost.
    ///
    /// Nodes whose accumulated distance would exceed `max_distance` are never
    /// reached. With `target` set, the search stops as soon as the target is
    /// settled.
    pub(crate) fn shortest_paths<'a>(
        &'a self,
        source: &str,
        target: Option<&str>,
        edge_types: Option<&[EdgeType]>,
        max_distance: f64,
    ) -> ShortestPaths<'a> {
        let mut tree = ShortestPaths {
            source: "",
            best: HashMap::new(),
            parent: HashMap::new(),
        };
        let Some((source, _)) = self.nodes.get_key_value(source) else {
            return tree;
        };
        tree.source = source.as_str();
        tree.best.insert(source.as_str(), (0.0, 0));

        let mut settled: HashSet<&str> = HashSet::new();
        let mut heap = BinaryHeap::new();
        heap.push(Frontier {
            cost: 0.0,
            hops: 0,
            node: source.as_str(),
        });

        while let Some(Frontier { cost, hops, node }) = heap.pop() {
            if !settled.insert(node) {
                continue;
            }
            if target == Some(node) {
                break;
            }
            for edge in self.outgoing_edges(node) {
                if !type_allowed(edge_types, edge.edge_type) {
                    continue;
                }
                let next = edge.target_id.as_str();
                if settled.contains(next) {
                    continue;
                }
                let next_cost = cost + edge.distance();
                if next_cost > max_distance {
                    continue;
                }
                let next_hops = hops + 1;
                let improves = match tree.best.get(next) {
                    None => true,
                    Some(&(c, h)) => next_cost < c || (next_cost == c && next_hops < h),
                };
                if improves {
                    tree.best.insert(next, (next_cost, next_hops));
                    tree.parent.insert(next, edge);
                    heap.push(Frontier {
                        cost: next_cost,
                        hops: next_hops,
                        node: next,
                    });
                }
            }
        }
        tree
    }

    fn path_from_edges(&self, source: &str, edges: &[&Edge]) -> Result<GraphPath> {
        let mut nodes: Vec<Node> = Vec::with_capacity(edges.len() + 1);
        nodes.push(self.node(source)?.clone());
        for edge in edges {
            nodes.push(self.node(&edge.target_id)?.clone());
        }
        Ok(GraphPath::new(
            nodes,
            edges.iter().map(|e| (*e).clone()).collect(),
        ))
    }
}

impl<P: Persistence> GraphStore<P> {
    /// Breadth-first expansion over outgoing edges from `start`.
    ///
    /// Every node is reported once, at the depth where it was first
    /// discovered, scored `strength / (1 + depth) * type boost` where `depth`
    /// is the depth of the node the edge leaves from. Results are sorted by
    /// descending score.
    pub fn find_connected_nodes(
        &self,
        start: &str,
        query: &NeighborhoodQuery,
    ) -> Result<Vec<SearchResult>> {
        self.metrics.record_search();
        let index = self.read()?;
        let start = index.node(start)?.id.as_str();

        let mut results = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut parent: HashMap<&str, &Edge> = HashMap::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(start, 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= query.max_depth {
                continue;
            }
            for edge in index.outgoing_edges(current) {
                if !query.follows(edge) {
                    continue;
                }
                let next = edge.target_id.as_str();
                if !visited.insert(next) {
                    continue;
                }
                parent.insert(next, edge);

                let mut walk = vec![edge];
                let mut back = current;
                while let Some(&prev) = parent.get(back) {
                    walk.push(prev);
                    back = prev.source_id.as_str();
                }
                walk.reverse();

                let relevance_score =
                    edge.strength * (1.0 / (1.0 + depth as f64)) * edge.edge_type.relevance_boost();
                results.push(SearchResult {
                    node: index.node(next)?.clone(),
                    path: index.path_from_edges(start, &walk)?,
                    relevance_score,
                    search_depth: depth + 1,
                });
                queue.push_back((next, depth + 1));
            }
        }

        results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        results.truncate(query.limit.unwrap_or(self.config.max_search_results));
        debug!(start, found = results.len(), "neighborhood search finished");
        Ok(results)
    }

    /// Cheapest path from `source` to `target`, where an edge costs
    /// `1 - strength`. `None` when no path stays within the distance bound.
    pub fn find_shortest_path(
        &self,
        source: &str,
        target: &str,
        query: &PathQuery,
    ) -> Result<Option<GraphPath>> {
        self.metrics.record_path_finding();
        let index = self.read()?;
        index.node(source)?;
        index.node(target)?;

        let max_distance = query.max_length.unwrap_or(self.config.max_path_length);
        let tree = index.shortest_paths(
            source,
            Some(target),
            query.edge_types.as_deref(),
            max_distance,
        );
        let path = match tree.edges_to(target) {
            Some(edges) => Some(index.path_from_edges(source, &edges)?),
            None => None,
        };
        debug!(
            source,
            target,
            hops = ?path.as_ref().map(GraphPath::hops),
            "shortest path search finished"
        );
        Ok(path)
    }
}
