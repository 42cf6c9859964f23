//! Whole-graph structure: components, communities and centrality.
//!
//! Everything here treats the graph as undirected except the path-based
//! centralities, which reuse the directed shortest-path tree from
//! [`traversal`](super::traversal).

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use super::index::GraphIndex;
use super::GraphStore;
use crate::error::Result;
use crate::model::{Centrality, Communities, CommunityMethod, NodeId};
use crate::persistence::Persistence;

impl GraphIndex {
    /// Undirected connected components, discovered in node id order.
    /// Members of each component are sorted.
    pub(crate) fn connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut components = Vec::new();

        for id in self.nodes.keys() {
            if !visited.insert(id.as_str()) {
                continue;
            }
            let mut component = vec![id.clone()];
            let mut queue = VecDeque::from([id.as_str()]);
            while let Some(current) = queue.pop_front() {
                for neighbor in self.undirected_neighbors(current) {
                    if visited.insert(neighbor) {
                        component.push(neighbor.to_string());
                        queue.push_back(neighbor);
                    }
                }
            }
            component.sort();
            components.push(component);
        }
        components
    }

    /// Asynchronous label propagation. Each pass visits nodes in an order
    /// shuffled by `rng`; a node adopts the most frequent label among its
    /// neighbors, ties going to the label seen first.
    pub(crate) fn label_propagation(
        &self,
        rng: &mut ChaCha8Rng,
        max_iterations: usize,
    ) -> Communities {
        let mut labels: HashMap<&str, &str> = self
            .nodes
            .keys()
            .map(|id| (id.as_str(), id.as_str()))
            .collect();
        let mut order: Vec<&str> = self.nodes.keys().map(String::as_str).collect();

        for iteration in 0..max_iterations {
            order.shuffle(rng);
            let mut changed = 0usize;

            for &node in &order {
                let mut counts: Vec<(&str, usize)> = Vec::new();
                for neighbor in self.undirected_neighbors(node) {
                    let label = labels.get(neighbor).copied().unwrap_or(neighbor);
                    match counts.iter_mut().find(|(l, _)| *l == label) {
                        Some((_, count)) => *count += 1,
                        None => counts.push((label, 1)),
                    }
                }
                let mut winner: Option<(&str, usize)> = None;
                for (label, count) in counts {
                    if winner.map_or(true, |(_, best)| count > best) {
                        winner = Some((label, count));
                    }
                }
                if let Some((label, _)) = winner {
                    if labels.get(node) != Some(&label) {
                        labels.insert(node, label);
                        changed += 1;
                    }
                }
            }

            trace!(iteration, changed, "label propagation pass");
            if changed == 0 {
                break;
            }
        }

        group_by_label(labels)
    }

    /// Greedy community merging.
    ///
    /// Starting from singletons, each node (in id order) moves to the
    /// neighboring community with the largest positive gain, where
    /// `gain = within_target - within_current - penalty * between` over the
    /// node's incident edge strengths. Passes repeat until nothing moves or
    /// `max_passes` is reached.
    pub(crate) fn louvain(&self, penalty: f64, max_passes: usize) -> Communities {
        let mut community: HashMap<&str, &str> = self
            .nodes
            .keys()
            .map(|id| (id.as_str(), id.as_str()))
            .collect();

        for pass in 0..max_passes {
            let mut moved = 0usize;

            for id in self.nodes.keys() {
                let node = id.as_str();
                let Some(&current) = community.get(node) else {
                    continue;
                };
                let incident = self.incident_strengths(node);

                let mut best: Option<(&str, f64)> = None;
                for (neighbor, _) in &incident {
                    let candidate = community.get(neighbor).copied().unwrap_or(*neighbor);
                    if candidate == current {
                        continue;
                    }
                    let (mut within_current, mut within_target, mut between) = (0.0, 0.0, 0.0);
                    for (other, strength) in &incident {
                        match community.get(other).copied().unwrap_or(*other) {
                            c if c == current => within_current += strength,
                            c if c == candidate => within_target += strength,
                            _ => between += strength,
                        }
                    }
                    let gain = within_target - within_current - penalty * between;
                    if gain > best.map_or(0.0, |(_, g)| g) {
                        best = Some((candidate, gain));
                    }
                }

                if let Some((target, _)) = best {
                    community.insert(node, target);
                    moved += 1;
                }
            }

            trace!(pass, moved, "louvain pass");
            if moved == 0 {
                break;
            }
        }

        group_by_label(community)
    }

    /// Strength of every edge touching `node`, keyed by the other endpoint:
    /// incoming edges first, then outgoing. Self-loops are skipped.
    fn incident_strengths<'a>(&'a self, node: &'a str) -> Vec<(&'a str, f64)> {
        self.incoming_edges(node)
            .map(|e| (e.source_id.as_str(), e.strength))
            .chain(
                self.outgoing_edges(node)
                    .map(|e| (e.target_id.as_str(), e.strength)),
            )
            .filter(|(other, _)| *other != node)
            .collect()
    }

    pub(crate) fn degree_centrality(&self, node: &str) -> f64 {
        let others = self.nodes.len().saturating_sub(1).max(1);
        self.degree(node) as f64 / others as f64
    }

    /// Share of ordered pairs `(s, t)`, both distinct from `node`, whose
    /// shortest path runs through `node`.
    ///
    /// Runs one shortest-path search per source, so it is quadratic or worse
    /// in the node count.
    pub(crate) fn betweenness_centrality(&self, node: &str, max_distance: f64) -> f64 {
        let n = self.nodes.len();
        if n < 3 {
            return 0.0;
        }
        let total_pairs = (n - 1) * (n - 2);
        let mut through = 0usize;
        for source in self.nodes.keys().filter(|s| s.as_str() != node) {
            let tree = self.shortest_paths(source, None, None, max_distance);
            through += tree
                .reached()
                .filter(|t| *t != node && tree.passes_through(t, node))
                .count();
        }
        through as f64 / total_pairs as f64
    }

    /// Reachable node count divided by the summed lengths of the paths to
    /// them, where a path's length counts its nodes (one more than its hops).
    pub(crate) fn closeness_centrality(&self, node: &str, max_distance: f64) -> f64 {
        let tree = self.shortest_paths(node, None, None, max_distance);
        let (reachable, length) = tree
            .reached()
            .filter_map(|t| tree.hops_to(t))
            .fold((0usize, 0usize), |(count, sum), hops| (count + 1, sum + hops + 1));
        if length == 0 {
            0.0
        } else {
            reachable as f64 / length as f64
        }
    }
}

fn group_by_label(labels: HashMap<&str, &str>) -> Communities {
    let mut communities: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
    for (node, label) in labels {
        communities
            .entry(label.to_string())
            .or_default()
            .push(node.to_string());
    }
    for members in communities.values_mut() {
        members.sort();
    }
    communities
}

impl<P: Persistence> GraphStore<P> {
    /// Partitions all nodes into undirected connected components.
    pub fn connected_components(&self) -> Result<Vec<Vec<NodeId>>> {
        Ok(self.read()?.connected_components())
    }

    /// Partitions every node into labelled communities.
    pub fn detect_communities(&self, method: CommunityMethod) -> Result<Communities> {
        self.metrics.record_community_detection();
        let index = self.read()?;
        let communities = match method {
            CommunityMethod::Louvain => index.louvain(
                self.config.between_community_penalty,
                self.config.max_louvain_passes,
            ),
            CommunityMethod::LabelPropagation => {
                let seed = self.config.community_seed.unwrap_or_else(rand::random);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                index.label_propagation(&mut rng, self.config.max_label_propagation_iterations)
            }
            CommunityMethod::ConnectedComponents => index
                .connected_components()
                .into_iter()
                .enumerate()
                .map(|(i, members)| (format!("component_{i}"), members))
                .collect(),
        };
        debug!(?method, communities = communities.len(), "community detection finished");
        Ok(communities)
    }

    /// Degree, betweenness and closeness centrality of one node.
    ///
    /// Betweenness is the expensive part; it is cached per node until the
    /// next mutation.
    pub fn get_node_centrality(&self, id: &str) -> Result<Centrality> {
        let index = self.read()?;
        index.node(id)?;
        let max_distance = self.config.max_path_length;

        let version = self.version();
        let cached = self
            .betweenness_cache
            .lock()
            .get(id)
            .filter(|(at, _)| *at == version)
            .map(|&(_, value)| value);
        let betweenness_centrality = match cached {
            Some(value) => value,
            None => {
                let value = index.betweenness_centrality(id, max_distance);
                self.betweenness_cache
                    .lock()
                    .insert(id.to_string(), (version, value));
                value
            }
        };

        Ok(Centrality {
            degree_centrality: index.degree_centrality(id),
            betweenness_centrality,
            closeness_centrality: index.closeness_centrality(id, max_distance),
            total_connections: index.degree(id),
        })
    }
}
