use std::collections::{BTreeMap, BTreeSet};

use associa::{
    Config, Direction, EdgeType, GraphStore, NodeType, Properties, PropertyValue,
    SqlitePersistence,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    CreateEdge { from: usize, to: usize, edge_type: EdgeType, strength: f64 },
    UpdateStrength { from: usize, to: usize, strength: f64 },
    DeleteEdge { from: usize, to: usize },
    DeleteNode { node: usize },
}

const NODES: usize = 8;

fn arb_edge_type() -> impl Strategy<Value = EdgeType> {
    prop::sample::select(EdgeType::ALL.to_vec())
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => (0..NODES, 0..NODES, arb_edge_type(), 0.0f64..=1.0).prop_map(
            |(from, to, edge_type, strength)| Operation::CreateEdge { from, to, edge_type, strength }
        ),
        1 => (0..NODES, 0..NODES, 0.0f64..=1.0)
            .prop_map(|(from, to, strength)| Operation::UpdateStrength { from, to, strength }),
        1 => (0..NODES, 0..NODES).prop_map(|(from, to)| Operation::DeleteEdge { from, to }),
        1 => (0..NODES).prop_map(|node| Operation::DeleteNode { node }),
    ]
}

fn id(i: usize) -> String {
    format!("n{i}")
}

fn seeded_store() -> GraphStore<SqlitePersistence> {
    let store =
        GraphStore::open(SqlitePersistence::open_in_memory().unwrap(), Config::default()).unwrap();
    for i in 0..NODES {
        let mut props = Properties::new();
        props.insert("slot".into(), PropertyValue::Int(i as i64));
        store
            .create_node_with_id(id(i), NodeType::Memory, format!("memory {i}"), props)
            .unwrap();
    }
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn adjacency_matches_edge_table(ops in prop::collection::vec(arb_operation(), 1..60)) {
        let store = seeded_store();
        let mut model: BTreeMap<(String, String), f64> = BTreeMap::new();
        let mut alive: BTreeSet<String> = (0..NODES).map(id).collect();

        for op in ops {
            match op {
                Operation::CreateEdge { from, to, edge_type, strength } => {
                    let result = store.create_edge(&id(from), &id(to), edge_type, strength, Properties::new());
                    if alive.contains(&id(from)) && alive.contains(&id(to)) {
                        let created = result.unwrap();
                        prop_assert_eq!(created, !model.contains_key(&(id(from), id(to))));
                        model.insert((id(from), id(to)), strength);
                    } else {
                        prop_assert!(result.unwrap_err().is_not_found());
                    }
                }
                Operation::UpdateStrength { from, to, strength } => {
                    let result = store.update_edge_strength(&id(from), &id(to), strength);
                    match model.get_mut(&(id(from), id(to))) {
                        Some(current) => {
                            result.unwrap();
                            *current = strength;
                        }
                        None => prop_assert!(result.unwrap_err().is_not_found()),
                    }
                }
                Operation::DeleteEdge { from, to } => {
                    let result = store.delete_edge(&id(from), &id(to));
                    match model.remove(&(id(from), id(to))) {
                        Some(_) => { result.unwrap(); }
                        None => prop_assert!(result.unwrap_err().is_not_found()),
                    }
                }
                Operation::DeleteNode { node } => {
                    let result = store.delete_node(&id(node));
                    if alive.remove(&id(node)) {
                        let removed = result.unwrap();
                        let before = model.len();
                        model.retain(|(s, t), _| *s != id(node) && *t != id(node));
                        prop_assert_eq!(removed.len(), before - model.len());
                    } else {
                        prop_assert!(result.unwrap_err().is_not_found());
                    }
                }
            }
        }

        prop_assert!(store.verify_integrity().unwrap().is_empty());
        prop_assert_eq!(store.edge_count().unwrap(), model.len());
        prop_assert_eq!(store.node_count().unwrap(), alive.len());

        for node in &alive {
            let out = store.neighbors(node, Direction::Outgoing).unwrap();
            let inc = store.neighbors(node, Direction::Incoming).unwrap();
            let touching = model.keys().filter(|(s, t)| s == node || t == node).count();
            let self_loops = usize::from(model.contains_key(&(node.clone(), node.clone())));
            prop_assert_eq!(out.len() + inc.len(), touching + self_loops);
        }
        for ((source, target), strength) in &model {
            let edge = store.get_edge(source, target).unwrap();
            prop_assert_eq!(edge.strength, *strength);
        }
    }

    #[test]
    fn path_strength_is_the_weakest_edge(
        strengths in prop::collection::vec(0.0f64..=1.0, 1..NODES)
    ) {
        let store = seeded_store();
        for (i, strength) in strengths.iter().enumerate() {
            store
                .create_edge(&id(i), &id(i + 1), EdgeType::Sequential, *strength, Properties::new())
                .unwrap();
        }
        let path = store
            .find_shortest_path(&id(0), &id(strengths.len()), &Default::default())
            .unwrap()
            .unwrap();
        let weakest = strengths.iter().copied().fold(f64::INFINITY, f64::min);
        prop_assert_eq!(path.hops(), strengths.len());
        prop_assert_eq!(path.total_strength, weakest);
    }

    #[test]
    fn neighborhood_never_exceeds_depth(
        ops in prop::collection::vec((0..NODES, 0..NODES, 0.0f64..=1.0), 0..30),
        depth in 0usize..4,
    ) {
        let store = seeded_store();
        for (from, to, strength) in ops {
            store
                .create_edge(&id(from), &id(to), EdgeType::Associative, strength, Properties::new())
                .unwrap();
        }
        let query = associa::NeighborhoodQuery::new().max_depth(depth);
        let results = store.find_connected_nodes(&id(0), &query).unwrap();
        let mut seen = BTreeSet::new();
        for result in &results {
            prop_assert!(result.search_depth >= 1 && result.search_depth <= depth);
            prop_assert_eq!(result.path.hops(), result.search_depth);
            prop_assert!(result.node.id != id(0));
            prop_assert!(seen.insert(result.node.id.clone()));
        }
        for pair in results.windows(2) {
            prop_assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
    }
}
