use associa::{
    Config, EdgeType, GraphStore, NeighborhoodQuery, NodeType, PathQuery, Properties,
    SqlitePersistence,
};

fn store_with(edges: &[(&str, &str, EdgeType, f64)]) -> GraphStore<SqlitePersistence> {
    let store =
        GraphStore::open(SqlitePersistence::open_in_memory().unwrap(), Config::default()).unwrap();
    for (source, target, edge_type, strength) in edges {
        for id in [source, target] {
            if !store.contains_node(id).unwrap() {
                store
                    .create_node_with_id(*id, NodeType::Concept, id.to_uppercase(), Properties::new())
                    .unwrap();
            }
        }
        store
            .create_edge(source, target, *edge_type, *strength, Properties::new())
            .unwrap();
    }
    store
}

fn diamond() -> GraphStore<SqlitePersistence> {
    store_with(&[
        ("a", "b", EdgeType::Associative, 0.9),
        ("a", "c", EdgeType::Associative, 0.5),
        ("b", "d", EdgeType::Associative, 0.8),
        ("c", "d", EdgeType::Associative, 0.9),
    ])
}

#[test]
fn diamond_prefers_strong_branch() {
    let store = diamond();
    let path = store
        .find_shortest_path("a", "d", &PathQuery::new())
        .unwrap()
        .expect("path exists");
    assert_eq!(path.node_ids(), vec!["a", "b", "d"]);
    assert_eq!(path.hops(), 2);
    assert_eq!(path.total_strength, 0.8);
}

#[test]
fn diamond_depth_one_neighborhood() {
    let store = diamond();
    let results = store
        .find_connected_nodes("a", &NeighborhoodQuery::new())
        .unwrap();
    let mut ids: Vec<_> = results.iter().map(|r| r.node.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["b", "c"]);
    assert!(results.iter().all(|r| r.search_depth == 1));
}

#[test]
fn deeper_search_reports_each_node_once() {
    let store = diamond();
    let results = store
        .find_connected_nodes("a", &NeighborhoodQuery::new().max_depth(3))
        .unwrap();
    assert_eq!(results.len(), 3);

    let d = results.iter().find(|r| r.node.id == "d").unwrap();
    assert_eq!(d.search_depth, 2);
    assert_eq!(d.path.node_ids(), vec!["a", "b", "d"]);
    assert!((d.relevance_score - 0.8 * 0.5).abs() < 1e-12);
    assert_eq!(d.path.total_strength, 0.8);
}

#[test]
fn neighborhood_scores_use_type_boost_and_sort() {
    let store = store_with(&[
        ("s", "x", EdgeType::Causal, 0.5),
        ("s", "y", EdgeType::Hierarchical, 0.52),
        ("s", "z", EdgeType::Similarity, 0.5),
    ]);
    let results = store
        .find_connected_nodes("s", &NeighborhoodQuery::new())
        .unwrap();
    let order: Vec<_> = results.iter().map(|r| r.node.id.as_str()).collect();
    assert_eq!(order, vec!["x", "z", "y"]);
    assert!((results[0].relevance_score - 0.6).abs() < 1e-12);
    assert!((results[1].relevance_score - 0.55).abs() < 1e-12);
}

#[test]
fn neighborhood_filters_and_limits() {
    let store = diamond();
    let strong = store
        .find_connected_nodes("a", &NeighborhoodQuery::new().max_depth(2).min_strength(0.8))
        .unwrap();
    let ids: Vec<_> = strong.iter().map(|r| r.node.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "d"]);

    let causal_only = store
        .find_connected_nodes("a", &NeighborhoodQuery::new().edge_types([EdgeType::Causal]))
        .unwrap();
    assert!(causal_only.is_empty());

    let capped = store
        .find_connected_nodes("a", &NeighborhoodQuery::new().max_depth(2).limit(1))
        .unwrap();
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].node.id, "b");

    assert!(store
        .find_connected_nodes("a", &NeighborhoodQuery::new().max_depth(0))
        .unwrap()
        .is_empty());
}

#[test]
fn cycles_terminate() {
    let store = store_with(&[
        ("a", "b", EdgeType::Sequential, 0.7),
        ("b", "c", EdgeType::Sequential, 0.7),
        ("c", "a", EdgeType::Sequential, 0.7),
    ]);
    let results = store
        .find_connected_nodes("a", &NeighborhoodQuery::new().max_depth(10))
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.node.id != "a"));
}

#[test]
fn path_edge_cases() {
    let store = diamond();
    let itself = store
        .find_shortest_path("b", "b", &PathQuery::new())
        .unwrap()
        .unwrap();
    assert_eq!(itself.node_ids(), vec!["b"]);
    assert_eq!(itself.hops(), 0);
    assert_eq!(itself.total_strength, 1.0);

    // edges are directed
    assert!(store
        .find_shortest_path("d", "a", &PathQuery::new())
        .unwrap()
        .is_none());
    assert!(store
        .find_shortest_path("a", "d", &PathQuery::new().max_length(0.25))
        .unwrap()
        .is_none());
    assert!(store
        .find_shortest_path("a", "ghost", &PathQuery::new())
        .unwrap_err()
        .is_not_found());
    assert!(store
        .find_connected_nodes("ghost", &NeighborhoodQuery::new())
        .unwrap_err()
        .is_not_found());
}

#[test]
fn path_respects_edge_types() {
    let store = store_with(&[
        ("a", "b", EdgeType::Causal, 0.9),
        ("b", "d", EdgeType::Causal, 0.9),
        ("a", "c", EdgeType::Temporal, 0.3),
        ("c", "d", EdgeType::Temporal, 0.3),
    ]);
    let path = store
        .find_shortest_path("a", "d", &PathQuery::new().edge_types([EdgeType::Temporal]))
        .unwrap()
        .unwrap();
    assert_eq!(path.node_ids(), vec!["a", "c", "d"]);
    assert_eq!(path.total_strength, 0.3);
}

#[test]
fn queries_are_counted() {
    let store = diamond();
    store
        .find_connected_nodes("a", &NeighborhoodQuery::new())
        .unwrap();
    store
        .find_shortest_path("a", "d", &PathQuery::new())
        .unwrap();
    store
        .find_shortest_path("a", "c", &PathQuery::new())
        .unwrap();
    let stats = store.get_graph_statistics().unwrap();
    assert_eq!(stats.search_operations, 1);
    assert_eq!(stats.path_finding_operations, 2);
}

#[test]
fn bound_applies_to_accumulated_distance() {
    let store = store_with(&[
        ("a", "x", EdgeType::Associative, 1.0),
        ("x", "y", EdgeType::Associative, 1.0),
        ("a", "y", EdgeType::Associative, 0.1),
        ("y", "t", EdgeType::Associative, 1.0),
    ]);
    // the three-hop route costs nothing, so it fits a bound of 2
    let path = store
        .find_shortest_path("a", "t", &PathQuery::new().max_length(2.0))
        .unwrap()
        .expect("path within bound");
    assert_eq!(path.node_ids(), vec!["a", "x", "y", "t"]);
    assert_eq!(path.total_strength, 1.0);

    let weak = store_with(&[
        ("a", "b", EdgeType::Sequential, 0.0),
        ("b", "c", EdgeType::Sequential, 0.0),
    ]);
    let bounded = PathQuery::new().max_length(1.5);
    assert!(weak.find_shortest_path("a", "b", &bounded).unwrap().is_some());
    assert!(weak.find_shortest_path("a", "c", &bounded).unwrap().is_none());
    assert!(weak
        .find_shortest_path("a", "c", &PathQuery::new().max_length(2.0))
        .unwrap()
        .is_some());
}
