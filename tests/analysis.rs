use associa::{
    CommunityMethod, Config, EdgeType, GraphError, GraphStore, NodeType, Properties,
    SqlitePersistence,
};

fn store(config: Config, nodes: &[&str], edges: &[(&str, &str, f64)]) -> GraphStore<SqlitePersistence> {
    let store = GraphStore::open(SqlitePersistence::open_in_memory().unwrap(), config).unwrap();
    for id in nodes {
        store
            .create_node_with_id(*id, NodeType::Memory, *id, Properties::new())
            .unwrap();
    }
    for (source, target, strength) in edges {
        store
            .create_edge(source, target, EdgeType::Associative, *strength, Properties::new())
            .unwrap();
    }
    store
}

fn two_triangles(config: Config) -> GraphStore<SqlitePersistence> {
    store(
        config,
        &["a", "b", "c", "d", "e", "f"],
        &[
            ("a", "b", 0.9),
            ("b", "c", 0.9),
            ("a", "c", 0.9),
            ("d", "e", 0.9),
            ("e", "f", 0.9),
            ("d", "f", 0.9),
            ("c", "d", 0.1),
        ],
    )
}

#[test]
fn components_partition_every_node() {
    let store = store(
        Config::default(),
        &["a", "b", "c", "d", "e"],
        &[("a", "b", 0.5), ("c", "b", 0.5), ("d", "e", 0.5)],
    );
    let components = store.connected_components().unwrap();
    assert_eq!(
        components,
        vec![
            vec!["a".to_string(), "b".into(), "c".into()],
            vec!["d".into(), "e".into()],
        ]
    );

    let communities = store
        .detect_communities(CommunityMethod::ConnectedComponents)
        .unwrap();
    assert_eq!(communities.len(), 2);
    assert_eq!(communities["component_1"], vec!["d", "e"]);
}

#[test]
fn louvain_finds_the_two_triangles() {
    let store = two_triangles(Config::default());
    let communities = store.detect_communities(CommunityMethod::Louvain).unwrap();
    let mut groups: Vec<_> = communities.into_values().collect();
    groups.sort();
    assert_eq!(groups, vec![vec!["a", "b", "c"], vec!["d", "e", "f"]]);
}

#[test]
fn seeded_label_propagation_is_reproducible() {
    let first = two_triangles(Config::deterministic(42))
        .detect_communities(CommunityMethod::LabelPropagation)
        .unwrap();
    let second = two_triangles(Config::deterministic(42))
        .detect_communities(CommunityMethod::LabelPropagation)
        .unwrap();
    assert_eq!(first, second);

    let members: usize = first.values().map(Vec::len).sum();
    assert_eq!(members, 6);
}

#[test]
fn community_method_names_parse() {
    let store = two_triangles(Config::deterministic(1));
    let method: CommunityMethod = "connected_components".parse().unwrap();
    assert_eq!(store.detect_communities(method).unwrap().len(), 1);
    assert!(matches!(
        "girvan-newman".parse::<CommunityMethod>(),
        Err(GraphError::Validation(_))
    ));
    assert_eq!(
        store.get_graph_statistics().unwrap().community_detection_operations,
        1
    );
}

#[test]
fn isolated_node_centrality_is_zero() {
    let store = store(Config::default(), &["a", "b", "lonely"], &[("a", "b", 0.5)]);
    let centrality = store.get_node_centrality("lonely").unwrap();
    assert_eq!(centrality.degree_centrality, 0.0);
    assert_eq!(centrality.betweenness_centrality, 0.0);
    assert_eq!(centrality.closeness_centrality, 0.0);
    assert_eq!(centrality.total_connections, 0);
}

#[test]
fn hub_centrality() {
    let store = store(
        Config::default(),
        &["hub", "a", "b", "c"],
        &[("a", "hub", 0.8), ("hub", "b", 0.8), ("hub", "c", 0.8)],
    );
    let hub = store.get_node_centrality("hub").unwrap();
    assert_eq!(hub.total_connections, 3);
    assert_eq!(hub.degree_centrality, 1.0);
    // a->b and a->c pass through the hub, out of 6 ordered pairs
    assert!((hub.betweenness_centrality - 2.0 / 6.0).abs() < 1e-12);
    // hub-b and hub-c are two-node paths
    assert_eq!(hub.closeness_centrality, 0.5);

    let again = store.get_node_centrality("hub").unwrap();
    assert_eq!(again, hub);
    assert!(store.get_node_centrality("nobody").unwrap_err().is_not_found());
}

#[test]
fn empty_graph_analysis() {
    let store = store(Config::default(), &[], &[]);
    assert!(store.connected_components().unwrap().is_empty());
    for method in [
        CommunityMethod::Louvain,
        CommunityMethod::LabelPropagation,
        CommunityMethod::ConnectedComponents,
    ] {
        assert!(store.detect_communities(method).unwrap().is_empty());
    }
}
