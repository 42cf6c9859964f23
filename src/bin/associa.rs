//! Binary entry point for the Associa administrative CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use associa::{
    CommunityMethod, Config, EdgeType, GraphStore, NeighborhoodQuery, NodeType, PathQuery,
    Properties, PropertyValue, SearchFilter, SqlitePersistence, Strength,
};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "associa",
    version,
    about = "Administrative CLI for an Associa memory graph",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    open: OpenArgs,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OpenArgs {
    #[arg(
        long,
        global = true,
        env = "ASSOCIA_DB",
        value_name = "PATH",
        default_value = "associa.db",
        help = "SQLite database file"
    )]
    db: PathBuf,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "TOML config (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PropArgs {
    #[arg(
        long = "prop",
        value_name = "KEY=VALUE",
        action = ArgAction::Append,
        help = "Property to attach; VALUE is read as JSON, else as a string (repeatable)"
    )]
    props: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Print node/edge counts, structure and operation counters")]
    Stats,

    #[command(about = "Create a node")]
    AddNode {
        #[arg(long = "type", value_name = "TYPE", help = "Node type (memory, concept, ...)")]
        node_type: String,

        #[arg(long, help = "Human-readable label")]
        label: String,

        #[arg(long, help = "Explicit node id instead of a generated one")]
        id: Option<String>,

        #[command(flatten)]
        props: PropArgs,
    },

    #[command(about = "Create or replace the edge SOURCE -> TARGET")]
    AddEdge {
        source: String,
        target: String,

        #[arg(long = "type", value_name = "TYPE", help = "Edge type (causal, similarity, ...)")]
        edge_type: String,

        #[arg(
            long,
            default_value = "moderate",
            value_parser = parse_strength,
            help = "Strength in [0, 1] or weak, moderate, strong, very-strong"
        )]
        strength: f64,

        #[command(flatten)]
        props: PropArgs,
    },

    #[command(about = "Search node labels and properties")]
    Search {
        query: String,

        #[arg(long = "type", value_name = "TYPE", action = ArgAction::Append)]
        node_types: Vec<String>,

        #[command(flatten)]
        props: PropArgs,

        #[arg(long)]
        limit: Option<usize>,
    },

    #[command(about = "Expand the outgoing neighborhood of a node")]
    Neighbors {
        node: String,

        #[arg(long, default_value_t = 1)]
        depth: usize,

        #[arg(long)]
        min_strength: Option<f64>,

        #[arg(long = "edge-type", value_name = "TYPE", action = ArgAction::Append)]
        edge_types: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    #[command(about = "Find the strongest path between two nodes")]
    Path {
        source: String,
        target: String,

        #[arg(long, help = "Maximum summed distance (1 - strength per edge)")]
        max_length: Option<f64>,

        #[arg(long = "edge-type", value_name = "TYPE", action = ArgAction::Append)]
        edge_types: Vec<String>,
    },

    #[command(about = "Partition the graph into communities")]
    Communities {
        #[arg(long, default_value = "louvain")]
        method: String,
    },

    #[command(about = "Degree, betweenness and closeness of one node")]
    Centrality { node: String },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = open_store(&cli.open)?;

    match cli.command {
        Command::Stats => {
            let stats = store.get_graph_statistics()?;
            emit(cli.format, &stats, || {
                println!("nodes={} edges={}", stats.total_nodes, stats.total_edges);
                for (node_type, count) in &stats.node_types {
                    println!("  node_type {node_type}: {count}");
                }
                for (edge_type, count) in &stats.edge_types {
                    println!("  edge_type {edge_type}: {count}");
                }
                println!(
                    "components={} largest={} avg_degree={:.3} avg_strength={:.3} density={:.4}",
                    stats.connected_components,
                    stats.largest_component_size,
                    stats.average_degree,
                    stats.average_edge_strength,
                    stats.density
                );
            })?;
        }
        Command::AddNode {
            node_type,
            label,
            id,
            props,
        } => {
            let node_type: NodeType = node_type.parse()?;
            let properties = parse_props(&props.props)?;
            let id = match id {
                Some(id) => store.create_node_with_id(id, node_type, label, properties)?,
                None => store.create_node(node_type, label, properties)?,
            };
            emit(cli.format, &serde_json::json!({ "id": id }), || println!("{id}"))?;
        }
        Command::AddEdge {
            source,
            target,
            edge_type,
            strength,
            props,
        } => {
            let edge_type: EdgeType = edge_type.parse()?;
            let created = store.create_edge(
                &source,
                &target,
                edge_type,
                strength,
                parse_props(&props.props)?,
            )?;
            let edge = store.get_edge(&source, &target)?;
            emit(cli.format, &edge, || {
                let verb = if created { "created" } else { "replaced" };
                println!("{verb} {source} -[{edge_type} {strength}]-> {target}");
            })?;
        }
        Command::Search {
            query,
            node_types,
            props,
            limit,
        } => {
            let mut filter = SearchFilter::new().node_types(parse_all::<NodeType>(&node_types)?);
            for (key, value) in parse_props(&props.props)? {
                filter = filter.property(key, value);
            }
            if let Some(limit) = limit {
                filter = filter.limit(limit);
            }
            let results = store.search_nodes(&query, &filter)?;
            emit(cli.format, &results, || {
                for hit in &results {
                    println!(
                        "{:.3}  {}  [{}] {}",
                        hit.relevance_score, hit.node.id, hit.node.node_type, hit.node.label
                    );
                }
            })?;
        }
        Command::Neighbors {
            node,
            depth,
            min_strength,
            edge_types,
            limit,
        } => {
            let mut query = NeighborhoodQuery::new()
                .max_depth(depth)
                .edge_types(parse_all::<EdgeType>(&edge_types)?);
            query.min_strength = min_strength;
            query.limit = limit;
            let results = store.find_connected_nodes(&node, &query)?;
            emit(cli.format, &results, || {
                for hit in &results {
                    println!(
                        "{:.3}  depth={}  {}  via {}",
                        hit.relevance_score,
                        hit.search_depth,
                        hit.node.label,
                        hit.path.node_ids().join(" -> ")
                    );
                }
            })?;
        }
        Command::Path {
            source,
            target,
            max_length,
            edge_types,
        } => {
            let mut query = PathQuery::new().edge_types(parse_all::<EdgeType>(&edge_types)?);
            query.max_length = max_length;
            let path = store.find_shortest_path(&source, &target, &query)?;
            emit(cli.format, &path, || match &path {
                Some(path) => println!(
                    "{} (hops={}, strength={:.3})",
                    path.node_ids().join(" -> "),
                    path.hops(),
                    path.total_strength
                ),
                None => println!("no path from {source} to {target}"),
            })?;
        }
        Command::Communities { method } => {
            let method: CommunityMethod = method.parse()?;
            let communities = store.detect_communities(method)?;
            emit(cli.format, &communities, || {
                for (label, members) in &communities {
                    println!("{label} ({}): {}", members.len(), members.join(", "));
                }
            })?;
        }
        Command::Centrality { node } => {
            let centrality = store.get_node_centrality(&node)?;
            emit(cli.format, &centrality, || {
                println!(
                    "degree={:.4} betweenness={:.4} closeness={:.4} connections={}",
                    centrality.degree_centrality,
                    centrality.betweenness_centrality,
                    centrality.closeness_centrality,
                    centrality.total_connections
                );
            })?;
        }
    }
    Ok(())
}

fn open_store(args: &OpenArgs) -> Result<GraphStore<SqlitePersistence>, Box<dyn Error>> {
    let config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let persistence = SqlitePersistence::open(&args.db, &config.persistence)?;
    Ok(GraphStore::open(persistence, config)?)
}

fn parse_props(raw: &[String]) -> Result<Properties, Box<dyn Error>> {
    let mut properties = Properties::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| format!("property '{entry}' must look like KEY=VALUE"))?;
        let value = serde_json::from_str::<PropertyValue>(value)
            .unwrap_or_else(|_| PropertyValue::String(value.to_string()));
        properties.insert(key.trim().to_string(), value);
    }
    Ok(properties)
}

fn parse_strength(raw: &str) -> Result<f64, String> {
    let preset = match raw.to_ascii_lowercase().replace('_', "-").as_str() {
        "weak" => Some(Strength::Weak),
        "moderate" => Some(Strength::Moderate),
        "strong" => Some(Strength::Strong),
        "very-strong" => Some(Strength::VeryStrong),
        _ => None,
    };
    match preset {
        Some(strength) => Ok(strength.value()),
        None => raw
            .parse::<f64>()
            .map_err(|err| format!("invalid strength '{raw}': {err}")),
    }
}

fn parse_all<T>(raw: &[String]) -> Result<Vec<T>, associa::GraphError>
where
    T: std::str::FromStr<Err = associa::GraphError>,
{
    raw.iter().map(|s| s.parse()).collect()
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}
