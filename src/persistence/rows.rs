//! Row codecs for `graph_nodes` and `graph_edges`.
//!
//! Enums are stored by name, timestamps as RFC 3339 text and properties as a
//! JSON object. Every function takes a borrowed connection so it can be
//! handed straight to [`Persistence::execute`](super::Persistence::execute).

use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::model::{Edge, EdgeType, Node, NodeType, Properties};

/// Creates both tables and their indices if missing.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS graph_nodes (
            id TEXT PRIMARY KEY,
            node_type TEXT NOT NULL,
            label TEXT NOT NULL,
            properties TEXT NOT NULL,
            created_at TEXT NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 0,
            last_accessed TEXT
        );
        CREATE TABLE IF NOT EXISTS graph_edges (
            source_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            edge_type TEXT NOT NULL,
            strength REAL NOT NULL,
            properties TEXT NOT NULL,
            created_at TEXT NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (source_id, target_id)
        );
        CREATE INDEX IF NOT EXISTS idx_graph_edges_target ON graph_edges (target_id);
        CREATE INDEX IF NOT EXISTS idx_graph_edges_type ON graph_edges (edge_type);",
    )
}

/// Inserts or replaces a node row.
pub fn upsert_node(conn: &Connection, node: &Node) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO graph_nodes
            (id, node_type, label, properties, created_at, access_count, last_accessed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            node.id,
            node.node_type.as_str(),
            node.label,
            encode_properties(&node.properties)?,
            encode_timestamp(node.created_at)?,
            count_to_sql(node.access_count),
            encode_timestamp(node.last_accessed)?,
        ],
    )?;
    Ok(())
}

/// Inserts or replaces the edge row for `(source, target)`.
pub fn upsert_edge(conn: &Connection, edge: &Edge) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO graph_edges
            (source_id, target_id, edge_type, strength, properties, created_at, access_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            edge.source_id,
            edge.target_id,
            edge.edge_type.as_str(),
            edge.strength,
            encode_properties(&edge.properties)?,
            encode_timestamp(edge.created_at)?,
            count_to_sql(edge.access_count),
        ],
    )?;
    Ok(())
}

/// Removes a node row together with every edge touching it.
pub fn delete_node_rows(conn: &Connection, node_id: &str) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let edges = tx.execute(
        "DELETE FROM graph_edges WHERE source_id = ?1 OR target_id = ?1",
        params![node_id],
    )?;
    tx.execute("DELETE FROM graph_nodes WHERE id = ?1", params![node_id])?;
    tx.commit()?;
    Ok(edges)
}

/// Removes one edge row. `false` when there was none.
pub fn delete_edge_row(conn: &Connection, source_id: &str, target_id: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM graph_edges WHERE source_id = ?1 AND target_id = ?2",
        params![source_id, target_id],
    )?;
    Ok(removed > 0)
}

/// Every node row.
pub fn load_nodes(conn: &Connection) -> rusqlite::Result<Vec<Node>> {
    let mut stmt = conn.prepare(
        "SELECT id, node_type, label, properties, created_at, access_count, last_accessed
         FROM graph_nodes ORDER BY rowid",
    )?;
    let nodes = stmt.query_map([], node_from_row)?;
    nodes.collect()
}

/// Every edge row.
pub fn load_edges(conn: &Connection) -> rusqlite::Result<Vec<Edge>> {
    let mut stmt = conn.prepare(
        "SELECT source_id, target_id, edge_type, strength, properties, created_at, access_count
         FROM graph_edges ORDER BY rowid",
    )?;
    let edges = stmt.query_map([], edge_from_row)?;
    edges.collect()
}

/// `(nodes, edges)` row counts as stored.
pub fn count_rows(conn: &Connection) -> rusqlite::Result<(u64, u64)> {
    let nodes: i64 = conn.query_row("SELECT COUNT(*) FROM graph_nodes", [], |row| row.get(0))?;
    let edges: i64 = conn.query_row("SELECT COUNT(*) FROM graph_edges", [], |row| row.get(0))?;
    Ok((count_from_sql(nodes), count_from_sql(edges)))
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
    let node_type: String = row.get(1)?;
    let created_at = decode_timestamp(4, &row.get::<_, String>(4)?)?;
    let last_accessed = match row.get::<_, Option<String>>(6)? {
        Some(text) => decode_timestamp(6, &text)?,
        None => created_at,
    };
    Ok(Node {
        id: row.get(0)?,
        node_type: node_type
            .parse::<NodeType>()
            .map_err(|e| conversion_failure(1, e))?,
        label: row.get(2)?,
        properties: decode_properties(3, &row.get::<_, String>(3)?)?,
        created_at,
        access_count: count_from_sql(row.get(5)?),
        last_accessed,
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    let edge_type: String = row.get(2)?;
    Ok(Edge {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        edge_type: edge_type
            .parse::<EdgeType>()
            .map_err(|e| conversion_failure(2, e))?,
        strength: row.get(3)?,
        properties: decode_properties(4, &row.get::<_, String>(4)?)?,
        created_at: decode_timestamp(5, &row.get::<_, String>(5)?)?,
        access_count: count_from_sql(row.get(6)?),
    })
}

fn encode_properties(properties: &Properties) -> rusqlite::Result<String> {
    serde_json::to_string(properties)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn decode_properties(column: usize, json: &str) -> rusqlite::Result<Properties> {
    serde_json::from_str(json).map_err(|e| conversion_failure(column, e))
}

fn encode_timestamp(ts: OffsetDateTime) -> rusqlite::Result<String> {
    ts.format(&Rfc3339)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn decode_timestamp(column: usize, text: &str) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::parse(text, &Rfc3339).map_err(|e| conversion_failure(column, e))
}

fn conversion_failure<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn count_to_sql(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn count_from_sql(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}
