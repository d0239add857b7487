use super::{GraphNode, GraphStore, GraphValue, PropertyValue, Record, Statement};
use crate::types::{IngestError, Result};
use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "neo4j://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            database: "neo4j".to_string(),
        }
    }
}

/// Thin wrapper around neo4rs::Graph that speaks [`Statement`]/[`Record`].
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .fetch_size(500)
            .max_connections(10)
            .build()
            .map_err(|e| IngestError::Config(e.to_string()))?;
        let graph = Graph::connect(neo_config).await?;
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn run(&self, statement: Statement) -> Result<Vec<Record>> {
        debug!("Running statement returning {:?}", statement.returns);

        let mut stream = self.graph.execute(to_query(&statement)).await?;
        let mut records = Vec::new();
        while let Some(row) = stream.next().await? {
            let mut record = Record::new();
            for column in &statement.returns {
                if let Some(value) = column_value(&row, column) {
                    record.push(column, value);
                }
            }
            records.push(record);
        }

        debug!("Statement returned {} records", records.len());
        Ok(records)
    }
}

fn to_query(statement: &Statement) -> Query {
    let mut q = query(&statement.cypher);
    for (key, value) in &statement.params {
        q = match value {
            PropertyValue::String(s) => q.param(key, s.clone()),
            PropertyValue::Integer(i) => q.param(key, *i),
            PropertyValue::Float(f) => q.param(key, *f),
            PropertyValue::Boolean(b) => q.param(key, *b),
        };
    }
    q
}

fn column_value(row: &neo4rs::Row, column: &str) -> Option<GraphValue> {
    if let Ok(node) = row.get::<neo4rs::Node>(column) {
        return Some(GraphValue::Node(to_graph_node(&node)));
    }
    if let Ok(s) = row.get::<String>(column) {
        return Some(GraphValue::Scalar(PropertyValue::String(s)));
    }
    if let Ok(b) = row.get::<bool>(column) {
        return Some(GraphValue::Scalar(PropertyValue::Boolean(b)));
    }
    if let Ok(i) = row.get::<i64>(column) {
        return Some(GraphValue::Scalar(PropertyValue::Integer(i)));
    }
    row.get::<f64>(column)
        .ok()
        .map(|f| GraphValue::Scalar(PropertyValue::Float(f)))
}

fn to_graph_node(node: &neo4rs::Node) -> GraphNode {
    let mut out = GraphNode::new(node.id().to_string());
    for key in node.keys() {
        if let Some(value) = node_property(node, key) {
            out.properties.insert(key.to_string(), value);
        }
    }
    out
}

// Order matters: an integer would also deserialize as f64.
fn node_property(node: &neo4rs::Node, key: &str) -> Option<PropertyValue> {
    if let Ok(s) = node.get::<String>(key) {
        return Some(PropertyValue::String(s));
    }
    if let Ok(b) = node.get::<bool>(key) {
        return Some(PropertyValue::Boolean(b));
    }
    if let Ok(i) = node.get::<i64>(key) {
        return Some(PropertyValue::Integer(i));
    }
    node.get::<f64>(key).ok().map(PropertyValue::Float)
}
