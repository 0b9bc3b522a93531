//! Bolt property-graph backend (Neo4j) over `neo4rs`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use graphmap_core::{Capabilities, ConnectionUri, EntityType, Node, Value};
use neo4rs::{BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph, Query};

use crate::backend::{plain_name, GraphBackend};
use crate::driver::{Params, QueryDriver, ResultElement, ResultRow};
use crate::error::{GraphError, Result};

const DEFAULT_USER: &str = "neo4j";
const MAX_CONNECTIONS: usize = 16;
const FETCH_SIZE: usize = 256;

// ── Driver ───────────────────────────────────────────────────────

/// Pooled bolt connection. Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct Neo4jDriver {
    graph: Graph,
}

impl Neo4jDriver {
    pub async fn connect(uri: &ConnectionUri) -> Result<Self> {
        let address = format!("bolt://{}", uri.address());
        let mut builder = ConfigBuilder::default()
            .uri(&address)
            .user(uri.user.as_deref().unwrap_or(DEFAULT_USER))
            .password(uri.password.as_deref().unwrap_or_default())
            .max_connections(MAX_CONNECTIONS)
            .fetch_size(FETCH_SIZE);
        if let Some(db) = uri.database.as_deref() {
            builder = builder.db(db);
        }
        let config = builder
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %address, "Connected to Neo4j");
        Ok(Self { graph })
    }
}

fn build_query(statement: &str, params: Params) -> Query {
    params
        .into_iter()
        .fold(neo4rs::query(statement), |q, (key, value)| {
            q.param(&key, to_bolt(&value))
        })
}

fn to_bolt(value: &serde_json::Value) -> BoltType {
    match value {
        serde_json::Value::Null => BoltType::Null(BoltNull),
        serde_json::Value::Bool(b) => BoltType::from(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => BoltType::from(s.as_str()),
        serde_json::Value::Array(items) => {
            let mut list = BoltList::with_capacity(items.len());
            for item in items {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        }
        serde_json::Value::Object(map) => {
            let mut bolt = BoltMap::with_capacity(map.len());
            for (k, v) in map {
                bolt.put(BoltString::from(k.as_str()), to_bolt(v));
            }
            BoltType::Map(bolt)
        }
    }
}

/// Read one stored property as the narrowest matching scalar.
fn read_property(node: &neo4rs::Node, key: &str) -> Option<Value> {
    if let Ok(ts) = node.get::<DateTime<FixedOffset>>(key) {
        return Some(Value::Timestamp(ts));
    }
    if let Ok(b) = node.get::<bool>(key) {
        return Some(Value::Boolean(b));
    }
    if let Ok(i) = node.get::<i64>(key) {
        return Some(Value::Integer(i));
    }
    if let Ok(f) = node.get::<f64>(key) {
        return Some(Value::Float(f));
    }
    node.get::<String>(key).ok().map(Value::Text)
}

fn to_element(node: &neo4rs::Node) -> ResultElement {
    let properties = node
        .keys()
        .into_iter()
        .map(|k| k.to_string())
        .filter_map(|key| match read_property(node, &key) {
            Some(value) => Some((key, value)),
            None => {
                tracing::debug!(key = %key, "Skipping non-scalar property");
                None
            }
        })
        .collect();

    ResultElement {
        id: Some(node.id()),
        labels: node.labels().into_iter().map(|l| l.to_string()).collect(),
        properties,
    }
}

#[async_trait]
impl QueryDriver for Neo4jDriver {
    async fn run(&self, statement: &str, params: Params) -> Result<()> {
        tracing::debug!(statement, "Running statement");
        self.graph.run(build_query(statement, params)).await?;
        Ok(())
    }

    async fn fetch_rows(
        &self,
        statement: &str,
        params: Params,
        columns: &[&str],
    ) -> Result<Vec<ResultRow>> {
        tracing::debug!(statement, ?columns, "Fetching rows");
        let mut stream = self.graph.execute(build_query(statement, params)).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            let mut result = ResultRow::default();
            for &column in columns {
                match row.get::<neo4rs::Node>(column) {
                    Ok(node) => result.columns.push((column.to_string(), to_element(&node))),
                    Err(e) => tracing::debug!(column, error = %e, "Column is not a node"),
                }
            }
            rows.push(result);
        }
        Ok(rows)
    }
}

// ── Backend ──────────────────────────────────────────────────────

/// Adapter for stores with native constraints and multi-label nodes.
pub struct Neo4jBackend {
    driver: Arc<dyn QueryDriver>,
    capabilities: Capabilities,
    batch_size: usize,
}

impl Neo4jBackend {
    pub fn new(driver: Arc<dyn QueryDriver>, enterprise: bool, batch_size: usize) -> Self {
        Self {
            driver,
            capabilities: Capabilities::neo4j(enterprise),
            batch_size: batch_size.max(1),
        }
    }
}

pub(crate) fn node_constraint_statement(label: &str, attribute: &str) -> String {
    format!(
        "CREATE CONSTRAINT {}_unique_{} IF NOT EXISTS FOR (p:{label}) REQUIRE p.{attribute} IS UNIQUE",
        plain_name(label),
        plain_name(attribute),
    )
}

pub(crate) fn edge_constraint_statement(label: &str, attribute: &str) -> String {
    format!(
        "CREATE CONSTRAINT {}_exists_{} IF NOT EXISTS FOR ()-[p:{label}]-() REQUIRE p.{attribute} IS NOT NULL",
        plain_name(label),
        plain_name(attribute),
    )
}

pub(crate) fn index_statement(label: &str, attribute: &str) -> String {
    format!(
        "CREATE INDEX index_{}_{} IF NOT EXISTS FOR (n:{label}) ON (n.{attribute})",
        plain_name(attribute),
        plain_name(label),
    )
}

#[async_trait]
impl GraphBackend for Neo4jBackend {
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn driver(&self) -> &dyn QueryDriver {
        self.driver.as_ref()
    }

    async fn save_node(&self, node: &mut Node) -> Result<()> {
        match self.insert_node(node).await {
            Err(e) if e.is_conflict() => Err(GraphError::AlreadyExists {
                identity: node.identity().unwrap_or_default().to_string(),
            }),
            other => other,
        }
    }

    async fn create_node_constraint(&self, entity_type: &EntityType, attribute: &str) -> Result<()> {
        for label in entity_type.labels() {
            self.driver
                .run(&node_constraint_statement(label, attribute), Params::new())
                .await?;
        }
        Ok(())
    }

    async fn create_edge_constraint(&self, entity_type: &EntityType, attribute: &str) -> Result<()> {
        if !self.capabilities.edge_constraints {
            return Ok(());
        }
        for label in entity_type.labels() {
            self.driver
                .run(&edge_constraint_statement(label, attribute), Params::new())
                .await?;
        }
        Ok(())
    }

    async fn create_index(&self, entity_type: &EntityType, attribute: &str) -> Result<()> {
        for label in entity_type.labels() {
            self.driver
                .run(&index_statement(label, attribute), Params::new())
                .await?;
        }
        Ok(())
    }
}
