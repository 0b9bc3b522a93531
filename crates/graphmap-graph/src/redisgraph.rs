//! Redis-hosted graph module backend over the `redis` crate.
//!
//! Statements go through `GRAPH.QUERY <graph> <text>`. Parameters are
//! inlined with the module's `CYPHER name=value` header, and results are
//! read from the verbose reply layout `[header, rows, statistics]`.

use std::sync::Arc;

use async_trait::async_trait;
use graphmap_core::cypher;
use graphmap_core::{Capabilities, ConnectionUri, EntityType, Node, Value};
use redis::aio::MultiplexedConnection;

use crate::backend::GraphBackend;
use crate::driver::{Params, QueryDriver, ResultElement, ResultRow};
use crate::error::{GraphError, Result};

// ── Driver ───────────────────────────────────────────────────────

/// Multiplexed connection bound to one graph key.
#[derive(Clone)]
pub struct RedisGraphDriver {
    connection: MultiplexedConnection,
    graph: String,
}

impl RedisGraphDriver {
    pub async fn connect(uri: &ConnectionUri) -> Result<Self> {
        let client = redis::Client::open(uri.redis_url())
            .map_err(|e| GraphError::Connection(e.to_string()))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(host = %uri.host, port = uri.port, graph = %uri.graph, "Connected to Redis graph");
        Ok(Self {
            connection,
            graph: uri.graph.clone(),
        })
    }

    async fn query(&self, statement: &str, params: &Params) -> Result<redis::Value> {
        let text = with_params(statement, params);
        tracing::debug!(graph = %self.graph, statement = %text, "Running graph query");

        let mut connection = self.connection.clone();
        let reply: redis::Value = redis::cmd("GRAPH.QUERY")
            .arg(&self.graph)
            .arg(&text)
            .query_async(&mut connection)
            .await?;
        Ok(reply)
    }
}

/// Prefix the statement with a `CYPHER k=v ...` parameter header.
fn with_params(statement: &str, params: &Params) -> String {
    if params.is_empty() {
        return statement.to_string();
    }
    let header: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{k}={}", cypher::json_literal(v)))
        .collect();
    format!("CYPHER {} {statement}", header.join(" "))
}

fn text_of(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

fn scalar_of(value: &redis::Value) -> Option<Value> {
    match value {
        redis::Value::Int(i) => Some(Value::Integer(*i)),
        redis::Value::Double(f) => Some(Value::Float(*f)),
        redis::Value::Boolean(b) => Some(Value::Boolean(*b)),
        other => text_of(other).map(Value::Text),
    }
}

/// Parse a verbose node cell: `[["id", n], ["labels", [..]], ["properties", [[k, v], ..]]]`.
///
/// Edge cells (which carry `type` instead of `labels`) and scalars yield `None`.
fn parse_node(cell: &redis::Value) -> Option<ResultElement> {
    let redis::Value::Array(fields) = cell else {
        return None;
    };

    let mut element = ResultElement::default();
    let mut has_labels = false;
    for field in fields {
        let redis::Value::Array(pair) = field else {
            return None;
        };
        let [key, value] = pair.as_slice() else {
            return None;
        };
        match text_of(key)?.as_str() {
            "id" => {
                if let redis::Value::Int(id) = value {
                    element.id = Some(*id);
                }
            }
            "labels" => {
                has_labels = true;
                if let redis::Value::Array(labels) = value {
                    element.labels = labels.iter().filter_map(text_of).collect();
                }
            }
            "properties" => {
                if let redis::Value::Array(props) = value {
                    for prop in props {
                        if let redis::Value::Array(kv) = prop {
                            if let [k, v] = kv.as_slice() {
                                if let (Some(k), Some(v)) = (text_of(k), scalar_of(v)) {
                                    element.properties.push((k, v));
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    has_labels.then_some(element)
}

/// Column name of a header cell. Verbose headers carry bare names,
/// compact ones `[type, name]` pairs.
fn column_name(cell: &redis::Value) -> Option<String> {
    match cell {
        redis::Value::Array(parts) => parts.last().and_then(text_of),
        other => text_of(other),
    }
}

/// Collect the node cells of the requested columns from a `GRAPH.QUERY`
/// reply, one [`ResultRow`] per returned row.
pub(crate) fn parse_rows(reply: &redis::Value, columns: &[&str]) -> Vec<ResultRow> {
    let redis::Value::Array(sections) = reply else {
        return Vec::new();
    };
    // Writes without RETURN reply with statistics only.
    if sections.len() < 3 {
        return Vec::new();
    }
    let (redis::Value::Array(header), redis::Value::Array(rows)) = (&sections[0], &sections[1])
    else {
        return Vec::new();
    };
    let names: Vec<Option<String>> = header.iter().map(column_name).collect();

    rows.iter()
        .filter_map(|row| match row {
            redis::Value::Array(cells) => Some(cells),
            _ => None,
        })
        .map(|cells| ResultRow {
            columns: names
                .iter()
                .zip(cells)
                .filter_map(|(name, cell)| {
                    let name = name.as_deref()?;
                    if !columns.contains(&name) {
                        return None;
                    }
                    parse_node(cell).map(|element| (name.to_string(), element))
                })
                .collect(),
        })
        .collect()
}

#[async_trait]
impl QueryDriver for RedisGraphDriver {
    async fn run(&self, statement: &str, params: Params) -> Result<()> {
        self.query(statement, &params).await?;
        Ok(())
    }

    async fn fetch_rows(
        &self,
        statement: &str,
        params: Params,
        columns: &[&str],
    ) -> Result<Vec<ResultRow>> {
        let reply = self.query(statement, &params).await?;
        Ok(parse_rows(&reply, columns))
    }
}

// ── Backend ──────────────────────────────────────────────────────

/// Adapter for the Redis graph module: no constraints, one label per node.
pub struct RedisGraphBackend {
    driver: Arc<dyn QueryDriver>,
    capabilities: Capabilities,
    batch_size: usize,
}

impl RedisGraphBackend {
    pub fn new(driver: Arc<dyn QueryDriver>, batch_size: usize) -> Self {
        Self {
            driver,
            capabilities: Capabilities::redis_graph(),
            batch_size: batch_size.max(1),
        }
    }
}

pub(crate) fn index_statement(label: &str, attribute: &str) -> String {
    format!("CREATE INDEX ON :{label}({attribute})")
}

#[async_trait]
impl GraphBackend for RedisGraphBackend {
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn driver(&self) -> &dyn QueryDriver {
        self.driver.as_ref()
    }

    /// Checks for the identity first, since nothing else would reject a
    /// duplicate.
    async fn save_node(&self, node: &mut Node) -> Result<()> {
        let identity = node.derive_identity()?.to_string();
        if self.get_node_by_id(&identity).await?.is_some() {
            return Err(GraphError::AlreadyExists { identity });
        }
        self.insert_node(node).await
    }

    /// Label additions become separate single-label nodes cloned from this
    /// one; attribute changes are applied in place.
    async fn update_node(&self, node: &mut Node) -> Result<()> {
        if let Some(previous) = node.previous_labels().map(<[String]>::to_vec) {
            let added: Vec<String> = node
                .labels()
                .iter()
                .filter(|l| !previous.contains(l))
                .cloned()
                .collect();
            for label in added {
                let mut clone = node.clone_with_label(&label);
                self.insert_node(&mut clone).await?;
                tracing::debug!(label = %label, identity = ?clone.identity(), "Cloned node for added label");
            }
        }

        if let Some(statement) = cypher::update_node(node, &self.capabilities)? {
            self.driver.run(&statement, Params::new()).await?;
        }
        node.clear_dirty();
        Ok(())
    }

    async fn create_node_constraint(&self, _entity_type: &EntityType, _attribute: &str) -> Result<()> {
        Ok(())
    }

    async fn create_edge_constraint(&self, _entity_type: &EntityType, _attribute: &str) -> Result<()> {
        Ok(())
    }

    /// One index per label.
    async fn create_index(&self, entity_type: &EntityType, attribute: &str) -> Result<()> {
        for label in entity_type.labels() {
            match self
                .driver
                .run(&index_statement(label, attribute), Params::new())
                .await
            {
                Err(GraphError::Redis(e)) if e.to_string().contains("already indexed") => {
                    tracing::debug!(label = %label, attribute, "Index already present");
                }
                other => other?,
            }
        }
        Ok(())
    }
}
