//! Backend adapter interface.
//!
//! Generic operations are provided as default methods built on the query
//! builder and the backend's [`Capabilities`]; adapters override only what
//! their engine does differently.

use async_trait::async_trait;
use graphmap_core::cypher;
use graphmap_core::{BatchRowShape, Capabilities, Edge, EntityType, Node, Value};

use crate::driver::{Params, QueryDriver, ResultElement, ResultRow};
use crate::error::Result;

/// Label triple shared by every edge in one bulk statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeGroup {
    pub source: Vec<String>,
    pub edge: Vec<String>,
    pub destination: Vec<String>,
}

impl EdgeGroup {
    pub fn of(edge: &Edge) -> Self {
        Self {
            source: edge.source().labels.clone(),
            edge: edge.labels().to_vec(),
            destination: edge.destination().labels.clone(),
        }
    }
}

/// Identities of one edge to create: (from, to, edge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRow {
    pub from: String,
    pub to: String,
    pub edge: String,
}

impl EdgeRow {
    pub fn of(edge: &mut Edge) -> Self {
        let identity = edge.derive_identity().to_string();
        Self {
            from: edge.source().identity.clone(),
            to: edge.destination().identity.clone(),
            edge: identity,
        }
    }

    pub fn to_json(&self, shape: BatchRowShape) -> serde_json::Value {
        match shape {
            BatchRowShape::Map => serde_json::json!({
                "identity_from": self.from,
                "identity_to": self.to,
                "identity_edge": self.edge,
            }),
            BatchRowShape::Indexed => serde_json::json!([self.from, self.to, self.edge]),
        }
    }
}

#[async_trait]
pub trait GraphBackend: Send + Sync {
    fn capabilities(&self) -> &Capabilities;

    /// Items per flush window during commit.
    fn batch_size(&self) -> usize;

    fn driver(&self) -> &dyn QueryDriver;

    /// Insert a node with a plain `CREATE`, no existence check.
    async fn insert_node(&self, node: &mut Node) -> Result<()> {
        let statement = cypher::create_node(node, self.capabilities())?;
        self.driver().run(&statement, Params::new()).await?;
        node.clear_dirty();
        Ok(())
    }

    /// Insert a node, reporting [`GraphError::AlreadyExists`] when the
    /// backend already stores its identity.
    ///
    /// [`GraphError::AlreadyExists`]: crate::GraphError::AlreadyExists
    async fn save_node(&self, node: &mut Node) -> Result<()>;

    async fn save_edge(&self, edge: &mut Edge) -> Result<()> {
        let statement = cypher::create_edge(edge, self.capabilities());
        self.driver().run(&statement, Params::new()).await?;
        edge.clear_dirty();
        Ok(())
    }

    /// Persist the node's pending changes. No-op when nothing is dirty.
    async fn update_node(&self, node: &mut Node) -> Result<()> {
        if let Some(statement) = cypher::update_node(node, self.capabilities())? {
            self.driver().run(&statement, Params::new()).await?;
        }
        node.clear_dirty();
        Ok(())
    }

    async fn fetch_many(
        &self,
        labels: &[String],
        filters: &[(String, Value)],
    ) -> Result<Vec<ResultElement>> {
        let statement = cypher::filter_nodes(labels, filters, self.capabilities());
        self.driver().fetch(&statement, Params::new()).await
    }

    async fn get_node_by_id(&self, identity: &str) -> Result<Option<ResultElement>> {
        if identity.is_empty() {
            return Ok(None);
        }
        let statement = cypher::match_identity(identity);
        let found = self.driver().fetch(&statement, Params::new()).await?;
        Ok(found.into_iter().next())
    }

    async fn create_node_constraint(&self, entity_type: &EntityType, attribute: &str)
        -> Result<()>;

    async fn create_edge_constraint(&self, entity_type: &EntityType, attribute: &str)
        -> Result<()>;

    async fn create_index(&self, entity_type: &EntityType, attribute: &str) -> Result<()>;

    /// Create all staged node patterns in one statement.
    async fn create_nodes(&self, patterns: &[String]) -> Result<()> {
        if patterns.is_empty() {
            return Ok(());
        }
        self.driver()
            .run(&cypher::create_nodes(patterns), Params::new())
            .await
    }

    /// Create one group of edges with a single `UNWIND` statement.
    async fn create_edges(&self, group: &EdgeGroup, rows: &[EdgeRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let shape = self.capabilities().batch_rows;
        let statement =
            cypher::bulk_create_edges(&group.source, &group.edge, &group.destination, shape);

        let mut params = Params::new();
        params.insert(
            cypher::BATCH_PARAM.to_string(),
            serde_json::Value::Array(rows.iter().map(|r| r.to_json(shape)).collect()),
        );
        self.driver().run(&statement, params).await
    }

    async fn truncate(&self) -> Result<()> {
        self.driver().run(cypher::truncate(), Params::new()).await
    }

    async fn raw_query(&self, statement: &str, columns: &[&str]) -> Result<Vec<ResultRow>> {
        self.driver()
            .fetch_rows(statement, Params::new(), columns)
            .await
    }
}

/// Lowercase identifier fragment for constraint and index names.
pub(crate) fn plain_name(text: &str) -> String {
    text.replace(['-', ':'], "_").to_lowercase()
}
