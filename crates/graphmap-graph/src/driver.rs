//! The "execute a statement, get nodes back" seam every backend sits on.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use graphmap_core::cypher::NODE_ALIAS;
use graphmap_core::{EntityType, Node, Value, IDENTITY};

use crate::error::Result;

/// Statement parameters, ordered by name so rendered text is stable.
pub type Params = BTreeMap<String, serde_json::Value>;

/// A node as returned by a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultElement {
    /// Backend-internal id, when the backend reports one.
    pub id: Option<i64>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Value)>,
}

impl ResultElement {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Stored identity, if the node carries one.
    pub fn identity(&self) -> Option<&str> {
        self.property(IDENTITY).and_then(Value::as_text)
    }

    /// Map the stored node back onto a declared type.
    pub fn into_node(self, entity_type: &Arc<EntityType>) -> Result<Node> {
        let identity = self.identity().map(str::to_string);
        Ok(Node::from_stored(
            entity_type,
            identity,
            self.labels,
            self.properties,
        )?)
    }
}

/// One returned row: the node bound to each requested column, in column
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    pub columns: Vec<(String, ResultElement)>,
}

impl ResultRow {
    pub fn single(alias: &str, element: ResultElement) -> Self {
        Self {
            columns: vec![(alias.to_string(), element)],
        }
    }

    pub fn get(&self, alias: &str) -> Option<&ResultElement> {
        self.columns
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, e)| e)
    }

    pub fn into_column(self, alias: &str) -> Option<ResultElement> {
        self.columns
            .into_iter()
            .find(|(name, _)| name == alias)
            .map(|(_, e)| e)
    }
}

/// Executes query text against one backend connection.
#[async_trait]
pub trait QueryDriver: Send + Sync {
    /// Execute a statement without reading results (CREATE, SET, DELETE).
    async fn run(&self, statement: &str, params: Params) -> Result<()>;

    /// Execute a statement and collect, per row, the nodes bound to
    /// `columns`. Columns that are absent or not nodes are left out of
    /// the row.
    async fn fetch_rows(
        &self,
        statement: &str,
        params: Params,
        columns: &[&str],
    ) -> Result<Vec<ResultRow>>;

    /// Execute a statement and collect the nodes bound to [`NODE_ALIAS`].
    async fn fetch(&self, statement: &str, params: Params) -> Result<Vec<ResultElement>> {
        let rows = self.fetch_rows(statement, params, &[NODE_ALIAS]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_column(NODE_ALIAS))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: i64) -> ResultElement {
        ResultElement {
            id: Some(id),
            labels: vec!["User".into()],
            properties: Vec::new(),
        }
    }

    #[test]
    fn test_row_lookup_by_alias() {
        let row = ResultRow {
            columns: vec![("u1".into(), element(1)), ("u2".into(), element(2))],
        };

        assert_eq!(row.get("u2").and_then(|e| e.id), Some(2));
        assert!(row.get("a").is_none());
        assert_eq!(row.into_column("u1").and_then(|e| e.id), Some(1));
    }
}
