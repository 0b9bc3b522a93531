//! The `Graph` facade: one backend connection plus its node cache.

use std::sync::Arc;

use graphmap_core::cypher;
use graphmap_core::{
    BackendKind, EntityKind, EntityMut, EntityType, IndexMode, MappingError, Node, Registry,
    Settings,
};

use crate::backend::GraphBackend;
use crate::cache::NodeCache;
use crate::driver::ResultRow;
use crate::error::{GraphError, Result};
use crate::neo4j::{Neo4jBackend, Neo4jDriver};
use crate::redisgraph::{RedisGraphBackend, RedisGraphDriver};
use crate::transaction::Transaction;

/// Counts of schema statements issued by [`Graph::bootstrap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    pub constraints: usize,
    pub indexes: usize,
}

pub struct Graph {
    backend: Box<dyn GraphBackend>,
    cache: NodeCache,
}

impl Graph {
    /// Connect to the backend named by `settings.uri` and, unless disabled,
    /// create constraints and indexes for every type in `registry`.
    pub async fn connect(settings: &Settings, registry: &Registry) -> Result<Self> {
        settings.validate()?;
        let uri = settings.connection()?;

        let backend: Box<dyn GraphBackend> = match uri.backend {
            BackendKind::Neo4j { enterprise } => Box::new(Neo4jBackend::new(
                Arc::new(Neo4jDriver::connect(&uri).await?),
                enterprise,
                settings.batch_size,
            )),
            BackendKind::RedisGraph => Box::new(RedisGraphBackend::new(
                Arc::new(RedisGraphDriver::connect(&uri).await?),
                settings.batch_size,
            )),
            BackendKind::Gremlin => {
                return Err(MappingError::UnimplementedBackend(uri.scheme).into());
            }
        };

        let graph = Self::with_backend(backend);
        if settings.bootstrap_schema {
            graph.bootstrap(registry).await?;
        }
        Ok(graph)
    }

    pub fn with_backend(backend: Box<dyn GraphBackend>) -> Self {
        Self {
            backend,
            cache: NodeCache::new(),
        }
    }

    pub fn backend(&self) -> &dyn GraphBackend {
        self.backend.as_ref()
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    /// Create constraints and indexes for every registered type, as far as
    /// the backend supports them.
    pub async fn bootstrap(&self, registry: &Registry) -> Result<BootstrapSummary> {
        let capabilities = self.backend.capabilities().clone();
        let mut summary = BootstrapSummary::default();

        for entity_type in registry.types() {
            let mut constrained: Vec<&String> = entity_type.keys().iter().collect();
            for attr in entity_type.unique() {
                if !constrained.contains(&attr) {
                    constrained.push(attr);
                }
            }

            match entity_type.kind() {
                EntityKind::Node => {
                    if capabilities.constraints {
                        for attr in &constrained {
                            self.backend
                                .create_node_constraint(&entity_type, attr)
                                .await?;
                            summary.constraints += 1;
                        }
                    }
                    if capabilities.index_mode != IndexMode::Unsupported {
                        for attr in entity_type.indexes() {
                            self.backend.create_index(&entity_type, attr).await?;
                            summary.indexes += 1;
                        }
                    }
                }
                EntityKind::Edge => {
                    if capabilities.edge_constraints {
                        for attr in &constrained {
                            self.backend
                                .create_edge_constraint(&entity_type, attr)
                                .await?;
                            summary.constraints += 1;
                        }
                    }
                }
            }
        }

        tracing::info!(
            types = registry.len(),
            constraints = summary.constraints,
            indexes = summary.indexes,
            "Bootstrapped schema"
        );
        Ok(summary)
    }

    /// Open a transaction that shares this graph's node cache.
    pub fn transaction(&mut self) -> Transaction<'_> {
        Transaction::with_cache(self.backend.as_ref(), &mut self.cache)
    }

    /// Insert a node or edge directly.
    ///
    /// Saving a node already in the cache adopts the cached identity without
    /// a round trip.
    pub async fn save<'e>(&mut self, entity: impl Into<EntityMut<'e>>) -> Result<()> {
        match entity.into() {
            EntityMut::Node(node) => {
                let identity = node.derive_identity()?.to_string();
                if let Some(cached) = self.cache.get(&identity) {
                    if let Some(stored) = cached.identity() {
                        node.adopt_identity(stored.to_string());
                    }
                    return Ok(());
                }
                self.backend.save_node(node).await?;
                self.cache.insert(node);
                Ok(())
            }
            EntityMut::Edge(edge) => self.backend.save_edge(edge).await,
        }
    }

    /// Persist pending changes of `node` and refresh its cache entry.
    pub async fn update(&mut self, node: &mut Node) -> Result<()> {
        self.backend.update_node(node).await?;
        if let Some(identity) = node.identity() {
            if self.cache.contains(identity) {
                self.cache.insert(node);
            }
        }
        Ok(())
    }

    /// Return the stored instance for `node`'s key, creating it if absent.
    ///
    /// The returned node always carries the identity the backend stores.
    pub async fn get_or_create(&mut self, mut node: Node) -> Result<Node> {
        let identity = node.derive_identity()?.to_string();
        if let Some(cached) = self.cache.get(&identity) {
            return Ok(cached.clone());
        }

        let entity_type = Arc::clone(node.entity_type());

        if !self.backend.capabilities().constraints {
            if let Some(found) = self.backend.get_node_by_id(&identity).await? {
                let stored = found.into_node(&entity_type)?;
                self.cache.insert(&stored);
                return Ok(stored);
            }
            self.backend.insert_node(&mut node).await?;
            self.cache.insert(&node);
            return Ok(node);
        }

        match self.backend.save_node(&mut node).await {
            Ok(()) => {
                self.cache.insert(&node);
                Ok(node)
            }
            Err(e) if e.is_conflict() => {
                tracing::warn!(identity = %identity, "Node already exists, reading stored copy");
                let filters = node.key_filters()?;
                let found = self
                    .backend
                    .fetch_many(node.labels(), &filters)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| GraphError::Unresolvable {
                        identity: identity.clone(),
                    })?;
                let stored = found.into_node(&entity_type)?;
                self.cache.insert(&stored);
                // Later calls look the node up by the identity derived here.
                if stored.identity() != Some(identity.as_str()) {
                    self.cache.insert_as(&identity, &stored);
                }
                Ok(stored)
            }
            Err(e) => Err(e),
        }
    }

    /// Look up a node by identity, consulting the cache first.
    pub async fn get_node_by_id(
        &mut self,
        entity_type: &Arc<EntityType>,
        identity: &str,
    ) -> Result<Option<Node>> {
        if let Some(cached) = self.cache.get(identity) {
            return Ok(Some(cached.clone()));
        }
        match self.backend.get_node_by_id(identity).await? {
            Some(found) => {
                let node = found.into_node(entity_type)?;
                self.cache.insert(&node);
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// Nodes of `entity_type` matching every `{"attr": value}` filter.
    pub async fn fetch_many(
        &self,
        entity_type: &Arc<EntityType>,
        filters: &serde_json::Value,
    ) -> Result<Vec<Node>> {
        let filters = cypher::parse_filters(filters)?;
        self.backend
            .fetch_many(entity_type.labels(), &filters)
            .await?
            .into_iter()
            .map(|element| element.into_node(entity_type))
            .collect()
    }

    pub async fn fetch_one(
        &self,
        entity_type: &Arc<EntityType>,
        filters: &serde_json::Value,
    ) -> Result<Option<Node>> {
        Ok(self.fetch_many(entity_type, filters).await?.into_iter().next())
    }

    /// Run caller-written Cypher and collect the nodes bound to `columns`
    /// in each row. Pass no columns for statements that return nothing.
    pub async fn raw_query(&self, statement: &str, columns: &[&str]) -> Result<Vec<ResultRow>> {
        self.backend.raw_query(statement, columns).await
    }

    /// Run caller-written Cypher and map each returned column onto a
    /// declared type.
    ///
    /// Each output row holds one node per `(alias, type)` pair, in the order
    /// given. A row missing one of the aliases is an error.
    pub async fn raw_query_as(
        &self,
        statement: &str,
        mapping: &[(&str, Arc<EntityType>)],
    ) -> Result<Vec<Vec<Node>>> {
        let columns: Vec<&str> = mapping.iter().map(|(alias, _)| *alias).collect();
        let rows = self.backend.raw_query(statement, &columns).await?;
        rows.into_iter()
            .map(|row| {
                mapping
                    .iter()
                    .map(|(alias, entity_type)| {
                        let element = row.get(alias).cloned().ok_or_else(|| {
                            GraphError::Serialization(format!(
                                "Column '{alias}' is missing or not a node"
                            ))
                        })?;
                        element.into_node(entity_type)
                    })
                    .collect()
            })
            .collect()
    }

    /// Delete every node and edge and forget cached nodes.
    pub async fn truncate(&mut self) -> Result<()> {
        self.backend.truncate().await?;
        self.cache.clear();
        tracing::info!("Truncated graph");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use graphmap_core::Value;

    use super::*;
    use crate::driver::ResultElement;
    use crate::testing::RecordingDriver;

    fn user_type() -> Arc<EntityType> {
        Arc::new(
            EntityType::node("UserNode")
                .attribute("email")
                .attribute("name")
                .key("email")
                .build()
                .unwrap(),
        )
    }

    fn user(ty: &Arc<EntityType>, email: &str) -> Node {
        Node::builder(ty).attribute("email", email).build().unwrap()
    }

    fn neo4j(driver: &Arc<RecordingDriver>) -> Graph {
        Graph::with_backend(Box::new(Neo4jBackend::new(driver.clone(), false, 1000)))
    }

    fn redis(driver: &Arc<RecordingDriver>) -> Graph {
        Graph::with_backend(Box::new(RedisGraphBackend::new(driver.clone(), 1000)))
    }

    fn stored(identity: &str, email: &str) -> ResultElement {
        ResultElement {
            id: Some(1),
            labels: vec!["User".to_string()],
            properties: vec![
                ("identity".to_string(), Value::from(identity)),
                ("email".to_string(), Value::from(email)),
            ],
        }
    }

    #[tokio::test]
    async fn test_get_or_create_converges_with_constraints() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = neo4j(&driver);
        let ty = user_type();

        let first = graph.get_or_create(user(&ty, "a@x.com")).await.unwrap();
        let second = graph.get_or_create(user(&ty, "a@x.com")).await.unwrap();

        assert_eq!(first.identity(), second.identity());
        assert_eq!(driver.count_prefix("CREATE"), 1);
        assert_eq!(driver.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_converges_without_constraints() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = redis(&driver);
        let ty = user_type();

        let first = graph.get_or_create(user(&ty, "a@x.com")).await.unwrap();
        let second = graph.get_or_create(user(&ty, "a@x.com")).await.unwrap();

        assert_eq!(first.identity(), second.identity());
        assert_eq!(driver.count_prefix("CREATE"), 1);
        // One existence check before the single insert.
        assert_eq!(driver.count_prefix("MATCH"), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_reads_existing_without_constraints() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = redis(&driver);
        let ty = user_type();

        let mut local = user(&ty, "a@x.com");
        let identity = local.derive_identity().unwrap().to_string();
        driver.push_fetch(vec![stored(&identity, "a@x.com")]);

        let node = graph.get_or_create(user(&ty, "a@x.com")).await.unwrap();
        assert_eq!(node.identity(), Some(identity.as_str()));
        assert_eq!(driver.count_prefix("CREATE"), 0);
        assert!(graph.cache().contains(&identity));
    }

    #[tokio::test]
    async fn test_get_or_create_recovers_stored_identity_on_conflict() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = neo4j(&driver);
        let ty = user_type();

        driver.conflict_next_run();
        driver.push_fetch(vec![stored("stored-id", "a@x.com")]);

        let node = graph.get_or_create(user(&ty, "a@x.com")).await.unwrap();
        assert_eq!(node.identity(), Some("stored-id"));
        assert_eq!(node.attribute("email"), Some(&Value::from("a@x.com")));

        let statements = driver.statements();
        assert_eq!(
            statements[1],
            "MATCH (a:User) WHERE a.email = 'a@x.com' RETURN a"
        );
        assert!(graph.cache().contains("stored-id"));
    }

    #[tokio::test]
    async fn test_get_or_create_after_conflict_creates_once() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = neo4j(&driver);
        let ty = user_type();

        driver.conflict_next_run();
        driver.push_fetch(vec![stored("stored-id", "a@x.com")]);

        let first = graph.get_or_create(user(&ty, "a@x.com")).await.unwrap();
        let second = graph.get_or_create(user(&ty, "a@x.com")).await.unwrap();

        assert_eq!(first.identity(), Some("stored-id"));
        assert_eq!(second.identity(), Some("stored-id"));
        assert_eq!(driver.count_prefix("CREATE"), 1);
        assert_eq!(driver.statements().len(), 2);
    }

    #[tokio::test]
    async fn test_transaction_shares_graph_cache() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = neo4j(&driver);
        let ty = user_type();

        let mut tx = graph.transaction();
        tx.add(user(&ty, "a@x.com")).unwrap();
        tx.commit().await.unwrap();
        drop(tx);
        assert_eq!(graph.cache().len(), 1);

        let node = graph.get_or_create(user(&ty, "a@x.com")).await.unwrap();
        assert!(node.identity().is_some());
        assert_eq!(driver.statements().len(), 1);

        let mut tx = graph.transaction();
        tx.add(user(&ty, "a@x.com")).unwrap();
        let summary = tx.commit().await.unwrap();
        assert_eq!(summary.cached, 1);
        assert_eq!(driver.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_unresolvable_after_conflict() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = neo4j(&driver);
        let ty = user_type();

        driver.conflict_next_run();
        let err = graph.get_or_create(user(&ty, "a@x.com")).await.unwrap_err();
        assert!(matches!(err, GraphError::Unresolvable { .. }));
    }

    #[tokio::test]
    async fn test_save_uses_cache() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = neo4j(&driver);
        let ty = user_type();

        let mut a = user(&ty, "a@x.com");
        graph.save(&mut a).await.unwrap();
        let mut again = user(&ty, "a@x.com");
        graph.save(&mut again).await.unwrap();

        assert_eq!(a.identity(), again.identity());
        assert_eq!(driver.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_save_edge_directly() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = neo4j(&driver);
        let ty = user_type();
        let meet = Arc::new(EntityType::edge("MeetEdge").build().unwrap());

        let mut a = user(&ty, "a@x.com");
        let mut b = user(&ty, "b@x.com");
        let mut edge = graphmap_core::Edge::new(&meet, &mut a, &mut b).unwrap();
        graph.save(&mut edge).await.unwrap();

        let statements = driver.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("MATCH (from:User"));
        assert!(statements[0].contains("CREATE (from)-[:Meet {identity: '"));
    }

    #[tokio::test]
    async fn test_update_multi_label() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = neo4j(&driver);
        let ty = user_type();

        let mut node = Node::builder(&ty)
            .attribute("email", "a@x.com")
            .identity("id-1")
            .build()
            .unwrap();
        node.set_attribute("name", "Alice").unwrap();
        node.add_label("Admin");
        graph.update(&mut node).await.unwrap();

        assert_eq!(
            driver.statements(),
            vec!["MATCH (p:User) WHERE p.identity = 'id-1' SET p.name = 'Alice', p:Admin".to_string()]
        );
        assert!(!node.is_dirty());

        graph.update(&mut node).await.unwrap();
        assert_eq!(driver.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_rejects_malformed_filters() {
        let driver = Arc::new(RecordingDriver::new());
        let graph = neo4j(&driver);
        let ty = user_type();

        let err = graph
            .fetch_many(&ty, &serde_json::json!(["email", "a@x.com"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Mapping(MappingError::InvalidMapping(_))
        ));
        assert!(driver.statements().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_one_maps_nodes() {
        let driver = Arc::new(RecordingDriver::new());
        let graph = neo4j(&driver);
        let ty = user_type();

        driver.push_fetch(vec![stored("id-1", "a@x.com"), stored("id-2", "a@x.com")]);
        let node = graph
            .fetch_one(&ty, &serde_json::json!({"email": "a@x.com"}))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(node.identity(), Some("id-1"));
        assert_eq!(
            driver.statements(),
            vec!["MATCH (a:User) WHERE a.email = 'a@x.com' RETURN a".to_string()]
        );
    }

    #[tokio::test]
    async fn test_raw_query_as_maps_each_alias() {
        let driver = Arc::new(RecordingDriver::new());
        let graph = neo4j(&driver);
        let ty = user_type();

        driver.push_rows(vec![ResultRow {
            columns: vec![
                ("u1".to_string(), stored("id-1", "a@x.com")),
                ("u2".to_string(), stored("id-2", "b@x.com")),
            ],
        }]);
        let pairs = graph
            .raw_query_as(
                "MATCH (u1:User)-[:Meet]->(u2:User) RETURN u1, u2",
                &[("u2", Arc::clone(&ty)), ("u1", Arc::clone(&ty))],
            )
            .await
            .unwrap();

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0][0].identity(), Some("id-2"));
        assert_eq!(pairs[0][1].identity(), Some("id-1"));
        assert_eq!(
            pairs[0][1].attribute("email"),
            Some(&Value::from("a@x.com"))
        );
    }

    #[tokio::test]
    async fn test_raw_query_as_missing_alias() {
        let driver = Arc::new(RecordingDriver::new());
        let graph = neo4j(&driver);
        let ty = user_type();

        driver.push_fetch(vec![stored("id-1", "a@x.com")]);
        let err = graph
            .raw_query_as("MATCH (a:User) RETURN a", &[("u", ty)])
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_raw_query_without_columns() {
        let driver = Arc::new(RecordingDriver::new());
        let graph = neo4j(&driver);

        driver.push_fetch(vec![stored("id-1", "a@x.com")]);
        let rows = graph
            .raw_query("MATCH (a:User) RETURN a", &[])
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].columns.is_empty());
    }

    #[tokio::test]
    async fn test_get_node_by_id_caches() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = neo4j(&driver);
        let ty = user_type();

        driver.push_fetch(vec![stored("id-1", "a@x.com")]);
        let first = graph.get_node_by_id(&ty, "id-1").await.unwrap().unwrap();
        let second = graph.get_node_by_id(&ty, "id-1").await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(
            driver.statements(),
            vec!["MATCH (a {identity: 'id-1'}) RETURN a".to_string()]
        );
        assert!(graph.get_node_by_id(&ty, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncate_clears_cache() {
        let driver = Arc::new(RecordingDriver::new());
        let mut graph = neo4j(&driver);
        let ty = user_type();

        graph.get_or_create(user(&ty, "a@x.com")).await.unwrap();
        assert_eq!(graph.cache().len(), 1);

        graph.truncate().await.unwrap();
        assert!(graph.cache().is_empty());
        assert_eq!(driver.statements().last().unwrap(), "MATCH (p) DETACH DELETE p");
    }

    #[tokio::test]
    async fn test_bootstrap_neo4j() {
        let driver = Arc::new(RecordingDriver::new());
        let graph = neo4j(&driver);
        let registry = Registry::new();
        EntityType::node("UserNode")
            .attribute("email")
            .attribute("name")
            .key("email")
            .unique("name")
            .register(&registry)
            .unwrap();
        EntityType::edge("MeetEdge").register(&registry).unwrap();

        let summary = graph.bootstrap(&registry).await.unwrap();
        assert_eq!(summary, BootstrapSummary { constraints: 2, indexes: 1 });
        assert_eq!(
            driver.statements(),
            vec![
                "CREATE CONSTRAINT user_unique_email IF NOT EXISTS FOR (p:User) REQUIRE p.email IS UNIQUE".to_string(),
                "CREATE CONSTRAINT user_unique_name IF NOT EXISTS FOR (p:User) REQUIRE p.name IS UNIQUE".to_string(),
                "CREATE INDEX index_identity_user IF NOT EXISTS FOR (n:User) ON (n.identity)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_bootstrap_redis_skips_constraints() {
        let driver = Arc::new(RecordingDriver::new());
        let graph = redis(&driver);
        let registry = Registry::new();
        EntityType::node("UserNode")
            .attribute("email")
            .key("email")
            .register(&registry)
            .unwrap();

        let summary = graph.bootstrap(&registry).await.unwrap();
        assert_eq!(summary, BootstrapSummary { constraints: 0, indexes: 1 });
        assert_eq!(
            driver.statements(),
            vec!["CREATE INDEX ON :User(identity)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_unimplemented_backend() {
        let settings = Settings::with_uri("gremlin://localhost");
        let result = Graph::connect(&settings, &Registry::new()).await;
        assert!(matches!(
            result,
            Err(GraphError::Mapping(MappingError::UnimplementedBackend(_)))
        ));

        let settings = Settings::with_uri("mysql://localhost");
        let result = Graph::connect(&settings, &Registry::new()).await;
        assert!(matches!(
            result,
            Err(GraphError::Mapping(MappingError::Configuration(_)))
        ));
    }
}
