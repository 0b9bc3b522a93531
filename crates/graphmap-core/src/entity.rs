//! Node and edge instances.

use std::sync::Arc;

use crate::dirty::DirtyMap;
use crate::error::{MappingError, Result};
use crate::identity;
use crate::schema::{EntityKind, EntityType, IDENTITY};
use crate::value::Value;

// ── Node ─────────────────────────────────────────────────────────

/// An instance of a declared node type.
///
/// Structured attributes and the open property bag are tracked by separate
/// [`DirtyMap`]s; label additions are tracked alongside them.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    entity_type: Arc<EntityType>,
    labels: Vec<String>,
    previous_labels: Option<Vec<String>>,
    attributes: DirtyMap,
    properties: DirtyMap,
    identity: Option<String>,
}

impl Node {
    pub fn builder(entity_type: &Arc<EntityType>) -> NodeBuilder {
        NodeBuilder {
            node: Node {
                entity_type: Arc::clone(entity_type),
                labels: entity_type.labels().to_vec(),
                previous_labels: None,
                attributes: DirtyMap::new(),
                properties: DirtyMap::new(),
                identity: None,
            },
            error: None,
        }
    }

    /// Rebuild a node from stored values. Declared attributes go to the
    /// structured map, everything else to the property bag.
    pub fn from_stored(
        entity_type: &Arc<EntityType>,
        identity: Option<String>,
        labels: Vec<String>,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Node> {
        let mut builder = Node::builder(entity_type);
        if !labels.is_empty() {
            builder.node.labels = labels;
        }
        builder.node.identity = identity;
        for (key, value) in values {
            if key == IDENTITY {
                continue;
            }
            if entity_type.has_attribute(&key) {
                builder.node.attributes.set(key, value);
            } else {
                builder.node.properties.set(key, value);
            }
        }
        builder.build()
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn attributes(&self) -> &DirtyMap {
        &self.attributes
    }

    pub fn properties(&self) -> &DirtyMap {
        &self.properties
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if !self.entity_type.has_attribute(name) {
            return Err(MappingError::UnknownAttribute {
                type_name: self.entity_type.name().to_string(),
                attribute: name.to_string(),
            });
        }
        self.attributes.set(name, value);
        Ok(())
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<Value>) {
        self.properties.set(name, value);
    }

    /// Add a label, remembering the label set of the current change cycle.
    pub fn add_label(&mut self, label: &str) {
        if label.is_empty() || self.labels.iter().any(|l| l == label) {
            return;
        }
        if self.previous_labels.is_none() {
            self.previous_labels = Some(self.labels.clone());
        }
        self.labels.push(label.to_string());
    }

    /// Label set before the pending label changes, if any.
    pub fn previous_labels(&self) -> Option<&[String]> {
        self.previous_labels.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.previous_labels.is_some() || self.attributes.is_dirty() || self.properties.is_dirty()
    }

    /// Forget pending changes after they have been persisted.
    pub fn clear_dirty(&mut self) {
        self.previous_labels = None;
        self.attributes.clear();
        self.properties.clear();
    }

    /// Return the identity, deriving and storing it on first call.
    ///
    /// Types with a natural key hash their labels and key values. Types
    /// keyed only by `identity` get a random token mixed in, so two such
    /// instances never collide.
    pub fn derive_identity(&mut self) -> Result<&str> {
        if self.identity.is_none() {
            let material = if self.entity_type.has_natural_key() {
                identity::node_material(&self.labels, self.key_pairs()?)
            } else {
                let token = Value::Text(identity::random_token());
                identity::node_material(&self.labels, [(IDENTITY, &token)])
            };
            self.identity = Some(identity::content_hash(&material));
        }
        Ok(self.identity.as_deref().unwrap_or_default())
    }

    /// Replace the in-memory identity with the one a backend reports as stored.
    pub fn adopt_identity(&mut self, identity: String) {
        self.identity = Some(identity);
    }

    /// Key used to collapse duplicate nodes inside one flush window.
    ///
    /// This is the unhashed identity material of the labels and key values,
    /// so it is available without hashing and as unambiguous as the
    /// identity. Types without a natural key fall back to their identity.
    pub fn dedup_key(&mut self) -> Result<String> {
        if !self.entity_type.has_natural_key() {
            return self.derive_identity().map(str::to_string);
        }
        Ok(identity::node_material(&self.labels, self.key_pairs()?))
    }

    /// Key attribute values usable as a lookup filter. Falls back to the
    /// identity for types without a natural key.
    pub fn key_filters(&mut self) -> Result<Vec<(String, Value)>> {
        if !self.entity_type.has_natural_key() {
            let identity = self.derive_identity()?.to_string();
            return Ok(vec![(IDENTITY.to_string(), Value::Text(identity))]);
        }
        Ok(self
            .key_pairs()?
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect())
    }

    /// Copy of this node carrying a single label and no identity.
    ///
    /// Used by single-label backends to simulate label additions.
    pub fn clone_with_label(&self, label: &str) -> Node {
        let mut attributes = self.attributes.clone();
        attributes.clear();
        let mut properties = self.properties.clone();
        properties.clear();
        Node {
            entity_type: Arc::clone(&self.entity_type),
            labels: vec![label.to_string()],
            previous_labels: None,
            attributes,
            properties,
            identity: None,
        }
    }

    fn key_pairs(&self) -> Result<Vec<(&str, &Value)>> {
        self.entity_type
            .keys()
            .iter()
            .filter(|k| k.as_str() != IDENTITY)
            .map(|k| {
                self.attributes
                    .get(k)
                    .or_else(|| self.properties.get(k))
                    .map(|v| (k.as_str(), v))
                    .ok_or_else(|| MappingError::MissingKeyAttribute {
                        type_name: self.entity_type.name().to_string(),
                        attribute: k.clone(),
                    })
            })
            .collect()
    }
}

/// Collects initial values of a node without marking them dirty.
#[derive(Debug)]
pub struct NodeBuilder {
    node: Node,
    error: Option<MappingError>,
}

impl NodeBuilder {
    pub fn attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
        if self.error.is_none() && !self.node.entity_type.has_attribute(name) {
            self.error = Some(MappingError::UnknownAttribute {
                type_name: self.node.entity_type.name().to_string(),
                attribute: name.to_string(),
            });
        }
        self.node.attributes.set(name, value);
        self
    }

    pub fn property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.node.properties.set(name, value);
        self
    }

    pub fn identity(mut self, identity: &str) -> Self {
        self.node.identity = Some(identity.to_string());
        self
    }

    /// Finish construction; later writes are change-tracked.
    pub fn build(mut self) -> Result<Node> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.node.entity_type.kind() != EntityKind::Node {
            return Err(MappingError::InvalidMapping(format!(
                "'{}' is not a node type",
                self.node.entity_type.name()
            )));
        }
        self.node.attributes.seal();
        self.node.properties.seal();
        Ok(self.node)
    }
}

// ── Edge ─────────────────────────────────────────────────────────

/// One side of an edge: the referenced node's labels and identity.
///
/// Edges never own nodes; they address them by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub labels: Vec<String>,
    pub identity: String,
}

impl Endpoint {
    fn resolve(node: &mut Node) -> Result<Self> {
        let identity = node.derive_identity()?.to_string();
        Ok(Self {
            labels: node.labels.clone(),
            identity,
        })
    }
}

/// An instance of a declared edge type connecting two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    entity_type: Arc<EntityType>,
    labels: Vec<String>,
    source: Endpoint,
    destination: Endpoint,
    properties: DirtyMap,
    identity: Option<String>,
}

impl Edge {
    /// Connect `source` to `destination`, resolving both endpoint
    /// identities first so the edge identity is deterministic.
    pub fn new(
        entity_type: &Arc<EntityType>,
        source: &mut Node,
        destination: &mut Node,
    ) -> Result<Edge> {
        Self::with_properties(entity_type, source, destination, Vec::<(String, Value)>::new())
    }

    pub fn with_properties<K, V>(
        entity_type: &Arc<EntityType>,
        source: &mut Node,
        destination: &mut Node,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Edge>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        if entity_type.kind() != EntityKind::Edge {
            return Err(MappingError::InvalidMapping(format!(
                "'{}' is not an edge type",
                entity_type.name()
            )));
        }
        let source = Endpoint::resolve(source)?;
        let destination = Endpoint::resolve(destination)?;

        let mut properties = DirtyMap::from_entries(properties);
        properties.seal();

        Ok(Edge {
            entity_type: Arc::clone(entity_type),
            labels: entity_type.labels().to_vec(),
            source,
            destination,
            properties,
            identity: None,
        })
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn source(&self) -> &Endpoint {
        &self.source
    }

    pub fn destination(&self) -> &Endpoint {
        &self.destination
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn properties(&self) -> &DirtyMap {
        &self.properties
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<Value>) {
        self.properties.set(name, value);
    }

    pub fn clear_dirty(&mut self) {
        self.properties.clear();
    }

    pub fn derive_identity(&mut self) -> &str {
        let labels = &self.labels;
        let (source, destination) = (&self.source.identity, &self.destination.identity);
        self.identity
            .get_or_insert_with(|| identity::edge_identity(labels, source, destination))
            .as_str()
    }
}

// ── Entity ───────────────────────────────────────────────────────

/// Owned node or edge, as buffered by a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Node(Node),
    Edge(Edge),
}

impl From<Node> for Entity {
    fn from(node: Node) -> Self {
        Entity::Node(node)
    }
}

impl From<Edge> for Entity {
    fn from(edge: Edge) -> Self {
        Entity::Edge(edge)
    }
}

/// Borrowed node or edge for direct save calls.
#[derive(Debug)]
pub enum EntityMut<'a> {
    Node(&'a mut Node),
    Edge(&'a mut Edge),
}

impl<'a> From<&'a mut Node> for EntityMut<'a> {
    fn from(node: &'a mut Node) -> Self {
        EntityMut::Node(node)
    }
}

impl<'a> From<&'a mut Edge> for EntityMut<'a> {
    fn from(edge: &'a mut Edge) -> Self {
        EntityMut::Edge(edge)
    }
}
