//! Entity type descriptors and the append-only type registry.
//!
//! Every node or edge type is declared once through [`EntityType::node`] or
//! [`EntityType::edge`], validated, and registered. Backends read the
//! registry at connection time to create constraints and indexes.

use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, Result};

/// Name of the attribute holding an entity's identity.
pub const IDENTITY: &str = "identity";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Node,
    Edge,
}

/// Immutable descriptor of a declared node or edge type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    name: String,
    kind: EntityKind,
    labels: Vec<String>,
    attributes: Vec<String>,
    keys: Vec<String>,
    unique: Vec<String>,
    indexes: Vec<String>,
}

impl EntityType {
    pub fn node(name: &str) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name, EntityKind::Node)
    }

    pub fn edge(name: &str) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name, EntityKind::Edge)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Declared structured attributes (never includes `identity`).
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn unique(&self) -> &[String] {
        &self.unique
    }

    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    /// True when the only key is `identity` itself, i.e. the type has no
    /// natural key and instances get random identities.
    pub fn has_natural_key(&self) -> bool {
        self.keys.iter().any(|k| k != IDENTITY)
    }
}

/// Builder collecting a type declaration before validation.
#[derive(Debug, Clone)]
pub struct EntityTypeBuilder {
    name: String,
    kind: EntityKind,
    labels: Vec<String>,
    attributes: Vec<String>,
    keys: Vec<String>,
    unique: Vec<String>,
    indexes: Vec<String>,
}

impl EntityTypeBuilder {
    fn new(name: &str, kind: EntityKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            labels: Vec::new(),
            attributes: Vec::new(),
            keys: Vec::new(),
            unique: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        push_unique(&mut self.labels, label);
        self
    }

    pub fn attribute(mut self, attribute: &str) -> Self {
        push_unique(&mut self.attributes, attribute);
        self
    }

    pub fn attributes<'a>(mut self, attributes: impl IntoIterator<Item = &'a str>) -> Self {
        for a in attributes {
            push_unique(&mut self.attributes, a);
        }
        self
    }

    pub fn key(mut self, attribute: &str) -> Self {
        push_unique(&mut self.keys, attribute);
        self
    }

    pub fn unique(mut self, attribute: &str) -> Self {
        push_unique(&mut self.unique, attribute);
        self
    }

    pub fn index(mut self, attribute: &str) -> Self {
        push_unique(&mut self.indexes, attribute);
        self
    }

    /// Validate the declaration and produce the descriptor.
    ///
    /// Labels default to the type name with its `Node`/`Edge` suffix
    /// stripped; keys default to `identity`; `identity` is always indexed.
    pub fn build(self) -> Result<EntityType> {
        let invalid = |reason: String| MappingError::InvalidDeclaration {
            type_name: self.name.clone(),
            reason,
        };

        if self.attributes.iter().any(|a| a == IDENTITY) {
            return Err(invalid(format!("'{IDENTITY}' is reserved")));
        }

        let labels = if self.labels.is_empty() {
            vec![infer_label(&self.name, self.kind).ok_or_else(|| {
                invalid(
                    "no labels declared and the type name does not end with 'Node' or 'Edge'"
                        .to_string(),
                )
            })?]
        } else {
            self.labels.clone()
        };

        if let Some(bad) = labels.iter().find(|l| !is_valid_label(l)) {
            return Err(invalid(format!("label '{bad}' is not a valid identifier")));
        }

        let known = |a: &String| a == IDENTITY || self.attributes.contains(a);
        for (set, group) in [
            (&self.keys, "keys"),
            (&self.unique, "unique"),
            (&self.indexes, "indexes"),
        ] {
            if let Some(missing) = set.iter().find(|a| !known(a)) {
                return Err(invalid(format!(
                    "{group} names undeclared attribute '{missing}'"
                )));
            }
        }

        let keys = if self.keys.is_empty() {
            vec![IDENTITY.to_string()]
        } else {
            self.keys.clone()
        };

        let mut indexes = self.indexes.clone();
        push_unique(&mut indexes, IDENTITY);

        Ok(EntityType {
            name: self.name,
            kind: self.kind,
            labels,
            attributes: self.attributes,
            keys,
            unique: self.unique,
            indexes,
        })
    }

    /// Build and register into `registry` in one step.
    pub fn register(self, registry: &Registry) -> Result<Arc<EntityType>> {
        registry.register(self.build()?)
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn infer_label(name: &str, kind: EntityKind) -> Option<String> {
    let suffix = match kind {
        EntityKind::Node => "Node",
        EntityKind::Edge => "Edge",
    };
    name.strip_suffix(suffix)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

fn is_valid_label(label: &str) -> bool {
    let mut chars = label.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Append-only collection of declared entity types.
///
/// Each type name is registered exactly once; re-registering an identical
/// declaration returns the existing descriptor.
#[derive(Debug, Default)]
pub struct Registry {
    types: RwLock<Vec<Arc<EntityType>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by [`EntityTypeBuilder::register`] callers
    /// that do not manage their own.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    pub fn register(&self, entity_type: EntityType) -> Result<Arc<EntityType>> {
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = types.iter().find(|t| t.name == entity_type.name) {
            if **existing == entity_type {
                return Ok(Arc::clone(existing));
            }
            return Err(MappingError::DuplicateType(entity_type.name));
        }

        tracing::debug!(
            name = %entity_type.name,
            kind = ?entity_type.kind,
            labels = ?entity_type.labels,
            "Registered entity type"
        );
        let entity_type = Arc::new(entity_type);
        types.push(Arc::clone(&entity_type));
        Ok(entity_type)
    }

    pub fn get(&self, name: &str) -> Option<Arc<EntityType>> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|t| t.name == name)
            .cloned()
    }

    /// Snapshot of all registered types in declaration order.
    pub fn types(&self) -> Vec<Arc<EntityType>> {
        self.types.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.types.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
