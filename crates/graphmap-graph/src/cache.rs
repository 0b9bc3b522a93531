//! In-process node cache keyed by identity.

use std::collections::HashMap;

use graphmap_core::Node;

/// Last-seen instance per identity, owned by one [`Graph`](crate::Graph).
#[derive(Debug, Default)]
pub struct NodeCache {
    nodes: HashMap<String, Node>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &str) -> Option<&Node> {
        self.nodes.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.nodes.contains_key(identity)
    }

    /// Store a copy of `node` under its identity. Nodes without an identity
    /// are not cached.
    pub fn insert(&mut self, node: &Node) -> bool {
        match node.identity() {
            Some(identity) => {
                self.nodes.insert(identity.to_string(), node.clone());
                true
            }
            None => false,
        }
    }

    /// Store a copy of `node` under `key`, which may differ from the node's
    /// own identity, e.g. the identity derived locally for a node whose
    /// stored copy carries another.
    pub fn insert_as(&mut self, key: &str, node: &Node) {
        self.nodes.insert(key.to_string(), node.clone());
    }

    pub fn remove(&mut self, identity: &str) -> Option<Node> {
        self.nodes.remove(identity)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
