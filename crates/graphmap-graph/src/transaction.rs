//! Buffered, batched writes.
//!
//! A [`Transaction`] collects nodes and edges without I/O and writes them on
//! [`commit`](Transaction::commit) in flush windows of at most
//! [`GraphBackend::batch_size`] items. Each window issues one `CREATE` for
//! its nodes, then one `UNWIND` statement per edge label triple.
//!
//! A transaction opened through [`Graph::transaction`] shares the graph's
//! [`NodeCache`]: nodes already cached are not created again, and nodes
//! written by a window are cached once it flushes.
//!
//! [`Graph::transaction`]: crate::Graph::transaction

use std::collections::HashSet;

use graphmap_core::cypher;
use graphmap_core::{Entity, Node};

use crate::backend::{EdgeGroup, EdgeRow, GraphBackend};
use crate::cache::NodeCache;
use crate::error::{GraphError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Flushing,
    Closed,
}

/// Counts reported by a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub windows: usize,
    pub nodes: usize,
    pub duplicates: usize,
    /// Nodes skipped because the cache already held them.
    pub cached: usize,
    pub edges: usize,
    pub statements: usize,
}

/// Staging area for one flush window.
#[derive(Default)]
struct Window {
    seen: HashSet<String>,
    nodes: Vec<String>,
    created: Vec<Node>,
    edges: Vec<(EdgeGroup, Vec<EdgeRow>)>,
    count: usize,
}

impl Window {
    fn push_edge(&mut self, group: EdgeGroup, row: EdgeRow) {
        match self.edges.iter_mut().find(|(g, _)| *g == group) {
            Some((_, rows)) => rows.push(row),
            None => self.edges.push((group, vec![row])),
        }
    }
}

/// Single-writer batch of pending entities. Not shareable across tasks.
pub struct Transaction<'a> {
    backend: &'a dyn GraphBackend,
    cache: Option<&'a mut NodeCache>,
    buffer: Vec<Entity>,
    state: TransactionState,
}

impl<'a> Transaction<'a> {
    pub fn new(backend: &'a dyn GraphBackend) -> Self {
        Self {
            backend,
            cache: None,
            buffer: Vec::new(),
            state: TransactionState::Open,
        }
    }

    /// A transaction that skips nodes held in `cache` and caches the nodes
    /// it writes.
    pub fn with_cache(backend: &'a dyn GraphBackend, cache: &'a mut NodeCache) -> Self {
        Self {
            backend,
            cache: Some(cache),
            buffer: Vec::new(),
            state: TransactionState::Open,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer an entity for the next commit.
    pub fn add(&mut self, entity: impl Into<Entity>) -> Result<()> {
        if self.state != TransactionState::Open {
            return Err(GraphError::TransactionClosed);
        }
        self.buffer.push(entity.into());
        Ok(())
    }

    /// Write every buffered entity and close the transaction.
    ///
    /// Within one flush window the first node with a given key wins and later
    /// duplicates are skipped. A backend failure aborts the commit; entities
    /// not yet written are discarded.
    pub async fn commit(&mut self) -> Result<CommitSummary> {
        if self.state != TransactionState::Open {
            return Err(GraphError::TransactionClosed);
        }
        self.state = TransactionState::Flushing;
        let elements = std::mem::take(&mut self.buffer);
        let result = self.write_all(elements).await;
        self.state = TransactionState::Closed;

        match &result {
            Ok(summary) => tracing::debug!(
                windows = summary.windows,
                nodes = summary.nodes,
                duplicates = summary.duplicates,
                cached = summary.cached,
                edges = summary.edges,
                "Transaction committed"
            ),
            Err(e) => tracing::warn!(error = %e, "Transaction commit failed"),
        }
        result
    }

    async fn write_all(&mut self, elements: Vec<Entity>) -> Result<CommitSummary> {
        let backend = self.backend;
        let capabilities = backend.capabilities();
        let batch_size = backend.batch_size().max(1);
        let mut summary = CommitSummary::default();
        let mut window = Window::default();

        for element in elements {
            match element {
                Entity::Node(mut node) => {
                    let identity = node.derive_identity()?;
                    if self.cache.as_deref().is_some_and(|c| c.contains(identity)) {
                        summary.cached += 1;
                        continue;
                    }
                    let key = node.dedup_key()?;
                    if !window.seen.insert(key) {
                        summary.duplicates += 1;
                        continue;
                    }
                    window.nodes.push(cypher::node_pattern(&mut node, capabilities)?);
                    if self.cache.is_some() {
                        window.created.push(node);
                    }
                }
                Entity::Edge(mut edge) => {
                    let group = EdgeGroup::of(&edge);
                    let mut row = EdgeRow::of(&mut edge);
                    if let Some(cache) = self.cache.as_deref() {
                        row.from = stored_identity(cache, row.from);
                        row.to = stored_identity(cache, row.to);
                    }
                    window.push_edge(group, row);
                }
            }

            window.count += 1;
            if window.count >= batch_size {
                self.flush(&mut window, &mut summary).await?;
            }
        }

        if window.count > 0 {
            self.flush(&mut window, &mut summary).await?;
        }
        Ok(summary)
    }

    async fn flush(&mut self, window: &mut Window, summary: &mut CommitSummary) -> Result<()> {
        let staged = std::mem::take(window);
        summary.windows += 1;

        if !staged.nodes.is_empty() {
            self.backend.create_nodes(&staged.nodes).await?;
            summary.nodes += staged.nodes.len();
            summary.statements += 1;
        }
        for (group, rows) in &staged.edges {
            self.backend.create_edges(group, rows).await?;
            summary.edges += rows.len();
            summary.statements += 1;
        }

        if let Some(cache) = self.cache.as_deref_mut() {
            for mut node in staged.created {
                node.clear_dirty();
                cache.insert(&node);
            }
        }

        tracing::debug!(
            nodes = staged.nodes.len(),
            edge_groups = staged.edges.len(),
            "Flushed window"
        );
        Ok(())
    }
}

/// The identity the backend stores for a cached endpoint, which differs
/// from the derived one when a conflicting node was read back.
fn stored_identity(cache: &NodeCache, identity: String) -> String {
    match cache.get(&identity).and_then(Node::identity) {
        Some(stored) if stored != identity => stored.to_string(),
        _ => identity,
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Open && !self.buffer.is_empty() {
            tracing::warn!(
                pending = self.buffer.len(),
                "Transaction dropped without commit - buffered entities discarded"
            );
        }
    }
}
