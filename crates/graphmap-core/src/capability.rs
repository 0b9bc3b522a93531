//! Per-connection description of what a backend supports.
//!
//! The query builder and the transaction engine read these flags instead of
//! branching on a concrete backend.

use crate::value::ValueKind;

/// How index creation maps onto the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// One index over the full label set.
    Native,
    /// Simulated with one index per label.
    PerLabel,
    /// Index creation is a no-op.
    Unsupported,
}

/// Shape of the rows passed to bulk edge creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchRowShape {
    /// `row.identity_from`, `row.identity_to`, `row.identity_edge`.
    Map,
    /// `row[0]`, `row[1]`, `row[2]`.
    Indexed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub native_types: Vec<ValueKind>,
    pub constraints: bool,
    pub edge_constraints: bool,
    pub multiple_labels: bool,
    pub index_mode: IndexMode,
    pub batch_rows: BatchRowShape,
    /// Function wrapping timestamp literals, e.g. `datetime`.
    pub timestamp_constructor: String,
}

impl Capabilities {
    /// Lowest common denominator: only text is native, nothing is enforced.
    pub fn text_only() -> Self {
        Self {
            native_types: vec![ValueKind::Text],
            constraints: false,
            edge_constraints: false,
            multiple_labels: false,
            index_mode: IndexMode::Unsupported,
            batch_rows: BatchRowShape::Indexed,
            timestamp_constructor: "datetime".to_string(),
        }
    }

    /// Bolt property-graph backend. Edge constraints need the enterprise
    /// edition.
    pub fn neo4j(enterprise: bool) -> Self {
        Self {
            native_types: vec![
                ValueKind::Text,
                ValueKind::Integer,
                ValueKind::Float,
                ValueKind::Boolean,
                ValueKind::Timestamp,
            ],
            constraints: true,
            edge_constraints: enterprise,
            multiple_labels: true,
            index_mode: IndexMode::Native,
            batch_rows: BatchRowShape::Map,
            timestamp_constructor: "datetime".to_string(),
        }
    }

    /// Redis-hosted graph module: no constraints, single label per node.
    pub fn redis_graph() -> Self {
        Self {
            native_types: vec![
                ValueKind::Text,
                ValueKind::Integer,
                ValueKind::Float,
                ValueKind::Boolean,
            ],
            constraints: false,
            edge_constraints: false,
            multiple_labels: false,
            index_mode: IndexMode::PerLabel,
            batch_rows: BatchRowShape::Indexed,
            timestamp_constructor: "datetime".to_string(),
        }
    }

    pub fn is_native(&self, kind: ValueKind) -> bool {
        self.native_types.contains(&kind)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::text_only()
    }
}
