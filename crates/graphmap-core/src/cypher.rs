//! Backend-agnostic Cypher text generation.
//!
//! Values are rendered as escaped, type-formatted literals according to the
//! connection's [`Capabilities`]. Output is deterministic: fragments follow
//! the insertion order of the input and escaping is fixed.

use crate::capability::{BatchRowShape, Capabilities};
use crate::entity::{Edge, Node};
use crate::error::{MappingError, Result};
use crate::schema::IDENTITY;
use crate::value::{Value, TIMESTAMP_FORMAT};

/// Variable bound to the node in fetch queries.
pub const NODE_ALIAS: &str = "a";

/// Variable bound to the node in update statements.
pub const UPDATE_ALIAS: &str = "p";

/// Parameter name carrying bulk edge rows.
pub const BATCH_PARAM: &str = "batch";

/// Fragment style: object-literal entries or predicates/assignments on a
/// bound variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// `key: literal`
    Insert,
    /// `var.key = literal`
    Filter,
    /// `var.key = literal`
    Update,
}

/// Escape backslashes and single quotes for a single-quoted literal.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out
}

fn quoted(text: &str) -> String {
    format!("'{}'", escape_text(text))
}

/// Render one value as a literal. Kinds outside the native set are
/// stringified and quoted, and so are non-finite floats, which have no
/// Cypher literal.
pub fn literal(value: &Value, caps: &Capabilities) -> String {
    if !caps.is_native(value.kind()) {
        return quoted(&value.to_string());
    }
    match value {
        Value::Text(s) => quoted(s),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) if !f.is_finite() => quoted(&value.to_string()),
        Value::Float(f) => format!("{f:?}"),
        Value::Timestamp(ts) => format!(
            "{}('{}')",
            caps.timestamp_constructor,
            ts.format(TIMESTAMP_FORMAT)
        ),
    }
}

/// Render `values` as fragments for the given mode.
pub fn render<'a>(
    values: impl IntoIterator<Item = (&'a str, &'a Value)>,
    mode: RenderMode,
    variable: &str,
    caps: &Capabilities,
) -> Vec<String> {
    values
        .into_iter()
        .map(|(key, value)| match mode {
            RenderMode::Insert => format!("{key}: {}", literal(value, caps)),
            RenderMode::Filter | RenderMode::Update => {
                format!("{variable}.{key} = {}", literal(value, caps))
            }
        })
        .collect()
}

/// `A:B:C`
pub fn label_expr(labels: &[String]) -> String {
    labels.join(":")
}

/// Node pattern without the `CREATE` keyword, e.g.
/// `(:User {identity: '...', email: 'a@x.com'})`. Derives the identity if
/// the node has none yet.
pub fn node_pattern(node: &mut Node, caps: &Capabilities) -> Result<String> {
    let identity = Value::Text(node.derive_identity()?.to_string());

    let mut entries = render([(IDENTITY, &identity)], RenderMode::Insert, "", caps);
    entries.extend(render(node.attributes().iter(), RenderMode::Insert, "", caps));
    entries.extend(render(node.properties().iter(), RenderMode::Insert, "", caps));

    Ok(format!(
        "(:{} {{{}}})",
        label_expr(node.labels()),
        entries.join(", ")
    ))
}

/// `CREATE (:Label {...})`
pub fn create_node(node: &mut Node, caps: &Capabilities) -> Result<String> {
    Ok(format!("CREATE {}", node_pattern(node, caps)?))
}

/// One `CREATE` statement for many node patterns.
pub fn create_nodes(patterns: &[String]) -> String {
    format!("CREATE {}", patterns.join(", "))
}

/// Single edge creation between two existing nodes, carrying the edge's
/// property bag.
pub fn create_edge(edge: &mut Edge, caps: &Capabilities) -> String {
    let identity = Value::Text(edge.derive_identity().to_string());

    let mut entries = render([(IDENTITY, &identity)], RenderMode::Insert, "", caps);
    entries.extend(render(edge.properties().iter(), RenderMode::Insert, "", caps));

    let source = edge.source();
    let destination = edge.destination();
    format!(
        "MATCH (from:{} {{identity: {}}}) MATCH (to:{} {{identity: {}}}) CREATE (from)-[:{} {{{}}}]->(to)",
        label_expr(&source.labels),
        quoted(&source.identity),
        label_expr(&destination.labels),
        quoted(&destination.identity),
        label_expr(edge.labels()),
        entries.join(", ")
    )
}

/// Bulk edge creation over `$batch` rows of (from, to, edge) identities.
pub fn bulk_create_edges(
    source_labels: &[String],
    edge_labels: &[String],
    destination_labels: &[String],
    shape: BatchRowShape,
) -> String {
    let (from, to, edge) = match shape {
        BatchRowShape::Map => ("row.identity_from", "row.identity_to", "row.identity_edge"),
        BatchRowShape::Indexed => ("row[0]", "row[1]", "row[2]"),
    };
    format!(
        "UNWIND ${BATCH_PARAM} AS row \
         MATCH (from:{} {{identity: {from}}}) \
         MATCH (to:{} {{identity: {to}}}) \
         CREATE (from)-[:{} {{identity: {edge}}}]->(to)",
        label_expr(source_labels),
        label_expr(destination_labels),
        label_expr(edge_labels),
    )
}

/// Partial update driven by the node's dirty sets, or `None` when nothing
/// changed.
///
/// Label additions become `SET p:New` only when `caps.multiple_labels`;
/// single-label backends simulate them elsewhere.
pub fn update_node(node: &mut Node, caps: &Capabilities) -> Result<Option<String>> {
    let identity = node.derive_identity()?.to_string();

    let mut sets = render(node.attributes().changed(), RenderMode::Update, UPDATE_ALIAS, caps);
    sets.extend(render(
        node.properties().changed(),
        RenderMode::Update,
        UPDATE_ALIAS,
        caps,
    ));

    // Single-label backends store only the primary label on the node.
    let match_labels = if caps.multiple_labels {
        node.previous_labels().unwrap_or(node.labels()).to_vec()
    } else {
        node.labels().iter().take(1).cloned().collect()
    };
    if caps.multiple_labels {
        let added: Vec<String> = node
            .labels()
            .iter()
            .filter(|l| !match_labels.contains(l))
            .cloned()
            .collect();
        if !added.is_empty() {
            sets.push(format!("{UPDATE_ALIAS}:{}", label_expr(&added)));
        }
    }

    if sets.is_empty() {
        return Ok(None);
    }

    Ok(Some(format!(
        "MATCH ({UPDATE_ALIAS}:{}) WHERE {UPDATE_ALIAS}.{IDENTITY} = {} SET {}",
        label_expr(&match_labels),
        quoted(&identity),
        sets.join(", ")
    )))
}

/// `MATCH (a:Label) WHERE a.k = v AND ... RETURN a`
pub fn filter_nodes(labels: &[String], filters: &[(String, Value)], caps: &Capabilities) -> String {
    let predicates = render(
        filters.iter().map(|(k, v)| (k.as_str(), v)),
        RenderMode::Filter,
        NODE_ALIAS,
        caps,
    );
    let pattern = format!("MATCH ({NODE_ALIAS}:{})", label_expr(labels));
    if predicates.is_empty() {
        format!("{pattern} RETURN {NODE_ALIAS}")
    } else {
        format!(
            "{pattern} WHERE {} RETURN {NODE_ALIAS}",
            predicates.join(" AND ")
        )
    }
}

/// Parse caller-supplied filters of the form `{"attr": scalar, ...}`.
///
/// Any other shape, including nested objects, arrays or nulls, is an
/// [`MappingError::InvalidMapping`].
pub fn parse_filters(filters: &serde_json::Value) -> Result<Vec<(String, Value)>> {
    let object = filters.as_object().ok_or_else(|| {
        MappingError::InvalidMapping(format!("filters must be an object, got {filters}"))
    })?;
    object
        .iter()
        .map(|(key, raw)| {
            Value::from_json(raw)
                .map(|value| (key.clone(), value))
                .ok_or_else(|| {
                    MappingError::InvalidMapping(format!(
                        "filter '{key}' must be a scalar, got {raw}"
                    ))
                })
        })
        .collect()
}

/// Lookup of any node by identity.
pub fn match_identity(identity: &str) -> String {
    format!(
        "MATCH ({NODE_ALIAS} {{{IDENTITY}: {}}}) RETURN {NODE_ALIAS}",
        quoted(identity)
    )
}

/// Whole-graph wipe.
pub fn truncate() -> &'static str {
    "MATCH (p) DETACH DELETE p"
}

/// Cypher literal for a JSON parameter value, used where parameters must be
/// inlined into the query header.
pub fn json_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quoted(s),
        serde_json::Value::Array(items) => format!(
            "[{}]",
            items.iter().map(json_literal).collect::<Vec<_>>().join(", ")
        ),
        serde_json::Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{k}: {}", json_literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
