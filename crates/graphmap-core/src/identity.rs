//! BLAKE3 content identities for nodes and edges.
//!
//! Identity material is a JSON array holding the label set and then either
//! `[key, kind, value]` triples (nodes) or the endpoint identities (edges).
//! JSON string escaping keeps the encoding unambiguous whatever characters
//! the values contain. The hex digest of that material is the stored
//! identity.

use uuid::Uuid;

use crate::value::Value;

/// Hash identity material into a hex identity string.
pub fn content_hash(material: &str) -> String {
    blake3::hash(material.as_bytes()).to_hex().to_string()
}

/// High-entropy token used when a type has no natural key.
pub fn random_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Identity material for a node given its labels and key pairs.
///
/// The value kind is part of the material, so `1` and `"1"` differ.
pub fn node_material<'a>(
    labels: &[String],
    pairs: impl IntoIterator<Item = (&'a str, &'a Value)>,
) -> String {
    let pairs: Vec<serde_json::Value> = pairs
        .into_iter()
        .map(|(k, v)| serde_json::json!([k, v.kind().as_str(), v.to_string()]))
        .collect();
    serde_json::json!([labels, pairs]).to_string()
}

/// Identity for an edge from its labels and both endpoint identities.
pub fn edge_identity(labels: &[String], source: &str, destination: &str) -> String {
    content_hash(&serde_json::json!([labels, source, destination]).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(l: &[&str]) -> Vec<String> {
        l.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_material_layout() {
        let email = Value::from("a@x.com");
        let age = Value::from(30i64);
        let material = node_material(&labels(&["User", "Person"]), [("email", &email), ("age", &age)]);
        assert_eq!(
            material,
            r#"[["User","Person"],[["email","text","a@x.com"],["age","integer","30"]]]"#
        );
    }

    #[test]
    fn test_material_separators_inside_values_stay_distinct() {
        let l = labels(&["Person"]);
        let (a1, a2) = (Value::from("x#last:y"), Value::from("z"));
        let (b1, b2) = (Value::from("x"), Value::from("y#last:z"));

        let a = node_material(&l, [("first", &a1), ("last", &a2)]);
        let b = node_material(&l, [("first", &b1), ("last", &b2)]);
        assert_ne!(a, b);
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_material_distinguishes_value_kinds() {
        let l = labels(&["Person"]);
        let (number, text) = (Value::from(1i64), Value::from("1"));
        assert_ne!(
            node_material(&l, [("id", &number)]),
            node_material(&l, [("id", &text)])
        );
    }

    #[test]
    fn test_hash_is_deterministic_hex() {
        let a = content_hash("User#email:a@x.com");
        let b = content_hash("User#email:a@x.com");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, content_hash("User#email:b@x.com"));
    }

    #[test]
    fn test_edge_identity_depends_on_both_endpoints() {
        let l = labels(&["Meet"]);
        let ab = edge_identity(&l, "a", "b");
        assert_eq!(ab, edge_identity(&l, "a", "b"));
        assert_ne!(ab, edge_identity(&l, "a", "c"));
        assert_ne!(ab, edge_identity(&l, "c", "b"));
        assert_ne!(ab, edge_identity(&l, "b", "a"));
    }

    #[test]
    fn test_random_tokens_differ() {
        assert_ne!(random_token(), random_token());
        assert_eq!(random_token().len(), 32);
    }
}
