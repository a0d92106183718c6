//! YAML parser built on `serde_yaml`.
//!
//! A file is loaded as a stream of documents. Mapping key order is not part
//! of structural identity; sequence order and document order are. Scalars
//! keep their resolved type, so `port: 80` and `port: "80"` differ.

use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use super::{NodeKind, StructuralNode};
use crate::errors::ParseError;

/// Parse every document in `text` into a `Stream` node.
pub fn parse(text: &str) -> Result<StructuralNode, ParseError> {
    let mut stream = StructuralNode::new(NodeKind::Stream, "");
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|e| ParseError::Yaml(e.to_string()))?;
        stream.children.push(to_node("", value));
    }
    debug!(documents = stream.children.len(), "parsed YAML stream");
    stream.seal();
    Ok(stream)
}

fn to_node(name: &str, value: Value) -> StructuralNode {
    match value {
        Value::Null => scalar(name, None, "null"),
        Value::Bool(b) => scalar(name, Some(b.to_string()), "bool"),
        Value::Number(n) => scalar(name, Some(n.to_string()), "number"),
        Value::String(s) => scalar(name, Some(s), "str"),
        Value::Sequence(items) => {
            let mut node = StructuralNode::new(NodeKind::Sequence, name);
            node.children = items.into_iter().map(|item| to_node("", item)).collect();
            node
        }
        Value::Mapping(entries) => {
            let mut node = StructuralNode::new(NodeKind::Mapping, name);
            node.children = entries
                .into_iter()
                .map(|(key, value)| to_node(&key_text(&key), value))
                .collect();
            node
        }
        Value::Tagged(tagged) => {
            let mut node = to_node(name, tagged.value);
            node.tag = Some(tagged.tag.to_string());
            node
        }
    }
}

fn scalar(name: &str, value: Option<String>, tag: &str) -> StructuralNode {
    let mut node = StructuralNode::new(NodeKind::Scalar, name);
    node.value = value;
    node.tag = Some(tag.to_string());
    node
}

/// Mapping keys are usually strings; anything else is rendered as YAML.
fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_document() {
        let stream = parse("server:\n  host: a\n  ports: [80, 443]\n").unwrap();
        assert_eq!(stream.children.len(), 1);
        let doc = &stream.children[0];
        assert_eq!(doc.kind, NodeKind::Mapping);
        let server = &doc.children[0];
        assert_eq!(server.name, "server");
        assert_eq!(server.children[1].kind, NodeKind::Sequence);
        assert_eq!(server.children[1].children[0].value.as_deref(), Some("80"));
    }

    #[test]
    fn test_key_order_is_not_identity() {
        let a = parse("a: 1\nb: 2\n").unwrap();
        let b = parse("b: 2\na: 1\n").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_sequence_order_is_identity() {
        let a = parse("- x\n- y\n").unwrap();
        let b = parse("- y\n- x\n").unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_scalar_type_is_identity() {
        let a = parse("port: 80\n").unwrap();
        let b = parse("port: \"80\"\n").unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_comments_and_quoting_style_are_ignored() {
        let a = parse("name: demo # trailing\n").unwrap();
        let b = parse("# header\nname: 'demo'\n").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_multiple_documents() {
        let stream = parse("a: 1\n---\nb: 2\n").unwrap();
        assert_eq!(stream.children.len(), 2);
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(matches!(parse("a: [1, 2\n"), Err(ParseError::Yaml(_))));
        assert!(matches!(parse("a: 1\na: 2\n"), Err(ParseError::Yaml(_))));
    }
}
