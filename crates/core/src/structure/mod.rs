//! Structural representations of configuration formats.
//!
//! Each parser normalizes its format into a [`StructuralNode`] tree:
//! 1. **XML** -- elements with resolved names, unordered attributes, ordered children.
//! 2. **YAML** -- a stream of documents made of mappings, sequences, and scalars.
//! 3. **Properties** -- a flat mapping of key/value entries with their comments.
//!
//! Every node carries a fingerprint that ignores order wherever the format
//! says order is insignificant, so "structurally identical" is a single
//! comparison and reordering can be reported separately by [`compare`].

pub mod properties;
pub mod xml;
pub mod yaml;

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::models::{Insight, InsightKind};

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Shape of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A YAML stream; children are its documents, in order.
    Stream,
    Element,
    Mapping,
    Sequence,
    Scalar,
}

impl NodeKind {
    /// Whether child order takes part in structural identity.
    pub fn children_ordered(self) -> bool {
        matches!(self, Self::Stream | Self::Sequence)
    }
}

/// Generic tree node shared by all parsers.
#[derive(Debug, Clone)]
pub struct StructuralNode {
    pub kind: NodeKind,
    /// Resolved name: `{uri}local` for XML elements, the key for mapping
    /// entries, empty for sequence items and documents.
    pub name: String,
    /// Name as written in the source, e.g. with its namespace prefix.
    pub written_name: String,
    /// Resolved attribute name to value.
    pub attributes: BTreeMap<String, String>,
    /// Attributes in source order as `(written, resolved)` names.
    pub attribute_order: Vec<(String, String)>,
    /// Text content or scalar value.
    pub value: Option<String>,
    /// Scalar type or explicit tag (YAML).
    pub tag: Option<String>,
    /// Comment attached above the node (properties).
    pub comment: Option<String>,
    pub children: Vec<StructuralNode>,
    /// 1-based source line, where the parser can tell.
    pub line: Option<usize>,
    fingerprint: u64,
}

impl StructuralNode {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind,
            written_name: name.clone(),
            name,
            attributes: BTreeMap::new(),
            attribute_order: Vec::new(),
            value: None,
            tag: None,
            comment: None,
            children: Vec::new(),
            line: None,
            fingerprint: 0,
        }
    }

    /// Order-aware structural hash, valid after [`seal`](Self::seal).
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Compute fingerprints bottom-up. Parsers call this once the tree is built.
    pub fn seal(&mut self) {
        for child in &mut self.children {
            child.seal();
        }

        let mut hasher = DefaultHasher::new();
        self.kind.hash(&mut hasher);
        self.name.hash(&mut hasher);
        self.attributes.hash(&mut hasher);
        self.value.hash(&mut hasher);
        self.tag.hash(&mut hasher);

        let mut child_prints: Vec<u64> = self.children.iter().map(|c| c.fingerprint).collect();
        if !self.kind.children_ordered() {
            child_prints.sort_unstable();
        }
        child_prints.hash(&mut hasher);
        self.fingerprint = hasher.finish();
    }

    /// Short label for messages: the written name, or the kind.
    pub fn label(&self) -> String {
        if self.written_name.is_empty() {
            match self.kind {
                NodeKind::Stream => "stream".into(),
                NodeKind::Element => "element".into(),
                NodeKind::Mapping => "mapping".into(),
                NodeKind::Sequence => "sequence".into(),
                NodeKind::Scalar => "value".into(),
            }
        } else {
            self.written_name.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Locators
// ---------------------------------------------------------------------------

/// How child locations are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `/project/dependencies/dependency[2]`
    XPath,
    /// `server.ports[1]`, `doc[1].server` for multi-document streams.
    Dotted,
}

impl PathStyle {
    /// Locator of the tree root itself.
    fn root(self, root: &StructuralNode) -> String {
        match self {
            Self::XPath if root.kind == NodeKind::Element => format!("/{}", root.written_name),
            _ => String::new(),
        }
    }

    /// Locator for the child at `index` of `parent`.
    fn child(self, parent_path: &str, parent: &StructuralNode, index: usize) -> String {
        let child = &parent.children[index];
        match self {
            Self::XPath => {
                let same_named = parent.children.iter().filter(|c| c.name == child.name).count();
                if same_named > 1 {
                    let position = parent.children[..index]
                        .iter()
                        .filter(|c| c.name == child.name)
                        .count()
                        + 1;
                    format!("{parent_path}/{}[{position}]", child.written_name)
                } else {
                    format!("{parent_path}/{}", child.written_name)
                }
            }
            Self::Dotted => match parent.kind {
                NodeKind::Stream if parent.children.len() == 1 => String::new(),
                NodeKind::Stream => format!("doc[{index}]"),
                NodeKind::Sequence => format!("{parent_path}[{index}]"),
                _ if parent_path.is_empty() => child.name.clone(),
                _ => format!("{parent_path}.{}", child.name),
            },
        }
    }

    /// Display form of a possibly empty path.
    pub fn display(self, path: &str) -> String {
        match (self, path.is_empty()) {
            (Self::XPath, true) => "/".into(),
            (Self::Dotted, true) => "(root)".into(),
            _ => path.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

const MAX_LISTED_NAMES: usize = 6;

/// Compare two trees and describe every difference.
///
/// Structural differences yield `Semantic` insights. For trees that are
/// identical modulo order, child permutations under order-insignificant
/// parents and attribute permutations yield `Reordered`, namespace prefix
/// changes yield `FormattingOnly`.
pub fn compare(before: &StructuralNode, after: &StructuralNode, style: PathStyle) -> Vec<Insight> {
    let mut out = Vec::new();
    compare_nodes(style, &style.root(before), before, after, &mut out);
    out
}

fn compare_nodes(
    style: PathStyle,
    path: &str,
    a: &StructuralNode,
    b: &StructuralNode,
    out: &mut Vec<Insight>,
) {
    if a.fingerprint == b.fingerprint {
        compare_presentation(style, path, a, b, out);
        return;
    }

    let location = style.display(path);
    if a.kind != b.kind || a.name != b.name {
        out.push(Insight::new(
            InsightKind::Semantic,
            location,
            format!("{} replaced by {}", describe(a), describe(b)),
        ));
        return;
    }
    if a.value != b.value || a.tag != b.tag {
        out.push(Insight::new(
            InsightKind::Semantic,
            location.clone(),
            format!("value changed from {} to {}", render_value(a), render_value(b)),
        ));
    }
    if a.attributes != b.attributes {
        diff_attributes(&location, a, b, out);
    }

    if a.kind.children_ordered() {
        compare_ordered_children(style, path, a, b, out);
    } else {
        compare_unordered_children(style, path, a, b, out);
    }
}

fn diff_attributes(location: &str, a: &StructuralNode, b: &StructuralNode, out: &mut Vec<Insight>) {
    for (name, old) in &a.attributes {
        match b.attributes.get(name) {
            None => out.push(Insight::new(
                InsightKind::Semantic,
                location,
                format!("attribute '{name}' removed (was \"{old}\")"),
            )),
            Some(new) if new != old => out.push(Insight::new(
                InsightKind::Semantic,
                location,
                format!("attribute '{name}' changed from \"{old}\" to \"{new}\""),
            )),
            Some(_) => {}
        }
    }
    for (name, new) in &b.attributes {
        if !a.attributes.contains_key(name) {
            out.push(Insight::new(
                InsightKind::Semantic,
                location,
                format!("attribute '{name}' added (\"{new}\")"),
            ));
        }
    }
}

fn compare_ordered_children(
    style: PathStyle,
    path: &str,
    a: &StructuralNode,
    b: &StructuralNode,
    out: &mut Vec<Insight>,
) {
    if a.children.len() != b.children.len() {
        let noun = if a.kind == NodeKind::Stream { "documents" } else { "items" };
        out.push(Insight::new(
            InsightKind::Semantic,
            style.display(path),
            format!("{} {noun} before, {} after", a.children.len(), b.children.len()),
        ));
    }
    for i in 0..a.children.len().min(b.children.len()) {
        let child_path = style.child(path, a, i);
        compare_nodes(style, &child_path, &a.children[i], &b.children[i], out);
    }
}

/// Pair children by fingerprint first; leftovers with a unique shared name
/// are compared recursively, the rest are additions and removals.
fn compare_unordered_children(
    style: PathStyle,
    path: &str,
    a: &StructuralNode,
    b: &StructuralNode,
    out: &mut Vec<Insight>,
) {
    let pairs = pair_by_fingerprint(a, b);
    let mut b_used = vec![false; b.children.len()];
    let mut a_left = Vec::new();
    for (i, matched) in pairs.iter().enumerate() {
        match matched {
            Some(j) => b_used[*j] = true,
            None => a_left.push(i),
        }
    }
    let b_left: Vec<usize> = (0..b.children.len()).filter(|j| !b_used[*j]).collect();

    let mut a_reported = vec![false; a.children.len()];
    let mut b_reported = vec![false; b.children.len()];
    for &i in &a_left {
        let name = &a.children[i].name;
        let a_same: Vec<usize> = a_left.iter().copied().filter(|&k| &a.children[k].name == name).collect();
        let b_same: Vec<usize> = b_left.iter().copied().filter(|&k| &b.children[k].name == name).collect();
        if let ([only_a], [only_b]) = (a_same.as_slice(), b_same.as_slice()) {
            let child_path = style.child(path, a, *only_a);
            compare_nodes(style, &child_path, &a.children[*only_a], &b.children[*only_b], out);
            a_reported[*only_a] = true;
            b_reported[*only_b] = true;
        }
    }

    for &i in a_left.iter().filter(|&&i| !a_reported[i]) {
        out.push(Insight::new(
            InsightKind::Semantic,
            style.display(&style.child(path, a, i)),
            format!("{} removed", describe(&a.children[i])),
        ));
    }
    for &j in b_left.iter().filter(|&&j| !b_reported[j]) {
        out.push(Insight::new(
            InsightKind::Semantic,
            style.display(&style.child(path, b, j)),
            format!("{} added", describe(&b.children[j])),
        ));
    }

    let matched: Vec<(usize, usize)> = pairs
        .iter()
        .enumerate()
        .filter_map(|(i, m)| m.map(|j| (i, j)))
        .collect();
    report_child_order(style, path, a, b, &matched, out);
    for (i, j) in matched {
        let child_path = style.child(path, a, i);
        compare_presentation(style, &child_path, &a.children[i], &b.children[j], out);
    }
}

/// For each child of `a`, the index of an identical child of `b`, taking
/// the earliest unused candidate.
fn pair_by_fingerprint(a: &StructuralNode, b: &StructuralNode) -> Vec<Option<usize>> {
    let mut used = vec![false; b.children.len()];
    a.children
        .iter()
        .map(|child| {
            let found = b
                .children
                .iter()
                .enumerate()
                .position(|(j, other)| !used[j] && other.fingerprint == child.fingerprint);
            if let Some(j) = found {
                used[j] = true;
            }
            found
        })
        .collect()
}

/// Structurally identical nodes: report order and spelling differences.
fn compare_presentation(
    style: PathStyle,
    path: &str,
    a: &StructuralNode,
    b: &StructuralNode,
    out: &mut Vec<Insight>,
) {
    let location = style.display(path);
    if a.written_name != b.written_name {
        out.push(Insight::new(
            InsightKind::FormattingOnly,
            location.clone(),
            format!(
                "namespace prefix changed: <{}> is now <{}>",
                a.written_name, b.written_name
            ),
        ));
    }

    let a_order: Vec<&str> = a.attribute_order.iter().map(|(_, r)| r.as_str()).collect();
    let b_order: Vec<&str> = b.attribute_order.iter().map(|(_, r)| r.as_str()).collect();
    if a_order != b_order {
        out.push(Insight::new(
            InsightKind::Reordered,
            location.clone(),
            format!(
                "attribute order changed: {} -> {}",
                a_order.join(", "),
                b_order.join(", ")
            ),
        ));
    }
    if written_attributes(a) != written_attributes(b) {
        out.push(Insight::new(
            InsightKind::FormattingOnly,
            location,
            "attribute namespace prefixes changed",
        ));
    }

    if a.kind.children_ordered() {
        for i in 0..a.children.len().min(b.children.len()) {
            let child_path = style.child(path, a, i);
            compare_presentation(style, &child_path, &a.children[i], &b.children[i], out);
        }
        return;
    }

    let matched: Vec<(usize, usize)> = pair_by_fingerprint(a, b)
        .into_iter()
        .enumerate()
        .filter_map(|(i, m)| m.map(|j| (i, j)))
        .collect();
    report_child_order(style, path, a, b, &matched, out);
    for (i, j) in matched {
        let child_path = style.child(path, a, i);
        compare_presentation(style, &child_path, &a.children[i], &b.children[j], out);
    }
}

/// Attributes as sorted `(resolved, written)` name pairs.
fn written_attributes(node: &StructuralNode) -> Vec<(&str, &str)> {
    let mut names: Vec<(&str, &str)> = node
        .attribute_order
        .iter()
        .map(|(w, r)| (r.as_str(), w.as_str()))
        .collect();
    names.sort_unstable();
    names
}

fn report_child_order(
    style: PathStyle,
    path: &str,
    a: &StructuralNode,
    b: &StructuralNode,
    matched: &[(usize, usize)],
    out: &mut Vec<Insight>,
) {
    let in_order = matched.windows(2).all(|w| w[0].1 < w[1].1);
    if in_order {
        return;
    }
    let mut after_order: Vec<(usize, usize)> = matched.to_vec();
    after_order.sort_by_key(|&(_, j)| j);
    let names_before: Vec<String> = matched.iter().map(|&(i, _)| a.children[i].label()).collect();
    let names_after: Vec<String> = after_order.iter().map(|&(_, j)| b.children[j].label()).collect();
    let what = match a.kind {
        NodeKind::Mapping => "key order changed",
        _ => "child element order changed",
    };
    out.push(Insight::new(
        InsightKind::Reordered,
        style.display(path),
        format!(
            "{what}: {} -> {}",
            list_names(&names_before),
            list_names(&names_after)
        ),
    ));
}

fn list_names(names: &[String]) -> String {
    if names.len() <= MAX_LISTED_NAMES {
        names.join(", ")
    } else {
        format!(
            "{}, ... ({} total)",
            names[..MAX_LISTED_NAMES].join(", "),
            names.len()
        )
    }
}

fn describe(node: &StructuralNode) -> String {
    match node.kind {
        NodeKind::Element => format!("element <{}>", node.written_name),
        NodeKind::Scalar if node.name.is_empty() => format!("value {}", render_value(node)),
        NodeKind::Scalar => format!("key '{}'", node.name),
        NodeKind::Mapping | NodeKind::Sequence if !node.name.is_empty() => format!("key '{}'", node.name),
        _ => node.label(),
    }
}

fn render_value(node: &StructuralNode) -> String {
    match (&node.value, node.kind) {
        (Some(v), _) => format!("\"{}\"", truncate(v, 60)),
        (None, NodeKind::Scalar) => "null".into(),
        (None, NodeKind::Element) => "(empty)".into(),
        (None, kind) => format!("a {}", format!("{kind:?}").to_lowercase()),
    }
}

/// Shorten `text` to at most `max` characters, marking the cut.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, children: Vec<StructuralNode>) -> StructuralNode {
        let mut node = StructuralNode::new(NodeKind::Element, name);
        node.children = children;
        node
    }

    fn sealed(mut node: StructuralNode) -> StructuralNode {
        node.seal();
        node
    }

    #[test]
    fn test_fingerprint_ignores_unordered_child_order() {
        let a = sealed(element("r", vec![element("x", vec![]), element("y", vec![])]));
        let b = sealed(element("r", vec![element("y", vec![]), element("x", vec![])]));
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut seq_a = StructuralNode::new(NodeKind::Sequence, "s");
        seq_a.children = vec![element("x", vec![]), element("y", vec![])];
        let mut seq_b = StructuralNode::new(NodeKind::Sequence, "s");
        seq_b.children = vec![element("y", vec![]), element("x", vec![])];
        assert_ne!(sealed(seq_a).fingerprint(), sealed(seq_b).fingerprint());
    }

    #[test]
    fn test_compare_reports_reorder() {
        let a = sealed(element("r", vec![element("x", vec![]), element("y", vec![])]));
        let b = sealed(element("r", vec![element("y", vec![]), element("x", vec![])]));
        let insights = compare(&a, &b, PathStyle::XPath);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::Reordered);
        assert_eq!(insights[0].location, "/r");
    }

    #[test]
    fn test_compare_locates_added_child() {
        let a = sealed(element("r", vec![element("x", vec![])]));
        let b = sealed(element("r", vec![element("x", vec![]), element("z", vec![])]));
        let insights = compare(&a, &b, PathStyle::XPath);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::Semantic);
        assert_eq!(insights[0].location, "/r/z");
        assert!(insights[0].description.contains("added"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
