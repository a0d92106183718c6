//! Java-style `.properties` parser and comparison.
//!
//! Entries keep their source order, the comment block directly above them,
//! and their starting line. Duplicate keys are kept as separate entries.
//! Identity is the multiset of `(key, value)` pairs: order and comments are
//! reported separately by [`compare`].

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::{truncate, NodeKind, StructuralNode};
use crate::diff::{edit_script, DiffOp};
use crate::errors::ParseError;
use crate::models::{Insight, InsightKind};

/// Parse a properties file into a `Mapping` of `Scalar` entries. The
/// mapping's own `comment` holds any comment lines after the last entry.
pub fn parse(text: &str) -> Result<StructuralNode, ParseError> {
    let mut root = StructuralNode::new(NodeKind::Mapping, "");
    let mut pending_comment: Vec<&str> = Vec::new();
    let lines: Vec<&str> = text.lines().collect();

    let mut index = 0;
    while index < lines.len() {
        let start_line = index + 1;
        let trimmed = lines[index].trim_start();
        index += 1;

        if trimmed.is_empty() {
            continue;
        }
        if is_comment(trimmed) {
            pending_comment.push(trimmed.trim_end());
            continue;
        }

        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.get(index) {
                Some(next) => {
                    logical.push_str(next.trim_start());
                    index += 1;
                }
                None => break,
            }
        }

        let (raw_key, raw_value) = split_entry(&logical);
        let mut entry = StructuralNode::new(NodeKind::Scalar, unescape(raw_key, start_line)?);
        entry.value = Some(unescape(raw_value, start_line)?);
        entry.line = Some(start_line);
        if !pending_comment.is_empty() {
            entry.comment = Some(pending_comment.join("\n"));
            pending_comment.clear();
        }
        root.children.push(entry);
    }

    if !pending_comment.is_empty() {
        root.comment = Some(pending_comment.join("\n"));
    }
    debug!(entries = root.children.len(), "parsed properties");
    root.seal();
    Ok(root)
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with('!')
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split a logical line at the first unescaped `=`, `:` or whitespace.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || c.is_whitespace() {
            key_end = i;
            break;
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start();
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start();
    }
    (key, rest)
}

fn unescape(raw: &str, line: usize) -> Result<String, ParseError> {
    let error = |detail: String| ParseError::Properties { line, detail };
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let unit = read_unit(&mut chars).map_err(error)?;
                let decoded = if (0xD800..0xDC00).contains(&unit) {
                    let low = match (chars.next(), chars.next()) {
                        (Some('\\'), Some('u')) => read_unit(&mut chars).map_err(error)?,
                        _ => return Err(error(format!("unpaired surrogate \\u{unit:04X}"))),
                    };
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(error(format!("unpaired surrogate \\u{unit:04X}")));
                    }
                    0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    unit
                };
                let ch = char::from_u32(decoded)
                    .ok_or_else(|| error(format!("invalid code point \\u{decoded:04X}")))?;
                out.push(ch);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

fn read_unit(chars: &mut impl Iterator<Item = char>) -> Result<u32, String> {
    let digits: String = chars.take(4).collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("malformed \\u escape '\\u{digits}'"));
    }
    u32::from_str_radix(&digits, 16).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Compare two parsed property sets.
///
/// Returns `Semantic` insights when the `(key, value)` multisets differ.
/// Otherwise reports moved keys as `Reordered` and changed comments as
/// `CommentOnly`.
pub fn compare(before: &StructuralNode, after: &StructuralNode) -> Vec<Insight> {
    let semantic = value_changes(before, after);
    if !semantic.is_empty() {
        return semantic;
    }
    let mut out = key_moves(before, after);
    out.extend(comment_changes(before, after));
    out
}

fn values_by_key(node: &StructuralNode) -> BTreeMap<&str, Vec<&str>> {
    let mut map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for entry in &node.children {
        map.entry(entry.name.as_str())
            .or_default()
            .push(entry.value.as_deref().unwrap_or_default());
    }
    map
}

fn value_changes(before: &StructuralNode, after: &StructuralNode) -> Vec<Insight> {
    let old = values_by_key(before);
    let new = values_by_key(after);
    let keys: BTreeSet<&str> = old.keys().chain(new.keys()).copied().collect();

    let mut out = Vec::new();
    for key in keys {
        let mut a = old.get(key).cloned().unwrap_or_default();
        let mut b = new.get(key).cloned().unwrap_or_default();
        a.sort_unstable();
        b.sort_unstable();
        if a == b {
            continue;
        }
        let description = match (a.as_slice(), b.as_slice()) {
            ([], [v]) => format!("property '{key}' added (\"{}\")", truncate(v, 60)),
            ([], _) => format!("property '{key}' added {} times", b.len()),
            ([v], []) => format!("property '{key}' removed (was \"{}\")", truncate(v, 60)),
            (_, []) => format!("property '{key}' removed ({} entries)", a.len()),
            ([x], [y]) => format!(
                "property '{key}' changed from \"{}\" to \"{}\"",
                truncate(x, 60),
                truncate(y, 60)
            ),
            _ => format!(
                "property '{key}' entries changed ({} before, {} after)",
                a.len(),
                b.len()
            ),
        };
        out.push(Insight::new(InsightKind::Semantic, key, description));
    }
    out
}

/// The `nth` entry named `key`.
fn nth_entry<'a>(node: &'a StructuralNode, key: &str, nth: usize) -> Option<&'a StructuralNode> {
    node.children.iter().filter(|e| e.name == key).nth(nth)
}

fn key_moves(before: &StructuralNode, after: &StructuralNode) -> Vec<Insight> {
    let old: Vec<&str> = before.children.iter().map(|e| e.name.as_str()).collect();
    let new: Vec<&str> = after.children.iter().map(|e| e.name.as_str()).collect();
    if old == new {
        return Vec::new();
    }

    // Unescaped keys may contain line breaks; align their escaped forms so
    // every key stays a single diff line.
    let old_escaped: Vec<String> = old.iter().map(|k| k.escape_debug().to_string()).collect();
    let new_escaped: Vec<String> = new.iter().map(|k| k.escape_debug().to_string()).collect();
    let old_lines: Vec<&str> = old_escaped.iter().map(String::as_str).collect();
    let new_lines: Vec<&str> = new_escaped.iter().map(String::as_str).collect();

    let mut out = Vec::new();
    for op in edit_script(&old_lines, &new_lines) {
        let new_range = match op {
            DiffOp::Insert { new: range, .. } | DiffOp::Replace { new: range, .. } => range,
            _ => continue,
        };
        for j in new_range {
            let key = new[j];
            let shown = new_lines[j];
            let nth = new[..j].iter().filter(|k| **k == key).count();
            let from = nth_entry(before, key, nth).and_then(|e| e.line);
            let to = after.children[j].line;
            let description = match (from, to) {
                (Some(a), Some(b)) => format!("property '{shown}' reordered from line {a} to line {b}"),
                _ => format!("property '{shown}' reordered"),
            };
            out.push(Insight::new(InsightKind::Reordered, shown, description));
        }
    }
    out
}

fn comment_changes(before: &StructuralNode, after: &StructuralNode) -> Vec<Insight> {
    let mut out = Vec::new();
    let mut seen: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for entry in &after.children {
        let value = entry.value.as_deref().unwrap_or_default();
        let nth = seen.entry((entry.name.as_str(), value)).or_insert(0);
        let original = before
            .children
            .iter()
            .filter(|e| e.name == entry.name && e.value.as_deref().unwrap_or_default() == value)
            .nth(*nth);
        *nth += 1;

        let Some(original) = original else { continue };
        if original.comment != entry.comment {
            let what = match (&original.comment, &entry.comment) {
                (None, Some(_)) => "added",
                (Some(_), None) => "removed",
                _ => "changed",
            };
            out.push(Insight::new(
                InsightKind::CommentOnly,
                entry.name.as_str(),
                format!("comment above property '{}' {what}", entry.name),
            ));
        }
    }
    if before.comment != after.comment {
        out.push(Insight::new(
            InsightKind::CommentOnly,
            "(end of file)",
            "trailing comment changed",
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry<'a>(node: &'a StructuralNode, key: &str) -> &'a StructuralNode {
        node.children.iter().find(|e| e.name == key).unwrap()
    }

    #[test]
    fn test_separators_and_comments() {
        let text = "# database\ndb.url=jdbc:h2\n! legacy\ndb.user : admin\ndb.pass secret\n\n# end\n";
        let root = parse(text).unwrap();
        assert_eq!(root.children.len(), 3);
        assert_eq!(entry(&root, "db.url").value.as_deref(), Some("jdbc:h2"));
        assert_eq!(entry(&root, "db.url").comment.as_deref(), Some("# database"));
        assert_eq!(entry(&root, "db.user").value.as_deref(), Some("admin"));
        assert_eq!(entry(&root, "db.user").line, Some(4));
        assert_eq!(entry(&root, "db.pass").value.as_deref(), Some("secret"));
        assert_eq!(root.comment.as_deref(), Some("# end"));
    }

    #[test]
    fn test_continuations_and_escapes() {
        let text = "list = a,\\\n       b,\\\n       c\npath=C:\\\\temp\\\\\nkey\\ with\\=sep = v\ngreeting=caf\\u00e9\n";
        let root = parse(text).unwrap();
        assert_eq!(entry(&root, "list").value.as_deref(), Some("a,b,c"));
        assert_eq!(entry(&root, "path").value.as_deref(), Some("C:\\temp\\"));
        assert_eq!(entry(&root, "key with=sep").value.as_deref(), Some("v"));
        assert_eq!(entry(&root, "greeting").value.as_deref(), Some("café"));
    }

    #[test]
    fn test_duplicate_keys_are_kept() {
        let root = parse("a=1\na=2\n").unwrap();
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn test_malformed_unicode_escape() {
        let err = parse("ok=1\nbad=\\u12G4\n").unwrap_err();
        assert!(matches!(err, ParseError::Properties { line: 2, .. }));
    }

    #[test]
    fn test_compare_value_change_is_semantic() {
        let a = parse("a=1\nb=2\n").unwrap();
        let b = parse("a=1\nb=3\n").unwrap();
        let insights = compare(&a, &b);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::Semantic);
        assert_eq!(insights[0].location, "b");
    }

    #[test]
    fn test_compare_reorder_and_comment() {
        let a = parse("# first\na=1\nb=2\nc=3\n").unwrap();
        let b = parse("# the first\na=1\nc=3\nb=2\n").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        let insights = compare(&a, &b);
        assert!(insights.iter().any(|i| i.kind == InsightKind::Reordered));
        assert!(insights
            .iter()
            .any(|i| i.kind == InsightKind::CommentOnly && i.location == "a"));
        assert!(insights.iter().all(|i| i.kind != InsightKind::Semantic));
    }
}
