//! XML parser producing a namespace-resolved element tree.
//!
//! Element and attribute names are resolved to `{uri}local` against the
//! `xmlns` declarations in scope, so renaming a prefix does not change the
//! structure. Namespace declarations themselves are not attributes of the
//! tree. Text content is whitespace-collapsed; comments, processing
//! instructions and the DOCTYPE are skipped.

use std::collections::HashMap;

use tracing::debug;

use super::{NodeKind, StructuralNode};
use crate::errors::ParseError;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Parse an XML document into its root element.
pub fn parse(text: &str) -> Result<StructuralNode, ParseError> {
    debug!("parsing XML ({} bytes)", text.len());
    let mut parser = Parser {
        src: text,
        pos: 0,
        line: 1,
        stack: Vec::new(),
        root: None,
    };
    let mut root = parser.run()?;
    root.seal();
    Ok(root)
}

// ---------------------------------------------------------------------------
// Parser state
// ---------------------------------------------------------------------------

struct OpenElement {
    node: StructuralNode,
    namespaces: HashMap<String, String>,
    text: String,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    stack: Vec<OpenElement>,
    root: Option<StructuralNode>,
}

impl<'a> Parser<'a> {
    fn run(&mut self) -> Result<StructuralNode, ParseError> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<![CDATA[") {
                self.bump("<![CDATA[".len());
                let content = self.take_until("]]>", "CDATA section")?;
                self.push_text(content, false)?;
            } else if rest.starts_with("<!DOCTYPE") {
                self.skip_doctype()?;
            } else if rest.starts_with("</") {
                self.close_tag()?;
            } else if rest.starts_with('<') {
                self.open_tag()?;
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let raw = &rest[..end];
                self.bump(end);
                self.push_text(raw, true)?;
            }
        }

        if let Some(open) = self.stack.last() {
            return Err(self.error(format!("element <{}> is never closed", open.node.written_name)));
        }
        self.root
            .take()
            .ok_or_else(|| self.error("document has no root element"))
    }

    // -- cursor helpers -----------------------------------------------------

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn bump(&mut self, n: usize) {
        self.line += self.src[self.pos..self.pos + n].matches('\n').count();
        self.pos += n;
    }

    fn error(&self, detail: impl Into<String>) -> ParseError {
        ParseError::Xml {
            line: self.line,
            detail: detail.into(),
        }
    }

    /// Consume up to `delimiter` and return what came before it.
    fn take_until(&mut self, delimiter: &str, what: &str) -> Result<&'a str, ParseError> {
        let rest = self.rest();
        let end = rest
            .find(delimiter)
            .ok_or_else(|| self.error(format!("unterminated {what}")))?;
        self.bump(end + delimiter.len());
        Ok(&rest[..end])
    }

    fn skip_past(&mut self, delimiter: &str, what: &str) -> Result<(), ParseError> {
        self.take_until(delimiter, what).map(|_| ())
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.bump(rest.len() - trimmed.len());
    }

    fn skip_doctype(&mut self) -> Result<(), ParseError> {
        if self.root.is_some() || !self.stack.is_empty() {
            return Err(self.error("DOCTYPE must precede the root element"));
        }
        let rest = self.rest();
        let close = rest.find('>');
        let subset = rest.find('[');
        match (subset, close) {
            (Some(open), Some(gt)) if open < gt => {
                self.bump(open + 1);
                // The subset ends at the first `]` followed by optional whitespace and `>`.
                loop {
                    self.skip_past("]", "DOCTYPE internal subset")?;
                    self.skip_whitespace();
                    if self.rest().starts_with('>') {
                        self.bump(1);
                        return Ok(());
                    }
                }
            }
            (_, Some(gt)) => {
                self.bump(gt + 1);
                Ok(())
            }
            (_, None) => Err(self.error("unterminated DOCTYPE")),
        }
    }

    fn read_name(&mut self) -> Result<&'a str, ParseError> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !is_name_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error("expected a name"));
        }
        self.bump(end);
        Ok(&rest[..end])
    }

    // -- content ------------------------------------------------------------

    fn push_text(&mut self, raw: &str, decode: bool) -> Result<(), ParseError> {
        let text = if decode {
            decode_entities(raw).map_err(|d| self.error(d))?
        } else {
            raw.to_string()
        };
        match self.stack.last_mut() {
            Some(open) => {
                open.text.push(' ');
                open.text.push_str(&text);
                Ok(())
            }
            None if text.trim().is_empty() => Ok(()),
            None => Err(self.error("text outside the root element")),
        }
    }

    fn open_tag(&mut self) -> Result<(), ParseError> {
        let line = self.line;
        self.bump(1);
        let written = self.read_name()?;
        if self.stack.is_empty() && self.root.is_some() {
            return Err(self.error(format!("second root element <{written}>")));
        }

        let mut raw_attributes: Vec<(&'a str, String)> = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.bump(2);
                break true;
            }
            if rest.starts_with('>') {
                self.bump(1);
                break false;
            }
            if rest.is_empty() {
                return Err(self.error(format!("unterminated start tag <{written}>")));
            }
            let name = self.read_name()?;
            self.skip_whitespace();
            if !self.rest().starts_with('=') {
                return Err(self.error(format!("attribute '{name}' has no value")));
            }
            self.bump(1);
            self.skip_whitespace();
            let quote = match self.rest().chars().next() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(self.error(format!("attribute '{name}' value is not quoted"))),
            };
            self.bump(1);
            let raw = self.take_until(&quote.to_string(), "attribute value")?;
            if raw.contains('<') {
                return Err(self.error(format!("'<' in value of attribute '{name}'")));
            }
            let value = decode_entities(raw).map_err(|d| self.error(d))?;
            if raw_attributes.iter().any(|(n, _)| *n == name) {
                return Err(self.error(format!("duplicate attribute '{name}'")));
            }
            raw_attributes.push((name, value));
        };

        let mut namespaces = HashMap::new();
        for (name, value) in &raw_attributes {
            if *name == "xmlns" {
                namespaces.insert(String::new(), value.clone());
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                namespaces.insert(prefix.to_string(), value.clone());
            }
        }

        let mut node = StructuralNode::new(NodeKind::Element, written);
        node.line = Some(line);
        node.name = self.resolve(written, &namespaces, true)?;
        for (name, value) in raw_attributes {
            if name == "xmlns" || name.starts_with("xmlns:") {
                continue;
            }
            let resolved = self.resolve(name, &namespaces, false)?;
            if node.attributes.insert(resolved.clone(), value).is_some() {
                return Err(self.error(format!("attribute '{resolved}' given twice")));
            }
            node.attribute_order.push((name.to_string(), resolved));
        }

        let open = OpenElement {
            node,
            namespaces,
            text: String::new(),
        };
        if self_closing {
            self.finish(open);
        } else {
            self.stack.push(open);
        }
        Ok(())
    }

    fn close_tag(&mut self) -> Result<(), ParseError> {
        self.bump(2);
        let name = self.read_name()?;
        self.skip_whitespace();
        if !self.rest().starts_with('>') {
            return Err(self.error(format!("malformed end tag </{name}")));
        }
        self.bump(1);
        let open = self
            .stack
            .pop()
            .ok_or_else(|| self.error(format!("end tag </{name}> without a start tag")))?;
        if open.node.written_name != name {
            return Err(self.error(format!(
                "end tag </{name}> does not match <{}>",
                open.node.written_name
            )));
        }
        self.finish(open);
        Ok(())
    }

    fn finish(&mut self, open: OpenElement) {
        let mut node = open.node;
        let text = collapse_whitespace(&open.text);
        node.value = (!text.is_empty()).then_some(text);
        match self.stack.last_mut() {
            Some(parent) => parent.node.children.push(node),
            None => self.root = Some(node),
        }
    }

    /// Resolve `prefix:local` against the declarations on the element being
    /// opened and then the open ancestors.
    fn resolve(
        &self,
        written: &str,
        own: &HashMap<String, String>,
        is_element: bool,
    ) -> Result<String, ParseError> {
        let (prefix, local) = match written.split_once(':') {
            Some((p, l)) => (p, l),
            None if is_element => ("", written),
            None => return Ok(written.to_string()),
        };
        if prefix == "xml" {
            return Ok(format!("{{{XML_NAMESPACE}}}{local}"));
        }
        let uri = own.get(prefix).or_else(|| {
            self.stack
                .iter()
                .rev()
                .find_map(|open| open.namespaces.get(prefix))
        });
        match uri {
            Some(uri) if !uri.is_empty() => Ok(format!("{{{uri}}}{local}")),
            _ if prefix.is_empty() => Ok(local.to_string()),
            _ => Err(self.error(format!("undeclared namespace prefix '{prefix}'"))),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.') || (!c.is_ascii() && !c.is_whitespace())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace the predefined entities and character references.
fn decode_entities(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| "unterminated entity reference".to_string())?;
        let entity = &after[..semi];
        let decoded = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    return Err(format!("unknown entity '&{entity};'"));
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid character reference '&{entity};'"))?
            }
        };
        out.push(decoded);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_elements_attributes_and_text() {
        let xml = r#"<?xml version="1.0"?>
<!-- build file -->
<project name="demo" version="1">
  <dependency scope="test">junit &amp; friends</dependency>
  <empty/>
</project>
"#;
        let root = parse(xml).unwrap();
        assert_eq!(root.name, "project");
        assert_eq!(root.attributes.get("name").map(String::as_str), Some("demo"));
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].value.as_deref(), Some("junit & friends"));
        assert_eq!(root.children[0].line, Some(4));
        assert_eq!(root.children[1].value, None);
    }

    #[test]
    fn test_namespaces_are_resolved() {
        let a = parse(r#"<a:root xmlns:a="urn:x"><a:item a:k="1"/></a:root>"#).unwrap();
        let b = parse(r#"<b:root xmlns:b="urn:x"><b:item b:k="1"/></b:root>"#).unwrap();
        assert_eq!(a.name, "{urn:x}root");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.written_name, b.written_name);
        assert!(a.attributes.contains_key("{urn:x}k"));
    }

    #[test]
    fn test_default_namespace_applies_to_elements_only() {
        let root = parse(r#"<root xmlns="urn:d" plain="v"><child/></root>"#).unwrap();
        assert_eq!(root.name, "{urn:d}root");
        assert_eq!(root.children[0].name, "{urn:d}child");
        assert!(root.attributes.contains_key("plain"));
    }

    #[test]
    fn test_cdata_and_doctype() {
        let root = parse("<!DOCTYPE note [<!ENTITY x \"y\">]><note><![CDATA[a < b]]></note>").unwrap();
        assert_eq!(root.value.as_deref(), Some("a < b"));
    }

    #[test]
    fn test_doctype_subset_closed_after_whitespace() {
        let text = "<!DOCTYPE note [\n  <!ELEMENT note (#PCDATA)>\n] >\n<note>hi</note>\n";
        let root = parse(text).unwrap();
        assert_eq!(root.value.as_deref(), Some("hi"));
        assert_eq!(root.line, Some(4));

        assert!(parse("<!DOCTYPE note [ <!ELEMENT note ANY> ] <note/>").is_err());
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        for bad in [
            "<a><b></a></b>",
            "<a>",
            "<a/><b/>",
            "text<a/>",
            "<a x=1/>",
            "<a x='1' x='2'/>",
            "<p:a/>",
            "<a>&bogus;</a>",
            "<a><!-- open",
            "",
        ] {
            assert!(
                matches!(parse(bad), Err(ParseError::Xml { .. })),
                "expected parse error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_error_reports_line() {
        let err = parse("<a>\n<b>\n</c>\n</a>").unwrap_err();
        assert!(matches!(err, ParseError::Xml { line: 3, .. }));
    }
}
