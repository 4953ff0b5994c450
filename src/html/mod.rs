//! Owned, DOM-independent document tree.
//!
//! Content is parsed once per export with html5ever and copied into a plain
//! `Node` tree that the export call owns exclusively. Theming and every
//! renderer work on this tree, never on shared state.

pub mod theming;

use std::collections::HashMap;

use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::error::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Element {
        Element {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: String) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    /// Inline `style` declarations, lowercase property names.
    pub fn style(&self) -> HashMap<String, String> {
        parse_style(self.attr("style").unwrap_or(""))
    }

    pub fn style_value(&self, property: &str) -> Option<String> {
        self.style().remove(property)
    }

    pub fn is_heading(&self) -> bool {
        heading_level(&self.name).is_some()
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }
}

pub fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

pub(crate) fn parse_style(style: &str) -> HashMap<String, String> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim().to_ascii_lowercase();
            let v = v.trim();
            (!k.is_empty() && !v.is_empty()).then(|| (k, v.to_string()))
        })
        .collect()
}

/// Write `property: value` into a style attribute, replacing any previous value
/// of that property and keeping the other declarations in order.
pub(crate) fn merge_style(existing: &str, property: &str, value: &str) -> String {
    let mut decls: Vec<String> = existing
        .split(';')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .filter(|d| {
            d.split_once(':')
                .is_none_or(|(k, _)| !k.trim().eq_ignore_ascii_case(property))
        })
        .map(str::to_string)
        .collect();
    decls.push(format!("{property}: {value}"));
    decls.join("; ")
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) if e.name == "br" => out.push('\n'),
            Node::Element(e) => {
                let block = is_block(&e.name);
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                collect_text(&e.children, out);
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "ul" | "ol" | "li"
            | "table" | "tr" | "blockquote" | "pre" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

/// Parse an HTML fragment and return its `<body>` as the document root.
pub fn parse(content: &str) -> Result<Element, Error> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(content);
    let html = dom
        .document
        .children
        .borrow()
        .iter()
        .find_map(|h| element_named(h, "html"))
        .ok_or_else(|| Error::Html("parser produced no <html> element".into()))?;
    let body = html
        .children
        .borrow()
        .iter()
        .find_map(|h| element_named(h, "body"))
        .ok_or_else(|| Error::Html("parser produced no <body> element".into()))?;
    match convert(&body) {
        Some(Node::Element(root)) => Ok(root),
        _ => Err(Error::Html("unexpected body node".into())),
    }
}

fn element_named(handle: &Handle, name: &str) -> Option<Handle> {
    match &handle.data {
        NodeData::Element { name: qn, .. } if &*qn.local == name => Some(handle.clone()),
        _ => None,
    }
}

fn convert(handle: &Handle) -> Option<Node> {
    match &handle.data {
        NodeData::Text { contents } => Some(Node::Text(contents.borrow().to_string())),
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.to_string();
            if matches!(tag.as_str(), "script" | "style" | "template") {
                return None;
            }
            let attrs = attrs
                .borrow()
                .iter()
                .map(|a| (a.name.local.to_string(), a.value.to_string()))
                .collect();
            let children = handle.children.borrow().iter().filter_map(convert).collect();
            Some(Node::Element(Element {
                name: tag,
                attrs,
                children,
            }))
        }
        _ => None,
    }
}

/// Plain text of a whole tree with whitespace collapsed per line.
pub fn plain_text(root: &Element) -> String {
    root.text_content()
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fragment_into_body() {
        let root = parse("<h1>Invoice</h1><p>Bill to <b>you</b></p>").unwrap();
        assert_eq!(root.name, "body");
        let names: Vec<&str> = root.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["h1", "p"]);
    }

    #[test]
    fn drops_scripts() {
        let root = parse("<p>a</p><script>alert(1)</script>").unwrap();
        assert_eq!(plain_text(&root), "a");
    }

    #[test]
    fn plain_text_breaks_blocks() {
        let root = parse("<h1>T</h1><p>one   two</p><ul><li>x</li><li>y</li></ul>").unwrap();
        assert_eq!(plain_text(&root), "T\none two\nx\ny");
    }

    #[test]
    fn merge_style_replaces_property() {
        let s = merge_style("color: red; margin: 0", "color", "#fff");
        assert_eq!(s, "margin: 0; color: #fff");
        assert_eq!(parse_style(&s).get("color").map(String::as_str), Some("#fff"));
    }
}
