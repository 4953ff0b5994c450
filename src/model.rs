//! Structural IR shared by every renderer.
//!
//! Built from the themed tree: colours come from the inline styles the
//! theming pass wrote, so renderers never look at the theme for anything the
//! tree already says.

use crate::html::{self, Element, Node, heading_level};
use crate::normalize::PLACEHOLDER_CLASS;
use crate::theme::{Rgb, parse_css_color};

/// Marks a container as a highlighted section ("callout").
pub const CALLOUT_ROLE: &str = "callout";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<Rgb>,
    pub link: Option<String>,
    pub placeholder: bool,
}

impl Span {
    pub fn is_break(&self) -> bool {
        self.text == "\n"
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub spans: Vec<Span>,
    pub color: Option<Rgb>,
    /// First heading of the document; renderers treat it as the title.
    pub is_title: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ListLabel {
    Bullet,
    Ordinal(u32),
}

impl ListLabel {
    pub fn text(&self) -> String {
        match self {
            ListLabel::Bullet => "\u{2022}".to_string(),
            ListLabel::Ordinal(n) => format!("{n}."),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    pub spans: Vec<Span>,
    pub label: ListLabel,
    pub depth: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub items: Vec<ListItem>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableCell {
    pub spans: Vec<Span>,
    pub header: bool,
    pub shading: Option<Rgb>,
    pub color: Option<Rgb>,
}

impl TableCell {
    pub fn has_placeholder(&self) -> bool {
        self.spans.iter().any(|s| s.placeholder)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

impl TableRow {
    pub fn is_header(&self) -> bool {
        !self.cells.is_empty() && self.cells.iter().all(|c| c.header)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Callout {
    pub background: Option<Rgb>,
    pub paragraphs: Vec<Vec<Span>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Heading(Heading),
    Paragraph(Vec<Span>),
    List(List),
    Table(Table),
    Callout(Callout),
}

#[derive(Clone, Debug)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub font_family: String,
    pub text_color: Option<Rgb>,
    pub background: Option<Rgb>,
    pub plain_text: String,
}

impl Document {
    pub fn title(&self) -> Option<&Heading> {
        self.blocks.iter().find_map(|b| match b {
            Block::Heading(h) if h.is_title => Some(h),
            _ => None,
        })
    }

    pub fn title_text(&self) -> Option<String> {
        self.title().map(|h| spans_text(&h.spans))
    }
}

pub fn spans_text(spans: &[Span]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

pub fn has_placeholder(spans: &[Span]) -> bool {
    spans.iter().any(|s| s.placeholder)
}

/// Build the IR from a (usually themed) root element.
pub fn build(root: &Element) -> Document {
    let root_style = root.style();
    // The title is lifted out of wherever it sits so the walk never sees it.
    let mut body = root.clone();
    let title = take_first_heading(&mut body).and_then(|h| heading(&h, true));

    let mut blocks = Vec::new();
    let mut pending = Vec::new();
    walk(&body, &mut blocks, &mut pending);
    flush(&mut blocks, &mut pending);
    if let Some(title) = title {
        blocks.insert(0, Block::Heading(title));
    }

    Document {
        blocks,
        font_family: root_style.get("font-family").cloned().unwrap_or_default(),
        text_color: root_style.get("color").and_then(|c| parse_css_color(c)),
        background: root_style
            .get("background-color")
            .and_then(|c| parse_css_color(c)),
        plain_text: html::plain_text(root),
    }
}

/// Detach the first h1-h6 under `el`, depth-first in document order.
fn take_first_heading(el: &mut Element) -> Option<Element> {
    for i in 0..el.children.len() {
        let is_heading = matches!(&el.children[i], Node::Element(e) if e.is_heading());
        if is_heading {
            return match el.children.remove(i) {
                Node::Element(h) => Some(h),
                Node::Text(_) => None,
            };
        }
        if let Node::Element(child) = &mut el.children[i] {
            if let Some(h) = take_first_heading(child) {
                return Some(h);
            }
        }
    }
    None
}

fn heading(e: &Element, is_title: bool) -> Option<Heading> {
    let level = heading_level(&e.name)?;
    let spans = inline_spans(e, &InlineStyle::default());
    (!spans.is_empty()).then(|| Heading {
        level,
        spans,
        color: e.style_value("color").and_then(|c| parse_css_color(&c)),
        is_title,
    })
}

/// Whether `el` holds block content that must not be flattened into a line.
fn contains_blocks(el: &Element) -> bool {
    el.elements().any(|e| {
        e.is_heading()
            || matches!(
                e.name.as_str(),
                "p" | "ul" | "ol" | "table" | "div" | "section" | "article" | "blockquote"
            )
            || contains_blocks(e)
    })
}

fn flush(blocks: &mut Vec<Block>, pending: &mut Vec<Span>) {
    let spans = collapse(std::mem::take(pending));
    if !spans.is_empty() {
        blocks.push(Block::Paragraph(spans));
    }
}

fn walk(el: &Element, blocks: &mut Vec<Block>, pending: &mut Vec<Span>) {
    for child in &el.children {
        let e = match child {
            Node::Text(t) => {
                pending.push(Span {
                    text: t.clone(),
                    ..Span::default()
                });
                continue;
            }
            Node::Element(e) => e,
        };
        if e.is_heading() {
            flush(blocks, pending);
            if let Some(h) = heading(e, false) {
                blocks.push(Block::Heading(h));
            }
            continue;
        }
        match e.name.as_str() {
            "p" | "pre" | "li" | "dt" | "dd" => {
                flush(blocks, pending);
                let spans = inline_spans(e, &InlineStyle::default());
                if !spans.is_empty() {
                    blocks.push(Block::Paragraph(spans));
                }
            }
            "ul" | "ol" => {
                flush(blocks, pending);
                let mut items = Vec::new();
                collect_list(e, 0, &mut items);
                if !items.is_empty() {
                    blocks.push(Block::List(List {
                        ordered: e.name == "ol",
                        items,
                    }));
                }
            }
            "table" => {
                flush(blocks, pending);
                let table = collect_table(e);
                if !table.rows.is_empty() {
                    blocks.push(Block::Table(table));
                }
            }
            "br" => pending.push(line_break()),
            "hr" | "img" | "svg" => flush(blocks, pending),
            _ if e.attr("data-role") == Some(CALLOUT_ROLE) => {
                flush(blocks, pending);
                let callout = collect_callout(e);
                if !callout.paragraphs.is_empty() {
                    blocks.push(Block::Callout(callout));
                }
            }
            "div" | "section" | "article" | "header" | "footer" | "main" | "blockquote"
            | "aside" | "nav" | "figure" | "dl" | "body" => {
                flush(blocks, pending);
                walk(e, blocks, pending);
                flush(blocks, pending);
            }
            _ if contains_blocks(e) => {
                flush(blocks, pending);
                walk(e, blocks, pending);
                flush(blocks, pending);
            }
            _ => collect_inline(child, &InlineStyle::default(), pending),
        }
    }
}

fn collect_callout(el: &Element) -> Callout {
    let mut inner = Vec::new();
    let mut pending = Vec::new();
    walk(el, &mut inner, &mut pending);
    flush(&mut inner, &mut pending);
    let mut paragraphs = Vec::new();
    for block in inner {
        match block {
            Block::Heading(h) => paragraphs.push(
                h.spans
                    .into_iter()
                    .map(|s| Span { bold: true, ..s })
                    .collect(),
            ),
            Block::Paragraph(spans) => paragraphs.push(spans),
            Block::List(list) => {
                for item in list.items {
                    let mut spans = vec![Span {
                        text: format!("{} ", item.label.text()),
                        ..Span::default()
                    }];
                    spans.extend(item.spans);
                    paragraphs.push(spans);
                }
            }
            Block::Table(table) => {
                for row in table.rows {
                    let text = row
                        .cells
                        .iter()
                        .map(|c| spans_text(&c.spans))
                        .collect::<Vec<_>>()
                        .join(" | ");
                    paragraphs.push(vec![Span {
                        text,
                        ..Span::default()
                    }]);
                }
            }
            Block::Callout(c) => paragraphs.extend(c.paragraphs),
        }
    }
    Callout {
        background: el
            .style_value("background-color")
            .or_else(|| el.style_value("background"))
            .and_then(|c| parse_css_color(&c)),
        paragraphs,
    }
}

fn collect_list(list: &Element, depth: usize, items: &mut Vec<ListItem>) {
    let ordered = list.name == "ol";
    let start = list
        .attr("start")
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(1);
    let mut ordinal = start;
    for li in list.elements().filter(|e| e.name == "li") {
        let style = InlineStyle::default();
        let mut spans = Vec::new();
        for child in &li.children {
            match child {
                Node::Element(e) if e.name == "ul" || e.name == "ol" => {}
                _ => collect_inline(child, &style, &mut spans),
            }
        }
        let spans = collapse(spans);
        if !spans.is_empty() {
            items.push(ListItem {
                spans,
                label: if ordered {
                    ListLabel::Ordinal(ordinal)
                } else {
                    ListLabel::Bullet
                },
                depth,
            });
            ordinal += 1;
        }
        for nested in li.elements().filter(|e| e.name == "ul" || e.name == "ol") {
            collect_list(nested, depth + 1, items);
        }
    }
}

fn collect_table(table: &Element) -> Table {
    let mut rows = Vec::new();
    collect_rows(table, false, &mut rows);
    Table { rows }
}

fn collect_rows(el: &Element, in_head: bool, rows: &mut Vec<TableRow>) {
    for child in el.elements() {
        match child.name.as_str() {
            "thead" => collect_rows(child, true, rows),
            "tbody" | "tfoot" => collect_rows(child, in_head, rows),
            "tr" => {
                let cells: Vec<TableCell> = child
                    .elements()
                    .filter(|c| c.name == "td" || c.name == "th")
                    .map(|c| {
                        let header = in_head || c.name == "th";
                        let base = InlineStyle {
                            bold: header,
                            ..InlineStyle::default()
                        };
                        let mut spans = Vec::new();
                        for n in &c.children {
                            collect_inline(n, &base, &mut spans);
                        }
                        TableCell {
                            spans: collapse(spans),
                            header,
                            shading: c
                                .style_value("background-color")
                                .or_else(|| c.style_value("background"))
                                .and_then(|v| parse_css_color(&v)),
                            color: c.style_value("color").and_then(|v| parse_css_color(&v)),
                        }
                    })
                    .collect();
                if !cells.is_empty() {
                    rows.push(TableRow { cells });
                }
            }
            _ => {}
        }
    }
}

#[derive(Clone, Default)]
struct InlineStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    color: Option<Rgb>,
    link: Option<String>,
    placeholder: bool,
}

fn line_break() -> Span {
    Span {
        text: "\n".into(),
        ..Span::default()
    }
}

fn inline_spans(el: &Element, base: &InlineStyle) -> Vec<Span> {
    let mut spans = Vec::new();
    for child in &el.children {
        collect_inline(child, base, &mut spans);
    }
    collapse(spans)
}

fn collect_inline(node: &Node, style: &InlineStyle, out: &mut Vec<Span>) {
    match node {
        Node::Text(t) => out.push(Span {
            text: t.clone(),
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
            color: style.color,
            link: style.link.clone(),
            placeholder: style.placeholder,
        }),
        Node::Element(e) => {
            if e.name == "br" {
                out.push(line_break());
                return;
            }
            let mut s = style.clone();
            match e.name.as_str() {
                "b" | "strong" | "th" => s.bold = true,
                "i" | "em" | "cite" => s.italic = true,
                "u" | "ins" => s.underline = true,
                "a" => {
                    s.link = e.attr("href").map(str::to_string);
                    s.underline = true;
                }
                _ => {}
            }
            if let Some(c) = e.style_value("color").and_then(|c| parse_css_color(&c)) {
                s.color = Some(c);
            }
            if e
                .style_value("font-weight")
                .is_some_and(|w| w == "bold" || w.parse::<u32>().is_ok_and(|n| n >= 600))
            {
                s.bold = true;
            }
            if e.has_class(PLACEHOLDER_CLASS) {
                s.placeholder = true;
            }
            let block_like = matches!(
                e.name.as_str(),
                "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
            );
            if block_like && !out.is_empty() {
                out.push(Span {
                    text: " ".into(),
                    ..Span::default()
                });
            }
            for child in &e.children {
                collect_inline(child, &s, out);
            }
        }
    }
}

/// Collapse HTML whitespace across span boundaries and drop empty spans.
fn collapse(spans: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    let mut prev_space = true;
    for mut span in spans {
        if span.is_break() {
            // Trailing space before a hard break is insignificant.
            if let Some(last) = out.last_mut() {
                let trimmed = last.text.trim_end().len();
                last.text.truncate(trimmed);
            }
            out.push(span);
            prev_space = true;
            continue;
        }
        let mut text = String::with_capacity(span.text.len());
        for ch in span.text.chars() {
            if ch.is_whitespace() {
                if !prev_space {
                    text.push(' ');
                    prev_space = true;
                }
            } else {
                text.push(ch);
                prev_space = false;
            }
        }
        if text.is_empty() {
            continue;
        }
        span.text = text;
        out.push(span);
    }
    if let Some(last) = out.last_mut() {
        let trimmed = last.text.trim_end().len();
        last.text.truncate(trimmed);
    }
    out.retain(|s| !s.text.is_empty());
    while out.last().is_some_and(Span::is_break) {
        out.pop();
    }
    while out.first().is_some_and(Span::is_break) {
        out.remove(0);
    }
    if out.iter().all(|s| s.is_break() || s.text.trim().is_empty()) {
        out.clear();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::{parse, theming};
    use crate::normalize::normalize;
    use crate::theme::Theme;

    fn doc(html: &str) -> Document {
        let theme = Theme {
            secondary: "#112233".into(),
            primary: "#aa0000".into(),
            ..Theme::default()
        };
        build(&theming::apply(&parse(&normalize(html, None)).unwrap(), &theme))
    }

    #[test]
    fn first_heading_is_title() {
        let d = doc("<p>intro</p><h2>Invoice</h2><h1>Other</h1>");
        assert_eq!(d.title_text().as_deref(), Some("Invoice"));
        let titles = d
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::Heading(h) if h.is_title))
            .count();
        assert_eq!(titles, 1);
    }

    #[test]
    fn title_is_found_inside_callouts() {
        let d = doc(
            "<div data-role=\"callout\"><h1>Quarterly Report</h1><p>Revenue is up.</p></div>\
             <h2>Details</h2>",
        );
        assert_eq!(d.title_text().as_deref(), Some("Quarterly Report"));
        assert!(matches!(&d.blocks[0], Block::Heading(h) if h.is_title && h.level == 1));
        let Block::Callout(c) = &d.blocks[1] else {
            panic!("expected callout");
        };
        assert_eq!(c.paragraphs.len(), 1);
        assert_eq!(spans_text(&c.paragraphs[0]), "Revenue is up.");
        assert!(matches!(&d.blocks[2], Block::Heading(h) if !h.is_title && h.level == 2));
    }

    #[test]
    fn title_is_found_inside_list_items() {
        let d = doc("<p>intro</p><ul><li><h3>Agenda</h3></li><li>coffee</li></ul>");
        assert_eq!(d.title_text().as_deref(), Some("Agenda"));
        let Block::List(list) = &d.blocks[2] else {
            panic!("expected list");
        };
        assert_eq!(list.items.len(), 1);
    }

    #[test]
    fn headings_in_unknown_wrappers_stay_headings() {
        let d = doc("<h1>Report</h1><custom-box><h2>Scope</h2><p>All sites.</p></custom-box>");
        assert!(d.blocks.iter().any(
            |b| matches!(b, Block::Heading(h) if h.level == 2 && spans_text(&h.spans) == "Scope")
        ));
        assert!(d
            .blocks
            .iter()
            .any(|b| matches!(b, Block::Paragraph(s) if spans_text(s) == "All sites.")));
    }

    #[test]
    fn heading_color_comes_from_theme() {
        let d = doc("<h1>T</h1>");
        let Block::Heading(h) = &d.blocks[0] else {
            panic!("expected heading");
        };
        assert_eq!(h.color, Some([0xaa, 0, 0]));
    }

    #[test]
    fn placeholders_are_marked() {
        let d = doc("<p>Bill to [Client Name]</p>");
        let Block::Paragraph(spans) = &d.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(spans_text(spans), "Bill to [Client Name]");
        let ph: Vec<&Span> = spans.iter().filter(|s| s.placeholder).collect();
        assert_eq!(ph.len(), 1);
        assert_eq!(ph[0].text, "[Client Name]");
    }

    #[test]
    fn whitespace_collapses_across_spans() {
        let d = doc("<p>  a <b> b </b>  c  </p>");
        let Block::Paragraph(spans) = &d.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(spans_text(spans), "a b c");
        assert!(spans.iter().any(|s| s.bold && s.text == "b "));
    }

    #[test]
    fn nested_lists_flatten_with_depth() {
        let d = doc("<ol><li>one<ul><li>inner</li></ul></li><li>two</li></ol>");
        let Block::List(list) = &d.blocks[0] else {
            panic!("expected list");
        };
        let labels: Vec<(String, usize)> = list
            .items
            .iter()
            .map(|i| (format!("{} {}", i.label.text(), spans_text(&i.spans)), i.depth))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("1. one".to_string(), 0),
                ("\u{2022} inner".to_string(), 1),
                ("2. two".to_string(), 0)
            ]
        );
    }

    #[test]
    fn table_header_shading_is_secondary() {
        let d = doc(
            "<table><thead><tr><th>A</th><th>B</th></tr></thead>\
             <tbody><tr><td>1</td><td>2</td></tr><tr><td>3</td><td>[X]</td></tr></tbody></table>",
        );
        let Block::Table(t) = &d.blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(t.rows.len(), 3);
        assert!(t.rows[0].is_header());
        assert_eq!(t.rows[0].cells[0].shading, Some([0x11, 0x22, 0x33]));
        assert!(t.rows[2].cells[1].has_placeholder());
    }

    #[test]
    fn callout_requires_explicit_role() {
        let d = doc(
            "<div class=\"highlight\" style=\"background-color:#eef\"><p>plain</p></div>\
             <div data-role=\"callout\" style=\"background-color:#eeeeff\"><p>note</p></div>",
        );
        assert!(matches!(d.blocks[0], Block::Paragraph(_)));
        let Block::Callout(c) = &d.blocks[1] else {
            panic!("expected callout");
        };
        assert_eq!(c.background, Some([0xee, 0xee, 0xff]));
        assert_eq!(spans_text(&c.paragraphs[0]), "note");
    }

    #[test]
    fn loose_text_becomes_paragraph_and_empty_blocks_vanish() {
        let d = doc("<div>loose <b>text</b></div><p>   </p><h2></h2>");
        assert_eq!(d.blocks.len(), 1);
        assert!(matches!(&d.blocks[0], Block::Paragraph(s) if spans_text(s) == "loose text"));
    }
}
