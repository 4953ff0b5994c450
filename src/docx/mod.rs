//! WordprocessingML writer.
//!
//! The IR is walked once into `word/document.xml`; styles, relationships and
//! content types are generated alongside and packed with `zip`.

mod styles;

use std::io::{Cursor, Write};
use std::time::Instant;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::Error;
use crate::model::{Block, Callout, Heading, List, Span, Table};
use crate::strategy::Strategy;
use crate::theme::{Palette, Rgb, WHITE, font_families, tint, to_hex};
use crate::{Blob, StyledDocument};

pub(super) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const TWIPS_PER_PT: f32 = 20.0;
const LIST_INDENT_TWIPS: usize = 360;
const BORDER_COLOR: &str = "d1d5db";

/// Escape text for element content and attribute values, dropping the
/// control characters XML 1.0 cannot carry.
pub(super) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 || c == '\u{fffe}' || c == '\u{ffff}' => {}
            c => out.push(c),
        }
    }
    out
}

/// Run properties inherited from the enclosing block.
#[derive(Clone, Copy, Default)]
struct RunStyle {
    bold: bool,
    color: Option<Rgb>,
}

struct Body {
    xml: String,
    /// Hyperlink targets; index `i` is relationship `rId{i + 2}`.
    links: Vec<String>,
    palette: Palette,
    content_twips: usize,
}

impl Body {
    fn link_id(&mut self, url: &str) -> String {
        let idx = match self.links.iter().position(|l| l == url) {
            Some(i) => i,
            None => {
                self.links.push(url.to_string());
                self.links.len() - 1
            }
        };
        format!("rId{}", idx + 2)
    }

    fn run(&mut self, span: &Span, base: RunStyle) {
        if span.is_break() {
            self.xml.push_str("<w:r><w:br/></w:r>");
            return;
        }
        if span.text.is_empty() {
            return;
        }
        // Children of w:rPr must follow schema order.
        let mut rpr = String::new();
        if span.bold || base.bold {
            rpr.push_str("<w:b/>");
        }
        if span.italic {
            rpr.push_str("<w:i/>");
        }
        if let Some(color) = span.color.or(base.color) {
            rpr.push_str(&format!(r#"<w:color w:val="{}"/>"#, to_hex(color)));
        }
        if span.placeholder {
            rpr.push_str(r#"<w:highlight w:val="yellow"/>"#);
        }
        if span.underline || span.link.is_some() {
            rpr.push_str(r#"<w:u w:val="single"/>"#);
        }
        let run = format!(
            r#"<w:r><w:rPr>{rpr}</w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#,
            escape_xml(&span.text)
        );
        match &span.link {
            Some(url) => {
                let id = self.link_id(url);
                self.xml
                    .push_str(&format!(r#"<w:hyperlink r:id="{id}">{run}</w:hyperlink>"#));
            }
            None => self.xml.push_str(&run),
        }
    }

    fn paragraph(&mut self, ppr: &str, prefix: Option<&str>, spans: &[Span], base: RunStyle) {
        self.xml.push_str("<w:p>");
        if !ppr.is_empty() {
            self.xml.push_str(&format!("<w:pPr>{ppr}</w:pPr>"));
        }
        if let Some(prefix) = prefix {
            self.run(
                &Span {
                    text: prefix.to_string(),
                    ..Span::default()
                },
                base,
            );
        }
        for span in spans {
            self.run(span, base);
        }
        self.xml.push_str("</w:p>");
    }

    fn heading(&mut self, h: &Heading) {
        let style = if h.is_title {
            "Title".to_string()
        } else {
            format!("Heading{}", h.level.clamp(1, 6))
        };
        let base = RunStyle {
            bold: false,
            color: h.color,
        };
        self.paragraph(&format!(r#"<w:pStyle w:val="{style}"/>"#), None, &h.spans, base);
    }

    fn list(&mut self, list: &List) {
        for item in &list.items {
            let left = LIST_INDENT_TWIPS * (item.depth + 1);
            let ppr = format!(r#"<w:ind w:left="{left}" w:hanging="{LIST_INDENT_TWIPS}"/>"#);
            let prefix = format!("{} ", item.label.text());
            self.paragraph(&ppr, Some(&prefix), &item.spans, RunStyle::default());
        }
    }

    fn table(&mut self, table: &Table) {
        let cols = table.column_count();
        if cols == 0 {
            return;
        }
        let col_w = self.content_twips / cols;
        let border = |side: &str| {
            format!(r#"<w:{side} w:val="single" w:sz="4" w:space="0" w:color="{BORDER_COLOR}"/>"#)
        };
        self.xml.push_str(&format!(
            r#"<w:tbl><w:tblPr><w:tblW w:w="{}" w:type="dxa"/><w:tblBorders>{}{}{}{}{}{}</w:tblBorders><w:tblLayout w:type="fixed"/></w:tblPr><w:tblGrid>"#,
            col_w * cols,
            border("top"),
            border("left"),
            border("bottom"),
            border("right"),
            border("insideH"),
            border("insideV"),
        ));
        for _ in 0..cols {
            self.xml.push_str(&format!(r#"<w:gridCol w:w="{col_w}"/>"#));
        }
        self.xml.push_str("</w:tblGrid>");

        for row in &table.rows {
            self.xml.push_str("<w:tr>");
            if row.is_header() {
                self.xml.push_str("<w:trPr><w:tblHeader/></w:trPr>");
            }
            for i in 0..cols {
                let cell = row.cells.get(i);
                let header = cell.is_some_and(|c| c.header);
                let shading = match cell {
                    Some(c) if c.header => Some(c.shading.unwrap_or(self.palette.secondary)),
                    Some(c) => c.shading,
                    None => None,
                };
                self.xml
                    .push_str(&format!(r#"<w:tc><w:tcPr><w:tcW w:w="{col_w}" w:type="dxa"/>"#));
                if let Some(fill) = shading {
                    self.xml.push_str(&format!(
                        r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
                        to_hex(fill)
                    ));
                }
                self.xml.push_str("</w:tcPr>");
                let base = RunStyle {
                    bold: header,
                    color: match cell {
                        Some(c) if c.header => Some(c.color.unwrap_or(WHITE)),
                        Some(c) => c.color,
                        None => None,
                    },
                };
                let spans = cell.map(|c| c.spans.as_slice()).unwrap_or_default();
                self.paragraph(r#"<w:spacing w:after="0"/>"#, None, spans, base);
                self.xml.push_str("</w:tc>");
            }
            self.xml.push_str("</w:tr>");
        }
        self.xml.push_str("</w:tbl>");
        // Keeps adjacent tables from merging.
        self.xml.push_str("<w:p/>");
    }

    fn callout(&mut self, callout: &Callout) {
        let fill = to_hex(
            callout
                .background
                .unwrap_or_else(|| tint(self.palette.secondary, 0.85)),
        );
        let accent = to_hex(self.palette.accent);
        let ppr = format!(
            r#"<w:pBdr><w:left w:val="single" w:sz="24" w:space="4" w:color="{accent}"/></w:pBdr><w:shd w:val="clear" w:color="auto" w:fill="{fill}"/><w:ind w:left="144" w:right="144"/>"#
        );
        for spans in &callout.paragraphs {
            self.paragraph(&ppr, None, spans, RunStyle::default());
        }
    }

    /// The whole text as one paragraph, lines separated by breaks.
    fn plain(&mut self, text: &str) {
        let mut spans = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                spans.push(Span {
                    text: "\n".into(),
                    ..Span::default()
                });
            }
            spans.push(Span {
                text: line.to_string(),
                ..Span::default()
            });
        }
        self.paragraph("", None, &spans, RunStyle::default());
    }
}

fn content_types_xml() -> String {
    concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
        r#"<Default Extension="xml" ContentType="application/xml"/>"#,
        r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
        r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#,
        r#"</Types>"#
    )
    .to_string()
}

fn root_rels_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="word/document.xml"/></Relationships>"#
    )
}

fn document_rels_xml(links: &[String]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/styles" Target="styles.xml"/>"#
    );
    for (i, url) in links.iter().enumerate() {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{REL_NS}/hyperlink" Target="{}" TargetMode="External"/>"#,
            i + 2,
            escape_xml(url)
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn write_part<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    path: &str,
    content: &str,
) -> Result<(), Error> {
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file(path, options)?;
    zip.write_all(content.as_bytes())?;
    Ok(())
}

/// Serialize `doc` as a `.docx` package.
pub fn build(doc: &StyledDocument) -> Result<Vec<u8>, Error> {
    let t0 = Instant::now();
    let geometry = doc.options.page_size.geometry();
    let palette = Palette::of(&doc.theme);
    let content_twips = (geometry.content_width() * TWIPS_PER_PT) as usize;

    let mut body = Body {
        xml: String::new(),
        links: Vec::new(),
        palette,
        content_twips,
    };
    if doc.document.blocks.is_empty() {
        body.plain(&doc.document.plain_text);
    }
    for block in &doc.document.blocks {
        match block {
            Block::Heading(h) => body.heading(h),
            Block::Paragraph(spans) => body.paragraph("", None, spans, RunStyle::default()),
            Block::List(list) => body.list(list),
            Block::Table(table) => body.table(table),
            Block::Callout(callout) => body.callout(callout),
        }
    }

    let (w, h, m) = (
        (geometry.width * TWIPS_PER_PT).round() as u32,
        (geometry.height * TWIPS_PER_PT).round() as u32,
        (geometry.margin * TWIPS_PER_PT).round() as u32,
    );
    let document_xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{WML_NS}" xmlns:r="{REL_NS}"><w:body>{}<w:sectPr><w:pgSz w:w="{w}" w:h="{h}"/><w:pgMar w:top="{m}" w:right="{m}" w:bottom="{m}" w:left="{m}" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        body.xml
    );

    let font = if doc.document.font_family.is_empty() {
        &doc.theme.font_family
    } else {
        &doc.document.font_family
    };
    let font = font_families(font)
        .into_iter()
        .next()
        .unwrap_or_else(|| "Arial".to_string());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    write_part(&mut zip, "[Content_Types].xml", &content_types_xml())?;
    write_part(&mut zip, "_rels/.rels", &root_rels_xml())?;
    write_part(&mut zip, "word/document.xml", &document_xml)?;
    write_part(&mut zip, "word/styles.xml", &styles::styles_xml(&font, &palette))?;
    write_part(
        &mut zip,
        "word/_rels/document.xml.rels",
        &document_rels_xml(&body.links),
    )?;
    let bytes = zip.finish()?.into_inner();

    log::info!(
        "DOCX: {} blocks, {} links, {} bytes in {:.1}ms",
        doc.document.blocks.len(),
        body.links.len(),
        bytes.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(bytes)
}

/// Structured word-processor document.
pub struct StructuredDocx;

impl Strategy for StructuredDocx {
    fn name(&self) -> &'static str {
        "structured-docx"
    }

    fn render(&self, doc: &StyledDocument) -> Result<Blob, Error> {
        Ok(Blob::docx(build(doc)?))
    }
}

/// Fallback: the extracted text as `text/plain`. Callers must go by the
/// blob's MIME type, not the format they asked for.
pub struct PlainTextDocx;

impl Strategy for PlainTextDocx {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn render(&self, doc: &StyledDocument) -> Result<Blob, Error> {
        Ok(Blob::text(doc.document.plain_text.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportOptions;
    use crate::theme::Theme;
    use std::io::Read;

    fn theme() -> Theme {
        Theme {
            secondary: "#112233".into(),
            ..Theme::default()
        }
    }

    fn part(bytes: &[u8], name: &str) -> String {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut out = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    fn docx(html: &str) -> Vec<u8> {
        let doc = StyledDocument::prepare(html, None, &theme(), ExportOptions::default()).unwrap();
        build(&doc).unwrap()
    }

    fn w<'a>(node: roxmltree::Node<'a, 'a>, attr: &str) -> Option<&'a str> {
        node.attribute((WML_NS, attr))
    }

    #[test]
    fn package_has_all_parts() {
        let bytes = docx("<h1>T</h1>");
        let zip = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/styles.xml",
            "word/_rels/document.xml.rels",
        ] {
            assert!(names.contains(&part), "missing {part}");
        }
    }

    #[test]
    fn first_heading_is_title_then_heading_levels() {
        let xml = part(&docx("<h1>Invoice</h1><h2>Items</h2><h1>Notes</h1>"), "word/document.xml");
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let styles: Vec<&str> = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "pStyle")
            .filter_map(|n| w(n, "val"))
            .collect();
        assert_eq!(styles, ["Title", "Heading2", "Heading1"]);
    }

    #[test]
    fn table_has_one_row_per_data_row_plus_header() {
        let xml = part(
            &docx(
                "<table><thead><tr><th>Item</th><th>Qty</th></tr></thead>\
                 <tbody><tr><td>Pen</td><td>2</td></tr><tr><td>Ink</td><td>[Qty]</td></tr></tbody></table>",
            ),
            "word/document.xml",
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let rows: Vec<_> = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "tr")
            .collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].descendants().any(|n| n.tag_name().name() == "tblHeader"));
        assert!(!rows[1].descendants().any(|n| n.tag_name().name() == "tblHeader"));
    }

    #[test]
    fn header_cells_take_themed_shading_and_white_text() {
        let xml = part(
            &docx("<table><tr><th>Item</th><th>Qty</th></tr><tr><td>Pen</td><td>[Qty]</td></tr></table>"),
            "word/document.xml",
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let fills: Vec<&str> = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "shd")
            .filter_map(|n| w(n, "fill"))
            .collect();
        assert_eq!(fills, ["112233", "112233"]);
        let header_run = doc
            .descendants()
            .find(|n| n.tag_name().name() == "t" && n.text() == Some("Item"))
            .and_then(|t| t.parent())
            .unwrap();
        let color = header_run
            .descendants()
            .find(|n| n.tag_name().name() == "color")
            .and_then(|n| w(n, "val"));
        assert_eq!(color, Some("ffffff"));
        assert!(xml.contains(r#"<w:highlight w:val="yellow"/>"#));
    }

    #[test]
    fn list_items_are_prefixed() {
        let xml = part(&docx("<ol><li>One</li><li>Two</li></ol><ul><li>Dot</li></ul>"), "word/document.xml");
        assert!(xml.contains(">1. </w:t>"));
        assert!(xml.contains(">2. </w:t>"));
        assert!(xml.contains(">\u{2022} </w:t>"));
        assert!(xml.contains(r#"w:hanging="360""#));
    }

    #[test]
    fn links_become_external_relationships() {
        let bytes = docx(r#"<p>See <a href="https://example.com/?a=1&amp;b=2">site</a></p>"#);
        let rels = part(&bytes, "word/_rels/document.xml.rels");
        assert!(rels.contains(r#"Target="https://example.com/?a=1&amp;b=2""#));
        let xml = part(&bytes, "word/document.xml");
        assert!(xml.contains(r#"<w:hyperlink r:id="rId2">"#));
    }

    #[test]
    fn callout_is_shaded() {
        let xml = part(
            &docx(r#"<div data-role="callout" style="background-color:#eef2ff"><p>Note</p></div>"#),
            "word/document.xml",
        );
        assert!(xml.contains(r#"w:fill="eef2ff""#));
    }

    #[test]
    fn text_without_blocks_becomes_one_paragraph() {
        let doc = StyledDocument::prepare("<p>x</p>", None, &theme(), ExportOptions::default())
            .map(|mut d| {
                d.document.blocks.clear();
                d.document.plain_text = "first\nsecond".into();
                d
            })
            .unwrap();
        let xml = part(&build(&doc).unwrap(), "word/document.xml");
        let parsed = roxmltree::Document::parse(&xml).unwrap();
        let paragraphs = parsed
            .descendants()
            .filter(|n| n.tag_name().name() == "p")
            .count();
        assert_eq!(paragraphs, 1);
        assert!(xml.contains("first") && xml.contains("<w:br/>") && xml.contains("second"));
    }

    #[test]
    fn escapes_markup_and_control_chars() {
        assert_eq!(escape_xml("a<b & \"c\"\u{1}"), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn plain_fallback_is_text() {
        let doc = StyledDocument::prepare("<h1>T</h1><p>Body</p>", None, &theme(), ExportOptions::default())
            .unwrap();
        let blob = PlainTextDocx.render(&doc).unwrap();
        assert_eq!(blob.mime, "text/plain");
        assert!(String::from_utf8(blob.bytes).unwrap().contains("Body"));
    }
}
