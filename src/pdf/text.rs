use std::collections::{HashMap, HashSet};

use crate::error::Error;
use crate::fonts::css_candidates;
use crate::model::{Block, Callout, Document, Heading, List, Span, spans_text};
use crate::strategy::Strategy;
use crate::theme::{Palette, Rgb, tint};
use crate::{Blob, StyledDocument};

use super::layout::{TextStyle, build_lines, emit_line, wrap_plain};
use super::table::render_table;
use super::{FontSet, Geometry, Page, Writer, stamp_footers};

pub(super) const TITLE_SIZE: f32 = 24.0;
pub(super) const BODY_SIZE: f32 = 11.0;
const LIST_INDENT: f32 = 18.0;
const CALLOUT_PAD: f32 = 8.0;

pub(super) fn heading_size(level: u8) -> f32 {
    (20.0 - 2.0 * (level.max(1) - 1) as f32).max(12.0)
}

/// Primary PDF strategy: real text laid out block by block.
pub struct TextPdf;

impl Strategy for TextPdf {
    fn name(&self) -> &'static str {
        "text-pdf"
    }

    fn render(&self, doc: &StyledDocument) -> Result<Blob, Error> {
        let geometry = doc.options.page_size.geometry();
        let laid = layout_pages(doc, geometry, true)?;
        Ok(Blob::pdf(laid.writer.finish(&laid.pages, geometry)))
    }
}

/// Pages laid out for one document, with the writer holding their fonts.
pub(crate) struct Laid {
    pub(crate) writer: Writer,
    pub(crate) pages: Vec<Page>,
    /// Cursor position after the last block on the last page.
    pub(crate) end_y: f32,
}

/// Register fonts and lay the document out into pages, optionally stamping
/// `Page N of Total` footers.
pub(crate) fn layout_pages(
    doc: &StyledDocument,
    geometry: Geometry,
    footers: bool,
) -> Result<Laid, Error> {
    let t0 = std::time::Instant::now();
    let ir = &doc.document;
    let family = if ir.font_family.is_empty() {
        css_candidates(&doc.theme.font_family)
    } else {
        css_candidates(&ir.font_family)
    };

    let mut writer = Writer::new();
    for ((bold, italic), chars) in used_chars(ir) {
        writer.family(&family, bold, italic, &chars);
    }
    writer.helvetica(false, false);
    let t_fonts = t0.elapsed();

    let palette = Palette::of(&doc.theme);
    let mut flow = Flow::new(writer.fonts(), geometry, &family, palette, ir.text_color);
    flow.document(ir)?;
    let end_y = flow.y;
    let mut pages = flow.finish();
    if footers {
        stamp_footers(&mut pages, &mut writer, geometry);
    }

    log::info!(
        "Text layout: fonts={:.1}ms, layout={:.1}ms, {} pages",
        t_fonts.as_secs_f64() * 1000.0,
        (t0.elapsed() - t_fonts).as_secs_f64() * 1000.0,
        pages.len(),
    );
    Ok(Laid {
        writer,
        pages,
        end_y,
    })
}

/// Characters per (bold, italic) variant, for subsetting.
fn used_chars(ir: &Document) -> HashMap<(bool, bool), HashSet<char>> {
    let mut map: HashMap<(bool, bool), HashSet<char>> = HashMap::new();
    let mut add = |spans: &[Span], force_bold: bool| {
        for s in spans {
            map.entry((force_bold || s.bold, s.italic))
                .or_default()
                .extend(s.text.chars());
        }
    };
    for block in &ir.blocks {
        match block {
            Block::Heading(h) => add(&h.spans, true),
            Block::Paragraph(spans) => add(spans, false),
            Block::List(list) => list.items.iter().for_each(|i| add(&i.spans, false)),
            Block::Table(t) => t
                .rows
                .iter()
                .flat_map(|r| r.cells.iter())
                .for_each(|c| add(&c.spans, c.header)),
            Block::Callout(c) => c.paragraphs.iter().for_each(|p| add(p, false)),
        }
    }
    let regular = map.entry((false, false)).or_default();
    regular.extend(ir.plain_text.chars());
    regular.extend("0123456789.|\u{2022}Pageof".chars());
    // Pipe rows reuse the header's bold face for their separators.
    map.entry((true, false)).or_default().insert('|');
    for chars in map.values_mut() {
        chars.insert(' ');
    }
    map
}

/// Vertical flow of blocks across pages.
pub(super) struct Flow<'a> {
    pub(super) fonts: &'a FontSet,
    pub(super) g: Geometry,
    pub(super) family: &'a str,
    pub(super) palette: Palette,
    pub(super) body: Rgb,
    pub(super) pages: Vec<Page>,
    pub(super) page: Page,
    pub(super) y: f32,
}

impl<'a> Flow<'a> {
    pub(super) fn new(
        fonts: &'a FontSet,
        g: Geometry,
        family: &'a str,
        palette: Palette,
        body: Option<Rgb>,
    ) -> Flow<'a> {
        Flow {
            fonts,
            g,
            family,
            palette,
            body: body.unwrap_or(palette.text),
            pages: Vec::new(),
            page: Page::default(),
            y: g.top(),
        }
    }

    pub(super) fn at_top(&self) -> bool {
        (self.y - self.g.top()).abs() < 0.5
    }

    pub(super) fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.page));
        self.y = self.g.top();
    }

    /// Break the page when `h` more points would cross the bottom margin.
    pub(super) fn ensure(&mut self, h: f32) {
        if !self.at_top() && self.y - h < self.g.bottom() {
            self.new_page();
        }
    }

    pub(super) fn style(&self, size: f32, color: Rgb, bold: bool) -> TextStyle<'a> {
        TextStyle {
            family: self.family,
            size,
            color,
            bold,
        }
    }

    pub(super) fn line_height(&self, style: TextStyle) -> f32 {
        let key = crate::fonts::font_key(style.family, style.bold, false);
        self.fonts
            .get(&key)
            .map(|e| e.line_height(style.size))
            .unwrap_or(style.size * 1.2)
            .max(style.size * 1.25)
    }

    pub(super) fn ascent(&self, style: TextStyle) -> f32 {
        let key = crate::fonts::font_key(style.family, style.bold, false);
        style.size
            * self
                .fonts
                .get(&key)
                .and_then(|e| e.ascender_ratio)
                .unwrap_or(0.8)
    }

    /// Wrap and draw `spans` starting at `x`, breaking pages per line.
    pub(super) fn text_block(&mut self, spans: &[Span], style: TextStyle, x: f32, width: f32) {
        let lh = self.line_height(style);
        let ascent = self.ascent(style);
        for line in build_lines(spans, style, self.fonts, width) {
            self.ensure(lh);
            emit_line(&mut self.page, &line, x, self.y - ascent);
            self.y -= lh;
        }
    }

    pub(super) fn gap(&mut self, h: f32) {
        if !self.at_top() {
            self.y -= h;
        }
    }

    fn document(&mut self, ir: &Document) -> Result<(), Error> {
        if let Some(title) = ir.title() {
            self.title(title);
        }
        if ir.blocks.is_empty() {
            self.plain(&ir.plain_text);
            return Ok(());
        }
        for block in &ir.blocks {
            match block {
                Block::Heading(h) if h.is_title => {}
                Block::Heading(h) => self.heading(h),
                Block::Paragraph(spans) => {
                    let style = self.style(BODY_SIZE, self.body, false);
                    self.text_block(spans, style, self.g.margin, self.g.content_width());
                    self.gap(BODY_SIZE * 0.6);
                }
                Block::List(list) => self.list(list),
                Block::Table(table) => {
                    if let Err(e) = render_table(self, table) {
                        log::warn!("Table drawing failed ({e}), writing rows as text");
                        self.pipe_table(table);
                    }
                    self.gap(BODY_SIZE * 0.8);
                }
                Block::Callout(c) => self.callout(c),
            }
        }
        Ok(())
    }

    fn title(&mut self, title: &Heading) {
        let style = self.style(TITLE_SIZE, title.color.unwrap_or(self.palette.primary), true);
        self.text_block(&title.spans, style, self.g.margin, self.g.content_width());
        self.gap(TITLE_SIZE * 0.5);
    }

    fn heading(&mut self, h: &Heading) {
        let size = heading_size(h.level);
        self.gap(size * 0.4);
        let style = self.style(size, h.color.unwrap_or(self.palette.primary), true);
        self.text_block(&h.spans, style, self.g.margin, self.g.content_width());
        self.gap(size * 0.3);
    }

    fn list(&mut self, list: &List) {
        for item in &list.items {
            let style = self.style(BODY_SIZE, self.body, false);
            let indent = LIST_INDENT * (item.depth + 1) as f32;
            let label = item.label.text();
            let lh = self.line_height(style);
            self.ensure(lh);
            let regular = style.key_for(&Span::default());
            let label_w = self
                .fonts
                .get(&regular)
                .map(|e| e.word_width(&label, BODY_SIZE))
                .unwrap_or(BODY_SIZE);
            let baseline = self.y - self.ascent(style);
            self.page.ops.push(super::DrawOp::Text {
                x: self.g.margin + indent - label_w - 4.0,
                y: baseline,
                size: BODY_SIZE,
                font: regular,
                color: self.body,
                text: label,
            });
            let x = self.g.margin + indent;
            let width = self.g.content_width() - indent;
            self.text_block(&item.spans, style, x, width);
            self.gap(BODY_SIZE * 0.2);
        }
        self.gap(BODY_SIZE * 0.4);
    }

    fn callout(&mut self, callout: &Callout) {
        let style = self.style(BODY_SIZE, self.body, false);
        let lh = self.line_height(style);
        let width = self.g.content_width() - 2.0 * CALLOUT_PAD;
        let lines: usize = callout
            .paragraphs
            .iter()
            .map(|p| build_lines(p, style, self.fonts, width).len())
            .sum();
        let estimated = lines as f32 * lh + 2.0 * CALLOUT_PAD;
        self.ensure(estimated.min(self.g.top() - self.g.bottom()));
        let bottom = (self.y - estimated).max(self.g.bottom());
        self.page.ops.push(super::DrawOp::Fill {
            x: self.g.margin,
            y: bottom,
            w: self.g.content_width(),
            h: self.y - bottom,
            color: callout
                .background
                .unwrap_or_else(|| tint(self.palette.secondary, 0.85)),
        });
        self.y -= CALLOUT_PAD;
        for p in &callout.paragraphs {
            self.text_block(p, style, self.g.margin + CALLOUT_PAD, width);
        }
        self.y -= CALLOUT_PAD;
        self.gap(BODY_SIZE * 0.6);
    }

    /// One text line per row, cells joined with `" | "`.
    pub(super) fn pipe_table(&mut self, table: &crate::model::Table) {
        for row in &table.rows {
            let text = row
                .cells
                .iter()
                .map(|c| spans_text(&c.spans))
                .collect::<Vec<_>>()
                .join(" | ");
            let spans = [Span {
                text,
                bold: row.is_header(),
                ..Span::default()
            }];
            let style = self.style(BODY_SIZE, self.body, false);
            self.text_block(&spans, style, self.g.margin, self.g.content_width());
        }
    }

    pub(super) fn plain(&mut self, text: &str) {
        let style = self.style(BODY_SIZE, self.body, false);
        let key = style.key_for(&Span::default());
        let lh = self.line_height(style);
        let ascent = self.ascent(style);
        for line in wrap_plain(text, &key, BODY_SIZE, self.fonts, self.g.content_width()) {
            self.ensure(lh);
            if !line.is_empty() {
                self.page.ops.push(super::DrawOp::Text {
                    x: self.g.margin,
                    y: self.y - ascent,
                    size: BODY_SIZE,
                    font: key.clone(),
                    color: self.body,
                    text: line,
                });
            }
            self.y -= lh;
        }
    }

    pub(super) fn finish(mut self) -> Vec<Page> {
        if !self.page.ops.is_empty() || self.pages.is_empty() {
            self.new_page();
        }
        self.pages
    }
}
