//! PDF output shared by the three PDF strategies.
//!
//! Renderers lay pages out as a small display list ([`DrawOp`]) and hand the
//! finished pages to [`Writer::finish`], which paints them into compressed
//! content streams. Keeping the list around makes layout inspectable without
//! decoding a PDF.

mod canvas;
mod layout;
mod plain;
mod table;
mod text;

use std::collections::{HashMap, HashSet};

use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str};

use crate::fonts::{FontEntry, css_candidates, font_key, register_font, register_helvetica};
use crate::theme::Rgb;

pub use canvas::CanvasPdf;
pub use plain::PlainPdf;
pub use text::TextPdf;
pub(crate) use text::{Laid, layout_pages};

pub(crate) type FontSet = HashMap<String, FontEntry>;

/// Family name used for the base-14 fallback font keys.
pub(crate) const HELVETICA: &str = "Helvetica";

pub(crate) const FOOTER_SIZE: f32 = 9.0;

pub(crate) struct LinkAnnotation {
    pub(crate) rect: Rect,
    pub(crate) url: String,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum DrawOp {
    Text {
        x: f32,
        y: f32,
        size: f32,
        /// Font key as registered with the [`Writer`].
        font: String,
        color: Rgb,
        text: String,
    },
    Fill {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Rgb,
    },
    Stroke {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Rgb,
        width: f32,
    },
    Image {
        name: String,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
}

impl DrawOp {
    pub(crate) fn text(&self) -> Option<&str> {
        match self {
            DrawOp::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

#[derive(Default)]
pub(crate) struct Page {
    pub(crate) ops: Vec<DrawOp>,
    pub(crate) links: Vec<LinkAnnotation>,
}

impl Page {
    pub(crate) fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(DrawOp::text)
    }
}

/// Page box and margins in points.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Geometry {
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) margin: f32,
}

impl Geometry {
    pub(crate) fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    pub(crate) fn top(&self) -> f32 {
        self.height - self.margin
    }

    pub(crate) fn bottom(&self) -> f32 {
        self.margin
    }
}

/// Owns the `Pdf` being built, its object ids and every font and image
/// resource registered so far. All pages share one resource dictionary.
pub(crate) struct Writer {
    pdf: Pdf,
    next_id: i32,
    catalog_id: Ref,
    pages_id: Ref,
    fonts: FontSet,
    font_order: Vec<String>,
    images: Vec<(String, Ref)>,
}

impl Writer {
    pub(crate) fn new() -> Writer {
        let mut w = Writer {
            pdf: Pdf::new(),
            next_id: 1,
            catalog_id: Ref::new(1),
            pages_id: Ref::new(2),
            fonts: HashMap::new(),
            font_order: Vec::new(),
            images: Vec::new(),
        };
        w.catalog_id = w.alloc();
        w.pages_id = w.alloc();
        w
    }

    fn alloc(&mut self) -> Ref {
        let r = Ref::new(self.next_id);
        self.next_id += 1;
        r
    }

    pub(crate) fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    fn next_pdf_name(&self) -> String {
        format!("F{}", self.font_order.len() + 1)
    }

    /// Register the CSS `family` list in one variant, embedding the first
    /// installed candidate subsetted to `used_chars`. Returns the font key.
    pub(crate) fn family(
        &mut self,
        family: &str,
        bold: bool,
        italic: bool,
        used_chars: &HashSet<char>,
    ) -> String {
        let candidates = css_candidates(family);
        let key = font_key(&candidates, bold, italic);
        if self.fonts.contains_key(&key) {
            return key;
        }
        let pdf_name = self.next_pdf_name();
        let Writer { pdf, next_id, .. } = self;
        let mut alloc = || {
            let r = Ref::new(*next_id);
            *next_id += 1;
            r
        };
        let entry = register_font(pdf, &candidates, bold, italic, pdf_name, &mut alloc, used_chars);
        self.fonts.insert(key.clone(), entry);
        self.font_order.push(key.clone());
        key
    }

    /// Register a base-14 Helvetica variant. Never touches the file system.
    pub(crate) fn helvetica(&mut self, bold: bool, italic: bool) -> String {
        let key = font_key(HELVETICA, bold, italic);
        if self.fonts.contains_key(&key) {
            return key;
        }
        let pdf_name = self.next_pdf_name();
        let font_ref = self.alloc();
        let entry = register_helvetica(&mut self.pdf, font_ref, bold, italic, pdf_name);
        self.fonts.insert(key.clone(), entry);
        self.font_order.push(key.clone());
        key
    }

    /// Embed packed 8-bit RGB pixels as a Flate-compressed image XObject.
    pub(crate) fn rgb_image(&mut self, rgb: &[u8], width: u32, height: u32) -> String {
        let xobj_ref = self.alloc();
        let pdf_name = format!("Im{}", self.images.len() + 1);
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(rgb, 6);
        let mut xobj = self.pdf.image_xobject(xobj_ref, &compressed);
        xobj.filter(Filter::FlateDecode);
        xobj.width(width as i32);
        xobj.height(height as i32);
        xobj.color_space().device_rgb();
        xobj.bits_per_component(8);
        drop(xobj);
        self.images.push((pdf_name.clone(), xobj_ref));
        pdf_name
    }

    fn paint(&self, page: &Page) -> Content {
        let mut content = Content::new();
        for op in &page.ops {
            match op {
                DrawOp::Text {
                    x,
                    y,
                    size,
                    font,
                    color,
                    text,
                } => {
                    let Some(entry) = self.fonts.get(font) else {
                        log::warn!("text op references unregistered font {font}");
                        continue;
                    };
                    content.begin_text();
                    set_fill(&mut content, *color);
                    content.set_font(Name(entry.pdf_name.as_bytes()), *size);
                    content.next_line(*x, *y);
                    content.show(Str(&entry.encode(text)));
                    content.end_text();
                }
                DrawOp::Fill { x, y, w, h, color } => {
                    content.save_state();
                    set_fill(&mut content, *color);
                    content.rect(*x, *y, *w, *h);
                    content.fill_nonzero();
                    content.restore_state();
                }
                DrawOp::Stroke {
                    x,
                    y,
                    w,
                    h,
                    color,
                    width,
                } => {
                    content.save_state();
                    content.set_line_width(*width);
                    content.set_stroke_rgb(
                        color[0] as f32 / 255.0,
                        color[1] as f32 / 255.0,
                        color[2] as f32 / 255.0,
                    );
                    content.rect(*x, *y, *w, *h);
                    content.stroke();
                    content.restore_state();
                }
                DrawOp::Image { name, x, y, w, h } => {
                    content.save_state();
                    content.transform([*w, 0.0, 0.0, *h, *x, *y]);
                    content.x_object(Name(name.as_bytes()));
                    content.restore_state();
                }
            }
        }
        content
    }

    /// Paint `pages` and assemble the document.
    pub(crate) fn finish(mut self, pages: &[Page], geometry: Geometry) -> Vec<u8> {
        let t0 = std::time::Instant::now();
        let n = pages.len();
        let page_ids: Vec<Ref> = (0..n).map(|_| self.alloc()).collect();
        let content_ids: Vec<Ref> = (0..n).map(|_| self.alloc()).collect();

        let mut page_annot_refs: Vec<Vec<Ref>> = Vec::with_capacity(n);
        for page in pages {
            let mut refs = Vec::with_capacity(page.links.len());
            for link in &page.links {
                let annot_ref = self.alloc();
                let mut annot = self.pdf.annotation(annot_ref);
                annot
                    .subtype(pdf_writer::types::AnnotationType::Link)
                    .rect(link.rect)
                    .border(0.0, 0.0, 0.0, None);
                annot
                    .action()
                    .action_type(pdf_writer::types::ActionType::Uri)
                    .uri(Str(link.url.as_bytes()));
                refs.push(annot_ref);
            }
            page_annot_refs.push(refs);
        }

        for (i, page) in pages.iter().enumerate() {
            let raw = self.paint(page).finish();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
            self.pdf
                .stream(content_ids[i], &compressed)
                .filter(Filter::FlateDecode);
        }

        self.pdf.catalog(self.catalog_id).pages(self.pages_id);
        self.pdf
            .pages(self.pages_id)
            .kids(page_ids.iter().copied())
            .count(n as i32);

        let font_pairs: Vec<(String, Ref)> = self
            .font_order
            .iter()
            .filter_map(|key| self.fonts.get(key))
            .map(|e| (e.pdf_name.clone(), e.font_ref))
            .collect();

        for i in 0..n {
            let mut page = self.pdf.page(page_ids[i]);
            page.media_box(Rect::new(0.0, 0.0, geometry.width, geometry.height))
                .parent(self.pages_id)
                .contents(content_ids[i]);
            if !page_annot_refs[i].is_empty() {
                page.annotations(page_annot_refs[i].iter().copied());
            }
            let mut resources = page.resources();
            {
                let mut fonts = resources.fonts();
                for (name, font_ref) in &font_pairs {
                    fonts.pair(Name(name.as_bytes()), *font_ref);
                }
            }
            if !self.images.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, xobj_ref) in &self.images {
                    xobjects.pair(Name(name.as_bytes()), *xobj_ref);
                }
            }
        }

        log::debug!(
            "PDF assembly: {n} pages, {} fonts, {} images in {:.1}ms",
            font_pairs.len(),
            self.images.len(),
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        self.pdf.finish()
    }
}

fn set_fill(content: &mut Content, [r, g, b]: Rgb) {
    content.set_fill_rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
}

/// Stamp `Page N of Total` centred in the bottom margin of every page.
pub(crate) fn stamp_footers(pages: &mut [Page], writer: &mut Writer, geometry: Geometry) {
    let font = writer.helvetica(false, false);
    let total = pages.len();
    for (i, page) in pages.iter_mut().enumerate() {
        let label = footer_label(i + 1, total);
        let width = writer
            .fonts()
            .get(&font)
            .map(|e| e.word_width(&label, FOOTER_SIZE))
            .unwrap_or(0.0);
        page.ops.push(DrawOp::Text {
            x: (geometry.width - width) / 2.0,
            y: geometry.margin / 2.0,
            size: FOOTER_SIZE,
            font: font.clone(),
            color: [0x6b, 0x72, 0x80],
            text: label,
        });
    }
}

pub(crate) fn footer_label(page: usize, total: usize) -> String {
    format!("Page {page} of {total}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const A4: Geometry = Geometry {
        width: 595.28,
        height: 841.89,
        margin: 56.69,
    };

    #[test]
    fn footers_carry_running_total() {
        let mut w = Writer::new();
        let mut pages = vec![Page::default(), Page::default(), Page::default()];
        stamp_footers(&mut pages, &mut w, A4);
        let labels: Vec<String> = pages
            .iter()
            .map(|p| p.texts().last().unwrap_or_default().to_string())
            .collect();
        assert_eq!(labels, vec!["Page 1 of 3", "Page 2 of 3", "Page 3 of 3"]);
    }

    #[test]
    fn finish_writes_one_page_object_per_page() {
        let mut w = Writer::new();
        let font = w.helvetica(true, false);
        let mut page = Page::default();
        page.ops.push(DrawOp::Text {
            x: 10.0,
            y: 10.0,
            size: 12.0,
            font,
            color: [0, 0, 0],
            text: "hello".into(),
        });
        page.links.push(LinkAnnotation {
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            url: "https://example.com".into(),
        });
        let bytes = w.finish(&[page, Page::default()], A4);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-"));
        assert!(text.contains("/Count 2"));
        assert!(text.contains("Helvetica-Bold"));
        assert!(text.contains("https://example.com"));
    }

    #[test]
    fn images_register_as_xobjects() {
        let mut w = Writer::new();
        let name = w.rgb_image(&[255u8; 2 * 2 * 3], 2, 2);
        assert_eq!(name, "Im1");
        let mut page = Page::default();
        page.ops.push(DrawOp::Image {
            name,
            x: 0.0,
            y: 0.0,
            w: 100.0,
            h: 100.0,
        });
        let bytes = w.finish(&[page], A4);
        assert!(String::from_utf8_lossy(&bytes).contains("/Im1"));
    }
}
