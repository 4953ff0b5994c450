//! Bitmap capture of a styled document.
//!
//! The document is laid out exactly like the text-mode PDF, on one very tall
//! page at the capture width, and the resulting display list is painted with
//! tiny-skia. Glyphs come from the installed face behind each font when
//! there is one, otherwise from the built-in bitmap font, so capture never
//! depends on the host's fonts.

pub(crate) mod bitmap_font;
mod glyphs;

use std::collections::HashMap;

use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::StyledDocument;
use crate::error::Error;
use crate::fonts::{FontEntry, css_candidates, load_face_data};
use crate::pdf::{DrawOp, Geometry, Page, layout_pages};
use crate::theme::{Palette, Rgb};

use glyphs::OwnedFace;

/// Points per CSS pixel.
const PT_PER_PX: f32 = 0.75;
/// Height of the single layout page; content beyond it is an error.
const TALL_PAGE_PT: f32 = 60_000.0;
const MARGIN_PT: f32 = 30.0;
/// Largest bitmap side, in device pixels.
const MAX_SIDE_PX: u32 = 32_767;
/// Largest bitmap area, in device pixels (256 MiB of RGBA).
const MAX_PIXELS: u64 = 64 * 1024 * 1024;
/// Accepted device pixel ratios.
const SCALE_RANGE: std::ops::RangeInclusive<f32> = 0.1..=8.0;

/// Reject capture sizes before anything is allocated, so an oversized request
/// is an ordinary error the export chain can fall back from.
fn check_size(width: u64, height: u64) -> Result<(), Error> {
    if width == 0 || height == 0 {
        return Err(Error::Raster(format!("empty capture {width}x{height}")));
    }
    if width > MAX_SIDE_PX as u64 || height > MAX_SIDE_PX as u64 {
        return Err(Error::Raster(format!(
            "capture {width}x{height} exceeds {MAX_SIDE_PX}px per side"
        )));
    }
    if width * height > MAX_PIXELS {
        return Err(Error::Raster(format!(
            "capture {width}x{height} exceeds {MAX_PIXELS} pixels"
        )));
    }
    Ok(())
}

/// Rasterize at `options.raster_width` CSS pixels times `options.raster_scale`,
/// cropped to the content's natural height.
pub(crate) fn rasterize(doc: &StyledDocument) -> Result<Pixmap, Error> {
    let t0 = std::time::Instant::now();
    let css_width = doc.options.raster_width;
    let scale = doc.options.raster_scale;
    if css_width == 0 || !SCALE_RANGE.contains(&scale) {
        return Err(Error::Raster(format!(
            "invalid capture size {css_width}px x {scale}"
        )));
    }
    let width = (css_width as f64 * scale as f64).round() as u64;
    check_size(width, 1)?;
    let geometry = Geometry {
        width: css_width as f32 * PT_PER_PX,
        height: TALL_PAGE_PT,
        margin: MARGIN_PT,
    };
    let laid = layout_pages(doc, geometry, false)?;
    let [page] = laid.pages.as_slice() else {
        return Err(Error::Raster("content is taller than one capture".into()));
    };

    let px_per_pt = scale / PT_PER_PX;
    let used_pt = (geometry.height - laid.end_y + MARGIN_PT).max(MARGIN_PT * 2.0);
    let height = (used_pt as f64 * px_per_pt as f64).ceil() as u64;
    check_size(width, height)?;
    let (width, height) = (width as u32, height as u32);
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| Error::Raster(format!("cannot allocate {width}x{height} bitmap")))?;

    let palette = Palette::of(&doc.theme);
    let [r, g, b] = doc.document.background.unwrap_or(palette.background);
    pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, 255));

    let family = if doc.document.font_family.is_empty() {
        css_candidates(&doc.theme.font_family)
    } else {
        css_candidates(&doc.document.font_family)
    };
    let mut painter = Painter {
        pixmap: &mut pixmap,
        fonts: laid.writer.fonts(),
        family: &family,
        faces: HashMap::new(),
        k: px_per_pt,
        top: geometry.height,
    };
    painter.page(page);

    log::info!(
        "Rasterized {width}x{height} in {:.1}ms",
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(pixmap)
}

/// Un-premultiplied RGB rows `y0..y1` of `pixmap`.
pub(crate) fn rgb_rows(pixmap: &Pixmap, y0: u32, y1: u32) -> Vec<u8> {
    let w = pixmap.width() as usize;
    let rows = &pixmap.pixels()[y0 as usize * w..y1 as usize * w];
    rows.iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue()]
        })
        .collect()
}

struct Painter<'a> {
    pixmap: &'a mut Pixmap,
    fonts: &'a HashMap<String, FontEntry>,
    family: &'a str,
    /// Installed face per font key, `None` when the key fell back to Helvetica.
    faces: HashMap<String, Option<OwnedFace>>,
    /// Device pixels per point.
    k: f32,
    /// Page height in points; device y = (top - y) * k.
    top: f32,
}

fn paint_of(color: Rgb) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], 255);
    paint.anti_alias = true;
    paint
}

impl Painter<'_> {
    fn rect(&self, x: f32, y: f32, w: f32, h: f32) -> Option<Rect> {
        Rect::from_xywh(x * self.k, (self.top - y - h) * self.k, w * self.k, h * self.k)
    }

    fn page(&mut self, page: &Page) {
        for op in &page.ops {
            match op {
                DrawOp::Fill { x, y, w, h, color } => {
                    if let Some(rect) = self.rect(*x, *y, *w, *h) {
                        self.pixmap
                            .fill_rect(rect, &paint_of(*color), Transform::identity(), None);
                    }
                }
                DrawOp::Stroke {
                    x,
                    y,
                    w,
                    h,
                    color,
                    width,
                } => {
                    if let Some(rect) = self.rect(*x, *y, *w, *h) {
                        let path = PathBuilder::from_rect(rect);
                        let stroke = Stroke {
                            width: width * self.k,
                            ..Stroke::default()
                        };
                        self.pixmap.stroke_path(
                            &path,
                            &paint_of(*color),
                            &stroke,
                            Transform::identity(),
                            None,
                        );
                    }
                }
                DrawOp::Text {
                    x,
                    y,
                    size,
                    font,
                    color,
                    text,
                } => self.text(*x, *y, *size, font, *color, text),
                // Capture pages never carry images.
                DrawOp::Image { .. } => {}
            }
        }
    }

    /// Resolve the installed face behind `key` once per capture.
    fn load_face(&mut self, key: &str) {
        if self.faces.contains_key(key) {
            return;
        }
        let embedded = self.fonts.get(key).is_some_and(|e| e.char_to_gid.is_some());
        let (bold, italic) = match key.rsplit_once('/') {
            Some((_, "BI")) => (true, true),
            Some((_, "B")) => (true, false),
            Some((_, "I")) => (false, true),
            _ => (false, false),
        };
        let face = embedded
            .then(|| load_face_data(self.family, bold, italic))
            .flatten()
            .map(|(data, index)| OwnedFace { data, index });
        self.faces.insert(key.to_string(), face);
    }

    fn text(&mut self, x: f32, y: f32, size: f32, font: &str, color: Rgb, text: &str) {
        let Some(entry) = self.fonts.get(font) else {
            return;
        };
        let advances: Vec<(char, f32)> = text
            .chars()
            .map(|ch| (ch, entry.char_width_1000(ch) * size / 1000.0))
            .collect();
        self.load_face(font);

        let k = self.k;
        let baseline = (self.top - y) * k;
        let paint = paint_of(color);
        let face = self
            .faces
            .get(font)
            .and_then(Option::as_ref)
            .and_then(OwnedFace::face);

        let mut pen = x * k;
        for (ch, advance) in advances {
            match &face {
                Some(face) => {
                    if let Some(path) = glyphs::outline(face, ch) {
                        let s = size * k / face.units_per_em() as f32;
                        let ts = Transform::from_row(s, 0.0, 0.0, -s, pen, baseline);
                        self.pixmap
                            .fill_path(&path, &paint, FillRule::Winding, ts, None);
                    }
                }
                None => bitmap_glyph(&mut *self.pixmap, ch, pen, baseline, size * k, advance * k, &paint),
            }
            pen += advance * k;
        }
    }
}

/// Draw one built-in glyph into its advance cell, bottom row on the baseline.
fn bitmap_glyph(
    pixmap: &mut Pixmap,
    ch: char,
    x: f32,
    baseline: f32,
    size: f32,
    advance: f32,
    paint: &Paint,
) {
    let cell_h = size * 0.72 / bitmap_font::GLYPH_H as f32;
    let cell_w = (advance / bitmap_font::ADVANCE as f32).min(cell_h);
    let top = baseline - cell_h * bitmap_font::GLYPH_H as f32;
    let mut pb = PathBuilder::new();
    bitmap_font::for_each_pixel(ch, |col, row| {
        if let Some(r) = Rect::from_xywh(
            x + col as f32 * cell_w,
            top + row as f32 * cell_h,
            cell_w,
            cell_h,
        ) {
            pb.push_rect(r);
        }
    });
    if let Some(path) = pb.finish() {
        pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExportOptions, StyledDocument};
    use crate::theme::Theme;

    fn styled(html: &str, options: ExportOptions) -> StyledDocument {
        StyledDocument::prepare(html, None, &Theme::default(), options).unwrap()
    }

    #[test]
    fn capture_width_follows_scale() {
        let doc = styled("<h1>Invoice</h1><p>Bill to [Client Name]</p>", ExportOptions::default());
        let pixmap = rasterize(&doc).unwrap();
        assert_eq!(pixmap.width(), 794 * 2);
        assert!(pixmap.height() > 0);
    }

    #[test]
    fn height_grows_with_content() {
        let short = rasterize(&styled("<p>one</p>", ExportOptions::default())).unwrap();
        let body: String = (0..40).map(|i| format!("<p>line {i}</p>")).collect();
        let long = rasterize(&styled(&body, ExportOptions::default())).unwrap();
        assert!(long.height() > short.height());
    }

    #[test]
    fn draws_something_besides_background() {
        let doc = styled("<h1>Title</h1>", ExportOptions::default());
        let pixmap = rasterize(&doc).unwrap();
        let first = pixmap.pixels()[0];
        assert!(pixmap.pixels().iter().any(|p| *p != first));
    }

    #[test]
    fn oversized_captures_are_refused_before_allocation() {
        for (raster_width, raster_scale) in [(794, 400.0), (794, f32::INFINITY), (100_000, 1.0)] {
            let options = ExportOptions {
                raster_width,
                raster_scale,
                ..ExportOptions::default()
            };
            assert!(matches!(
                rasterize(&styled("<p>x</p>", options)),
                Err(Error::Raster(_))
            ));
        }
    }

    #[test]
    fn size_limits() {
        assert!(check_size(1588, 20_000).is_ok());
        assert!(check_size(MAX_SIDE_PX as u64 + 1, 10).is_err());
        assert!(check_size(10, MAX_SIDE_PX as u64 + 1).is_err());
        assert!(check_size(MAX_SIDE_PX as u64, MAX_SIDE_PX as u64).is_err());
        assert!(check_size(0, 10).is_err());
    }

    #[test]
    fn zero_width_is_an_error() {
        let options = ExportOptions {
            raster_width: 0,
            ..ExportOptions::default()
        };
        assert!(matches!(
            rasterize(&styled("<p>x</p>", options)),
            Err(Error::Raster(_))
        ));
    }
}
