use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use image::codecs::png::PngEncoder;

use crate::error::Error;
use crate::raster::{bitmap_font, rasterize};
use crate::strategy::Strategy;
use crate::theme::{Palette, Rgb};
use crate::{Blob, StyledDocument};

/// Size of the fallback canvas in pixels (A4 at 96 dpi).
pub const FALLBACK_SIZE: (u32, u32) = (794, 1123);
const FALLBACK_MARGIN: u32 = 40;
const TITLE_SCALE: u32 = 3;
const BODY_SCALE: u32 = 2;

fn encode(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(rgba, width, height, ExtendedColorType::Rgba8)
        .map_err(|e| Error::Raster(format!("PNG encoding failed: {e}")))?;
    Ok(out)
}

/// The captured document as one PNG at its natural height.
pub struct RasterPng;

impl Strategy for RasterPng {
    fn name(&self) -> &'static str {
        "raster-png"
    }

    fn render(&self, doc: &StyledDocument) -> Result<Blob, Error> {
        let mut pixmap = rasterize(doc)?;
        // The background is opaque, so this only touches stray translucent pixels.
        for px in pixmap.data_mut().chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a != 0 && a != 255 {
                for c in &mut px[..3] {
                    *c = ((*c as u16 * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
        Ok(Blob::png(encode(pixmap.width(), pixmap.height(), pixmap.data())?))
    }
}

/// Fallback PNG: title and plain text in the built-in font on a fixed
/// canvas. Text past the bottom edge is dropped.
pub struct TextCanvasPng;

fn rgba([r, g, b]: Rgb) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

impl Strategy for TextCanvasPng {
    fn name(&self) -> &'static str {
        "text-png"
    }

    fn render(&self, doc: &StyledDocument) -> Result<Blob, Error> {
        let (w, h) = FALLBACK_SIZE;
        let palette = Palette::of(&doc.theme);
        let mut img = RgbaImage::from_pixel(w, h, rgba(palette.background));
        let usable = w - 2 * FALLBACK_MARGIN;
        let mut y = FALLBACK_MARGIN;

        let title = doc.title();
        let title_chars = (usable / (bitmap_font::ADVANCE * TITLE_SCALE)) as usize;
        for line in bitmap_font::wrap(&title, title_chars) {
            bitmap_font::draw_text(&mut img, &line, FALLBACK_MARGIN, y, TITLE_SCALE, rgba(palette.primary));
            y += (bitmap_font::GLYPH_H + 4) * TITLE_SCALE;
        }
        y += 8;

        let body_chars = (usable / (bitmap_font::ADVANCE * BODY_SCALE)) as usize;
        let line_h = (bitmap_font::GLYPH_H + 4) * BODY_SCALE;
        let text = doc.document.plain_text.as_str();
        let text = text
            .strip_prefix(title.as_str())
            .map(str::trim_start)
            .unwrap_or(text);
        for line in bitmap_font::wrap(text, body_chars) {
            if y + line_h > h - FALLBACK_MARGIN {
                log::debug!("fallback canvas full, remaining text dropped");
                break;
            }
            bitmap_font::draw_text(&mut img, &line, FALLBACK_MARGIN, y, BODY_SCALE, rgba(palette.text));
            y += line_h;
        }
        Ok(Blob::png(encode(w, h, img.as_raw())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportOptions;
    use crate::theme::Theme;

    fn doc(html: &str) -> StyledDocument {
        StyledDocument::prepare(html, None, &Theme::default(), ExportOptions::default()).unwrap()
    }

    #[test]
    fn raster_png_decodes_at_capture_width() {
        let blob = RasterPng.render(&doc("<h1>Hi</h1><p>there</p>")).unwrap();
        assert_eq!(blob.mime, "image/png");
        let img = image::load_from_memory(&blob.bytes).unwrap();
        assert_eq!(img.width(), 794 * 2);
    }

    #[test]
    fn oversized_capture_is_an_error_not_an_abort() {
        let mut d = doc("<h1>Hi</h1>");
        d.options.raster_scale = 400.0;
        assert!(matches!(RasterPng.render(&d), Err(Error::Raster(_))));
    }

    #[test]
    fn fallback_canvas_has_fixed_size() {
        let long: String = (0..500).map(|i| format!("<p>line {i}</p>")).collect();
        let blob = TextCanvasPng.render(&doc(&long)).unwrap();
        let img = image::load_from_memory(&blob.bytes).unwrap();
        assert_eq!((img.width(), img.height()), FALLBACK_SIZE);
    }
}
