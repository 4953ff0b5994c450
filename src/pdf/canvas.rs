use crate::error::Error;
use crate::raster::{rasterize, rgb_rows};
use crate::strategy::Strategy;
use crate::{Blob, StyledDocument};

use super::{DrawOp, Page, Writer, stamp_footers};

/// First PDF fallback: the captured bitmap sliced into page-height bands.
pub struct CanvasPdf;

impl Strategy for CanvasPdf {
    fn name(&self) -> &'static str {
        "canvas-pdf"
    }

    fn render(&self, doc: &StyledDocument) -> Result<Blob, Error> {
        let t0 = std::time::Instant::now();
        let geometry = doc.options.page_size.geometry();
        let pixmap = rasterize(doc)?;

        // Bands fill the page width and everything above the footer strip.
        let px_per_pt = pixmap.width() as f32 / geometry.width;
        let band_px = ((geometry.height - geometry.margin) * px_per_pt).floor() as u32;
        if band_px == 0 {
            return Err(Error::Raster("page too short for a band".into()));
        }

        let mut writer = Writer::new();
        let mut pages = Vec::new();
        let mut y0 = 0u32;
        while y0 < pixmap.height() {
            let y1 = (y0 + band_px).min(pixmap.height());
            let rgb = rgb_rows(&pixmap, y0, y1);
            let name = writer.rgb_image(&rgb, pixmap.width(), y1 - y0);
            let h = (y1 - y0) as f32 / px_per_pt;
            let mut page = Page::default();
            page.ops.push(DrawOp::Image {
                name,
                x: 0.0,
                y: geometry.height - h,
                w: geometry.width,
                h,
            });
            pages.push(page);
            y0 = y1;
        }
        stamp_footers(&mut pages, &mut writer, geometry);

        log::info!(
            "Canvas PDF: {} bands from {}x{} in {:.1}ms",
            pages.len(),
            pixmap.width(),
            pixmap.height(),
            t0.elapsed().as_secs_f64() * 1000.0
        );
        Ok(Blob::pdf(writer.finish(&pages, geometry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportOptions;
    use crate::theme::Theme;

    #[test]
    fn long_capture_spans_several_pages() {
        let body: String = (0..150).map(|i| format!("<p>Row {i}</p>")).collect();
        let doc = StyledDocument::prepare(&body, None, &Theme::default(), ExportOptions::default())
            .unwrap();
        let blob = CanvasPdf.render(&doc).unwrap();
        assert_eq!(blob.mime, "application/pdf");
        let text = String::from_utf8_lossy(&blob.bytes);
        assert!(text.contains("/Im2"));
    }

    #[test]
    fn capture_failure_propagates() {
        let options = ExportOptions {
            raster_scale: 0.0,
            ..ExportOptions::default()
        };
        let doc = StyledDocument::prepare("<p>x</p>", None, &Theme::default(), options).unwrap();
        assert!(matches!(CanvasPdf.render(&doc), Err(Error::Raster(_))));
    }
}
