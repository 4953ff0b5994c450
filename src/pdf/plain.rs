use crate::error::Error;
use crate::model::Span;
use crate::strategy::Strategy;
use crate::theme::{BLACK, Palette};
use crate::{Blob, StyledDocument};

use super::text::{BODY_SIZE, Flow};
use super::{HELVETICA, Writer, stamp_footers};

/// Last-resort PDF: the title and plain text in Helvetica. Never fails.
pub struct PlainPdf;

impl Strategy for PlainPdf {
    fn name(&self) -> &'static str {
        "plain-pdf"
    }

    fn render(&self, doc: &StyledDocument) -> Result<Blob, Error> {
        let geometry = doc.options.page_size.geometry();
        let mut writer = Writer::new();
        writer.helvetica(false, false);
        writer.helvetica(true, false);

        let mut flow = Flow::new(
            writer.fonts(),
            geometry,
            HELVETICA,
            Palette::of(&doc.theme),
            Some(BLACK),
        );
        let title = doc.title();
        let spans = [Span {
            text: title.clone(),
            bold: true,
            ..Span::default()
        }];
        let style = flow.style(18.0, BLACK, true);
        flow.text_block(&spans, style, geometry.margin, geometry.content_width());
        flow.gap(BODY_SIZE);

        let body = doc.document.plain_text.as_str();
        // The title is usually the first line of the text already.
        let body = body
            .strip_prefix(title.as_str())
            .map(str::trim_start)
            .unwrap_or(body);
        flow.plain(body);

        let mut pages = flow.finish();
        stamp_footers(&mut pages, &mut writer, geometry);
        Ok(Blob::pdf(writer.finish(&pages, geometry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportOptions;
    use crate::theme::Theme;

    #[test]
    fn writes_title_and_text_in_helvetica() {
        let doc = StyledDocument::prepare(
            "<h1>Report</h1><p>Body text</p>",
            None,
            &Theme::default(),
            ExportOptions::default(),
        )
        .unwrap();
        let blob = PlainPdf.render(&doc).unwrap();
        let text = String::from_utf8_lossy(&blob.bytes);
        assert!(text.starts_with("%PDF-"));
        assert!(text.contains("/Helvetica-Bold"));
        assert!(!text.contains("FontFile2"));
    }
}
