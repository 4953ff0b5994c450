pub mod docx;
mod error;
pub mod fonts;
pub mod html;
pub mod html_export;
pub mod model;
pub mod normalize;
pub mod pdf;
pub mod png;
mod raster;
pub mod strategy;
pub mod theme;

pub use error::Error;
pub use html_export::{PrintHost, WindowState};
pub use normalize::placeholders;
pub use strategy::{Chain, Strategy};
pub use theme::Theme;

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    pub(crate) fn geometry(self) -> pdf::Geometry {
        let (width, height) = match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
        };
        pdf::Geometry {
            width,
            height,
            // 2 cm
            margin: 56.69,
        }
    }
}

fn default_raster_width() -> u32 {
    794
}

fn default_raster_scale() -> f32 {
    2.0
}

/// Layout knobs shared by every format.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    #[serde(default)]
    pub page_size: PageSize,
    /// Capture width in CSS pixels.
    #[serde(default = "default_raster_width")]
    pub raster_width: u32,
    /// Device pixels per CSS pixel, 0.1 to 8. Captures are also capped at
    /// 32 767 px per side; anything larger makes the bitmap step fail over.
    #[serde(default = "default_raster_scale")]
    pub raster_scale: f32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            page_size: PageSize::default(),
            raster_width: default_raster_width(),
            raster_scale: default_raster_scale(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Format {
    #[default]
    Pdf,
    Png,
    Docx,
    Html,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub content: String,
    #[serde(default)]
    pub fields: Option<HashMap<String, String>>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub options: ExportOptions,
}

/// Output bytes. `mime` says what was actually produced, which can differ
/// from the requested format when a fallback ran.
#[derive(Clone, Debug)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub extension: &'static str,
}

impl Blob {
    pub fn pdf(bytes: Vec<u8>) -> Blob {
        Blob {
            bytes,
            mime: "application/pdf",
            extension: "pdf",
        }
    }

    pub fn png(bytes: Vec<u8>) -> Blob {
        Blob {
            bytes,
            mime: "image/png",
            extension: "png",
        }
    }

    pub fn docx(bytes: Vec<u8>) -> Blob {
        Blob {
            bytes,
            mime: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            extension: "docx",
        }
    }

    pub fn text(text: String) -> Blob {
        Blob {
            bytes: text.into_bytes(),
            mime: "text/plain",
            extension: "txt",
        }
    }

    pub fn html(page: String) -> Blob {
        Blob {
            bytes: page.into_bytes(),
            mime: "text/html",
            extension: "html",
        }
    }

    /// `title` slugged to `[a-z0-9-]`, with this blob's extension.
    pub fn file_name(&self, title: &str) -> String {
        let mut slug = String::new();
        for ch in title.chars().flat_map(char::to_lowercase) {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch);
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-');
        let slug: String = slug.chars().take(80).collect();
        let slug = slug.trim_end_matches('-');
        if slug.is_empty() {
            format!("document.{}", self.extension)
        } else {
            format!("{slug}.{}", self.extension)
        }
    }
}

#[derive(Clone, Debug)]
pub struct Exported {
    pub blob: Blob,
    /// Name of the strategy that produced `blob`.
    pub strategy: &'static str,
    /// Document title, for [`Blob::file_name`].
    pub title: String,
}

/// Normalized content, its themed IR and the settings for one export.
/// Every export owns its own copy; nothing is shared between calls.
#[derive(Clone, Debug)]
pub struct StyledDocument {
    /// Normalized, unthemed HTML.
    pub content: String,
    pub document: model::Document,
    pub theme: Theme,
    pub options: ExportOptions,
}

impl StyledDocument {
    pub fn prepare(
        content: &str,
        fields: Option<&HashMap<String, String>>,
        theme: &Theme,
        options: ExportOptions,
    ) -> Result<StyledDocument, Error> {
        let content = normalize::normalize(content, fields);
        if content.trim().is_empty() {
            return Err(Error::MissingContent);
        }
        let root = html::parse(&content)?;
        let themed = html::theming::apply(&root, theme);
        let document = model::build(&themed);
        log::debug!(
            "Prepared {} blocks ({} chars of text)",
            document.blocks.len(),
            document.plain_text.len()
        );
        Ok(StyledDocument {
            content,
            document,
            theme: theme.clone(),
            options,
        })
    }

    /// Text of the first heading, or "Document".
    pub fn title(&self) -> String {
        self.document
            .title_text()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Document".to_string())
    }
}

/// Run `chain` over the request's content.
pub fn export_with(chain: &Chain, request: &ExportRequest) -> Result<Exported, Error> {
    let t0 = Instant::now();
    let doc = StyledDocument::prepare(
        &request.content,
        request.fields.as_ref(),
        &request.theme,
        request.options,
    )?;
    let t_prepare = t0.elapsed();
    let out = chain.run(&doc)?;
    log::info!(
        "Timing: prepare={:.1}ms, render={:.1}ms (format {:?}, strategy {})",
        t_prepare.as_secs_f64() * 1000.0,
        (t0.elapsed() - t_prepare).as_secs_f64() * 1000.0,
        request.format,
        out.strategy,
    );
    Ok(out)
}

/// Export synchronously with the built-in chain for `request.format`.
pub fn export_blocking(request: &ExportRequest) -> Result<Exported, Error> {
    export_with(&Chain::for_format(request.format), request)
}

/// Export on the tokio blocking pool once the font index is ready.
pub async fn export(request: ExportRequest) -> Result<Exported, Error> {
    fonts::ready().await;
    tokio::task::spawn_blocking(move || export_blocking(&request))
        .await
        .map_err(|e| Error::Render(format!("export task failed: {e}")))?
}

/// Open the request's content as a print page on `host`.
pub fn print(request: &ExportRequest, host: &dyn PrintHost) -> Result<(), Error> {
    let doc = StyledDocument::prepare(
        &request.content,
        request.fields.as_ref(),
        &request.theme,
        request.options,
    )?;
    html_export::print(&doc.content, &doc.title(), host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_slugged() {
        let blob = Blob::pdf(Vec::new());
        assert_eq!(blob.file_name("Q3 Report: Sales & Growth!"), "q3-report-sales-growth.pdf");
        assert_eq!(blob.file_name("  ??  "), "document.pdf");
        assert_eq!(Blob::text(String::new()).file_name("Notes"), "notes.txt");
    }

    #[test]
    fn blank_content_is_missing() {
        for content in ["", "   \n", "```html\n```"] {
            let request = ExportRequest {
                content: content.into(),
                ..ExportRequest::default()
            };
            assert!(matches!(export_blocking(&request), Err(Error::MissingContent)));
        }
    }

    #[test]
    fn options_fill_defaults_from_json() {
        let opts: ExportOptions = serde_json::from_str(r#"{"pageSize":"Letter"}"#).unwrap();
        assert_eq!(opts.page_size, PageSize::Letter);
        assert_eq!(opts.raster_width, 794);
        assert_eq!(opts.raster_scale, 2.0);
    }

    #[test]
    fn title_defaults_when_no_heading() {
        let doc = StyledDocument::prepare("<p>x</p>", None, &Theme::default(), ExportOptions::default())
            .unwrap();
        assert_eq!(doc.title(), "Document");
    }
}
