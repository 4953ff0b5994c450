//! Ordered fallback chains.
//!
//! Each export format is a list of named strategies tried in order; the
//! first one that returns a blob wins. A failing (or panicking) strategy is
//! logged and skipped. The last strategy of the PDF, PNG and DOCX chains
//! does not fail, so those chains always produce something.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use crate::docx::{PlainTextDocx, StructuredDocx};
use crate::error::Error;
use crate::html_export::StandaloneHtml;
use crate::pdf::{CanvasPdf, PlainPdf, TextPdf};
use crate::png::{RasterPng, TextCanvasPng};
use crate::{Blob, Exported, Format, StyledDocument};

/// One way of turning a styled document into a blob.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn render(&self, doc: &StyledDocument) -> Result<Blob, Error>;
}

pub struct Chain {
    label: &'static str,
    strategies: Vec<Box<dyn Strategy>>,
}

impl Chain {
    pub fn new(label: &'static str) -> Chain {
        Chain {
            label,
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, strategy: impl Strategy + 'static) -> Chain {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// The built-in chain for `format`.
    pub fn for_format(format: Format) -> Chain {
        match format {
            Format::Pdf => Chain::new("PDF").then(TextPdf).then(CanvasPdf).then(PlainPdf),
            Format::Png => Chain::new("PNG").then(RasterPng).then(TextCanvasPng),
            Format::Docx => Chain::new("DOCX").then(StructuredDocx).then(PlainTextDocx),
            Format::Html => Chain::new("HTML").then(StandaloneHtml),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, doc: &StyledDocument) -> Result<Exported, Error> {
        for strategy in &self.strategies {
            let t0 = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| strategy.render(doc)));
            match outcome {
                Ok(Ok(blob)) => {
                    log::info!(
                        "{} export: {} succeeded ({} bytes, {}) in {:.1}ms",
                        self.label,
                        strategy.name(),
                        blob.bytes.len(),
                        blob.mime,
                        t0.elapsed().as_secs_f64() * 1000.0
                    );
                    return Ok(Exported {
                        blob,
                        strategy: strategy.name(),
                        title: doc.title(),
                    });
                }
                Ok(Err(e)) => {
                    log::warn!("{} export: {} failed: {e}", self.label, strategy.name());
                }
                Err(_) => {
                    log::warn!("{} export: {} panicked", self.label, strategy.name());
                }
            }
        }
        Err(Error::Exhausted(self.label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportOptions;
    use crate::theme::Theme;

    struct Failing;

    impl Strategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn render(&self, _: &StyledDocument) -> Result<Blob, Error> {
            Err(Error::Render("unexpected node".into()))
        }
    }

    struct Panicking;

    impl Strategy for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn render(&self, _: &StyledDocument) -> Result<Blob, Error> {
            panic!("boom")
        }
    }

    fn doc() -> StyledDocument {
        StyledDocument::prepare("<h1>T</h1><p>x</p>", None, &Theme::default(), ExportOptions::default())
            .unwrap()
    }

    #[test]
    fn built_in_orders() {
        assert_eq!(
            Chain::for_format(Format::Pdf).names(),
            ["text-pdf", "canvas-pdf", "plain-pdf"]
        );
        assert_eq!(Chain::for_format(Format::Png).names(), ["raster-png", "text-png"]);
        assert_eq!(
            Chain::for_format(Format::Docx).names(),
            ["structured-docx", "plain-text"]
        );
    }

    #[test]
    fn falls_through_to_next_strategy() {
        let chain = Chain::new("PDF").then(Failing).then(Panicking).then(PlainPdf);
        let out = chain.run(&doc()).unwrap();
        assert_eq!(out.strategy, "plain-pdf");
        assert_eq!(out.blob.mime, "application/pdf");
    }

    #[test]
    fn exhausted_chain_is_an_error() {
        let chain = Chain::new("PNG").then(Failing);
        assert!(matches!(chain.run(&doc()), Err(Error::Exhausted("PNG"))));
    }
}
