//! Standalone HTML and print pages.
//!
//! Both use the normalized content as-is, without the theme: the page
//! carries its own fixed stylesheet.

use crate::error::Error;
use crate::normalize::{PLACEHOLDER_CLASS, escape_html};
use crate::strategy::Strategy;
use crate::theme::{PLACEHOLDER_HIGHLIGHT, to_hex};
use crate::{Blob, StyledDocument};

/// Delay between the print page's `load` event and `window.print()`.
pub const PRINT_DELAY_MS: u32 = 250;

fn stylesheet() -> String {
    format!(
        "body{{font-family:Arial,Helvetica,sans-serif;color:#1f2937;max-width:800px;margin:40px auto;padding:0 24px;line-height:1.5}}\
h1,h2,h3,h4,h5,h6{{color:#1e3a8a;margin:1.2em 0 .5em}}\
h1{{font-size:2em}}h2{{font-size:1.5em}}h3{{font-size:1.25em}}\
table{{border-collapse:collapse;width:100%;margin:1em 0}}\
th,td{{border:1px solid #d1d5db;padding:6px 10px;text-align:left}}\
th{{background:#1e3a8a;color:#ffffff}}\
.{PLACEHOLDER_CLASS}{{background:#{};padding:0 2px;border-radius:2px}}\
@media print{{body{{margin:0;max-width:none}}}}",
        to_hex(PLACEHOLDER_HIGHLIGHT)
    )
}

fn page(content: &str, title: &str, script: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n{script}</head>\n<body>\n{content}\n</body>\n</html>\n",
        escape_html(title),
        stylesheet()
    )
}

/// Wrap already-normalized `content` in a complete HTML document.
pub fn standalone(content: &str, title: &str) -> String {
    page(content, title, "")
}

/// Like [`standalone`], but the page opens the print dialog once loaded.
pub fn printable(content: &str, title: &str) -> String {
    let script = format!(
        "<script>window.addEventListener('load',function(){{setTimeout(function(){{window.print();}},{PRINT_DELAY_MS});}});</script>\n"
    );
    page(content, title, &script)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowState {
    Opened,
    /// The host refused to open a window (a pop-up blocker, a missing opener).
    Blocked,
}

/// Something that can show a page and let the user print it.
pub trait PrintHost {
    fn open(&self, page: &str) -> Result<WindowState, Error>;
}

/// Hand a print page to `host`. A blocked window is reported as
/// [`Error::PrintBlocked`] so the caller can ask the user to allow pop-ups.
pub fn print(content: &str, title: &str, host: &dyn PrintHost) -> Result<(), Error> {
    match host.open(&printable(content, title))? {
        WindowState::Opened => {
            log::info!("Print page opened for \"{title}\"");
            Ok(())
        }
        WindowState::Blocked => {
            log::warn!("Print window blocked");
            Err(Error::PrintBlocked)
        }
    }
}

/// The normalized content as a standalone page.
pub struct StandaloneHtml;

impl Strategy for StandaloneHtml {
    fn name(&self) -> &'static str {
        "standalone-html"
    }

    fn render(&self, doc: &StyledDocument) -> Result<Blob, Error> {
        Ok(Blob::html(standalone(&doc.content, &doc.title())))
    }
}
