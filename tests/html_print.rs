mod common;

use std::cell::Cell;

use htmldoc_export::{Error, Format, PrintHost, WindowState};

#[test]
fn html_export_is_unthemed_and_standalone() {
    let out = htmldoc_export::export_blocking(&common::request(common::INVOICE, Format::Html))
        .expect("export");
    assert_eq!(out.strategy, "standalone-html");
    assert_eq!(out.blob.mime, "text/html");
    let page = String::from_utf8(out.blob.bytes).expect("utf-8");
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("<title>Invoice [Invoice Number]</title>"));
    assert!(page.contains(r#"class="unresolved-placeholder""#));
    assert!(!page.contains("```"));
    // Theme colours are applied at render time only.
    assert!(!page.contains("#aa0000"));
}

#[test]
fn placeholders_are_listed_in_order() {
    assert_eq!(
        htmldoc_export::placeholders(common::INVOICE),
        ["Invoice Number", "Client Name", "Due Date", "Rate", "Contact Email"]
    );
}

struct PopupBlocker {
    attempts: Cell<usize>,
}

impl PrintHost for PopupBlocker {
    fn open(&self, _page: &str) -> Result<WindowState, Error> {
        self.attempts.set(self.attempts.get() + 1);
        Ok(WindowState::Blocked)
    }
}

#[test]
fn blocked_print_window_is_reported() {
    let host = PopupBlocker {
        attempts: Cell::new(0),
    };
    let request = common::request(common::INVOICE, Format::Html);
    let err = htmldoc_export::print(&request, &host).unwrap_err();
    assert!(matches!(err, Error::PrintBlocked));
    assert!(err.to_string().contains("allow pop-ups"));
    assert_eq!(host.attempts.get(), 1);
}

#[test]
fn blank_content_is_rejected_before_printing() {
    let host = PopupBlocker {
        attempts: Cell::new(0),
    };
    let request = common::request("  ", Format::Html);
    assert!(matches!(
        htmldoc_export::print(&request, &host),
        Err(Error::MissingContent)
    ));
    assert_eq!(host.attempts.get(), 0);
}
