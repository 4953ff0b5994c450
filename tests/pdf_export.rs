mod common;

use htmldoc_export::pdf::{CanvasPdf, PlainPdf, TextPdf};
use htmldoc_export::{Blob, Chain, Error, ExportOptions, Format, StyledDocument, Strategy};

#[test]
fn invoice_renders_in_text_mode() {
    let out = htmldoc_export::export_blocking(&common::request(common::INVOICE, Format::Pdf))
        .expect("export");
    assert_eq!(out.strategy, "text-pdf");
    assert_eq!(out.blob.mime, "application/pdf");
    assert!(out.blob.bytes.starts_with(b"%PDF-"));
    assert_eq!(out.title, "Invoice [Invoice Number]");
    assert_eq!(out.blob.file_name(&out.title), "invoice-invoice-number.pdf");

    let streams = common::pdf_streams(&out.blob.bytes);
    assert!(streams.contains("(Page 1 of 1)"), "footer missing");
    let raw = String::from_utf8_lossy(&out.blob.bytes);
    assert!(raw.contains("https://example.com/terms"), "link annotation missing");
}

#[test]
fn filled_fields_change_the_title() {
    let mut request = common::request(common::INVOICE, Format::Pdf);
    request.fields = Some(common::fields());
    let out = htmldoc_export::export_blocking(&request).expect("export");
    assert_eq!(out.strategy, "text-pdf");
    assert_eq!(out.title, "Invoice INV-042");
}

#[test]
fn filled_fields_leave_nothing_highlighted() {
    let mut request = common::request(common::INVOICE, Format::Pdf);
    request.fields = Some(common::fields());
    let doc = StyledDocument::prepare(
        &request.content,
        request.fields.as_ref(),
        &request.theme,
        request.options,
    )
    .expect("prepare");
    assert!(doc.content.contains("Bill to <strong>Acme &amp; Sons</strong>"));
    assert!(!doc.content.contains("unresolved-placeholder"));
    let out = htmldoc_export::export_blocking(&request).expect("export");
    assert_eq!(out.strategy, "text-pdf");
}

#[test]
fn long_documents_paginate_with_footers() {
    let out = htmldoc_export::export_blocking(&common::request(
        &common::long_document(200),
        Format::Pdf,
    ))
    .expect("export");
    let pages = common::pdf_page_count(&out.blob.bytes);
    assert!(pages >= 3, "expected several pages, got {pages}");
    let streams = common::pdf_streams(&out.blob.bytes);
    for n in 1..=pages {
        assert!(
            streams.contains(&format!("(Page {n} of {pages})")),
            "page {n} footer missing"
        );
    }
}

#[test]
fn letter_pages_use_letter_media_box() {
    let mut request = common::request("<h1>Memo</h1><p>Short.</p>", Format::Pdf);
    request.options = ExportOptions {
        page_size: htmldoc_export::PageSize::Letter,
        ..ExportOptions::default()
    };
    let out = htmldoc_export::export_blocking(&request).expect("export");
    let raw = String::from_utf8_lossy(&out.blob.bytes);
    assert!(raw.contains("/MediaBox [0 0 612 792]"));
}

struct BrokenTextMode;

impl Strategy for BrokenTextMode {
    fn name(&self) -> &'static str {
        "broken-text-pdf"
    }

    fn render(&self, _: &StyledDocument) -> Result<Blob, Error> {
        Err(Error::Render("unexpected node shape".into()))
    }
}

#[test]
fn failed_text_mode_falls_back_to_canvas() {
    let chain = Chain::new("PDF").then(BrokenTextMode).then(CanvasPdf).then(PlainPdf);
    let out = htmldoc_export::export_with(&chain, &common::request(common::INVOICE, Format::Pdf))
        .expect("export");
    assert_eq!(out.strategy, "canvas-pdf");
    let raw = String::from_utf8_lossy(&out.blob.bytes);
    assert!(raw.contains("/Subtype /Image"));
    assert!(common::pdf_streams(&out.blob.bytes).contains("(Page 1 of 1)"));
}

#[test]
fn failed_capture_falls_back_to_plain_text() {
    let mut request = common::request(common::INVOICE, Format::Pdf);
    request.options.raster_width = 0;
    let chain = Chain::new("PDF").then(BrokenTextMode).then(CanvasPdf).then(PlainPdf);
    let out = htmldoc_export::export_with(&chain, &request).expect("export");
    assert_eq!(out.strategy, "plain-pdf");
    assert_eq!(out.blob.mime, "application/pdf");
    let streams = common::pdf_streams(&out.blob.bytes);
    assert!(streams.contains("Design work"));
}

#[test]
fn built_in_chain_starts_with_text_mode() {
    let chain = Chain::for_format(Format::Pdf);
    assert_eq!(chain.names(), [TextPdf.name(), CanvasPdf.name(), PlainPdf.name()]);
}
