mod common;

use htmldoc_export::{Error, Format};

#[tokio::test]
async fn async_export_matches_blocking_strategy() {
    for format in [Format::Pdf, Format::Png, Format::Docx, Format::Html] {
        let request = common::request(common::INVOICE, format);
        let blocking = htmldoc_export::export_blocking(&request).expect("blocking export");
        let out = htmldoc_export::export(request).await.expect("async export");
        assert_eq!(out.strategy, blocking.strategy);
        assert_eq!(out.blob.mime, blocking.blob.mime);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_exports_are_independent() {
    let a = tokio::spawn(htmldoc_export::export(common::request(
        "<h1>First</h1>",
        Format::Pdf,
    )));
    let b = tokio::spawn(htmldoc_export::export(common::request(
        "<h1>Second</h1>",
        Format::Pdf,
    )));
    let (a, b) = (a.await.expect("join"), b.await.expect("join"));
    assert_eq!(a.expect("first").title, "First");
    assert_eq!(b.expect("second").title, "Second");
}

#[tokio::test]
async fn missing_content_propagates() {
    let err = htmldoc_export::export(common::request("", Format::Docx))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingContent));
}
