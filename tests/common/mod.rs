#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read};

use htmldoc_export::{ExportOptions, ExportRequest, Format, Theme};

pub const INVOICE: &str = r#"```html
<h1>Invoice [Invoice Number]</h1>
<p>Bill to <strong>[Client Name]</strong>, due [Due Date].</p>
<h2>Items</h2>
<table>
  <thead><tr><th>Item</th><th>Qty</th><th>Price</th></tr></thead>
  <tbody>
    <tr><td>Design work</td><td>10</td><td>[Rate]</td></tr>
    <tr><td>Hosting</td><td>1</td><td>$20</td></tr>
  </tbody>
</table>
<ul><li>Payable within 30 days</li><li>Contact [Contact Email]</li></ul>
<div data-role="callout"><p>Thank you for your business.</p></div>
<p>See <a href="https://example.com/terms">our terms</a>.</p>
```"#;

pub fn fields() -> HashMap<String, String> {
    [
        ("Invoice Number", "INV-042"),
        ("Client Name", "Acme & Sons"),
        ("Due Date", "1 May"),
        ("Rate", "$90"),
        ("Contact Email", "billing@example.com"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// A theme whose colours are easy to spot in output.
pub fn theme() -> Theme {
    Theme {
        primary: "#aa0000".into(),
        secondary: "#112233".into(),
        accent: "#00aa00".into(),
        background: "#ffffff".into(),
        text: "#222222".into(),
        font_family: "Arial, sans-serif".into(),
    }
}

pub fn request(content: &str, format: Format) -> ExportRequest {
    let _ = env_logger::try_init();
    ExportRequest {
        content: content.to_string(),
        fields: None,
        theme: theme(),
        format,
        options: ExportOptions::default(),
    }
}

pub fn long_document(paragraphs: usize) -> String {
    let mut html = String::from("<h1>Long report</h1>");
    for i in 0..paragraphs {
        html.push_str(&format!(
            "<p>Paragraph {i}: the quick brown fox jumps over the lazy dog again and again.</p>"
        ));
    }
    html
}

/// Page objects in a PDF (the page tree node itself excluded).
pub fn pdf_page_count(pdf: &[u8]) -> usize {
    let text = String::from_utf8_lossy(pdf);
    text.matches("/Type /Page").count() - text.matches("/Type /Pages").count()
}

/// Every stream of `pdf`, inflated where possible, joined as lossy text.
pub fn pdf_streams(pdf: &[u8]) -> String {
    let mut out = String::new();
    let mut rest = pdf;
    while let Some(start) = find(rest, b"stream") {
        let mut body = &rest[start + b"stream".len()..];
        if body.starts_with(b"\r\n") {
            body = &body[2..];
        } else if body.starts_with(b"\n") {
            body = &body[1..];
        }
        let Some(end) = find(body, b"endstream") else {
            break;
        };
        let data = &body[..end];
        match miniz_oxide::inflate::decompress_to_vec_zlib(data) {
            Ok(inflated) => out.push_str(&String::from_utf8_lossy(&inflated)),
            Err(_) => out.push_str(&String::from_utf8_lossy(data)),
        }
        out.push('\n');
        rest = &body[end + b"endstream".len()..];
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub fn zip_part(bytes: &[u8], name: &str) -> String {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
    let mut out = String::new();
    zip.by_name(name)
        .unwrap_or_else(|_| panic!("missing part {name}"))
        .read_to_string(&mut out)
        .expect("utf-8 part");
    out
}
