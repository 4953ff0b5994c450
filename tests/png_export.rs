mod common;

use htmldoc_export::{ExportOptions, Format};

#[test]
fn png_is_captured_at_natural_height() {
    let short = htmldoc_export::export_blocking(&common::request(common::INVOICE, Format::Png))
        .expect("export");
    assert_eq!(short.strategy, "raster-png");
    assert_eq!(short.blob.mime, "image/png");
    let short_img = image::load_from_memory(&short.blob.bytes).expect("decodable PNG");
    assert_eq!(short_img.width(), 794 * 2);

    let long = htmldoc_export::export_blocking(&common::request(
        &common::long_document(60),
        Format::Png,
    ))
    .expect("export");
    let long_img = image::load_from_memory(&long.blob.bytes).expect("decodable PNG");
    assert!(long_img.height() > short_img.height());
}

#[test]
fn scale_changes_pixel_size() {
    let mut request = common::request("<h1>Scaled</h1>", Format::Png);
    request.options = ExportOptions {
        raster_scale: 1.0,
        ..ExportOptions::default()
    };
    let out = htmldoc_export::export_blocking(&request).expect("export");
    let img = image::load_from_memory(&out.blob.bytes).expect("decodable PNG");
    assert_eq!(img.width(), 794);
}

#[test]
fn capture_failure_falls_back_to_fixed_canvas() {
    let mut request = common::request(common::INVOICE, Format::Png);
    request.options.raster_scale = f32::NAN;
    let out = htmldoc_export::export_blocking(&request).expect("export");
    assert_eq!(out.strategy, "text-png");
    let img = image::load_from_memory(&out.blob.bytes)
        .expect("decodable PNG")
        .to_rgba8();
    assert_eq!(img.dimensions(), (794, 1123));
    let background = *img.get_pixel(0, 0);
    assert!(img.pixels().any(|p| *p != background), "canvas is blank");
}

#[test]
fn oversized_scale_falls_back_to_fixed_canvas() {
    let mut request = common::request("<h1>Huge</h1><p>Short body.</p>", Format::Png);
    request.options.raster_scale = 400.0;
    let out = htmldoc_export::export_blocking(&request).expect("export");
    assert_eq!(out.strategy, "text-png");
    let img = image::load_from_memory(&out.blob.bytes).expect("decodable PNG");
    assert_eq!((img.width(), img.height()), (794, 1123));
}
