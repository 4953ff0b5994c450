use tiny_skia::{Path, PathBuilder};
use ttf_parser::{Face, OutlineBuilder};

/// Collects a ttf-parser outline into a tiny-skia path, in font units.
struct PathSink(PathBuilder);

impl OutlineBuilder for PathSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// Outline of `ch` in font units (y up). `None` for blank or missing glyphs.
pub(super) fn outline(face: &Face, ch: char) -> Option<Path> {
    let gid = face.glyph_index(ch)?;
    let mut sink = PathSink(PathBuilder::new());
    face.outline_glyph(gid, &mut sink)?;
    sink.0.finish()
}

/// Font bytes owned for the duration of one rasterization.
pub(super) struct OwnedFace {
    pub(super) data: Vec<u8>,
    pub(super) index: u32,
}

impl OwnedFace {
    pub(super) fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.index).ok()
    }
}
