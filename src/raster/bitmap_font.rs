//! Built-in 5x7 bitmap font for printable ASCII.
//!
//! Used whenever no outline font is installed, so raster output never
//! depends on the host's font directories.

use image::{Rgba, RgbaImage};

pub(crate) const GLYPH_W: u32 = 5;
pub(crate) const GLYPH_H: u32 = 7;
/// Horizontal advance in font pixels, including one column of spacing.
pub(crate) const ADVANCE: u32 = GLYPH_W + 1;

const BULLET: [u8; 7] = [0x00, 0x00, 0x0e, 0x0e, 0x0e, 0x00, 0x00];

// Rows top to bottom; bit 4 is the leftmost column.
const GLYPHS: [[u8; 7]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // space
    [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04], // !
    [0x0a, 0x0a, 0x0a, 0x00, 0x00, 0x00, 0x00], // "
    [0x0a, 0x0a, 0x1f, 0x0a, 0x1f, 0x0a, 0x0a], // #
    [0x04, 0x0f, 0x14, 0x0e, 0x05, 0x1e, 0x04], // $
    [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03], // %
    [0x0c, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0d], // &
    [0x04, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00], // '
    [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02], // (
    [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08], // )
    [0x00, 0x04, 0x15, 0x0e, 0x15, 0x04, 0x00], // *
    [0x00, 0x04, 0x04, 0x1f, 0x04, 0x04, 0x00], // +
    [0x00, 0x00, 0x00, 0x00, 0x0c, 0x04, 0x08], // ,
    [0x00, 0x00, 0x00, 0x1f, 0x00, 0x00, 0x00], // -
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x0c], // .
    [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00], // /
    [0x0e, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0e], // 0
    [0x04, 0x0c, 0x04, 0x04, 0x04, 0x04, 0x0e], // 1
    [0x0e, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1f], // 2
    [0x1f, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0e], // 3
    [0x02, 0x06, 0x0a, 0x12, 0x1f, 0x02, 0x02], // 4
    [0x1f, 0x10, 0x1e, 0x01, 0x01, 0x11, 0x0e], // 5
    [0x06, 0x08, 0x10, 0x1e, 0x11, 0x11, 0x0e], // 6
    [0x1f, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08], // 7
    [0x0e, 0x11, 0x11, 0x0e, 0x11, 0x11, 0x0e], // 8
    [0x0e, 0x11, 0x11, 0x0f, 0x01, 0x02, 0x0c], // 9
    [0x00, 0x0c, 0x0c, 0x00, 0x0c, 0x0c, 0x00], // :
    [0x00, 0x0c, 0x0c, 0x00, 0x0c, 0x04, 0x08], // ;
    [0x02, 0x04, 0x08, 0x10, 0x08, 0x04, 0x02], // <
    [0x00, 0x00, 0x1f, 0x00, 0x1f, 0x00, 0x00], // =
    [0x08, 0x04, 0x02, 0x01, 0x02, 0x04, 0x08], // >
    [0x0e, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04], // ?
    [0x0e, 0x11, 0x01, 0x0d, 0x15, 0x15, 0x0e], // @
    [0x0e, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11], // A
    [0x1e, 0x11, 0x11, 0x1e, 0x11, 0x11, 0x1e], // B
    [0x0e, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0e], // C
    [0x1c, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1c], // D
    [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f], // E
    [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x10], // F
    [0x0e, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0f], // G
    [0x11, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11], // H
    [0x0e, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0e], // I
    [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0c], // J
    [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11], // K
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1f], // L
    [0x11, 0x1b, 0x15, 0x15, 0x11, 0x11, 0x11], // M
    [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11], // N
    [0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e], // O
    [0x1e, 0x11, 0x11, 0x1e, 0x10, 0x10, 0x10], // P
    [0x0e, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0d], // Q
    [0x1e, 0x11, 0x11, 0x1e, 0x14, 0x12, 0x11], // R
    [0x0f, 0x10, 0x10, 0x0e, 0x01, 0x01, 0x1e], // S
    [0x1f, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04], // T
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e], // U
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x0a, 0x04], // V
    [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0a], // W
    [0x11, 0x11, 0x0a, 0x04, 0x0a, 0x11, 0x11], // X
    [0x11, 0x11, 0x11, 0x0a, 0x04, 0x04, 0x04], // Y
    [0x1f, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1f], // Z
    [0x0e, 0x08, 0x08, 0x08, 0x08, 0x08, 0x0e], // [
    [0x00, 0x10, 0x08, 0x04, 0x02, 0x01, 0x00], // \
    [0x0e, 0x02, 0x02, 0x02, 0x02, 0x02, 0x0e], // ]
    [0x04, 0x0a, 0x11, 0x00, 0x00, 0x00, 0x00], // ^
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1f], // _
    [0x08, 0x04, 0x02, 0x00, 0x00, 0x00, 0x00], // `
    [0x00, 0x00, 0x0e, 0x01, 0x0f, 0x11, 0x0f], // a
    [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x1e], // b
    [0x00, 0x00, 0x0e, 0x10, 0x10, 0x11, 0x0e], // c
    [0x01, 0x01, 0x0d, 0x13, 0x11, 0x11, 0x0f], // d
    [0x00, 0x00, 0x0e, 0x11, 0x1f, 0x10, 0x0e], // e
    [0x06, 0x09, 0x08, 0x1c, 0x08, 0x08, 0x08], // f
    [0x00, 0x0f, 0x11, 0x11, 0x0f, 0x01, 0x0e], // g
    [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x11], // h
    [0x04, 0x00, 0x0c, 0x04, 0x04, 0x04, 0x0e], // i
    [0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0c], // j
    [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12], // k
    [0x0c, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0e], // l
    [0x00, 0x00, 0x1a, 0x15, 0x15, 0x11, 0x11], // m
    [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11], // n
    [0x00, 0x00, 0x0e, 0x11, 0x11, 0x11, 0x0e], // o
    [0x00, 0x00, 0x1e, 0x11, 0x1e, 0x10, 0x10], // p
    [0x00, 0x00, 0x0d, 0x13, 0x0f, 0x01, 0x01], // q
    [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10], // r
    [0x00, 0x00, 0x0e, 0x10, 0x0e, 0x01, 0x1e], // s
    [0x08, 0x08, 0x1c, 0x08, 0x08, 0x09, 0x06], // t
    [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0d], // u
    [0x00, 0x00, 0x11, 0x11, 0x11, 0x0a, 0x04], // v
    [0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0a], // w
    [0x00, 0x00, 0x11, 0x0a, 0x04, 0x0a, 0x11], // x
    [0x00, 0x00, 0x11, 0x11, 0x0f, 0x01, 0x0e], // y
    [0x00, 0x00, 0x1f, 0x02, 0x04, 0x08, 0x1f], // z
    [0x02, 0x04, 0x04, 0x08, 0x04, 0x04, 0x02], // {
    [0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04], // |
    [0x08, 0x04, 0x04, 0x02, 0x04, 0x04, 0x08], // }
    [0x00, 0x00, 0x08, 0x15, 0x02, 0x00, 0x00], // ~
];

/// Fold typographic characters onto the ASCII repertoire.
fn fold(ch: char) -> char {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
        '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
        '\u{00A0}' | '\t' => ' ',
        '\u{00C0}'..='\u{00C5}' => 'A',
        '\u{00C7}' => 'C',
        '\u{00C8}'..='\u{00CB}' => 'E',
        '\u{00CC}'..='\u{00CF}' => 'I',
        '\u{00D1}' => 'N',
        '\u{00D2}'..='\u{00D6}' | '\u{00D8}' => 'O',
        '\u{00D9}'..='\u{00DC}' => 'U',
        '\u{00E0}'..='\u{00E5}' => 'a',
        '\u{00E7}' => 'c',
        '\u{00E8}'..='\u{00EB}' => 'e',
        '\u{00EC}'..='\u{00EF}' => 'i',
        '\u{00F1}' => 'n',
        '\u{00F2}'..='\u{00F6}' | '\u{00F8}' => 'o',
        '\u{00F9}'..='\u{00FC}' => 'u',
        _ => ch,
    }
}

/// Row bitmap for `ch`; unknown characters render as `?`.
pub(crate) fn glyph(ch: char) -> [u8; 7] {
    if ch == '\u{2022}' {
        return BULLET;
    }
    let c = fold(ch) as u32;
    let idx = if (32..127).contains(&c) { c - 32 } else { '?' as u32 - 32 };
    GLYPHS[idx as usize]
}

/// Call `pixel(col, row)` for every set pixel of `ch`.
pub(crate) fn for_each_pixel(ch: char, mut pixel: impl FnMut(u32, u32)) {
    for (row, bits) in glyph(ch).iter().enumerate() {
        for col in 0..GLYPH_W {
            if bits & (1 << (GLYPH_W - 1 - col)) != 0 {
                pixel(col, row as u32);
            }
        }
    }
}

/// Draw `text` with its top-left corner at (`x`, `y`), clipped to the image.
pub(crate) fn draw_text(img: &mut RgbaImage, text: &str, x: u32, y: u32, scale: u32, color: Rgba<u8>) {
    let (w, h) = img.dimensions();
    for (i, ch) in text.chars().enumerate() {
        let gx = x + i as u32 * ADVANCE * scale;
        if gx >= w {
            break;
        }
        for_each_pixel(ch, |col, row| {
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = gx + col * scale + dx;
                    let py = y + row * scale + dy;
                    if px < w && py < h {
                        img.put_pixel(px, py, color);
                    }
                }
            }
        });
    }
}

/// Greedy word wrap to at most `max_chars` characters per line.
pub(crate) fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut out = Vec::new();
    for raw in text.lines() {
        let mut line = String::new();
        for word in raw.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            // Hard-split words longer than a whole line.
            while word.len() > max_chars {
                if !line.is_empty() {
                    out.push(std::mem::take(&mut line));
                }
                out.push(word.drain(..max_chars).collect());
            }
            let word: String = word.into_iter().collect();
            let len = line.chars().count();
            if len > 0 && len + 1 + word.chars().count() > max_chars {
                out.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        out.push(line);
    }
    out
}
