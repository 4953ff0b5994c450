use pdf_writer::Rect;

use crate::fonts::font_key;
use crate::model::Span;
use crate::theme::{PLACEHOLDER_HIGHLIGHT, Rgb};

use super::{DrawOp, FontSet, LinkAnnotation, Page};

pub(super) struct WordChunk {
    pub(super) font: String,
    pub(super) text: String,
    pub(super) font_size: f32,
    pub(super) color: Rgb,
    pub(super) highlight: Option<Rgb>,
    pub(super) x_offset: f32, // x relative to line start
    pub(super) width: f32,
    pub(super) underline: bool,
    pub(super) link: Option<String>,
}

pub(super) struct TextLine {
    pub(super) chunks: Vec<WordChunk>,
    pub(super) total_width: f32,
}

/// How a run of spans is set: family, size, colour and forced weight.
#[derive(Clone, Copy)]
pub(super) struct TextStyle<'a> {
    pub(super) family: &'a str,
    pub(super) size: f32,
    pub(super) color: Rgb,
    pub(super) bold: bool,
}

impl TextStyle<'_> {
    pub(super) fn key_for(&self, span: &Span) -> String {
        font_key(self.family, self.bold || span.bold, span.italic)
    }
}

fn finish_line(chunks: &mut Vec<WordChunk>) -> TextLine {
    let total_width = chunks.last().map(|c| c.x_offset + c.width).unwrap_or(0.0);
    TextLine {
        chunks: std::mem::take(chunks),
        total_width,
    }
}

/// Layout spans into wrapped lines.
/// No space is inserted between spans unless the preceding text ended with
/// whitespace or the new span starts with it ("bold" + ", " → "bold,").
/// `"\n"` spans force a line break.
pub(super) fn build_lines(
    spans: &[Span],
    style: TextStyle,
    fonts: &FontSet,
    max_width: f32,
) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut current_chunks: Vec<WordChunk> = Vec::new();
    let mut current_x: f32 = 0.0;
    let mut prev_ended_with_ws = false;
    let mut prev_space_w: f32 = 0.0;

    for span in spans {
        if span.is_break() {
            lines.push(finish_line(&mut current_chunks));
            current_x = 0.0;
            prev_ended_with_ws = false;
            continue;
        }

        let key = style.key_for(span);
        let Some(entry) = fonts.get(&key) else {
            log::debug!("no font registered for {key}, span skipped");
            continue;
        };
        let space_w = entry.space_width(style.size);
        let starts_with_ws = span.text.starts_with(char::is_whitespace);

        for (i, word) in span.text.split_whitespace().enumerate() {
            let ww = entry.word_width(word, style.size);

            let need_space =
                !current_chunks.is_empty() && (i > 0 || starts_with_ws || prev_ended_with_ws);

            // The space belongs to whichever span carried the whitespace.
            let effective_space_w = if i > 0 || starts_with_ws {
                space_w
            } else {
                prev_space_w
            };

            let proposed_x = if need_space {
                current_x + effective_space_w
            } else {
                current_x
            };

            if !current_chunks.is_empty() && proposed_x + ww > max_width {
                lines.push(finish_line(&mut current_chunks));
                current_x = 0.0;
            } else {
                current_x = proposed_x;
            }

            current_chunks.push(WordChunk {
                font: key.clone(),
                text: word.to_string(),
                font_size: style.size,
                color: span.color.unwrap_or(style.color),
                highlight: span.placeholder.then_some(PLACEHOLDER_HIGHLIGHT),
                x_offset: current_x,
                width: ww,
                underline: span.underline,
                link: span.link.clone(),
            });
            current_x += ww;
        }

        prev_ended_with_ws = span.text.ends_with(char::is_whitespace);
        prev_space_w = space_w;
    }

    if !current_chunks.is_empty() {
        lines.push(finish_line(&mut current_chunks));
    }
    lines.retain(|l| !l.chunks.is_empty());
    lines
}

/// Emit one laid-out line at `x` with its baseline at `y`.
///
/// Contiguous same-colour highlights become one rectangle of fixed height;
/// adjacent chunks that share font, size and colour become one text op.
pub(super) fn emit_line(page: &mut Page, line: &TextLine, x: f32, y: f32) {
    let mut hl: Option<(Rgb, f32, f32, f32)> = None; // colour, start, end, size
    let flush_hl = |page: &mut Page, (color, sx, ex, fs): (Rgb, f32, f32, f32)| {
        page.ops.push(DrawOp::Fill {
            x: sx,
            y: y - fs * 0.25,
            w: ex - sx,
            h: fs * 1.2,
            color,
        });
    };
    for chunk in &line.chunks {
        let cx = x + chunk.x_offset;
        match (hl, chunk.highlight) {
            (Some((c, sx, _, fs)), Some(h)) if c == h => {
                hl = Some((c, sx, cx + chunk.width, fs.max(chunk.font_size)));
            }
            (prev, next) => {
                if let Some(p) = prev {
                    flush_hl(page, p);
                }
                hl = next.map(|c| (c, cx, cx + chunk.width, chunk.font_size));
            }
        }
    }
    if let Some(p) = hl {
        flush_hl(page, p);
    }

    let mut run: Option<(usize, f32)> = None; // op index, end x of the run
    for chunk in &line.chunks {
        let cx = x + chunk.x_offset;
        let len = page.ops.len();
        let merged = match (run, page.ops.last_mut()) {
            (
                Some((idx, end)),
                Some(DrawOp::Text {
                    font, size, color, text, ..
                }),
            ) if idx + 1 == len
                && *font == chunk.font
                && *size == chunk.font_size
                && *color == chunk.color =>
            {
                if cx > end + 0.01 {
                    text.push(' ');
                }
                text.push_str(&chunk.text);
                true
            }
            _ => false,
        };
        if !merged {
            page.ops.push(DrawOp::Text {
                x: cx,
                y,
                size: chunk.font_size,
                font: chunk.font.clone(),
                color: chunk.color,
                text: chunk.text.clone(),
            });
        }
        run = Some((page.ops.len() - 1, cx + chunk.width));

        if let Some(url) = &chunk.link {
            let bottom = y - chunk.font_size * 0.2;
            let top = y + chunk.font_size * 0.8;
            let prev = page
                .links
                .last_mut()
                .filter(|prev| prev.url == *url && (prev.rect.y1 - bottom).abs() < 1.0);
            if let Some(prev) = prev {
                prev.rect.x2 = cx + chunk.width;
            } else {
                page.links.push(LinkAnnotation {
                    rect: Rect::new(cx, bottom, cx + chunk.width, top),
                    url: url.clone(),
                });
            }
        }
    }

    // Underlines after the text so they are not folded into a text run.
    for chunk in line.chunks.iter().filter(|c| c.underline) {
        let thick = (chunk.font_size * 0.05).max(0.5);
        page.ops.push(DrawOp::Fill {
            x: x + chunk.x_offset,
            y: y - chunk.font_size * 0.12 - thick,
            w: chunk.width,
            h: thick,
            color: chunk.color,
        });
    }
}

/// Split `text` into lines no wider than `max_width` using one font.
pub(super) fn wrap_plain(text: &str, font: &str, size: f32, fonts: &FontSet, max_width: f32) -> Vec<String> {
    let Some(entry) = fonts.get(font) else {
        return vec![text.to_string()];
    };
    let space = entry.space_width(size);
    let mut out = Vec::new();
    for raw in text.lines() {
        let mut line = String::new();
        let mut width = 0.0f32;
        for word in raw.split_whitespace() {
            let ww = entry.word_width(word, size);
            if !line.is_empty() && width + space + ww > max_width {
                out.push(std::mem::take(&mut line));
                width = 0.0;
            }
            if !line.is_empty() {
                line.push(' ');
                width += space;
            }
            line.push_str(word);
            width += ww;
        }
        out.push(line);
    }
    out
}
