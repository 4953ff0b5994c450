use crate::error::Error;
use crate::model::{Table, TableRow};
use crate::theme::{PLACEHOLDER_HIGHLIGHT, WHITE};

use super::DrawOp;
use super::layout::{TextLine, TextStyle, build_lines, emit_line};
use super::text::{BODY_SIZE, Flow};

const CELL_PAD: f32 = 4.0;
const MIN_COLUMN: f32 = 24.0;
const BORDER: [u8; 3] = [0xd1, 0xd5, 0xdb];

/// Auto-fit column widths so that the longest unbreakable word in each column
/// fits (with padding). Columns that need more grow; the others shrink
/// proportionally. Total width is preserved.
fn auto_fit_columns(table: &Table, flow: &Flow, total: f32) -> Vec<f32> {
    let ncols = table.column_count();
    let mut min_widths = vec![0.0f32; ncols];
    for row in &table.rows {
        for (col, cell) in row.cells.iter().enumerate() {
            let style = cell_style(flow, row);
            for span in &cell.spans {
                let Some(entry) = flow.fonts.get(&style.key_for(span)) else {
                    continue;
                };
                for word in span.text.split_whitespace() {
                    let ww = entry.word_width(word, style.size) + 2.0 * CELL_PAD;
                    min_widths[col] = min_widths[col].max(ww);
                }
            }
        }
    }

    let mut widths = vec![total / ncols as f32; ncols];
    let mut extra_needed: f32 = 0.0;
    let mut shrinkable: f32 = 0.0;
    for i in 0..ncols {
        if min_widths[i] > widths[i] {
            extra_needed += min_widths[i] - widths[i];
            widths[i] = min_widths[i];
        } else {
            shrinkable += widths[i] - min_widths[i];
        }
    }
    if extra_needed > 0.0 && shrinkable > 0.0 {
        let factor = extra_needed.min(shrinkable) / shrinkable;
        for i in 0..ncols {
            if widths[i] > min_widths[i] {
                widths[i] -= (widths[i] - min_widths[i]) * factor;
            }
        }
        let new_total: f32 = widths.iter().sum();
        if (new_total - total).abs() > 0.01 {
            let scale = total / new_total;
            widths.iter_mut().for_each(|w| *w *= scale);
        }
    }
    widths
}

fn cell_style<'a>(flow: &Flow<'a>, row: &TableRow) -> TextStyle<'a> {
    if row.is_header() {
        flow.style(BODY_SIZE, WHITE, true)
    } else {
        flow.style(BODY_SIZE, flow.body, false)
    }
}

struct RowLayout {
    height: f32,
    cells: Vec<Vec<TextLine>>,
}

fn layout_rows(table: &Table, flow: &Flow, widths: &[f32]) -> Vec<RowLayout> {
    table
        .rows
        .iter()
        .map(|row| {
            let style = cell_style(flow, row);
            let lh = flow.line_height(style);
            let cells: Vec<Vec<TextLine>> = row
                .cells
                .iter()
                .zip(widths)
                .map(|(cell, w)| build_lines(&cell.spans, style, flow.fonts, w - 2.0 * CELL_PAD))
                .collect();
            let lines = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);
            RowLayout {
                height: lines as f32 * lh + 2.0 * CELL_PAD,
                cells,
            }
        })
        .collect()
}

/// Draw `table` as a bordered grid. Rows never split: a row that would cross
/// the bottom margin moves to the next page, with the header row repeated.
pub(super) fn render_table(flow: &mut Flow, table: &Table) -> Result<(), Error> {
    let ncols = table.column_count();
    if ncols == 0 {
        return Err(Error::Render("table has no cells".into()));
    }
    let total = flow.g.content_width();
    if total / (ncols as f32) < MIN_COLUMN {
        return Err(Error::Render(format!(
            "{ncols} columns do not fit in {total:.0}pt"
        )));
    }
    let widths = auto_fit_columns(table, flow, total);
    let rows = layout_rows(table, flow, &widths);
    let page_room = flow.g.top() - flow.g.bottom();
    if let Some(r) = rows.iter().find(|r| r.height > page_room) {
        return Err(Error::Render(format!(
            "row of {:.0}pt is taller than a page",
            r.height
        )));
    }
    let header = table.rows.first().filter(|r| r.is_header()).zip(rows.first());

    for (ri, (row, layout)) in table.rows.iter().zip(&rows).enumerate() {
        log::debug!("TABLE row={ri} row_h={:.2} y={:.2}", layout.height, flow.y);
        if !flow.at_top() && flow.y - layout.height < flow.g.bottom() {
            flow.new_page();
            if let Some((hrow, hlayout)) = header
                && ri > 0
            {
                draw_row(flow, hrow, hlayout, &widths);
            }
        }
        draw_row(flow, row, layout, &widths);
    }
    Ok(())
}

fn draw_row(flow: &mut Flow, row: &TableRow, layout: &RowLayout, widths: &[f32]) {
    let style = cell_style(flow, row);
    let lh = flow.line_height(style);
    let ascent = flow.ascent(style);
    let top = flow.y;
    let bottom = top - layout.height;
    let mut x = flow.g.margin;
    for (col, w) in widths.iter().enumerate() {
        let cell = row.cells.get(col);
        let fill = if row.is_header() {
            Some(flow.palette.primary)
        } else if cell.is_some_and(|c| c.has_placeholder()) {
            Some(PLACEHOLDER_HIGHLIGHT)
        } else {
            cell.and_then(|c| c.shading)
        };
        if let Some(color) = fill {
            flow.page.ops.push(DrawOp::Fill {
                x,
                y: bottom,
                w: *w,
                h: layout.height,
                color,
            });
        }
        if let Some(lines) = layout.cells.get(col) {
            let mut baseline = top - CELL_PAD - ascent;
            for line in lines {
                emit_line(&mut flow.page, line, x + CELL_PAD, baseline);
                baseline -= lh;
            }
        }
        flow.page.ops.push(DrawOp::Stroke {
            x,
            y: bottom,
            w: *w,
            h: layout.height,
            color: BORDER,
            width: 0.5,
        });
        x += w;
    }
    flow.y = bottom;
}
