use crate::metrics::Metrics;

use super::fragment::{Run, TableBlock};
use super::lines::{Line, is_break_space, wrap_paragraphs};

pub(super) struct RowLayout {
    pub(super) height: f32,
    pub(super) cells: Vec<Vec<Line>>,
}

pub(super) struct TablePlan {
    pub(super) col_widths: Vec<f32>,
    pub(super) rows: Vec<RowLayout>,
    pub(super) header_rows: usize,
}

impl TablePlan {
    pub(super) fn header_height(&self) -> f32 {
        self.rows[..self.header_rows].iter().map(|r| r.height).sum()
    }

    pub(super) fn total_height(&self) -> f32 {
        self.rows.iter().map(|r| r.height).sum()
    }
}

/// Column widths from relative weights, grown so the longest unbreakable
/// word in each column fits; other columns shrink proportionally and the
/// total width is preserved.
fn fit_columns(table: &TableBlock, total_width: f32, metrics: &Metrics) -> Vec<f32> {
    let ncols = table.columns.len();
    if ncols == 0 {
        return Vec::new();
    }
    let weight_sum: f32 = table.columns.iter().map(|w| w.max(0.0)).sum();
    let mut widths: Vec<f32> = if weight_sum > 0.0 {
        table
            .columns
            .iter()
            .map(|w| w.max(0.0) / weight_sum * total_width)
            .collect()
    } else {
        vec![total_width / ncols as f32; ncols]
    };

    let mut min_widths = vec![0.0f32; ncols];
    for row in &table.rows {
        for (col, cell) in row.iter().enumerate().take(ncols) {
            for run in cell {
                for word in run.text.split(is_break_space).filter(|w| !w.is_empty()) {
                    let ww = metrics.width(word, run.font, run.size) + 2.0 * table.padding;
                    min_widths[col] = min_widths[col].max(ww);
                }
            }
        }
    }

    let mut extra_needed = 0.0f32;
    let mut shrinkable = 0.0f32;
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
        if (new_total - total_width).abs() > 0.01 {
            let scale = total_width / new_total;
            for w in &mut widths {
                *w *= scale;
            }
        }
    }
    widths
}

pub(super) fn plan_table(table: &TableBlock, total_width: f32, metrics: &Metrics) -> TablePlan {
    let col_widths = fit_columns(table, total_width, metrics);
    let empty: Vec<Run> = Vec::new();
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let cells: Vec<Vec<Line>> = col_widths
                .iter()
                .enumerate()
                .map(|(col, &w)| {
                    let runs = row.get(col).unwrap_or(&empty);
                    let inner = (w - 2.0 * table.padding).max(1.0);
                    wrap_paragraphs(
                        std::slice::from_ref(runs),
                        inner,
                        table.line_height,
                        true,
                        metrics,
                    )
                })
                .collect();
            let content = cells
                .iter()
                .map(|lines| lines.iter().map(|l| l.height).sum::<f32>())
                .fold(0.0f32, f32::max);
            RowLayout {
                height: content + 2.0 * table.padding,
                cells,
            }
        })
        .collect();
    TablePlan {
        col_widths,
        rows,
        header_rows: table.header_rows.min(table.rows.len()),
    }
}
