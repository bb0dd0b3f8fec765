//! Rendering of statistics, comparison series, and raw records.
//!
//! Delimited output is meant for plotting tools; the text table is for reading
//! in a terminal.

use crate::compare::{Comparison, Series, BATCHED_LABEL, STANDARD_LABEL};
use crate::config::OutputFormat;
use crate::record::BenchmarkRecord;
use crate::stats::{GroupedStats, StdDev};
use std::io::Write;

const STATS_HEADER: [&str; 4] = ["entries", "count", "mean_millis", "std_millis"];
const COMPARISON_HEADER: [&str; 3] = ["entries", "millis", "series"];

pub fn write_stats<W: Write>(
    out: W,
    stats: &GroupedStats,
    format: OutputFormat,
    delimiter: u8,
) -> Result<(), ReportError> {
    match format {
        OutputFormat::Csv => write_stats_csv(out, stats, delimiter),
        OutputFormat::Table => write_text(out, &format_stats_table(stats)),
    }
}

pub fn write_comparison<W: Write>(
    out: W,
    cmp: &Comparison,
    format: OutputFormat,
    delimiter: u8,
) -> Result<(), ReportError> {
    match format {
        OutputFormat::Csv => write_comparison_csv(out, cmp, delimiter),
        OutputFormat::Table => write_text(out, &format_comparison_table(cmp)),
    }
}

/// One JSON object per line, in extraction order.
pub fn write_records<W: Write>(mut out: W, records: &[BenchmarkRecord]) -> Result<(), ReportError> {
    for rec in records {
        serde_json::to_writer(&mut out, rec).map_err(ReportError::Json)?;
        out.write_all(b"\n").map_err(ReportError::Io)?;
    }
    out.flush().map_err(ReportError::Io)
}

fn write_stats_csv<W: Write>(out: W, stats: &GroupedStats, delimiter: u8) -> Result<(), ReportError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(out);
    wtr.write_record(STATS_HEADER).map_err(ReportError::Csv)?;
    for g in &stats.groups {
        let std = match g.std_dev {
            StdDev::Value(v) => v.to_string(),
            StdDev::InsufficientSample => String::new(),
        };
        wtr.write_record([
            g.entries.to_string(),
            g.count.to_string(),
            g.mean.to_string(),
            std,
        ])
        .map_err(ReportError::Csv)?;
    }
    wtr.flush().map_err(ReportError::Io)
}

fn write_comparison_csv<W: Write>(
    out: W,
    cmp: &Comparison,
    delimiter: u8,
) -> Result<(), ReportError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(out);
    wtr.write_record(COMPARISON_HEADER)
        .map_err(ReportError::Csv)?;
    for (series, label) in labelled(cmp) {
        for (entries, millis) in series.points() {
            wtr.write_record([entries.to_string(), millis.to_string(), label.to_string()])
                .map_err(ReportError::Csv)?;
        }
    }
    wtr.flush().map_err(ReportError::Io)
}

fn labelled(cmp: &Comparison) -> [(&Series, &'static str); 2] {
    [(&cmp.batched, BATCHED_LABEL), (&cmp.standard, STANDARD_LABEL)]
}

fn write_text<W: Write>(mut out: W, text: &str) -> Result<(), ReportError> {
    out.write_all(text.as_bytes()).map_err(ReportError::Io)?;
    out.flush().map_err(ReportError::Io)
}

/// Aligned text table of grouped statistics.
pub fn format_stats_table(stats: &GroupedStats) -> String {
    let rows: Vec<[String; 4]> = stats
        .groups
        .iter()
        .map(|g| {
            [
                g.entries.to_string(),
                g.count.to_string(),
                format!("{:.3}", g.mean),
                match g.std_dev {
                    StdDev::Value(v) => format!("{:.3}", v),
                    StdDev::InsufficientSample => "n/a".to_string(),
                },
            ]
        })
        .collect();
    render_table("BatchAPI Mean with Std", &STATS_HEADER, &rows)
}

/// Aligned text table of both comparison series.
pub fn format_comparison_table(cmp: &Comparison) -> String {
    let rows: Vec<[String; 3]> = labelled(cmp)
        .into_iter()
        .flat_map(|(series, label)| {
            series
                .points()
                .map(move |(e, m)| [e.to_string(), format!("{:.3}", m), label.to_string()])
        })
        .collect();
    let title = format!("BatchAPI vs Standard {}", capitalize(&cmp.method));
    render_table(&title, &COMPARISON_HEADER, &rows)
}

fn render_table<const N: usize>(title: &str, header: &[&str; N], rows: &[[String; N]]) -> String {
    let mut widths = header.map(str::len);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut lines = vec![title.to_string()];
    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{:>w$}", c, w = w))
            .collect::<Vec<_>>()
            .join("  ")
    };
    lines.push(line(header.to_vec()));
    for row in rows {
        lines.push(line(row.iter().map(String::as_str).collect()));
    }
    if rows.is_empty() {
        lines.push("(no records)".to_string());
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "cannot write report: {e}"),
            ReportError::Csv(e) => write!(f, "cannot write csv report: {e}"),
            ReportError::Json(e) => write!(f, "cannot encode record: {e}"),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io(e) => Some(e),
            ReportError::Csv(e) => Some(e),
            ReportError::Json(e) => Some(e),
        }
    }
}
