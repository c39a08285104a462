//! Report rendering: trailing text table, CSV export, notification summary.

use breadth_core::domain::BreadthRow;
use breadth_core::engine::{high_low_ratio, RATIO_SENTINEL};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv export: {0}")]
    Csv(#[from] csv::Error),
}

/// Compact per-run summary for the notification channel.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifySummary {
    pub date: chrono::NaiveDate,
    pub new_highs: usize,
    pub new_lows: usize,
    pub ratio: i64,
    pub sample_size: usize,
    pub warnings: Vec<String>,
}

impl NotifySummary {
    /// Build the summary from the most recent row, or `None` when the run
    /// produced no rows.
    pub fn from_rows(rows: &[BreadthRow], sample_size: usize, warnings: &[String]) -> Option<Self> {
        let latest = rows.last()?;
        Some(Self {
            date: latest.date,
            new_highs: latest.new_highs,
            new_lows: latest.new_lows,
            ratio: high_low_ratio(latest.new_highs, latest.new_lows),
            sample_size,
            warnings: warnings.to_vec(),
        })
    }

    /// Plain-text message body.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Breadth {date}\nnew 200d highs: {h}\nnew 200d lows: {l}\nhigh/low ratio: {r}\nsample: {s} instruments",
            date = self.date,
            h = self.new_highs,
            l = self.new_lows,
            r = render_ratio(self.ratio),
            s = self.sample_size,
        );
        for warning in &self.warnings {
            out.push_str("\nwarning: ");
            out.push_str(warning);
        }
        out
    }
}

fn render_ratio(ratio: i64) -> String {
    if ratio == RATIO_SENTINEL {
        "n/a (no lows)".to_string()
    } else {
        format!("{ratio}%")
    }
}

/// Last `n` rows, most recent first.
pub fn trailing_view(rows: &[BreadthRow], n: usize) -> Vec<&BreadthRow> {
    rows.iter().rev().take(n).collect()
}

/// Fixed-width text table of the trailing view.
pub fn render_table(rows: &[&BreadthRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:>10} {:>10} {:>8} {:>12}\n",
        "date", "new_highs", "new_lows", "ratio", "benchmark"
    ));
    out.push_str(&"-".repeat(56));
    out.push('\n');
    for row in rows {
        let benchmark = row
            .benchmark
            .map(|b| format!("{b:.2}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<12} {:>10} {:>10} {:>8} {:>12}\n",
            row.date.to_string(),
            row.new_highs,
            row.new_lows,
            render_ratio(high_low_ratio(row.new_highs, row.new_lows)),
            benchmark,
        ));
    }
    out
}

/// Export the full row sequence as CSV (ascending by date).
pub fn write_csv(rows: &[BreadthRow], path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["date", "new_highs", "new_lows", "benchmark"])?;
    for row in rows {
        writer.write_record([
            row.date.to_string(),
            row.new_highs.to_string(),
            row.new_lows.to_string(),
            row.benchmark.map(|b| b.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
