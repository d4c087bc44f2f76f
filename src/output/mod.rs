mod exports;
mod progress;
mod styling;
mod tables;

use std::io::Write;

use chrono::{DateTime, Local, Utc};

use crate::config::OutputFormat;
use crate::error::Result;
use crate::view::{LatestPipelinesView, PipelinesView, SchedulesView, ViewKind};

pub use exports::{export_csv, DirectoryDownloader};
pub use progress::LoadingSpinner;
pub use styling::{dim, magenta_bold};

use exports::{export_json, render_csv};
use styling::{bold, status_heading};
use tables::{latest_table, pipelines_table, schedules_table};

/// Prints the `cidash` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("📊 cidash"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI/CD pipeline dashboard")
    );
}

/// What the watch footer reports about the snapshot on screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardStatus {
    pub shown: usize,
    /// Successful fetch rounds so far
    pub round: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub loading: bool,
    pub filtered: bool,
}

impl DashboardStatus {
    pub fn line(&self) -> String {
        let fetched = self.fetched_at.map_or_else(
            || "never".to_string(),
            |at| at.with_timezone(&Local).format("%H:%M:%S").to_string(),
        );
        let mut line = format!("{} shown · updated {fetched}", self.shown);
        if self.round > 0 {
            line.push_str(&format!(" (round {})", self.round));
        }
        if self.filtered {
            line.push_str(" · filtered");
        }
        if self.loading {
            line.push_str(" · refreshing…");
        }
        line
    }
}

pub fn render_latest(
    view: &LatestPipelinesView,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => export_json(view.tabs(), true, out),
        OutputFormat::Csv => {
            writeln!(out, "{}", render_csv(view.filtered(), ViewKind::Latest))?;
            Ok(())
        }
        OutputFormat::Table => {
            if view.tabs().is_empty() {
                writeln!(out, "{}", dim("No pipelines match the current filters"))?;
            }
            for tab in view.tabs() {
                writeln!(out, "{}", status_heading(&tab.status, tab.records.len()))?;
                writeln!(out, "{}", latest_table(&tab.records))?;
            }
            Ok(())
        }
    }
}

pub fn render_pipelines(
    view: &PipelinesView,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => export_json(view.displayed(), true, out),
        OutputFormat::Csv => {
            writeln!(out, "{}", render_csv(view.displayed(), ViewKind::Pipelines))?;
            Ok(())
        }
        OutputFormat::Table => {
            writeln!(out, "{}", bold("Pipelines"))?;
            writeln!(
                out,
                "{}",
                pipelines_table(view.displayed(), |id| view.is_pinned(id))
            )?;
            Ok(())
        }
    }
}

pub fn render_schedules(
    view: &SchedulesView,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => export_json(view.displayed(), true, out),
        OutputFormat::Csv => {
            writeln!(out, "{}", render_csv(view.displayed(), ViewKind::Schedules))?;
            Ok(())
        }
        OutputFormat::Table => {
            writeln!(out, "{}", bold("Schedules"))?;
            writeln!(out, "{}", schedules_table(view.displayed()))?;
            Ok(())
        }
    }
}
