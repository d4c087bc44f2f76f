use std::io::Write;
use std::path::PathBuf;

use chrono::SecondsFormat;
use log::info;
use serde::Serialize;

use crate::error::Result;
use crate::model::PipelineRecord;
use crate::view::ViewKind;

pub const CSV_MIME_TYPE: &str = "text/csv";

/// Hands a finished export to whatever stores it.
pub trait Downloader {
    fn download(&self, filename: &str, mime_type: &str, payload: &[u8]) -> Result<()>;
}

/// Writes exports as files into a directory.
pub struct DirectoryDownloader {
    dir: PathBuf,
}

impl DirectoryDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Downloader for DirectoryDownloader {
    fn download(&self, filename: &str, mime_type: &str, payload: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        std::fs::write(&path, payload)?;
        info!("Exported {mime_type} to {}", path.display());
        Ok(())
    }
}

/// File name of the CSV export of a view.
pub fn csv_filename(kind: ViewKind) -> &'static str {
    match kind {
        ViewKind::Latest => "latest-pipelines.csv",
        ViewKind::Pipelines => "pipelines.csv",
        ViewKind::Schedules => "schedules.csv",
    }
}

/// Renders records as CSV text.
///
/// Fields are joined as-is: a comma inside a project name shifts the columns.
/// Lines are separated by `\n` with no trailing newline.
pub fn render_csv<R: PipelineRecord>(records: &[R], kind: ViewKind) -> String {
    let with_status = kind.filters_status();

    let header = if with_status {
        "Project,Group,Branch,Trigger,Status,Last Run"
    } else {
        "Project,Group,Branch,Trigger,Last Run"
    };

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(header.to_string());

    for record in records {
        let project = record.project();
        let pipeline = record.pipeline();

        let mut fields = vec![
            project.name.as_str(),
            project.namespace.name.as_str(),
            kind.branch(record).unwrap_or_default(),
            pipeline.map(|p| p.source.as_str()).unwrap_or_default(),
        ];
        if with_status {
            fields.push(pipeline.map(|p| p.status.as_str()).unwrap_or_default());
        }

        let last_run = pipeline
            .map(|p| p.updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .unwrap_or_default();

        lines.push(format!("{},{last_run}", fields.join(",")));
    }

    lines.join("\n")
}

/// Renders the records of a view and hands them to `downloader`.
pub fn export_csv<R: PipelineRecord>(
    records: &[R],
    kind: ViewKind,
    downloader: &dyn Downloader,
) -> Result<()> {
    let csv = render_csv(records, kind);
    downloader.download(csv_filename(kind), CSV_MIME_TYPE, csv.as_bytes())
}

pub fn export_json<T: Serialize + ?Sized>(
    value: &T,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}
