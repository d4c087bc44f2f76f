use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::model::{Pipeline, PipelineRecord, ProjectPipeline, ScheduleProjectPipeline};
use crate::view::ViewKind;

pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn status_color(status: &str) -> TableColor {
    match status {
        "success" => TableColor::Green,
        "failed" => TableColor::Red,
        "running" | "pending" | "preparing" | "waiting_for_resource" => TableColor::Yellow,
        "manual" | "scheduled" => TableColor::Cyan,
        _ => TableColor::DarkGrey,
    }
}

pub fn status_cell(pipeline: Option<&Pipeline>) -> Cell {
    match pipeline {
        Some(pipeline) => Cell::new(&pipeline.status).fg(status_color(&pipeline.status)),
        None => Cell::new("-").fg(TableColor::DarkGrey),
    }
}

fn last_run_cell(pipeline: Option<&Pipeline>) -> Cell {
    pipeline.map_or_else(
        || Cell::new("-"),
        |p| Cell::new(p.updated_at.format("%Y-%m-%d %H:%M:%S")),
    )
}

fn failed_jobs_cell<R: PipelineRecord>(record: &R) -> Cell {
    let names: Vec<&str> = record.failed_jobs().iter().map(|j| j.name.as_str()).collect();
    Cell::new(names.join(", ")).fg(TableColor::Red)
}

/// Columns shared by every view.
fn record_cells<R: PipelineRecord>(record: &R, kind: ViewKind) -> Vec<Cell> {
    let project = record.project();
    let pipeline = record.pipeline();

    vec![
        Cell::new(&project.name),
        Cell::new(&project.namespace.name),
        Cell::new(kind.branch(record).unwrap_or("-")),
        Cell::new(pipeline.map_or("-", |p| p.source.as_str())),
    ]
}

/// One status tab of the latest view.
pub fn latest_table(records: &[ProjectPipeline]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Project", "Group", "Branch", "Trigger", "Last Run", "Failed Jobs"]);

    for record in records {
        let mut row = record_cells(record, ViewKind::Latest);
        row.push(last_run_cell(record.pipeline.as_ref()));
        row.push(failed_jobs_cell(record));
        table.add_row(row);
    }

    table
}

pub fn pipelines_table(records: &[ProjectPipeline], is_pinned: impl Fn(u64) -> bool) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        "", "Pipeline", "Project", "Group", "Branch", "Trigger", "Status", "Last Run",
    ]);

    for record in records {
        let pipeline = record.pipeline.as_ref();
        let pinned = pipeline.is_some_and(|p| is_pinned(p.id));

        let mut row = vec![
            Cell::new(if pinned { "📌" } else { "" }),
            Cell::new(pipeline.map_or_else(|| "-".to_string(), |p| format!("#{}", p.id))),
        ];
        row.extend(record_cells(record, ViewKind::Pipelines));
        row.push(status_cell(pipeline));
        row.push(last_run_cell(pipeline));
        table.add_row(row);
    }

    table
}

pub fn schedules_table(records: &[ScheduleProjectPipeline]) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        "Schedule", "Cron", "Project", "Group", "Branch", "Trigger", "Status", "Last Run",
        "Failed Jobs",
    ]);

    for record in records {
        let schedule = &record.schedule;
        let cron = format!("{} ({})", schedule.cron, schedule.cron_timezone);
        let description = if schedule.active {
            Cell::new(&schedule.description)
        } else {
            Cell::new(format!("{} (inactive)", schedule.description)).fg(TableColor::DarkGrey)
        };

        let mut row = vec![description, Cell::new(cron)];
        row.extend(record_cells(record, ViewKind::Schedules));
        row.push(status_cell(record.pipeline.as_ref()));
        row.push(last_run_cell(record.pipeline.as_ref()));
        row.push(failed_jobs_cell(record));
        table.add_row(row);
    }

    table
}
