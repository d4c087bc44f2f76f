use std::fmt::Display;

use console::{style, Style, StyledObject};

/// Terminal style of a pipeline status, matching the table cell colours.
pub fn status_style(status: &str) -> Style {
    match status {
        "success" => Style::new().green().bright(),
        "failed" => Style::new().red().bright(),
        "running" | "pending" | "preparing" | "waiting_for_resource" => {
            Style::new().yellow().bright()
        }
        "manual" | "scheduled" => Style::new().cyan(),
        _ => Style::new().dim(),
    }
}

/// Tab heading such as `failed (3)`, coloured like its status.
pub fn status_heading(status: &str, count: usize) -> StyledObject<String> {
    status_style(status)
        .bold()
        .apply_to(format!("{status} ({count})"))
}

pub fn dim(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bold(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bold()
}

pub fn magenta_bold(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

pub fn success(text: impl Display) -> StyledObject<String> {
    status_style("success").apply_to(text.to_string())
}

pub fn failure(text: impl Display) -> StyledObject<String> {
    status_style("failed").apply_to(text.to_string())
}

pub fn pending(text: impl Display) -> StyledObject<String> {
    status_style("running").apply_to(text.to_string())
}
