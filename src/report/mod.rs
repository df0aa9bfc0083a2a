/// Report rendering: console, JSON, and JUnit XML.
mod console;
mod json;
mod junit;

pub use console::{render_console, render_event_line, render_summary};
pub use json::render_json;
pub use junit::render_junit;

use anyhow::Result;

use crate::runner::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Console,
    Json,
    Junit,
}

impl OutputFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "text" | "human" => Some(OutputFormat::Console),
            "json" => Some(OutputFormat::Json),
            "junit" | "xml" => Some(OutputFormat::Junit),
            _ => None,
        }
    }
}

/// Render a finished run. `color` only affects console output.
pub fn render(report: &RunReport, format: OutputFormat, color: bool) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(render_console(report, color)),
        OutputFormat::Json => render_json(report),
        OutputFormat::Junit => Ok(render_junit(report)),
    }
}
