//! Table formatting for the batch report.
//!
//! Renders the per-task section of a parallel run as a bordered table:
//! task id, terminal state, session id, and the per-task log path. Summary
//! fields extracted from agent messages are printed beneath the table by
//! the parallel command, since they are too wide for columns.

use crate::core::parallel::{BatchReport, TaskState};
use tabled::settings::{Alignment, Modify, Style, object::Rows};
use tabled::{Table, Tabled};

/// One row of the batch report table.
#[derive(Tabled)]
pub struct ReportRow {
    /// Task id.
    #[tabled(rename = "Task")]
    pub task: String,
    /// Terminal state.
    #[tabled(rename = "State")]
    pub state: String,
    /// Session id, or `-`.
    #[tabled(rename = "Session")]
    pub session: String,
    /// Log directory, or `-`.
    #[tabled(rename = "Log")]
    pub log: String,
}

/// Build the report table for display.
pub fn create_report_table(report: &BatchReport) -> Table {
    let rows: Vec<ReportRow> = report
        .results
        .iter()
        .map(|result| ReportRow {
            task: result.task_id.clone(),
            state: state_label(result.state),
            session: result
                .session_id
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            log: result
                .log_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::new(..)).with(Alignment::left()));
    table
}

fn state_label(state: TaskState) -> String {
    state.to_string()
}
