//! Batch report formatting

use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::services::{BatchReport, ItemOutcome, ItemStatus};

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Line")]
    line: u64,
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    message: String,
}

impl OutcomeRow {
    fn new(outcome: &ItemOutcome) -> Self {
        let status = match outcome.status {
            ItemStatus::Applied => "✓ applied",
            ItemStatus::Valid => "✓ ok",
            ItemStatus::Failed => "✗ failed",
        };
        Self {
            line: outcome.line,
            operation: outcome.operation.to_string(),
            status: status.to_string(),
            message: outcome.message.clone(),
        }
    }
}

/// Format a batch report: per-item table, per-operation counts, verdict
pub fn format_batch_report(report: &BatchReport) -> String {
    let mut output = String::new();

    let rows: Vec<OutcomeRow> = report.outcomes.iter().map(OutcomeRow::new).collect();
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::right()));
    output.push_str(&table.to_string());
    output.push_str("\n\n");

    output.push_str(&format!("{:<16} {:>6} {:>6} {:>6}\n", "Operation", "Total", "OK", "Failed"));
    output.push_str(&"-".repeat(37));
    output.push('\n');
    for (operation, counts) in report.by_operation() {
        output.push_str(&format!(
            "{:<16} {:>6} {:>6} {:>6}\n",
            operation, counts.total, counts.succeeded, counts.failed
        ));
    }
    output.push('\n');

    let verdict = if report.preview {
        if report.failed() == 0 {
            format!("Preview: all {} operations would succeed.", report.total())
        } else {
            format!(
                "Preview: {} of {} operations would fail.",
                report.failed(),
                report.total()
            )
        }
    } else if report.committed {
        format!("Batch applied: {} operations.", report.total())
    } else {
        format!(
            "Batch rejected: {} of {} operations failed. Nothing was changed.",
            report.failed(),
            report.total()
        )
    };
    output.push_str(&verdict);
    output.push('\n');

    output
}
