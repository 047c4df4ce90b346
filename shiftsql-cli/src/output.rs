use std::fmt::Write;

use chrono_tz::Tz;
use shiftsql::{Direction, LedgerRecord, MigrationReport, Outcome};

pub fn run_started(direction: Direction) -> String {
    format!("Running {} migrations.", direction)
}

pub fn run_completed(report: &MigrationReport) -> String {
    format!(
        "{} migrations completed successfully ({} applied, {} already applied).",
        capitalize(&report.direction.to_string()),
        report.applied.len(),
        report.skipped.len()
    )
}

/// Text printed after a command finishes. Migration runs print as they go, so they render
/// nothing here.
pub fn render(outcome: &Outcome, time_zone: Tz) -> String {
    let mut out = String::new();
    match outcome {
        Outcome::Initialized { table } => {
            let _ = writeln!(out, "Ledger table '{}' is ready.", table);
        }
        Outcome::Migrated(_) => {}
        Outcome::Listed(records) => {
            out.push_str("Listing migrations\n");
            out.push_str(&ledger_table(records, time_zone));
        }
        Outcome::Created(paths) => {
            for path in paths {
                let _ = writeln!(out, "Created {}", path.display());
            }
        }
        Outcome::Status { up, down } => {
            for (direction, files) in [(Direction::Up, up), (Direction::Down, down)] {
                let _ = writeln!(out, "Pending {} migrations: {}", direction, files.len());
                for file in files {
                    let _ = writeln!(out, "  {}", file.file_name());
                }
            }
        }
    }
    out
}

/// Aligned `id | description | applied at` table, times shown in `time_zone`.
fn ledger_table(records: &[LedgerRecord], time_zone: Tz) -> String {
    if records.is_empty() {
        return "No migrations applied.\n".to_string();
    }

    let rows: Vec<[String; 3]> = records
        .iter()
        .map(|record| {
            [
                record.id.to_string(),
                record.description.clone(),
                record
                    .created_at
                    .with_timezone(&time_zone)
                    .format("%Y/%m/%d %H:%M:%S")
                    .to_string(),
            ]
        })
        .collect();
    let header = ["ID", "DESCRIPTION", "APPLIED AT"];

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut line = |cells: [&str; 3]| {
        let _ = writeln!(
            out,
            "{:<w0$} | {:<w1$} | {}",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1]
        );
    };
    line(header);
    for row in &rows {
        line([&row[0], &row[1], &row[2]]);
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
