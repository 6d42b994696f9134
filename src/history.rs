use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::db::Warehouse;
use crate::loader::{self, LoadSummary, SinkTable};
use crate::models::{COLUMNS, JobRecord, parse_date, parse_id};

/// Read the historical export. Every cell is text; short rows are padded
/// with empty strings; dates and ids are coerced, failing to null.
pub fn read_history_csv(path: &Path, default_company: &str) -> Result<Vec<JobRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open history CSV: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
        .clone();

    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect();

    let unknown: Vec<&str> = headers
        .iter()
        .map(str::trim)
        .filter(|name| !COLUMNS.contains(name))
        .collect();
    if !unknown.is_empty() {
        warn!(columns = ?unknown, "Ignoring CSV columns with no sink column");
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Failed to read CSV row {}", line + 2))?;

        // Absent column -> None; present column with a missing cell -> ""
        let cell = |name: &str| index.get(name).map(|&i| row.get(i).unwrap_or(""));
        let text = |name: &str| cell(name).map(str::to_string);

        let company_name = match cell("company_name") {
            Some(value) if !value.trim().is_empty() => value.to_string(),
            _ => default_company.to_string(),
        };

        records.push(JobRecord {
            job_id: cell("job_id").and_then(parse_id),
            internal_job_id: cell("internal_job_id").and_then(parse_id),
            absolute_url: text("absolute_url"),
            title: text("title"),
            department: text("department"),
            location: text("location"),
            company_name,
            open_date: cell("open_date").and_then(parse_date),
            close_date: cell("close_date").and_then(parse_date),
        });
    }

    Ok(records)
}

/// Load the CSV export into `zen_bronze.raw_history`.
///
/// The file is read before any connection is opened, so a missing or
/// unreadable CSV fails without touching the database.
pub fn run<W, F>(path: &Path, default_company: &str, connect: F) -> Result<LoadSummary>
where
    W: Warehouse,
    F: FnOnce() -> Result<W>,
{
    info!(path = %path.display(), "Reading history CSV");
    let records = read_history_csv(path, default_company)?;

    let mut wh = connect()?;
    let summary = loader::replace_contents(&mut wh, SinkTable::History, &records)?;
    debug!(
        table = SinkTable::History.qualified_name(),
        rows = summary.rows,
        "history load complete"
    );
    Ok(summary)
}
