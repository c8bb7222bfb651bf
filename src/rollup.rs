use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::domain::Total;
use crate::error::Result;
use crate::files;

pub const HEADER: [&str; 4] = ["query", "total quantity", "service provider name", "sid"];

pub fn header_row() -> Vec<String> {
    HEADER.iter().map(|h| h.to_string()).collect()
}

/// True when the day after `day` is the first of a month.
pub fn is_month_end(day: NaiveDate) -> bool {
    day.succ_opt().map(|next| next.day() == 1).unwrap_or(false)
}

/// A leading row whose count column is not a number is a header.
fn is_header(row: &[String]) -> bool {
    row.get(1).map(|c| Total::parse(c).is_none()).unwrap_or(false)
}

fn split_header(mut rows: Vec<Vec<String>>) -> (Option<Vec<String>>, Vec<Vec<String>>) {
    if rows.first().map(|r| is_header(r)).unwrap_or(false) {
        let header = rows.remove(0);
        (Some(header), rows)
    } else {
        (None, rows)
    }
}

/// Appends `rows` to a rollup file, starting it with the header when the
/// file does not exist yet.
pub fn append_with_header(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    if !path.exists() {
        info!(action = "create", component = "rollup", file_path = ?path, "Starting new rollup file");
        files::write_rows(path, &[header_row()])?;
    }
    files::append_rows(path, rows)?;
    info!(action = "append", component = "rollup", file_path = ?path, rows = rows.len(), "Appended rows");
    Ok(())
}

/// Collapses rows sharing a name into the first one for that name.
///
/// Counts are summed while both sides parse as numbers, whole or decimal;
/// otherwise the later row is dropped and the first row stays untouched.
pub fn merge_by_name(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut merged: Vec<Vec<String>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(name) = row.first() else {
            continue;
        };
        match index.get(name) {
            Some(&at) => {
                let kept = &mut merged[at];
                let sum = kept
                    .get(1)
                    .and_then(|c| Total::parse(c))
                    .zip(row.get(1).and_then(|c| Total::parse(c)))
                    .map(|(a, b)| a.plus(b));
                if let Some(sum) = sum {
                    kept[1] = sum.to_string();
                }
            }
            None => {
                index.insert(name.clone(), merged.len());
                merged.push(row);
            }
        }
    }
    merged
}

/// Rewrites a rollup file so each name appears once. Returns the number
/// of data rows left.
pub fn reaggregate(path: &Path) -> Result<usize> {
    let start_time = Instant::now();
    let (header, rows) = split_header(files::read_rows(path)?);
    let before = rows.len();
    let merged = merge_by_name(rows);

    let mut out = Vec::with_capacity(merged.len() + 1);
    if let Some(header) = header {
        out.push(header);
    }
    let after = merged.len();
    out.extend(merged);
    files::write_rows(path, &out)?;

    info!(
        action = "reaggregate",
        component = "rollup",
        file_path = ?path,
        rows_before = before,
        rows_after = after,
        duration_ms = start_time.elapsed().as_millis(),
        "Combined duplicate names"
    );
    Ok(after)
}

/// Appends the month file, minus its header, into the yearly file and
/// reaggregates the result.
pub fn fold_month_into_year(month: &Path, year: &Path) -> Result<usize> {
    let (_, rows) = split_header(files::read_rows(month)?);
    if rows.is_empty() {
        warn!(action = "fold", component = "rollup", file_path = ?month, "Month file has no data rows");
    }
    append_with_header(year, &rows)?;
    info!(action = "fold", component = "rollup", source = ?month, destination = ?year, rows = rows.len(), "Folded month into year");
    reaggregate(year)
}
