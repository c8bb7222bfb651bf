use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, RollupError};

pub const MAPPING_FILE: &str = "updated_values.csv";
pub const YEAR_FILE: &str = "dns_full_data.csv";

/// Every file a run reads or writes, derived from the data day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub raw: PathBuf,
    pub mapping: PathBuf,
    pub daily: PathBuf,
    pub month: PathBuf,
    pub year: PathBuf,
}

impl RunPaths {
    pub fn new(work_dir: &Path, day: NaiveDate) -> Self {
        let stamp = day.format("%Y-%m-%d");
        Self {
            raw: work_dir.join(format!("dns_result_original_{}.csv", stamp)),
            mapping: work_dir.join(MAPPING_FILE),
            daily: work_dir.join(format!("dns_result_{}.csv", stamp)),
            month: work_dir.join(month_file_name(day)),
            year: work_dir.join(YEAR_FILE),
        }
    }

    /// Per-day artifacts, removed once folded into the month file.
    pub fn transient(&self) -> [&Path; 3] {
        [self.raw.as_path(), self.mapping.as_path(), self.daily.as_path()]
    }
}

/// `{month}_{year}.csv` with a lowercase month name.
pub fn month_file_name(day: NaiveDate) -> String {
    format!("{}.csv", day.format("%B_%Y").to_string().to_lowercase())
}

pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| RollupError::csv(path, e))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RollupError::csv(path, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn write_to(file: File, path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(file);
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| RollupError::csv(path, e))?;
    }
    writer.flush().map_err(|e| RollupError::io(path, e))
}

/// Replaces the file's contents with `rows`.
pub fn write_rows(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let file = File::create(path).map_err(|e| RollupError::io(path, e))?;
    write_to(file, path, rows)
}

pub fn append_rows(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RollupError::io(path, e))?;
    write_to(file, path, rows)
}

/// Removes files that exist; failures are logged, not returned.
pub fn remove_files(paths: &[&Path]) -> usize {
    let mut removed = 0;
    for path in paths {
        if !path.exists() {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(action = "remove", component = "cleanup", file_path = ?path, error = %e, "Failed to remove file")
            }
        }
    }
    info!(action = "complete", component = "cleanup", removed, "Removed per-day artifacts");
    removed
}
