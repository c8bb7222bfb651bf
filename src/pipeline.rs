use chrono::NaiveDate;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Result, RollupError};
use crate::files::{self, RunPaths};
use crate::join;
use crate::lock::RunLock;
use crate::lookup::{self, CommandLookup, ReverseLookup};
use crate::rollup;
use crate::search::{CursorPager, HttpTransport, SearchQuery, SearchTransport, TimeWindow};
use crate::stats::RunSummary;
use crate::utils::format_number;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// The day the job runs; data is collected for the day before.
    pub run_date: NaiveDate,
    pub skip_fetch: bool,
    pub keep_artifacts: bool,
}

impl RunOptions {
    pub fn data_day(&self) -> NaiveDate {
        self.run_date.pred_opt().unwrap_or(self.run_date)
    }
}

/// Pages every endpoint into a fresh raw extract, one name per row.
pub fn fetch<T: SearchTransport>(
    config: &Config,
    transports: &[T],
    query: &SearchQuery,
    raw: &Path,
    summary: &mut RunSummary,
) -> Result<()> {
    if transports.is_empty() {
        return Err(RollupError::Config("no search endpoints configured".into()));
    }
    files::write_rows(raw, &[])?;

    for transport in transports {
        info!(action = "start", component = "fetch", endpoint = transport.name(), "Collecting records");
        let pager = CursorPager {
            transport,
            query,
            retry: &config.retry,
            index: &config.index,
            field: &config.fqdn_field,
            max_depth: config.max_depth,
        };
        let outcome = pager.run(|names| {
            let rows: Vec<Vec<String>> = names.into_iter().map(|n| vec![n]).collect();
            files::append_rows(raw, &rows)
        });
        match outcome {
            Ok(report) => {
                summary.pages += report.pages;
                summary.raw_records += report.records;
            }
            Err(failure) => {
                // Pages forwarded before the failure are already in the raw extract.
                summary.pages += failure.report.pages;
                summary.raw_records += failure.report.records;
                error!(action = "fail", component = "fetch", endpoint = transport.name(), error = %failure, "Endpoint failed");
                summary.failed_endpoints.push(transport.name().to_string());
            }
        }
    }

    if !summary.failed_endpoints.is_empty() && !config.allow_partial {
        return Err(RollupError::upstream(
            &summary.failed_endpoints.join(","),
            "collection incomplete; set allow_partial to continue with partial data",
        ));
    }
    Ok(())
}

/// Resolve, join, count and roll up one day's raw extract.
pub fn process<L: ReverseLookup + ?Sized>(
    config: &Config,
    paths: &RunPaths,
    day: NaiveDate,
    resolver: &L,
    keep_artifacts: bool,
    summary: &mut RunSummary,
) -> Result<()> {
    let mut rows = files::read_rows(&paths.raw)?;

    let pairs = lookup::resolve_all(
        rows.iter().filter_map(|r| r.first().map(String::as_str)),
        resolver,
    );
    summary.resolved = pairs.len();
    let mapping_rows: Vec<Vec<String>> = pairs
        .iter()
        .map(|p| vec![p.reverse.clone(), p.forward.clone()])
        .collect();
    files::write_rows(&paths.mapping, &mapping_rows)?;

    let mapping = join::build_mapping(&pairs);
    let replaced = join::replace_names(&mut rows, &mapping);
    info!(action = "replace", component = "join", replaced, "Replaced reverse names");

    let mut daily = join::count_daily(&rows);
    let reference = join::load_reference(&config.reference_path())?;
    summary.matched_rows = join::attach_providers(&mut daily, &reference);
    summary.daily_rows = daily.len();

    let daily_rows: Vec<Vec<String>> = daily.iter().map(|r| r.to_record()).collect();
    files::write_rows(&paths.daily, &daily_rows)?;

    rollup::append_with_header(&paths.month, &daily_rows)?;
    summary.month_rows = rollup::reaggregate(&paths.month)?;

    if rollup::is_month_end(day) {
        info!(action = "month_end", component = "rollup", day = %day, "Last day of month, folding into yearly file");
        summary.year_rows = Some(rollup::fold_month_into_year(&paths.month, &paths.year)?);
    }

    if keep_artifacts {
        info!(action = "skip", component = "cleanup", "Keeping per-day artifacts");
    } else {
        files::remove_files(&paths.transient());
    }
    Ok(())
}

/// The whole run against arbitrary collaborators.
pub fn run_with<T, L>(
    config: &Config,
    options: &RunOptions,
    transports: &[T],
    resolver: &L,
) -> Result<RunSummary>
where
    T: SearchTransport,
    L: ReverseLookup + ?Sized,
{
    let total_start_time = Instant::now();
    let day = options.data_day();
    let paths = RunPaths::new(&config.work_dir, day);
    let _lock = RunLock::acquire(&config.work_dir)?;
    info!(action = "start", component = "pipeline", day = %day, work_dir = ?config.work_dir, "Starting DNS rollup");

    let mut summary = RunSummary {
        day: Some(day),
        ..RunSummary::default()
    };

    if options.skip_fetch {
        if !paths.raw.exists() {
            return Err(RollupError::io(
                &paths.raw,
                std::io::Error::new(std::io::ErrorKind::NotFound, "raw extract missing"),
            ));
        }
        summary.raw_records = files::read_rows(&paths.raw)?.len();
        warn!(action = "skip", component = "fetch", file_path = ?paths.raw, records = summary.raw_records, "Reusing existing raw extract");
    } else {
        let query = SearchQuery::from_config(config, TimeWindow::previous_day(options.run_date));
        fetch(config, transports, &query, &paths.raw, &mut summary)?;
    }

    process(config, &paths, day, resolver, options.keep_artifacts, &mut summary)?;

    info!(
        action = "complete",
        component = "pipeline",
        duration_ms = total_start_time.elapsed().as_millis(),
        "DNS rollup completed"
    );
    Ok(summary)
}

/// The whole run against the configured search endpoints and lookup command.
pub fn run(config: &Config, options: &RunOptions) -> Result<RunSummary> {
    let transports = config
        .endpoints
        .iter()
        .cloned()
        .map(|endpoint| HttpTransport::new(endpoint, config.timeout()))
        .collect::<Result<Vec<_>>>()?;
    let resolver = CommandLookup::new(&config.lookup)?;
    run_with(config, options, &transports, &resolver)
}

pub fn print_run_summary(summary: &RunSummary) {
    match summary.day {
        Some(day) => println!("\n--- DNS Rollup for {} ---", day.format("%B %-d, %Y")),
        None => println!("\n--- DNS Rollup ---"),
    }
    println!("Pages fetched: {}", format_number(summary.pages as u64));
    println!("Raw records: {}", format_number(summary.raw_records as u64));
    println!("Reverse names resolved: {}", format_number(summary.resolved as u64));
    println!(
        "Daily names: {} ({} matched to a provider)",
        format_number(summary.daily_rows as u64),
        format_number(summary.matched_rows as u64)
    );
    println!("Names in month file: {}", format_number(summary.month_rows as u64));
    if let Some(year_rows) = summary.year_rows {
        println!("Names in yearly file: {}", format_number(year_rows as u64));
    }
    if !summary.failed_endpoints.is_empty() {
        println!("Failed endpoints: {}", summary.failed_endpoints.join(", "));
    }
}
