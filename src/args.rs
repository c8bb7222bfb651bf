use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

#[derive(Parser, Debug)]
#[command(
    name = "dns-rollup",
    about = "Collect a day of DNS queries, resolve reverse names and roll counts into month and year files",
    version,
    long_about = None
)]
pub struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Run as if today were this date (YYYY-MM-DD); data is collected for the day before
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Override the configured working directory
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Reuse an existing raw extract instead of querying the search service
    #[arg(long)]
    pub skip_fetch: bool,

    /// Keep the raw extract, mapping and daily files after the run
    #[arg(long)]
    pub keep_artifacts: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
