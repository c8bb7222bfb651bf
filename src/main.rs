use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::error;

use dns_rollup::pipeline::print_run_summary;
use dns_rollup::utils::{setup_logging, validate_args};
use dns_rollup::{Args, Config, RunOptions};

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose, args.log_file.as_deref())?;
    validate_args(&args)?;

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))?;
    if let Some(work_dir) = &args.work_dir {
        config.work_dir = work_dir.clone();
    }

    let options = RunOptions {
        run_date: args.date.unwrap_or_else(|| Local::now().date_naive()),
        skip_fetch: args.skip_fetch,
        keep_artifacts: args.keep_artifacts,
    };

    match dns_rollup::run(&config, &options) {
        Ok(summary) => {
            print_run_summary(&summary);
            Ok(())
        }
        Err(e) => {
            error!("Error: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
