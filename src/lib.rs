pub mod args;
pub mod config;
pub mod domain;
pub mod error;
pub mod files;
pub mod join;
pub mod lock;
pub mod lookup;
pub mod pipeline;
pub mod retry;
pub mod rollup;
pub mod search;
pub mod stats;
pub mod tree;
pub mod utils;

pub use args::Args;
pub use config::Config;
pub use error::{Result, RollupError};
pub use pipeline::{run, run_with, RunOptions};
pub use stats::{AggregatedRow, RunSummary};
