use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RollupError>;

#[derive(Debug, Error)]
pub enum RollupError {
    #[error("upstream {endpoint} failed: {detail}")]
    Upstream {
        endpoint: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("another run holds the lock at {0:?}")]
    LockUnavailable(PathBuf),
}

impl RollupError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn upstream(endpoint: &str, detail: impl ToString) -> Self {
        Self::Upstream {
            endpoint: endpoint.to_string(),
            status: None,
            detail: detail.to_string(),
        }
    }

    /// An upstream reply with a non-success HTTP status.
    pub fn upstream_status(endpoint: &str, status: u16, detail: impl ToString) -> Self {
        Self::Upstream {
            endpoint: endpoint.to_string(),
            status: Some(status),
            detail: detail.to_string(),
        }
    }

    /// Whether a retry could plausibly succeed. Client errors other than
    /// request timeout (408) and rate limiting (429) will not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Upstream {
                status: Some(status),
                ..
            } => !(400..500).contains(status) || *status == 408 || *status == 429,
            Self::Upstream { .. } => true,
            _ => false,
        }
    }
}
