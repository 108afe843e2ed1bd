//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Every way an estimation run can fail. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum CensusError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported read length {length}; choose one of {supported:?}")]
    UnsupportedReadLength { length: usize, supported: Vec<usize> },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid format in '{}' at line {line}: {detail}", path.display())]
    Format {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("database search failed: {0}")]
    Search(String),

    #[error("no marker gene family has non-zero coverage; cannot estimate genome size")]
    NoCoverage,

    #[error("all {candidates} model predictions were rejected as outliers")]
    AllOutliers { candidates: usize },
}

impl CensusError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CensusError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(path: impl Into<PathBuf>, line: usize, detail: impl Into<String>) -> Self {
        CensusError::Format {
            path: path.into(),
            line,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CensusError>;
