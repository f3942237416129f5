use siteprobe_scanner::ScanError;
use thiserror::Error;

/// Failures that end a run. Everything else is recorded inside the report.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Root page {url} is unreachable: {reason}")]
    RootUnreachable { url: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scanner error: {0}")]
    Scanner(#[from] ScanError),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failure of one analysis stage on one page.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("invalid selector '{0}'")]
    Selector(String),

    #[error("invalid signature pattern: {0}")]
    Signature(String),

    #[error("stage task aborted: {0}")]
    Aborted(String),
}

impl From<tokio::task::JoinError> for StageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StageError::Aborted(err.to_string())
    }
}

pub(crate) fn selector(css: &str) -> std::result::Result<scraper::Selector, StageError> {
    scraper::Selector::parse(css).map_err(|_| StageError::Selector(css.to_string()))
}
