use std::path::PathBuf;

use thiserror::Error;
use tsz_incremental::IncrementalError;
use tsz_worker::CheckerError;

pub type Result<T> = std::result::Result<T, LoaderError>;

#[derive(Debug, Error)]
pub enum LoaderError {
    /// Loader options, tsconfig or oracle setup failed.
    #[error("{0:#}")]
    Config(anyhow::Error),

    #[error(transparent)]
    Compile(#[from] IncrementalError),

    #[error(transparent)]
    Checker(#[from] CheckerError),

    /// Strict mode: the host should stop the build.
    #[error("bail: {reason}")]
    Bail {
        file: Option<PathBuf>,
        reason: String,
    },
}

impl LoaderError {
    /// `true` when the compiler produced nothing for the module.
    pub fn is_missing_output(&self) -> bool {
        match self {
            LoaderError::Compile(err) => err.is_missing_output(),
            LoaderError::Checker(err) => err.is_missing_output(),
            LoaderError::Config(_) | LoaderError::Bail { .. } => false,
        }
    }
}
