use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by the compiler oracle itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct OracleError {
    pub message: String,
}

impl OracleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IncrementalError {
    /// The file system read failed; the file is left invalid so a later
    /// analysis retries it.
    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The resolver failed (as opposed to finding nothing).
    #[error("failed to resolve '{specifier}' from {}: {source}", file.display())]
    Resolution {
        file: PathBuf,
        specifier: String,
        #[source]
        source: OracleError,
    },

    /// The program produced no output for the file even after a refresh.
    #[error("no output generated for {}", path.display())]
    EmitMissingOutput { path: PathBuf },

    /// The oracle declined to emit the file.
    #[error("emit skipped for {}", path.display())]
    EmitSkipped { path: PathBuf },

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl IncrementalError {
    /// `true` for the two "nothing was emitted" failures.
    pub fn is_missing_output(&self) -> bool {
        matches!(
            self,
            IncrementalError::EmitMissingOutput { .. } | IncrementalError::EmitSkipped { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IncrementalError>;
