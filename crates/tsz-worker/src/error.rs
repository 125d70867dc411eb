use thiserror::Error;
use tsz_common::FormatError;
use tsz_incremental::IncrementalError;

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("checker I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed checker message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid frame header: {0}")]
    InvalidHeader(String),

    #[error("frame of {len} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { len: usize, limit: usize },

    #[error("failed to start checker '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The worker process exited or its pipes closed before answering.
    #[error("checker worker exited")]
    WorkerExited,

    /// The worker answered with `success: false`.
    #[error("checker request failed ({kind}): {message}")]
    Remote { kind: String, message: String },

    #[error("checker received a request before Init")]
    NotInitialized,

    #[error("invalid reportFiles pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    #[error(transparent)]
    Incremental(#[from] IncrementalError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl CheckerError {
    /// Stable name sent as `kind` in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckerError::Io(_) => "Io",
            CheckerError::Json(_) => "InvalidRequest",
            CheckerError::InvalidHeader(_) | CheckerError::FrameTooLarge { .. } => "Framing",
            CheckerError::Spawn { .. } => "Spawn",
            CheckerError::WorkerExited => "WorkerExited",
            CheckerError::Remote { .. } => "Remote",
            CheckerError::NotInitialized => "NotInitialized",
            CheckerError::InvalidPattern(_) => "InvalidPattern",
            CheckerError::Incremental(err) => match err {
                IncrementalError::FileRead { .. } => "FileRead",
                IncrementalError::Resolution { .. } => "Resolution",
                IncrementalError::EmitMissingOutput { .. } => "EmitMissingOutput",
                IncrementalError::EmitSkipped { .. } => "EmitSkipped",
                IncrementalError::Oracle(_) => "Oracle",
            },
            CheckerError::Format(_) => "Format",
        }
    }

    /// `true` when the remote side reported that nothing was emitted.
    pub fn is_missing_output(&self) -> bool {
        match self {
            CheckerError::Remote { kind, .. } => kind == "EmitMissingOutput" || kind == "EmitSkipped",
            CheckerError::Incremental(err) => err.is_missing_output(),
            _ => false,
        }
    }
}
