use thiserror::Error;

pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Errors that make the current scan unusable. None of these are retried internally, the caller decides
/// whether to skip the scan or abort
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed byte stream or a file that does not follow the naming conventions
    #[error("Format error: {0}")]
    Format(String),

    #[error("Label count ({labels}) does not match point count ({points})")]
    CountMismatch { points: usize, labels: usize },
}
