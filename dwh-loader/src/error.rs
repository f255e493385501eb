use dwh::error::DwhError;
use dwh_config::LoadConfigError;
use dwh_config::shared::ValidationError;
use dwh_telemetry::tracing::TracingError;
use thiserror::Error;

/// Result type of the loader binary.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Failures that stop the loader before or outside of per-table processing.
///
/// Per-table failures are reported in the run report instead.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("configuration error: {0}")]
    Config(#[from] LoadConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to initialize logging: {0}")]
    Tracing(#[from] TracingError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Dwh(#[from] DwhError),

    #[error("failed to serialize the run report: {0}")]
    Report(#[from] serde_json::Error),
}
