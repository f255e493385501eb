//! Error types and result definitions for warehouse loading.
//!
//! [`DwhError`] carries an [`ErrorKind`] used by the pipeline to decide how a failure is
//! reported, a static description, optional dynamic detail, the originating error and the
//! callsite.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::conversions::numeric::DecimalCastError;

/// Result type used throughout the crate.
pub type DwhResult<T> = Result<T, DwhError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the crate.
#[derive(Debug, Clone)]
pub struct DwhError {
    payload: ErrorPayload,
}

/// Classification of failures.
///
/// Connection and query kinds are split by side: the raw store is the source, the
/// warehouse (staging and dimensional schemas) is the destination.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection Errors
    SourceConnectionFailed,
    DestinationConnectionFailed,

    // Query & Execution Errors
    SourceQueryFailed,
    DestinationQueryFailed,

    // Schema Errors
    SourceTableMissing,
    DestinationTableMissing,
    MissingColumn,
    UnknownTable,

    // Data Errors
    IntegrityViolation,
    MissingDateKey,
    ConversionError,
    InvalidData,

    // State Errors
    InvalidState,

    // Raised by fail points in tests.
    #[cfg(feature = "failpoints")]
    FailpointTriggered,
}

impl ErrorKind {
    /// Returns whether the failure happened while talking to either database.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::SourceConnectionFailed | ErrorKind::DestinationConnectionFailed
        )
    }
}

impl DwhError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the dynamic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches the originating error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        DwhError {
            payload: ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            },
        }
    }
}

impl PartialEq for DwhError {
    fn eq(&self, other: &DwhError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl fmt::Display for DwhError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.payload.kind, self.payload.description)?;
        if let Some(detail) = self.payload.detail.as_deref() {
            for (index, line) in detail.lines().enumerate() {
                if index == 0 {
                    write!(f, ": {line}")?;
                } else {
                    write!(f, "\n  {line}")?;
                }
            }
        }

        Ok(())
    }
}

impl error::Error for DwhError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for DwhError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> DwhError {
        DwhError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for DwhError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> DwhError {
        DwhError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<DecimalCastError> for DwhError {
    #[track_caller]
    fn from(err: DecimalCastError) -> DwhError {
        let detail = err.to_string();
        DwhError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Value does not fit the fixed-precision decimal column"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Side of the database boundary an sqlx error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Source,
    Destination,
}

/// Maps an sqlx error to a kind, using the SQLSTATE of database errors.
///
/// Class `08` is a connection failure, `23` an integrity violation, `22` a data exception,
/// and `42P01`/`42S02` an undefined table.
fn classify_sqlx(err: &sqlx::Error, side: Side) -> (ErrorKind, &'static str) {
    let (connection_failed, query_failed, table_missing) = match side {
        Side::Source => (
            ErrorKind::SourceConnectionFailed,
            ErrorKind::SourceQueryFailed,
            ErrorKind::SourceTableMissing,
        ),
        Side::Destination => (
            ErrorKind::DestinationConnectionFailed,
            ErrorKind::DestinationQueryFailed,
            ErrorKind::DestinationTableMissing,
        ),
    };

    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            let code = code.as_deref().unwrap_or_default();
            match code {
                "42P01" | "42S02" => (table_missing, "Table does not exist"),
                _ if code.starts_with("08") => (connection_failed, "Database connection failed"),
                _ if code.starts_with("23") => (
                    ErrorKind::IntegrityViolation,
                    "Database constraint violated",
                ),
                _ if code.starts_with("22") => (
                    ErrorKind::ConversionError,
                    "Database rejected a value",
                ),
                _ => (query_failed, "Database query failed"),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => (connection_failed, "Database connection failed"),
        sqlx::Error::ColumnNotFound(_) => (ErrorKind::MissingColumn, "Column not found in row"),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            (ErrorKind::ConversionError, "Column value could not be decoded")
        }
        _ => (query_failed, "Database operation failed"),
    }
}

impl DwhError {
    /// Wraps an sqlx error raised while talking to `side`.
    #[track_caller]
    pub(crate) fn from_sqlx(err: sqlx::Error, side: Side) -> DwhError {
        let (kind, description) = classify_sqlx(&err, side);
        let detail = err.to_string();
        DwhError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }

    /// Wraps an sqlx error raised by the raw store.
    #[track_caller]
    pub(crate) fn source_sqlx(err: sqlx::Error) -> DwhError {
        DwhError::from_sqlx(err, Side::Source)
    }
}

/// Converts sqlx errors raised by the warehouse.
///
/// Raw store code uses [`DwhError::source_sqlx`] instead.
impl From<sqlx::Error> for DwhError {
    #[track_caller]
    fn from(err: sqlx::Error) -> DwhError {
        DwhError::from_sqlx(err, Side::Destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dwh_error;

    #[test]
    fn single_error_exposes_kind_and_detail() {
        let err = dwh_error!(
            ErrorKind::MissingDateKey,
            "Date missing from the date dimension",
            "2024-03-31"
        );
        assert_eq!(err.kind(), ErrorKind::MissingDateKey);
        assert_eq!(err.detail(), Some("2024-03-31"));
        assert_eq!(
            err.to_string(),
            "[MissingDateKey] Date missing from the date dimension: 2024-03-31"
        );
    }

    #[test]
    fn multi_line_details_are_indented() {
        let err = dwh_error!(
            ErrorKind::InvalidData,
            "Staged rows are invalid",
            "first row\nsecond row"
        );
        assert_eq!(
            err.to_string(),
            "[InvalidData] Staged rows are invalid: first row\n  second row"
        );
    }

    #[test]
    fn sqlx_pool_errors_are_connection_failures() {
        let err = DwhError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);
        assert!(err.kind().is_connection_error());

        let err = DwhError::source_sqlx(sqlx::Error::PoolClosed);
        assert_eq!(err.kind(), ErrorKind::SourceConnectionFailed);
    }

    #[test]
    fn missing_columns_are_schema_errors() {
        let err = DwhError::from(sqlx::Error::ColumnNotFound("symbol".to_string()));
        assert_eq!(err.kind(), ErrorKind::MissingColumn);
    }
}
