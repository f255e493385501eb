use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{DwhError, ErrorKind};
use crate::state::table::{TablePhase, TableRun};

/// Result of one table operation as shown in the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    /// The destination was created or only received new rows.
    Create,
    /// Existing destination rows were overwritten or versioned.
    Update,
    /// Nothing new to apply.
    Skip,
    Error,
}

impl OutcomeStatus {
    pub fn as_static_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Create => "CREATE",
            OutcomeStatus::Update => "UPDATE",
            OutcomeStatus::Skip => "SKIP",
            OutcomeStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_static_str())
    }
}

/// Operation a [`TableOutcome`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Transfer,
    Merge,
}

/// Row counts of a successful table operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub read: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
}

impl RowCounts {
    /// Status of a merge that wrote these counts: any overwritten or versioned row makes
    /// it an update.
    pub fn merge_status(&self) -> OutcomeStatus {
        if self.updated > 0 {
            OutcomeStatus::Update
        } else if self.inserted > 0 {
            OutcomeStatus::Create
        } else {
            OutcomeStatus::Skip
        }
    }
}

/// Status and row counts of a table operation that committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub status: OutcomeStatus,
    pub rows: RowCounts,
}

impl Applied {
    pub fn new(status: OutcomeStatus, rows: RowCounts) -> Self {
        Self { status, rows }
    }

    /// A merge, with its status derived from the counts.
    pub fn merged(rows: RowCounts) -> Self {
        Self::new(rows.merge_status(), rows)
    }
}

/// Per-table entry of a [`RunReport`].
#[derive(Debug, Clone, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub operation: Operation,
    pub status: OutcomeStatus,
    pub phase: TablePhase,
    pub rows: RowCounts,
    pub elapsed_ms: u64,
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableOutcome {
    pub fn succeeded(
        run: &TableRun,
        operation: Operation,
        status: OutcomeStatus,
        rows: RowCounts,
    ) -> Self {
        Self {
            table: run.table().to_string(),
            operation,
            status,
            phase: run.phase(),
            rows,
            elapsed_ms: duration_ms(run.elapsed()),
            kind: None,
            error_kind: None,
            error: None,
        }
    }

    pub fn failed(run: &TableRun, operation: Operation, err: &DwhError) -> Self {
        Self {
            table: run.table().to_string(),
            operation,
            status: OutcomeStatus::Error,
            phase: run.phase(),
            rows: RowCounts::default(),
            elapsed_ms: duration_ms(run.elapsed()),
            kind: Some(err.kind()),
            error_kind: Some(format!("{:?}", err.kind())),
            error: Some(err.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == OutcomeStatus::Error
    }

    /// Returns whether the failure is one the scheduler may retry as is.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_some_and(|kind| kind.is_connection_error())
    }

    /// Writes the outcome to the log, at error level for failures.
    pub fn log(&self) {
        match &self.error {
            Some(error) => error!(
                table = %self.table,
                operation = ?self.operation,
                status = %self.status,
                phase = %self.phase,
                elapsed_ms = self.elapsed_ms,
                error = %error,
                "table failed"
            ),
            None if self.rows.skipped > 0 => warn!(
                table = %self.table,
                operation = ?self.operation,
                status = %self.status,
                rows_read = self.rows.read,
                rows_inserted = self.rows.inserted,
                rows_updated = self.rows.updated,
                rows_skipped = self.rows.skipped,
                elapsed_ms = self.elapsed_ms,
                "table done with skipped rows"
            ),
            None => info!(
                table = %self.table,
                operation = ?self.operation,
                status = %self.status,
                rows_read = self.rows.read,
                rows_inserted = self.rows.inserted,
                rows_updated = self.rows.updated,
                elapsed_ms = self.elapsed_ms,
                "table done"
            ),
        }
    }
}

impl fmt::Display for TableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<34} {:<6} read={} inserted={} updated={} skipped={}",
            self.table,
            self.status.as_static_str(),
            self.rows.read,
            self.rows.inserted,
            self.rows.updated,
            self.rows.skipped
        )?;
        if let Some(error) = &self.error {
            write!(f, " phase={} error={error}", self.phase)?;
        }

        Ok(())
    }
}

/// Outcomes of every table touched by one command, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    outcomes: Vec<TableOutcome>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: TableOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn extend(&mut self, other: RunReport) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn outcomes(&self) -> &[TableOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.outcomes.iter().find(|outcome| outcome.table == table)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TableOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_error())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Logs one summary line followed by the per-table status list.
    pub fn log_summary(&self) {
        let failed = self.failures().count();
        let total = self.outcomes.len();
        let summary = self
            .outcomes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        if failed > 0 {
            error!(tables = total, failed, "run finished with failures\n{summary}");
        } else {
            info!(tables = total, "run finished\n{summary}");
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
