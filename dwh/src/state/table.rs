use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::bail;
use crate::error::{DwhResult, ErrorKind};

/// Phase a table has reached within one run.
///
/// Phases only move forward. A run that fails keeps the phase it failed in, and every
/// write of the run is rolled back, so the next run starts again at [`TablePhase::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TablePhase {
    Idle,
    ReadingWatermark,
    ExtractingDelta,
    ResolvingKeys,
    Upserting,
    /// Terminal for the run.
    Committed,
}

impl TablePhase {
    pub fn as_static_str(&self) -> &'static str {
        match self {
            TablePhase::Idle => "idle",
            TablePhase::ReadingWatermark => "reading_watermark",
            TablePhase::ExtractingDelta => "extracting_delta",
            TablePhase::ResolvingKeys => "resolving_keys",
            TablePhase::Upserting => "upserting",
            TablePhase::Committed => "committed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TablePhase::Committed)
    }
}

impl fmt::Display for TablePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_static_str())
    }
}

/// Tracks the phase of one table operation.
#[derive(Debug)]
pub struct TableRun {
    table: String,
    phase: TablePhase,
    started_at: Instant,
}

impl TableRun {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            phase: TablePhase::Idle,
            started_at: Instant::now(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn phase(&self) -> TablePhase {
        self.phase
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Moves to `phase`, which may skip phases the operation does not need.
    pub fn advance(&mut self, phase: TablePhase) -> DwhResult<()> {
        if self.phase.is_terminal() || phase <= self.phase {
            bail!(
                ErrorKind::InvalidState,
                "Invalid table phase transition",
                format!("table {} cannot move from {} to {phase}", self.table, self.phase)
            );
        }

        debug!(table = %self.table, from = %self.phase, to = %phase, "table phase changed");
        self.phase = phase;

        Ok(())
    }
}
