use chrono::NaiveDateTime;
use std::fmt;

/// Position of the incremental cursor of one table.
///
/// Always derived from the destination itself as the maximum of its lineage column.
/// [`Watermark::beginning`] stands for an empty or missing destination and selects every
/// source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Watermark(NaiveDateTime);

impl Watermark {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self(timestamp)
    }

    /// 1970-01-01 00:00:00, older than any lineage timestamp.
    pub fn beginning() -> Self {
        Self(NaiveDateTime::default())
    }

    /// Builds a watermark from an optional maximum, falling back to the beginning.
    pub fn from_max(max: Option<NaiveDateTime>) -> Self {
        max.map(Self).unwrap_or_default()
    }

    pub fn is_beginning(&self) -> bool {
        *self == Self::beginning()
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.0
    }

    /// Returns whether a row stamped `lineage` is newer than this watermark.
    pub fn admits(&self, lineage: NaiveDateTime) -> bool {
        lineage > self.0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S%.f"))
    }
}
