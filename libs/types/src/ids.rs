//! Identifier types for journal entries
//!
//! An entry is identified by the instant it was recorded. Journal order is
//! document order, so two entries recorded in the same millisecond share an
//! identifier without ambiguity during replay.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::format_date;

/// Unique identifier for a journal entry
///
/// Wraps the entry timestamp in UTC milliseconds. Displays in the journal
/// date format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    /// Create from a millisecond timestamp
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Get the millisecond timestamp
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// The instant this identifier encodes, if it is representable
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl From<DateTime<Utc>> for EntryId {
    fn from(instant: DateTime<Utc>) -> Self {
        Self(instant.timestamp_millis())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instant() {
            Some(instant) => write!(f, "{}", format_date(&instant)),
            None => write!(f, "{}", self.0),
        }
    }
}
