//! Core record types for yourtime.
//!
//! A [`TimerRecord`] is one named stopwatch as it exists in the record store:
//! an immutable id, a mutable label and the milliseconds accumulated so far.

use serde::{Deserialize, Serialize};

/// Milliseconds in one second.
const MS_PER_SECOND: u64 = 1_000;

/// Milliseconds in one minute.
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;

/// Milliseconds in one hour.
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Store-assigned identifier of a timer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Wrap a raw row id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw row id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// A named stopwatch and its accumulated active time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    /// Identifier assigned by the store on creation.
    pub id: RecordId,

    /// Human-readable label.
    pub name: String,

    /// Milliseconds of elapsed active time.
    pub accumulated_ms: u64,
}

impl TimerRecord {
    /// The accumulated time as `HH:MM:SS`.
    #[must_use]
    pub fn display(&self) -> String {
        format_hms(self.accumulated_ms)
    }
}

/// Format milliseconds as `HH:MM:SS`.
///
/// Hours are not wrapped, so long totals render as e.g. `123:04:05`.
#[must_use]
pub fn format_hms(ms: u64) -> String {
    let hours = ms / MS_PER_HOUR;
    let mins = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let secs = (ms % MS_PER_MINUTE) / MS_PER_SECOND;
    format!("{hours:02}:{mins:02}:{secs:02}")
}

/// Format milliseconds as fractional hours with one decimal, e.g. `1.5`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_hours(ms: u64) -> String {
    format!("{:.1}", ms as f64 / MS_PER_HOUR as f64)
}
