//! Time breakdown across records.

use serde::Serialize;

use crate::record::{format_hms, format_hours, RecordId, TimerRecord};

/// One activity's part of the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    /// Record the slice belongs to.
    pub id: RecordId,
    /// Record name, or `Item {id}` when the name is empty.
    pub label: String,
    /// Time accumulated by the record.
    pub accumulated_ms: u64,
    /// Percentage of the overall total, in `0.0..=100.0`.
    pub share: f64,
}

impl Slice {
    /// The share formatted with one decimal and a percent sign.
    #[must_use]
    pub fn share_display(&self) -> String {
        format!("{:.1}%", self.share)
    }
}

/// Summary of all records.
///
/// Records with no time are counted but get no slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    /// Sum of accumulated time over every record.
    pub total_ms: u64,
    /// Number of records, including empty ones.
    pub record_count: usize,
    /// Records with time, largest first.
    pub slices: Vec<Slice>,
}

impl Breakdown {
    /// Summarise a set of records.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_records(records: &[TimerRecord]) -> Self {
        let total_ms = records
            .iter()
            .fold(0u64, |sum, r| sum.saturating_add(r.accumulated_ms));

        let mut slices: Vec<Slice> = records
            .iter()
            .filter(|r| r.accumulated_ms > 0)
            .map(|r| Slice {
                id: r.id,
                label: label_for(r),
                accumulated_ms: r.accumulated_ms,
                share: r.accumulated_ms as f64 / total_ms as f64 * 100.0,
            })
            .collect();

        slices.sort_by(|a, b| {
            b.accumulated_ms
                .cmp(&a.accumulated_ms)
                .then_with(|| a.id.cmp(&b.id))
        });

        Self {
            total_ms,
            record_count: records.len(),
            slices,
        }
    }

    /// Whether no record has any time.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Records with time.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.slices.len()
    }

    /// Mean time over records that have any, or 0.
    #[must_use]
    pub fn average_ms(&self) -> u64 {
        match u64::try_from(self.active_count()) {
            Ok(0) | Err(_) => 0,
            Ok(n) => self.total_ms / n,
        }
    }

    /// Total as `HH:MM:SS`.
    #[must_use]
    pub fn total_display(&self) -> String {
        format_hms(self.total_ms)
    }

    /// Total in hours with one decimal.
    #[must_use]
    pub fn total_hours(&self) -> String {
        format_hours(self.total_ms)
    }
}

fn label_for(record: &TimerRecord) -> String {
    if record.name.is_empty() {
        format!("Item {}", record.id)
    } else {
        record.name.clone()
    }
}
