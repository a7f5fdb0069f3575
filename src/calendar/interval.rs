//! Half-open `[start, end)` instants and the arithmetic the calendar needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    /// Build an interval, rejecting empty or inverted ones.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SchedulingError> {
        if start >= end {
            return Err(SchedulingError::validation(format!(
                "interval start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Touching intervals (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }

    /// The parts of `self` not covered by any of `busy`, in time order.
    pub fn subtract(&self, busy: &[TimeInterval]) -> Vec<TimeInterval> {
        let mut blockers: Vec<&TimeInterval> = busy.iter().filter(|b| self.overlaps(b)).collect();
        blockers.sort_by_key(|b| b.start);

        let mut free = Vec::new();
        let mut cursor = self.start;
        for blocker in blockers {
            if blocker.end <= cursor {
                continue;
            }
            if blocker.start > cursor {
                free.push(TimeInterval {
                    start: cursor,
                    end: blocker.start,
                });
            }
            cursor = cursor.max(blocker.end);
            if cursor >= self.end {
                break;
            }
        }
        if cursor < self.end {
            free.push(TimeInterval {
                start: cursor,
                end: self.end,
            });
        }
        free
    }
}
