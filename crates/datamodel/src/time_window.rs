//! Time windows: the reference-time, valid-time and lead-duration bounds of a pool.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::DataModelError;

/// The temporal bounds of one pool.
///
/// Every bound is optional; `None` means unbounded on that side. Lower
/// bounds are exclusive and upper bounds inclusive, so each dimension is the
/// right-closed interval `(earliest, latest]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TimeWindow {
    earliest_reference_time: Option<DateTime<Utc>>,
    latest_reference_time: Option<DateTime<Utc>>,
    earliest_valid_time: Option<DateTime<Utc>>,
    latest_valid_time: Option<DateTime<Utc>>,
    earliest_lead_duration: Option<TimeDelta>,
    latest_lead_duration: Option<TimeDelta>,
}

impl TimeWindow {
    /// Creates a window that is unbounded in every dimension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reference-time bounds.
    pub fn with_reference_times(
        mut self,
        earliest: impl Into<Option<DateTime<Utc>>>,
        latest: impl Into<Option<DateTime<Utc>>>,
    ) -> Self {
        self.earliest_reference_time = earliest.into();
        self.latest_reference_time = latest.into();
        self
    }

    /// Sets the valid-time bounds.
    pub fn with_valid_times(
        mut self,
        earliest: impl Into<Option<DateTime<Utc>>>,
        latest: impl Into<Option<DateTime<Utc>>>,
    ) -> Self {
        self.earliest_valid_time = earliest.into();
        self.latest_valid_time = latest.into();
        self
    }

    /// Sets the lead-duration bounds.
    pub fn with_lead_durations(
        mut self,
        earliest: impl Into<Option<TimeDelta>>,
        latest: impl Into<Option<TimeDelta>>,
    ) -> Self {
        self.earliest_lead_duration = earliest.into();
        self.latest_lead_duration = latest.into();
        self
    }

    // --- Accessors ---

    /// Returns the earliest reference time (exclusive).
    pub fn earliest_reference_time(&self) -> Option<DateTime<Utc>> {
        self.earliest_reference_time
    }

    /// Returns the latest reference time (inclusive).
    pub fn latest_reference_time(&self) -> Option<DateTime<Utc>> {
        self.latest_reference_time
    }

    /// Returns the earliest valid time (exclusive).
    pub fn earliest_valid_time(&self) -> Option<DateTime<Utc>> {
        self.earliest_valid_time
    }

    /// Returns the latest valid time (inclusive).
    pub fn latest_valid_time(&self) -> Option<DateTime<Utc>> {
        self.latest_valid_time
    }

    /// Returns the earliest lead duration (exclusive).
    pub fn earliest_lead_duration(&self) -> Option<TimeDelta> {
        self.earliest_lead_duration
    }

    /// Returns the latest lead duration (inclusive).
    pub fn latest_lead_duration(&self) -> Option<TimeDelta> {
        self.latest_lead_duration
    }

    /// Whether both lead-duration bounds are unbounded.
    pub fn has_unbounded_lead_durations(&self) -> bool {
        self.earliest_lead_duration.is_none() && self.latest_lead_duration.is_none()
    }

    /// Whether both reference-time bounds are unbounded.
    pub fn has_unbounded_reference_times(&self) -> bool {
        self.earliest_reference_time.is_none() && self.latest_reference_time.is_none()
    }

    /// Whether `time` falls within the reference-time bounds.
    pub fn contains_reference_time(&self, time: DateTime<Utc>) -> bool {
        within(time, self.earliest_reference_time, self.latest_reference_time)
    }

    /// Whether `time` falls within the valid-time bounds.
    pub fn contains_valid_time(&self, time: DateTime<Utc>) -> bool {
        within(time, self.earliest_valid_time, self.latest_valid_time)
    }

    /// Whether `lead` falls within the lead-duration bounds.
    pub fn contains_lead_duration(&self, lead: TimeDelta) -> bool {
        within(lead, self.earliest_lead_duration, self.latest_lead_duration)
    }

    /// Returns a copy with the lower valid-time and lead-duration bounds
    /// moved earlier by `period`, so that values needed to upscale the first
    /// admissible instant are retained.
    pub fn widened_by(&self, period: TimeDelta) -> Self {
        let mut widened = *self;
        widened.earliest_valid_time = self
            .earliest_valid_time
            .and_then(|t| t.checked_sub_signed(period));
        widened.earliest_lead_duration = self
            .earliest_lead_duration
            .and_then(|d| d.checked_sub(&period));
        widened
    }

    /// Returns a window bounding valid times only.
    ///
    /// The valid-time bounds are tightened by the reference-time bounds
    /// offset by the lead-duration bounds, where both are present.
    pub fn valid_time_envelope(&self) -> Self {
        let from_leads_lower = match (self.earliest_reference_time, self.earliest_lead_duration) {
            (Some(r), Some(l)) => r.checked_add_signed(l),
            _ => None,
        };
        let from_leads_upper = match (self.latest_reference_time, self.latest_lead_duration) {
            (Some(r), Some(l)) => r.checked_add_signed(l),
            _ => None,
        };
        let earliest = match (self.earliest_valid_time, from_leads_lower) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let latest = match (self.latest_valid_time, from_leads_upper) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self::new().with_valid_times(earliest, latest)
    }

    /// Checks that no lower bound is later than its upper bound.
    pub fn validate(&self) -> Result<(), DataModelError> {
        if let (Some(e), Some(l)) = (self.earliest_reference_time, self.latest_reference_time) {
            if e > l {
                return Err(DataModelError::InvalidTimeWindow {
                    reason: format!("earliest reference time {e} is later than latest {l}"),
                });
            }
        }
        if let (Some(e), Some(l)) = (self.earliest_valid_time, self.latest_valid_time) {
            if e > l {
                return Err(DataModelError::InvalidTimeWindow {
                    reason: format!("earliest valid time {e} is later than latest {l}"),
                });
            }
        }
        if let (Some(e), Some(l)) = (self.earliest_lead_duration, self.latest_lead_duration) {
            if e > l {
                return Err(DataModelError::InvalidTimeWindow {
                    reason: format!("earliest lead duration {e} is longer than latest {l}"),
                });
            }
        }
        Ok(())
    }

    /// Returns the smallest window enclosing every window in `windows`.
    ///
    /// A dimension is unbounded in the union if it is unbounded in any input.
    /// Returns `None` for an empty input.
    pub fn union<'a>(windows: impl IntoIterator<Item = &'a TimeWindow>) -> Option<TimeWindow> {
        let mut iter = windows.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(first, |acc, w| TimeWindow {
            earliest_reference_time: lower(acc.earliest_reference_time, w.earliest_reference_time),
            latest_reference_time: upper(acc.latest_reference_time, w.latest_reference_time),
            earliest_valid_time: lower(acc.earliest_valid_time, w.earliest_valid_time),
            latest_valid_time: upper(acc.latest_valid_time, w.latest_valid_time),
            earliest_lead_duration: lower(acc.earliest_lead_duration, w.earliest_lead_duration),
            latest_lead_duration: upper(acc.latest_lead_duration, w.latest_lead_duration),
        }))
    }
}

/// `(earliest, latest]`, except that equal bounds contain their one instant.
fn within<T: PartialOrd>(value: T, earliest: Option<T>, latest: Option<T>) -> bool {
    latest.as_ref().is_some_and(|l| value == *l)
        || (earliest.is_none_or(|e| value > e) && latest.is_none_or(|l| value <= l))
}

fn lower<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    Some(a?.min(b?))
}

fn upper<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    Some(a?.max(b?))
}

fn show<T: fmt::Display>(bound: &Option<T>) -> String {
    match bound {
        Some(b) => b.to_string(),
        None => "unbounded".to_string(),
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[reference times ({}, {}], valid times ({}, {}], lead durations ({}, {}]]",
            show(&self.earliest_reference_time),
            show(&self.latest_reference_time),
            show(&self.earliest_valid_time),
            show(&self.latest_valid_time),
            show(&self.earliest_lead_duration),
            show(&self.latest_lead_duration),
        )
    }
}
