//! Time scales: the period and aggregation function over which a value applies.

use std::fmt;

use chrono::TimeDelta;

use crate::error::DataModelError;

/// Periods at or below this many seconds are treated as instantaneous.
pub const INSTANTANEOUS_SECONDS: i64 = 60;

/// The function used to aggregate values over a time scale period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeScaleFunction {
    /// Aggregation function is not known.
    Unknown,
    /// Mean over the period.
    Mean,
    /// Accumulated total over the period.
    Total,
    /// Minimum over the period.
    Minimum,
    /// Maximum over the period.
    Maximum,
}

impl fmt::Display for TimeScaleFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::Mean => "MEAN",
            Self::Total => "TOTAL",
            Self::Minimum => "MINIMUM",
            Self::Maximum => "MAXIMUM",
        };
        f.write_str(s)
    }
}

/// A calendar month and day, used to anchor seasonal time scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// Creates a month-day.
    ///
    /// # Errors
    ///
    /// Returns [`DataModelError::InvalidTimeScale`] if the month is outside
    /// `1..=12` or the day outside `1..=31`.
    pub fn new(month: u32, day: u32) -> Result<Self, DataModelError> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(DataModelError::InvalidTimeScale {
                reason: format!("invalid month-day: --{month:02}-{day:02}"),
            });
        }
        Ok(Self { month, day })
    }

    /// Returns the month (1-indexed).
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Returns the day of month.
    pub fn day(&self) -> u32 {
        self.day
    }
}

/// The temporal scale of a value: a period and an aggregation function.
///
/// A time scale either has a fixed `period` or is anchored to calendar
/// month-days (e.g. an April-to-July total). The latter never counts as
/// instantaneous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeScale {
    period: Option<TimeDelta>,
    function: TimeScaleFunction,
    start_day: Option<MonthDay>,
    end_day: Option<MonthDay>,
}

impl TimeScale {
    /// Creates a time scale with a fixed period.
    ///
    /// # Errors
    ///
    /// Returns [`DataModelError::InvalidTimeScale`] if the period is not
    /// positive.
    pub fn new(period: TimeDelta, function: TimeScaleFunction) -> Result<Self, DataModelError> {
        if period <= TimeDelta::zero() {
            return Err(DataModelError::InvalidTimeScale {
                reason: format!("the period must be positive, got {period}"),
            });
        }
        Ok(Self {
            period: Some(period),
            function,
            start_day: None,
            end_day: None,
        })
    }

    /// Creates an instantaneous time scale (a one-second period).
    pub fn instantaneous() -> Self {
        Self {
            period: Some(TimeDelta::seconds(1)),
            function: TimeScaleFunction::Unknown,
            start_day: None,
            end_day: None,
        }
    }

    /// Creates a seasonal time scale between two month-days, inclusive.
    pub fn between_month_days(start: MonthDay, end: MonthDay, function: TimeScaleFunction) -> Self {
        Self {
            period: None,
            function,
            start_day: Some(start),
            end_day: Some(end),
        }
    }

    /// Returns the fixed period, if any.
    pub fn period(&self) -> Option<TimeDelta> {
        self.period
    }

    /// Returns the aggregation function.
    pub fn function(&self) -> TimeScaleFunction {
        self.function
    }

    /// Returns the starting month-day of a seasonal scale.
    pub fn start_day(&self) -> Option<MonthDay> {
        self.start_day
    }

    /// Returns the ending month-day of a seasonal scale.
    pub fn end_day(&self) -> Option<MonthDay> {
        self.end_day
    }

    /// Whether this scale is anchored to calendar month-days.
    pub fn has_month_days(&self) -> bool {
        self.start_day.is_some() || self.end_day.is_some()
    }

    /// Whether the period is at most [`INSTANTANEOUS_SECONDS`].
    pub fn is_instantaneous(&self) -> bool {
        match self.period {
            Some(p) => !self.has_month_days() && p <= TimeDelta::seconds(INSTANTANEOUS_SECONDS),
            None => false,
        }
    }
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_instantaneous() {
            return f.write_str("[INSTANTANEOUS]");
        }
        match (self.period, self.start_day, self.end_day) {
            (Some(p), _, _) => write!(f, "[{p},{}]", self.function),
            (None, Some(s), Some(e)) => write!(
                f,
                "[--{:02}-{:02},--{:02}-{:02},{}]",
                s.month, s.day, e.month, e.day, self.function
            ),
            _ => write!(f, "[{}]", self.function),
        }
    }
}

/// Whether both scales are instantaneous or the two are equal.
pub fn equals_or_instantaneous(a: &TimeScale, b: &TimeScale) -> bool {
    (a.is_instantaneous() && b.is_instantaneous()) || a == b
}

/// Whether a series at `existing` scale must be rescaled to reach `desired`.
///
/// Rescaling is not required when both scales are instantaneous, or when the
/// periods match and the functions match or either function is unknown.
pub fn is_rescaling_required(existing: &TimeScale, desired: &TimeScale) -> bool {
    if existing.is_instantaneous() && desired.is_instantaneous() {
        return false;
    }
    if existing.period == desired.period
        && existing.start_day == desired.start_day
        && existing.end_day == desired.end_day
    {
        let either_unknown = existing.function == TimeScaleFunction::Unknown
            || desired.function == TimeScaleFunction::Unknown;
        if existing.function == desired.function || either_unknown {
            return false;
        }
    }
    true
}

/// Whether a series with an `existing` scale needs upscaling to `desired`.
///
/// Both scales must be known, unequal, not both instantaneous, and the pair
/// must call for rescaling under [`is_rescaling_required`].
pub fn needs_upscaling(existing: Option<&TimeScale>, desired: Option<&TimeScale>) -> bool {
    match (existing, desired) {
        (Some(e), Some(d)) => {
            !equals_or_instantaneous(e, d) && is_rescaling_required(e, d)
        }
        _ => false,
    }
}
