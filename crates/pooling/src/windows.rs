//! Time windows generated from a lead-duration pooling sequence.

use chrono::TimeDelta;
use wres_datamodel::TimeWindow;

use crate::error::PoolError;

/// Generates lead-duration time windows.
///
/// Each window spans `(lower, lower + period]` for `lower` starting at
/// `minimum` and advancing by `frequency`, while the upper bound does not
/// exceed `maximum`. Windows inherit the reference-time and valid-time
/// bounds of the base window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindowGenerator {
    period: TimeDelta,
    frequency: TimeDelta,
    minimum: TimeDelta,
    maximum: TimeDelta,
    base: TimeWindow,
}

impl TimeWindowGenerator {
    /// Creates a generator of back-to-back windows of `period` between
    /// `minimum` and `maximum`.
    ///
    /// Defaults:
    /// - frequency: `period`
    /// - base window: unbounded
    pub fn new(period: TimeDelta, minimum: TimeDelta, maximum: TimeDelta) -> Self {
        Self {
            period,
            frequency: period,
            minimum,
            maximum,
            base: TimeWindow::new(),
        }
    }

    /// Sets the step between consecutive lower bounds.
    pub fn with_frequency(mut self, frequency: TimeDelta) -> Self {
        self.frequency = frequency;
        self
    }

    /// Sets the window whose reference-time and valid-time bounds every
    /// generated window inherits.
    pub fn with_base(mut self, base: TimeWindow) -> Self {
        self.base = base;
        self
    }

    // --- Accessors ---

    /// Returns the window period.
    pub fn period(&self) -> TimeDelta {
        self.period
    }

    /// Returns the step between windows.
    pub fn frequency(&self) -> TimeDelta {
        self.frequency
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the period or frequency is not
    /// positive, or the minimum exceeds the maximum.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.period <= TimeDelta::zero() {
            return Err(PoolError::InvalidConfig {
                reason: format!("the lead-duration pool period must be positive, got {}", self.period),
            });
        }
        if self.frequency <= TimeDelta::zero() {
            return Err(PoolError::InvalidConfig {
                reason: format!("the lead-duration pool frequency must be positive, got {}", self.frequency),
            });
        }
        if self.minimum > self.maximum {
            return Err(PoolError::InvalidConfig {
                reason: format!(
                    "the minimum lead duration {} exceeds the maximum {}",
                    self.minimum, self.maximum
                ),
            });
        }
        Ok(())
    }

    /// Generates the windows in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the parameters are invalid or
    /// no complete window fits between the minimum and maximum.
    pub fn windows(&self) -> Result<Vec<TimeWindow>, PoolError> {
        self.validate()?;
        let mut windows = Vec::new();
        let mut lower = self.minimum;
        while let Some(upper) = lower.checked_add(&self.period).filter(|u| *u <= self.maximum) {
            windows.push(self.base.with_lead_durations(lower, upper));
            lower = match lower.checked_add(&self.frequency) {
                Some(next) => next,
                None => break,
            };
        }
        if windows.is_empty() {
            return Err(PoolError::InvalidConfig {
                reason: format!(
                    "no lead-duration pool of period {} fits between {} and {}",
                    self.period, self.minimum, self.maximum
                ),
            });
        }
        Ok(windows)
    }
}
