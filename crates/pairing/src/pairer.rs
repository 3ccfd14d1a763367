//! Pairing of a left and a right time series at matching times.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use wres_datamodel::{Event, MissingValue, Pair, TimeSeries};

use crate::error::PairingError;

/// Which times must agree for two events to be paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimePairingType {
    /// Reference times and valid times must both agree.
    ReferenceTimeAndValidTime,
    /// Only valid times must agree.
    #[default]
    ValidTimeOnly,
}

impl TimePairingType {
    /// Chooses reference-time pairing when both sides are forecasts.
    pub fn for_datasets(left_is_forecast: bool, right_is_forecast: bool) -> Self {
        if left_is_forecast && right_is_forecast {
            Self::ReferenceTimeAndValidTime
        } else {
            Self::ValidTimeOnly
        }
    }
}

/// Pairs two time series.
pub trait Pairer<L, R>: Send + Sync {
    /// Pairs `left` with `right`. The result carries the right metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`PairingError`] if the paired series cannot be built.
    fn pair(
        &self,
        left: &TimeSeries<L>,
        right: &TimeSeries<R>,
    ) -> Result<TimeSeries<Pair<L, R>>, PairingError>;
}

type Admissible<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Pairs events whose valid times are exactly equal.
///
/// Values failing the admissibility predicates are not paired.
pub struct ExactTimePairer<L, R> {
    pairing_type: TimePairingType,
    left_admissible: Admissible<L>,
    right_admissible: Admissible<R>,
}

impl<L, R> Clone for ExactTimePairer<L, R> {
    fn clone(&self) -> Self {
        Self {
            pairing_type: self.pairing_type,
            left_admissible: Arc::clone(&self.left_admissible),
            right_admissible: Arc::clone(&self.right_admissible),
        }
    }
}

impl<L, R> fmt::Debug for ExactTimePairer<L, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExactTimePairer")
            .field("pairing_type", &self.pairing_type)
            .finish_non_exhaustive()
    }
}

impl<L, R> ExactTimePairer<L, R> {
    /// Creates a pairer that admits every value.
    pub fn new(pairing_type: TimePairingType) -> Self {
        Self {
            pairing_type,
            left_admissible: Arc::new(|_: &L| true),
            right_admissible: Arc::new(|_: &R| true),
        }
    }

    /// Sets the predicate for admissible left values.
    pub fn with_left_admissible(mut self, f: impl Fn(&L) -> bool + Send + Sync + 'static) -> Self {
        self.left_admissible = Arc::new(f);
        self
    }

    /// Sets the predicate for admissible right values.
    pub fn with_right_admissible(mut self, f: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self {
        self.right_admissible = Arc::new(f);
        self
    }

    /// Returns the pairing type.
    pub fn pairing_type(&self) -> TimePairingType {
        self.pairing_type
    }
}

impl<L, R> ExactTimePairer<L, R>
where
    L: MissingValue,
    R: MissingValue,
{
    /// Creates a pairer that admits only non-missing values on both sides.
    pub fn non_missing(pairing_type: TimePairingType) -> Self {
        Self::new(pairing_type)
            .with_left_admissible(|l: &L| !l.is_missing())
            .with_right_admissible(|r: &R| !r.is_missing())
    }
}

impl<L, R> Pairer<L, R> for ExactTimePairer<L, R>
where
    L: Clone + Send + Sync,
    R: Clone + Send + Sync,
{
    fn pair(
        &self,
        left: &TimeSeries<L>,
        right: &TimeSeries<R>,
    ) -> Result<TimeSeries<Pair<L, R>>, PairingError> {
        let metadata = right.metadata().clone();
        if self.pairing_type == TimePairingType::ReferenceTimeAndValidTime
            && left.metadata().reference_times() != right.metadata().reference_times()
        {
            debug!(
                feature = %right.metadata().feature(),
                "reference times differ, no pairs produced"
            );
            return Ok(TimeSeries::empty(metadata));
        }

        let (l, r) = (left.events(), right.events());
        let (mut i, mut j) = (0, 0);
        let mut pairs = Vec::with_capacity(l.len().min(r.len()));
        let mut inadmissible = 0usize;
        while i < l.len() && j < r.len() {
            let (a, b) = (&l[i], &r[j]);
            match a.time().cmp(&b.time()) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    if (self.left_admissible)(a.value()) && (self.right_admissible)(b.value()) {
                        pairs.push(Event::new(
                            a.time(),
                            Pair::new(a.value().clone(), b.value().clone()),
                        ));
                    } else {
                        inadmissible += 1;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }

        if inadmissible > 0 {
            debug!(
                feature = %right.metadata().feature(),
                inadmissible,
                "skipped pairs with inadmissible values"
            );
        }
        Ok(TimeSeries::new(metadata, pairs)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use wres_datamodel::{Feature, ReferenceTimeType, TimeSeriesMetadata};

    use super::*;

    fn t(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::hours(hour)
    }

    fn series(name: &str, values: &[(i64, f64)], reference: Option<i64>) -> TimeSeries<f64> {
        let mut meta = TimeSeriesMetadata::new(Feature::new(name), "Q", "CMS");
        if let Some(r) = reference {
            meta = meta.with_reference_time(ReferenceTimeType::T0, t(r));
        }
        TimeSeries::new(meta, values.iter().map(|(h, v)| Event::new(t(*h), *v)).collect()).unwrap()
    }

    #[test]
    fn pairs_on_equal_valid_times() {
        let left = series("L", &[(1, 1.0), (2, 2.0), (3, 3.0)], None);
        let right = series("R", &[(2, 20.0), (3, 30.0), (4, 40.0)], Some(0));
        let p = ExactTimePairer::new(TimePairingType::ValidTimeOnly)
            .pair(&left, &right)
            .unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(p.events()[0].value(), &Pair::new(2.0, 20.0));
        assert_eq!(p.metadata().feature().name(), "R");
    }

    #[test]
    fn inadmissible_values_skipped() {
        let left = series("L", &[(1, f64::NAN), (2, 2.0)], None);
        let right = series("R", &[(1, 10.0), (2, 20.0)], None);
        let p = ExactTimePairer::non_missing(TimePairingType::ValidTimeOnly)
            .pair(&left, &right)
            .unwrap();
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn reference_time_mode_requires_matching_references() {
        let left = series("L", &[(1, 1.0)], Some(0));
        let right = series("R", &[(1, 10.0)], Some(1));
        let pairer = ExactTimePairer::new(TimePairingType::ReferenceTimeAndValidTime);
        assert!(pairer.pair(&left, &right).unwrap().is_empty());
        let right = series("R", &[(1, 10.0)], Some(0));
        assert_eq!(pairer.pair(&left, &right).unwrap().len(), 1);
    }

    #[test]
    fn pairing_type_from_datasets() {
        assert_eq!(
            TimePairingType::for_datasets(true, true),
            TimePairingType::ReferenceTimeAndValidTime
        );
        assert_eq!(
            TimePairingType::for_datasets(false, true),
            TimePairingType::ValidTimeOnly
        );
    }
}
