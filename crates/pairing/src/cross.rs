//! Cross-pairing: trimming two lists of time series to their common times.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::debug;
use wres_datamodel::{ReferenceTimeType, TimeSeries};

use crate::error::PairingError;

/// How series are matched across the two lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrossPairMethod {
    /// Only series with identical reference times match.
    Exact,
    /// Identical reference times match when available, otherwise the
    /// series with the nearest reference time.
    #[default]
    Fuzzy,
}

/// Which lists are cross-paired against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrossPairScope {
    /// Each feature's main pairs are trimmed against its own baseline pairs.
    #[default]
    WithinFeatures,
    /// All features and the baseline are trimmed to one common set of times.
    AcrossFeatures,
}

/// A declared cross-pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CrossPair {
    method: CrossPairMethod,
    scope: CrossPairScope,
}

impl CrossPair {
    /// Creates a cross-pairing declaration.
    pub fn new(method: CrossPairMethod, scope: CrossPairScope) -> Self {
        Self { method, scope }
    }

    /// Returns the matching method.
    pub fn method(&self) -> CrossPairMethod {
        self.method
    }

    /// Returns the scope.
    pub fn scope(&self) -> CrossPairScope {
        self.scope
    }
}

/// The two trimmed lists produced by cross-pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossPairs<T> {
    first: Vec<TimeSeries<T>>,
    second: Vec<TimeSeries<T>>,
}

impl<T> CrossPairs<T> {
    /// Creates a cross-pairing result.
    pub fn new(first: Vec<TimeSeries<T>>, second: Vec<TimeSeries<T>>) -> Self {
        Self { first, second }
    }

    /// Returns the trimmed first list.
    pub fn first(&self) -> &[TimeSeries<T>] {
        &self.first
    }

    /// Returns the trimmed second list.
    pub fn second(&self) -> &[TimeSeries<T>] {
        &self.second
    }

    /// Consumes the result, returning `(first, second)`.
    pub fn into_parts(self) -> (Vec<TimeSeries<T>>, Vec<TimeSeries<T>>) {
        (self.first, self.second)
    }
}

/// Trims two lists of time series to their common times.
pub trait CrossPairer<T>: Send + Sync {
    /// Cross-pairs `first` against `second`.
    ///
    /// # Errors
    ///
    /// Returns a [`PairingError`] if the lists cannot be matched.
    fn cross_pair(
        &self,
        first: &[TimeSeries<T>],
        second: &[TimeSeries<T>],
    ) -> Result<CrossPairs<T>, PairingError>;
}

/// Cross-pairs by matching series on reference time, then intersecting
/// valid times.
///
/// Matching is symmetric: each side is trimmed against the untrimmed other
/// side. A series in one list may match several in the other. Series left
/// with no events are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSeriesCrossPairer {
    method: CrossPairMethod,
}

impl TimeSeriesCrossPairer {
    /// Creates a cross-pairer.
    pub fn new(method: CrossPairMethod) -> Self {
        Self { method }
    }

    /// Returns the matching method.
    pub fn method(&self) -> CrossPairMethod {
        self.method
    }

    fn trim<T: Clone>(
        &self,
        series: &[TimeSeries<T>],
        against: &[TimeSeries<T>],
    ) -> Vec<TimeSeries<T>> {
        series
            .iter()
            .filter_map(|s| {
                let times = self.matching_valid_times(s, against);
                let trimmed = s.clone().filter_times(|t| times.contains(&t));
                (!trimmed.is_empty()).then_some(trimmed)
            })
            .collect()
    }

    /// Returns the union of valid times across the series in `against` that
    /// match `series` under this method.
    fn matching_valid_times<T>(
        &self,
        series: &TimeSeries<T>,
        against: &[TimeSeries<T>],
    ) -> BTreeSet<DateTime<Utc>> {
        let references = series.metadata().reference_times();
        let exact: Vec<&TimeSeries<T>> = against
            .iter()
            .filter(|o| o.metadata().reference_times() == references)
            .collect();

        let matched = if !exact.is_empty() || self.method == CrossPairMethod::Exact {
            exact
        } else {
            nearest(series, against)
        };

        matched.iter().flat_map(|o| o.valid_times()).collect()
    }
}

/// Returns the series in `against` whose reference time is nearest to that
/// of `series`, including ties.
fn nearest<'a, T>(series: &TimeSeries<T>, against: &'a [TimeSeries<T>]) -> Vec<&'a TimeSeries<T>> {
    let Some(reference) = series.metadata().reference_time() else {
        return Vec::new();
    };
    let distances: Vec<(i64, &TimeSeries<T>)> = against
        .iter()
        .filter_map(|o| {
            let r = o.metadata().reference_time()?;
            Some(((r - reference).num_milliseconds().abs(), o))
        })
        .collect();
    let Some(min) = distances.iter().map(|(d, _)| *d).min() else {
        return Vec::new();
    };
    distances
        .into_iter()
        .filter(|(d, _)| *d == min)
        .map(|(_, o)| o)
        .collect()
}

fn reference_time_types<T>(series: &[TimeSeries<T>]) -> BTreeSet<ReferenceTimeType> {
    series
        .iter()
        .flat_map(|s| s.metadata().reference_times().keys().copied())
        .collect()
}

impl<T> CrossPairer<T> for TimeSeriesCrossPairer
where
    T: Clone + Send + Sync,
{
    fn cross_pair(
        &self,
        first: &[TimeSeries<T>],
        second: &[TimeSeries<T>],
    ) -> Result<CrossPairs<T>, PairingError> {
        if self.method == CrossPairMethod::Exact {
            let (a, b) = (reference_time_types(first), reference_time_types(second));
            if !a.is_empty() && !b.is_empty() && a.is_disjoint(&b) {
                return Err(PairingError::NoCommonReferenceTimeType {
                    reason: format!("the first list has types {a:?} and the second has types {b:?}"),
                });
            }
        }

        let trimmed_first = self.trim(first, second);
        let trimmed_second = self.trim(second, first);

        debug!(
            method = ?self.method,
            first_in = first.len(),
            first_out = trimmed_first.len(),
            second_in = second.len(),
            second_out = trimmed_second.len(),
            "cross-paired time series"
        );

        Ok(CrossPairs::new(trimmed_first, trimmed_second))
    }
}
