//! Verification scores computed from the pairs of a pool.

use serde::Serialize;

use wres_datamodel::{Ensemble, Pair, PairedPool, TimeSeries};

/// A right-hand value reduced to a single number for scoring.
pub trait PointValue {
    /// Returns the value used for scoring.
    fn point(&self) -> f64;
}

impl PointValue for f64 {
    fn point(&self) -> f64 {
        *self
    }
}

impl PointValue for Ensemble {
    /// The ensemble mean.
    fn point(&self) -> f64 {
        self.mean()
    }
}

/// Scores of one set of pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scores {
    pub sample_size: usize,
    pub mean_error: f64,
    pub mean_absolute_error: f64,
    pub root_mean_square_error: f64,
}

impl Scores {
    /// Scores `(left, right)` pairs, skipping pairs with a non-finite side.
    /// Returns `None` when no pair is usable.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Option<Self> {
        let errors: Vec<f64> = pairs
            .iter()
            .filter(|(l, r)| l.is_finite() && r.is_finite())
            .map(|(l, r)| r - l)
            .collect();
        if errors.is_empty() {
            return None;
        }
        let n = errors.len() as f64;
        Some(Self {
            sample_size: errors.len(),
            mean_error: errors.iter().sum::<f64>() / n,
            mean_absolute_error: errors.iter().map(|e| e.abs()).sum::<f64>() / n,
            root_mean_square_error: (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt(),
        })
    }
}

/// Flattens paired series into `(left, right)` points.
pub fn points<'a, R: PointValue + 'a>(
    series: impl Iterator<Item = &'a TimeSeries<Pair<f64, R>>>,
) -> Vec<(f64, f64)> {
    series
        .flat_map(|s| s.events().iter())
        .map(|e| (*e.value().left(), e.value().right().point()))
        .collect()
}

/// Scores of one statistic at one bootstrap quantile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreQuantile {
    pub probability: f64,
    pub scores: Scores,
}

/// Everything published for one pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatistics {
    pub pool_id: Option<u64>,
    pub feature_group: String,
    pub time_window: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_scale: Option<String>,
    pub main: Scores,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Scores>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uncertainty: Vec<ScoreQuantile>,
}

/// Computes the nominal statistics of a pool, or `None` when the main pairs
/// hold no usable values.
pub fn pool_statistics<R: PointValue>(pool: &PairedPool<f64, R>) -> Option<PoolStatistics> {
    let main = Scores::from_pairs(&points(pool.main_series()))?;
    let baseline = if pool.has_baseline() {
        Scores::from_pairs(&points(pool.baseline_series()))
    } else {
        None
    };
    let metadata = pool.metadata();
    Some(PoolStatistics {
        pool_id: metadata.pool_id(),
        feature_group: metadata.feature_group().name().to_string(),
        time_window: metadata.time_window().to_string(),
        time_scale: metadata.time_scale().map(ToString::to_string),
        main,
        baseline,
        uncertainty: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_relative_eq;
    use chrono::{TimeDelta, TimeZone, Utc};
    use wres_datamodel::{
        Evaluation, Event, Feature, FeatureGroup, FeatureTuple, PoolBuilder, PoolMetadata, TimeSeriesMetadata,
        TimeWindow,
    };

    use super::*;

    fn series<R>(pairs: Vec<(f64, R)>) -> TimeSeries<Pair<f64, R>> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TimeSeries::new(
            TimeSeriesMetadata::new(Feature::new("A"), "Q", "CMS"),
            pairs
                .into_iter()
                .enumerate()
                .map(|(i, (l, r))| Event::new(t0 + TimeDelta::hours(i as i64 + 1), Pair::new(l, r)))
                .collect(),
        )
        .unwrap()
    }

    fn metadata() -> PoolMetadata {
        let group = FeatureGroup::singleton(FeatureTuple::new(Feature::new("A"), Feature::new("A"), None));
        PoolMetadata::new(Arc::new(Evaluation::new("CMS")), group, TimeWindow::new()).with_pool_id(Some(7))
    }

    #[test]
    fn scores_of_known_errors() {
        // errors: +1, -3
        let scores = Scores::from_pairs(&[(1.0, 2.0), (4.0, 1.0)]).unwrap();
        assert_eq!(scores.sample_size, 2);
        assert_relative_eq!(scores.mean_error, -1.0);
        assert_relative_eq!(scores.mean_absolute_error, 2.0);
        assert_relative_eq!(scores.root_mean_square_error, 5.0_f64.sqrt());
    }

    #[test]
    fn missing_pairs_skipped() {
        let scores = Scores::from_pairs(&[(1.0, f64::NAN), (2.0, 2.0)]).unwrap();
        assert_eq!(scores.sample_size, 1);
        assert!(Scores::from_pairs(&[(f64::NAN, 1.0)]).is_none());
        assert!(Scores::from_pairs(&[]).is_none());
    }

    #[test]
    fn ensemble_scored_by_mean() {
        let s = series(vec![(1.0, Ensemble::new(vec![1.0, 3.0]))]);
        let pts = points(std::iter::once(&s));
        assert_eq!(pts, vec![(1.0, 2.0)]);
    }

    #[test]
    fn pool_statistics_carry_metadata() {
        let pool = PoolBuilder::new()
            .metadata(metadata())
            .main([series(vec![(1.0, 1.5), (2.0, 2.5)])])
            .build()
            .unwrap();
        let stats = pool_statistics(&pool).unwrap();
        assert_eq!(stats.pool_id, Some(7));
        assert_eq!(stats.feature_group, "A-A");
        assert_relative_eq!(stats.main.mean_error, 0.5);
        assert!(stats.baseline.is_none());
    }
}
