//! Generated baselines.
//!
//! A baseline generator mimics the timing of a right-oriented template
//! series using baseline-oriented source data. Generators are created per
//! set of baseline features by a [`GeneratorFactory`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;
use wres_datamodel::{Event, Feature, MissingValue, TimeScale, TimeSeries, needs_upscaling, slicer};
use wres_rescale::Upscaler;
use wres_retrieval::{RetrieverFactory, collect};

use crate::error::PoolError;

/// Generates baseline values shaped like a template series.
pub trait BaselineGenerator<T>: Send + Sync {
    /// Generates a series for the template's feature and valid times.
    ///
    /// # Errors
    ///
    /// Returns a [`PoolError`] if the source data cannot be used.
    fn generate(&self, template: &TimeSeries<T>) -> Result<TimeSeries<T>, PoolError>;
}

/// Creates a generator for a set of baseline features.
pub type GeneratorFactory<T> =
    Arc<dyn Fn(&BTreeSet<Feature>) -> Result<Arc<dyn BaselineGenerator<T>>, PoolError> + Send + Sync>;

#[derive(Debug, Clone)]
struct Source {
    events: Vec<Event<f64>>,
    unit: String,
}

/// Persists the `lag`-th most recent source value.
///
/// For a forecast template (one with a reference time) the persisted value
/// is the `lag`-th most recent source value at or before the reference time,
/// repeated at every template valid time; if that value is missing the
/// result is empty. For other templates each valid time receives the
/// `lag`-th most recent source value strictly before it, and times whose
/// persisted value is missing are skipped. Values keep the source unit.
#[derive(Debug, Clone)]
pub struct PersistenceGenerator {
    sources: BTreeMap<Feature, Source>,
    lag: usize,
}

impl PersistenceGenerator {
    /// Creates a generator from source series, upscaling them to `desired`
    /// when their scale differs.
    ///
    /// Several series for one feature are merged; where they overlap the
    /// first series wins.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if `lag` is zero or a source
    /// needs upscaling without an upscaler, and propagates rescaling errors.
    pub fn new(
        source: Vec<TimeSeries<f64>>,
        lag: usize,
        desired: Option<&TimeScale>,
        upscaler: Option<&dyn Upscaler<f64>>,
    ) -> Result<Self, PoolError> {
        if lag == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "the persistence lag must be >= 1".into(),
            });
        }

        let mut merged: BTreeMap<Feature, (BTreeMap<DateTime<Utc>, f64>, String)> = BTreeMap::new();
        for series in source {
            let series = match desired {
                Some(d) if needs_upscaling(series.metadata().time_scale(), Some(d)) => {
                    let upscaler = upscaler.ok_or_else(|| PoolError::InvalidConfig {
                        reason: format!(
                            "the persistence source for {} must be upscaled to {d}, but no upscaler was supplied",
                            series.metadata().feature()
                        ),
                    })?;
                    let unit = series.metadata().unit().to_string();
                    upscaler.upscale(series, d, &BTreeSet::new(), &unit)?.into_parts().0
                }
                _ => series,
            };
            let (metadata, events) = series.into_parts();
            let (values, _) = merged
                .entry(metadata.feature().clone())
                .or_insert_with(|| (BTreeMap::new(), metadata.unit().to_string()));
            for event in events {
                values.entry(event.time()).or_insert(*event.value());
            }
        }

        let sources = merged
            .into_iter()
            .map(|(feature, (values, unit))| {
                let events = values.into_iter().map(|(t, v)| Event::new(t, v)).collect();
                (feature, Source { events, unit })
            })
            .collect();
        Ok(Self { sources, lag })
    }

    /// Returns the lag.
    pub fn lag(&self) -> usize {
        self.lag
    }

    fn persisted(&self, events: &[Event<f64>], end: usize) -> Option<f64> {
        end.checked_sub(self.lag)
            .map(|i| *events[i].value())
            .filter(|v| !v.is_missing())
    }
}

impl BaselineGenerator<f64> for PersistenceGenerator {
    fn generate(&self, template: &TimeSeries<f64>) -> Result<TimeSeries<f64>, PoolError> {
        let feature = template.metadata().feature();
        let Some(source) = self.sources.get(feature) else {
            debug!(%feature, "no persistence source data for feature");
            return Ok(TimeSeries::empty(template.metadata().clone()));
        };
        let metadata = template.metadata().clone().with_unit(source.unit.clone());
        let events = &source.events;

        let generated: Vec<Event<f64>> = match template.metadata().reference_time() {
            Some(reference) => {
                let end = events.partition_point(|e| e.time() <= reference);
                match self.persisted(events, end) {
                    Some(v) => template.valid_times().map(|t| Event::new(t, v)).collect(),
                    None => Vec::new(),
                }
            }
            None => template
                .valid_times()
                .filter_map(|t| {
                    let end = events.partition_point(|e| e.time() < t);
                    self.persisted(events, end).map(|v| Event::new(t, v))
                })
                .collect(),
        };
        Ok(TimeSeries::new(metadata, generated)?)
    }
}

/// Returns a factory of persistence generators over baseline data.
///
/// Each invocation retrieves every time for the requested baseline features,
/// shifts the valid times by `time_shift` and builds a
/// [`PersistenceGenerator`].
pub fn persistence_factory(
    retrievers: Arc<dyn RetrieverFactory<f64, f64, f64>>,
    lag: usize,
    desired: Option<TimeScale>,
    upscaler: Option<Arc<dyn Upscaler<f64>>>,
    time_shift: TimeDelta,
) -> GeneratorFactory<f64> {
    Arc::new(
        move |features: &BTreeSet<Feature>| -> Result<Arc<dyn BaselineGenerator<f64>>, PoolError> {
            let source = collect(retrievers.baseline_retriever(features, None).retrieve()?)?
                .into_iter()
                .map(|s| slicer::apply_offset_to_valid_times(s, time_shift))
                .collect::<Result<Vec<_>, _>>()?;
            debug!(n_series = source.len(), lag, "building persistence generator");
            let generator = PersistenceGenerator::new(source, lag, desired.as_ref(), upscaler.as_deref())?;
            Ok(Arc::new(generator))
        },
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use wres_datamodel::{ReferenceTimeType, TimeScaleFunction, TimeSeriesMetadata};
    use wres_rescale::BasicUpscaler;

    use super::*;

    fn t(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::hours(hour)
    }

    fn source(values: &[(i64, f64)]) -> TimeSeries<f64> {
        let meta = TimeSeriesMetadata::new(Feature::new("B"), "Q", "CFS");
        TimeSeries::new(meta, values.iter().map(|(h, v)| Event::new(t(*h), *v)).collect()).unwrap()
    }

    fn template(hours: &[i64], reference: Option<i64>) -> TimeSeries<f64> {
        let mut meta = TimeSeriesMetadata::new(Feature::new("B"), "Q", "CMS");
        if let Some(r) = reference {
            meta = meta.with_reference_time(ReferenceTimeType::T0, t(r));
        }
        TimeSeries::new(meta, hours.iter().map(|h| Event::new(t(*h), 0.0)).collect()).unwrap()
    }

    fn values(series: &TimeSeries<f64>) -> Vec<(i64, f64)> {
        series
            .events()
            .iter()
            .map(|e| ((e.time() - t(0)).num_hours(), *e.value()))
            .collect()
    }

    #[test]
    fn forecast_template_persists_value_at_reference_time() {
        let g = PersistenceGenerator::new(vec![source(&[(1, 1.0), (2, 2.0), (3, 3.0)])], 1, None, None).unwrap();
        let out = g.generate(&template(&[3, 4, 5], Some(2))).unwrap();
        assert_eq!(values(&out), vec![(3, 2.0), (4, 2.0), (5, 2.0)]);
        assert_eq!(out.metadata().unit(), "CFS");
    }

    #[test]
    fn lag_two_persists_older_value() {
        let g = PersistenceGenerator::new(vec![source(&[(1, 1.0), (2, 2.0), (3, 3.0)])], 2, None, None).unwrap();
        let out = g.generate(&template(&[3], Some(2))).unwrap();
        assert_eq!(values(&out), vec![(3, 1.0)]);
    }

    #[test]
    fn missing_persisted_value_gives_empty_series() {
        let g = PersistenceGenerator::new(vec![source(&[(1, f64::NAN)])], 1, None, None).unwrap();
        assert!(g.generate(&template(&[3], Some(2))).unwrap().is_empty());
    }

    #[test]
    fn simulation_template_persists_previous_value() {
        let g = PersistenceGenerator::new(vec![source(&[(1, 1.0), (2, 2.0), (3, 3.0)])], 1, None, None).unwrap();
        let out = g.generate(&template(&[1, 2, 3], None)).unwrap();
        assert_eq!(values(&out), vec![(2, 1.0), (3, 2.0)]);
    }

    #[test]
    fn unknown_feature_gives_empty_series() {
        let g = PersistenceGenerator::new(vec![source(&[(1, 1.0)])], 1, None, None).unwrap();
        let mut other = template(&[2], None);
        other = other.map_metadata(|m| m.with_feature(Feature::new("Q")));
        assert!(g.generate(&other).unwrap().is_empty());
    }

    #[test]
    fn zero_lag_rejected() {
        assert!(PersistenceGenerator::new(Vec::new(), 0, None, None).is_err());
    }

    #[test]
    fn source_upscaled_to_desired_scale() {
        let hourly = TimeScale::new(TimeDelta::hours(1), TimeScaleFunction::Mean).unwrap();
        let six = TimeScale::new(TimeDelta::hours(6), TimeScaleFunction::Mean).unwrap();
        let s = source(&(1..=12).map(|h| (h, h as f64)).collect::<Vec<_>>())
            .map_metadata(|m| m.with_time_scale(Some(hourly)));
        assert!(PersistenceGenerator::new(vec![s.clone()], 1, Some(&six), None).is_err());
        let g = PersistenceGenerator::new(vec![s], 1, Some(&six), Some(&BasicUpscaler::new())).unwrap();
        let out = g.generate(&template(&[13], Some(12))).unwrap();
        assert_eq!(values(&out), vec![(13, 9.5)]);
    }
}
