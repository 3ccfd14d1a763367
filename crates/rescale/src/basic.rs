//! Upscaling of single-valued time series.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use wres_datamodel::{Event, TimeScale, TimeScaleFunction, TimeSeries};

use crate::error::RescaleError;
use crate::upscaler::{Upscaler, upscale_with};
use crate::validation::RescaledSeries;

/// Aggregates values with `function`.
///
/// Any non-finite input yields NaN. An unknown function is treated as a mean.
pub fn aggregate(function: TimeScaleFunction, values: impl IntoIterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.into_iter().collect();
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    match function {
        TimeScaleFunction::Total => values.iter().sum(),
        TimeScaleFunction::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
        TimeScaleFunction::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        TimeScaleFunction::Mean | TimeScaleFunction::Unknown => {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }
}

/// Upscales single-valued series by aggregating each interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicUpscaler;

impl BasicUpscaler {
    /// Creates an upscaler.
    pub fn new() -> Self {
        Self
    }
}

impl Upscaler<f64> for BasicUpscaler {
    #[tracing::instrument(skip_all, fields(feature = %series.metadata().feature()))]
    fn upscale(
        &self,
        series: TimeSeries<f64>,
        desired: &TimeScale,
        ends_at: &BTreeSet<DateTime<Utc>>,
        desired_unit: &str,
    ) -> Result<RescaledSeries<f64>, RescaleError> {
        upscale_with(series, desired, ends_at, desired_unit, |function, group: &[Event<f64>]| {
            Some(aggregate(function, group.iter().map(|e| *e.value())))
        })
    }
}
