//! Upscaling of ensemble time series, member by member.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use wres_datamodel::{Ensemble, Event, TimeScale, TimeSeries};

use crate::basic::aggregate;
use crate::error::RescaleError;
use crate::upscaler::{Upscaler, upscale_with};
use crate::validation::RescaledSeries;

/// Upscales ensemble series by aggregating each member independently.
///
/// An interval whose ensembles differ in size cannot be combined and is
/// skipped with a validation event.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsembleUpscaler;

impl EnsembleUpscaler {
    /// Creates an upscaler.
    pub fn new() -> Self {
        Self
    }
}

impl Upscaler<Ensemble> for EnsembleUpscaler {
    #[tracing::instrument(skip_all, fields(feature = %series.metadata().feature()))]
    fn upscale(
        &self,
        series: TimeSeries<Ensemble>,
        desired: &TimeScale,
        ends_at: &BTreeSet<DateTime<Utc>>,
        desired_unit: &str,
    ) -> Result<RescaledSeries<Ensemble>, RescaleError> {
        upscale_with(series, desired, ends_at, desired_unit, |function, group: &[Event<Ensemble>]| {
            let first = group.first()?.value();
            let size = first.size();
            if group.iter().any(|e| e.value().size() != size) {
                return None;
            }
            let members = (0..size)
                .map(|m| aggregate(function, group.iter().map(|e| e.value().members()[m])))
                .collect();
            match first.labels() {
                Some(labels) => Ensemble::with_labels(members, labels.to_vec()).ok(),
                None => Some(Ensemble::new(members)),
            }
        })
    }
}
