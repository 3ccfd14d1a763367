//! The upscaling capability and the interval logic shared by implementations.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;
use wres_datamodel::{
    Event, TimeScale, TimeScaleFunction, TimeSeries, equals_or_instantaneous, slicer,
};

use crate::error::RescaleError;
use crate::validation::{RescaledSeries, ScaleValidationEvent};

/// Upscales a time series to a coarser time scale.
pub trait Upscaler<T>: Send + Sync {
    /// Upscales `series` to `desired`.
    ///
    /// # Arguments
    ///
    /// * `series` - The series to upscale.
    /// * `desired` - The desired time scale.
    /// * `ends_at` - Admissible end-instants of the upscaled values. When
    ///   empty, end-instants are derived on a regular grid from the series.
    /// * `desired_unit` - The unit the values will be expressed in once
    ///   rescaling is complete.
    ///
    /// # Errors
    ///
    /// Returns a [`RescaleError`] when the existing and desired scales are
    /// incompatible.
    fn upscale(
        &self,
        series: TimeSeries<T>,
        desired: &TimeScale,
        ends_at: &BTreeSet<DateTime<Utc>>,
        desired_unit: &str,
    ) -> Result<RescaledSeries<T>, RescaleError>;
}

/// Checks that `existing` can be upscaled to `desired`.
///
/// # Errors
///
/// Returns [`RescaleError::UnsupportedTimeScale`] for seasonal scales,
/// [`RescaleError::Downscaling`] if the desired period is shorter,
/// [`RescaleError::NonIntegerMultiple`] if it is not a whole multiple of the
/// existing period, and [`RescaleError::UnknownFunction`] if the period
/// changes but the existing function is unknown.
pub fn validate(existing: &TimeScale, desired: &TimeScale) -> Result<(), RescaleError> {
    let (Some(from), Some(to)) = (existing.period(), desired.period()) else {
        return Err(RescaleError::UnsupportedTimeScale {
            reason: format!(
                "upscaling between seasonal time scales is not supported: {existing} to {desired}"
            ),
        });
    };
    if existing.has_month_days() || desired.has_month_days() {
        return Err(RescaleError::UnsupportedTimeScale {
            reason: format!(
                "upscaling between seasonal time scales is not supported: {existing} to {desired}"
            ),
        });
    }
    if existing.is_instantaneous() {
        if desired.function() == TimeScaleFunction::Total {
            return Err(RescaleError::UnsupportedTimeScale {
                reason: format!("cannot accumulate instantaneous values to {desired}"),
            });
        }
        return Ok(());
    }
    if to < from {
        return Err(RescaleError::Downscaling {
            existing: *existing,
            desired: *desired,
        });
    }
    let (from_ms, to_ms) = (from.num_milliseconds(), to.num_milliseconds());
    if from_ms == 0 || to_ms % from_ms != 0 {
        return Err(RescaleError::NonIntegerMultiple {
            existing: *existing,
            desired: *desired,
        });
    }
    if to != from && existing.function() == TimeScaleFunction::Unknown {
        return Err(RescaleError::UnknownFunction {
            existing: *existing,
            desired: *desired,
        });
    }
    Ok(())
}

/// Upscales `series` by combining the events of each interval with `combine`.
///
/// `combine` receives the aggregation function and the events of one
/// interval, and returns `None` if they cannot be combined.
pub(crate) fn upscale_with<T>(
    series: TimeSeries<T>,
    desired: &TimeScale,
    ends_at: &BTreeSet<DateTime<Utc>>,
    desired_unit: &str,
    combine: impl Fn(TimeScaleFunction, &[Event<T>]) -> Option<T>,
) -> Result<RescaledSeries<T>, RescaleError> {
    let Some(existing) = series.metadata().time_scale().copied() else {
        return Ok(RescaledSeries::unchanged(series));
    };
    if series.is_empty() || (existing.is_instantaneous() && desired.is_instantaneous()) {
        return Ok(RescaledSeries::unchanged(series));
    }
    if equals_or_instantaneous(&existing, desired) {
        return Ok(RescaledSeries::unchanged(series));
    }

    validate(&existing, desired)?;

    let mut events = Vec::new();
    if series.metadata().unit() != desired_unit {
        events.push(ScaleValidationEvent::debug(format!(
            "Upscaled values remain in {} and are converted to {desired_unit} afterwards.",
            series.metadata().unit()
        )));
    }

    if existing.period() == desired.period() {
        let retagged = series.map_metadata(|m| m.with_time_scale(Some(*desired)));
        return Ok(RescaledSeries::new(retagged, events));
    }

    // Validated above
    let Some(period) = desired.period() else {
        return Ok(RescaledSeries::new(series, events));
    };
    let function = match desired.function() {
        TimeScaleFunction::Unknown => existing.function(),
        f => f,
    };

    let ends = if ends_at.is_empty() {
        derived_end_times(&series, &existing, period)
    } else {
        ends_at.clone()
    };

    let step = if existing.is_instantaneous() {
        None
    } else {
        existing.period()
    };

    let groups = slicer::group_events_by_interval(series.events(), &ends, period);
    let mut upscaled = Vec::with_capacity(groups.len());
    for (end, group) in groups {
        if group.len() < 2 {
            events.push(ScaleValidationEvent::debug(format!(
                "Skipped upscaling the values ending at {end} to {desired} because the interval \
                 contained {} value(s), which is insufficient.",
                group.len()
            )));
            continue;
        }
        let Some(start) = end.checked_sub_signed(period) else {
            continue;
        };
        if !evenly_spaced(start, group, step) {
            events.push(ScaleValidationEvent::debug(format!(
                "Skipped upscaling the values ending at {end} to {desired} because the {} values \
                 were not evenly spaced across the interval ({start}, {end}].",
                group.len()
            )));
            continue;
        }
        if step.is_some() && group.last().map(Event::time) != Some(end) {
            events.push(ScaleValidationEvent::debug(format!(
                "Skipped upscaling the values ending at {end} to {desired} because the interval \
                 ({start}, {end}] was only partially populated."
            )));
            continue;
        }
        match combine(function, group) {
            Some(value) => upscaled.push(Event::new(end, value)),
            None => events.push(ScaleValidationEvent::debug(format!(
                "Skipped upscaling the values ending at {end} to {desired} because they could \
                 not be combined."
            ))),
        }
    }

    debug!(
        feature = %series.metadata().feature(),
        existing = %existing,
        desired = %desired,
        n_in = series.len(),
        n_out = upscaled.len(),
        "upscaled time series"
    );

    let metadata = series.metadata().clone().with_time_scale(Some(*desired));
    let rescaled = TimeSeries::new(metadata, upscaled)?;
    Ok(RescaledSeries::new(rescaled, events))
}

/// Derives end-instants on a regular grid, starting one series step before
/// the first event and stepping by `period` while within the series.
fn derived_end_times<T>(
    series: &TimeSeries<T>,
    existing: &TimeScale,
    period: TimeDelta,
) -> BTreeSet<DateTime<Utc>> {
    let mut ends = BTreeSet::new();
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return ends;
    };
    let step = match series.events() {
        [a, b, ..] => b.time() - a.time(),
        _ => existing.period().unwrap_or(period),
    };
    let mut next = first
        .time()
        .checked_sub_signed(step)
        .and_then(|t| t.checked_add_signed(period));
    while let Some(n) = next.filter(|n| *n <= last.time()) {
        ends.insert(n);
        next = n.checked_add_signed(period);
    }
    ends
}

/// Whether the interval lower bound followed by the event times forms an
/// evenly spaced sequence, with spacing `step` when one is required.
fn evenly_spaced<T>(start: DateTime<Utc>, group: &[Event<T>], step: Option<TimeDelta>) -> bool {
    let mut previous = start;
    let mut spacing = step;
    for event in group {
        let gap = event.time() - previous;
        match spacing {
            Some(s) if s != gap => return false,
            None => spacing = Some(gap),
            _ => {}
        }
        previous = event.time();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale(hours: i64, function: TimeScaleFunction) -> TimeScale {
        TimeScale::new(TimeDelta::hours(hours), function).unwrap()
    }

    #[test]
    fn validate_rejects_downscaling() {
        let r = validate(
            &scale(6, TimeScaleFunction::Mean),
            &scale(1, TimeScaleFunction::Mean),
        );
        assert!(matches!(r, Err(RescaleError::Downscaling { .. })));
    }

    #[test]
    fn validate_rejects_non_integer_multiple() {
        let r = validate(
            &scale(4, TimeScaleFunction::Mean),
            &scale(6, TimeScaleFunction::Mean),
        );
        assert!(matches!(r, Err(RescaleError::NonIntegerMultiple { .. })));
    }

    #[test]
    fn validate_rejects_unknown_existing_function() {
        let r = validate(
            &scale(1, TimeScaleFunction::Unknown),
            &scale(6, TimeScaleFunction::Mean),
        );
        assert!(matches!(r, Err(RescaleError::UnknownFunction { .. })));
    }

    #[test]
    fn validate_rejects_accumulating_instantaneous() {
        let r = validate(
            &TimeScale::instantaneous(),
            &scale(6, TimeScaleFunction::Total),
        );
        assert!(matches!(r, Err(RescaleError::UnsupportedTimeScale { .. })));
    }

    #[test]
    fn validate_accepts_multiple() {
        assert!(
            validate(
                &scale(6, TimeScaleFunction::Total),
                &scale(24, TimeScaleFunction::Total)
            )
            .is_ok()
        );
    }

    #[test]
    fn spacing_with_required_step() {
        use chrono::TimeZone;
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let group: Vec<Event<f64>> = [6, 12, 18, 24]
            .iter()
            .map(|h| Event::new(t0 + TimeDelta::hours(*h), 1.0))
            .collect();
        assert!(evenly_spaced(t0, &group, Some(TimeDelta::hours(6))));
        assert!(!evenly_spaced(t0, &group[1..], Some(TimeDelta::hours(6))));
        assert!(evenly_spaced(t0 + TimeDelta::hours(6), &group[1..], None));
    }
}
