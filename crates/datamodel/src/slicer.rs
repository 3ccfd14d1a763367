//! Slicing helpers for time series: window filters, snipping, offsets and
//! the regular grid of admissible upscaled end-instants.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::DataModelError;
use crate::series::{Event, TimeSeries};
use crate::time_scale::{TimeScale, needs_upscaling};
use crate::time_window::TimeWindow;

/// Filters a series to a time window.
///
/// Reference times outside the window are removed and, if the series had
/// reference times and none survive, the result is empty. Valid times must
/// fall in the window and, when the window bounds lead durations, so must
/// the lead duration of each event relative to the series reference time.
pub fn filter_by_time_window<T>(series: TimeSeries<T>, window: &TimeWindow) -> TimeSeries<T> {
    let metadata = series.metadata().clone();
    let reference_times = metadata.reference_times();
    if !reference_times.is_empty() {
        let kept: BTreeMap<_, _> = reference_times
            .iter()
            .filter(|(_, t)| window.contains_reference_time(**t))
            .map(|(k, t)| (*k, *t))
            .collect();
        if kept.is_empty() {
            return TimeSeries::empty(metadata);
        }
    }

    let reference = metadata.reference_time();
    let check_lead = !window.has_unbounded_lead_durations();
    series.filter_times(|t| {
        if !window.contains_valid_time(t) {
            return false;
        }
        match reference {
            Some(r) if check_lead => window.contains_lead_duration(t - r),
            _ => true,
        }
    })
}

/// Snips `series` to the valid-time span of `other`, widened by the buffers.
///
/// Keeps events within `[first(other) - lower, last(other) + upper]`. If
/// `other` is empty, `series` is returned unchanged.
pub fn snip<T, U>(
    series: TimeSeries<T>,
    other: &TimeSeries<U>,
    lower_buffer: TimeDelta,
    upper_buffer: TimeDelta,
) -> TimeSeries<T> {
    let (Some(first), Some(last)) = (other.first(), other.last()) else {
        return series;
    };
    let lower = first.time().checked_sub_signed(lower_buffer);
    let upper = last.time().checked_add_signed(upper_buffer);
    series.filter_times(|t| lower.is_none_or(|l| t >= l) && upper.is_none_or(|u| t <= u))
}

/// Shifts every valid time by `offset`.
///
/// # Errors
///
/// Returns [`DataModelError::TimeOverflow`] if a shifted time is not
/// representable.
pub fn apply_offset_to_valid_times<T>(
    series: TimeSeries<T>,
    offset: TimeDelta,
) -> Result<TimeSeries<T>, DataModelError> {
    if offset.is_zero() {
        return Ok(series);
    }
    let (metadata, events) = series.into_parts();
    let shifted = events
        .into_iter()
        .map(|e| {
            let time = e.time();
            time.checked_add_signed(offset)
                .map(|t| Event::new(t, e.into_value()))
                .ok_or(DataModelError::TimeOverflow { time, offset })
        })
        .collect::<Result<Vec<_>, _>>()?;
    TimeSeries::new(metadata, shifted)
}

/// Groups sorted events into right-closed intervals `(end - period, end]`.
///
/// Every end-instant maps to a (possibly empty) slice of `events`.
pub fn group_events_by_interval<'a, T>(
    events: &'a [Event<T>],
    ends: &BTreeSet<DateTime<Utc>>,
    period: TimeDelta,
) -> BTreeMap<DateTime<Utc>, &'a [Event<T>]> {
    ends.iter()
        .map(|&end| {
            let hi = events.partition_point(|e| e.time() <= end);
            let lo = match end.checked_sub_signed(period) {
                Some(start) => events.partition_point(|e| e.time() <= start),
                None => 0,
            };
            (end, &events[lo..hi.max(lo)])
        })
        .collect()
}

/// Returns the valid times at which both series may be paired once upscaled.
///
/// The result is the intersection of valid times. When both sides are
/// upscaled it is further restricted to the time window and thinned to a
/// regular grid with spacing `frequency` (default: the desired period),
/// anchored on the first full period after the reference time, or on the
/// first intersecting time when there is no reference time.
///
/// An empty set is returned if the desired scale is seasonal or both series
/// carry reference times that differ.
pub fn regular_intersecting_valid_times<L, R>(
    left: &TimeSeries<L>,
    right: &TimeSeries<R>,
    window: &TimeWindow,
    desired: &TimeScale,
    frequency: Option<TimeDelta>,
) -> BTreeSet<DateTime<Utc>> {
    let Some(period) = desired.period().filter(|_| !desired.has_month_days()) else {
        return BTreeSet::new();
    };
    let left_refs = left.metadata().reference_times();
    let right_refs = right.metadata().reference_times();
    if !left_refs.is_empty() && !right_refs.is_empty() && left_refs != right_refs {
        return BTreeSet::new();
    }

    let left_times: BTreeSet<DateTime<Utc>> = left.valid_times().collect();
    let mut times: BTreeSet<DateTime<Utc>> = right
        .valid_times()
        .filter(|t| left_times.contains(t))
        .collect();

    let upscaling_both = needs_upscaling(left.metadata().time_scale(), Some(desired))
        && needs_upscaling(right.metadata().time_scale(), Some(desired));
    if times.is_empty() || !upscaling_both {
        return times;
    }

    let frequency = frequency.unwrap_or(period);
    if frequency <= TimeDelta::zero() {
        return times;
    }
    let reference = right
        .metadata()
        .reference_time()
        .or_else(|| left.metadata().reference_time());
    let start = match reference {
        Some(r) => Some(r),
        None => times.first().and_then(|t| t.checked_sub_signed(period)),
    };
    let Some(start) = start else {
        return times;
    };

    let check_lead = !window.has_unbounded_lead_durations();
    times.retain(|&t| {
        window.contains_valid_time(t)
            && match reference {
                Some(r) if check_lead => window.contains_lead_duration(t - r),
                _ => true,
            }
    });

    let (Some(&first), Some(&last)) = (times.first(), times.last()) else {
        return times;
    };
    if times.len() < 2 {
        return times;
    }

    let anchor = if first < start {
        first
    } else {
        let mut candidate = start.checked_add_signed(period);
        let mut found = None;
        while let Some(c) = candidate.filter(|c| *c <= last) {
            if times.contains(&c) {
                found = Some(c);
                break;
            }
            candidate = c.checked_add_signed(frequency);
        }
        found.unwrap_or(first)
    };

    let mut regular = BTreeSet::new();
    let mut next = Some(anchor);
    while let Some(n) = next.filter(|n| *n <= last) {
        if times.contains(&n) {
            regular.insert(n);
        }
        next = n.checked_add_signed(frequency);
    }
    regular
}

/// Sorts series by reference time, then by first valid time.
pub fn sort_by_time<T>(series: &mut [TimeSeries<T>]) {
    series.sort_by_key(|s| (s.metadata().reference_time(), s.first().map(|e| e.time())));
}
