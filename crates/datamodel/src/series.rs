//! Time series: ordered events with attached metadata.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::DataModelError;
use crate::feature::Feature;
use crate::time_scale::TimeScale;

/// The kind of reference time attached to a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceTimeType {
    /// Forecast initialization time.
    T0,
    /// Start of an analysis or assimilation period.
    AnalysisStartTime,
    /// Time the forecast was issued.
    IssuedTime,
    /// Time the data was released.
    ReleaseTime,
    /// Time of the latest observation used.
    LatestObservation,
    /// Unspecified reference time.
    Unknown,
}

impl fmt::Display for ReferenceTimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::T0 => "T0",
            Self::AnalysisStartTime => "ANALYSIS START TIME",
            Self::IssuedTime => "ISSUED TIME",
            Self::ReleaseTime => "RELEASE TIME",
            Self::LatestObservation => "LATEST OBSERVATION",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One value at one valid time.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<T> {
    time: DateTime<Utc>,
    value: T,
}

impl<T> Event<T> {
    /// Creates an event.
    pub fn new(time: DateTime<Utc>, value: T) -> Self {
        Self { time, value }
    }

    /// Returns the valid time.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Returns the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consumes the event, returning the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Metadata shared by every event of a time series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeSeriesMetadata {
    reference_times: BTreeMap<ReferenceTimeType, DateTime<Utc>>,
    time_scale: Option<TimeScale>,
    variable: String,
    feature: Feature,
    unit: String,
}

impl TimeSeriesMetadata {
    /// Creates metadata with no reference times and no time scale.
    pub fn new(feature: Feature, variable: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            reference_times: BTreeMap::new(),
            time_scale: None,
            variable: variable.into(),
            feature,
            unit: unit.into(),
        }
    }

    /// Adds or replaces one reference time.
    pub fn with_reference_time(mut self, kind: ReferenceTimeType, time: DateTime<Utc>) -> Self {
        self.reference_times.insert(kind, time);
        self
    }

    /// Replaces all reference times.
    pub fn with_reference_times(
        mut self,
        reference_times: BTreeMap<ReferenceTimeType, DateTime<Utc>>,
    ) -> Self {
        self.reference_times = reference_times;
        self
    }

    /// Sets the time scale.
    pub fn with_time_scale(mut self, time_scale: Option<TimeScale>) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Sets the feature.
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.feature = feature;
        self
    }

    /// Sets the measurement unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Sets the variable name.
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    /// Returns the reference times by type.
    pub fn reference_times(&self) -> &BTreeMap<ReferenceTimeType, DateTime<Utc>> {
        &self.reference_times
    }

    /// Returns the reference time used for lead durations: the T0 time when
    /// present, otherwise the first reference time by type.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.reference_times
            .get(&ReferenceTimeType::T0)
            .or_else(|| self.reference_times.values().next())
            .copied()
    }

    /// Returns the time scale.
    pub fn time_scale(&self) -> Option<&TimeScale> {
        self.time_scale.as_ref()
    }

    /// Returns the variable name.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Returns the feature.
    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    /// Returns the measurement unit.
    pub fn unit(&self) -> &str {
        &self.unit
    }
}

/// An immutable sequence of events sorted by valid time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<T> {
    metadata: TimeSeriesMetadata,
    events: Vec<Event<T>>,
}

impl<T> TimeSeries<T> {
    /// Creates a time series, sorting the events by valid time.
    ///
    /// # Errors
    ///
    /// Returns [`DataModelError::DuplicateEventTime`] if two events share a
    /// valid time.
    pub fn new(metadata: TimeSeriesMetadata, mut events: Vec<Event<T>>) -> Result<Self, DataModelError> {
        events.sort_by_key(|e| e.time);
        if let Some(w) = events.windows(2).find(|w| w[0].time == w[1].time) {
            return Err(DataModelError::DuplicateEventTime { time: w[0].time });
        }
        Ok(Self { metadata, events })
    }

    /// Creates a time series with no events.
    pub fn empty(metadata: TimeSeriesMetadata) -> Self {
        Self {
            metadata,
            events: Vec::new(),
        }
    }

    /// Returns the metadata.
    pub fn metadata(&self) -> &TimeSeriesMetadata {
        &self.metadata
    }

    /// Returns the events in valid-time order.
    pub fn events(&self) -> &[Event<T>] {
        &self.events
    }

    /// Returns the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the series has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the earliest event.
    pub fn first(&self) -> Option<&Event<T>> {
        self.events.first()
    }

    /// Returns the latest event.
    pub fn last(&self) -> Option<&Event<T>> {
        self.events.last()
    }

    /// Returns an iterator over the valid times.
    pub fn valid_times(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.events.iter().map(|e| e.time)
    }

    /// Returns the event at `time`, if any.
    pub fn event_at(&self, time: DateTime<Utc>) -> Option<&Event<T>> {
        self.events
            .binary_search_by_key(&time, |e| e.time)
            .ok()
            .map(|i| &self.events[i])
    }

    /// Replaces the metadata, keeping the events.
    pub fn with_metadata(self, metadata: TimeSeriesMetadata) -> Self {
        Self {
            metadata,
            events: self.events,
        }
    }

    /// Applies `f` to the metadata, keeping the events.
    pub fn map_metadata(self, f: impl FnOnce(TimeSeriesMetadata) -> TimeSeriesMetadata) -> Self {
        Self {
            metadata: f(self.metadata),
            events: self.events,
        }
    }

    /// Retains only the events whose value satisfies `keep`.
    pub fn filter_values(mut self, keep: impl Fn(&T) -> bool) -> Self {
        self.events.retain(|e| keep(&e.value));
        self
    }

    /// Retains only the events whose valid time satisfies `keep`.
    pub fn filter_times(mut self, keep: impl Fn(DateTime<Utc>) -> bool) -> Self {
        self.events.retain(|e| keep(e.time));
        self
    }

    /// Maps every value, keeping valid times and metadata.
    pub fn map_values<U>(self, mut f: impl FnMut(T) -> U) -> TimeSeries<U> {
        TimeSeries {
            metadata: self.metadata,
            events: self
                .events
                .into_iter()
                .map(|e| Event::new(e.time, f(e.value)))
                .collect(),
        }
    }

    /// Consumes the series, returning its parts.
    pub fn into_parts(self) -> (TimeSeriesMetadata, Vec<Event<T>>) {
        (self.metadata, self.events)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn meta() -> TimeSeriesMetadata {
        TimeSeriesMetadata::new(Feature::new("A"), "QINE", "CMS")
    }

    #[test]
    fn new_sorts_events() {
        let s = TimeSeries::new(meta(), vec![Event::new(t(3), 3.0), Event::new(t(1), 1.0)]).unwrap();
        assert_eq!(s.first().unwrap().time(), t(1));
        assert_eq!(s.last().unwrap().time(), t(3));
    }

    #[test]
    fn new_rejects_duplicates() {
        let r = TimeSeries::new(meta(), vec![Event::new(t(1), 1.0), Event::new(t(1), 2.0)]);
        assert!(matches!(r, Err(DataModelError::DuplicateEventTime { .. })));
    }

    #[test]
    fn reference_time_prefers_t0() {
        let m = meta()
            .with_reference_time(ReferenceTimeType::IssuedTime, t(1))
            .with_reference_time(ReferenceTimeType::T0, t(2));
        assert_eq!(m.reference_time(), Some(t(2)));
        let m = meta().with_reference_time(ReferenceTimeType::IssuedTime, t(1));
        assert_eq!(m.reference_time(), Some(t(1)));
        assert_eq!(meta().reference_time(), None);
    }

    #[test]
    fn event_at_finds_by_time() {
        let s = TimeSeries::new(meta(), vec![Event::new(t(1), 1.0), Event::new(t(2), 2.0)]).unwrap();
        assert_eq!(s.event_at(t(2)).map(|e| *e.value()), Some(2.0));
        assert!(s.event_at(t(5)).is_none());
    }

    #[test]
    fn filter_and_map_values() {
        let s = TimeSeries::new(
            meta(),
            vec![Event::new(t(1), 1.0), Event::new(t(2), f64::NAN), Event::new(t(3), 3.0)],
        )
        .unwrap();
        let s = s.filter_values(|v| v.is_finite()).map_values(|v| v * 2.0);
        let values: Vec<f64> = s.events().iter().map(|e| *e.value()).collect();
        assert_eq!(values, vec![2.0, 6.0]);
    }
}
