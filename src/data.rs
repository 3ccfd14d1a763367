//! JSON time-series files.
//!
//! A file holds a list of series:
//!
//! ```json
//! [
//!   {
//!     "feature": "DRRC2",
//!     "variable": "QINE",
//!     "unit": "CMS",
//!     "reference_times": { "T0": "2024-01-01T00:00:00Z" },
//!     "time_scale": { "period": "1h", "function": "mean" },
//!     "events": [ { "time": "2024-01-01T01:00:00Z", "value": 1.0 } ]
//!   }
//! ]
//! ```
//!
//! Single-valued events carry a number (`null` is missing); ensemble events
//! carry an array of members.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::info;

use wres_datamodel::{Ensemble, Event, Feature, ReferenceTimeType, TimeSeries, TimeSeriesMetadata};

use crate::config::TimeScaleToml;
use crate::convert;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeriesJson<V> {
    feature: String,
    variable: String,
    unit: String,
    #[serde(default)]
    reference_times: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    time_scale: Option<TimeScaleToml>,
    events: Vec<EventJson<V>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EventJson<V> {
    time: DateTime<Utc>,
    value: V,
}

/// A value read from JSON.
pub trait FromJson: Sized {
    /// The raw JSON form.
    type Raw: DeserializeOwned;

    /// Converts the raw form.
    fn from_json(raw: Self::Raw) -> Self;
}

impl FromJson for f64 {
    type Raw = Option<f64>;

    fn from_json(raw: Option<f64>) -> Self {
        raw.unwrap_or(f64::NAN)
    }
}

impl FromJson for Ensemble {
    type Raw = Vec<Option<f64>>;

    fn from_json(raw: Vec<Option<f64>>) -> Self {
        Ensemble::new(raw.into_iter().map(f64::from_json).collect())
    }
}

/// Parses a reference time type name such as `"T0"` or `"ISSUED_TIME"`.
pub fn parse_reference_time_type(s: &str) -> Result<ReferenceTimeType> {
    match s.to_uppercase().replace([' ', '-'], "_").as_str() {
        "T0" => Ok(ReferenceTimeType::T0),
        "ANALYSIS_START_TIME" => Ok(ReferenceTimeType::AnalysisStartTime),
        "ISSUED_TIME" => Ok(ReferenceTimeType::IssuedTime),
        "RELEASE_TIME" => Ok(ReferenceTimeType::ReleaseTime),
        "LATEST_OBSERVATION" => Ok(ReferenceTimeType::LatestObservation),
        "UNKNOWN" => Ok(ReferenceTimeType::Unknown),
        other => bail!("unknown reference time type: {other:?}"),
    }
}

fn build_series<T: FromJson>(raw: SeriesJson<T::Raw>) -> Result<TimeSeries<T>> {
    let mut metadata = TimeSeriesMetadata::new(Feature::new(raw.feature), raw.variable, raw.unit)
        .with_time_scale(raw.time_scale.as_ref().map(convert::build_time_scale).transpose()?);
    for (kind, time) in &raw.reference_times {
        metadata = metadata.with_reference_time(parse_reference_time_type(kind)?, *time);
    }
    let events = raw
        .events
        .into_iter()
        .map(|e| Event::new(e.time, T::from_json(e.value)))
        .collect();
    TimeSeries::new(metadata, events).context("invalid time series")
}

/// Parses a JSON list of series.
pub fn parse_series<T: FromJson>(json: &str) -> Result<Vec<TimeSeries<T>>> {
    let raw: Vec<SeriesJson<T::Raw>> = serde_json::from_str(json).context("failed to parse series JSON")?;
    raw.into_iter().map(build_series).collect()
}

/// Reads a JSON series file.
pub fn read_series<T: FromJson>(path: &Path) -> Result<Vec<TimeSeries<T>>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read series file: {}", path.display()))?;
    let series = parse_series(&json).with_context(|| format!("in series file: {}", path.display()))?;
    info!(path = %path.display(), n_series = series.len(), "series loaded");
    Ok(series)
}

/// Reads an optional series file, yielding no series when absent.
pub fn read_optional_series<T: FromJson>(path: Option<&Path>) -> Result<Vec<TimeSeries<T>>> {
    path.map(read_series::<T>).transpose().map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::TimeZone;

    use super::*;

    const SINGLE: &str = r#"[
        {
            "feature": "DRRC2",
            "variable": "QINE",
            "unit": "CMS",
            "reference_times": { "T0": "2024-01-01T00:00:00Z" },
            "time_scale": { "period": "1h", "function": "mean" },
            "events": [
                { "time": "2024-01-01T02:00:00Z", "value": 2.0 },
                { "time": "2024-01-01T01:00:00Z", "value": null }
            ]
        }
    ]"#;

    #[test]
    fn single_valued_series() {
        let series = parse_series::<f64>(SINGLE).unwrap();
        assert_eq!(series.len(), 1);
        let s = &series[0];
        assert_eq!(s.metadata().feature().name(), "DRRC2");
        assert_eq!(
            s.metadata().reference_time(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert!(s.metadata().time_scale().is_some());
        // events are sorted by valid time
        assert!(s.events()[0].value().is_nan());
        assert_eq!(*s.events()[1].value(), 2.0);
    }

    #[test]
    fn ensemble_series() {
        let json = r#"[{
            "feature": "A", "variable": "Q", "unit": "CMS",
            "events": [ { "time": "2024-01-01T01:00:00Z", "value": [1.0, 2.0, null] } ]
        }]"#;
        let series = parse_series::<Ensemble>(json).unwrap();
        let members = series[0].events()[0].value().members();
        assert_eq!(members.len(), 3);
        assert!(members[2].is_nan());
    }

    #[test]
    fn unknown_reference_time_type_rejected() {
        let json = r#"[{
            "feature": "A", "variable": "Q", "unit": "CMS",
            "reference_times": { "LAUNCH": "2024-01-01T00:00:00Z" },
            "events": []
        }]"#;
        assert!(parse_series::<f64>(json).is_err());
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SINGLE.as_bytes()).unwrap();
        let series = read_series::<f64>(file.path()).unwrap();
        assert_eq!(series[0].len(), 2);
        assert!(read_optional_series::<f64>(None).unwrap().is_empty());
    }
}
