//! Value transformers and series filters applied around rescaling.
//!
//! Unit conversion, clamp-to-missing value bounds and seasonal filtering are
//! composed into the per-side transformers handed to a pool supplier.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::warn;
use wres_datamodel::{Ensemble, MonthDay, TimeSeries};

use crate::error::PoolError;

/// Transforms a whole series after rescaling.
pub type Transformer<T> = Arc<dyn Fn(TimeSeries<T>) -> Result<TimeSeries<T>, PoolError> + Send + Sync>;

/// Decides whether a retrieved series takes part in pairing.
pub type SeriesFilter<T> = Arc<dyn Fn(&TimeSeries<T>) -> bool + Send + Sync>;

/// Decides whether a single value is admissible.
pub type ValueFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Adapts baseline-shaped series to right-shaped series.
pub type Shim<B, R> = Arc<dyn Fn(TimeSeries<B>) -> TimeSeries<R> + Send + Sync>;

/// Returns a transformer that leaves series unchanged.
pub fn identity_transformer<T: 'static>() -> Transformer<T> {
    Arc::new(|s: TimeSeries<T>| Ok::<_, PoolError>(s))
}

/// Returns a shim for datasets whose baseline and right types agree.
pub fn identity_shim<T: 'static>() -> Shim<T, T> {
    Arc::new(|s: TimeSeries<T>| s)
}

// ---------------------------------------------------------------
// Value bounds
// ---------------------------------------------------------------

/// Inclusive bounds outside which values become missing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ValueBounds {
    minimum: Option<f64>,
    maximum: Option<f64>,
}

impl ValueBounds {
    /// Creates bounds; `None` leaves a side unbounded.
    pub fn new(minimum: Option<f64>, maximum: Option<f64>) -> Self {
        Self { minimum, maximum }
    }

    /// Returns the lower bound.
    pub fn minimum(&self) -> Option<f64> {
        self.minimum
    }

    /// Returns the upper bound.
    pub fn maximum(&self) -> Option<f64> {
        self.maximum
    }

    /// Whether neither side is bounded.
    pub fn is_unbounded(&self) -> bool {
        self.minimum.is_none() && self.maximum.is_none()
    }

    /// Returns `value`, or NaN if it lies outside the bounds.
    pub fn apply(&self, value: f64) -> f64 {
        let below = self.minimum.is_some_and(|m| value < m);
        let above = self.maximum.is_some_and(|m| value > m);
        if below || above { f64::NAN } else { value }
    }
}

// ---------------------------------------------------------------
// Units
// ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Flow,
    Volume,
    Length,
    DepthRate,
    Temperature,
}

#[derive(Debug, Clone, Copy)]
struct UnitDefinition {
    dimension: Dimension,
    factor: f64,
    offset: f64,
}

const FT3_IN_M3: f64 = 0.028_316_846_592;

fn definition(unit: &str) -> Option<UnitDefinition> {
    let (dimension, factor, offset) = match unit {
        "CMS" | "m3/s" | "m^3/s" => (Dimension::Flow, 1.0, 0.0),
        "CFS" | "ft3/s" | "ft^3/s" => (Dimension::Flow, FT3_IN_M3, 0.0),
        "KCFS" => (Dimension::Flow, FT3_IN_M3 * 1000.0, 0.0),
        "m3" | "m^3" => (Dimension::Volume, 1.0, 0.0),
        "ft3" | "ft^3" => (Dimension::Volume, FT3_IN_M3, 0.0),
        "m" => (Dimension::Length, 1.0, 0.0),
        "cm" => (Dimension::Length, 0.01, 0.0),
        "mm" => (Dimension::Length, 0.001, 0.0),
        "ft" => (Dimension::Length, 0.3048, 0.0),
        "in" => (Dimension::Length, 0.0254, 0.0),
        "mm/s" => (Dimension::DepthRate, 0.001, 0.0),
        "mm/h" => (Dimension::DepthRate, 0.001 / 3600.0, 0.0),
        "in/h" => (Dimension::DepthRate, 0.0254 / 3600.0, 0.0),
        "K" => (Dimension::Temperature, 1.0, 0.0),
        "C" | "°C" | "degC" => (Dimension::Temperature, 1.0, 273.15),
        "F" | "°F" | "degF" => (Dimension::Temperature, 5.0 / 9.0, 273.15 - 32.0 * 5.0 / 9.0),
        _ => return None,
    };
    Some(UnitDefinition {
        dimension,
        factor,
        offset,
    })
}

fn is_time_integrating(from: Dimension, to: Dimension) -> bool {
    matches!(
        (from, to),
        (Dimension::Flow, Dimension::Volume) | (Dimension::DepthRate, Dimension::Length)
    )
}

/// A linear conversion `to = from * scale + shift`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    scale: f64,
    shift: f64,
}

impl UnitConverter {
    /// The conversion that changes nothing.
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        shift: 0.0,
    };

    /// Converts one value.
    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.shift
    }

    /// Whether this is the identity conversion.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Converts existing units to the evaluation's desired unit.
///
/// Unit names are first resolved through the declared aliases. Conversions
/// between units of the same dimension are linear; conversions that would
/// need integration over time (a flow to a volume, say) are not supported
/// here because they depend on the time scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMapper {
    desired: String,
    aliases: BTreeMap<String, String>,
}

impl UnitMapper {
    /// Creates a mapper to `desired`.
    pub fn new(desired: impl Into<String>) -> Self {
        Self {
            desired: desired.into(),
            aliases: BTreeMap::new(),
        }
    }

    /// Adds aliases, mapping each key to a recognized unit name.
    pub fn with_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.aliases.extend(aliases);
        self
    }

    /// Returns the desired unit as declared.
    pub fn desired_unit(&self) -> &str {
        &self.desired
    }

    fn resolve<'a>(&'a self, unit: &'a str) -> &'a str {
        self.aliases.get(unit).map_or(unit, String::as_str)
    }

    /// Returns the converter from `existing` to the desired unit.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::UnitConversion`] if either unit is unknown, the
    /// dimensions differ, or the conversion integrates over time.
    pub fn converter(&self, existing: &str) -> Result<UnitConverter, PoolError> {
        let from = self.resolve(existing);
        let to = self.resolve(&self.desired);
        if from == to {
            return Ok(UnitConverter::IDENTITY);
        }
        let error = |reason: &str| PoolError::UnitConversion {
            from: existing.to_string(),
            to: self.desired.clone(),
            reason: reason.to_string(),
        };
        let (Some(a), Some(b)) = (definition(from), definition(to)) else {
            return Err(error("unrecognized unit"));
        };
        if a.dimension != b.dimension {
            if is_time_integrating(a.dimension, b.dimension) {
                warn!(
                    from = existing,
                    to = %self.desired,
                    "unit conversion requires integration over time, which is not available"
                );
                return Err(error("the conversion integrates over time"));
            }
            return Err(error("the units measure different quantities"));
        }
        let scale = a.factor / b.factor;
        let shift = (a.offset - b.offset) / b.factor;
        Ok(UnitConverter { scale, shift })
    }
}

// ---------------------------------------------------------------
// Seasons
// ---------------------------------------------------------------

/// An inclusive month-day span, possibly wrapping the year end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season {
    start: MonthDay,
    end: MonthDay,
}

impl Season {
    /// Creates a season from `start` to `end` inclusive.
    pub fn new(start: MonthDay, end: MonthDay) -> Self {
        Self { start, end }
    }

    /// Returns the first day.
    pub fn start(&self) -> MonthDay {
        self.start
    }

    /// Returns the last day.
    pub fn end(&self) -> MonthDay {
        self.end
    }

    /// Whether `time` falls on a day within the season.
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        let day = (time.month(), time.day());
        let start = (self.start.month(), self.start.day());
        let end = (self.end.month(), self.end.day());
        if start <= end {
            start <= day && day <= end
        } else {
            day >= start || day <= end
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "--{:02}-{:02}/--{:02}-{:02}",
            self.start.month(),
            self.start.day(),
            self.end.month(),
            self.end.day()
        )
    }
}

/// Returns a filter that admits series whose reference time is in `season`.
///
/// Series without a reference time are admitted; their events are filtered
/// by valid time in the value transformer instead.
pub fn season_filter<T: 'static>(season: Season) -> SeriesFilter<T> {
    Arc::new(move |series: &TimeSeries<T>| {
        series
            .metadata()
            .reference_time()
            .is_none_or(|r| season.contains(r))
    })
}

// ---------------------------------------------------------------
// Composed transformers
// ---------------------------------------------------------------

fn restrict_to_season<T>(series: TimeSeries<T>, season: Option<Season>) -> TimeSeries<T> {
    match season {
        Some(s) if series.metadata().reference_time().is_none() => {
            series.filter_times(|t| s.contains(t))
        }
        _ => series,
    }
}

/// Returns the transformer for single-valued series: unit conversion, then
/// value bounds, then the valid-time season for non-forecast series.
pub fn single_valued_transformer(
    units: Arc<UnitMapper>,
    bounds: ValueBounds,
    season: Option<Season>,
) -> Transformer<f64> {
    Arc::new(move |series: TimeSeries<f64>| -> Result<TimeSeries<f64>, PoolError> {
        let converter = units.converter(series.metadata().unit())?;
        let desired = units.desired_unit().to_string();
        let series = if converter.is_identity() && bounds.is_unbounded() {
            series
        } else {
            series.map_values(|v| bounds.apply(converter.apply(v)))
        };
        let series = series.map_metadata(|m| m.with_unit(desired));
        Ok(restrict_to_season(series, season))
    })
}

/// Returns the transformer for ensemble series, applied member-wise.
pub fn ensemble_transformer(
    units: Arc<UnitMapper>,
    bounds: ValueBounds,
    season: Option<Season>,
) -> Transformer<Ensemble> {
    Arc::new(move |series: TimeSeries<Ensemble>| -> Result<TimeSeries<Ensemble>, PoolError> {
        let converter = units.converter(series.metadata().unit())?;
        let desired = units.desired_unit().to_string();
        let series = if converter.is_identity() && bounds.is_unbounded() {
            series
        } else {
            series.map_values(|e| e.map_members(|v| bounds.apply(converter.apply(v))))
        };
        let series = series.map_metadata(|m| m.with_unit(desired));
        Ok(restrict_to_season(series, season))
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use wres_datamodel::{Event, Feature, ReferenceTimeType, TimeSeriesMetadata};

    use super::*;

    fn day(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, month, day, 12, 0, 0).unwrap()
    }

    fn md(month: u32, day: u32) -> MonthDay {
        MonthDay::new(month, day).unwrap()
    }

    #[test]
    fn bounds_clamp_to_missing() {
        let b = ValueBounds::new(Some(0.0), Some(10.0));
        assert_eq!(b.apply(5.0), 5.0);
        assert!(b.apply(-1.0).is_nan());
        assert!(b.apply(11.0).is_nan());
        assert_eq!(ValueBounds::default().apply(-1e9), -1e9);
    }

    #[test]
    fn cfs_to_cms() {
        let c = UnitMapper::new("CMS").converter("CFS").unwrap();
        assert_relative_eq!(c.apply(1.0), FT3_IN_M3, epsilon = 1e-12);
    }

    #[test]
    fn fahrenheit_to_celsius() {
        let c = UnitMapper::new("C").converter("F").unwrap();
        assert_relative_eq!(c.apply(212.0), 100.0, epsilon = 1e-9);
        assert_relative_eq!(c.apply(32.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn aliases_resolve_to_identity() {
        let aliases = BTreeMap::from([("cumecs".to_string(), "CMS".to_string())]);
        let c = UnitMapper::new("m3/s")
            .with_aliases(aliases)
            .converter("cumecs")
            .unwrap();
        assert_relative_eq!(c.apply(3.0), 3.0);
    }

    #[test]
    fn time_integrating_conversion_fails() {
        let e = UnitMapper::new("m3").converter("CMS").unwrap_err();
        assert!(e.to_string().contains("integrates over time"));
    }

    #[test]
    fn unknown_unit_fails() {
        assert!(matches!(
            UnitMapper::new("CMS").converter("furlongs"),
            Err(PoolError::UnitConversion { .. })
        ));
    }

    #[test]
    fn season_wraps_year_end() {
        let winter = Season::new(md(11, 1), md(2, 28));
        assert!(winter.contains(day(12, 25)));
        assert!(winter.contains(day(1, 10)));
        assert!(!winter.contains(day(6, 1)));
        let summer = Season::new(md(6, 1), md(8, 31));
        assert!(summer.contains(day(7, 4)));
        assert!(!summer.contains(day(9, 1)));
    }

    #[test]
    fn season_filter_uses_reference_time() {
        let filter = season_filter::<f64>(Season::new(md(6, 1), md(8, 31)));
        let meta = TimeSeriesMetadata::new(Feature::new("A"), "Q", "CMS");
        let june = TimeSeries::<f64>::empty(meta.clone().with_reference_time(ReferenceTimeType::T0, day(6, 2)));
        let jan = TimeSeries::<f64>::empty(meta.clone().with_reference_time(ReferenceTimeType::T0, day(1, 2)));
        assert!(filter(&june));
        assert!(!filter(&jan));
        assert!(filter(&TimeSeries::empty(meta)));
    }

    #[test]
    fn single_valued_transformer_converts_and_bounds() {
        let t = single_valued_transformer(
            Arc::new(UnitMapper::new("CMS")),
            ValueBounds::new(None, Some(1.0)),
            None,
        );
        let meta = TimeSeriesMetadata::new(Feature::new("A"), "Q", "CFS");
        let s = TimeSeries::new(
            meta,
            vec![Event::new(day(1, 1), 10.0), Event::new(day(1, 2), 100.0)],
        )
        .unwrap();
        let out = t(s).unwrap();
        assert_eq!(out.metadata().unit(), "CMS");
        assert_relative_eq!(*out.events()[0].value(), 10.0 * FT3_IN_M3, epsilon = 1e-12);
        assert!(out.events()[1].value().is_nan());
    }

    #[test]
    fn non_forecast_values_restricted_to_season() {
        let t = single_valued_transformer(
            Arc::new(UnitMapper::new("CMS")),
            ValueBounds::default(),
            Some(Season::new(md(6, 1), md(8, 31))),
        );
        let meta = TimeSeriesMetadata::new(Feature::new("A"), "Q", "CMS");
        let s = TimeSeries::new(
            meta,
            vec![Event::new(day(5, 31), 1.0), Event::new(day(6, 1), 2.0)],
        )
        .unwrap();
        assert_eq!(t(s).unwrap().len(), 1);
    }
}
