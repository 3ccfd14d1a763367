//! Pure conversion functions: TOML config structs -> crate API config types.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;

use crate::config::*;

use wres_datamodel::{Feature, FeatureGroup, FeatureTuple, MonthDay, TimeScale, TimeScaleFunction, TimeWindow};
use wres_pairing::{CrossPair, CrossPairMethod, CrossPairScope};
use wres_pooling::{
    EvaluationDeclaration, GeneratedBaseline, PoolParameters, Season, TimeWindowGenerator, ValueBounds,
};
use wres_retrieval::DataType;

/// Parses a duration string such as `"6h"`, `"-30m"` or `"1d"`.
///
/// Units are `s`, `m`, `h` and `d`.
pub fn parse_duration(s: &str) -> Result<TimeDelta> {
    let s = s.trim();
    let Some(unit) = s.chars().last() else {
        bail!("empty duration");
    };
    let amount: i64 = s[..s.len() - unit.len_utf8()]
        .parse()
        .with_context(|| format!("invalid duration: {s:?}"))?;
    match unit {
        's' => Ok(TimeDelta::seconds(amount)),
        'm' => Ok(TimeDelta::minutes(amount)),
        'h' => Ok(TimeDelta::hours(amount)),
        'd' => Ok(TimeDelta::days(amount)),
        other => bail!("unknown duration unit {other:?} in {s:?}: expected one of s, m, h, d"),
    }
}

fn parse_optional_duration(s: Option<&str>) -> Result<Option<TimeDelta>> {
    s.map(parse_duration).transpose()
}

/// Parses a data type name into the corresponding enum variant.
pub fn parse_data_type(s: &str) -> Result<DataType> {
    match s.to_lowercase().as_str() {
        "observations" => Ok(DataType::Observations),
        "simulations" => Ok(DataType::Simulations),
        "analyses" => Ok(DataType::Analyses),
        "single_valued_forecasts" => Ok(DataType::SingleValuedForecasts),
        "ensemble_forecasts" => Ok(DataType::EnsembleForecasts),
        other => bail!("unknown data type: {other:?}"),
    }
}

/// Parses a time scale function name into the corresponding enum variant.
pub fn parse_function(s: &str) -> Result<TimeScaleFunction> {
    match s.to_lowercase().as_str() {
        "mean" => Ok(TimeScaleFunction::Mean),
        "total" => Ok(TimeScaleFunction::Total),
        "minimum" => Ok(TimeScaleFunction::Minimum),
        "maximum" => Ok(TimeScaleFunction::Maximum),
        "unknown" => Ok(TimeScaleFunction::Unknown),
        other => bail!("unknown time scale function: {other:?}"),
    }
}

/// Converts a TOML time scale into a [`TimeScale`].
pub fn build_time_scale(t: &TimeScaleToml) -> Result<TimeScale> {
    let period = parse_duration(&t.period)?;
    let function = parse_function(&t.function)?;
    TimeScale::new(period, function).context("invalid time scale")
}

/// Parses an `"MM-DD"` month-day.
pub fn parse_month_day(s: &str) -> Result<MonthDay> {
    let Some((month, day)) = s.trim().trim_start_matches("--").split_once('-') else {
        bail!("invalid month-day {s:?}: expected MM-DD");
    };
    let month: u32 = month.parse().with_context(|| format!("invalid month in {s:?}"))?;
    let day: u32 = day.parse().with_context(|| format!("invalid day in {s:?}"))?;
    MonthDay::new(month, day).with_context(|| format!("invalid month-day {s:?}"))
}

/// Converts a TOML cross-pairing into a [`CrossPair`].
pub fn build_cross_pair(c: &CrossPairToml) -> Result<CrossPair> {
    let method = match c.method.to_lowercase().as_str() {
        "exact" => CrossPairMethod::Exact,
        "fuzzy" => CrossPairMethod::Fuzzy,
        other => bail!("unknown cross-pair method: {other:?}"),
    };
    let scope = match c.scope.to_lowercase().as_str() {
        "within_features" => CrossPairScope::WithinFeatures,
        "across_features" => CrossPairScope::AcrossFeatures,
        other => bail!("unknown cross-pair scope: {other:?}"),
    };
    Ok(CrossPair::new(method, scope))
}

/// Converts a TOML generated baseline into a [`GeneratedBaseline`].
pub fn build_generated_baseline(g: &GeneratedBaselineToml) -> Result<GeneratedBaseline> {
    match g.method.to_lowercase().as_str() {
        "persistence" => Ok(GeneratedBaseline::Persistence { lag: g.lag }),
        other => bail!("unknown generated baseline method: {other:?}"),
    }
}

fn build_tuple(f: &FeatureToml) -> FeatureTuple {
    let right = f.right.as_deref().unwrap_or(&f.left);
    FeatureTuple::new(
        Feature::new(&f.left),
        Feature::new(right),
        f.baseline.as_deref().map(Feature::new),
    )
}

/// Builds one singleton group per declared feature, followed by the
/// declared multi-feature groups.
pub fn build_feature_groups(config: &WresConfig) -> Result<Vec<FeatureGroup>> {
    let tuples: BTreeMap<&str, FeatureTuple> = config
        .features
        .iter()
        .map(|f| (f.left.as_str(), build_tuple(f)))
        .collect();
    if tuples.len() != config.features.len() {
        bail!("feature left names must be unique");
    }

    let mut groups: Vec<FeatureGroup> = config
        .features
        .iter()
        .map(|f| FeatureGroup::singleton(build_tuple(f)))
        .collect();

    for group in &config.feature_groups {
        let members = group
            .features
            .iter()
            .map(|name| {
                tuples.get(name.as_str()).cloned().ok_or_else(|| {
                    anyhow::anyhow!("feature group '{}' refers to unknown feature '{name}'", group.name)
                })
            })
            .collect::<Result<Vec<_>>>()?;
        groups.push(FeatureGroup::new(&group.name, members).context("invalid feature group")?);
    }
    Ok(groups)
}

fn build_time_window(w: &TimeWindowToml) -> Result<TimeWindow> {
    Ok(TimeWindow::new()
        .with_reference_times(w.earliest_reference_time, w.latest_reference_time)
        .with_valid_times(w.earliest_valid_time, w.latest_valid_time)
        .with_lead_durations(
            parse_optional_duration(w.earliest_lead_duration.as_deref())?,
            parse_optional_duration(w.latest_lead_duration.as_deref())?,
        ))
}

/// Builds the explicit time windows followed by the lead-duration pools.
pub fn build_time_windows(config: &WresConfig) -> Result<Vec<TimeWindow>> {
    let mut windows = config
        .time_windows
        .iter()
        .map(build_time_window)
        .collect::<Result<Vec<_>>>()?;

    if let Some(ref lead) = config.lead_pools {
        let period = parse_duration(&lead.period)?;
        let base = TimeWindow::new().with_reference_times(lead.earliest_reference_time, lead.latest_reference_time);
        let mut generator =
            TimeWindowGenerator::new(period, parse_duration(&lead.minimum)?, parse_duration(&lead.maximum)?)
                .with_base(base);
        if let Some(frequency) = parse_optional_duration(lead.frequency.as_deref())? {
            generator = generator.with_frequency(frequency);
        }
        windows.extend(generator.windows().context("invalid lead-duration pools")?);
    }
    Ok(windows)
}

/// Builds the [`EvaluationDeclaration`] from the whole project configuration.
pub fn build_declaration(config: &WresConfig) -> Result<EvaluationDeclaration> {
    let e = &config.evaluation;
    let mut declaration = EvaluationDeclaration::new(parse_data_type(&e.left_type)?, parse_data_type(&e.right_type)?)
        .with_measurement_unit(&e.measurement_unit)
        .with_unit_aliases(e.unit_aliases.clone())
        .with_time_scale(e.time_scale.as_ref().map(build_time_scale).transpose()?)
        .with_pair_frequency(parse_optional_duration(e.pair_frequency.as_deref())?)
        .with_time_shifts(
            parse_optional_duration(e.time_shifts.left.as_deref())?.unwrap_or_else(TimeDelta::zero),
            parse_optional_duration(e.time_shifts.right.as_deref())?.unwrap_or_else(TimeDelta::zero),
            parse_optional_duration(e.time_shifts.baseline.as_deref())?.unwrap_or_else(TimeDelta::zero),
        )
        .with_value_bounds(ValueBounds::new(e.value_bounds.minimum, e.value_bounds.maximum))
        .with_cross_pair(e.cross_pair.as_ref().map(build_cross_pair).transpose()?)
        .with_probability_thresholds(e.probability_thresholds)
        .with_summary_statistics_across_feature_groups(e.summary_statistics_across_feature_groups)
        .with_pool_parameters(
            PoolParameters::new()
                .with_feature_batch_size(config.pooling.feature_batch_size)
                .with_feature_batch_threshold(config.pooling.feature_batch_threshold),
        )
        .with_feature_groups(build_feature_groups(config)?)
        .with_time_windows(build_time_windows(config)?);

    if let Some(ref season) = e.season {
        let season = Season::new(parse_month_day(&season.start)?, parse_month_day(&season.end)?);
        declaration = declaration.with_season(Some(season));
    }
    if let Some(ref baseline) = e.baseline_type {
        declaration = declaration.with_baseline(parse_data_type(baseline)?);
    }
    if let Some(ref generated) = e.generated_baseline {
        declaration = declaration.with_generated_baseline(build_generated_baseline(generated)?);
    }

    declaration.validate().context("invalid evaluation declaration")?;
    Ok(declaration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml_str: &str) -> WresConfig {
        toml::from_str(toml_str).unwrap()
    }

    const MINIMAL: &str = r#"
        [evaluation]
        left_type = "observations"
        right_type = "single_valued_forecasts"

        [[features]]
        left = "DRRC2"

        [[features]]
        left = "DOLC2"
        right = "DOLC2HUC"
    "#;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("6h").unwrap(), TimeDelta::hours(6));
        assert_eq!(parse_duration("-30m").unwrap(), TimeDelta::minutes(-30));
        assert_eq!(parse_duration("1d").unwrap(), TimeDelta::days(1));
        assert_eq!(parse_duration("90s").unwrap(), TimeDelta::seconds(90));
        assert!(parse_duration("6w").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn data_types() {
        assert_eq!(parse_data_type("Ensemble_Forecasts").unwrap(), DataType::EnsembleForecasts);
        assert!(parse_data_type("radar").is_err());
    }

    #[test]
    fn month_days() {
        let md = parse_month_day("04-01").unwrap();
        assert_eq!((md.month(), md.day()), (4, 1));
        assert!(parse_month_day("--09-30").is_ok());
        assert!(parse_month_day("13-01").is_err());
        assert!(parse_month_day("0401").is_err());
    }

    #[test]
    fn minimal_declaration() {
        let declaration = build_declaration(&config(MINIMAL)).unwrap();
        assert_eq!(declaration.feature_groups().len(), 2);
        assert!(declaration.feature_groups().iter().all(FeatureGroup::is_singleton));
        assert!(declaration.time_windows().is_empty());
        assert_eq!(declaration.pool_parameters().feature_batch_size(), 50);
        let right: Vec<_> = declaration.feature_groups()[1].right_features().into_iter().collect();
        assert_eq!(right, vec![Feature::new("DOLC2HUC")]);
    }

    #[test]
    fn multi_feature_group() {
        let toml_str = format!(
            "{MINIMAL}
            [[feature_groups]]
            name = \"REGION\"
            features = [\"DRRC2\", \"DOLC2\"]
            "
        );
        let groups = build_feature_groups(&config(&toml_str)).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[2].name(), "REGION");
        assert_eq!(groups[2].features().len(), 2);
    }

    #[test]
    fn unknown_group_member_rejected() {
        let toml_str = format!(
            "{MINIMAL}
            [[feature_groups]]
            name = \"REGION\"
            features = [\"NOPE\"]
            "
        );
        assert!(build_feature_groups(&config(&toml_str)).is_err());
    }

    #[test]
    fn lead_pools_follow_explicit_windows() {
        let toml_str = format!(
            "{MINIMAL}
            [[time_windows]]
            earliest_valid_time = \"2024-01-01T00:00:00Z\"

            [lead_pools]
            period = \"6h\"
            maximum = \"24h\"
            "
        );
        let windows = build_time_windows(&config(&toml_str)).unwrap();
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[4].latest_lead_duration(), Some(TimeDelta::hours(24)));
    }

    #[test]
    fn full_evaluation_section() {
        let toml_str = r#"
            [evaluation]
            left_type = "observations"
            right_type = "single_valued_forecasts"
            baseline_type = "observations"
            measurement_unit = "CFS"
            pair_frequency = "6h"
            time_scale = { period = "24h", function = "total" }
            time_shifts = { right = "-1h" }
            value_bounds = { minimum = 0.0 }
            season = { start = "04-01", end = "09-30" }
            cross_pair = { method = "exact", scope = "across_features" }
            generated_baseline = { method = "persistence", lag = 2 }

            [[features]]
            left = "A"
            baseline = "A"
        "#;
        let declaration = build_declaration(&config(toml_str)).unwrap();
        assert_eq!(declaration.measurement_unit(), "CFS");
        assert_eq!(declaration.pair_frequency(), Some(TimeDelta::hours(6)));
        assert_eq!(declaration.right_time_shift(), TimeDelta::hours(-1));
        assert_eq!(declaration.left_time_shift(), TimeDelta::zero());
        assert_eq!(declaration.time_scale().map(TimeScale::function), Some(TimeScaleFunction::Total));
        assert_eq!(declaration.generated_baseline(), Some(GeneratedBaseline::Persistence { lag: 2 }));
        assert_eq!(declaration.cross_pair().map(|c| c.scope()), Some(CrossPairScope::AcrossFeatures));
        assert!(declaration.season().is_some());
    }

    #[test]
    fn invalid_declaration_rejected() {
        // a baseline needs a baseline feature on every tuple
        let toml_str = r#"
            [evaluation]
            left_type = "observations"
            right_type = "single_valued_forecasts"
            baseline_type = "observations"

            [[features]]
            left = "A"
        "#;
        assert!(build_declaration(&config(toml_str)).is_err());
    }

    #[test]
    fn unknown_fields_rejected() {
        let toml_str = r#"
            [evaluation]
            left_type = "observations"
            right_type = "single_valued_forecasts"
            colour = "blue"
        "#;
        assert!(toml::from_str::<WresConfig>(toml_str).is_err());
    }
}
