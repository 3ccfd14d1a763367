use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Reads and parses a project TOML file.
pub fn load(path: &Path) -> Result<WresConfig> {
    let toml_str = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&toml_str).context("failed to parse TOML config")
}

/// Top-level project configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WresConfig {
    /// Global RNG seed for the sampling-uncertainty bootstrap.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Input and output paths.
    #[serde(default)]
    pub io: IoConfig,

    /// Datasets, scales, transformations and pairing.
    pub evaluation: EvaluationToml,

    /// Feature batching.
    #[serde(default)]
    pub pooling: PoolingToml,

    /// Feature tuples, each evaluated as a singleton group.
    #[serde(default)]
    pub features: Vec<FeatureToml>,

    /// Multi-feature groups, referring to features by left name.
    #[serde(default)]
    pub feature_groups: Vec<FeatureGroupToml>,

    /// Explicit time windows.
    #[serde(default)]
    pub time_windows: Vec<TimeWindowToml>,

    /// Lead-duration pools, appended to the explicit windows.
    #[serde(default)]
    pub lead_pools: Option<LeadPoolsToml>,

    /// Sampling-uncertainty settings.
    #[serde(default)]
    pub bootstrap: BootstrapToml,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct IoConfig {
    pub left: Option<PathBuf>,
    pub right: Option<PathBuf>,
    pub baseline: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluationToml {
    pub left_type: String,
    pub right_type: String,
    #[serde(default)]
    pub baseline_type: Option<String>,
    #[serde(default = "default_measurement_unit")]
    pub measurement_unit: String,
    #[serde(default)]
    pub unit_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub time_scale: Option<TimeScaleToml>,
    #[serde(default)]
    pub pair_frequency: Option<String>,
    #[serde(default)]
    pub time_shifts: TimeShiftsToml,
    #[serde(default)]
    pub value_bounds: ValueBoundsToml,
    #[serde(default)]
    pub season: Option<SeasonToml>,
    #[serde(default)]
    pub cross_pair: Option<CrossPairToml>,
    #[serde(default)]
    pub generated_baseline: Option<GeneratedBaselineToml>,
    #[serde(default)]
    pub probability_thresholds: bool,
    #[serde(default)]
    pub summary_statistics_across_feature_groups: bool,
}

fn default_measurement_unit() -> String {
    "CMS".to_string()
}

/// A time scale: a `period` such as `"24h"` and a function name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeScaleToml {
    pub period: String,
    #[serde(default = "default_function")]
    pub function: String,
}

fn default_function() -> String {
    "mean".to_string()
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TimeShiftsToml {
    pub left: Option<String>,
    pub right: Option<String>,
    pub baseline: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ValueBoundsToml {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// A season of reference times, given as `"MM-DD"` month-days.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeasonToml {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrossPairToml {
    #[serde(default = "default_cross_pair_method")]
    pub method: String,
    #[serde(default = "default_cross_pair_scope")]
    pub scope: String,
}

fn default_cross_pair_method() -> String {
    "fuzzy".to_string()
}
fn default_cross_pair_scope() -> String {
    "within_features".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedBaselineToml {
    #[serde(default = "default_generated_method")]
    pub method: String,
    #[serde(default = "default_lag")]
    pub lag: usize,
}

fn default_generated_method() -> String {
    "persistence".to_string()
}
fn default_lag() -> usize {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolingToml {
    #[serde(default = "default_feature_batch_size")]
    pub feature_batch_size: usize,
    #[serde(default = "default_feature_batch_threshold")]
    pub feature_batch_threshold: usize,
}

impl Default for PoolingToml {
    fn default() -> Self {
        Self {
            feature_batch_size: default_feature_batch_size(),
            feature_batch_threshold: default_feature_batch_threshold(),
        }
    }
}

fn default_feature_batch_size() -> usize {
    50
}
fn default_feature_batch_threshold() -> usize {
    10
}

/// Left, right and optional baseline feature names. `right` defaults to
/// `left`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureToml {
    pub left: String,
    #[serde(default)]
    pub right: Option<String>,
    #[serde(default)]
    pub baseline: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureGroupToml {
    pub name: String,
    pub features: Vec<String>,
}

/// Optional bounds of one time window. Datetimes are RFC 3339, lead
/// durations are duration strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeWindowToml {
    pub earliest_reference_time: Option<DateTime<Utc>>,
    pub latest_reference_time: Option<DateTime<Utc>>,
    pub earliest_valid_time: Option<DateTime<Utc>>,
    pub latest_valid_time: Option<DateTime<Utc>>,
    pub earliest_lead_duration: Option<String>,
    pub latest_lead_duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeadPoolsToml {
    pub period: String,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default = "default_minimum_lead")]
    pub minimum: String,
    pub maximum: String,
    #[serde(default)]
    pub earliest_reference_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latest_reference_time: Option<DateTime<Utc>>,
}

fn default_minimum_lead() -> String {
    "0h".to_string()
}

/// Bootstrap settings. No resampling happens while `samples` is zero.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapToml {
    #[serde(default)]
    pub samples: usize,
    #[serde(default)]
    pub mean_block_length: Option<f64>,
    #[serde(default = "default_quantiles")]
    pub quantiles: Vec<f64>,
}

impl Default for BootstrapToml {
    fn default() -> Self {
        Self {
            samples: 0,
            mean_block_length: None,
            quantiles: default_quantiles(),
        }
    }
}

fn default_quantiles() -> Vec<f64> {
    vec![0.05, 0.95]
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [evaluation]
            left_type = "observations"
            right_type = "single_valued_forecasts"

            [io]
            left = "observed.json"
            right = "forecasts.json"
            "#
        )
        .unwrap();
        let config = load(file.path()).unwrap();
        assert_eq!(config.evaluation.measurement_unit, "CMS");
        assert_eq!(config.pooling.feature_batch_size, 50);
        assert_eq!(config.pooling.feature_batch_threshold, 10);
        assert_eq!(config.bootstrap.samples, 0);
        assert_eq!(config.bootstrap.quantiles, vec![0.05, 0.95]);
        assert_eq!(config.io.left, Some(PathBuf::from("observed.json")));
        assert!(config.seed.is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read config file"));
    }

    #[test]
    fn missing_evaluation_section_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seed = 1").unwrap();
        assert!(load(file.path()).is_err());
    }
}
