//! The evaluation declaration consumed by the pool factory.

use std::collections::BTreeMap;

use chrono::TimeDelta;
use wres_datamodel::{FeatureGroup, TimeScale, TimeWindow};
use wres_pairing::CrossPair;
use wres_retrieval::DataType;

use crate::config::PoolParameters;
use crate::error::PoolError;
use crate::transform::{Season, ValueBounds};

/// A baseline generated from baseline-oriented source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedBaseline {
    /// Persists the `lag`-th most recent source value.
    Persistence {
        /// How many values back to persist, at least one.
        lag: usize,
    },
}

/// What to evaluate and how to pool it.
///
/// # Example
///
/// ```
/// use wres_pooling::EvaluationDeclaration;
/// use wres_retrieval::DataType;
///
/// let declaration = EvaluationDeclaration::new(DataType::Observations, DataType::SingleValuedForecasts)
///     .with_measurement_unit("CMS");
///
/// assert!(declaration.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EvaluationDeclaration {
    left_type: DataType,
    right_type: DataType,
    baseline_type: Option<DataType>,
    generated_baseline: Option<GeneratedBaseline>,
    measurement_unit: String,
    unit_aliases: BTreeMap<String, String>,
    time_scale: Option<TimeScale>,
    pair_frequency: Option<TimeDelta>,
    left_time_shift: TimeDelta,
    right_time_shift: TimeDelta,
    baseline_time_shift: TimeDelta,
    value_bounds: ValueBounds,
    season: Option<Season>,
    cross_pair: Option<CrossPair>,
    probability_thresholds: bool,
    summary_statistics_across_feature_groups: bool,
    pool_parameters: PoolParameters,
    feature_groups: Vec<FeatureGroup>,
    time_windows: Vec<TimeWindow>,
}

impl EvaluationDeclaration {
    /// Creates a declaration for the given left and right data types.
    ///
    /// Defaults: no baseline, measurement unit `"CMS"`, no desired time
    /// scale, no pair frequency, zero time shifts, unbounded values, no
    /// season, no cross-pairing, no probability thresholds, default
    /// [`PoolParameters`], no feature groups and no time windows (one
    /// unbounded window is then used).
    pub fn new(left_type: DataType, right_type: DataType) -> Self {
        Self {
            left_type,
            right_type,
            baseline_type: None,
            generated_baseline: None,
            measurement_unit: "CMS".to_string(),
            unit_aliases: BTreeMap::new(),
            time_scale: None,
            pair_frequency: None,
            left_time_shift: TimeDelta::zero(),
            right_time_shift: TimeDelta::zero(),
            baseline_time_shift: TimeDelta::zero(),
            value_bounds: ValueBounds::default(),
            season: None,
            cross_pair: None,
            probability_thresholds: false,
            summary_statistics_across_feature_groups: false,
            pool_parameters: PoolParameters::default(),
            feature_groups: Vec::new(),
            time_windows: Vec::new(),
        }
    }

    /// Declares a baseline dataset.
    pub fn with_baseline(mut self, baseline_type: DataType) -> Self {
        self.baseline_type = Some(baseline_type);
        self
    }

    /// Declares that baseline values are generated from the baseline data.
    pub fn with_generated_baseline(mut self, generated: GeneratedBaseline) -> Self {
        self.generated_baseline = Some(generated);
        self
    }

    /// Sets the measurement unit of the evaluation.
    pub fn with_measurement_unit(mut self, unit: impl Into<String>) -> Self {
        self.measurement_unit = unit.into();
        self
    }

    /// Sets unit aliases.
    pub fn with_unit_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.unit_aliases = aliases;
        self
    }

    /// Sets the desired time scale.
    pub fn with_time_scale(mut self, time_scale: Option<TimeScale>) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Sets the frequency of paired values.
    pub fn with_pair_frequency(mut self, frequency: Option<TimeDelta>) -> Self {
        self.pair_frequency = frequency;
        self
    }

    /// Sets the valid-time shifts of the left, right and baseline data.
    pub fn with_time_shifts(mut self, left: TimeDelta, right: TimeDelta, baseline: TimeDelta) -> Self {
        self.left_time_shift = left;
        self.right_time_shift = right;
        self.baseline_time_shift = baseline;
        self
    }

    /// Sets the value bounds.
    pub fn with_value_bounds(mut self, bounds: ValueBounds) -> Self {
        self.value_bounds = bounds;
        self
    }

    /// Sets the season.
    pub fn with_season(mut self, season: Option<Season>) -> Self {
        self.season = season;
        self
    }

    /// Sets the cross-pairing.
    pub fn with_cross_pair(mut self, cross_pair: Option<CrossPair>) -> Self {
        self.cross_pair = cross_pair;
        self
    }

    /// Declares whether thresholds are given as probabilities, which needs
    /// climatology.
    pub fn with_probability_thresholds(mut self, probability_thresholds: bool) -> Self {
        self.probability_thresholds = probability_thresholds;
        self
    }

    /// Declares whether summary statistics are computed across feature
    /// groups.
    pub fn with_summary_statistics_across_feature_groups(mut self, across: bool) -> Self {
        self.summary_statistics_across_feature_groups = across;
        self
    }

    /// Sets the pooling parameters.
    pub fn with_pool_parameters(mut self, parameters: PoolParameters) -> Self {
        self.pool_parameters = parameters;
        self
    }

    /// Sets the feature groups.
    pub fn with_feature_groups(mut self, groups: Vec<FeatureGroup>) -> Self {
        self.feature_groups = groups;
        self
    }

    /// Sets the time windows.
    pub fn with_time_windows(mut self, windows: Vec<TimeWindow>) -> Self {
        self.time_windows = windows;
        self
    }

    // --- Accessors ---

    /// Returns the left data type.
    pub fn left_type(&self) -> DataType {
        self.left_type
    }

    /// Returns the right data type.
    pub fn right_type(&self) -> DataType {
        self.right_type
    }

    /// Returns the baseline data type.
    pub fn baseline_type(&self) -> Option<DataType> {
        self.baseline_type
    }

    /// Whether a baseline is declared.
    pub fn has_baseline(&self) -> bool {
        self.baseline_type.is_some()
    }

    /// Returns the generated baseline, if any.
    pub fn generated_baseline(&self) -> Option<GeneratedBaseline> {
        self.generated_baseline
    }

    /// Returns the measurement unit.
    pub fn measurement_unit(&self) -> &str {
        &self.measurement_unit
    }

    /// Returns the unit aliases.
    pub fn unit_aliases(&self) -> &BTreeMap<String, String> {
        &self.unit_aliases
    }

    /// Returns the desired time scale.
    pub fn time_scale(&self) -> Option<&TimeScale> {
        self.time_scale.as_ref()
    }

    /// Returns the pair frequency.
    pub fn pair_frequency(&self) -> Option<TimeDelta> {
        self.pair_frequency
    }

    /// Returns the left valid-time shift.
    pub fn left_time_shift(&self) -> TimeDelta {
        self.left_time_shift
    }

    /// Returns the right valid-time shift.
    pub fn right_time_shift(&self) -> TimeDelta {
        self.right_time_shift
    }

    /// Returns the baseline valid-time shift.
    pub fn baseline_time_shift(&self) -> TimeDelta {
        self.baseline_time_shift
    }

    /// Returns the value bounds.
    pub fn value_bounds(&self) -> ValueBounds {
        self.value_bounds
    }

    /// Returns the season.
    pub fn season(&self) -> Option<Season> {
        self.season
    }

    /// Returns the cross-pairing.
    pub fn cross_pair(&self) -> Option<CrossPair> {
        self.cross_pair
    }

    /// Whether probability thresholds are declared.
    pub fn has_probability_thresholds(&self) -> bool {
        self.probability_thresholds
    }

    /// Whether summary statistics are computed across feature groups.
    pub fn summary_statistics_across_feature_groups(&self) -> bool {
        self.summary_statistics_across_feature_groups
    }

    /// Returns the pooling parameters.
    pub fn pool_parameters(&self) -> &PoolParameters {
        &self.pool_parameters
    }

    /// Returns the feature groups.
    pub fn feature_groups(&self) -> &[FeatureGroup] {
        &self.feature_groups
    }

    /// Returns the time windows.
    pub fn time_windows(&self) -> &[TimeWindow] {
        &self.time_windows
    }

    /// Validates the declaration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if a generated baseline lacks a
    /// baseline dataset or has a zero lag, the pair frequency is not
    /// positive, a baseline is declared but a feature tuple has no baseline
    /// feature, a time window is inconsistent, or the pooling parameters are
    /// invalid.
    pub fn validate(&self) -> Result<(), PoolError> {
        if let Some(GeneratedBaseline::Persistence { lag }) = self.generated_baseline {
            if self.baseline_type.is_none() {
                return Err(PoolError::InvalidConfig {
                    reason: "a generated baseline requires a baseline dataset as its source".into(),
                });
            }
            if lag == 0 {
                return Err(PoolError::InvalidConfig {
                    reason: "the persistence lag must be >= 1".into(),
                });
            }
        }
        if let Some(frequency) = self.pair_frequency.filter(|f| *f <= TimeDelta::zero()) {
            return Err(PoolError::InvalidConfig {
                reason: format!("the pair frequency must be positive, got {frequency}"),
            });
        }
        if self.has_baseline() {
            let missing = self
                .feature_groups
                .iter()
                .flat_map(|g| g.features())
                .find(|t| t.baseline().is_none());
            if let Some(tuple) = missing {
                return Err(PoolError::InvalidConfig {
                    reason: format!("a baseline is declared but feature tuple {tuple} has no baseline feature"),
                });
            }
        }
        for window in &self.time_windows {
            window.validate()?;
        }
        self.pool_parameters.validate()
    }
}
