//! Evaluation-level and pool-level metadata.

use std::fmt;
use std::sync::Arc;

use crate::feature::FeatureGroup;
use crate::time_scale::TimeScale;
use crate::time_window::TimeWindow;

/// Evaluation-wide context shared by every pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Evaluation {
    measurement_unit: String,
    left_variable: String,
    right_variable: String,
    baseline_variable: Option<String>,
}

impl Evaluation {
    /// Creates an evaluation in the given measurement unit.
    pub fn new(measurement_unit: impl Into<String>) -> Self {
        Self {
            measurement_unit: measurement_unit.into(),
            left_variable: String::new(),
            right_variable: String::new(),
            baseline_variable: None,
        }
    }

    /// Sets the left and right variable names.
    pub fn with_variables(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_variable = left.into();
        self.right_variable = right.into();
        self
    }

    /// Sets the baseline variable name.
    pub fn with_baseline_variable(mut self, baseline: impl Into<String>) -> Self {
        self.baseline_variable = Some(baseline.into());
        self
    }

    /// Returns the measurement unit of every pool in the evaluation.
    pub fn measurement_unit(&self) -> &str {
        &self.measurement_unit
    }

    /// Returns the left variable name.
    pub fn left_variable(&self) -> &str {
        &self.left_variable
    }

    /// Returns the right variable name.
    pub fn right_variable(&self) -> &str {
        &self.right_variable
    }

    /// Returns the baseline variable name.
    pub fn baseline_variable(&self) -> Option<&str> {
        self.baseline_variable.as_deref()
    }
}

/// Severity of a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusLevel {
    /// Diagnostic detail.
    Debug,
    /// Informational.
    Info,
    /// Advisory condition.
    Warn,
    /// Failure.
    Error,
}

/// The pipeline stage that raised a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EvaluationStage {
    /// Data retrieval.
    Retrieval,
    /// Temporal rescaling.
    Rescaling,
    /// Pairing.
    Pairing,
    /// Cross-pairing.
    CrossPairing,
    /// Pool assembly.
    PoolCreation,
}

/// An advisory or diagnostic message attached to a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvaluationStatusEvent {
    level: StatusLevel,
    stage: EvaluationStage,
    message: String,
}

impl EvaluationStatusEvent {
    /// Creates a status event.
    pub fn new(level: StatusLevel, stage: EvaluationStage, message: impl Into<String>) -> Self {
        Self {
            level,
            stage,
            message: message.into(),
        }
    }

    /// Creates a warning.
    pub fn warn(stage: EvaluationStage, message: impl Into<String>) -> Self {
        Self::new(StatusLevel::Warn, stage, message)
    }

    /// Returns the severity.
    pub fn level(&self) -> StatusLevel {
        self.level
    }

    /// Returns the stage.
    pub fn stage(&self) -> EvaluationStage {
        self.stage
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Metadata describing one pool: its feature group, time window and scale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolMetadata {
    evaluation: Arc<Evaluation>,
    feature_group: FeatureGroup,
    time_window: TimeWindow,
    time_scale: Option<TimeScale>,
    pool_id: Option<u64>,
    is_baseline_pool: bool,
    status_events: Vec<EvaluationStatusEvent>,
}

impl PoolMetadata {
    /// Creates metadata for the main (non-baseline) side of a pool.
    pub fn new(evaluation: Arc<Evaluation>, feature_group: FeatureGroup, time_window: TimeWindow) -> Self {
        Self {
            evaluation,
            feature_group,
            time_window,
            time_scale: None,
            pool_id: None,
            is_baseline_pool: false,
            status_events: Vec::new(),
        }
    }

    /// Sets the feature group.
    pub fn with_feature_group(mut self, feature_group: FeatureGroup) -> Self {
        self.feature_group = feature_group;
        self
    }

    /// Sets the time window.
    pub fn with_time_window(mut self, time_window: TimeWindow) -> Self {
        self.time_window = time_window;
        self
    }

    /// Sets the time scale.
    pub fn with_time_scale(mut self, time_scale: Option<TimeScale>) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Sets the pool identifier.
    pub fn with_pool_id(mut self, pool_id: Option<u64>) -> Self {
        self.pool_id = pool_id;
        self
    }

    /// Marks the metadata as describing a baseline pool.
    pub fn with_baseline_pool(mut self, is_baseline_pool: bool) -> Self {
        self.is_baseline_pool = is_baseline_pool;
        self
    }

    /// Appends status events.
    pub fn with_status_events(mut self, events: impl IntoIterator<Item = EvaluationStatusEvent>) -> Self {
        self.status_events.extend(events);
        self
    }

    // --- Accessors ---

    /// Returns the shared evaluation.
    pub fn evaluation(&self) -> &Arc<Evaluation> {
        &self.evaluation
    }

    /// Returns the feature group.
    pub fn feature_group(&self) -> &FeatureGroup {
        &self.feature_group
    }

    /// Returns the time window.
    pub fn time_window(&self) -> &TimeWindow {
        &self.time_window
    }

    /// Returns the time scale.
    pub fn time_scale(&self) -> Option<&TimeScale> {
        self.time_scale.as_ref()
    }

    /// Returns the pool identifier.
    pub fn pool_id(&self) -> Option<u64> {
        self.pool_id
    }

    /// Whether this is baseline metadata.
    pub fn is_baseline_pool(&self) -> bool {
        self.is_baseline_pool
    }

    /// Returns the status events.
    pub fn status_events(&self) -> &[EvaluationStatusEvent] {
        &self.status_events
    }
}

impl fmt::Display for PoolMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pool[")?;
        if let Some(id) = self.pool_id {
            write!(f, "id={id}, ")?;
        }
        write!(
            f,
            "feature group={}, time window={}",
            self.feature_group, self.time_window
        )?;
        if let Some(scale) = &self.time_scale {
            write!(f, ", time scale={scale}")?;
        }
        if self.is_baseline_pool {
            write!(f, ", baseline")?;
        }
        write!(f, "]")
    }
}
