//! Pool requests and their feature-free projection.

use std::fmt;
use std::sync::Arc;

use wres_datamodel::{Evaluation, FeatureGroup, PoolMetadata, TimeScale, TimeWindow};

/// Describes one pool: main metadata and optional baseline metadata.
///
/// A request is identified by its feature group and time window. Requests
/// are never changed in place; the `with_*` methods return new requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolRequest {
    metadata: PoolMetadata,
    baseline_metadata: Option<PoolMetadata>,
}

impl PoolRequest {
    /// Creates a request.
    pub fn new(metadata: PoolMetadata, baseline_metadata: Option<PoolMetadata>) -> Self {
        Self {
            metadata,
            baseline_metadata,
        }
    }

    /// Returns the main metadata.
    pub fn metadata(&self) -> &PoolMetadata {
        &self.metadata
    }

    /// Returns the baseline metadata.
    pub fn baseline_metadata(&self) -> Option<&PoolMetadata> {
        self.baseline_metadata.as_ref()
    }

    /// Whether the pool has a baseline.
    pub fn has_baseline(&self) -> bool {
        self.baseline_metadata.is_some()
    }

    /// Returns the feature group.
    pub fn feature_group(&self) -> &FeatureGroup {
        self.metadata.feature_group()
    }

    /// Returns the time window.
    pub fn time_window(&self) -> &TimeWindow {
        self.metadata.time_window()
    }

    /// Returns the pool identifier.
    pub fn pool_id(&self) -> Option<u64> {
        self.metadata.pool_id()
    }

    /// Returns a copy naming `group` on both sides.
    pub fn with_feature_group(&self, group: FeatureGroup) -> Self {
        Self {
            metadata: self.metadata.clone().with_feature_group(group.clone()),
            baseline_metadata: self
                .baseline_metadata
                .clone()
                .map(|m| m.with_feature_group(group)),
        }
    }

    /// Returns a copy with `pool_id` on both sides.
    pub fn with_pool_id(&self, pool_id: Option<u64>) -> Self {
        Self {
            metadata: self.metadata.clone().with_pool_id(pool_id),
            baseline_metadata: self.baseline_metadata.clone().map(|m| m.with_pool_id(pool_id)),
        }
    }

    /// Projects the request onto the fields that do not identify features.
    ///
    /// Two requests for different features but the same pooling structure
    /// have equal projections.
    pub fn normalize(&self) -> NormalizedPoolRequest {
        NormalizedPoolRequest {
            evaluation: Arc::clone(self.metadata.evaluation()),
            time_window: *self.metadata.time_window(),
            time_scale: self.metadata.time_scale().cloned(),
            baseline: self
                .baseline_metadata
                .as_ref()
                .map(|b| (*b.time_window(), b.time_scale().cloned())),
        }
    }
}

impl fmt::Display for PoolRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metadata)
    }
}

/// A pool request stripped of its feature group and pool identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPoolRequest {
    evaluation: Arc<Evaluation>,
    time_window: TimeWindow,
    time_scale: Option<TimeScale>,
    baseline: Option<(TimeWindow, Option<TimeScale>)>,
}

impl NormalizedPoolRequest {
    /// Returns the time window.
    pub fn time_window(&self) -> &TimeWindow {
        &self.time_window
    }

    /// Whether the request has a baseline.
    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use wres_datamodel::{Feature, FeatureTuple};

    use super::*;

    fn request(name: &str, id: u64, hour: u32) -> PoolRequest {
        let evaluation = Arc::new(Evaluation::new("CMS"));
        let tuple = FeatureTuple::new(Feature::new(name), Feature::new(name), None);
        let window = TimeWindow::new().with_valid_times(
            None,
            Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
        );
        let meta = PoolMetadata::new(evaluation, FeatureGroup::singleton(tuple), window)
            .with_pool_id(Some(id));
        PoolRequest::new(meta, None)
    }

    #[test]
    fn normalize_ignores_features_and_ids() {
        let a = request("A", 1, 6);
        let b = request("B", 2, 6);
        assert_ne!(a, b);
        assert_eq!(a.normalize(), b.normalize());
    }

    #[test]
    fn normalize_sees_time_windows() {
        assert_ne!(request("A", 1, 6).normalize(), request("A", 1, 12).normalize());
    }

    #[test]
    fn with_feature_group_updates_both_sides() {
        let r = request("A", 1, 6);
        let base = r.metadata().clone().with_baseline_pool(true);
        let r = PoolRequest::new(r.metadata().clone(), Some(base));
        let group = FeatureGroup::singleton(FeatureTuple::new(Feature::new("Z"), Feature::new("Z"), None));
        let moved = r.with_feature_group(group.clone());
        assert_eq!(moved.feature_group(), &group);
        assert_eq!(moved.baseline_metadata().map(|m| m.feature_group()), Some(&group));
    }
}
