//! Feature batching: merging singleton feature groups for shared retrieval.
//!
//! Batching trades memory for fewer retrievals. It is reversible: every
//! batch remembers the original requests it stands for, and the union of
//! feature tuples is the same before and after.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};
use wres_datamodel::{FeatureGroup, FeatureTuple, TimeWindow};

use crate::config::PoolParameters;
use crate::error::PoolError;
use crate::request::{NormalizedPoolRequest, PoolRequest};

/// The requests executed for a batch, with the original requests they cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedPoolRequests {
    optimized: Vec<PoolRequest>,
    original: Vec<PoolRequest>,
}

fn tuples(requests: &[PoolRequest]) -> BTreeSet<FeatureTuple> {
    requests
        .iter()
        .flat_map(|r| r.feature_group().features().iter().cloned())
        .collect()
}

impl OptimizedPoolRequests {
    /// Pairs optimized requests with the originals they represent.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidOptimization`] if either list is empty or
    /// the two lists do not cover the same feature tuples.
    pub fn new(optimized: Vec<PoolRequest>, original: Vec<PoolRequest>) -> Result<Self, PoolError> {
        if optimized.is_empty() || original.is_empty() {
            return Err(PoolError::InvalidOptimization {
                reason: "optimized and original pool requests must both be non-empty".into(),
            });
        }
        let (a, b) = (tuples(&optimized), tuples(&original));
        if a != b {
            return Err(PoolError::InvalidOptimization {
                reason: format!(
                    "the optimized requests cover {} feature tuples and the original requests cover {}, \
                     but they must cover the same tuples",
                    a.len(),
                    b.len()
                ),
            });
        }
        Ok(Self { optimized, original })
    }

    /// Returns the requests to execute.
    pub fn optimized(&self) -> &[PoolRequest] {
        &self.optimized
    }

    /// Returns the original requests.
    pub fn original(&self) -> &[PoolRequest] {
        &self.original
    }

    /// Whether fewer requests are executed than were planned.
    pub fn is_optimized(&self) -> bool {
        self.original.len() > self.optimized.len()
    }

    /// Returns the original request for exactly `features` and `window`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidOptimization`] unless exactly one original
    /// request matches.
    pub fn original_request(
        &self,
        features: &BTreeSet<FeatureTuple>,
        window: &TimeWindow,
    ) -> Result<&PoolRequest, PoolError> {
        let mut matches = self
            .original
            .iter()
            .filter(|r| r.feature_group().features() == features && r.time_window() == window);
        match (matches.next(), matches.next()) {
            (Some(request), None) => Ok(request),
            (first, _) => Err(PoolError::InvalidOptimization {
                reason: format!(
                    "expected one original pool request for time window {window} and {} feature tuple(s), \
                     found {}",
                    features.len(),
                    if first.is_some() { "several" } else { "none" }
                ),
            }),
        }
    }
}

/// Groups requests by feature group, preserving first-seen order.
fn by_feature_group(requests: &[PoolRequest]) -> Vec<(FeatureGroup, Vec<PoolRequest>)> {
    let mut index: HashMap<&FeatureGroup, usize> = HashMap::new();
    let mut grouped: Vec<(FeatureGroup, Vec<PoolRequest>)> = Vec::new();
    for request in requests {
        let group = request.feature_group();
        let i = *index.entry(group).or_insert_with(|| {
            grouped.push((group.clone(), Vec::new()));
            grouped.len() - 1
        });
        grouped[i].1.push(request.clone());
    }
    grouped
}

/// Whether every singleton group has the same pooling structure.
fn singletons_are_alike(grouped: &[(FeatureGroup, Vec<PoolRequest>)]) -> bool {
    let mut structures = grouped
        .iter()
        .filter(|(g, _)| g.is_singleton())
        .map(|(_, requests)| requests.iter().map(PoolRequest::normalize).collect::<Vec<NormalizedPoolRequest>>());
    match structures.next() {
        Some(first) => structures.all(|s| s == first),
        None => true,
    }
}

/// Plans feature batches for `requests`.
///
/// Singleton feature groups are batched only when there are more of them
/// than the batch threshold, the batch size exceeds one and every singleton
/// group has the same pooling structure once feature identity is ignored.
/// Batches hold `min(batch size, singleton count)` groups, filled in request
/// order, and the last batch may be smaller. Other groups pass through
/// unchanged.
///
/// # Errors
///
/// Returns [`PoolError::InvalidOptimization`] if a batch cannot be composed.
#[tracing::instrument(skip_all, fields(n_requests = requests.len()))]
pub fn optimize(
    requests: &[PoolRequest],
    parameters: &PoolParameters,
) -> Result<Vec<OptimizedPoolRequests>, PoolError> {
    let grouped = by_feature_group(requests);
    let singletons = grouped.iter().filter(|(g, _)| g.is_singleton()).count();
    let batch_size = parameters.feature_batch_size();
    let threshold = parameters.feature_batch_threshold();

    let batching = singletons > threshold && batch_size > 1 && singletons_are_alike(&grouped);
    if singletons > threshold && batch_size > 1 && !batching {
        debug!(
            singletons,
            "singleton feature groups differ in pooling structure, so they will not be batched"
        );
    }
    if !batching {
        return grouped
            .into_iter()
            .map(|(_, requests)| OptimizedPoolRequests::new(requests.clone(), requests))
            .collect();
    }

    let group_size = batch_size.min(singletons);
    warn!(
        singletons,
        threshold,
        group_size,
        "Feature batching is in effect: {singletons} singleton feature groups exceed the threshold of \
         {threshold}, so their data will be retrieved in batches of up to {group_size} features. \
         Set the feature batch size to 1 to disable batching."
    );

    let mut batches = Vec::new();
    let mut pending: Vec<(FeatureGroup, Vec<PoolRequest>)> = Vec::with_capacity(group_size);
    for (group, requests) in grouped {
        if !group.is_singleton() {
            batches.push(OptimizedPoolRequests::new(requests.clone(), requests)?);
            continue;
        }
        pending.push((group, requests));
        if pending.len() == group_size {
            batches.push(compose(std::mem::take(&mut pending))?);
        }
    }
    if !pending.is_empty() {
        batches.push(compose(pending)?);
    }

    debug!(n_batches = batches.len(), "planned feature batches");
    Ok(batches)
}

/// Composes singleton groups into one batch whose requests name the union
/// of their tuples.
fn compose(groups: Vec<(FeatureGroup, Vec<PoolRequest>)>) -> Result<OptimizedPoolRequests, PoolError> {
    let composite = FeatureGroup::composed(groups.iter().map(|(g, _)| g))?;
    let template = groups.first().map(|(_, r)| r.as_slice()).unwrap_or_default();
    let optimized = template
        .iter()
        .map(|r| r.with_feature_group(composite.clone()))
        .collect();
    let original = groups.into_iter().flat_map(|(_, r)| r).collect();
    OptimizedPoolRequests::new(optimized, original)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use wres_datamodel::{Evaluation, Feature, PoolMetadata};

    use super::*;

    fn window(hour: u32) -> TimeWindow {
        TimeWindow::new().with_valid_times(None, Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap())
    }

    fn singleton(name: &str) -> FeatureGroup {
        FeatureGroup::singleton(FeatureTuple::new(Feature::new(name), Feature::new(name), None))
    }

    fn requests(groups: &[FeatureGroup], windows: &[TimeWindow]) -> Vec<PoolRequest> {
        let evaluation = Arc::new(Evaluation::new("CMS"));
        let mut out = Vec::new();
        for g in groups {
            for w in windows {
                let meta = PoolMetadata::new(Arc::clone(&evaluation), g.clone(), *w);
                out.push(PoolRequest::new(meta, None));
            }
        }
        out
    }

    fn params(size: usize, threshold: usize) -> PoolParameters {
        PoolParameters::new()
            .with_feature_batch_size(size)
            .with_feature_batch_threshold(threshold)
    }

    #[test]
    fn below_threshold_passes_through() {
        let groups: Vec<_> = (0..3).map(|i| singleton(&format!("F{i}"))).collect();
        let batches = optimize(&requests(&groups, &[window(1)]), &params(10, 5)).unwrap();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| !b.is_optimized()));
    }

    #[test]
    fn batches_of_configured_size() {
        let groups: Vec<_> = (0..50).map(|i| singleton(&format!("F{i:02}"))).collect();
        let batches = optimize(&requests(&groups, &[window(1), window(2)]), &params(10, 5)).unwrap();
        assert_eq!(batches.len(), 5);
        for b in &batches {
            assert!(b.is_optimized());
            assert_eq!(b.optimized().len(), 2);
            assert_eq!(b.original().len(), 20);
            assert_eq!(b.optimized()[0].feature_group().features().len(), 10);
        }
    }

    #[test]
    fn last_batch_holds_the_remainder() {
        let groups: Vec<_> = (0..12).map(|i| singleton(&format!("F{i:02}"))).collect();
        let batches = optimize(&requests(&groups, &[window(1)]), &params(5, 1)).unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.original().len()).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
    }

    #[test]
    fn batch_size_one_disables_batching() {
        let groups: Vec<_> = (0..20).map(|i| singleton(&format!("F{i:02}"))).collect();
        let batches = optimize(&requests(&groups, &[window(1)]), &params(1, 5)).unwrap();
        assert_eq!(batches.len(), 20);
    }

    #[test]
    fn differing_structures_are_not_batched() {
        let groups: Vec<_> = (0..20).map(|i| singleton(&format!("F{i:02}"))).collect();
        let mut reqs = requests(&groups, &[window(1)]);
        reqs.extend(requests(&groups[..1], &[window(2)]));
        let batches = optimize(&reqs, &params(10, 5)).unwrap();
        assert!(batches.iter().all(|b| !b.is_optimized()));
    }

    #[test]
    fn multi_feature_groups_pass_through() {
        let mut groups: Vec<_> = (0..20).map(|i| singleton(&format!("F{i:02}"))).collect();
        let composite = FeatureGroup::composed(&groups[..2]).unwrap();
        groups.push(FeatureGroup::new("region", composite.features().iter().cloned()).unwrap());
        let batches = optimize(&requests(&groups, &[window(1)]), &params(10, 5)).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches.iter().filter(|b| !b.is_optimized()).count(), 1);
    }

    #[test]
    fn mismatched_tuples_rejected() {
        let a = requests(&[singleton("A")], &[window(1)]);
        let b = requests(&[singleton("B")], &[window(1)]);
        assert!(matches!(
            OptimizedPoolRequests::new(a, b),
            Err(PoolError::InvalidOptimization { .. })
        ));
    }

    #[test]
    fn original_request_found_by_features_and_window() {
        let groups: Vec<_> = (0..3).map(|i| singleton(&format!("F{i}"))).collect();
        let batch = compose(
            groups
                .iter()
                .map(|g| (g.clone(), requests(std::slice::from_ref(g), &[window(1)])))
                .collect(),
        )
        .unwrap();
        let features = groups[1].features().clone();
        let found = batch.original_request(&features, &window(1)).unwrap();
        assert_eq!(found.feature_group(), &groups[1]);
        assert!(batch.original_request(&features, &window(2)).is_err());
    }
}
