//! Feature correlation between right or baseline data and feature tuples.

use std::collections::BTreeMap;

use wres_datamodel::{Feature, FeatureGroup, FeatureTuple};
use wres_retrieval::DatasetOrientation;

/// Finds the feature tuples that a retrieved right or baseline series
/// contributes to.
///
/// The mapping is many-to-many: one baseline feature may serve several
/// tuples.
#[derive(Debug, Clone, Default)]
pub struct FeatureCorrelator {
    by_right: BTreeMap<Feature, Vec<FeatureTuple>>,
    by_baseline: BTreeMap<Feature, Vec<FeatureTuple>>,
}

impl FeatureCorrelator {
    /// Indexes the tuples of a feature group.
    pub fn new(group: &FeatureGroup) -> Self {
        let mut correlator = Self::default();
        for tuple in group.features() {
            correlator
                .by_right
                .entry(tuple.right().clone())
                .or_default()
                .push(tuple.clone());
            if let Some(baseline) = tuple.baseline() {
                correlator
                    .by_baseline
                    .entry(baseline.clone())
                    .or_default()
                    .push(tuple.clone());
            }
        }
        correlator
    }

    /// Returns the tuples whose `orientation` feature is `feature`.
    ///
    /// Left features are looked up through the right side.
    pub fn tuples(&self, orientation: DatasetOrientation, feature: &Feature) -> &[FeatureTuple] {
        let index = match orientation {
            DatasetOrientation::Baseline => &self.by_baseline,
            DatasetOrientation::Left | DatasetOrientation::Right => &self.by_right,
        };
        index.get(feature).map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(l: &str, r: &str, b: &str) -> FeatureTuple {
        FeatureTuple::new(Feature::new(l), Feature::new(r), Some(Feature::new(b)))
    }

    #[test]
    fn shared_baseline_feature_maps_to_many_tuples() {
        let group = FeatureGroup::new("G", [tuple("A", "A", "Z"), tuple("B", "B", "Z")]).unwrap();
        let c = FeatureCorrelator::new(&group);
        assert_eq!(c.tuples(DatasetOrientation::Baseline, &Feature::new("Z")).len(), 2);
        assert_eq!(c.tuples(DatasetOrientation::Right, &Feature::new("A")).len(), 1);
        assert!(c.tuples(DatasetOrientation::Right, &Feature::new("Z")).is_empty());
    }
}
