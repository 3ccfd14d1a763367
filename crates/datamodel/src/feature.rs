//! Geographic features, feature tuples and feature groups.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::DataModelError;

/// A named geographic feature, such as a gauge location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Feature {
    name: String,
}

impl Feature {
    /// Creates a feature with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the feature name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The left, right and optional baseline features evaluated together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureTuple {
    left: Feature,
    right: Feature,
    baseline: Option<Feature>,
}

impl FeatureTuple {
    /// Creates a feature tuple.
    pub fn new(left: Feature, right: Feature, baseline: Option<Feature>) -> Self {
        Self {
            left,
            right,
            baseline,
        }
    }

    /// Returns the left feature.
    pub fn left(&self) -> &Feature {
        &self.left
    }

    /// Returns the right feature.
    pub fn right(&self) -> &Feature {
        &self.right
    }

    /// Returns the baseline feature, if any.
    pub fn baseline(&self) -> Option<&Feature> {
        self.baseline.as_ref()
    }

    /// Returns a compact name, `left-right` or `left-right-baseline`.
    pub fn to_string_short(&self) -> String {
        match &self.baseline {
            Some(b) => format!("{}-{}-{}", self.left, self.right, b),
            None => format!("{}-{}", self.left, self.right),
        }
    }
}

impl fmt::Display for FeatureTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_short())
    }
}

/// A named, non-empty set of feature tuples evaluated as one pool.
///
/// A singleton group holds one tuple. Composite groups either come from a
/// declaration or are synthesized for batched retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureGroup {
    name: String,
    features: BTreeSet<FeatureTuple>,
}

impl FeatureGroup {
    /// Creates a feature group.
    ///
    /// # Errors
    ///
    /// Returns [`DataModelError::InvalidFeatureGroup`] if `features` is empty.
    pub fn new(
        name: impl Into<String>,
        features: impl IntoIterator<Item = FeatureTuple>,
    ) -> Result<Self, DataModelError> {
        let name = name.into();
        let features: BTreeSet<FeatureTuple> = features.into_iter().collect();
        if features.is_empty() {
            return Err(DataModelError::InvalidFeatureGroup {
                reason: format!("group '{name}' contains no feature tuples"),
            });
        }
        Ok(Self { name, features })
    }

    /// Creates a singleton group named after the tuple's short name.
    pub fn singleton(tuple: FeatureTuple) -> Self {
        Self {
            name: tuple.to_string_short(),
            features: BTreeSet::from([tuple]),
        }
    }

    /// Composes several groups into one.
    ///
    /// A single input group is returned as is. Otherwise the result holds the
    /// union of all tuples under a synthetic name spanning the first and last
    /// tuple.
    ///
    /// # Errors
    ///
    /// Returns [`DataModelError::InvalidFeatureGroup`] if there are no groups.
    pub fn composed<'a>(
        groups: impl IntoIterator<Item = &'a FeatureGroup>,
    ) -> Result<Self, DataModelError> {
        let groups: Vec<&FeatureGroup> = groups.into_iter().collect();
        if let [only] = groups.as_slice() {
            return Ok((*only).clone());
        }
        let features: BTreeSet<FeatureTuple> = groups
            .iter()
            .flat_map(|g| g.features.iter().cloned())
            .collect();
        let name = match (features.first(), features.last()) {
            (Some(first), Some(last)) => format!(
                "{}..{} ({} features)",
                first.to_string_short(),
                last.to_string_short(),
                features.len()
            ),
            _ => {
                return Err(DataModelError::InvalidFeatureGroup {
                    reason: "cannot compose an empty collection of feature groups".to_string(),
                });
            }
        };
        Ok(Self { name, features })
    }

    /// Returns the group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the feature tuples in sorted order.
    pub fn features(&self) -> &BTreeSet<FeatureTuple> {
        &self.features
    }

    /// Whether the group contains exactly one tuple.
    pub fn is_singleton(&self) -> bool {
        self.features.len() == 1
    }

    /// Whether the group contains `tuple`.
    pub fn contains(&self, tuple: &FeatureTuple) -> bool {
        self.features.contains(tuple)
    }

    /// Returns the distinct left features.
    pub fn left_features(&self) -> BTreeSet<Feature> {
        self.features.iter().map(|t| t.left.clone()).collect()
    }

    /// Returns the distinct right features.
    pub fn right_features(&self) -> BTreeSet<Feature> {
        self.features.iter().map(|t| t.right.clone()).collect()
    }

    /// Returns the distinct baseline features.
    pub fn baseline_features(&self) -> BTreeSet<Feature> {
        self.features
            .iter()
            .filter_map(|t| t.baseline.clone())
            .collect()
    }
}

impl fmt::Display for FeatureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
