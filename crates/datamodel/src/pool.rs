//! Pools: the unit of paired data handed to statistics computation.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use crate::error::DataModelError;
use crate::feature::{Feature, FeatureTuple};
use crate::metadata::PoolMetadata;
use crate::series::TimeSeries;
use crate::values::Pair;

/// A pool of paired time series.
pub type PairedPool<L, R> = Pool<TimeSeries<Pair<L, R>>>;

/// Feature-indexed historical values used for probability thresholds.
///
/// One instance is built per batch and shared by reference across pools.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Climatology {
    data: BTreeMap<Feature, Vec<f64>>,
    unit: String,
}

impl Climatology {
    /// Creates a climatology from feature-keyed values in one unit.
    pub fn new(data: BTreeMap<Feature, Vec<f64>>, unit: impl Into<String>) -> Self {
        Self {
            data,
            unit: unit.into(),
        }
    }

    /// Returns the values for one feature.
    pub fn get(&self, feature: &Feature) -> Option<&[f64]> {
        self.data.get(feature).map(Vec::as_slice)
    }

    /// Returns the features with climatological data.
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.data.keys()
    }

    /// Returns the measurement unit.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Whether no feature has any data.
    pub fn is_empty(&self) -> bool {
        self.data.values().all(Vec::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BaselineData<T> {
    metadata: PoolMetadata,
    series: Vec<T>,
}

/// Main data, optional baseline data, optional climatology and metadata.
///
/// A pool is either flat or a wrapper around per-feature mini-pools. The
/// series accessors return the pool's own data followed by that of every
/// mini-pool. Baseline data is present if and only if baseline metadata is.
#[derive(Debug, Clone, PartialEq)]
pub struct Pool<T> {
    metadata: PoolMetadata,
    main: Vec<T>,
    baseline: Option<BaselineData<T>>,
    climatology: Option<Arc<Climatology>>,
    mini_pools: Vec<Pool<T>>,
}

impl<T> Pool<T> {
    /// Creates a flat pool with no baseline.
    pub fn new(main: Vec<T>, metadata: PoolMetadata) -> Self {
        Self {
            metadata,
            main,
            baseline: None,
            climatology: None,
            mini_pools: Vec::new(),
        }
    }

    /// Returns the main metadata.
    pub fn metadata(&self) -> &PoolMetadata {
        &self.metadata
    }

    /// Returns the baseline metadata, if any.
    pub fn baseline_metadata(&self) -> Option<&PoolMetadata> {
        self.baseline.as_ref().map(|b| &b.metadata)
    }

    /// Whether the pool has baseline data.
    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Returns the shared climatology, if any.
    pub fn climatology(&self) -> Option<&Arc<Climatology>> {
        self.climatology.as_ref()
    }

    /// Returns every main series, including those of the mini-pools.
    pub fn main_series(&self) -> impl Iterator<Item = &T> {
        self.main
            .iter()
            .chain(self.mini_pools.iter().flat_map(|p| p.main.iter()))
    }

    /// Returns every baseline series, including those of the mini-pools.
    pub fn baseline_series(&self) -> impl Iterator<Item = &T> {
        let own = self.baseline.iter().flat_map(|b| b.series.iter());
        let minis = self
            .mini_pools
            .iter()
            .flat_map(|p| p.baseline.iter().flat_map(|b| b.series.iter()));
        own.chain(minis)
    }

    /// Returns the number of main series.
    pub fn main_len(&self) -> usize {
        self.main_series().count()
    }

    /// Whether the pool holds no main series.
    pub fn is_empty(&self) -> bool {
        self.main_series().next().is_none()
    }

    /// Returns the mini-pools.
    pub fn mini_pools(&self) -> &[Pool<T>] {
        &self.mini_pools
    }

    /// Consumes the pool, returning every main series and, when the pool has
    /// a baseline, every baseline series, mini-pools included.
    pub fn into_series(self) -> (Vec<T>, Option<Vec<T>>) {
        let mut main = self.main;
        let mut baseline = self.baseline.map(|b| b.series);
        for mini in self.mini_pools {
            main.extend(mini.main);
            if let (Some(all), Some(b)) = (baseline.as_mut(), mini.baseline) {
                all.extend(b.series);
            }
        }
        (main, baseline)
    }

    /// Splits the pool into one pool per feature tuple.
    ///
    /// A flat pool is treated as its own single mini-pool.
    ///
    /// # Errors
    ///
    /// Returns [`DataModelError::AmbiguousMiniPool`] if a mini-pool does not
    /// name exactly one feature tuple, and [`DataModelError::DuplicateFeature`]
    /// if two mini-pools name the same tuple.
    pub fn decompose_by_feature(self) -> Result<BTreeMap<FeatureTuple, Pool<T>>, DataModelError> {
        let minis = if self.mini_pools.is_empty() {
            vec![self]
        } else {
            self.mini_pools
        };

        let mut decomposed = BTreeMap::new();
        for mini in minis {
            let features = mini.metadata.feature_group().features();
            let tuple = match (features.len(), features.first()) {
                (1, Some(tuple)) => tuple.clone(),
                (count, _) => return Err(DataModelError::AmbiguousMiniPool { count }),
            };
            match decomposed.entry(tuple) {
                Entry::Occupied(e) => {
                    return Err(DataModelError::DuplicateFeature {
                        feature: e.key().to_string_short(),
                    });
                }
                Entry::Vacant(e) => {
                    e.insert(mini);
                }
            }
        }
        Ok(decomposed)
    }
}

/// Builder for [`Pool`] that validates the baseline invariant.
#[derive(Debug)]
pub struct PoolBuilder<T> {
    metadata: Option<PoolMetadata>,
    main: Vec<T>,
    baseline_metadata: Option<PoolMetadata>,
    baseline: Option<Vec<T>>,
    climatology: Option<Arc<Climatology>>,
    mini_pools: Vec<Pool<T>>,
}

impl<T> Default for PoolBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PoolBuilder<T> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            metadata: None,
            main: Vec::new(),
            baseline_metadata: None,
            baseline: None,
            climatology: None,
            mini_pools: Vec::new(),
        }
    }

    /// Sets the main metadata.
    pub fn metadata(mut self, metadata: PoolMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the baseline metadata.
    pub fn baseline_metadata(mut self, metadata: Option<PoolMetadata>) -> Self {
        self.baseline_metadata = metadata;
        self
    }

    /// Adds main series.
    pub fn main(mut self, series: impl IntoIterator<Item = T>) -> Self {
        self.main.extend(series);
        self
    }

    /// Adds baseline series.
    pub fn baseline(mut self, series: impl IntoIterator<Item = T>) -> Self {
        self.baseline.get_or_insert_with(Vec::new).extend(series);
        self
    }

    /// Sets the climatology.
    pub fn climatology(mut self, climatology: Option<Arc<Climatology>>) -> Self {
        self.climatology = climatology;
        self
    }

    /// Adds a mini-pool. Nested mini-pools are flattened into this pool.
    pub fn add_pool(mut self, pool: Pool<T>) -> Self {
        if pool.mini_pools.is_empty() {
            self.mini_pools.push(pool);
        } else {
            self.mini_pools.extend(pool.mini_pools);
        }
        self
    }

    /// Builds the pool.
    ///
    /// # Errors
    ///
    /// Returns [`DataModelError::InvalidPool`] if no main metadata was set,
    /// baseline data was added without baseline metadata, or a mini-pool
    /// disagrees with this pool about baseline presence.
    pub fn build(self) -> Result<Pool<T>, DataModelError> {
        let metadata = self.metadata.ok_or_else(|| DataModelError::InvalidPool {
            reason: "a pool requires main metadata".to_string(),
        })?;

        let baseline = match (self.baseline_metadata, self.baseline) {
            (Some(m), series) => Some(BaselineData {
                metadata: m,
                series: series.unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(DataModelError::InvalidPool {
                    reason: format!(
                        "baseline data was supplied without baseline metadata for {metadata}"
                    ),
                });
            }
            (None, None) => None,
        };

        if let Some(mini) = self
            .mini_pools
            .iter()
            .find(|p| p.has_baseline() != baseline.is_some())
        {
            return Err(DataModelError::InvalidPool {
                reason: format!(
                    "mini-pool {} and its enclosing pool {} disagree about baseline presence",
                    mini.metadata, metadata
                ),
            });
        }

        Ok(Pool {
            metadata,
            main: self.main,
            baseline,
            climatology: self.climatology,
            mini_pools: self.mini_pools,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureGroup;
    use crate::metadata::Evaluation;
    use crate::time_window::TimeWindow;

    fn metadata(name: &str) -> PoolMetadata {
        let tuple = FeatureTuple::new(Feature::new(name), Feature::new(name), None);
        PoolMetadata::new(
            Arc::new(Evaluation::new("CMS")),
            FeatureGroup::singleton(tuple),
            TimeWindow::new(),
        )
    }

    fn tuple(name: &str) -> FeatureTuple {
        FeatureTuple::new(Feature::new(name), Feature::new(name), None)
    }

    #[test]
    fn build_requires_metadata() {
        let r = PoolBuilder::<i32>::new().main([1]).build();
        assert!(matches!(r, Err(DataModelError::InvalidPool { .. })));
    }

    #[test]
    fn baseline_data_requires_metadata() {
        let r = PoolBuilder::new()
            .metadata(metadata("A"))
            .baseline([1])
            .build();
        assert!(r.is_err());
    }

    #[test]
    fn baseline_metadata_without_data_gives_empty_baseline() {
        let p = PoolBuilder::<i32>::new()
            .metadata(metadata("A"))
            .baseline_metadata(Some(metadata("A").with_baseline_pool(true)))
            .build()
            .unwrap();
        assert!(p.has_baseline());
        assert_eq!(p.baseline_series().count(), 0);
    }

    #[test]
    fn series_chain_through_mini_pools() {
        let a = Pool::new(vec![1, 2], metadata("A"));
        let b = Pool::new(vec![3], metadata("B"));
        let p = PoolBuilder::new()
            .metadata(metadata("AB"))
            .add_pool(a)
            .add_pool(b)
            .build()
            .unwrap();
        let all: Vec<i32> = p.main_series().copied().collect();
        assert_eq!(all, vec![1, 2, 3]);
        assert_eq!(p.mini_pools().len(), 2);
    }

    #[test]
    fn into_series_flattens_mini_pools() {
        let meta = |n: &str| metadata(n);
        let a = PoolBuilder::new()
            .metadata(meta("A"))
            .main([1])
            .baseline_metadata(Some(meta("A").with_baseline_pool(true)))
            .baseline([10])
            .build()
            .unwrap();
        let p = PoolBuilder::new()
            .metadata(meta("A"))
            .baseline_metadata(Some(meta("A").with_baseline_pool(true)))
            .add_pool(a)
            .build()
            .unwrap();
        let (main, baseline) = p.into_series();
        assert_eq!(main, vec![1]);
        assert_eq!(baseline, Some(vec![10]));
    }

    #[test]
    fn mini_pool_baseline_must_agree() {
        let a = Pool::new(vec![1], metadata("A"));
        let r = PoolBuilder::new()
            .metadata(metadata("A"))
            .baseline_metadata(Some(metadata("A").with_baseline_pool(true)))
            .add_pool(a)
            .build();
        assert!(r.is_err());
    }

    #[test]
    fn decompose_flat_pool() {
        let p = Pool::new(vec![1], metadata("A"));
        let map = p.decompose_by_feature().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&tuple("A")));
    }

    #[test]
    fn decompose_rejects_duplicates() {
        let p = PoolBuilder::new()
            .metadata(metadata("A"))
            .add_pool(Pool::new(vec![1], metadata("A")))
            .add_pool(Pool::new(vec![2], metadata("A")))
            .build()
            .unwrap();
        assert!(matches!(
            p.decompose_by_feature(),
            Err(DataModelError::DuplicateFeature { .. })
        ));
    }

    #[test]
    fn decompose_rejects_composite_mini_pool() {
        let group = FeatureGroup::new("AB", [tuple("A"), tuple("B")]).unwrap();
        let m = metadata("A").with_feature_group(group);
        let p = Pool::new(vec![1], m);
        assert!(matches!(
            p.decompose_by_feature(),
            Err(DataModelError::AmbiguousMiniPool { count: 2 })
        ));
    }

    #[test]
    fn climatology_lookup() {
        let mut data = BTreeMap::new();
        data.insert(Feature::new("A"), vec![1.0, 2.0]);
        let c = Climatology::new(data, "CMS");
        assert_eq!(c.get(&Feature::new("A")), Some(&[1.0, 2.0][..]));
        assert!(c.get(&Feature::new("B")).is_none());
        assert!(!c.is_empty());
    }
}
