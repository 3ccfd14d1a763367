//! Splits the pools of a feature batch back into one pool per original
//! request.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};
use wres_datamodel::{
    Climatology, EvaluationStatusEvent, FeatureTuple, PairedPool, Pool, PoolBuilder, TimeSeries,
    Pair,
};
use wres_retrieval::CachingSupplier;

use crate::batching::OptimizedPoolRequests;
use crate::error::PoolError;
use crate::request::PoolRequest;
use crate::supplier::{PoolSupply, SupplyPool};

/// The decomposed content of one batched pool.
struct Batch<L, R> {
    events: Vec<EvaluationStatusEvent>,
    pools: Mutex<BTreeMap<FeatureTuple, PairedPool<L, R>>>,
}

type SharedBatch<L, R> = Arc<CachingSupplier<Batch<L, R>, PoolError>>;

/// Supplies the pool of one feature tuple from a shared batched pool.
///
/// The batched pool is created by whichever decomposed supplier runs first;
/// each supplier then removes its own tuple, so the batch is released once
/// every tuple has been supplied.
pub struct DecomposedSupplier<L, R> {
    tuple: FeatureTuple,
    request: PoolRequest,
    batch: SharedBatch<L, R>,
    consumed: AtomicBool,
}

impl<L, R> DecomposedSupplier<L, R> {
    /// Returns the request this supplier answers.
    pub fn request(&self) -> &PoolRequest {
        &self.request
    }

    /// Rebuilds a pool for the original request around the decomposed data.
    fn rebuild(
        &self,
        main: Vec<TimeSeries<Pair<L, R>>>,
        baseline: Option<Vec<TimeSeries<Pair<L, R>>>>,
        climatology: Option<Arc<Climatology>>,
        events: &[EvaluationStatusEvent],
    ) -> Result<PairedPool<L, R>, PoolError> {
        let metadata = self.request.metadata().clone();
        let baseline_metadata = self.request.baseline_metadata().cloned();

        let mut mini = PoolBuilder::new()
            .metadata(metadata.clone())
            .main(main)
            .climatology(climatology.clone());
        if let Some(m) = &baseline_metadata {
            mini = mini
                .baseline_metadata(Some(m.clone()))
                .baseline(baseline.unwrap_or_default());
        }

        let pool = PoolBuilder::new()
            .metadata(metadata.with_status_events(events.iter().cloned()))
            .baseline_metadata(baseline_metadata)
            .climatology(climatology)
            .add_pool(mini.build()?)
            .build()?;
        Ok(pool)
    }
}

impl<L, R> SupplyPool<PairedPool<L, R>> for DecomposedSupplier<L, R>
where
    L: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    fn get(&self) -> Result<PairedPool<L, R>, PoolError> {
        if self.consumed.swap(true, Ordering::SeqCst) {
            return Err(PoolError::AlreadySupplied {
                pool: self.request.to_string(),
            });
        }

        let batch = self
            .batch
            .get()
            .map_err(|e| e.in_decomposed_pool(&self.request))?;
        let found = {
            let mut pools = batch.pools.lock();
            let found = pools.remove(&self.tuple);
            if found.is_none() {
                let keys: Vec<String> = pools.keys().map(FeatureTuple::to_string_short).collect();
                warn!(
                    "While decomposing the pools for feature group {}, found no pools associated with \
                     feature tuple {} among a map with these keys: {}.",
                    self.request.feature_group(),
                    self.tuple.to_string_short(),
                    keys.join(", ")
                );
            }
            found
        };

        match found {
            Some(pool) => {
                let climatology = pool.climatology().cloned();
                let (main, baseline) = pool.into_series();
                self.rebuild(main, baseline, climatology, &batch.events)
            }
            None => self.rebuild(Vec::new(), None, None, &batch.events),
        }
    }
}

impl<L, R> fmt::Debug for DecomposedSupplier<L, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecomposedSupplier")
            .field("tuple", &self.tuple.to_string_short())
            .field("consumed", &self.consumed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Replaces the suppliers of a batch with one supplier per original request.
///
/// `suppliers` must hold one supplier per optimized request of `batch`. An
/// unoptimized batch is returned as is.
///
/// # Errors
///
/// Returns [`PoolError::InvalidOptimization`] if a tuple of a batched
/// request has no matching original request.
#[tracing::instrument(skip_all, fields(n_optimized = batch.optimized().len(), n_original = batch.original().len()))]
pub fn decompose<L, R>(
    batch: &OptimizedPoolRequests,
    suppliers: Vec<(PoolRequest, PoolSupply<L, R>)>,
) -> Result<Vec<(PoolRequest, PoolSupply<L, R>)>, PoolError>
where
    L: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    if !batch.is_optimized() {
        return Ok(suppliers);
    }

    let mut decomposed: Vec<(PoolRequest, PoolSupply<L, R>)> = Vec::with_capacity(batch.original().len());
    for (request, supplier) in suppliers {
        let shared: SharedBatch<L, R> = Arc::new(CachingSupplier::new(move || {
            let pool: Pool<_> = supplier.get()?;
            let events = pool.metadata().status_events().to_vec();
            let pools = pool.decompose_by_feature()?;
            debug!(n_pools = pools.len(), "decomposed batched pool");
            Ok(Batch {
                events,
                pools: Mutex::new(pools),
            })
        }));

        for tuple in request.feature_group().features() {
            let original = batch
                .original_request(&BTreeSet::from([tuple.clone()]), request.time_window())?
                .clone();
            let supplier: PoolSupply<L, R> = Arc::new(DecomposedSupplier {
                tuple: tuple.clone(),
                request: original.clone(),
                batch: Arc::clone(&shared),
                consumed: AtomicBool::new(false),
            });
            decomposed.push((original, supplier));
        }
    }

    decomposed.sort_by(|(a, _), (b, _)| {
        (a.feature_group(), a.time_window()).cmp(&(b.feature_group(), b.time_window()))
    });
    Ok(decomposed)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chrono::{TimeZone, Utc};
    use wres_datamodel::{
        Evaluation, Event, Feature, FeatureGroup, PoolMetadata, TimeSeriesMetadata, TimeWindow,
    };

    use super::*;

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    struct Fixed {
        pool: Mutex<Option<PairedPool<f64, f64>>>,
        calls: Arc<AtomicUsize>,
    }

    impl SupplyPool<PairedPool<f64, f64>> for Fixed {
        fn get(&self) -> Result<PairedPool<f64, f64>, PoolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pool.lock().take().ok_or_else(|| PoolError::AlreadySupplied {
                pool: "fixed".into(),
            })
        }
    }

    fn tuple(name: &str) -> FeatureTuple {
        FeatureTuple::new(Feature::new(name), Feature::new(name), None)
    }

    fn request(group: FeatureGroup, id: u64) -> PoolRequest {
        let meta = PoolMetadata::new(Arc::new(Evaluation::new("CMS")), group, TimeWindow::new())
            .with_pool_id(Some(id));
        PoolRequest::new(meta, None)
    }

    fn pairs(name: &str, value: f64) -> TimeSeries<Pair<f64, f64>> {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TimeSeries::new(
            TimeSeriesMetadata::new(Feature::new(name), "Q", "CMS"),
            vec![Event::new(t, Pair::new(value, value))],
        )
        .unwrap()
    }

    fn batched(names: &[&str]) -> (OptimizedPoolRequests, Vec<(PoolRequest, PoolSupply<f64, f64>)>, Arc<AtomicUsize>) {
        let groups: Vec<FeatureGroup> = names.iter().map(|n| FeatureGroup::singleton(tuple(n))).collect();
        let originals: Vec<PoolRequest> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| request(g.clone(), i as u64 + 1))
            .collect();
        let composite = FeatureGroup::composed(&groups).unwrap();
        let optimized = originals[0].with_feature_group(composite.clone());

        let mut builder = PoolBuilder::new().metadata(optimized.metadata().clone());
        for (i, g) in groups.iter().enumerate() {
            let name = g.features().first().unwrap().left().name().to_string();
            let meta = optimized
                .metadata()
                .clone()
                .with_feature_group(FeatureGroup::new(composite.name(), g.features().iter().cloned()).unwrap());
            builder = builder.add_pool(
                PoolBuilder::new()
                    .metadata(meta)
                    .main([pairs(&name, i as f64)])
                    .build()
                    .unwrap(),
            );
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let supplier: PoolSupply<f64, f64> = Arc::new(Fixed {
            pool: Mutex::new(Some(builder.build().unwrap())),
            calls: Arc::clone(&calls),
        });
        let batch = OptimizedPoolRequests::new(vec![optimized.clone()], originals).unwrap();
        (batch, vec![(optimized, supplier)], calls)
    }

    // ---------------------------------------------------------------
    // Tests
    // ---------------------------------------------------------------

    #[test]
    fn one_pool_per_original_request() {
        let (batch, suppliers, calls) = batched(&["A", "B", "C"]);
        let decomposed = decompose(&batch, suppliers).unwrap();
        assert_eq!(decomposed.len(), 3);

        for (i, (request, supplier)) in decomposed.iter().enumerate() {
            let pool = supplier.get().unwrap();
            assert_eq!(pool.metadata().pool_id(), request.pool_id());
            assert_eq!(pool.metadata().feature_group(), request.feature_group());
            let values: Vec<f64> = pool.main_series().map(|s| *s.events()[0].value().left()).collect();
            assert_eq!(values, vec![i as f64]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_call_is_rejected() {
        let (batch, suppliers, _) = batched(&["A", "B"]);
        let decomposed = decompose(&batch, suppliers).unwrap();
        decomposed[0].1.get().unwrap();
        assert!(matches!(
            decomposed[0].1.get(),
            Err(PoolError::AlreadySupplied { .. })
        ));
        assert!(decomposed[1].1.get().is_ok());
    }

    #[test]
    fn unoptimized_batch_unchanged() {
        let r = request(FeatureGroup::singleton(tuple("A")), 1);
        let batch = OptimizedPoolRequests::new(vec![r.clone()], vec![r.clone()]).unwrap();
        let supplier: PoolSupply<f64, f64> = Arc::new(Fixed {
            pool: Mutex::new(None),
            calls: Arc::new(AtomicUsize::new(0)),
        });
        let out = decompose(&batch, vec![(r.clone(), supplier)]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, r);
    }

    #[test]
    fn batch_failure_reaches_every_supplier() {
        let (batch, _, _) = batched(&["A", "B"]);
        let failing: PoolSupply<f64, f64> = Arc::new(Fixed {
            pool: Mutex::new(None),
            calls: Arc::new(AtomicUsize::new(0)),
        });
        let decomposed = decompose(&batch, vec![(batch.optimized()[0].clone(), failing)]).unwrap();
        for (request, supplier) in &decomposed {
            let err = supplier.get().unwrap_err();
            assert!(err.to_string().starts_with(&format!("failed to create pool {request}")));
            assert!(matches!(err.root(), PoolError::AlreadySupplied { .. }));
        }
    }
}
