//! Plans pool requests and turns them into pool suppliers.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use wres_datamodel::{Ensemble, Evaluation, FeatureGroup, MissingValue, Pair, PoolMetadata, TimeWindow};
use wres_pairing::{CrossPairer, ExactTimePairer, TimePairingType, TimeSeriesCrossPairer};
use wres_rescale::{BasicUpscaler, EnsembleUpscaler, Upscaler};
use wres_retrieval::{CachingRetrieverFactory, DataType, RetrieverFactory};

use crate::baseline::persistence_factory;
use crate::batching;
use crate::declaration::{EvaluationDeclaration, GeneratedBaseline};
use crate::decompose::decompose;
use crate::error::PoolError;
use crate::generator::PoolsGenerator;
use crate::pool_id::PoolIdSequence;
use crate::request::PoolRequest;
use crate::supplier::{PoolSupplierConfig, PoolSupply};
use crate::transform::{
    UnitMapper, ValueFilter, ensemble_transformer, identity_shim, season_filter,
    single_valued_transformer,
};

/// Planned pools above this count trigger a warning.
const POOL_COUNT_WARNING: usize = 100_000;

/// Plans pool requests for a declaration and creates their suppliers.
///
/// Requests are the cross product of the declared feature groups and time
/// windows. Suppliers are returned in execution order, each paired with the
/// original request it fulfills, even when the request was batched with
/// others for retrieval.
///
/// # Example
///
/// ```ignore
/// let factory = PoolFactory::new(declaration)?;
/// let requests = factory.pool_requests();
/// for (request, supplier) in factory.single_valued_pools(&requests, retrievers)? {
///     let pool = supplier.get()?;
/// }
/// ```
#[derive(Debug)]
pub struct PoolFactory {
    declaration: Arc<EvaluationDeclaration>,
    evaluation: Arc<Evaluation>,
    ids: PoolIdSequence,
}

impl PoolFactory {
    /// Validates `declaration` and creates a factory.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the declaration is invalid.
    pub fn new(declaration: EvaluationDeclaration) -> Result<Self, PoolError> {
        declaration.validate()?;
        let evaluation = Arc::new(Evaluation::new(declaration.measurement_unit()));
        Ok(Self {
            declaration: Arc::new(declaration),
            evaluation,
            ids: PoolIdSequence::new(),
        })
    }

    /// Returns the declaration.
    pub fn declaration(&self) -> &EvaluationDeclaration {
        &self.declaration
    }

    /// Plans one request per feature group and time window, in sorted order.
    ///
    /// No declared time windows means a single unbounded window. When
    /// summary statistics are computed across feature groups, only
    /// singleton groups are pooled. Each request receives a fresh pool id,
    /// shared by its baseline metadata.
    #[tracing::instrument(skip_all)]
    pub fn pool_requests(&self) -> Vec<PoolRequest> {
        let declaration = &self.declaration;
        let across = declaration.summary_statistics_across_feature_groups();
        let groups: BTreeSet<&FeatureGroup> = declaration
            .feature_groups()
            .iter()
            .filter(|g| !across || g.is_singleton())
            .collect();
        let mut windows: BTreeSet<TimeWindow> = declaration.time_windows().iter().copied().collect();
        if windows.is_empty() {
            windows.insert(TimeWindow::new());
        }

        let desired = declaration.time_scale().copied();
        let mut requests = Vec::with_capacity(groups.len() * windows.len());
        for group in &groups {
            for window in &windows {
                let id = Some(self.ids.next_id());
                let metadata = PoolMetadata::new(Arc::clone(&self.evaluation), (*group).clone(), *window)
                    .with_time_scale(desired)
                    .with_pool_id(id);
                let baseline = declaration
                    .has_baseline()
                    .then(|| metadata.clone().with_baseline_pool(true));
                requests.push(PoolRequest::new(metadata, baseline));
            }
        }

        if requests.len() > POOL_COUNT_WARNING {
            warn!(
                "This evaluation contains {} pools, which is more than {POOL_COUNT_WARNING}. It may take a \
                 long time to complete. Consider declaring fewer feature groups or time windows.",
                requests.len()
            );
        }
        info!(
            n_requests = requests.len(),
            n_groups = groups.len(),
            n_windows = windows.len(),
            "planned pool requests"
        );
        requests
    }

    /// Creates suppliers of single-valued pools.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the right data is declared as
    /// ensemble forecasts, or the error of the first supplier that cannot be
    /// created.
    #[tracing::instrument(skip_all, fields(n_requests = requests.len()))]
    pub fn single_valued_pools(
        &self,
        requests: &[PoolRequest],
        retrievers: Arc<dyn RetrieverFactory<f64, f64, f64>>,
    ) -> Result<Vec<(PoolRequest, PoolSupply<f64, f64>)>, PoolError> {
        let declaration = &self.declaration;
        if declaration.right_type() == DataType::EnsembleForecasts {
            return Err(PoolError::InvalidConfig {
                reason: "single-valued pools were requested but the right data contains ensemble forecasts"
                    .into(),
            });
        }

        let retrievers = self.caching(retrievers);
        let upscaler: Arc<dyn Upscaler<f64>> = Arc::new(BasicUpscaler::new());
        let transformer = single_valued_transformer(self.units(), declaration.value_bounds(), declaration.season());

        let baseline_generator = match declaration.generated_baseline() {
            Some(GeneratedBaseline::Persistence { lag }) => Some(persistence_factory(
                Arc::clone(&retrievers),
                lag,
                declaration.time_scale().copied(),
                Some(Arc::clone(&upscaler)),
                declaration.baseline_time_shift(),
            )),
            None => None,
        };

        let template = PoolSupplierConfig::<f64, f64, f64> {
            baseline_generator,
            baseline_shim: Some(identity_shim()),
            left_upscaler: Some(Arc::clone(&upscaler)),
            right_upscaler: Some(Arc::clone(&upscaler)),
            baseline_upscaler: Some(upscaler),
            pairer: Some(Arc::new(ExactTimePairer::<f64, f64>::non_missing(self.pairing_type()))),
            cross_pairer: self.cross_pairer(),
            cross_pair: declaration.cross_pair(),
            left_transformer: Some(Arc::clone(&transformer)),
            right_transformer: Some(Arc::clone(&transformer)),
            baseline_transformer: Some(transformer),
            right_filter: declaration.season().map(season_filter),
            baseline_filter: declaration.season().map(season_filter),
            left_admissible: Some(non_missing()),
            right_admissible: Some(non_missing()),
            baseline_admissible: Some(non_missing()),
            left_time_shift: declaration.left_time_shift(),
            right_time_shift: declaration.right_time_shift(),
            baseline_time_shift: declaration.baseline_time_shift(),
            pair_frequency: declaration.pair_frequency(),
            ..PoolSupplierConfig::default()
        };
        self.pools(requests, retrievers, template)
    }

    /// Creates suppliers of ensemble pools.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the right data is not declared
    /// as ensemble forecasts or a generated baseline is declared, or the
    /// error of the first supplier that cannot be created.
    #[tracing::instrument(skip_all, fields(n_requests = requests.len()))]
    pub fn ensemble_pools(
        &self,
        requests: &[PoolRequest],
        retrievers: Arc<dyn RetrieverFactory<f64, Ensemble, Ensemble>>,
    ) -> Result<Vec<(PoolRequest, PoolSupply<f64, Ensemble>)>, PoolError> {
        let declaration = &self.declaration;
        if declaration.right_type() != DataType::EnsembleForecasts {
            return Err(PoolError::InvalidConfig {
                reason: format!(
                    "ensemble pools were requested but the right data is declared as {:?}",
                    declaration.right_type()
                ),
            });
        }
        if declaration.generated_baseline().is_some() {
            return Err(PoolError::InvalidConfig {
                reason: "a generated baseline is not supported for ensemble pools".into(),
            });
        }

        let retrievers = self.caching(retrievers);
        let units = self.units();
        let ensembles = ensemble_transformer(Arc::clone(&units), declaration.value_bounds(), declaration.season());
        let upscaler: Arc<dyn Upscaler<Ensemble>> = Arc::new(EnsembleUpscaler::new());

        let template = PoolSupplierConfig::<f64, Ensemble, Ensemble> {
            baseline_shim: Some(identity_shim()),
            left_upscaler: Some(Arc::new(BasicUpscaler::new())),
            right_upscaler: Some(Arc::clone(&upscaler)),
            baseline_upscaler: Some(upscaler),
            pairer: Some(Arc::new(ExactTimePairer::<f64, Ensemble>::non_missing(self.pairing_type()))),
            cross_pairer: self.cross_pairer(),
            cross_pair: declaration.cross_pair(),
            left_transformer: Some(single_valued_transformer(
                units,
                declaration.value_bounds(),
                declaration.season(),
            )),
            right_transformer: Some(Arc::clone(&ensembles)),
            baseline_transformer: Some(ensembles),
            right_filter: declaration.season().map(season_filter),
            baseline_filter: declaration.season().map(season_filter),
            left_admissible: Some(non_missing()),
            right_admissible: Some(non_missing()),
            baseline_admissible: Some(non_missing()),
            left_time_shift: declaration.left_time_shift(),
            right_time_shift: declaration.right_time_shift(),
            baseline_time_shift: declaration.baseline_time_shift(),
            pair_frequency: declaration.pair_frequency(),
            ..PoolSupplierConfig::default()
        };
        self.pools(requests, retrievers, template)
    }

    /// Batches the requests, creates their suppliers and decomposes the
    /// batched ones back into one supplier per original request.
    fn pools<R>(
        &self,
        requests: &[PoolRequest],
        retrievers: Arc<dyn RetrieverFactory<f64, R, R>>,
        template: PoolSupplierConfig<f64, R, R>,
    ) -> Result<Vec<(PoolRequest, PoolSupply<f64, R>)>, PoolError>
    where
        R: Clone + Send + Sync + 'static,
    {
        let batches = batching::optimize(requests, self.declaration.pool_parameters())?;
        let generator = PoolsGenerator::new(Arc::clone(&self.declaration), retrievers, template);

        let mut pools = Vec::with_capacity(requests.len());
        for batch in &batches {
            let suppliers = generator
                .suppliers(batch.optimized())?
                .into_iter()
                .map(|(request, supplier)| {
                    let supplier: PoolSupply<f64, R> = Arc::new(supplier);
                    (request, supplier)
                })
                .collect();
            pools.extend(decompose(batch, suppliers)?);
        }
        debug!(n_batches = batches.len(), n_pools = pools.len(), "created pool suppliers");
        Ok(pools)
    }

    /// Memoizes left and baseline retrieval when the same data is read for
    /// several pools: climatology for probability thresholds, or the source
    /// data of a generated baseline.
    fn caching<R>(&self, retrievers: Arc<dyn RetrieverFactory<f64, R, R>>) -> Arc<dyn RetrieverFactory<f64, R, R>>
    where
        R: Clone + Send + Sync + 'static,
    {
        if self.declaration.has_probability_thresholds() || self.declaration.generated_baseline().is_some() {
            Arc::new(CachingRetrieverFactory::new(retrievers))
        } else {
            retrievers
        }
    }

    fn units(&self) -> Arc<UnitMapper> {
        Arc::new(
            UnitMapper::new(self.declaration.measurement_unit())
                .with_aliases(self.declaration.unit_aliases().clone()),
        )
    }

    fn pairing_type(&self) -> TimePairingType {
        TimePairingType::for_datasets(
            self.declaration.left_type().is_forecast(),
            self.declaration.right_type().is_forecast(),
        )
    }

    fn cross_pairer<R>(&self) -> Option<Arc<dyn CrossPairer<Pair<f64, R>>>>
    where
        R: Clone + Send + Sync + 'static,
    {
        self.declaration.cross_pair().map(|c| {
            let pairer: Arc<dyn CrossPairer<Pair<f64, R>>> = Arc::new(TimeSeriesCrossPairer::new(c.method()));
            pairer
        })
    }
}

fn non_missing<T: MissingValue + 'static>() -> ValueFilter<T> {
    Arc::new(|v: &T| !v.is_missing())
}
