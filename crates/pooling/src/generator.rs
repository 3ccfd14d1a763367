//! Wires a batch of pool requests to pool suppliers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};
use wres_datamodel::{Climatology, Feature, TimeScale, TimeWindow, needs_upscaling};
use wres_rescale::Upscaler;
use wres_retrieval::{CachingRetriever, CachingSupplier, Retrieve, RetrieverFactory, Retriever, collect};

use crate::baseline::GeneratorFactory;
use crate::declaration::EvaluationDeclaration;
use crate::error::PoolError;
use crate::request::PoolRequest;
use crate::supplier::{ClimatologySupplier, PoolSupplier, PoolSupplierConfig};
use crate::transform::{Transformer, ValueFilter};

/// Builds one [`PoolSupplier`] per request, sharing retrieval across them.
///
/// When the declaration uses probability thresholds, climatology is
/// retrieved once for the left features of every request and rescaled once;
/// the same cached left data then serves every pool. Otherwise, left data
/// for observation-like datasets is retrieved once over the union of all
/// time windows, and forecast-like left data once per time window.
///
/// The template carries the settings shared by every supplier (upscalers,
/// pairer, transformers, filters, shim and baseline generator); the
/// retrievers and metadata are filled in per request.
pub struct PoolsGenerator<L, R, B> {
    declaration: Arc<EvaluationDeclaration>,
    retrievers: Arc<dyn RetrieverFactory<L, R, B>>,
    template: PoolSupplierConfig<L, R, B>,
}

impl<L, R, B> PoolsGenerator<L, R, B>
where
    L: Clone + Into<f64> + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// Creates a generator.
    pub fn new(
        declaration: Arc<EvaluationDeclaration>,
        retrievers: Arc<dyn RetrieverFactory<L, R, B>>,
        template: PoolSupplierConfig<L, R, B>,
    ) -> Self {
        Self {
            declaration,
            retrievers,
            template,
        }
    }

    /// Creates the suppliers, in request order.
    ///
    /// # Errors
    ///
    /// Returns the configuration error of the first supplier that cannot be
    /// created, with that pool's metadata attached.
    #[tracing::instrument(skip_all, fields(n_requests = requests.len()))]
    pub fn suppliers(
        &self,
        requests: &[PoolRequest],
    ) -> Result<Vec<(PoolRequest, PoolSupplier<L, R, B>)>, PoolError> {
        let left_features: BTreeSet<Feature> = requests
            .iter()
            .flat_map(|r| r.feature_group().left_features())
            .collect();

        let (left, climatology) = if self.declaration.has_probability_thresholds() {
            let raw = CachingRetriever::memoized(self.retrievers.climatology_retriever(&left_features));
            let climatology = self.climatology(Arc::clone(&raw));
            (LeftSource::Shared(raw), Some(climatology))
        } else {
            (self.left_source(requests, &left_features), None)
        };

        let mut suppliers = Vec::with_capacity(requests.len());
        for request in requests {
            let group = request.feature_group();
            let window = request.time_window();

            let mut config = self.template.clone();
            config.left = left.for_window(window);
            config.right = Some(self.retrievers.right_retriever(&group.right_features(), window));
            config.climatology = climatology.clone();
            config.metadata = Some(request.metadata().clone());
            config.baseline_metadata = request.baseline_metadata().cloned();
            match request.baseline_metadata() {
                Some(baseline) if config.baseline_generator.is_none() => {
                    config.baseline = Some(
                        self.retrievers
                            .baseline_retriever(&group.baseline_features(), Some(baseline.time_window())),
                    );
                }
                Some(_) => {
                    let source = self.retrievers.baseline_retriever(&group.baseline_features(), None);
                    config.baseline_generator = config.baseline_generator.map(|g| holding(g, source));
                }
                None => {
                    config.baseline_generator = None;
                    config.baseline_shim = None;
                }
            }

            let supplier = PoolSupplier::new(config).map_err(|e| e.in_pool(request))?;
            suppliers.push((request.clone(), supplier));
        }
        debug!(n_suppliers = suppliers.len(), "created pool suppliers");
        Ok(suppliers)
    }

    fn left_source(&self, requests: &[PoolRequest], features: &BTreeSet<Feature>) -> LeftSource<L> {
        if self.declaration.left_type().is_observation_like() {
            let union = TimeWindow::union(requests.iter().map(PoolRequest::time_window));
            debug!(?union, "sharing one left retrieval across time windows");
            return LeftSource::Shared(CachingRetriever::memoized(
                self.retrievers.left_retriever(features, union.as_ref()),
            ));
        }
        let windows: BTreeSet<TimeWindow> = requests.iter().map(|r| *r.time_window()).collect();
        let per_window = windows
            .into_iter()
            .map(|w| (w, self.retrievers.left_retriever(features, Some(&w))))
            .collect();
        LeftSource::PerWindow(per_window)
    }

    fn climatology(&self, raw: Retriever<L>) -> ClimatologySupplier {
        let desired = self.declaration.time_scale().copied();
        let unit = self.declaration.measurement_unit().to_string();
        let upscaler = self.template.left_upscaler.clone();
        let transformer = self.template.left_transformer.clone();
        let admissible = self.template.left_admissible.clone();
        Arc::new(CachingSupplier::new(move || {
            climatology_at_scale(
                raw.as_ref(),
                desired.as_ref(),
                upscaler.as_deref(),
                transformer.as_ref(),
                admissible.as_ref(),
                &unit,
            )
        }))
    }
}

/// Wraps `generator` so that each pool keeps the generator's source
/// retrieval alive until the pool is dropped.
fn holding<R, B>(generator: GeneratorFactory<R>, source: Retriever<B>) -> GeneratorFactory<R>
where
    R: 'static,
    B: 'static,
{
    Arc::new(move |features: &BTreeSet<Feature>| {
        let _source = &source;
        generator(features)
    })
}

/// Left retrievers shared across the requests of a batch.
enum LeftSource<L> {
    Shared(Retriever<L>),
    PerWindow(BTreeMap<TimeWindow, Retriever<L>>),
}

impl<L> LeftSource<L> {
    fn for_window(&self, window: &TimeWindow) -> Option<Retriever<L>> {
        match self {
            Self::Shared(retriever) => Some(Arc::clone(retriever)),
            Self::PerWindow(retrievers) => retrievers.get(window).map(Arc::clone),
        }
    }
}

/// Rescales, transforms and filters the raw climatological data.
fn climatology_at_scale<L>(
    raw: &dyn Retrieve<L>,
    desired: Option<&TimeScale>,
    upscaler: Option<&dyn Upscaler<L>>,
    transformer: Option<&Transformer<L>>,
    admissible: Option<&ValueFilter<L>>,
    unit: &str,
) -> Result<Arc<Climatology>, PoolError>
where
    L: Clone + Into<f64> + Send + Sync + 'static,
{
    let series = collect(raw.retrieve()?)?;
    let mut data: BTreeMap<Feature, Vec<f64>> = BTreeMap::new();
    for s in series.iter() {
        let feature = s.metadata().feature().clone();
        let s = match desired {
            Some(d) if needs_upscaling(s.metadata().time_scale(), Some(d)) => {
                let upscaler = upscaler.ok_or_else(|| PoolError::InvalidConfig {
                    reason: format!(
                        "the climatological data for {feature} must be upscaled to {d}, but no upscaler was supplied"
                    ),
                })?;
                let upscaled = upscaler.upscale(s.clone(), d, &BTreeSet::new(), unit)?.into_parts().0;
                if upscaled.is_empty() && !s.is_empty() {
                    warn!(
                        "Failed to produce any upscaled event values for the climatological time-series \
                         of feature {feature}, which contained {} events. Is the desired time scale of {d} \
                         consistent with the data?",
                        s.len()
                    );
                }
                upscaled
            }
            _ => s.clone(),
        };
        let s = match transformer {
            Some(t) => t(s)?,
            None => s,
        };
        let s = match admissible {
            Some(f) => s.filter_values(|v| f(v)),
            None => s,
        };
        data.entry(feature)
            .or_default()
            .extend(s.events().iter().map(|e| e.value().clone().into()));
    }
    debug!(n_features = data.len(), "computed climatology");
    Ok(Arc::new(Climatology::new(data, unit)))
}
