//! The per-pool supplier: retrieve, rescale, transform, pair, cross-pair and
//! assemble one pool.
//!
//! A [`PoolSupplier`] is configured through a [`PoolSupplierConfig`] and may
//! be invoked exactly once. Left data is read fully into memory; right and
//! baseline data are streamed one series at a time.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::TimeDelta;
use parking_lot::Mutex;
use tracing::{debug, debug_span};
use wres_datamodel::{
    Climatology, EvaluationStage, EvaluationStatusEvent, Feature, FeatureGroup, FeatureTuple,
    PairedPool, Pair, PoolBuilder, PoolMetadata, StatusLevel, TimeScale, TimeSeries, TimeWindow,
    needs_upscaling, slicer,
};
use wres_pairing::{CrossPair, CrossPairer, Pairer};
use wres_rescale::{ScaleValidationEvent, Upscaler};
use wres_retrieval::{CachingSupplier, DatasetOrientation, Retriever};

use crate::baseline::{BaselineGenerator, GeneratorFactory};
use crate::correlator::FeatureCorrelator;
use crate::cross_pairing::{self, PairsByFeature};
use crate::error::PoolError;
use crate::transform::{SeriesFilter, Shim, Transformer, ValueFilter};

/// A single-use producer of one pool.
pub trait SupplyPool<T>: Send + Sync {
    /// Produces the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AlreadySupplied`] on a repeated call, or the
    /// failure that prevented the pool from being created.
    fn get(&self) -> Result<T, PoolError>;
}

/// A shared supplier of paired pools.
pub type PoolSupply<L, R> = Arc<dyn SupplyPool<PairedPool<L, R>>>;

/// Climatology computed once and shared by every pool of a batch.
pub type ClimatologySupplier = Arc<CachingSupplier<Arc<Climatology>, PoolError>>;

/// Everything a [`PoolSupplier`] needs, as named fields.
///
/// `left`, `right`, `pairer` and `metadata` are required. A baseline comes
/// either from `baseline` (with a `baseline_shim`) or from
/// `baseline_generator`, never both, and only when `baseline_metadata` is
/// set. `cross_pairer` and `cross_pair` are set together or not at all.
/// Transformers, filters and admissibility tests are optional; an absent
/// one leaves the data unchanged.
pub struct PoolSupplierConfig<L, R, B> {
    /// Left data, read fully into memory.
    pub left: Option<Retriever<L>>,
    /// Right data, streamed.
    pub right: Option<Retriever<R>>,
    /// Baseline data, streamed.
    pub baseline: Option<Retriever<B>>,
    /// Generates baseline series shaped like the right series.
    pub baseline_generator: Option<GeneratorFactory<R>>,
    /// Adapts baseline series to the right-hand value type.
    pub baseline_shim: Option<Shim<B, R>>,
    /// Shared climatology.
    pub climatology: Option<ClimatologySupplier>,
    /// Upscales left series.
    pub left_upscaler: Option<Arc<dyn Upscaler<L>>>,
    /// Upscales right series.
    pub right_upscaler: Option<Arc<dyn Upscaler<R>>>,
    /// Upscales baseline series after the shim.
    pub baseline_upscaler: Option<Arc<dyn Upscaler<R>>>,
    /// Pairs left with right or baseline series.
    pub pairer: Option<Arc<dyn Pairer<L, R>>>,
    /// Cross-pairs main and baseline pairs.
    pub cross_pairer: Option<Arc<dyn CrossPairer<Pair<L, R>>>>,
    /// How to cross-pair.
    pub cross_pair: Option<CrossPair>,
    /// Transforms left series after rescaling.
    pub left_transformer: Option<Transformer<L>>,
    /// Transforms right series after rescaling.
    pub right_transformer: Option<Transformer<R>>,
    /// Transforms baseline series after rescaling.
    pub baseline_transformer: Option<Transformer<R>>,
    /// Admits right series for pairing.
    pub right_filter: Option<SeriesFilter<R>>,
    /// Admits baseline series for pairing.
    pub baseline_filter: Option<SeriesFilter<R>>,
    /// Admits left values.
    pub left_admissible: Option<ValueFilter<L>>,
    /// Admits right values.
    pub right_admissible: Option<ValueFilter<R>>,
    /// Admits baseline values.
    pub baseline_admissible: Option<ValueFilter<R>>,
    /// Valid-time shift of the left data.
    pub left_time_shift: TimeDelta,
    /// Valid-time shift of the right data.
    pub right_time_shift: TimeDelta,
    /// Valid-time shift of the baseline data.
    pub baseline_time_shift: TimeDelta,
    /// Spacing of paired values when upscaling.
    pub pair_frequency: Option<TimeDelta>,
    /// Main metadata.
    pub metadata: Option<PoolMetadata>,
    /// Baseline metadata.
    pub baseline_metadata: Option<PoolMetadata>,
}

impl<L, R, B> Default for PoolSupplierConfig<L, R, B> {
    fn default() -> Self {
        Self {
            left: None,
            right: None,
            baseline: None,
            baseline_generator: None,
            baseline_shim: None,
            climatology: None,
            left_upscaler: None,
            right_upscaler: None,
            baseline_upscaler: None,
            pairer: None,
            cross_pairer: None,
            cross_pair: None,
            left_transformer: None,
            right_transformer: None,
            baseline_transformer: None,
            right_filter: None,
            baseline_filter: None,
            left_admissible: None,
            right_admissible: None,
            baseline_admissible: None,
            left_time_shift: TimeDelta::zero(),
            right_time_shift: TimeDelta::zero(),
            baseline_time_shift: TimeDelta::zero(),
            pair_frequency: None,
            metadata: None,
            baseline_metadata: None,
        }
    }
}

impl<L, R, B> Clone for PoolSupplierConfig<L, R, B> {
    fn clone(&self) -> Self {
        Self {
            left: self.left.clone(),
            right: self.right.clone(),
            baseline: self.baseline.clone(),
            baseline_generator: self.baseline_generator.clone(),
            baseline_shim: self.baseline_shim.clone(),
            climatology: self.climatology.clone(),
            left_upscaler: self.left_upscaler.clone(),
            right_upscaler: self.right_upscaler.clone(),
            baseline_upscaler: self.baseline_upscaler.clone(),
            pairer: self.pairer.clone(),
            cross_pairer: self.cross_pairer.clone(),
            cross_pair: self.cross_pair,
            left_transformer: self.left_transformer.clone(),
            right_transformer: self.right_transformer.clone(),
            baseline_transformer: self.baseline_transformer.clone(),
            right_filter: self.right_filter.clone(),
            baseline_filter: self.baseline_filter.clone(),
            left_admissible: self.left_admissible.clone(),
            right_admissible: self.right_admissible.clone(),
            baseline_admissible: self.baseline_admissible.clone(),
            left_time_shift: self.left_time_shift,
            right_time_shift: self.right_time_shift,
            baseline_time_shift: self.baseline_time_shift,
            pair_frequency: self.pair_frequency,
            metadata: self.metadata.clone(),
            baseline_metadata: self.baseline_metadata.clone(),
        }
    }
}

impl<L, R, B> fmt::Debug for PoolSupplierConfig<L, R, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSupplierConfig")
            .field("metadata", &self.metadata)
            .field("baseline_metadata", &self.baseline_metadata)
            .field("has_baseline_source", &self.baseline.is_some())
            .field("has_baseline_generator", &self.baseline_generator.is_some())
            .field("has_climatology", &self.climatology.is_some())
            .field("cross_pair", &self.cross_pair)
            .field("pair_frequency", &self.pair_frequency)
            .finish_non_exhaustive()
    }
}

fn invalid(reason: impl Into<String>) -> PoolError {
    PoolError::InvalidConfig {
        reason: reason.into(),
    }
}

/// A validated configuration, owned until the supplier is invoked.
struct Inputs<L, R, B> {
    left: Retriever<L>,
    right: Retriever<R>,
    baseline: Option<(Retriever<B>, Shim<B, R>)>,
    baseline_generator: Option<GeneratorFactory<R>>,
    climatology: Option<ClimatologySupplier>,
    left_upscaler: Option<Arc<dyn Upscaler<L>>>,
    right_upscaler: Option<Arc<dyn Upscaler<R>>>,
    baseline_upscaler: Option<Arc<dyn Upscaler<R>>>,
    pairer: Arc<dyn Pairer<L, R>>,
    cross_pairing: Option<(Arc<dyn CrossPairer<Pair<L, R>>>, CrossPair)>,
    left_transformer: Option<Transformer<L>>,
    right_transformer: Option<Transformer<R>>,
    baseline_transformer: Option<Transformer<R>>,
    right_filter: Option<SeriesFilter<R>>,
    baseline_filter: Option<SeriesFilter<R>>,
    left_admissible: Option<ValueFilter<L>>,
    right_admissible: Option<ValueFilter<R>>,
    baseline_admissible: Option<ValueFilter<R>>,
    left_time_shift: TimeDelta,
    right_time_shift: TimeDelta,
    baseline_time_shift: TimeDelta,
    pair_frequency: Option<TimeDelta>,
    metadata: PoolMetadata,
    baseline_metadata: Option<PoolMetadata>,
}

enum State<L, R, B> {
    Unconsumed(Box<Inputs<L, R, B>>),
    Consumed,
}

/// Supplies one pool, exactly once.
///
/// The supplier owns its data sources until invoked; invoking it moves them
/// out and drops them once the pool is built, so large retrieved buffers are
/// released. A second invocation fails with [`PoolError::AlreadySupplied`].
pub struct PoolSupplier<L, R, B> {
    metadata: PoolMetadata,
    state: Mutex<State<L, R, B>>,
}

impl<L, R, B> PoolSupplier<L, R, B> {
    /// Validates `config` and creates a supplier.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if a required field is absent, a
    /// baseline source lacks a shim, the pair frequency is negative, the
    /// baseline metadata disagrees with the baseline source or generator,
    /// both a baseline source and a generator are set, or only one of
    /// `cross_pairer` and `cross_pair` is set.
    pub fn new(config: PoolSupplierConfig<L, R, B>) -> Result<Self, PoolError> {
        let PoolSupplierConfig {
            left,
            right,
            baseline,
            baseline_generator,
            baseline_shim,
            climatology,
            left_upscaler,
            right_upscaler,
            baseline_upscaler,
            pairer,
            cross_pairer,
            cross_pair,
            left_transformer,
            right_transformer,
            baseline_transformer,
            right_filter,
            baseline_filter,
            left_admissible,
            right_admissible,
            baseline_admissible,
            left_time_shift,
            right_time_shift,
            baseline_time_shift,
            pair_frequency,
            metadata,
            baseline_metadata,
        } = config;

        let metadata = metadata.ok_or_else(|| invalid("a pool supplier requires metadata"))?;
        let left = left.ok_or_else(|| invalid("a pool supplier requires a left retriever"))?;
        let right = right.ok_or_else(|| invalid("a pool supplier requires a right retriever"))?;
        let pairer = pairer.ok_or_else(|| invalid("a pool supplier requires a pairer"))?;

        if let Some(frequency) = pair_frequency.filter(|f| *f < TimeDelta::zero()) {
            return Err(invalid(format!(
                "the pair frequency cannot be negative, got {frequency}"
            )));
        }
        if baseline.is_some() && baseline_generator.is_some() {
            return Err(invalid(
                "a baseline source and a baseline generator cannot both be supplied",
            ));
        }
        let has_baseline_data = baseline.is_some() || baseline_generator.is_some();
        if has_baseline_data != baseline_metadata.is_some() {
            return Err(invalid(
                "baseline metadata must be supplied if and only if a baseline source or generator is",
            ));
        }
        let baseline = match (baseline, baseline_shim) {
            (Some(retriever), Some(shim)) => Some((retriever, shim)),
            (Some(_), None) => {
                return Err(invalid(
                    "a baseline shim is required to adapt the baseline data to the right data",
                ));
            }
            (None, _) => None,
        };
        let cross_pairing = match (cross_pairer, cross_pair) {
            (Some(pairer), Some(cross)) => Some((pairer, cross)),
            (None, None) => None,
            _ => {
                return Err(invalid(
                    "a cross-pairer and a cross-pair declaration must be supplied together",
                ));
            }
        };

        let inputs = Inputs {
            left,
            right,
            baseline,
            baseline_generator,
            climatology,
            left_upscaler,
            right_upscaler,
            baseline_upscaler,
            pairer,
            cross_pairing,
            left_transformer,
            right_transformer,
            baseline_transformer,
            right_filter,
            baseline_filter,
            left_admissible,
            right_admissible,
            baseline_admissible,
            left_time_shift,
            right_time_shift,
            baseline_time_shift,
            pair_frequency,
            metadata: metadata.clone(),
            baseline_metadata,
        };
        Ok(Self {
            metadata,
            state: Mutex::new(State::Unconsumed(Box::new(inputs))),
        })
    }

    /// Returns the main metadata of the pool to be supplied.
    pub fn metadata(&self) -> &PoolMetadata {
        &self.metadata
    }

    /// Whether the supplier has been invoked.
    pub fn is_consumed(&self) -> bool {
        matches!(*self.state.lock(), State::Consumed)
    }
}

impl<L, R, B> SupplyPool<PairedPool<L, R>> for PoolSupplier<L, R, B>
where
    L: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    B: Send + Sync + 'static,
{
    fn get(&self) -> Result<PairedPool<L, R>, PoolError> {
        let state = std::mem::replace(&mut *self.state.lock(), State::Consumed);
        let State::Unconsumed(inputs) = state else {
            return Err(PoolError::AlreadySupplied {
                pool: self.metadata.to_string(),
            });
        };

        let _span = debug_span!("pool_supplier", pool = %self.metadata).entered();
        let start = Instant::now();
        let pool = inputs.create_pool().map_err(|e| e.in_pool(&self.metadata))?;
        debug!(
            n_main = pool.main_len(),
            n_baseline = pool.baseline_series().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "created pool"
        );
        Ok(pool)
    }
}

impl<L, R, B> fmt::Debug for PoolSupplier<L, R, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSupplier")
            .field("metadata", &self.metadata)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

// ---------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------

/// Per-side settings for the right or baseline data.
struct Side<'a, R> {
    orientation: DatasetOrientation,
    upscaler: Option<&'a dyn Upscaler<R>>,
    transformer: Option<&'a Transformer<R>>,
    filter: Option<&'a SeriesFilter<R>>,
    admissible: Option<&'a ValueFilter<R>>,
    time_shift: TimeDelta,
    window: TimeWindow,
}

/// The outcome of pairing one left series with one right or baseline series.
struct SeriesPairs<L, R> {
    pairs: TimeSeries<Pair<L, R>>,
    /// The transformed left series, before missing values are removed.
    left: TimeSeries<L>,
    /// The rescaled and transformed right series, before missing values are
    /// removed.
    right: TimeSeries<R>,
}

/// Status events in first-raised order, without duplicates.
#[derive(Default)]
struct StatusEvents(Vec<EvaluationStatusEvent>);

impl StatusEvents {
    fn push(&mut self, event: EvaluationStatusEvent) {
        if !self.0.contains(&event) {
            self.0.push(event);
        }
    }

    fn extend_validation(&mut self, events: Vec<ScaleValidationEvent>) {
        for event in events {
            debug!(level = ?event.level(), "{}", event.message());
            if event.level() >= StatusLevel::Warn {
                self.push(event.to_status_event());
            }
        }
    }
}

fn keep<T>(series: TimeSeries<T>, admissible: Option<&ValueFilter<T>>) -> TimeSeries<T> {
    match admissible {
        Some(f) => series.filter_values(|v| f(v)),
        None => series,
    }
}

fn transform<T>(series: TimeSeries<T>, transformer: Option<&Transformer<T>>) -> Result<TimeSeries<T>, PoolError> {
    match transformer {
        Some(t) => t(series),
        None => Ok(series),
    }
}

fn describe(tuples: impl Iterator<Item = String>) -> String {
    let names: Vec<String> = tuples.collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

impl<L, R, B> Inputs<L, R, B>
where
    L: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    B: Send + Sync + 'static,
{
    fn create_pool(self: Box<Self>) -> Result<PairedPool<L, R>, PoolError> {
        let climatology = match &self.climatology {
            Some(supplier) => Some(Arc::clone(supplier.get()?)),
            None => None,
        };

        let left = self.left_series()?;
        debug!(n_features = left.len(), "read left data");

        let correlator = FeatureCorrelator::new(self.metadata.feature_group());
        let mut status = StatusEvents::default();

        let generator = match &self.baseline_generator {
            Some(factory) => Some(factory(&self.metadata.feature_group().baseline_features())?),
            None => None,
        };

        let right_side = Side {
            orientation: DatasetOrientation::Right,
            upscaler: self.right_upscaler.as_deref(),
            transformer: self.right_transformer.as_ref(),
            filter: self.right_filter.as_ref(),
            admissible: self.right_admissible.as_ref(),
            time_shift: self.right_time_shift,
            window: *self.metadata.time_window(),
        };
        let right = self
            .right
            .retrieve()?
            .map(|r| r.map_err(PoolError::from));
        let (main, generated) = self.pairs_per_feature(
            &left,
            right,
            &right_side,
            &correlator,
            generator.as_deref(),
            &mut status,
        )?;

        let baseline = match (&self.baseline, &self.baseline_metadata) {
            (Some((retriever, shim)), Some(baseline_metadata)) => {
                let side = Side {
                    orientation: DatasetOrientation::Baseline,
                    upscaler: self.baseline_upscaler.as_deref(),
                    transformer: self.baseline_transformer.as_ref(),
                    filter: self.baseline_filter.as_ref(),
                    admissible: self.baseline_admissible.as_ref(),
                    time_shift: self.baseline_time_shift,
                    window: *baseline_metadata.time_window(),
                };
                let stream = retriever
                    .retrieve()?
                    .map(|r| r.map(|s| shim(s)).map_err(PoolError::from));
                let (pairs, _) = self.pairs_per_feature(&left, stream, &side, &correlator, None, &mut status)?;
                Some(pairs)
            }
            _ if generator.is_some() => Some(generated),
            _ => None,
        };
        drop(left);

        let (main, baseline) = match &self.cross_pairing {
            Some((pairer, cross)) => {
                let _span = debug_span!("cross_pair", scope = ?cross.scope()).entered();
                cross_pairing::cross_pair(main, baseline, pairer.as_ref(), cross.scope())?
            }
            None => (main, baseline),
        };

        self.assemble(main, baseline, climatology, status)
    }

    fn left_series(&self) -> Result<BTreeMap<Feature, Vec<TimeSeries<L>>>, PoolError> {
        let mut by_feature: BTreeMap<Feature, Vec<TimeSeries<L>>> = BTreeMap::new();
        for series in self.left.retrieve()? {
            let series = slicer::apply_offset_to_valid_times(series?, self.left_time_shift)?;
            by_feature
                .entry(series.metadata().feature().clone())
                .or_default()
                .push(series);
        }
        Ok(by_feature)
    }

    /// Pairs each streamed series with its correlated left series, and
    /// generates baseline pairs from the rescaled right series when a
    /// generator is supplied.
    fn pairs_per_feature(
        &self,
        left: &BTreeMap<Feature, Vec<TimeSeries<L>>>,
        stream: impl Iterator<Item = Result<TimeSeries<R>, PoolError>>,
        side: &Side<'_, R>,
        correlator: &FeatureCorrelator,
        generator: Option<&dyn BaselineGenerator<R>>,
        status: &mut StatusEvents,
    ) -> Result<(PairsByFeature<L, R>, PairsByFeature<L, R>), PoolError> {
        let mut main: PairsByFeature<L, R> = BTreeMap::new();
        let mut generated: PairsByFeature<L, R> = BTreeMap::new();
        let mut n_series = 0usize;

        for series in stream {
            let series = slicer::apply_offset_to_valid_times(series?, side.time_shift)?;
            n_series += 1;
            if side.filter.is_some_and(|f| !f(&series)) {
                debug!(
                    orientation = %side.orientation,
                    feature = %series.metadata().feature(),
                    "series excluded by filter"
                );
                continue;
            }

            let feature = series.metadata().feature().clone();
            let tuples = correlator.tuples(side.orientation, &feature);
            if tuples.is_empty() {
                debug!(orientation = %side.orientation, %feature, "no feature tuple for series");
                continue;
            }

            for tuple in tuples {
                let Some(lefts) = left.get(tuple.left()) else {
                    continue;
                };
                for l in lefts {
                    let paired = self.series_pairs(l, series.clone(), side, status)?;
                    if !paired.pairs.is_empty() {
                        main.entry(tuple.clone()).or_default().push(paired.pairs);
                    }
                    if let (Some(g), Some(baseline_feature)) = (generator, tuple.baseline()) {
                        let pairs = self.generated_pairs(g, baseline_feature, paired.left, paired.right)?;
                        if !pairs.is_empty() {
                            generated.entry(tuple.clone()).or_default().push(pairs);
                        }
                    }
                }
            }
        }

        debug!(orientation = %side.orientation, n_series, n_features = main.len(), "paired streamed series");
        for pairs in main.values_mut().chain(generated.values_mut()) {
            slicer::sort_by_time(pairs);
        }
        Ok((main, generated))
    }

    /// Rescales, transforms, filters, pairs and trims one pair of series.
    fn series_pairs(
        &self,
        left: &TimeSeries<L>,
        right: TimeSeries<R>,
        side: &Side<'_, R>,
        status: &mut StatusEvents,
    ) -> Result<SeriesPairs<L, R>, PoolError> {
        let desired = self.metadata.time_scale();
        let lower = desired.and_then(TimeScale::period).unwrap_or_else(TimeDelta::zero);
        let left = slicer::snip(left.clone(), &right, lower, TimeDelta::zero());

        if left.is_empty() || right.is_empty() {
            return Ok(SeriesPairs {
                pairs: TimeSeries::empty(right.metadata().clone()),
                left,
                right,
            });
        }

        let upscale_left = needs_upscaling(left.metadata().time_scale(), desired);
        let upscale_right = needs_upscaling(right.metadata().time_scale(), desired);

        if let Some(d) = desired {
            for (orientation, metadata) in [
                (DatasetOrientation::Left, left.metadata()),
                (side.orientation, right.metadata()),
            ] {
                if metadata.time_scale().is_none() {
                    status.push(EvaluationStatusEvent::warn(
                        EvaluationStage::Rescaling,
                        format!(
                            "The {orientation} time-series for feature {} has no declared time scale, \
                             so it was assumed to have the desired time scale of {d}.",
                            metadata.feature()
                        ),
                    ));
                }
            }
        }

        let ends_at = match desired {
            Some(d) if upscale_left || upscale_right => {
                slicer::regular_intersecting_valid_times(&left, &right, &side.window, d, self.pair_frequency)
            }
            _ => BTreeSet::new(),
        };
        let unit = self.metadata.evaluation().measurement_unit();

        let left = match desired {
            Some(d) if upscale_left => {
                let upscaler = self.left_upscaler.as_deref().ok_or_else(|| PoolError::MissingUpscaler {
                    orientation: DatasetOrientation::Left,
                    pool: self.metadata.to_string(),
                })?;
                let (series, events) = upscaler.upscale(left, d, &ends_at, unit)?.into_parts();
                status.extend_validation(events);
                series
            }
            _ => left,
        };
        let right = match desired {
            Some(d) if upscale_right => {
                let upscaler = side.upscaler.ok_or_else(|| PoolError::MissingUpscaler {
                    orientation: side.orientation,
                    pool: self.metadata.to_string(),
                })?;
                let (series, events) = upscaler.upscale(right, d, &ends_at, unit)?.into_parts();
                status.extend_validation(events);
                series
            }
            _ => right,
        };

        let left = transform(left, self.left_transformer.as_ref())?;
        let right = transform(right, side.transformer)?;

        let left_admissible = keep(left.clone(), self.left_admissible.as_ref());
        let right_admissible = keep(right.clone(), side.admissible);

        let pairs = self.pairer.pair(&left_admissible, &right_admissible)?;
        let pairs = slicer::filter_by_time_window(pairs, &side.window);

        Ok(SeriesPairs { pairs, left, right })
    }

    /// Generates a baseline series from the rescaled and transformed right
    /// template, transforms it like right data and pairs it with the
    /// transformed left series.
    fn generated_pairs(
        &self,
        generator: &dyn BaselineGenerator<R>,
        baseline_feature: &Feature,
        left: TimeSeries<L>,
        template: TimeSeries<R>,
    ) -> Result<TimeSeries<Pair<L, R>>, PoolError> {
        let template = template.map_metadata(|m| m.with_feature(baseline_feature.clone()));
        let generated = generator.generate(&template)?;
        let generated = transform(generated, self.right_transformer.as_ref())?;
        let pairs = self.pairer.pair(&left, &generated)?;
        let window = self
            .baseline_metadata
            .as_ref()
            .map_or(*self.metadata.time_window(), |m| *m.time_window());
        Ok(slicer::filter_by_time_window(pairs, &window))
    }

    /// Builds one mini-pool per feature tuple and wraps them in the pool.
    fn assemble(
        &self,
        mut main: PairsByFeature<L, R>,
        mut baseline: Option<PairsByFeature<L, R>>,
        climatology: Option<Arc<Climatology>>,
        mut status: StatusEvents,
    ) -> Result<PairedPool<L, R>, PoolError> {
        let desired = self.metadata.time_scale().copied();
        let group = self.metadata.feature_group();
        let window = self.metadata.time_window();

        let with_pairs = |pairs: &PairsByFeature<L, R>| {
            describe(
                pairs
                    .iter()
                    .filter(|(_, s)| s.iter().any(|p| !p.is_empty()))
                    .map(|(t, _)| t.to_string_short()),
            )
        };
        let main_available = with_pairs(&main);
        let baseline_available = baseline.as_ref().map(with_pairs).unwrap_or_default();

        let mut builder = PoolBuilder::new();
        for tuple in group.features() {
            let pairs = main.remove(tuple).unwrap_or_default();
            if pairs.iter().all(TimeSeries::is_empty) {
                let message = format!(
                    "When evaluating a pool for time window {window}, failed to identify any pairs for \
                     feature: {}. Pairs were available for these features: {main_available}.",
                    tuple.to_string_short()
                );
                debug!("{message}");
                status.push(EvaluationStatusEvent::warn(EvaluationStage::PoolCreation, message));
            }

            let mini_group = FeatureGroup::new(group.name(), [tuple.clone()])?;
            let mut mini = PoolBuilder::new()
                .metadata(
                    self.metadata
                        .clone()
                        .with_feature_group(mini_group.clone())
                        .with_time_scale(desired),
                )
                .main(pairs)
                .climatology(climatology.clone());

            if let Some(baseline_metadata) = &self.baseline_metadata {
                let pairs = baseline
                    .as_mut()
                    .and_then(|b| b.remove(tuple))
                    .unwrap_or_default();
                if pairs.iter().all(TimeSeries::is_empty) {
                    let message = self.missing_baseline_message(window, tuple, &baseline_available);
                    debug!("{message}");
                    status.push(EvaluationStatusEvent::warn(EvaluationStage::PoolCreation, message));
                }
                mini = mini
                    .baseline_metadata(Some(
                        baseline_metadata
                            .clone()
                            .with_feature_group(mini_group)
                            .with_time_scale(desired),
                    ))
                    .baseline(pairs);
            }
            builder = builder.add_pool(mini.build()?);
        }

        let pool = builder
            .metadata(
                self.metadata
                    .clone()
                    .with_time_scale(desired)
                    .with_status_events(status.0),
            )
            .baseline_metadata(
                self.baseline_metadata
                    .clone()
                    .map(|m| m.with_time_scale(desired)),
            )
            .climatology(climatology)
            .build()?;
        Ok(pool)
    }

    fn missing_baseline_message(&self, window: &TimeWindow, tuple: &FeatureTuple, available: &str) -> String {
        format!(
            "When evaluating a pool for time window {window}, failed to identify any baseline pairs for \
             feature: {}. Baseline pairs were available for these features: {available}.",
            tuple.to_string_short()
        )
    }
}
