//! Consumes one pool: supply, compute statistics, estimate uncertainty and
//! publish.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, debug_span, error, warn};
use wres_datamodel::{PairedPool, PoolMetadata, StatusLevel};

use crate::error::PoolError;
use crate::request::PoolRequest;
use crate::supplier::PoolSupply;

/// The outcome of processing one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolProcessingStatus {
    /// Statistics were computed and published.
    StatisticsPublished,
    /// Statistics were computed but not published because the evaluation
    /// failed meanwhile.
    StatisticsAvailableNotPublishedErrorState,
    /// The pool produced no statistics.
    StatisticsNotAvailable,
    /// Statistics were computed and the publisher chose not to publish them.
    StatisticsPublicationSkipped,
}

impl PoolProcessingStatus {
    /// Whether statistics were produced, published or not.
    pub fn has_statistics(&self) -> bool {
        !matches!(self, Self::StatisticsNotAvailable)
    }
}

/// The status of a processed pool with the number of warning and error
/// events raised while the pool was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOutcome {
    status: PoolProcessingStatus,
    warnings: usize,
    errors: usize,
}

impl PoolOutcome {
    /// Creates an outcome.
    pub fn new(status: PoolProcessingStatus, warnings: usize, errors: usize) -> Self {
        Self {
            status,
            warnings,
            errors,
        }
    }

    // --- Accessors ---

    pub fn status(&self) -> PoolProcessingStatus {
        self.status
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub fn errors(&self) -> usize {
        self.errors
    }
}

/// Shared failure flag of an evaluation.
#[derive(Debug, Default)]
pub struct EvaluationState {
    failed: AtomicBool,
}

impl EvaluationState {
    /// Creates a state that has not failed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the evaluation as failed.
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    /// Whether the evaluation has failed.
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Computes the nominal statistics of a pool, or `None` when the pool
/// supports none.
pub type StatisticsFn<L, R, S> = Arc<dyn Fn(&PairedPool<L, R>) -> Result<Option<S>, PoolError> + Send + Sync>;

/// Adds sampling-uncertainty estimates to nominal statistics.
pub type UncertaintyFn<L, R, S> = Arc<dyn Fn(&PairedPool<L, R>, S) -> Result<S, PoolError> + Send + Sync>;

/// Publishes statistics, returning `false` when publication was skipped.
pub type PublishFn<S> = Arc<dyn Fn(&PoolMetadata, S) -> Result<bool, PoolError> + Send + Sync>;

/// Processes one pool exactly once.
///
/// The supplier is released as soon as the pool is produced, and the pool
/// itself once statistics are computed. Any failure marks the evaluation as
/// failed, so that later processors stop early.
pub struct PoolProcessor<L, R, S> {
    request: PoolRequest,
    supplier: Mutex<Option<PoolSupply<L, R>>>,
    state: Arc<EvaluationState>,
    statistics: StatisticsFn<L, R, S>,
    uncertainty: Option<UncertaintyFn<L, R, S>>,
    publisher: PublishFn<S>,
}

impl<L, R, S> PoolProcessor<L, R, S> {
    /// Creates a processor for the pool supplied by `supplier`.
    pub fn new(
        request: PoolRequest,
        supplier: PoolSupply<L, R>,
        state: Arc<EvaluationState>,
        statistics: StatisticsFn<L, R, S>,
        publisher: PublishFn<S>,
    ) -> Self {
        Self {
            request,
            supplier: Mutex::new(Some(supplier)),
            state,
            statistics,
            uncertainty: None,
            publisher,
        }
    }

    /// Adds a sampling-uncertainty step after the nominal statistics.
    pub fn with_uncertainty(mut self, uncertainty: UncertaintyFn<L, R, S>) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }

    /// Returns the request being processed.
    pub fn request(&self) -> &PoolRequest {
        &self.request
    }

    /// Processes the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AlreadySupplied`] on a repeated call,
    /// [`PoolError::EvaluationFailed`] if the evaluation failed before the
    /// pool was supplied, or the failure of any step. Every failure except
    /// the repeated call marks the evaluation as failed.
    pub fn process(&self) -> Result<PoolOutcome, PoolError> {
        let Some(supplier) = self.supplier.lock().take() else {
            return Err(PoolError::AlreadySupplied {
                pool: self.request.to_string(),
            });
        };
        let _span = debug_span!("pool_processor", pool = %self.request).entered();

        self.run(supplier).inspect_err(|e| {
            if !matches!(e, PoolError::EvaluationFailed { .. }) {
                self.state.mark_failed();
            }
        })
    }

    fn run(&self, supplier: PoolSupply<L, R>) -> Result<PoolOutcome, PoolError> {
        if self.state.is_failed() {
            return Err(PoolError::EvaluationFailed {
                pool: self.request.to_string(),
            });
        }

        let pool = supplier.get()?;
        drop(supplier);

        let (warnings, errors) = report_status_events(pool.metadata());
        let status = self.consume(pool)?;
        Ok(PoolOutcome::new(status, warnings, errors))
    }

    fn consume(&self, pool: PairedPool<L, R>) -> Result<PoolProcessingStatus, PoolError> {
        if pool.is_empty() {
            debug!("pool contains no pairs, so no statistics were computed");
            return Ok(PoolProcessingStatus::StatisticsNotAvailable);
        }

        let Some(statistics) = (self.statistics)(&pool)? else {
            return Ok(PoolProcessingStatus::StatisticsNotAvailable);
        };
        let statistics = match &self.uncertainty {
            Some(uncertainty) => uncertainty(&pool, statistics)?,
            None => statistics,
        };
        let metadata = pool.metadata().clone();
        drop(pool);

        if self.state.is_failed() {
            warn!(
                pool = %metadata,
                "statistics were computed but not published because the evaluation has failed"
            );
            return Ok(PoolProcessingStatus::StatisticsAvailableNotPublishedErrorState);
        }

        if (self.publisher)(&metadata, statistics)? {
            Ok(PoolProcessingStatus::StatisticsPublished)
        } else {
            Ok(PoolProcessingStatus::StatisticsPublicationSkipped)
        }
    }
}

/// Logs the warning and error events of a pool and returns their counts.
fn report_status_events(metadata: &PoolMetadata) -> (usize, usize) {
    let (mut warnings, mut errors) = (0, 0);
    for event in metadata.status_events() {
        match event.level() {
            StatusLevel::Warn => {
                warnings += 1;
                warn!(pool = %metadata, stage = ?event.stage(), "{}", event.message());
            }
            StatusLevel::Error => {
                errors += 1;
                error!(pool = %metadata, stage = ?event.stage(), "{}", event.message());
            }
            StatusLevel::Debug | StatusLevel::Info => {
                debug!(pool = %metadata, stage = ?event.stage(), "{}", event.message());
            }
        }
    }
    (warnings, errors)
}

impl<L, R, S> fmt::Debug for PoolProcessor<L, R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolProcessor")
            .field("request", &self.request)
            .field("consumed", &self.supplier.lock().is_none())
            .field("uncertainty", &self.uncertainty.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use wres_datamodel::{
        Evaluation, EvaluationStage, EvaluationStatusEvent, Event, Feature, FeatureGroup, FeatureTuple, Pair,
        PoolBuilder, TimeSeries, TimeSeriesMetadata, TimeWindow,
    };

    use super::*;
    use crate::supplier::SupplyPool;

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    struct Once(Mutex<Option<PairedPool<f64, f64>>>);

    impl SupplyPool<PairedPool<f64, f64>> for Once {
        fn get(&self) -> Result<PairedPool<f64, f64>, PoolError> {
            self.0.lock().take().ok_or_else(|| PoolError::AlreadySupplied {
                pool: "once".into(),
            })
        }
    }

    struct Failing;

    impl SupplyPool<PairedPool<f64, f64>> for Failing {
        fn get(&self) -> Result<PairedPool<f64, f64>, PoolError> {
            Err(PoolError::InvalidConfig {
                reason: "boom".into(),
            })
        }
    }

    fn request() -> PoolRequest {
        let group = FeatureGroup::singleton(FeatureTuple::new(Feature::new("A"), Feature::new("A"), None));
        PoolRequest::new(
            PoolMetadata::new(Arc::new(Evaluation::new("CMS")), group, TimeWindow::new()),
            None,
        )
    }

    fn pool(values: &[f64]) -> PoolSupply<f64, f64> {
        pool_with_events(values, Vec::new())
    }

    fn pool_with_events(values: &[f64], events: Vec<EvaluationStatusEvent>) -> PoolSupply<f64, f64> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series = TimeSeries::new(
            TimeSeriesMetadata::new(Feature::new("A"), "Q", "CMS"),
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Event::new(t0 + chrono::TimeDelta::hours(i as i64), Pair::new(*v, *v)))
                .collect(),
        )
        .unwrap();
        let pool = PoolBuilder::new()
            .metadata(request().metadata().clone().with_status_events(events))
            .main([series])
            .build()
            .unwrap();
        Arc::new(Once(Mutex::new(Some(pool))))
    }

    fn count() -> StatisticsFn<f64, f64, usize> {
        Arc::new(|p: &PairedPool<f64, f64>| -> Result<Option<usize>, PoolError> {
            Ok(Some(p.main_series().map(TimeSeries::len).sum()))
        })
    }

    fn publish(result: bool) -> PublishFn<usize> {
        Arc::new(move |_: &PoolMetadata, _: usize| -> Result<bool, PoolError> { Ok(result) })
    }

    // ---------------------------------------------------------------
    // Tests
    // ---------------------------------------------------------------

    #[test]
    fn publishes_statistics() {
        let state = Arc::new(EvaluationState::new());
        let processor = PoolProcessor::new(request(), pool(&[1.0, 2.0]), state, count(), publish(true));
        assert_eq!(processor.process().unwrap().status(), PoolProcessingStatus::StatisticsPublished);
    }

    #[test]
    fn second_call_rejected() {
        let state = Arc::new(EvaluationState::new());
        let processor = PoolProcessor::new(request(), pool(&[1.0]), Arc::clone(&state), count(), publish(true));
        processor.process().unwrap();
        assert!(matches!(processor.process(), Err(PoolError::AlreadySupplied { .. })));
        assert!(!state.is_failed());
    }

    #[test]
    fn empty_pool_has_no_statistics() {
        let state = Arc::new(EvaluationState::new());
        let processor = PoolProcessor::new(request(), pool(&[]), state, count(), publish(true));
        assert_eq!(processor.process().unwrap().status(), PoolProcessingStatus::StatisticsNotAvailable);
    }

    #[test]
    fn failed_evaluation_stops_early() {
        let state = Arc::new(EvaluationState::new());
        state.mark_failed();
        let processor = PoolProcessor::new(request(), pool(&[1.0]), state, count(), publish(true));
        assert!(matches!(processor.process(), Err(PoolError::EvaluationFailed { .. })));
    }

    #[test]
    fn failure_after_statistics_withholds_publication() {
        let state = Arc::new(EvaluationState::new());
        let flag = Arc::clone(&state);
        let statistics: StatisticsFn<f64, f64, usize> =
            Arc::new(move |_: &PairedPool<f64, f64>| -> Result<Option<usize>, PoolError> {
                flag.mark_failed();
                Ok(Some(1))
            });
        let processor = PoolProcessor::new(request(), pool(&[1.0]), state, statistics, publish(true));
        assert_eq!(
            processor.process().unwrap().status(),
            PoolProcessingStatus::StatisticsAvailableNotPublishedErrorState
        );
    }

    #[test]
    fn supplier_failure_marks_evaluation_failed() {
        let state = Arc::new(EvaluationState::new());
        let processor = PoolProcessor::new(request(), Arc::new(Failing), Arc::clone(&state), count(), publish(true));
        assert!(processor.process().is_err());
        assert!(state.is_failed());
    }

    #[test]
    fn uncertainty_applied_before_publication() {
        let state = Arc::new(EvaluationState::new());
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let publisher: PublishFn<usize> = Arc::new(move |_: &PoolMetadata, s: usize| -> Result<bool, PoolError> {
            *sink.lock() = Some(s);
            Ok(false)
        });
        let uncertainty: UncertaintyFn<f64, f64, usize> =
            Arc::new(|_: &PairedPool<f64, f64>, s: usize| -> Result<usize, PoolError> { Ok(s * 10) });
        let processor = PoolProcessor::new(request(), pool(&[1.0, 2.0, 3.0]), state, count(), publisher)
            .with_uncertainty(uncertainty);
        assert_eq!(
            processor.process().unwrap().status(),
            PoolProcessingStatus::StatisticsPublicationSkipped
        );
        assert_eq!(*seen.lock(), Some(30));
    }

    #[test]
    fn status_events_are_counted() {
        let events = vec![
            EvaluationStatusEvent::warn(EvaluationStage::PoolCreation, "failed to identify any pairs for B"),
            EvaluationStatusEvent::warn(EvaluationStage::Rescaling, "no upscaled values"),
            EvaluationStatusEvent::new(StatusLevel::Error, EvaluationStage::Pairing, "bad pairs"),
            EvaluationStatusEvent::new(StatusLevel::Info, EvaluationStage::Retrieval, "read 1 series"),
        ];
        let state = Arc::new(EvaluationState::new());
        let processor = PoolProcessor::new(request(), pool_with_events(&[1.0], events), state, count(), publish(true));
        let outcome = processor.process().unwrap();
        assert_eq!(outcome.status(), PoolProcessingStatus::StatisticsPublished);
        assert_eq!(outcome.warnings(), 2);
        assert_eq!(outcome.errors(), 1);
    }

    #[test]
    fn empty_pool_still_reports_its_events() {
        let events = vec![EvaluationStatusEvent::warn(EvaluationStage::PoolCreation, "no pairs")];
        let state = Arc::new(EvaluationState::new());
        let processor = PoolProcessor::new(request(), pool_with_events(&[], events), state, count(), publish(true));
        let outcome = processor.process().unwrap();
        assert_eq!(outcome.status(), PoolProcessingStatus::StatisticsNotAvailable);
        assert_eq!(outcome.warnings(), 1);
    }
}
