//! An in-memory retrieval source, used by the CLI and by tests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;
use wres_datamodel::{Feature, TimeScale, TimeSeries, TimeWindow, slicer};

use crate::error::RetrievalError;
use crate::factory::RetrieverFactory;
use crate::source::{DatasetOrientation, Retriever, SeriesStream};

/// Counts of retrievals opened per side.
#[derive(Debug, Default)]
pub struct RetrievalCounts {
    left: AtomicUsize,
    right: AtomicUsize,
    baseline: AtomicUsize,
}

impl RetrievalCounts {
    /// Returns the number of left retrievals.
    pub fn left(&self) -> usize {
        self.left.load(Ordering::SeqCst)
    }

    /// Returns the number of right retrievals.
    pub fn right(&self) -> usize {
        self.right.load(Ordering::SeqCst)
    }

    /// Returns the number of baseline retrievals.
    pub fn baseline(&self) -> usize {
        self.baseline.load(Ordering::SeqCst)
    }

    fn record(&self, orientation: DatasetOrientation) {
        let counter = match orientation {
            DatasetOrientation::Left => &self.left,
            DatasetOrientation::Right => &self.right,
            DatasetOrientation::Baseline => &self.baseline,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serves time series held in memory, filtered by feature and window.
///
/// Windows are widened by the desired time scale period, so that the values
/// needed to upscale the first admissible instant are retrieved. Left data
/// is filtered by valid time only.
pub struct InMemoryRetrieverFactory<L, R, B> {
    left: Arc<Vec<TimeSeries<L>>>,
    right: Arc<Vec<TimeSeries<R>>>,
    baseline: Arc<Vec<TimeSeries<B>>>,
    desired_time_scale: Option<TimeScale>,
    counts: Arc<RetrievalCounts>,
}

impl<L, R, B> InMemoryRetrieverFactory<L, R, B> {
    /// Creates a factory over the given series.
    pub fn new(left: Vec<TimeSeries<L>>, right: Vec<TimeSeries<R>>, baseline: Vec<TimeSeries<B>>) -> Self {
        Self {
            left: Arc::new(left),
            right: Arc::new(right),
            baseline: Arc::new(baseline),
            desired_time_scale: None,
            counts: Arc::new(RetrievalCounts::default()),
        }
    }

    /// Sets the desired time scale used to widen windows.
    pub fn with_desired_time_scale(mut self, time_scale: Option<TimeScale>) -> Self {
        self.desired_time_scale = time_scale;
        self
    }

    /// Returns the retrieval counts.
    pub fn counts(&self) -> Arc<RetrievalCounts> {
        Arc::clone(&self.counts)
    }

    fn widen(&self, window: &TimeWindow) -> TimeWindow {
        match self.desired_time_scale.and_then(|s| s.period()) {
            Some(period) => window.widened_by(period),
            None => *window,
        }
    }
}

fn retriever<T>(
    data: &Arc<Vec<TimeSeries<T>>>,
    features: &BTreeSet<Feature>,
    window: Option<TimeWindow>,
    orientation: DatasetOrientation,
    counts: &Arc<RetrievalCounts>,
) -> Retriever<T>
where
    T: Clone + Send + Sync + 'static,
{
    let data = Arc::clone(data);
    let features = features.clone();
    let counts = Arc::clone(counts);
    Arc::new(move || -> Result<SeriesStream<T>, RetrievalError> {
        counts.record(orientation);
        trace!(%orientation, n_features = features.len(), "opening in-memory retrieval");
        let data = Arc::clone(&data);
        let features = features.clone();
        let stream = (0..data.len()).filter_map(move |i| {
            let series = &data[i];
            if !features.contains(series.metadata().feature()) {
                return None;
            }
            let series = match &window {
                Some(w) => slicer::filter_by_time_window(series.clone(), w),
                None => series.clone(),
            };
            (!series.is_empty()).then_some(Ok(series))
        });
        Ok(Box::new(stream))
    })
}

impl<L, R, B> RetrieverFactory<L, R, B> for InMemoryRetrieverFactory<L, R, B>
where
    L: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn left_retriever(&self, features: &BTreeSet<Feature>, window: Option<&TimeWindow>) -> Retriever<L> {
        let window = window.map(|w| self.widen(&w.valid_time_envelope()));
        retriever(&self.left, features, window, DatasetOrientation::Left, &self.counts)
    }

    fn right_retriever(&self, features: &BTreeSet<Feature>, window: &TimeWindow) -> Retriever<R> {
        let window = Some(self.widen(window));
        retriever(&self.right, features, window, DatasetOrientation::Right, &self.counts)
    }

    fn baseline_retriever(
        &self,
        features: &BTreeSet<Feature>,
        window: Option<&TimeWindow>,
    ) -> Retriever<B> {
        let window = window.map(|w| self.widen(w));
        retriever(&self.baseline, features, window, DatasetOrientation::Baseline, &self.counts)
    }
}
