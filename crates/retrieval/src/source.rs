//! Dataset roles, data types and the lazy retrieval capability.

use std::fmt;
use std::sync::Arc;

use wres_datamodel::TimeSeries;

use crate::error::RetrievalError;

/// The role of a dataset in an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetOrientation {
    /// The verifying dataset, usually observations.
    Left,
    /// The dataset being evaluated.
    Right,
    /// The reference dataset used for skill.
    Baseline,
}

impl fmt::Display for DatasetOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Baseline => "baseline",
        };
        f.write_str(s)
    }
}

/// The kind of data a dataset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Observed values.
    Observations,
    /// Simulated values without forecast reference times.
    Simulations,
    /// Analyses with reference times.
    Analyses,
    /// Single-valued forecasts.
    SingleValuedForecasts,
    /// Ensemble forecasts.
    EnsembleForecasts,
}

impl DataType {
    /// Whether the data is forecast-like, with reference times.
    pub fn is_forecast(&self) -> bool {
        matches!(self, Self::SingleValuedForecasts | Self::EnsembleForecasts)
    }

    /// Whether one retrieval can serve every time window.
    pub fn is_observation_like(&self) -> bool {
        matches!(self, Self::Observations | Self::Simulations)
    }
}

/// A lazily evaluated sequence of time series.
///
/// Dropping the stream releases any resource it holds, on every exit path.
pub type SeriesStream<T> = Box<dyn Iterator<Item = Result<TimeSeries<T>, RetrievalError>> + Send>;

/// Produces a fresh lazy stream of time series on each call.
pub trait Retrieve<T>: Send + Sync {
    /// Opens the stream.
    ///
    /// # Errors
    ///
    /// Returns a [`RetrievalError`] if the source cannot be opened.
    fn retrieve(&self) -> Result<SeriesStream<T>, RetrievalError>;

    /// Whether every call replays one memoized retrieval.
    fn is_memoized(&self) -> bool {
        false
    }
}

impl<T, F> Retrieve<T> for F
where
    F: Fn() -> Result<SeriesStream<T>, RetrievalError> + Send + Sync,
{
    fn retrieve(&self) -> Result<SeriesStream<T>, RetrievalError> {
        self()
    }
}

/// A shared retriever.
pub type Retriever<T> = Arc<dyn Retrieve<T>>;

/// Wraps an iterator in a stream that calls `on_close` when dropped.
pub fn guarded<T, I>(iter: I, on_close: impl FnOnce() + Send + 'static) -> SeriesStream<T>
where
    T: 'static,
    I: Iterator<Item = Result<TimeSeries<T>, RetrievalError>> + Send + 'static,
{
    Box::new(Guarded {
        inner: iter,
        on_close: Some(Box::new(on_close)),
    })
}

struct Guarded<I> {
    inner: I,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl<I: Iterator> Iterator for Guarded<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<I> Drop for Guarded<I> {
    fn drop(&mut self) {
        if let Some(close) = self.on_close.take() {
            close();
        }
    }
}

/// Collects a stream into memory.
///
/// # Errors
///
/// Returns the first error yielded by the stream.
pub fn collect<T>(stream: SeriesStream<T>) -> Result<Vec<TimeSeries<T>>, RetrievalError> {
    stream.collect()
}
