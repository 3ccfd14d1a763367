//! Memoizing wrappers: retrieve once, replay many times.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;
use wres_datamodel::TimeSeries;

use crate::error::RetrievalError;
use crate::source::{Retrieve, Retriever, SeriesStream};

/// A retriever that collects its inner stream on first use and replays the
/// cached series on every later call.
///
/// Concurrent first callers block until one of them has populated the
/// cache, so the inner retriever runs at most once. A failed retrieval is
/// not cached.
pub struct CachingRetriever<T> {
    inner: Retriever<T>,
    cache: OnceCell<Arc<Vec<TimeSeries<T>>>>,
}

impl<T> CachingRetriever<T> {
    /// Wraps a retriever.
    pub fn new(inner: Retriever<T>) -> Self {
        Self {
            inner,
            cache: OnceCell::new(),
        }
    }

    /// Whether the cache has been populated.
    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }
}

impl<T> CachingRetriever<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wraps a retriever and returns it as a shared retriever.
    pub fn shared(inner: Retriever<T>) -> Retriever<T> {
        Arc::new(Self::new(inner))
    }

    /// Like [`CachingRetriever::shared`], but returns `inner` itself when it
    /// already memoizes, so the data is held once.
    pub fn memoized(inner: Retriever<T>) -> Retriever<T> {
        if inner.is_memoized() { inner } else { Self::shared(inner) }
    }

    /// Returns the cached series, retrieving them first if needed.
    ///
    /// # Errors
    ///
    /// Returns the inner retriever's error if the cache is empty and the
    /// retrieval fails.
    pub fn get(&self) -> Result<Arc<Vec<TimeSeries<T>>>, RetrievalError> {
        self.cache
            .get_or_try_init(|| {
                let series = self.inner.retrieve()?.collect::<Result<Vec<_>, _>>()?;
                debug!(n_series = series.len(), "cached retrieved time series");
                Ok(Arc::new(series))
            })
            .map(Arc::clone)
    }
}

impl<T> Retrieve<T> for CachingRetriever<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn retrieve(&self) -> Result<SeriesStream<T>, RetrievalError> {
        let cached = self.get()?;
        Ok(Box::new(
            (0..cached.len()).map(move |i| Ok(cached[i].clone())),
        ))
    }

    fn is_memoized(&self) -> bool {
        true
    }
}

impl<T> fmt::Debug for CachingRetriever<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingRetriever")
            .field("cached", &self.is_cached())
            .finish_non_exhaustive()
    }
}

type Compute<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;

/// A value computed on first access and shared thereafter.
///
/// The outcome is cached whether it succeeds or fails, so the computation
/// runs at most once even when it errs; later callers receive a clone of
/// the same error.
pub struct CachingSupplier<T, E> {
    compute: Compute<T, E>,
    cell: OnceCell<Result<T, E>>,
}

impl<T, E> CachingSupplier<T, E>
where
    E: Clone,
{
    /// Creates a supplier around `compute`.
    pub fn new(compute: impl Fn() -> Result<T, E> + Send + Sync + 'static) -> Self {
        Self {
            compute: Box::new(compute),
            cell: OnceCell::new(),
        }
    }

    /// Returns the value, computing it on first access.
    ///
    /// # Errors
    ///
    /// Returns a clone of the computation's error.
    pub fn get(&self) -> Result<&T, E> {
        self.cell
            .get_or_init(|| (self.compute)())
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Whether the value has been computed.
    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T, E> fmt::Debug for CachingSupplier<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingSupplier")
            .field("computed", &self.cell.get().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use wres_datamodel::{Feature, TimeSeriesMetadata};

    use super::*;
    use crate::source::DatasetOrientation;

    fn counting_retriever(calls: Arc<AtomicUsize>) -> Retriever<f64> {
        Arc::new(move || -> Result<SeriesStream<f64>, RetrievalError> {
            calls.fetch_add(1, Ordering::SeqCst);
            let s = TimeSeries::empty(TimeSeriesMetadata::new(Feature::new("A"), "Q", "CMS"));
            Ok(Box::new(vec![Ok(s.clone()), Ok(s)].into_iter()))
        })
    }

    #[test]
    fn caching_retriever_retrieves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cached = CachingRetriever::shared(counting_retriever(Arc::clone(&calls)));
        for _ in 0..3 {
            let n = cached.retrieve().unwrap().count();
            assert_eq!(n, 2);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn caching_retriever_concurrent_first_access() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cached = CachingRetriever::shared(counting_retriever(Arc::clone(&calls)));
        thread::scope(|s| {
            for _ in 0..8 {
                let c = Arc::clone(&cached);
                s.spawn(move || {
                    assert_eq!(c.retrieve().unwrap().count(), 2);
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn memoized_does_not_wrap_twice() {
        let calls = Arc::new(AtomicUsize::new(0));
        let plain = counting_retriever(Arc::clone(&calls));
        assert!(!plain.is_memoized());

        let cached = CachingRetriever::memoized(plain);
        assert!(cached.is_memoized());
        let again = CachingRetriever::memoized(Arc::clone(&cached));
        assert!(Arc::ptr_eq(&cached, &again));
    }

    #[test]
    fn caching_retriever_does_not_cache_failure() {
        let failing: Retriever<f64> = Arc::new(|| -> Result<SeriesStream<f64>, RetrievalError> {
            Err(RetrievalError::Source {
                orientation: DatasetOrientation::Left,
                reason: "offline".to_string(),
            })
        });
        let cached = CachingRetriever::new(failing);
        assert!(cached.retrieve().is_err());
        assert!(!cached.is_cached());
    }

    #[test]
    fn caching_supplier_computes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let supplier: CachingSupplier<u32, String> = CachingSupplier::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });
        assert!(!supplier.is_computed());
        assert_eq!(*supplier.get().unwrap(), 42);
        assert_eq!(*supplier.get().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn caching_supplier_caches_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let supplier: CachingSupplier<u32, String> = CachingSupplier::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Err("boom".to_string())
        });
        assert_eq!(supplier.get().unwrap_err(), "boom");
        assert_eq!(supplier.get().unwrap_err(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
