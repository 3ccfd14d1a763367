//! Factories that bind retrievers to features and time windows.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;
use wres_datamodel::{Feature, TimeWindow};

use crate::caching::CachingRetriever;
use crate::source::{Retrieve, Retriever};

/// Creates retrievers for each side of an evaluation.
///
/// Left and baseline retrievers accept an optional window; `None` retrieves
/// every time for the features, as needed for climatology or for the source
/// data of a generated baseline.
pub trait RetrieverFactory<L, R, B>: Send + Sync {
    /// Returns a retriever for climatological left data.
    fn climatology_retriever(&self, features: &BTreeSet<Feature>) -> Retriever<L> {
        self.left_retriever(features, None)
    }

    /// Returns a retriever for left data.
    fn left_retriever(&self, features: &BTreeSet<Feature>, window: Option<&TimeWindow>) -> Retriever<L>;

    /// Returns a retriever for right data within a window.
    fn right_retriever(&self, features: &BTreeSet<Feature>, window: &TimeWindow) -> Retriever<R>;

    /// Returns a retriever for baseline data.
    fn baseline_retriever(&self, features: &BTreeSet<Feature>, window: Option<&TimeWindow>)
    -> Retriever<B>;
}

type Key = (BTreeSet<Feature>, Option<TimeWindow>);
type Entries<T> = Mutex<HashMap<Key, Weak<dyn Retrieve<T>>>>;

/// Wraps a factory so that repeated requests for the same left or baseline
/// data share one memoized retrieval.
///
/// Entries are held weakly: the memoized series live only while some pool
/// holds the retriever, and a request made after every holder is dropped
/// retrieves afresh. Right data is passed through uncached because each
/// pool requests a distinct window.
pub struct CachingRetrieverFactory<L, R, B> {
    inner: Arc<dyn RetrieverFactory<L, R, B>>,
    left: Entries<L>,
    baseline: Entries<B>,
}

impl<L, R, B> CachingRetrieverFactory<L, R, B> {
    /// Wraps a factory.
    pub fn new(inner: Arc<dyn RetrieverFactory<L, R, B>>) -> Self {
        Self {
            inner,
            left: Mutex::new(HashMap::new()),
            baseline: Mutex::new(HashMap::new()),
        }
    }
}

impl<L, R, B> RetrieverFactory<L, R, B> for CachingRetrieverFactory<L, R, B>
where
    L: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn left_retriever(&self, features: &BTreeSet<Feature>, window: Option<&TimeWindow>) -> Retriever<L> {
        shared(&self.left, (features.clone(), window.copied()), || {
            debug!(n_features = features.len(), "caching left retriever");
            self.inner.left_retriever(features, window)
        })
    }

    fn right_retriever(&self, features: &BTreeSet<Feature>, window: &TimeWindow) -> Retriever<R> {
        self.inner.right_retriever(features, window)
    }

    fn baseline_retriever(
        &self,
        features: &BTreeSet<Feature>,
        window: Option<&TimeWindow>,
    ) -> Retriever<B> {
        shared(&self.baseline, (features.clone(), window.copied()), || {
            debug!(n_features = features.len(), "caching baseline retriever");
            self.inner.baseline_retriever(features, window)
        })
    }
}

/// Returns the live retriever for `key`, or memoizes a new one.
fn shared<T>(entries: &Entries<T>, key: Key, create: impl FnOnce() -> Retriever<T>) -> Retriever<T>
where
    T: Clone + Send + Sync + 'static,
{
    let mut entries = entries.lock();
    if let Some(live) = entries.get(&key).and_then(Weak::upgrade) {
        return live;
    }
    entries.retain(|_, entry| entry.strong_count() > 0);
    let retriever = CachingRetriever::memoized(create());
    entries.insert(key, Arc::downgrade(&retriever));
    retriever
}
