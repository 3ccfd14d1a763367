//! # wres-retrieval
//!
//! The retrieval capability consumed by pool construction: lazily opened
//! streams of time series, bound to features and time windows, with
//! memoizing wrappers so that many pools can share one retrieval.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `source` | [`SeriesStream`], the [`Retrieve`] capability, dataset roles and types |
//! | `caching` | [`CachingRetriever`] and [`CachingSupplier`] (memoize on first read) |
//! | `factory` | [`RetrieverFactory`] and [`CachingRetrieverFactory`] |
//! | `memory` | [`InMemoryRetrieverFactory`] over series held in memory |
//!
//! # Quick start
//!
//! ```ignore
//! use wres_retrieval::{CachingRetriever, InMemoryRetrieverFactory, RetrieverFactory};
//!
//! let factory = InMemoryRetrieverFactory::new(observed, predicted, Vec::new());
//! let left = CachingRetriever::shared(factory.left_retriever(&features, None));
//! let first = left.retrieve()?.count();
//! let again = left.retrieve()?.count(); // replayed from memory
//! ```

mod caching;
mod error;
mod factory;
mod memory;
mod source;

pub use caching::{CachingRetriever, CachingSupplier};
pub use error::RetrievalError;
pub use factory::{CachingRetrieverFactory, RetrieverFactory};
pub use memory::{InMemoryRetrieverFactory, RetrievalCounts};
pub use source::{
    DataType, DatasetOrientation, Retrieve, Retriever, SeriesStream, collect, guarded,
};
