//! # wres-pooling
//!
//! Pool construction for forecast verification: turns declared feature
//! groups and time windows into pools of paired time series, one single-use
//! supplier per pool.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `declaration` | [`EvaluationDeclaration`]: datasets, scales, shifts, bounds, groups and windows |
//! | `config` | [`PoolParameters`] for feature batching |
//! | `request` | [`PoolRequest`] and its feature-blind [`NormalizedPoolRequest`] |
//! | `supplier` | [`PoolSupplier`]: retrieve, rescale, transform, pair, cross-pair and assemble one pool |
//! | `generator` | [`PoolsGenerator`]: one supplier per request, with shared climatology and left data |
//! | `factory` | [`PoolFactory`]: request planning, single-valued and ensemble pools |
//! | `batching` | [`optimize`] singleton feature groups into batches, [`OptimizedPoolRequests`] |
//! | `decompose` | [`DecomposedSupplier`]: per-feature pools from a batched pool |
//! | `baseline` | [`PersistenceGenerator`] and other generated baselines |
//! | `cross_pairing` | Per-feature and across-feature cross-pairing |
//! | `transform` | Unit conversion, value bounds and seasons |
//! | `windows` | [`TimeWindowGenerator`] for lead-duration pools |
//! | `processor` | [`PoolProcessor`], the single-use consumer of a pool |
//! | `reporter` | [`PoolReporter`], the evaluation-wide outcome tally |
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use wres_pooling::{EvaluationDeclaration, PoolFactory};
//! use wres_retrieval::{DataType, InMemoryRetrieverFactory};
//!
//! let declaration = EvaluationDeclaration::new(DataType::Observations, DataType::SingleValuedForecasts)
//!     .with_feature_groups(groups)
//!     .with_time_windows(windows);
//! let factory = PoolFactory::new(declaration)?;
//! let requests = factory.pool_requests();
//! let retrievers = Arc::new(InMemoryRetrieverFactory::new(observed, forecasts, Vec::new()));
//! for (request, supplier) in factory.single_valued_pools(&requests, retrievers)? {
//!     let pool = supplier.get()?;
//!     println!("{request}: {} series", pool.main_len());
//! }
//! ```

mod baseline;
mod batching;
mod config;
mod correlator;
mod cross_pairing;
mod declaration;
mod decompose;
mod error;
mod factory;
mod generator;
mod pool_id;
mod processor;
mod reporter;
mod request;
mod supplier;
mod transform;
mod windows;

pub use baseline::{BaselineGenerator, GeneratorFactory, PersistenceGenerator, persistence_factory};
pub use batching::{OptimizedPoolRequests, optimize};
pub use config::PoolParameters;
pub use correlator::FeatureCorrelator;
pub use cross_pairing::{PairsByFeature, cross_pair};
pub use declaration::{EvaluationDeclaration, GeneratedBaseline};
pub use decompose::{DecomposedSupplier, decompose};
pub use error::PoolError;
pub use factory::PoolFactory;
pub use generator::PoolsGenerator;
pub use pool_id::PoolIdSequence;
pub use processor::{
    EvaluationState, PoolOutcome, PoolProcessingStatus, PoolProcessor, PublishFn, StatisticsFn, UncertaintyFn,
};
pub use reporter::PoolReporter;
pub use request::{NormalizedPoolRequest, PoolRequest};
pub use supplier::{ClimatologySupplier, PoolSupplier, PoolSupplierConfig, PoolSupply, SupplyPool};
pub use transform::{
    Season, SeriesFilter, Shim, Transformer, UnitConverter, UnitMapper, ValueBounds, ValueFilter,
    ensemble_transformer, identity_shim, identity_transformer, season_filter,
    single_valued_transformer,
};
pub use windows::TimeWindowGenerator;
