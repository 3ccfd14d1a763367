//! # wres-datamodel
//!
//! Core data types for building pools of paired time series in a forecast
//! verification pipeline.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `time_scale` | Periods, aggregation functions and the rescaling-necessity rule |
//! | `time_window` | Right-closed reference-time, valid-time and lead-duration bounds |
//! | `feature` | Features, left/right/baseline tuples and feature groups |
//! | `series` | Sorted, duplicate-free time series with metadata |
//! | `values` | Pairs, ensembles and missing values |
//! | `metadata` | Evaluation and pool metadata, status events |
//! | `pool` | Pools with baseline, climatology and per-feature mini-pools |
//! | `slicer` | Window filters, snipping, offsets and regular end-instant grids |
//!
//! # Quick start
//!
//! ```ignore
//! use wres_datamodel::{Event, Feature, TimeSeries, TimeSeriesMetadata, TimeWindow, slicer};
//!
//! let meta = TimeSeriesMetadata::new(Feature::new("DRRC2"), "QINE", "CMS");
//! let series = TimeSeries::new(meta, events)?;
//! let window = TimeWindow::new().with_valid_times(start, end);
//! let inside = slicer::filter_by_time_window(series, &window);
//! ```

mod error;
mod feature;
mod metadata;
mod pool;
mod series;
mod time_scale;
mod time_window;
mod values;

pub mod slicer;

pub use error::DataModelError;
pub use feature::{Feature, FeatureGroup, FeatureTuple};
pub use metadata::{Evaluation, EvaluationStage, EvaluationStatusEvent, PoolMetadata, StatusLevel};
pub use pool::{Climatology, PairedPool, Pool, PoolBuilder};
pub use series::{Event, ReferenceTimeType, TimeSeries, TimeSeriesMetadata};
pub use time_scale::{
    INSTANTANEOUS_SECONDS, MonthDay, TimeScale, TimeScaleFunction, equals_or_instantaneous,
    is_rescaling_required, needs_upscaling,
};
pub use time_window::TimeWindow;
pub use values::{Ensemble, MissingValue, Pair};
