//! # wres-rescale
//!
//! Temporal upscaling of time series to a coarser, desired time scale.
//!
//! Values are grouped into right-closed intervals `(end - period, end]` and
//! aggregated with the desired function. Intervals that are partially
//! populated or unevenly spaced are skipped and reported as validation
//! events rather than errors. Downscaling is never performed.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `upscaler` | The [`Upscaler`] capability, scale validation, shared interval logic |
//! | `basic` | [`BasicUpscaler`] for single-valued series |
//! | `ensemble` | [`EnsembleUpscaler`], member by member |
//! | `validation` | [`ScaleValidationEvent`] and [`RescaledSeries`] |
//!
//! # Quick start
//!
//! ```ignore
//! use wres_rescale::{BasicUpscaler, Upscaler};
//!
//! let rescaled = BasicUpscaler::new().upscale(series, &desired, &ends_at, "CMS")?;
//! for event in rescaled.validation_events() {
//!     tracing::debug!(message = event.message());
//! }
//! ```

mod basic;
mod ensemble;
mod error;
mod upscaler;
mod validation;

pub use basic::{BasicUpscaler, aggregate};
pub use ensemble::EnsembleUpscaler;
pub use error::RescaleError;
pub use upscaler::{Upscaler, validate};
pub use validation::{RescaledSeries, ScaleValidationEvent};
