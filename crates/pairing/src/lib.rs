//! # wres-pairing
//!
//! Pairing and cross-pairing of time series.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `pairer` | [`Pairer`] capability and [`ExactTimePairer`] |
//! | `cross` | [`CrossPairer`] capability and [`TimeSeriesCrossPairer`] |
//!
//! # Quick start
//!
//! ```ignore
//! use wres_pairing::{ExactTimePairer, Pairer, TimePairingType};
//!
//! let pairer = ExactTimePairer::<f64, f64>::non_missing(TimePairingType::ValidTimeOnly);
//! let pairs = pairer.pair(&observed, &forecast)?;
//! ```

mod cross;
mod error;
mod pairer;

pub use cross::{CrossPair, CrossPairMethod, CrossPairScope, CrossPairer, CrossPairs, TimeSeriesCrossPairer};
pub use error::PairingError;
pub use pairer::{ExactTimePairer, Pairer, TimePairingType};
