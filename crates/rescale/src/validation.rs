//! Validation events raised while rescaling, and the rescaled result.

use wres_datamodel::{EvaluationStage, EvaluationStatusEvent, StatusLevel, TimeSeries};

/// A non-fatal observation made while rescaling one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleValidationEvent {
    level: StatusLevel,
    message: String,
}

impl ScaleValidationEvent {
    /// Creates a debug-level event.
    pub fn debug(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Debug,
            message: message.into(),
        }
    }

    /// Creates a warning.
    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warn,
            message: message.into(),
        }
    }

    /// Returns the severity.
    pub fn level(&self) -> StatusLevel {
        self.level
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Converts to a pool status event in the rescaling stage.
    pub fn to_status_event(&self) -> EvaluationStatusEvent {
        EvaluationStatusEvent::new(self.level, EvaluationStage::Rescaling, self.message.clone())
    }
}

/// An upscaled series together with the validation events raised.
#[derive(Debug, Clone)]
pub struct RescaledSeries<T> {
    series: TimeSeries<T>,
    validation_events: Vec<ScaleValidationEvent>,
}

impl<T> RescaledSeries<T> {
    /// Creates a rescaled result.
    pub fn new(series: TimeSeries<T>, validation_events: Vec<ScaleValidationEvent>) -> Self {
        Self {
            series,
            validation_events,
        }
    }

    /// Creates a result with no validation events.
    pub fn unchanged(series: TimeSeries<T>) -> Self {
        Self::new(series, Vec::new())
    }

    /// Returns the rescaled series.
    pub fn series(&self) -> &TimeSeries<T> {
        &self.series
    }

    /// Returns the validation events.
    pub fn validation_events(&self) -> &[ScaleValidationEvent] {
        &self.validation_events
    }

    /// Consumes the result, returning the series and events.
    pub fn into_parts(self) -> (TimeSeries<T>, Vec<ScaleValidationEvent>) {
        (self.series, self.validation_events)
    }
}
