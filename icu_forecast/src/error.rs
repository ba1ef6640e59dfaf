//! Error types for the icu_forecast crate

use capacity_math::MathError;
use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the icu_forecast crate
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Not enough prior weeks to fill a feature window
    #[error(
        "Insufficient history for hospital {hospital_id} at {week}: \
         need {required} prior weeks, have {available}"
    )]
    InsufficientHistory {
        hospital_id: String,
        week: NaiveDate,
        required: usize,
        available: usize,
    },

    /// Non-contiguous week sequence inside a feature window
    #[error("Data gap for hospital {hospital_id} at {week}: expected {expected}, found {found}")]
    DataGap {
        hospital_id: String,
        week: NaiveDate,
        expected: NaiveDate,
        found: NaiveDate,
    },

    /// Inference requested before a model artifact exists
    #[error("Model not trained: {0}")]
    ModelNotTrained(String),

    /// Alert composition without both signals
    #[error("Incomplete signal for hospital {hospital_id} at {week}: missing {missing}")]
    IncompleteSignal {
        hospital_id: String,
        week: NaiveDate,
        missing: String,
    },

    /// The forecaster produced NaN or infinity
    #[error("Non-finite prediction for hospital {hospital_id} at horizon {horizon}")]
    NonFinitePrediction { hospital_id: String, horizon: u8 },

    /// No usable training rows for a model
    #[error("Empty training set: {0}")]
    EmptyTrainingSet(String),

    /// Held-out hospitals contribute no rows to evaluate
    #[error("Empty holdout: {0}")]
    EmptyHoldout(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A required configuration value was not supplied
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// Error from numeric routines
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV export
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON (de)serialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

impl PipelineError {
    /// Errors that concern a single hospital and must not abort the batch
    pub fn is_hospital_scoped(&self) -> bool {
        matches!(
            self,
            PipelineError::InsufficientHistory { .. }
                | PipelineError::DataGap { .. }
                | PipelineError::IncompleteSignal { .. }
                | PipelineError::NonFinitePrediction { .. }
        )
    }

    /// Errors that mean "not enough clean history", reported as skips
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            PipelineError::InsufficientHistory { .. } | PipelineError::DataGap { .. }
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<PolarsError> for PipelineError {
    fn from(err: PolarsError) -> Self {
        PipelineError::PolarsError(err.to_string())
    }
}
