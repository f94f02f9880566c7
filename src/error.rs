use thiserror::Error;

use crate::schema::SeriesKind;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not enough data to forecast {series}: {len} months provided, at least {min} required")]
    InsufficientData {
        series: SeriesKind,
        len: usize,
        min: usize,
    },

    #[error("Model fit failed for {series}: {details}")]
    ModelFit { series: SeriesKind, details: String },

    #[error("Forecast alignment error: {0}")]
    Alignment(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ForecastError {
    /// Stable identifier for the error category, preserved across the
    /// serialization boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::Validation(_) => "validation",
            ForecastError::InsufficientData { .. } => "insufficient_data",
            ForecastError::ModelFit { .. } => "model_fit",
            ForecastError::Alignment(_) => "alignment",
            ForecastError::Serialization(_) => "serialization",
        }
    }

    /// True when the failure was caused by the request payload rather
    /// than the pipeline itself.
    pub fn client_fault(&self) -> bool {
        matches!(
            self,
            ForecastError::Validation(_) | ForecastError::InsufficientData { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
