//! # Capacity Math
//!
//! Numeric building blocks for hospital capacity forecasting.
//! This crate provides trailing-window statistics, guarded ratios and the
//! small dense linear algebra needed to fit regression models.

use thiserror::Error;

pub mod linalg;
pub mod rolling;
pub mod scalar;

pub use rolling::{RollingWindow, WindowStats};

/// Errors that can occur in capacity calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for capacity math operations
pub type Result<T> = std::result::Result<T, MathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_context() {
        let err = MathError::InsufficientData("need 4 values, have 2".to_string());
        assert_eq!(
            err.to_string(),
            "Insufficient data for calculation: need 4 values, have 2"
        );
    }
}
