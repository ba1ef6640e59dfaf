//! L2-penalised linear regression on standardised features

use super::{Model, Standardizer, TrainedModel, TrainingData};
use crate::error::{PipelineError, Result};
use capacity_math::linalg::{dot, ridge_solve};
use serde::{Deserialize, Serialize};

/// Ridge regression hyper-parameters
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    /// Name of the model
    name: String,
    /// Penalty on the (standardised) coefficients
    alpha: f64,
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha.is_finite()) {
            return Err(PipelineError::InvalidParameter(format!(
                "Ridge alpha must be a positive finite number, got {}",
                alpha
            )));
        }

        Ok(Self {
            name: format!("Ridge(alpha={})", alpha),
            alpha,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Model for RidgeRegression {
    type Trained = TrainedRidge;

    /// Sample weights are not used by the least-squares fit
    fn train(&self, data: &TrainingData) -> Result<Self::Trained> {
        if data.is_empty() {
            return Err(PipelineError::EmptyTrainingSet(
                "Ridge regression received no training rows".to_string(),
            ));
        }

        let scaler = Standardizer::fit(&data.rows)?;
        let scaled = scaler.transform(&data.rows)?;
        let (intercept, weights) = ridge_solve(&scaled, &data.targets, self.alpha)?;

        Ok(TrainedRidge {
            name: self.name.clone(),
            scaler,
            intercept,
            weights,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fitted ridge coefficients and the scaler they apply to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedRidge {
    name: String,
    scaler: Standardizer,
    intercept: f64,
    weights: Vec<f64>,
}

impl TrainedRidge {
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl TrainedModel for TrainedRidge {
    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let scaled = self.scaler.transform_row(row)?;
        Ok(self.intercept + dot(&scaled, &self.weights)?)
    }

    fn width(&self) -> usize {
        self.weights.len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
