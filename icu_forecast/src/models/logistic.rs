//! Weighted binary logistic regression
//!
//! Fitted by full-batch gradient descent from a zero start, so the same data
//! and hyper-parameters always produce the same coefficients.

use super::{Model, Standardizer, TrainedModel, TrainingData};
use crate::error::{PipelineError, Result};
use capacity_math::linalg::dot;
use capacity_math::scalar::sigmoid;
use serde::{Deserialize, Serialize};

/// Logistic regression hyper-parameters
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    name: String,
    iterations: usize,
    learning_rate: f64,
    /// L2 penalty on the coefficients, not the intercept
    l2: f64,
}

impl LogisticRegression {
    pub fn new(iterations: usize, learning_rate: f64, l2: f64) -> Result<Self> {
        if iterations == 0 {
            return Err(PipelineError::InvalidParameter(
                "Logistic regression needs at least one iteration".to_string(),
            ));
        }
        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            return Err(PipelineError::InvalidParameter(format!(
                "Learning rate must be positive, got {}",
                learning_rate
            )));
        }
        if !(l2 >= 0.0 && l2.is_finite()) {
            return Err(PipelineError::InvalidParameter(format!(
                "L2 penalty must be non-negative, got {}",
                l2
            )));
        }

        Ok(Self {
            name: format!("Logistic(iter={}, lr={}, l2={})", iterations, learning_rate, l2),
            iterations,
            learning_rate,
            l2,
        })
    }
}

impl Model for LogisticRegression {
    type Trained = TrainedLogistic;

    /// Targets must be 0 or 1. Weights default to 1 per row.
    fn train(&self, data: &TrainingData) -> Result<Self::Trained> {
        if data.is_empty() {
            return Err(PipelineError::EmptyTrainingSet(
                "Logistic regression received no training rows".to_string(),
            ));
        }
        if data.targets.iter().any(|&y| y != 0.0 && y != 1.0) {
            return Err(PipelineError::DataError(
                "Logistic targets must be 0 or 1".to_string(),
            ));
        }

        let scaler = Standardizer::fit(&data.rows)?;
        let rows = scaler.transform(&data.rows)?;
        let width = scaler.width();
        let weights: Vec<f64> = match &data.weights {
            Some(w) => w.clone(),
            None => vec![1.0; rows.len()],
        };
        let total_weight: f64 = weights.iter().sum();
        if total_weight <= 0.0 {
            return Err(PipelineError::EmptyTrainingSet(
                "All sample weights are zero".to_string(),
            ));
        }

        let mut intercept = 0.0;
        let mut coefficients = vec![0.0; width];
        for _ in 0..self.iterations {
            let mut grad_b = 0.0;
            let mut grad_w = vec![0.0; width];
            for ((row, &y), &w) in rows.iter().zip(&data.targets).zip(&weights) {
                let p = sigmoid(intercept + dot(row, &coefficients)?);
                let err = w * (p - y);
                grad_b += err;
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
            }

            intercept -= self.learning_rate * grad_b / total_weight;
            for (c, g) in coefficients.iter_mut().zip(&grad_w) {
                *c -= self.learning_rate * (g / total_weight + self.l2 * *c);
            }
        }

        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PipelineError::Math(capacity_math::MathError::CalculationError(
                "Logistic regression diverged".to_string(),
            )));
        }

        Ok(TrainedLogistic {
            name: self.name.clone(),
            scaler,
            intercept,
            coefficients,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedLogistic {
    name: String,
    scaler: Standardizer,
    intercept: f64,
    coefficients: Vec<f64>,
}

impl TrainedModel for TrainedLogistic {
    /// Probability of the positive class
    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let scaled = self.scaler.transform_row(row)?;
        Ok(sigmoid(self.intercept + dot(&scaled, &self.coefficients)?))
    }

    fn width(&self) -> usize {
        self.coefficients.len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> TrainingData {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..40).map(|i| if i >= 20 { 1.0 } else { 0.0 }).collect();
        TrainingData::new(rows, targets).unwrap()
    }

    #[test]
    fn test_logistic_orders_probabilities() {
        let model = LogisticRegression::new(300, 0.5, 0.0).unwrap();
        let trained = model.train(&separable()).unwrap();
        let low = trained.predict_row(&[2.0]).unwrap();
        let high = trained.predict_row(&[38.0]).unwrap();
        assert!(low < 0.5 && high > 0.5);
        assert!((0.0..=1.0).contains(&low));
    }

    #[test]
    fn test_logistic_is_deterministic() {
        let model = LogisticRegression::new(100, 0.1, 1e-3).unwrap();
        let a = model.train(&separable()).unwrap();
        let b = model.train(&separable()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_logistic_rejects_non_binary_targets() {
        let data = TrainingData::new(vec![vec![1.0], vec![2.0]], vec![0.0, 0.5]).unwrap();
        let model = LogisticRegression::new(10, 0.1, 0.0).unwrap();
        assert!(matches!(model.train(&data), Err(PipelineError::DataError(_))));
    }

    #[test]
    fn test_positive_weight_raises_probabilities() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0];
        let plain = TrainingData::new(rows.clone(), targets.clone()).unwrap();
        let weights: Vec<f64> = targets.iter().map(|&y| if y == 1.0 { 3.0 } else { 1.0 }).collect();
        let weighted = TrainingData::new(rows, targets).unwrap().with_weights(weights).unwrap();

        let model = LogisticRegression::new(200, 0.1, 0.0).unwrap();
        let p_plain = model.train(&plain).unwrap().predict_row(&[5.0]).unwrap();
        let p_weighted = model.train(&weighted).unwrap().predict_row(&[5.0]).unwrap();
        assert!(p_weighted > p_plain);
    }
}
