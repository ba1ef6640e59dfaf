//! Holdout metrics for the occupancy regressor and the overload classifier

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Evaluate predicted occupancy against what was observed
pub fn regression_metrics(predicted: &[f64], actual: &[f64]) -> Result<RegressionMetrics> {
    if predicted.len() != actual.len() || predicted.is_empty() {
        return Err(PipelineError::DataError(
            "Predicted and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = predicted.len() as f64;
    let errors: Vec<f64> = predicted
        .iter()
        .zip(actual)
        .map(|(&p, &a)| a - p)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    // R² is undefined for a constant target; report it as None
    let mean_actual = actual.iter().sum::<f64>() / n;
    let total: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
    let r2 = if total > 0.0 {
        Some(1.0 - errors.iter().map(|e| e.powi(2)).sum::<f64>() / total)
    } else {
        None
    };

    Ok(RegressionMetrics {
        samples: predicted.len(),
        mae,
        mse,
        rmse,
        r2,
    })
}

/// Evaluate probabilities and the flags derived from them against observed labels
pub fn classification_metrics(
    probabilities: &[f64],
    labels: &[bool],
    threshold: f64,
) -> Result<ClassificationMetrics> {
    if probabilities.len() != labels.len() || probabilities.is_empty() {
        return Err(PipelineError::DataError(
            "Probabilities and labels must have the same non-zero length".to_string(),
        ));
    }

    let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
    for (&p, &label) in probabilities.iter().zip(labels) {
        match (p >= threshold, label) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Ok(ClassificationMetrics {
        samples: labels.len(),
        positives: tp + fn_,
        accuracy: ratio(tp + tn, labels.len()),
        precision,
        recall,
        f1,
        roc_auc: roc_auc(probabilities, labels),
    })
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged.
///
/// `None` when the labels contain a single class.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 || scores.len() != labels.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie group
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = ranks
        .iter()
        .zip(labels)
        .filter(|(_, &l)| l)
        .map(|(r, _)| r)
        .sum();
    let p = positives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

/// Occupancy regression holdout metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub samples: usize,
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: Option<f64>,
}

impl std::fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Occupancy Forecast Metrics ({} samples):", self.samples)?;
        writeln!(f, "  MAE:     {:.4}", self.mae)?;
        writeln!(f, "  MSE:     {:.4}", self.mse)?;
        writeln!(f, "  RMSE:    {:.4}", self.rmse)?;
        match self.r2 {
            Some(r2) => writeln!(f, "  R2:      {:.4}", r2)?,
            None => writeln!(f, "  R2:      NA")?,
        }
        Ok(())
    }
}

/// Overload classifier holdout metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub samples: usize,
    pub positives: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: Option<f64>,
}

impl std::fmt::Display for ClassificationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Overload Classifier Metrics ({} samples, {} positive):",
            self.samples, self.positives
        )?;
        writeln!(f, "  Accuracy:  {:.3}", self.accuracy)?;
        writeln!(f, "  Precision: {:.3}", self.precision)?;
        writeln!(f, "  Recall:    {:.3}", self.recall)?;
        writeln!(f, "  F1:        {:.3}", self.f1)?;
        match self.roc_auc {
            Some(auc) => writeln!(f, "  ROC-AUC:   {:.3}", auc)?,
            None => writeln!(f, "  ROC-AUC:   NA")?,
        }
        Ok(())
    }
}
