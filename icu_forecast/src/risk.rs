//! Overload risk classification
//!
//! A week is labelled overload when the following week's stress score
//! reaches the configured threshold. The classifier scores that probability
//! from stress and occupancy features, and a deliberately low decision
//! threshold trades precision for recall.

use crate::config::{ClassWeighting, PipelineConfig};
use crate::data::{HospitalSeries, Panel};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureBuilder, FeatureVector};
use crate::metrics::{classification_metrics, ClassificationMetrics};
use crate::models::{LogisticRegression, Model, ModelArtifact, TrainedLogistic, TrainingData};
use crate::split::GroupSplit;
use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Published overload classifier
pub type RiskArtifact = ModelArtifact<TrainedLogistic>;

/// Decision threshold on the overload probability, always within [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ProbabilityThreshold(f64);

impl ProbabilityThreshold {
    pub fn new(value: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(PipelineError::InvalidParameter(format!(
                "Probability threshold must be within [0, 1], got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Flag decision for a probability
    pub fn decide(&self, probability: f64) -> bool {
        probability >= self.0
    }
}

impl Default for ProbabilityThreshold {
    fn default() -> Self {
        Self(0.35)
    }
}

impl TryFrom<f64> for ProbabilityThreshold {
    type Error = PipelineError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ProbabilityThreshold> for f64 {
    fn from(threshold: ProbabilityThreshold) -> Self {
        threshold.0
    }
}

/// Overload probability for the week after `week`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub hospital_id: String,
    /// Week whose features were scored
    pub week: NaiveDate,
    /// Week the overload prediction is about
    pub target_week: NaiveDate,
    pub overload_probability: f64,
    pub overload_flag: bool,
    pub threshold_used: f64,
    pub model_version: String,
    pub generated_at: DateTime<Utc>,
}

pub fn risk_feature_names() -> Vec<String> {
    [
        "stress_lag_1",
        "stress_lag_2",
        "stress_rolling_mean",
        "stress_rolling_std",
        "icu_occupancy_rate",
        "weekly_delta",
        "oxygen_risk_proxy",
        "centered_stress",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Classifier inputs, in the order of [`risk_feature_names`]
pub fn risk_inputs(vector: &FeatureVector) -> Vec<f64> {
    vec![
        vector.stress_lag_1,
        vector.stress_lag_2,
        vector.stress_rolling_mean,
        vector.stress_rolling_std,
        vector.icu_occupancy_rate,
        vector.weekly_delta,
        vector.oxygen_risk_proxy,
        vector.centered_stress,
    ]
}

/// Per-class sample weights `(negative, positive)` for a label set
pub fn class_weights(weighting: ClassWeighting, labels: &[bool]) -> (f64, f64) {
    match weighting {
        ClassWeighting::Uniform => (1.0, 1.0),
        ClassWeighting::Fixed { negative, positive } => (negative, positive),
        ClassWeighting::Balanced => {
            let n = labels.len() as f64;
            let positives = labels.iter().filter(|&&l| l).count() as f64;
            let negatives = n - positives;
            let present = [negatives, positives].iter().filter(|&&c| c > 0.0).count() as f64;
            // n / (classes present * count); an absent class keeps weight 1
            let balanced = |count: f64| if count > 0.0 { n / (present * count) } else { 1.0 };
            (balanced(negatives), balanced(positives))
        }
    }
}

/// Labelled classifier rows across a panel
#[derive(Debug, Clone, Default)]
pub struct LabelledRows {
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<bool>,
}

#[derive(Debug, Clone)]
pub struct RiskClassifier {
    builder: FeatureBuilder,
    label_threshold: f64,
    threshold: ProbabilityThreshold,
    class_weighting: ClassWeighting,
    model: LogisticRegression,
    artifact: Option<Arc<RiskArtifact>>,
}

impl RiskClassifier {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            builder: FeatureBuilder::from_config(config)?,
            label_threshold: config.stress_next_threshold,
            threshold: ProbabilityThreshold::new(config.risk_probability_threshold)?,
            class_weighting: config.class_weighting,
            model: LogisticRegression::new(
                config.logistic_iterations,
                config.logistic_learning_rate,
                config.logistic_l2,
            )?,
            artifact: None,
        })
    }

    /// Override the decision threshold without retraining
    pub fn with_threshold(mut self, threshold: ProbabilityThreshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_artifact(mut self, artifact: Arc<RiskArtifact>) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn threshold(&self) -> ProbabilityThreshold {
        self.threshold
    }

    pub fn artifact(&self) -> Option<&Arc<RiskArtifact>> {
        self.artifact.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.artifact.is_some()
    }

    /// Eligible weeks with an observed following week, labelled by its stress
    pub fn labelled_rows(&self, panel: &Panel) -> LabelledRows {
        let series: Vec<&HospitalSeries> = panel.iter().collect();
        let per_hospital: Vec<Vec<(Vec<f64>, bool)>> = series
            .par_iter()
            .map(|s| {
                self.builder
                    .supervised_rows(s)
                    .into_iter()
                    .map(|row| {
                        (
                            risk_inputs(&row.features),
                            row.next_stress_score >= self.label_threshold,
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut out = LabelledRows::default();
        for (row, label) in per_hospital.into_iter().flatten() {
            out.rows.push(row);
            out.labels.push(label);
        }
        out
    }

    pub fn train(&mut self, panel: &Panel, trained_at: DateTime<Utc>) -> Result<Arc<RiskArtifact>> {
        let labelled = self.labelled_rows(panel);
        if labelled.rows.is_empty() {
            return Err(PipelineError::EmptyTrainingSet(
                "No labelled weeks for the overload classifier".to_string(),
            ));
        }

        let positives = labelled.labels.iter().filter(|&&l| l).count();
        if positives == 0 || positives == labelled.labels.len() {
            warn!(
                rows = labelled.labels.len(),
                positives, "overload training labels contain a single class"
            );
        }

        let (negative_weight, positive_weight) =
            class_weights(self.class_weighting, &labelled.labels);
        let weights: Vec<f64> = labelled
            .labels
            .iter()
            .map(|&l| if l { positive_weight } else { negative_weight })
            .collect();
        let targets: Vec<f64> = labelled.labels.iter().map(|&l| f64::from(u8::from(l))).collect();
        let data = TrainingData::new(labelled.rows, targets)?.with_weights(weights)?;

        let model = self.model.train(&data)?;
        let artifact = Arc::new(ModelArtifact {
            version: format!("logistic-{}", trained_at.format("%Y%m%dT%H%M%SZ")),
            feature_names: risk_feature_names(),
            trained_at,
            training_rows: data.len(),
            training_hospitals: panel.len(),
            model,
        });

        info!(
            model = %artifact.version,
            rows = artifact.training_rows,
            positives,
            hospitals = artifact.training_hospitals,
            "trained overload classifier"
        );
        self.artifact = Some(Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Train on the split's training hospitals and score the held-out ones
    pub fn train_with_holdout(
        &mut self,
        panel: &Panel,
        split: &GroupSplit,
        trained_at: DateTime<Utc>,
    ) -> Result<ClassificationMetrics> {
        let (train, holdout) = split.partition(panel);
        self.train(&train, trained_at)?;

        let labelled = self.labelled_rows(&holdout);
        if labelled.rows.is_empty() {
            return Err(PipelineError::EmptyHoldout(
                "Holdout hospitals have no labelled weeks to evaluate".to_string(),
            ));
        }
        let artifact = self.trained()?;
        let probabilities = labelled
            .rows
            .iter()
            .map(|row| artifact.predict_row(row))
            .collect::<Result<Vec<f64>>>()?;
        let metrics =
            classification_metrics(&probabilities, &labelled.labels, self.threshold.value())?;

        info!(
            samples = metrics.samples,
            positives = metrics.positives,
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            roc_auc = ?metrics.roc_auc,
            "overload classifier holdout"
        );
        Ok(metrics)
    }

    fn trained(&self) -> Result<&RiskArtifact> {
        self.artifact.as_deref().ok_or_else(|| {
            PipelineError::ModelNotTrained("Overload classifier has no artifact".to_string())
        })
    }

    /// Overload probability for the week after the vector's week
    pub fn predict_probability(&self, vector: &FeatureVector) -> Result<f64> {
        let p = self.trained()?.predict_row(&risk_inputs(vector))?;
        if !p.is_finite() {
            return Err(PipelineError::NonFinitePrediction {
                hospital_id: vector.hospital_id.clone(),
                horizon: 1,
            });
        }
        Ok(p.clamp(0.0, 1.0))
    }

    pub fn score(&self, vector: &FeatureVector, generated_at: DateTime<Utc>) -> Result<RiskRecord> {
        let probability = self.predict_probability(vector)?;
        Ok(RiskRecord {
            hospital_id: vector.hospital_id.clone(),
            week: vector.week,
            target_week: vector.week + self.builder.step(),
            overload_probability: probability,
            overload_flag: self.threshold.decide(probability),
            threshold_used: self.threshold.value(),
            model_version: self.trained()?.version.clone(),
            generated_at,
        })
    }

    /// Score the hospital's last observed week
    pub fn score_latest(
        &self,
        series: &HospitalSeries,
        generated_at: DateTime<Utc>,
    ) -> Result<RiskRecord> {
        let vector = self.builder.latest_window(series)?.to_vector()?;
        self.score(&vector, generated_at)
    }

    /// Score every eligible week of a series
    pub fn score_series(
        &self,
        series: &HospitalSeries,
        generated_at: DateTime<Utc>,
    ) -> Result<Vec<RiskRecord>> {
        self.builder
            .build(series)
            .vectors
            .iter()
            .map(|v| self.score(v, generated_at))
            .collect()
    }
}
