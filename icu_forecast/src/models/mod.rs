//! Learned models behind the forecast engine and the risk classifier

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub mod logistic;
pub mod ridge;
pub mod scaler;

pub use logistic::{LogisticRegression, TrainedLogistic};
pub use ridge::{RidgeRegression, TrainedRidge};
pub use scaler::Standardizer;

/// Design matrix with targets and optional per-row weights
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingData {
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    pub weights: Option<Vec<f64>>,
}

impl TrainingData {
    pub fn new(rows: Vec<Vec<f64>>, targets: Vec<f64>) -> Result<Self> {
        let data = Self {
            rows,
            targets,
            weights: None,
        };
        data.validate()?;
        Ok(data)
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        self.weights = Some(weights);
        self.validate()?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    fn validate(&self) -> Result<()> {
        if self.rows.len() != self.targets.len() {
            return Err(PipelineError::DataError(format!(
                "Rows ({}) and targets ({}) differ in length",
                self.rows.len(),
                self.targets.len()
            )));
        }
        let width = self.width();
        if self.rows.iter().any(|r| r.len() != width) {
            return Err(PipelineError::DataError(
                "Training rows have inconsistent widths".to_string(),
            ));
        }
        if let Some(weights) = &self.weights {
            if weights.len() != self.rows.len() {
                return Err(PipelineError::DataError(format!(
                    "Weights ({}) and rows ({}) differ in length",
                    weights.len(),
                    self.rows.len()
                )));
            }
            if weights.iter().any(|w| !(*w >= 0.0 && w.is_finite())) {
                return Err(PipelineError::DataError(
                    "Sample weights must be finite and non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A fitted model scoring one raw feature row at a time
pub trait TrainedModel: Debug + Send + Sync {
    /// Score one raw (unscaled) feature row
    fn predict_row(&self, row: &[f64]) -> Result<f64>;

    /// Number of features expected per row
    fn width(&self) -> usize;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Model hyper-parameters that can be fit to training data
pub trait Model: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedModel;

    /// Fit the model
    fn train(&self, data: &TrainingData) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// A published, immutable model with its provenance.
///
/// Artifacts are shared read-only between concurrent inference tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact<M> {
    pub version: String,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub training_hospitals: usize,
    pub model: M,
}

impl<M: TrainedModel> ModelArtifact<M> {
    /// Score a row after checking its width against the recorded features
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.feature_names.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "Model {} expects {} features, got {}",
                self.version,
                self.feature_names.len(),
                row.len()
            )));
        }
        self.model.predict_row(row)
    }
}

impl<M: Serialize + DeserializeOwned> ModelArtifact<M> {
    /// Write the artifact as JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read an artifact previously written by [`ModelArtifact::save_json`]
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
