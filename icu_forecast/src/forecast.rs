//! Recursive multi-step ICU occupancy forecasting
//!
//! A single ridge regressor predicts next-week occupancy from a feature
//! vector. Longer horizons are produced by feeding each prediction back into
//! the hospital's [`FeatureWindow`] and predicting again, so horizon `k`
//! always depends on horizon `k - 1`.

use crate::config::PipelineConfig;
use crate::data::{HospitalSeries, Panel};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureBuilder, FeatureVector};
use crate::metrics::{regression_metrics, RegressionMetrics};
use crate::models::{Model, ModelArtifact, RidgeRegression, TrainedRidge, TrainingData};
use crate::split::GroupSplit;
use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Published occupancy regressor
pub type ForecastArtifact = ModelArtifact<TrainedRidge>;

/// One predicted occupancy value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub hospital_id: String,
    /// Last observed week the forecast starts from
    pub base_week: NaiveDate,
    /// Steps ahead of `base_week`, starting at 1
    pub horizon: u8,
    pub target_week: NaiveDate,
    pub predicted_occupancy_rate: f64,
    pub model_version: String,
    pub generated_at: DateTime<Utc>,
}

/// The forecast produced for one hospital.
///
/// When a step yields a non-finite value the remaining steps are dropped,
/// `records` keeps the steps before it and `aborted` carries the error.
#[derive(Debug)]
pub struct ForecastRun {
    pub hospital_id: String,
    pub base_week: NaiveDate,
    pub records: Vec<ForecastRecord>,
    pub aborted: Option<PipelineError>,
}

impl ForecastRun {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    /// Highest predicted occupancy across the produced horizons
    pub fn peak(&self) -> Option<f64> {
        self.records
            .iter()
            .map(|r| r.predicted_occupancy_rate)
            .reduce(f64::max)
    }
}

/// Regressor input names, in the order of [`forecast_inputs`]
pub fn forecast_feature_names(lag_depth: usize) -> Vec<String> {
    let mut names = vec!["icu_occupancy_rate".to_string()];
    names.extend((1..=lag_depth).map(|k| format!("lag_{}", k)));
    names.extend(
        [
            "rolling_mean",
            "rolling_std",
            "rolling_min",
            "rolling_max",
            "weekly_delta",
            "weekly_pct_change",
            "inpatient_occupancy_rate",
            "covid_icu_rate",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    names
}

/// Regressor inputs taken from a feature vector
pub fn forecast_inputs(vector: &FeatureVector) -> Vec<f64> {
    let mut row = Vec::with_capacity(vector.lags.len() + 9);
    row.push(vector.icu_occupancy_rate);
    row.extend_from_slice(&vector.lags);
    row.extend_from_slice(&[
        vector.rolling_mean,
        vector.rolling_std,
        vector.rolling_min,
        vector.rolling_max,
        vector.weekly_delta,
        vector.weekly_pct_change,
        vector.inpatient_occupancy_rate,
        vector.covid_icu_rate,
    ]);
    row
}

/// Trains the occupancy regressor and produces recursive forecasts
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    builder: FeatureBuilder,
    horizon: u8,
    scenario_multiplier: f64,
    max_predicted_occupancy: f64,
    model: RidgeRegression,
    artifact: Option<Arc<ForecastArtifact>>,
}

impl ForecastEngine {
    /// Untrained engine configured from `config`
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            builder: FeatureBuilder::from_config(config)?,
            horizon: config.forecast_horizon,
            scenario_multiplier: config.scenario_multiplier,
            max_predicted_occupancy: config.max_predicted_occupancy,
            model: RidgeRegression::new(config.ridge_alpha)?,
            artifact: None,
        })
    }

    /// Use an already published artifact
    pub fn with_artifact(mut self, artifact: Arc<ForecastArtifact>) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn artifact(&self) -> Option<&Arc<ForecastArtifact>> {
        self.artifact.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn horizon(&self) -> u8 {
        self.horizon
    }

    pub fn builder(&self) -> &FeatureBuilder {
        &self.builder
    }

    /// Supervised rows of every hospital: features at t, occupancy at t+1
    pub fn training_data(&self, panel: &Panel) -> Result<TrainingData> {
        let series: Vec<&HospitalSeries> = panel.iter().collect();
        let per_hospital: Vec<(Vec<Vec<f64>>, Vec<f64>)> = series
            .par_iter()
            .map(|s| {
                let (rows, targets): (Vec<Vec<f64>>, Vec<f64>) = self
                    .builder
                    .supervised_rows(s)
                    .into_iter()
                    .map(|row| (forecast_inputs(&row.features), row.next_icu_occupancy_rate))
                    .unzip();
                (rows, targets)
            })
            .collect();

        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for (r, t) in per_hospital {
            rows.extend(r);
            targets.extend(t);
        }
        TrainingData::new(rows, targets)
    }

    /// Fit the regressor on every hospital of `panel` and publish the artifact
    pub fn train(
        &mut self,
        panel: &Panel,
        trained_at: DateTime<Utc>,
    ) -> Result<Arc<ForecastArtifact>> {
        let data = self.training_data(panel)?;
        if data.is_empty() {
            return Err(PipelineError::EmptyTrainingSet(
                "No eligible weeks with an observed following week for the occupancy model"
                    .to_string(),
            ));
        }

        let model = self.model.train(&data)?;
        let artifact = Arc::new(ModelArtifact {
            version: format!("ridge-{}", trained_at.format("%Y%m%dT%H%M%SZ")),
            feature_names: forecast_feature_names(self.builder.lag_depth()),
            trained_at,
            training_rows: data.len(),
            training_hospitals: panel.len(),
            model,
        });

        info!(
            model = %artifact.version,
            rows = artifact.training_rows,
            hospitals = artifact.training_hospitals,
            "trained occupancy regressor"
        );
        self.artifact = Some(Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Train on the split's training hospitals and score next-week
    /// predictions on the held-out hospitals
    pub fn train_with_holdout(
        &mut self,
        panel: &Panel,
        split: &GroupSplit,
        trained_at: DateTime<Utc>,
    ) -> Result<RegressionMetrics> {
        let (train, holdout) = split.partition(panel);
        self.train(&train, trained_at)?;

        let mut predicted = Vec::new();
        let mut actual = Vec::new();
        for series in holdout.iter() {
            for row in self.builder.supervised_rows(series) {
                predicted.push(self.predict_next(&row.features, 1)?);
                actual.push(row.next_icu_occupancy_rate);
            }
        }
        if predicted.is_empty() {
            return Err(PipelineError::EmptyHoldout(
                "Holdout hospitals have no eligible weeks to evaluate".to_string(),
            ));
        }
        let metrics = regression_metrics(&predicted, &actual)?;

        info!(
            samples = metrics.samples,
            mae = metrics.mae,
            rmse = metrics.rmse,
            r2 = ?metrics.r2,
            "occupancy regressor holdout"
        );
        Ok(metrics)
    }

    fn trained(&self) -> Result<&ForecastArtifact> {
        self.artifact.as_deref().ok_or_else(|| {
            PipelineError::ModelNotTrained("Occupancy forecast model has no artifact".to_string())
        })
    }

    /// Scenario multiplier and clamp applied to a raw model output
    fn adjust(&self, raw: f64) -> f64 {
        (raw * self.scenario_multiplier).clamp(0.0, self.max_predicted_occupancy)
    }

    /// Next-step occupancy for one feature vector.
    ///
    /// A non-finite model output is an error, never clamped into range.
    pub fn predict_next(&self, vector: &FeatureVector, horizon: u8) -> Result<f64> {
        let raw = self.trained()?.predict_row(&forecast_inputs(vector))?;
        if !raw.is_finite() {
            return Err(PipelineError::NonFinitePrediction {
                hospital_id: vector.hospital_id.clone(),
                horizon,
            });
        }
        Ok(self.adjust(raw))
    }

    /// Forecast `horizon` weeks past the hospital's last observed week.
    ///
    /// Fails when the last week has no feature vector (short history or a
    /// gap), when the engine is untrained, or when the artifact does not fit
    /// the configured feature layout.
    pub fn forecast_hospital(
        &self,
        series: &HospitalSeries,
        generated_at: DateTime<Utc>,
    ) -> Result<ForecastRun> {
        let artifact = self.trained()?;
        let mut window = self.builder.latest_window(series)?;
        let base_week = window.week();

        let mut run = ForecastRun {
            hospital_id: series.hospital_id().to_string(),
            base_week,
            records: Vec::with_capacity(self.horizon as usize),
            aborted: None,
        };

        for horizon in 1..=self.horizon {
            let vector = window.to_vector()?;
            let predicted = match self.predict_next(&vector, horizon) {
                Ok(p) => p,
                Err(e) if e.is_hospital_scoped() => {
                    run.aborted = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            };
            window.advance(predicted)?;

            debug!(
                hospital = %run.hospital_id,
                horizon,
                target_week = %window.week(),
                predicted,
                "forecast step"
            );
            run.records.push(ForecastRecord {
                hospital_id: run.hospital_id.clone(),
                base_week,
                horizon,
                target_week: window.week(),
                predicted_occupancy_rate: predicted,
                model_version: artifact.version.clone(),
                generated_at,
            });
        }

        Ok(run)
    }
}
