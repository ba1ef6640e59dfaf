//! Batch orchestration: train once, then forecast, score and alert per hospital
//!
//! Hospitals are processed in parallel and independently. A hospital-scoped
//! failure is recorded in the run summary without affecting the others. Any
//! other error, such as an artifact that does not fit the configuration,
//! aborts the run before anything reaches the sink.

use crate::alert::{AlertComposer, AlertRecord};
use crate::config::PipelineConfig;
use crate::data::{HospitalSeries, Panel};
use crate::error::{PipelineError, Result};
use crate::features::OXYGEN_PROXY_NOTE;
use crate::forecast::{ForecastEngine, ForecastRecord};
use crate::metrics::{ClassificationMetrics, RegressionMetrics};
use crate::risk::{RiskClassifier, RiskRecord};
use crate::split::{GroupSplit, HospitalGroupSplitter};
use crate::store::RecordSink;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Provenance attached to every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub oxygen_proxy_note: String,
    pub forecast_model_version: String,
    pub risk_model_version: String,
    pub critical_occupancy_threshold: f64,
    pub risk_probability_threshold: f64,
    pub generated_at: DateTime<Utc>,
}

/// What the training stage measured on the held-out hospitals
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub split: GroupSplit,
    pub forecast: Option<RegressionMetrics>,
    pub risk: Option<ClassificationMetrics>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Succeeded,
    /// Short history or a gap at the latest week
    Skipped { reason: String },
    Failed { reason: String },
}

/// Everything produced for one hospital in one run
#[derive(Debug, Clone)]
pub struct HospitalOutcome {
    pub hospital_id: String,
    pub status: OutcomeStatus,
    pub forecasts: Vec<ForecastRecord>,
    pub risk: Option<RiskRecord>,
    pub alert: Option<AlertRecord>,
}

impl HospitalOutcome {
    /// Isolate a hospital-scoped error; any other error is handed back
    fn from_error(hospital_id: &str, error: PipelineError) -> Result<Self> {
        if !error.is_hospital_scoped() {
            return Err(error);
        }
        let reason = error.to_string();
        let status = if error.is_skip() {
            OutcomeStatus::Skipped { reason }
        } else {
            OutcomeStatus::Failed { reason }
        };
        Ok(Self {
            hospital_id: hospital_id.to_string(),
            status,
            forecasts: Vec::new(),
            risk: None,
            alert: None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub metadata: RunMetadata,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<HospitalOutcome>,
}

impl RunSummary {
    pub fn outcome(&self, hospital_id: &str) -> Option<&HospitalOutcome> {
        self.outcomes.iter().find(|o| o.hospital_id == hospital_id)
    }
}

/// Entry point of the training stage
#[derive(Debug)]
pub struct Pipeline;

impl Pipeline {
    pub fn train(config: PipelineConfig, panel: &Panel) -> Result<TrainedPipeline> {
        Self::train_at(config, panel, Utc::now())
    }

    /// Train with a fixed timestamp, which also fixes the model versions
    pub fn train_at(
        config: PipelineConfig,
        panel: &Panel,
        trained_at: DateTime<Utc>,
    ) -> Result<TrainedPipeline> {
        let start = Instant::now();
        config.validate()?;
        let alerts = AlertComposer::from_config(&config)?;

        let mut panel = panel.clone();
        if let Some(max_weeks) = config.max_history_weeks {
            panel.truncate_history(max_weeks);
        }
        if panel.len() < config.min_training_hospitals {
            return Err(PipelineError::EmptyTrainingSet(format!(
                "Need at least {} hospitals to train, got {}",
                config.min_training_hospitals,
                panel.len()
            )));
        }

        let split = HospitalGroupSplitter::new(config.split_seed)
            .split(&panel.hospital_ids(), config.holdout_ratio)?;
        info!(
            stage = "train",
            hospitals = panel.len(),
            observations = panel.observation_count(),
            train_hospitals = split.train.len(),
            holdout_hospitals = split.holdout.len(),
            "starting training"
        );

        let mut forecast = ForecastEngine::new(&config)?;
        let forecast_metrics = holdout_report(
            "forecast",
            forecast.train_with_holdout(&panel, &split, trained_at),
        )?;

        let mut risk = RiskClassifier::new(&config)?;
        let risk_metrics =
            holdout_report("risk", risk.train_with_holdout(&panel, &split, trained_at))?;

        info!(
            stage = "train",
            elapsed_ms = start.elapsed().as_millis() as u64,
            "training finished"
        );

        Ok(TrainedPipeline {
            config,
            forecast,
            risk,
            alerts,
            report: TrainingReport {
                split,
                forecast: forecast_metrics,
                risk: risk_metrics,
            },
        })
    }
}

/// A holdout with nothing to evaluate is reported, not fatal; anything else
/// from training is.
fn holdout_report<T>(model: &str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(metrics) => Ok(Some(metrics)),
        Err(PipelineError::EmptyHoldout(reason)) => {
            warn!(model, %reason, "holdout evaluation skipped");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Trained models plus the alert rule, ready for batch runs
#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    config: PipelineConfig,
    forecast: ForecastEngine,
    risk: RiskClassifier,
    alerts: AlertComposer,
    report: TrainingReport,
}

impl TrainedPipeline {
    /// Assemble from engines trained or loaded elsewhere
    pub fn from_parts(
        config: PipelineConfig,
        forecast: ForecastEngine,
        risk: RiskClassifier,
        report: TrainingReport,
    ) -> Result<Self> {
        if !forecast.is_trained() {
            return Err(PipelineError::ModelNotTrained("forecast engine".to_string()));
        }
        if !risk.is_trained() {
            return Err(PipelineError::ModelNotTrained("risk classifier".to_string()));
        }
        let alerts = AlertComposer::from_config(&config)?;
        Ok(Self {
            config,
            forecast,
            risk,
            alerts,
            report,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn forecast_engine(&self) -> &ForecastEngine {
        &self.forecast
    }

    pub fn risk_classifier(&self) -> &RiskClassifier {
        &self.risk
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    fn metadata(&self, generated_at: DateTime<Utc>) -> RunMetadata {
        let version = |v: Option<String>| v.unwrap_or_else(|| "untrained".to_string());
        RunMetadata {
            oxygen_proxy_note: OXYGEN_PROXY_NOTE.to_string(),
            forecast_model_version: version(self.forecast.artifact().map(|a| a.version.clone())),
            risk_model_version: version(self.risk.artifact().map(|a| a.version.clone())),
            critical_occupancy_threshold: self.alerts.critical_occupancy_threshold(),
            risk_probability_threshold: self.risk.threshold().value(),
            generated_at,
        }
    }

    pub fn run<S: RecordSink>(&self, panel: &Panel, sink: &mut S) -> Result<RunSummary> {
        self.run_at(panel, sink, Utc::now())
    }

    /// Forecast, score and alert every hospital, then write to `sink`
    pub fn run_at<S: RecordSink>(
        &self,
        panel: &Panel,
        sink: &mut S,
        generated_at: DateTime<Utc>,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        let mut panel = panel.clone();
        if let Some(max_weeks) = self.config.max_history_weeks {
            panel.truncate_history(max_weeks);
        }
        info!(stage = "inference", hospitals = panel.len(), "starting run");

        let series: Vec<&HospitalSeries> = panel.iter().collect();
        let outcomes: Vec<HospitalOutcome> = series
            .par_iter()
            .map(|s| self.process_hospital(s, generated_at))
            .collect::<Result<Vec<_>>>()?;

        let mut summary = RunSummary {
            metadata: self.metadata(generated_at),
            succeeded: 0,
            skipped: 0,
            failed: 0,
            outcomes: Vec::with_capacity(outcomes.len()),
        };
        for outcome in outcomes {
            match &outcome.status {
                OutcomeStatus::Succeeded => summary.succeeded += 1,
                OutcomeStatus::Skipped { reason } => {
                    warn!(hospital = %outcome.hospital_id, %reason, "hospital skipped");
                    summary.skipped += 1;
                }
                OutcomeStatus::Failed { reason } => {
                    warn!(hospital = %outcome.hospital_id, %reason, "hospital failed");
                    summary.failed += 1;
                }
            }
            sink.upsert_forecasts(&outcome.forecasts)?;
            if let Some(risk) = &outcome.risk {
                sink.upsert_risks(std::slice::from_ref(risk))?;
            }
            if let Some(alert) = &outcome.alert {
                sink.upsert_alerts(std::slice::from_ref(alert))?;
            }
            summary.outcomes.push(outcome);
        }

        info!(
            stage = "inference",
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run finished"
        );
        Ok(summary)
    }

    /// Outcome of one hospital. Errors that are not hospital-scoped, such as
    /// an artifact that does not match the configuration, abort the run.
    fn process_hospital(
        &self,
        series: &HospitalSeries,
        generated_at: DateTime<Utc>,
    ) -> Result<HospitalOutcome> {
        let hospital_id = series.hospital_id();
        let run = match self.forecast.forecast_hospital(series, generated_at) {
            Ok(run) => run,
            Err(e) => return HospitalOutcome::from_error(hospital_id, e),
        };
        let risk = match self.risk.score_latest(series, generated_at) {
            Ok(r) => r,
            Err(e) => {
                let mut outcome = HospitalOutcome::from_error(hospital_id, e)?;
                outcome.forecasts = run.records;
                return Ok(outcome);
            }
        };

        // Partial forecasts are kept, but an alert needs the full horizon
        if let Some(e) = run.aborted {
            let mut outcome = HospitalOutcome::from_error(hospital_id, e)?;
            outcome.forecasts = run.records;
            outcome.risk = Some(risk);
            return Ok(outcome);
        }

        match self
            .alerts
            .compose(hospital_id, run.base_week, &run.records, Some(&risk), generated_at)
        {
            Ok(alert) => Ok(HospitalOutcome {
                hospital_id: hospital_id.to_string(),
                status: OutcomeStatus::Succeeded,
                forecasts: run.records,
                risk: Some(risk),
                alert: Some(alert),
            }),
            Err(e) => {
                let mut outcome = HospitalOutcome::from_error(hospital_id, e)?;
                outcome.forecasts = run.records;
                outcome.risk = Some(risk);
                Ok(outcome)
            }
        }
    }
}
