//! Pipeline configuration
//!
//! Every recognised option has a default except the critical occupancy
//! threshold, which has to be supplied by the caller.

use crate::error::{PipelineError, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sampling granularity of the input series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One observation per collection week
    #[default]
    Weekly,
    /// One observation per day
    Daily,
}

impl Granularity {
    /// Expected distance between consecutive observations
    pub fn step(&self) -> Duration {
        match self {
            Granularity::Weekly => Duration::weeks(1),
            Granularity::Daily => Duration::days(1),
        }
    }
}

/// How non-lag features are filled for forecast steps beyond the first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardFillPolicy {
    /// Keep the last observed inpatient and COVID ICU rates
    #[default]
    HoldLastObserved,
    /// Use the mean of the trailing rolling window of observed values
    TrailingMean,
}

/// Per-class sample weights for the overload classifier
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeighting {
    /// `n / (2 * n_class)` computed from the training labels
    #[default]
    Balanced,
    /// Explicit weights
    Fixed { negative: f64, positive: f64 },
    /// Every sample weighs 1
    Uniform,
}

/// Configuration for the full pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of lag features (lag_1..lag_n)
    pub lag_depth: usize,
    /// Trailing window for rolling statistics
    pub rolling_window: usize,
    /// Number of recursive forecast steps
    pub forecast_horizon: u8,
    /// Stress score at t+1 at or above which week t is labelled overload
    pub stress_next_threshold: f64,
    /// Probability at or above which a week is flagged
    pub risk_probability_threshold: f64,
    /// Forecast occupancy at or above which an alert fires
    pub critical_occupancy_threshold: Option<f64>,
    /// Forecast occupancy at or above which severity is at least "watch"
    pub watch_occupancy_threshold: f64,
    /// Share of hospitals held out for validation
    pub holdout_ratio: f64,
    /// Seed for the hospital group split
    pub split_seed: u64,
    pub forward_fill: ForwardFillPolicy,
    pub granularity: Granularity,
    /// Most recent observations kept per hospital
    pub max_history_weeks: Option<usize>,
    /// Multiplier applied to every forecast step (scenario analysis)
    pub scenario_multiplier: f64,
    /// Upper clamp for predicted occupancy
    pub max_predicted_occupancy: f64,
    /// L2 penalty of the occupancy regressor
    pub ridge_alpha: f64,
    pub class_weighting: ClassWeighting,
    pub logistic_iterations: usize,
    pub logistic_learning_rate: f64,
    pub logistic_l2: f64,
    /// Minimum number of distinct hospitals required to train
    pub min_training_hospitals: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lag_depth: 4,
            rolling_window: 4,
            forecast_horizon: 4,
            stress_next_threshold: 75.0,
            risk_probability_threshold: 0.35,
            critical_occupancy_threshold: None,
            watch_occupancy_threshold: 0.75,
            holdout_ratio: 0.2,
            split_seed: 42,
            forward_fill: ForwardFillPolicy::HoldLastObserved,
            granularity: Granularity::Weekly,
            max_history_weeks: Some(120),
            scenario_multiplier: 1.0,
            max_predicted_occupancy: 1.2,
            ridge_alpha: 1e-2,
            class_weighting: ClassWeighting::Balanced,
            logistic_iterations: 500,
            logistic_learning_rate: 0.1,
            logistic_l2: 1e-3,
            min_training_hospitals: 2,
        }
    }
}

impl PipelineConfig {
    /// Default configuration with the required critical threshold supplied
    pub fn with_critical_occupancy_threshold(threshold: f64) -> Self {
        Self {
            critical_occupancy_threshold: Some(threshold),
            ..Self::default()
        }
    }

    /// Parse configuration from a JSON string
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Prior observations needed before a week can get a feature vector
    pub fn required_history(&self) -> usize {
        self.lag_depth.max(self.rolling_window)
    }

    /// The critical occupancy threshold, which has no default
    pub fn critical_threshold(&self) -> Result<f64> {
        self.critical_occupancy_threshold.ok_or_else(|| {
            PipelineError::MissingConfiguration(
                "critical_occupancy_threshold must be supplied".to_string(),
            )
        })
    }

    /// Check every option against its valid range
    pub fn validate(&self) -> Result<()> {
        if self.lag_depth < 2 {
            return Err(PipelineError::InvalidParameter(format!(
                "lag_depth must be at least 2, got {}",
                self.lag_depth
            )));
        }
        if self.rolling_window < 2 {
            return Err(PipelineError::InvalidParameter(format!(
                "rolling_window must be at least 2, got {}",
                self.rolling_window
            )));
        }
        if !(1..=12).contains(&self.forecast_horizon) {
            return Err(PipelineError::InvalidParameter(format!(
                "forecast_horizon must be between 1 and 12, got {}",
                self.forecast_horizon
            )));
        }
        check_unit_interval("risk_probability_threshold", self.risk_probability_threshold)?;
        if !(0.0..=100.0).contains(&self.stress_next_threshold) {
            return Err(PipelineError::InvalidParameter(format!(
                "stress_next_threshold must be within [0, 100], got {}",
                self.stress_next_threshold
            )));
        }
        if let Some(critical) = self.critical_occupancy_threshold {
            check_positive("critical_occupancy_threshold", critical)?;
            if self.watch_occupancy_threshold > critical {
                return Err(PipelineError::InvalidParameter(format!(
                    "watch_occupancy_threshold ({}) must not exceed \
                     critical_occupancy_threshold ({})",
                    self.watch_occupancy_threshold, critical
                )));
            }
        }
        check_positive("watch_occupancy_threshold", self.watch_occupancy_threshold)?;
        if !(self.holdout_ratio > 0.0 && self.holdout_ratio < 1.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "holdout_ratio must be within (0, 1), got {}",
                self.holdout_ratio
            )));
        }
        if let Some(weeks) = self.max_history_weeks {
            if weeks <= self.required_history() {
                return Err(PipelineError::InvalidParameter(format!(
                    "max_history_weeks ({}) must exceed the feature window ({})",
                    weeks,
                    self.required_history()
                )));
            }
        }
        check_positive("scenario_multiplier", self.scenario_multiplier)?;
        check_positive("max_predicted_occupancy", self.max_predicted_occupancy)?;
        // The lag, rolling and delta inputs are collinear, so an unpenalised fit is singular
        check_positive("ridge_alpha", self.ridge_alpha)?;
        if let ClassWeighting::Fixed { negative, positive } = self.class_weighting {
            check_positive("class_weighting.negative", negative)?;
            check_positive("class_weighting.positive", positive)?;
        }
        if self.logistic_iterations == 0 {
            return Err(PipelineError::InvalidParameter(
                "logistic_iterations must be positive".to_string(),
            ));
        }
        check_positive("logistic_learning_rate", self.logistic_learning_rate)?;
        if self.logistic_l2 < 0.0 {
            return Err(PipelineError::InvalidParameter(
                "logistic_l2 must be non-negative".to_string(),
            ));
        }
        if self.min_training_hospitals < 2 {
            return Err(PipelineError::InvalidParameter(
                "min_training_hospitals must be at least 2 for a group holdout".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(PipelineError::InvalidParameter(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value.is_finite()) {
        return Err(PipelineError::InvalidParameter(format!(
            "{} must be a positive finite number, got {}",
            name, value
        )));
    }
    Ok(())
}
