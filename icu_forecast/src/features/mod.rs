//! Feature derivation from a hospital's weekly series
//!
//! Every feature vector is produced from a [`FeatureWindow`], the trailing
//! slice of observations ending at the week being described. Historical
//! feature building and recursive forecasting share that code path, so a
//! forecast step sees exactly the features the model was trained on.

use crate::config::{ForwardFillPolicy, Granularity, PipelineConfig};
use crate::data::HospitalSeries;
use crate::error::{PipelineError, Result};
use capacity_math::scalar::pct_change;
use capacity_math::RollingWindow;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub mod oxygen;
pub mod stress;

pub use oxygen::{oxygen_risk_proxy, OxygenRiskProxy, OxygenRunway, OXYGEN_PROXY_NOTE};

/// Features describing one hospital at one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub hospital_id: String,
    pub week: NaiveDate,
    /// ICU occupancy at this week
    pub icu_occupancy_rate: f64,
    /// `lags[k - 1]` is the ICU occupancy k weeks earlier
    pub lags: Vec<f64>,
    pub rolling_mean: f64,
    pub rolling_std: f64,
    pub rolling_min: f64,
    pub rolling_max: f64,
    pub weekly_delta: f64,
    pub weekly_pct_change: f64,
    pub inpatient_occupancy_rate: f64,
    pub covid_icu_rate: f64,
    /// Approximation, see [`OXYGEN_PROXY_NOTE`]
    pub oxygen_risk_proxy: f64,
    pub stress_score: f64,
    pub stress_lag_1: f64,
    pub stress_lag_2: f64,
    pub stress_rolling_mean: f64,
    pub stress_rolling_std: f64,
    pub stress_delta: f64,
    pub centered_stress: f64,
}

impl FeatureVector {
    /// ICU occupancy `k` weeks before this vector's week (1-based)
    pub fn lag(&self, k: usize) -> Option<f64> {
        k.checked_sub(1).and_then(|i| self.lags.get(i)).copied()
    }
}

/// A week whose feature vector could not be built
#[derive(Debug)]
pub struct SkippedWeek {
    pub week: NaiveDate,
    pub error: PipelineError,
}

/// Output of building one hospital's series
#[derive(Debug)]
pub struct FeatureSet {
    pub hospital_id: String,
    pub vectors: Vec<FeatureVector>,
    pub skipped: Vec<SkippedWeek>,
}

/// A feature vector paired with what happened the following week
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisedRow {
    pub features: FeatureVector,
    pub next_icu_occupancy_rate: f64,
    pub next_stress_score: f64,
}

/// Trailing state of one hospital, advanced one step at a time
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    hospital_id: String,
    week: NaiveDate,
    lag_depth: usize,
    rolling_window: usize,
    step: Duration,
    icu: RollingWindow,
    stress: RollingWindow,
    observed_inpatient: RollingWindow,
    observed_covid: RollingWindow,
    /// Forecast steps taken since the last real observation
    steps_ahead: usize,
    fill: ForwardFillPolicy,
    proxy: OxygenRiskProxy,
}

impl FeatureWindow {
    pub fn hospital_id(&self) -> &str {
        &self.hospital_id
    }

    /// The week this window currently ends at
    pub fn week(&self) -> NaiveDate {
        self.week
    }

    pub fn steps_ahead(&self) -> usize {
        self.steps_ahead
    }

    pub fn with_fill_policy(mut self, fill: ForwardFillPolicy) -> Self {
        self.fill = fill;
        self
    }

    fn filled(&self, observed: &RollingWindow) -> Result<f64> {
        let last = observed
            .latest()
            .ok_or_else(|| PipelineError::DataError("Empty non-lag window".to_string()))?;
        if self.steps_ahead == 0 {
            return Ok(last);
        }
        match self.fill {
            ForwardFillPolicy::HoldLastObserved => Ok(last),
            ForwardFillPolicy::TrailingMean => {
                let stats = observed.tail_stats(observed.len())?;
                Ok(stats.mean)
            }
        }
    }

    fn latest(window: &RollingWindow, k: usize) -> Result<f64> {
        window.back(k).ok_or_else(|| {
            PipelineError::DataError(format!("Window holds fewer than {} values", k + 1))
        })
    }

    /// Feature vector for the week this window ends at
    pub fn to_vector(&self) -> Result<FeatureVector> {
        let current = Self::latest(&self.icu, 0)?;
        let lags = (1..=self.lag_depth)
            .map(|k| Self::latest(&self.icu, k))
            .collect::<Result<Vec<f64>>>()?;

        // Rolling statistics cover the weeks before `week`, never the current one
        let prior = self.icu.tail(self.rolling_window + 1)?;
        let icu_stats = capacity_math::rolling::window_stats(&prior[..self.rolling_window])?;

        let stress_now = Self::latest(&self.stress, 0)?;
        let stress_lag_1 = Self::latest(&self.stress, 1)?;
        let stress_lag_2 = Self::latest(&self.stress, 2)?;
        let prior_stress = self.stress.tail(self.rolling_window + 1)?;
        let stress_stats =
            capacity_math::rolling::window_stats(&prior_stress[..self.rolling_window])?;
        let stress_delta = stress_now - stress_lag_1;

        let weekly_delta = current - lags[0];
        Ok(FeatureVector {
            hospital_id: self.hospital_id.clone(),
            week: self.week,
            icu_occupancy_rate: current,
            weekly_delta,
            weekly_pct_change: pct_change(lags[0], current),
            lags,
            rolling_mean: icu_stats.mean,
            rolling_std: icu_stats.std,
            rolling_min: icu_stats.min,
            rolling_max: icu_stats.max,
            inpatient_occupancy_rate: self.filled(&self.observed_inpatient)?,
            covid_icu_rate: self.filled(&self.observed_covid)?,
            oxygen_risk_proxy: self.proxy.estimate(current, stress_delta, stress_stats.std),
            stress_score: stress_now,
            stress_lag_1,
            stress_lag_2,
            stress_rolling_mean: stress_stats.mean,
            stress_rolling_std: stress_stats.std,
            stress_delta,
            centered_stress: stress_now - stress_stats.mean,
        })
    }

    /// Move the window one step forward using a predicted occupancy.
    ///
    /// The prediction becomes the most recent occupancy and every lag shifts
    /// by one. Stress has no forecast of its own and holds its last value.
    pub fn advance(&mut self, predicted_icu: f64) -> Result<()> {
        let held_stress = Self::latest(&self.stress, 0)?;
        self.icu.push(predicted_icu);
        self.stress.push(held_stress);
        self.week += self.step;
        self.steps_ahead += 1;
        Ok(())
    }
}

/// Builds feature vectors from hospital series
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    lag_depth: usize,
    rolling_window: usize,
    step: Duration,
    fill: ForwardFillPolicy,
    proxy: OxygenRiskProxy,
}

impl FeatureBuilder {
    /// Create a builder; both sizes must be at least 2
    pub fn new(lag_depth: usize, rolling_window: usize, granularity: Granularity) -> Result<Self> {
        if lag_depth < 2 || rolling_window < 2 {
            return Err(PipelineError::InvalidParameter(format!(
                "lag_depth ({}) and rolling_window ({}) must both be at least 2",
                lag_depth, rolling_window
            )));
        }

        Ok(Self {
            lag_depth,
            rolling_window,
            step: granularity.step(),
            fill: ForwardFillPolicy::default(),
            proxy: OxygenRiskProxy::default(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(config.lag_depth, config.rolling_window, config.granularity)?
            .with_fill_policy(config.forward_fill))
    }

    pub fn with_fill_policy(mut self, fill: ForwardFillPolicy) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_proxy(mut self, proxy: OxygenRiskProxy) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn lag_depth(&self) -> usize {
        self.lag_depth
    }

    pub fn rolling_window(&self) -> usize {
        self.rolling_window
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Contiguous prior observations needed before a week is eligible
    pub fn required_history(&self) -> usize {
        self.lag_depth.max(self.rolling_window)
    }

    /// Window ending at observation `index`
    pub fn window_at(&self, series: &HospitalSeries, index: usize) -> Result<FeatureWindow> {
        let observations = series.observations();
        let obs = observations.get(index).ok_or_else(|| {
            PipelineError::DataError(format!(
                "Index {} out of range for hospital {} ({} observations)",
                index,
                series.hospital_id(),
                observations.len()
            ))
        })?;
        let required = self.required_history();

        // A gap anywhere inside the window invalidates it, even when the
        // window is also short.
        let earliest = (index + 1).saturating_sub(required).max(1);
        for j in (earliest..=index).rev() {
            if !series.follows_contiguously(j, self.step) {
                return Err(PipelineError::DataGap {
                    hospital_id: series.hospital_id().to_string(),
                    week: obs.week,
                    expected: observations[j - 1].week + self.step,
                    found: observations[j].week,
                });
            }
        }
        if index < required {
            return Err(PipelineError::InsufficientHistory {
                hospital_id: series.hospital_id().to_string(),
                week: obs.week,
                required,
                available: index,
            });
        }

        let slice = &observations[index - required..=index];
        let capacity = required + 1;
        let icu: Vec<f64> = slice.iter().map(|o| o.icu_occupancy_rate).collect();
        let stress: Vec<f64> = slice.iter().map(|o| o.stress_score).collect();
        let inpatient: Vec<f64> = slice.iter().map(|o| o.inpatient_occupancy_rate).collect();
        let covid: Vec<f64> = slice.iter().map(|o| o.covid_icu_rate).collect();

        Ok(FeatureWindow {
            hospital_id: series.hospital_id().to_string(),
            week: obs.week,
            lag_depth: self.lag_depth,
            rolling_window: self.rolling_window,
            step: self.step,
            icu: RollingWindow::from_history(capacity, &icu)?,
            stress: RollingWindow::from_history(capacity, &stress)?,
            observed_inpatient: RollingWindow::from_history(self.rolling_window, &inpatient)?,
            observed_covid: RollingWindow::from_history(self.rolling_window, &covid)?,
            steps_ahead: 0,
            fill: self.fill,
            proxy: self.proxy,
        })
    }

    /// Window ending at the most recent observation
    pub fn latest_window(&self, series: &HospitalSeries) -> Result<FeatureWindow> {
        self.window_at(series, series.len().saturating_sub(1))
    }

    /// Feature vector for observation `index`
    pub fn build_at(&self, series: &HospitalSeries, index: usize) -> Result<FeatureVector> {
        self.window_at(series, index)?.to_vector()
    }

    /// One vector per eligible week; ineligible weeks are reported, not imputed
    pub fn build(&self, series: &HospitalSeries) -> FeatureSet {
        let mut vectors = Vec::with_capacity(series.len());
        let mut skipped = Vec::new();

        for (index, obs) in series.observations().iter().enumerate() {
            match self.build_at(series, index) {
                Ok(vector) => vectors.push(vector),
                Err(error) => skipped.push(SkippedWeek {
                    week: obs.week,
                    error,
                }),
            }
        }

        FeatureSet {
            hospital_id: series.hospital_id().to_string(),
            vectors,
            skipped,
        }
    }

    /// Eligible weeks whose following week is observed contiguously
    pub fn supervised_rows(&self, series: &HospitalSeries) -> Vec<SupervisedRow> {
        let observations = series.observations();
        let mut rows = Vec::new();
        for index in 0..observations.len().saturating_sub(1) {
            if !series.follows_contiguously(index + 1, self.step) {
                continue;
            }
            if let Ok(features) = self.build_at(series, index) {
                let next = &observations[index + 1];
                rows.push(SupervisedRow {
                    features,
                    next_icu_occupancy_rate: next.icu_occupancy_rate,
                    next_stress_score: next.stress_score,
                });
            }
        }
        rows
    }
}

/// Overload label per week: whether the following week's stress reaches
/// `threshold`. `None` when the following week is not observed contiguously.
pub fn overload_labels(
    series: &HospitalSeries,
    threshold: f64,
    step: Duration,
) -> Vec<Option<bool>> {
    let observations = series.observations();
    (0..observations.len())
        .map(|index| {
            if series.follows_contiguously(index + 1, step) {
                Some(observations[index + 1].stress_score >= threshold)
            } else {
                None
            }
        })
        .collect()
}
