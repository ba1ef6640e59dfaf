//! Alert composition from forecast and risk signals
//!
//! An alert fires when any forecast horizon reaches the critical occupancy
//! threshold or when the classifier flags an overload. Severity grades the
//! same inputs plus the oxygen runway at the forecast peak.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::features::OxygenRunway;
use crate::forecast::ForecastRecord;
use crate::risk::RiskRecord;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which signal caused an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertReason {
    Forecast,
    Risk,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    Normal,
    Watch,
    Critical,
}

/// Alert state for one hospital and base week; always recomputable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub hospital_id: String,
    pub week: NaiveDate,
    pub triggered: bool,
    /// `None` when not triggered
    pub reason: Option<AlertReason>,
    pub peak_forecast_occupancy: f64,
    pub severity: AlertLevel,
    pub oxygen_weeks_remaining: u32,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertComposer {
    critical_occupancy_threshold: f64,
    watch_occupancy_threshold: f64,
    runway: OxygenRunway,
}

impl AlertComposer {
    pub fn new(critical_occupancy_threshold: f64, watch_occupancy_threshold: f64) -> Result<Self> {
        if !(critical_occupancy_threshold > 0.0 && critical_occupancy_threshold.is_finite()) {
            return Err(PipelineError::InvalidParameter(format!(
                "Critical occupancy threshold must be positive, got {}",
                critical_occupancy_threshold
            )));
        }
        if !(watch_occupancy_threshold > 0.0
            && watch_occupancy_threshold <= critical_occupancy_threshold)
        {
            return Err(PipelineError::InvalidParameter(format!(
                "Watch threshold {} must be positive and not above the critical threshold {}",
                watch_occupancy_threshold, critical_occupancy_threshold
            )));
        }

        Ok(Self {
            critical_occupancy_threshold,
            watch_occupancy_threshold,
            runway: OxygenRunway::default(),
        })
    }

    /// Fails with `MissingConfiguration` when no critical threshold is set
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.critical_threshold()?, config.watch_occupancy_threshold)
    }

    pub fn with_runway(mut self, runway: OxygenRunway) -> Self {
        self.runway = runway;
        self
    }

    pub fn critical_occupancy_threshold(&self) -> f64 {
        self.critical_occupancy_threshold
    }

    fn incomplete(hospital_id: &str, week: NaiveDate, missing: impl Into<String>) -> PipelineError {
        PipelineError::IncompleteSignal {
            hospital_id: hospital_id.to_string(),
            week,
            missing: missing.into(),
        }
    }

    /// Combine the forecasts and the risk record of one hospital and week.
    ///
    /// Both signals are required and must refer to `hospital_id` and `week`
    /// (the forecasts' base week).
    pub fn compose(
        &self,
        hospital_id: &str,
        week: NaiveDate,
        forecasts: &[ForecastRecord],
        risk: Option<&RiskRecord>,
        generated_at: DateTime<Utc>,
    ) -> Result<AlertRecord> {
        if forecasts.is_empty() {
            return Err(Self::incomplete(hospital_id, week, "forecast"));
        }
        if let Some(other) = forecasts
            .iter()
            .find(|f| f.hospital_id != hospital_id || f.base_week != week)
        {
            return Err(Self::incomplete(
                hospital_id,
                week,
                format!(
                    "forecast for this hospital and week (got {} at {})",
                    other.hospital_id, other.base_week
                ),
            ));
        }
        let risk = risk.ok_or_else(|| Self::incomplete(hospital_id, week, "risk"))?;
        if risk.hospital_id != hospital_id || risk.week != week {
            return Err(Self::incomplete(
                hospital_id,
                week,
                format!(
                    "risk for this hospital and week (got {} at {})",
                    risk.hospital_id, risk.week
                ),
            ));
        }

        let peak = forecasts
            .iter()
            .map(|f| f.predicted_occupancy_rate)
            .fold(f64::NEG_INFINITY, f64::max);
        let forecast_hit = peak >= self.critical_occupancy_threshold;
        let risk_hit = risk.overload_flag;
        let reason = match (forecast_hit, risk_hit) {
            (true, true) => Some(AlertReason::Both),
            (true, false) => Some(AlertReason::Forecast),
            (false, true) => Some(AlertReason::Risk),
            (false, false) => None,
        };

        let oxygen_weeks_remaining = self.runway.weeks_of_supply(peak);
        Ok(AlertRecord {
            hospital_id: hospital_id.to_string(),
            week,
            triggered: reason.is_some(),
            reason,
            peak_forecast_occupancy: peak,
            severity: self.severity(peak, risk_hit, oxygen_weeks_remaining),
            oxygen_weeks_remaining,
            generated_at,
        })
    }

    /// Highest of the occupancy, risk flag and oxygen runway levels
    pub fn severity(
        &self,
        peak_occupancy: f64,
        overload_flag: bool,
        oxygen_weeks: u32,
    ) -> AlertLevel {
        let occupancy = if peak_occupancy >= self.critical_occupancy_threshold {
            AlertLevel::Critical
        } else if peak_occupancy >= self.watch_occupancy_threshold {
            AlertLevel::Watch
        } else {
            AlertLevel::Normal
        };
        let risk = if overload_flag {
            AlertLevel::Watch
        } else {
            AlertLevel::Normal
        };
        let oxygen = match oxygen_weeks {
            0..=3 => AlertLevel::Critical,
            4..=6 => AlertLevel::Watch,
            _ => AlertLevel::Normal,
        };

        occupancy.max(risk).max(oxygen)
    }
}
