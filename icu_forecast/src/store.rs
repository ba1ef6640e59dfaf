//! Output sinks for forecast, risk and alert records
//!
//! Writes are idempotent upserts: a record replaces any earlier record with
//! the same key.

use crate::alert::AlertRecord;
use crate::error::Result;
use crate::forecast::ForecastRecord;
use crate::risk::RiskRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Destination of pipeline output
pub trait RecordSink {
    /// Keyed by `(hospital_id, base_week, horizon)`
    fn upsert_forecasts(&mut self, records: &[ForecastRecord]) -> Result<()>;

    /// Keyed by `(hospital_id, week)`
    fn upsert_risks(&mut self, records: &[RiskRecord]) -> Result<()>;

    /// Keyed by `(hospital_id, week)`
    fn upsert_alerts(&mut self, records: &[AlertRecord]) -> Result<()>;
}

type WeekKey = (String, NaiveDate);

/// In-memory sink, ordered by key
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    forecasts: BTreeMap<(String, NaiveDate, u8), ForecastRecord>,
    risks: BTreeMap<WeekKey, RiskRecord>,
    alerts: BTreeMap<WeekKey, AlertRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forecasts(&self) -> impl Iterator<Item = &ForecastRecord> {
        self.forecasts.values()
    }

    pub fn risks(&self) -> impl Iterator<Item = &RiskRecord> {
        self.risks.values()
    }

    pub fn alerts(&self) -> impl Iterator<Item = &AlertRecord> {
        self.alerts.values()
    }

    pub fn forecast_count(&self) -> usize {
        self.forecasts.len()
    }

    pub fn risk_count(&self) -> usize {
        self.risks.len()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    pub fn alert(&self, hospital_id: &str, week: NaiveDate) -> Option<&AlertRecord> {
        self.alerts.get(&(hospital_id.to_string(), week))
    }

    pub fn risk(&self, hospital_id: &str, week: NaiveDate) -> Option<&RiskRecord> {
        self.risks.get(&(hospital_id.to_string(), week))
    }

    /// Forecasts of one hospital and base week, ordered by horizon
    pub fn forecasts_for(&self, hospital_id: &str, base_week: NaiveDate) -> Vec<&ForecastRecord> {
        let first = (hospital_id.to_string(), base_week, 0);
        let last = (hospital_id.to_string(), base_week, u8::MAX);
        self.forecasts
            .range(first..=last)
            .map(|(_, r)| r)
            .collect()
    }

    /// Write `forecasts.csv`, `risk.csv` and `alerts.csv` into `dir`
    pub fn export_csv<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        write_csv(&dir.join("forecasts.csv"), self.forecasts.values())?;
        write_csv(&dir.join("risk.csv"), self.risks.values())?;
        write_csv(&dir.join("alerts.csv"), self.alerts.values().map(AlertRow::from))?;
        Ok(())
    }
}

impl RecordSink for MemoryStore {
    fn upsert_forecasts(&mut self, records: &[ForecastRecord]) -> Result<()> {
        for r in records {
            self.forecasts
                .insert((r.hospital_id.clone(), r.base_week, r.horizon), r.clone());
        }
        Ok(())
    }

    fn upsert_risks(&mut self, records: &[RiskRecord]) -> Result<()> {
        for r in records {
            self.risks.insert((r.hospital_id.clone(), r.week), r.clone());
        }
        Ok(())
    }

    fn upsert_alerts(&mut self, records: &[AlertRecord]) -> Result<()> {
        for r in records {
            self.alerts.insert((r.hospital_id.clone(), r.week), r.clone());
        }
        Ok(())
    }
}

/// Flat alert row; the csv writer cannot serialise `Option` enums directly
#[derive(Serialize)]
struct AlertRow<'a> {
    hospital_id: &'a str,
    week: NaiveDate,
    triggered: bool,
    reason: &'static str,
    peak_forecast_occupancy: f64,
    severity: &'static str,
    oxygen_weeks_remaining: u32,
    generated_at: String,
}

impl<'a> From<&'a AlertRecord> for AlertRow<'a> {
    fn from(r: &'a AlertRecord) -> Self {
        use crate::alert::{AlertLevel, AlertReason};
        Self {
            hospital_id: &r.hospital_id,
            week: r.week,
            triggered: r.triggered,
            reason: match r.reason {
                Some(AlertReason::Forecast) => "forecast",
                Some(AlertReason::Risk) => "risk",
                Some(AlertReason::Both) => "both",
                None => "none",
            },
            peak_forecast_occupancy: r.peak_forecast_occupancy,
            severity: match r.severity {
                AlertLevel::Normal => "normal",
                AlertLevel::Watch => "watch",
                AlertLevel::Critical => "critical",
            },
            oxygen_weeks_remaining: r.oxygen_weeks_remaining,
            generated_at: r.generated_at.to_rfc3339(),
        }
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: impl Iterator<Item = T>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
