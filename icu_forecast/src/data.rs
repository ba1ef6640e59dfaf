//! Weekly hospital observations and their loaders

use crate::error::{PipelineError, Result};
use crate::features::stress::composite_stress_score;
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;
use tracing::warn;

/// One hospital's metrics for one collection week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyObservation {
    pub hospital_id: String,
    /// Start of the collection week
    pub week: NaiveDate,
    pub icu_occupancy_rate: f64,
    pub inpatient_occupancy_rate: f64,
    pub covid_icu_rate: f64,
    /// Composite operational strain, 0..=100
    pub stress_score: f64,
}

impl WeeklyObservation {
    pub fn new(
        hospital_id: impl Into<String>,
        week: NaiveDate,
        icu_occupancy_rate: f64,
        inpatient_occupancy_rate: f64,
        covid_icu_rate: f64,
        stress_score: f64,
    ) -> Self {
        Self {
            hospital_id: hospital_id.into(),
            week,
            icu_occupancy_rate,
            inpatient_occupancy_rate,
            covid_icu_rate,
            stress_score,
        }
    }
}

/// Chronologically ordered observations for a single hospital
#[derive(Debug, Clone, PartialEq)]
pub struct HospitalSeries {
    hospital_id: String,
    observations: Vec<WeeklyObservation>,
}

impl HospitalSeries {
    /// Validate and wrap one hospital's observations.
    ///
    /// Weeks must be strictly increasing. Gaps are allowed here; the feature
    /// builder decides which windows they invalidate.
    pub fn new(
        hospital_id: impl Into<String>,
        observations: Vec<WeeklyObservation>,
    ) -> Result<Self> {
        let hospital_id = hospital_id.into();
        if observations.is_empty() {
            return Err(PipelineError::DataError(format!(
                "Hospital {} has no observations",
                hospital_id
            )));
        }

        for obs in &observations {
            if obs.hospital_id != hospital_id {
                return Err(PipelineError::DataError(format!(
                    "Observation for {} found in series of {}",
                    obs.hospital_id, hospital_id
                )));
            }
            if !obs.icu_occupancy_rate.is_finite() || !obs.stress_score.is_finite() {
                return Err(PipelineError::DataError(format!(
                    "Non-finite occupancy or stress for hospital {} at {}",
                    hospital_id, obs.week
                )));
            }
        }

        if let Some(pair) = observations.windows(2).find(|w| w[1].week <= w[0].week) {
            return Err(PipelineError::DataError(format!(
                "Weeks for hospital {} are not strictly increasing ({} then {})",
                hospital_id, pair[0].week, pair[1].week
            )));
        }

        Ok(Self {
            hospital_id,
            observations,
        })
    }

    pub fn hospital_id(&self) -> &str {
        &self.hospital_id
    }

    pub fn observations(&self) -> &[WeeklyObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Most recent observation
    pub fn last(&self) -> Option<&WeeklyObservation> {
        self.observations.last()
    }

    pub fn weeks(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.week).collect()
    }

    pub fn icu_values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.icu_occupancy_rate).collect()
    }

    pub fn stress_values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.stress_score).collect()
    }

    /// Whether observation `index` directly follows `index - 1` at the given step
    pub fn follows_contiguously(&self, index: usize, step: Duration) -> bool {
        index > 0
            && index < self.observations.len()
            && self.observations[index].week - self.observations[index - 1].week == step
    }

    /// Keep only the `max_weeks` most recent observations
    pub fn truncate_to_recent(&mut self, max_weeks: usize) {
        if self.observations.len() > max_weeks {
            let excess = self.observations.len() - max_weeks;
            self.observations.drain(..excess);
        }
    }

    /// Append one observation after the current last week
    pub fn push(&mut self, observation: WeeklyObservation) -> Result<()> {
        if observation.hospital_id != self.hospital_id {
            return Err(PipelineError::DataError(format!(
                "Observation for {} pushed onto series of {}",
                observation.hospital_id, self.hospital_id
            )));
        }
        if let Some(last) = self.observations.last() {
            if observation.week <= last.week {
                return Err(PipelineError::DataError(format!(
                    "Week {} does not follow {} for hospital {}",
                    observation.week, last.week, self.hospital_id
                )));
            }
        }
        self.observations.push(observation);
        Ok(())
    }
}

/// All hospitals of one batch run, keyed by hospital id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    series: BTreeMap<String, HospitalSeries>,
}

impl Panel {
    /// Group, sort and validate a flat list of observations
    pub fn from_observations(observations: Vec<WeeklyObservation>) -> Result<Self> {
        let mut series = BTreeMap::new();
        for (hospital_id, rows) in group_by_hospital(observations) {
            let validated = HospitalSeries::new(hospital_id.clone(), rows)?;
            series.insert(hospital_id, validated);
        }

        Ok(Self { series })
    }

    /// Like [`Panel::from_observations`], but a hospital that fails
    /// validation (a duplicated week, for example) is set aside instead of
    /// failing the whole panel.
    pub fn from_observations_lenient(
        observations: Vec<WeeklyObservation>,
    ) -> (Self, Vec<RejectedHospital>) {
        let mut series = BTreeMap::new();
        let mut rejected = Vec::new();
        for (hospital_id, rows) in group_by_hospital(observations) {
            match HospitalSeries::new(hospital_id.clone(), rows) {
                Ok(validated) => {
                    series.insert(hospital_id, validated);
                }
                Err(e) => rejected.push(RejectedHospital {
                    hospital_id,
                    reason: e.to_string(),
                }),
            }
        }

        (Self { series }, rejected)
    }

    pub fn from_series(all: Vec<HospitalSeries>) -> Result<Self> {
        let mut series = BTreeMap::new();
        for s in all {
            let id = s.hospital_id().to_string();
            if series.insert(id.clone(), s).is_some() {
                return Err(PipelineError::DataError(format!(
                    "Hospital {} appears twice in panel",
                    id
                )));
            }
        }
        Ok(Self { series })
    }

    pub fn hospital_ids(&self) -> BTreeSet<String> {
        self.series.keys().cloned().collect()
    }

    pub fn get(&self, hospital_id: &str) -> Option<&HospitalSeries> {
        self.series.get(hospital_id)
    }

    pub fn get_mut(&mut self, hospital_id: &str) -> Option<&mut HospitalSeries> {
        self.series.get_mut(hospital_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HospitalSeries> {
        self.series.values()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Total number of observations across hospitals
    pub fn observation_count(&self) -> usize {
        self.series.values().map(HospitalSeries::len).sum()
    }

    /// Panel restricted to the given hospitals; whole series move together
    pub fn subset(&self, hospital_ids: &BTreeSet<String>) -> Self {
        let series = self
            .series
            .iter()
            .filter(|(id, _)| hospital_ids.contains(*id))
            .map(|(id, s)| (id.clone(), s.clone()))
            .collect();
        Self { series }
    }

    /// Keep only the most recent `max_weeks` observations of every hospital
    pub fn truncate_history(&mut self, max_weeks: usize) {
        for series in self.series.values_mut() {
            series.truncate_to_recent(max_weeks);
        }
    }

    /// Flatten back into observations, ordered by hospital then week
    pub fn to_observations(&self) -> Vec<WeeklyObservation> {
        self.series
            .values()
            .flat_map(|s| s.observations().iter().cloned())
            .collect()
    }
}

/// A hospital left out of a panel, with the validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedHospital {
    pub hospital_id: String,
    pub reason: String,
}

fn group_by_hospital(
    observations: Vec<WeeklyObservation>,
) -> BTreeMap<String, Vec<WeeklyObservation>> {
    let mut grouped: BTreeMap<String, Vec<WeeklyObservation>> = BTreeMap::new();
    for obs in observations {
        grouped.entry(obs.hospital_id.clone()).or_default().push(obs);
    }
    for rows in grouped.values_mut() {
        rows.sort_by_key(|o| o.week);
    }
    grouped
}

/// Data loader for weekly hospital data
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    pub const HOSPITAL_COLUMN: &'static str = "hospital_id";
    pub const WEEK_COLUMN: &'static str = "week";
    pub const ICU_COLUMN: &'static str = "icu_occupancy_rate";
    pub const INPATIENT_COLUMN: &'static str = "inpatient_occupancy_rate";
    pub const COVID_COLUMN: &'static str = "covid_icu_rate";
    pub const STRESS_COLUMN: &'static str = "stress_score";

    /// Load a panel from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Panel> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df)
    }

    /// Build a panel from an existing DataFrame.
    ///
    /// Rows missing hospital, week or ICU occupancy, with an unparseable
    /// week, or with negative occupancy, are dropped. Missing inpatient/COVID
    /// rates become 0. A hospital whose remaining rows do not form a valid
    /// series (repeated weeks) is left out with a warning. When the frame has
    /// no stress column the composite stress score is derived.
    pub fn from_dataframe(df: DataFrame) -> Result<Panel> {
        let hospitals = Self::string_column(&df, Self::HOSPITAL_COLUMN)?;
        let weeks = Self::string_column(&df, Self::WEEK_COLUMN)?;
        let icu = Self::float_column(&df, Self::ICU_COLUMN)?;
        let inpatient = Self::optional_float_column(&df, Self::INPATIENT_COLUMN)?;
        let covid = Self::optional_float_column(&df, Self::COVID_COLUMN)?;
        let stress = Self::optional_float_column(&df, Self::STRESS_COLUMN)?;
        let derive_stress = stress.is_none();

        let mut observations = Vec::with_capacity(df.height());
        let mut bad_weeks = 0usize;
        for row in 0..df.height() {
            let (Some(hospital_id), Some(week_raw), Some(icu_rate)) =
                (&hospitals[row], &weeks[row], icu[row])
            else {
                continue;
            };
            if !icu_rate.is_finite() || icu_rate < 0.0 {
                continue;
            }

            let week = match Self::parse_week(week_raw) {
                Ok(week) => week,
                Err(_) => {
                    bad_weeks += 1;
                    continue;
                }
            };
            let inpatient_rate = value_or_zero(&inpatient, row);
            let covid_rate = value_or_zero(&covid, row);
            let stress_score = stress
                .as_ref()
                .and_then(|col| col[row])
                .filter(|v| v.is_finite())
                .unwrap_or(0.0);

            observations.push(WeeklyObservation {
                hospital_id: hospital_id.clone(),
                week,
                icu_occupancy_rate: icu_rate,
                inpatient_occupancy_rate: inpatient_rate,
                covid_icu_rate: covid_rate,
                stress_score,
            });
        }

        if bad_weeks > 0 {
            warn!(rows = bad_weeks, "dropped rows with an unparseable week");
        }

        let (mut panel, rejected) = Panel::from_observations_lenient(observations);
        for r in &rejected {
            warn!(hospital = %r.hospital_id, reason = %r.reason, "hospital excluded from panel");
        }
        if panel.is_empty() {
            return Err(PipelineError::DataError(
                "No usable observations in data".to_string(),
            ));
        }

        if derive_stress {
            for series in panel.series.values_mut() {
                derive_stress_scores(&mut series.observations);
            }
        }
        Ok(panel)
    }

    fn parse_week(raw: &str) -> Result<NaiveDate> {
        let date_part = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
            PipelineError::DataError(format!("Cannot parse week '{}': {}", raw, e))
        })
    }

    fn has_column(df: &DataFrame, name: &str) -> bool {
        df.get_column_names().iter().any(|c| *c == name)
    }

    fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
        let column = df.column(name).map_err(|e| {
            PipelineError::DataError(format!("Column '{}' not found: {}", name, e))
        })?;
        let cast = column.cast(&DataType::Utf8)?;
        let values = cast
            .utf8()?
            .into_iter()
            .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
            .collect();
        Ok(values)
    }

    fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
        let column = df.column(name).map_err(|e| {
            PipelineError::DataError(format!("Column '{}' not found: {}", name, e))
        })?;
        let cast = column.cast(&DataType::Float64)?;
        let values = cast.f64()?.into_iter().collect();
        Ok(values)
    }

    fn optional_float_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
        if Self::has_column(df, name) {
            Self::float_column(df, name).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn value_or_zero(column: &Option<Vec<Option<f64>>>, row: usize) -> f64 {
    column
        .as_ref()
        .and_then(|col| col[row])
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Fill `stress_score` from occupancy for sources that do not report it
pub fn derive_stress_scores(observations: &mut [WeeklyObservation]) {
    let mut previous_icu: Option<f64> = None;
    for obs in observations.iter_mut() {
        let icu_delta = previous_icu.map_or(0.0, |prev| obs.icu_occupancy_rate - prev);
        obs.stress_score = composite_stress_score(
            obs.icu_occupancy_rate,
            obs.inpatient_occupancy_rate,
            obs.covid_icu_rate,
            icu_delta,
        );
        previous_icu = Some(obs.icu_occupancy_rate);
    }
}
