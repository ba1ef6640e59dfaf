//! Reproducible synthetic hospital panels
//!
//! Used by tests and demos in place of the real weekly feed. Occupancy
//! follows a mean-reverting AR(1) process around a per-hospital baseline
//! with a seasonal surge; stress is derived from occupancy.

use crate::data::{derive_stress_scores, HospitalSeries, Panel, WeeklyObservation};
use crate::error::{PipelineError, Result};
use crate::features::stress::composite_stress_score;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Uniform};
use std::f64::consts::PI;

/// Builder for a seeded synthetic panel
#[derive(Debug, Clone)]
pub struct SyntheticPanel {
    hospitals: usize,
    weeks: usize,
    start: NaiveDate,
    seed: u64,
    /// AR(1) coefficient towards the baseline
    persistence: f64,
    noise_std: f64,
    /// Peak of the seasonal surge in occupancy points
    surge_amplitude: f64,
}

impl SyntheticPanel {
    pub fn new(hospitals: usize, weeks: usize) -> Self {
        Self {
            hospitals,
            weeks,
            start: NaiveDate::from_ymd_opt(2021, 1, 4).unwrap_or_default(),
            seed: 42,
            persistence: 0.7,
            noise_std: 0.03,
            surge_amplitude: 0.12,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_start(mut self, start: NaiveDate) -> Self {
        self.start = start;
        self
    }

    pub fn with_noise(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std;
        self
    }

    pub fn generate(&self) -> Result<Panel> {
        if self.hospitals == 0 || self.weeks == 0 {
            return Err(PipelineError::InvalidParameter(
                "Synthetic panel needs at least one hospital and one week".to_string(),
            ));
        }
        let noise = Normal::new(0.0, self.noise_std)
            .map_err(|e| PipelineError::InvalidParameter(format!("Invalid noise level: {}", e)))?;
        let baseline = Uniform::new(0.45, 0.85);
        let phase = Uniform::new(0.0, 2.0 * PI);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut all = Vec::with_capacity(self.hospitals);
        for h in 0..self.hospitals {
            let hospital_id = format!("H{:03}", h + 1);
            let base = baseline.sample(&mut rng);
            let offset = phase.sample(&mut rng);

            let mut icu = base;
            let mut observations = Vec::with_capacity(self.weeks);
            for w in 0..self.weeks {
                let season = self.surge_amplitude * (2.0 * PI * w as f64 / 26.0 + offset).sin();
                let reverted = self.persistence * (icu - base - season);
                icu = base + season + reverted + noise.sample(&mut rng);
                icu = icu.clamp(0.05, 1.1);
                let inpatient = (0.2 + 0.7 * icu + noise.sample(&mut rng)).clamp(0.0, 1.0);
                let covid = (0.15 * icu + 0.5 * noise.sample(&mut rng)).clamp(0.0, 1.0);

                observations.push(WeeklyObservation::new(
                    hospital_id.clone(),
                    self.start + Duration::weeks(w as i64),
                    icu,
                    inpatient,
                    covid,
                    0.0,
                ));
            }
            derive_stress_scores(&mut observations);
            all.push(HospitalSeries::new(hospital_id, observations)?);
        }

        Panel::from_series(all)
    }
}

/// Append one simulated week to every hospital.
///
/// Each rate moves by a multiplicative shock drawn from [-5%, +8%], so the
/// simulation drifts upwards on average.
pub fn simulate_next_week(panel: &Panel, step: Duration, seed: u64) -> Result<Panel> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut next = panel.clone();

    for series in panel.iter() {
        let Some(last) = series.last() else {
            continue;
        };
        let mut shock = |value: f64| (value * (1.0 + rng.gen_range(-0.05..0.08))).clamp(0.0, 1.2);
        let icu = shock(last.icu_occupancy_rate);
        let inpatient = shock(last.inpatient_occupancy_rate).min(1.0);
        let covid = shock(last.covid_icu_rate).min(1.0);
        let stress = composite_stress_score(icu, inpatient, covid, icu - last.icu_occupancy_rate);

        let observation = WeeklyObservation::new(
            series.hospital_id(),
            last.week + step,
            icu,
            inpatient,
            covid,
            stress,
        );
        if let Some(target) = next.get_mut(series.hospital_id()) {
            target.push(observation)?;
        }
    }

    Ok(next)
}
