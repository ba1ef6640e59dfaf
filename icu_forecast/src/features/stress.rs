//! Composite stress score for sources that only report occupancy

use capacity_math::scalar::clamp01;

/// Largest week-over-week ICU change that still counts towards stress
const MAX_ICU_DELTA: f64 = 0.3;
/// ICU rise per week that saturates the trend component
const SATURATING_ICU_DELTA: f64 = 0.10;

/// Blend of ICU, inpatient and COVID ICU load in [0, 1]
pub fn bed_load(icu_rate: f64, inpatient_rate: f64, covid_icu_rate: f64) -> f64 {
    clamp01(0.6 * clamp01(icu_rate) + 0.2 * clamp01(inpatient_rate) + 0.2 * clamp01(covid_icu_rate))
}

/// Weekly stress score on a 0..=100 scale.
///
/// Half of the score is ICU utilisation, 30% the combined bed load and 20%
/// the week-over-week ICU trend (saturating at +10 points of occupancy).
pub fn composite_stress_score(
    icu_rate: f64,
    inpatient_rate: f64,
    covid_icu_rate: f64,
    icu_delta: f64,
) -> f64 {
    let icu_util = clamp01(icu_rate);
    let load = bed_load(icu_rate, inpatient_rate, covid_icu_rate);
    let delta = if icu_delta.is_finite() {
        icu_delta.clamp(-MAX_ICU_DELTA, MAX_ICU_DELTA)
    } else {
        0.0
    };

    0.5 * icu_util * 100.0
        + 0.3 * load * 100.0
        + 0.2 * clamp01(delta / SATURATING_ICU_DELTA) * 100.0
}
