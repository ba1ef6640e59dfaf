//! Oxygen-supply strain proxy
//!
//! No oxygen inventory or consumption data is consumed anywhere in this
//! crate. The proxy is an approximation built from ICU utilisation and the
//! stress trend, and every output carrying it says so.

use capacity_math::scalar::clamp01;
use serde::{Deserialize, Serialize};

/// Metadata attached to every pipeline run that publishes the proxy
pub const OXYGEN_PROXY_NOTE: &str =
    "oxygen_risk_proxy is an approximation derived from ICU utilisation, \
     stress delta and stress volatility; no oxygen-supply data is used";

/// Weeks simulated before the runway is reported as "at least a year"
pub const MAX_RUNWAY_WEEKS: u32 = 52;

/// Weighted, clamped combination of utilisation, rising stress and volatility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OxygenRiskProxy {
    pub utilization_weight: f64,
    pub stress_delta_weight: f64,
    pub volatility_weight: f64,
    /// Stress points per week that saturate the delta component
    pub stress_delta_scale: f64,
    /// Stress standard deviation that saturates the volatility component
    pub volatility_scale: f64,
}

impl Default for OxygenRiskProxy {
    fn default() -> Self {
        Self {
            utilization_weight: 0.6,
            stress_delta_weight: 0.2,
            volatility_weight: 0.2,
            stress_delta_scale: 10.0,
            volatility_scale: 15.0,
        }
    }
}

impl OxygenRiskProxy {
    /// Proxy value in [0, 1]; non-decreasing in every argument.
    ///
    /// Only a positive stress delta contributes. Non-finite inputs count as 0.
    pub fn estimate(&self, icu_utilization: f64, stress_delta: f64, stress_volatility: f64) -> f64 {
        let utilization = clamp01(icu_utilization);
        let rising = clamp01(stress_delta.max(0.0) / self.stress_delta_scale);
        let volatility = clamp01(stress_volatility.max(0.0) / self.volatility_scale);

        clamp01(
            self.utilization_weight * utilization
                + self.stress_delta_weight * rising
                + self.volatility_weight * volatility,
        )
    }
}

/// Proxy with the default weights
pub fn oxygen_risk_proxy(icu_utilization: f64, stress_delta: f64, stress_volatility: f64) -> f64 {
    OxygenRiskProxy::default().estimate(icu_utilization, stress_delta, stress_volatility)
}

/// Simple supply runway: how many weeks a fixed stock lasts at a burn rate
/// proportional to occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OxygenRunway {
    /// Stock at the start of the simulation, in burn units
    pub initial_supply: f64,
    /// Burn per week at 100% occupancy
    pub burn_scale: f64,
}

impl Default for OxygenRunway {
    fn default() -> Self {
        Self {
            initial_supply: 40.0,
            burn_scale: 15.0,
        }
    }
}

impl OxygenRunway {
    /// Weeks of supply left at the given occupancy, capped at a year
    pub fn weeks_of_supply(&self, occupancy: f64) -> u32 {
        let occupancy = if occupancy.is_finite() {
            occupancy.clamp(0.0, 1.5)
        } else {
            0.0
        };
        let burn = occupancy * self.burn_scale;
        if burn <= 0.0 {
            return MAX_RUNWAY_WEEKS;
        }

        let weeks = (self.initial_supply / burn).ceil();
        if weeks >= MAX_RUNWAY_WEEKS as f64 {
            MAX_RUNWAY_WEEKS
        } else {
            weeks.max(0.0) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_is_bounded() {
        assert_eq!(oxygen_risk_proxy(0.0, -5.0, 0.0), 0.0);
        assert_eq!(oxygen_risk_proxy(1.4, 50.0, 80.0), 1.0);
    }

    #[test]
    fn runway_matches_weekly_burn() {
        let runway = OxygenRunway::default();
        // 0.9 * 15 = 13.5 per week -> 40 lasts 3 weeks
        assert_eq!(runway.weeks_of_supply(0.9), 3);
        // 0.5 * 15 = 7.5 per week -> 40 lasts 6 weeks
        assert_eq!(runway.weeks_of_supply(0.5), 6);
        assert_eq!(runway.weeks_of_supply(0.0), MAX_RUNWAY_WEEKS);
        assert_eq!(runway.weeks_of_supply(0.01), MAX_RUNWAY_WEEKS);
    }
}
