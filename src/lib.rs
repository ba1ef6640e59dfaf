//! # ICU Watch
//!
//! `icu_watch_workspace` bundles the ICU forecasting pipeline and its numeric
//! building blocks behind one dependency.
//!
//! ## Example
//!
//! ```
//! use icu_watch_workspace::prelude::*;
//!
//! let config = PipelineConfig::with_critical_occupancy_threshold(0.9);
//! assert_eq!(config.forecast_horizon, 4);
//! assert_eq!(ProbabilityThreshold::default().value(), 0.35);
//! ```

pub use capacity_math;
pub use icu_forecast;

/// The types most callers need to train and run the pipeline.
pub mod prelude {
    pub use icu_forecast::pipeline::{Pipeline, RunSummary, TrainedPipeline};
    pub use icu_forecast::{
        AlertComposer, AlertLevel, AlertReason, AlertRecord, DataLoader, FeatureBuilder,
        ForecastEngine, ForecastRecord, HospitalGroupSplitter, HospitalSeries, MemoryStore, Panel,
        PipelineConfig, PipelineError, ProbabilityThreshold, RecordSink, RiskClassifier,
        RiskRecord, WeeklyObservation,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_exposes_config() {
        let config = PipelineConfig::default();
        assert!(config.critical_occupancy_threshold.is_none());
        assert!(matches!(
            config.critical_threshold(),
            Err(PipelineError::MissingConfiguration(_))
        ));
    }

    #[test]
    fn test_math_crate_is_reexported() {
        assert_eq!(crate::capacity_math::scalar::clamp01(1.5), 1.0);
    }
}
