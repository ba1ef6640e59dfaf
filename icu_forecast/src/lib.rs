//! # ICU Forecast
//!
//! A Rust library for forecasting hospital ICU occupancy and flagging
//! impending overload from weekly per-hospital series.
//!
//! ## Features
//!
//! - Weekly hospital data handling (CSV via polars, or in-memory observations)
//! - Lag, rolling and stress features with an explicit oxygen-strain proxy
//! - Hospital-level holdout and k-fold splitting
//! - Recursive multi-week occupancy forecasting (ridge regression)
//! - Overload risk classification with a recall-biased decision threshold
//! - Alert composition with severity grading and idempotent record sinks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use icu_forecast::pipeline::Pipeline;
//! use icu_forecast::store::MemoryStore;
//! use icu_forecast::synthetic::SyntheticPanel;
//! use icu_forecast::PipelineConfig;
//!
//! # fn main() -> icu_forecast::Result<()> {
//! // Load data (or icu_forecast::DataLoader::from_csv("weekly.csv")?)
//! let panel = SyntheticPanel::new(12, 60).generate()?;
//!
//! // The critical threshold has no default
//! let config = PipelineConfig::with_critical_occupancy_threshold(0.9);
//!
//! // Train both models with a hospital-level holdout
//! let pipeline = Pipeline::train(config, &panel)?;
//!
//! // Forecast, score and alert every hospital
//! let mut store = MemoryStore::new();
//! let summary = pipeline.run(&panel, &mut store)?;
//! println!("{} hospitals alerted", store.alerts().filter(|a| a.triggered).count());
//! println!("{}", summary.metadata.oxygen_proxy_note);
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod forecast;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod risk;
pub mod split;
pub mod store;
pub mod synthetic;

// Re-export commonly used types
pub use crate::alert::{AlertComposer, AlertLevel, AlertReason, AlertRecord};
pub use crate::config::{ClassWeighting, ForwardFillPolicy, Granularity, PipelineConfig};
pub use crate::data::{DataLoader, HospitalSeries, Panel, RejectedHospital, WeeklyObservation};
pub use crate::error::{PipelineError, Result};
pub use crate::features::{FeatureBuilder, FeatureVector, OxygenRiskProxy};
pub use crate::forecast::{ForecastEngine, ForecastRecord};
pub use crate::risk::{ProbabilityThreshold, RiskClassifier, RiskRecord};
pub use crate::split::{GroupSplit, HospitalGroupSplitter};
pub use crate::store::{MemoryStore, RecordSink};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
