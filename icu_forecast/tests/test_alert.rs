use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use icu_forecast::alert::{AlertComposer, AlertLevel, AlertReason};
use icu_forecast::forecast::ForecastRecord;
use icu_forecast::risk::{ProbabilityThreshold, RiskRecord};
use icu_forecast::{PipelineConfig, PipelineError};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn base_week() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 6, 8, 0, 0).unwrap()
}

fn forecasts(hospital: &str, values: &[f64]) -> Vec<ForecastRecord> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| ForecastRecord {
            hospital_id: hospital.to_string(),
            base_week: base_week(),
            horizon: (i + 1) as u8,
            target_week: base_week() + Duration::weeks(i as i64 + 1),
            predicted_occupancy_rate: v,
            model_version: "ridge-test".to_string(),
            generated_at: now(),
        })
        .collect()
}

fn risk(hospital: &str, probability: f64) -> RiskRecord {
    let threshold = ProbabilityThreshold::default();
    RiskRecord {
        hospital_id: hospital.to_string(),
        week: base_week(),
        target_week: base_week() + Duration::weeks(1),
        overload_probability: probability,
        overload_flag: threshold.decide(probability),
        threshold_used: threshold.value(),
        model_version: "logistic-test".to_string(),
        generated_at: now(),
    }
}

fn composer() -> AlertComposer {
    AlertComposer::new(0.90, 0.75).unwrap()
}

#[test]
fn test_forecast_only_alert() {
    // 92% forecast against a 90% threshold with a 0.10 overload probability
    let alert = composer()
        .compose(
            "H1",
            base_week(),
            &forecasts("H1", &[0.85, 0.88, 0.92, 0.89]),
            Some(&risk("H1", 0.10)),
            now(),
        )
        .unwrap();

    assert!(alert.triggered);
    assert_eq!(alert.reason, Some(AlertReason::Forecast));
    assert_eq!(alert.peak_forecast_occupancy, 0.92);
    assert_eq!(alert.severity, AlertLevel::Critical);
}

#[rstest]
#[case(0.40, 0.10, false, None)]
#[case(0.95, 0.10, true, Some(AlertReason::Forecast))]
#[case(0.90, 0.34, true, Some(AlertReason::Forecast))]
#[case(0.40, 0.35, true, Some(AlertReason::Risk))]
#[case(0.40, 0.80, true, Some(AlertReason::Risk))]
#[case(0.95, 0.80, true, Some(AlertReason::Both))]
#[case(0.89, 0.20, false, None)]
fn test_alert_truth_table(
    #[case] peak: f64,
    #[case] probability: f64,
    #[case] triggered: bool,
    #[case] reason: Option<AlertReason>,
) {
    let forecasts = forecasts("H1", &[0.3, peak, 0.3]);
    let risk = risk("H1", probability);
    let alert = composer()
        .compose("H1", base_week(), &forecasts, Some(&risk), now())
        .unwrap();
    assert_eq!(alert.triggered, triggered);
    assert_eq!(alert.reason, reason);
}

#[rstest]
#[case(0.40, false, 52, AlertLevel::Normal)]
#[case(0.80, false, 52, AlertLevel::Watch)]
#[case(0.40, true, 52, AlertLevel::Watch)]
#[case(0.40, false, 6, AlertLevel::Watch)]
#[case(0.40, false, 3, AlertLevel::Critical)]
#[case(0.95, false, 52, AlertLevel::Critical)]
fn test_severity_is_highest_level(
    #[case] peak: f64,
    #[case] flag: bool,
    #[case] oxygen_weeks: u32,
    #[case] expected: AlertLevel,
) {
    assert_eq!(composer().severity(peak, flag, oxygen_weeks), expected);
}

#[test]
fn test_oxygen_runway_from_peak() {
    let forecasts = forecasts("H1", &[0.3, 0.4, 0.35]);
    let risk = risk("H1", 0.05);
    let alert = composer()
        .compose("H1", base_week(), &forecasts, Some(&risk), now())
        .unwrap();
    // 0.4 * 15 = 6 per week -> 40 lasts 7 weeks
    assert_eq!(alert.oxygen_weeks_remaining, 7);
    assert_eq!(alert.severity, AlertLevel::Normal);
    assert!(!alert.triggered);
}

#[test]
fn test_missing_signals_are_incomplete() {
    let err = composer()
        .compose("H1", base_week(), &forecasts("H1", &[0.5]), None, now())
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::IncompleteSignal { ref missing, .. } if missing == "risk"
    ));

    let err = composer()
        .compose("H1", base_week(), &[], Some(&risk("H1", 0.5)), now())
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::IncompleteSignal { ref missing, .. } if missing == "forecast"
    ));
}

#[test]
fn test_mismatched_signals_are_incomplete() {
    let err = composer()
        .compose("H1", base_week(), &forecasts("H2", &[0.5]), Some(&risk("H1", 0.5)), now())
        .unwrap_err();
    assert!(matches!(err, PipelineError::IncompleteSignal { .. }));

    let mut late = risk("H1", 0.5);
    late.week = base_week() + Duration::weeks(1);
    let err = composer()
        .compose("H1", base_week(), &forecasts("H1", &[0.5]), Some(&late), now())
        .unwrap_err();
    assert!(matches!(err, PipelineError::IncompleteSignal { .. }));
}

#[test]
fn test_composer_requires_critical_threshold() {
    assert!(matches!(
        AlertComposer::from_config(&PipelineConfig::default()),
        Err(PipelineError::MissingConfiguration(_))
    ));
    let config = PipelineConfig::with_critical_occupancy_threshold(0.9);
    assert!(AlertComposer::from_config(&config).is_ok());
    assert!(AlertComposer::new(0.8, 0.9).is_err());
}
