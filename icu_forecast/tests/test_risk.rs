use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use icu_forecast::config::ClassWeighting;
use icu_forecast::data::Panel;
use icu_forecast::features::FeatureBuilder;
use icu_forecast::risk::{class_weights, ProbabilityThreshold, RiskClassifier};
use icu_forecast::split::HospitalGroupSplitter;
use icu_forecast::synthetic::SyntheticPanel;
use icu_forecast::{PipelineConfig, PipelineError};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn config() -> PipelineConfig {
    PipelineConfig {
        stress_next_threshold: 60.0,
        logistic_iterations: 200,
        ..PipelineConfig::with_critical_occupancy_threshold(0.9)
    }
}

fn panel() -> Panel {
    SyntheticPanel::new(8, 40).with_seed(5).generate().unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap()
}

fn trained() -> (RiskClassifier, Panel) {
    let panel = panel();
    let mut classifier = RiskClassifier::new(&config()).unwrap();
    classifier.train(&panel, now()).unwrap();
    (classifier, panel)
}

#[rstest]
#[case(0.0, true)]
#[case(0.35, true)]
#[case(1.0, true)]
#[case(-0.01, false)]
#[case(1.01, false)]
#[case(f64::NAN, false)]
fn test_threshold_validation(#[case] value: f64, #[case] valid: bool) {
    assert_eq!(ProbabilityThreshold::new(value).is_ok(), valid);
}

#[test]
fn test_threshold_monotonicity() {
    let probabilities = [0.05, 0.2, 0.34, 0.35, 0.5, 0.9];
    let thresholds = [0.1, 0.35, 0.6];
    for pair in thresholds.windows(2) {
        let low = ProbabilityThreshold::new(pair[0]).unwrap();
        let high = ProbabilityThreshold::new(pair[1]).unwrap();
        for &p in &probabilities {
            if high.decide(p) {
                assert!(low.decide(p));
            }
        }
    }
    assert!(ProbabilityThreshold::default().decide(0.35));
    assert!(!ProbabilityThreshold::default().decide(0.3499));
}

#[test]
fn test_balanced_class_weights() {
    let (negative, positive) =
        class_weights(ClassWeighting::Balanced, &[true, false, false, false]);
    assert_relative_eq!(negative, 4.0 / 6.0, epsilon = 1e-12);
    assert_relative_eq!(positive, 2.0, epsilon = 1e-12);

    let fixed = ClassWeighting::Fixed {
        negative: 1.0,
        positive: 2.0,
    };
    assert_eq!(class_weights(fixed, &[true]), (1.0, 2.0));
    assert_eq!(class_weights(ClassWeighting::Uniform, &[true, false]), (1.0, 1.0));
    assert_eq!(class_weights(ClassWeighting::Balanced, &[false, false]), (1.0, 1.0));
    assert_eq!(class_weights(ClassWeighting::Balanced, &[true, true, true]), (1.0, 1.0));
    assert_eq!(class_weights(ClassWeighting::Balanced, &[]), (1.0, 1.0));
}

#[test]
fn test_untrained_classifier() {
    let panel = panel();
    let classifier = RiskClassifier::new(&config()).unwrap();
    assert!(matches!(
        classifier.score_latest(panel.get("H001").unwrap(), now()),
        Err(PipelineError::ModelNotTrained(_))
    ));
}

#[test]
fn test_score_latest() {
    let (classifier, panel) = trained();
    let series = panel.get("H002").unwrap();
    let record = classifier.score_latest(series, now()).unwrap();

    let last = series.last().unwrap().week;
    assert_eq!(record.week, last);
    assert_eq!(record.target_week, last + Duration::weeks(1));
    assert!((0.0..=1.0).contains(&record.overload_probability));
    assert_eq!(record.overload_flag, record.overload_probability >= 0.35);
    assert_eq!(record.threshold_used, 0.35);
    assert_eq!(record.model_version, "logistic-20240108T120000Z");
}

#[test]
fn test_threshold_override_changes_flags_only() {
    let (classifier, panel) = trained();
    let series = panel.get("H003").unwrap();
    let lenient = classifier.clone().with_threshold(ProbabilityThreshold::new(0.0).unwrap());

    let strict = classifier.score_latest(series, now()).unwrap();
    let flagged = lenient.score_latest(series, now()).unwrap();
    assert_eq!(strict.overload_probability, flagged.overload_probability);
    assert!(flagged.overload_flag);
    assert_eq!(flagged.threshold_used, 0.0);
}

#[test]
fn test_score_series_covers_eligible_weeks() {
    let (classifier, panel) = trained();
    let series = panel.get("H004").unwrap();
    let builder = FeatureBuilder::from_config(&config()).unwrap();

    let records = classifier.score_series(series, now()).unwrap();
    assert_eq!(records.len(), builder.build(series).vectors.len());
    assert!(records.windows(2).all(|w| w[0].week < w[1].week));
}

#[test]
fn test_training_is_deterministic() {
    let (a, panel) = trained();
    let (b, _) = trained();
    for series in panel.iter() {
        assert_eq!(
            a.score_latest(series, now()).unwrap(),
            b.score_latest(series, now()).unwrap()
        );
    }
}

#[test]
fn test_labels_follow_next_week_stress() {
    let panel = panel();
    let classifier = RiskClassifier::new(&config()).unwrap();
    let labelled = classifier.labelled_rows(&panel);
    assert_eq!(labelled.rows.len(), labelled.labels.len());
    // 8 hospitals with 40 contiguous weeks: weeks 4..=38 have a following week
    assert_eq!(labelled.rows.len(), 8 * 35);
}

#[test]
fn test_holdout_metrics() {
    let panel = panel();
    let split = HospitalGroupSplitter::default()
        .split(&panel.hospital_ids(), 0.25)
        .unwrap();
    let mut classifier = RiskClassifier::new(&config()).unwrap();
    let metrics = classifier.train_with_holdout(&panel, &split, now()).unwrap();

    assert!(metrics.samples > 0);
    assert!((0.0..=1.0).contains(&metrics.accuracy));
    assert!((0.0..=1.0).contains(&metrics.recall));
    if let Some(auc) = metrics.roc_auc {
        assert!((0.0..=1.0).contains(&auc));
    }
}
