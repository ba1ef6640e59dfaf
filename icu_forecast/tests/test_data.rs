use approx::assert_relative_eq;
use chrono::NaiveDate;
use icu_forecast::data::{DataLoader, HospitalSeries, Panel, WeeklyObservation};
use icu_forecast::features::stress::composite_stress_score;
use icu_forecast::PipelineError;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str =
    "hospital_id,week,icu_occupancy_rate,inpatient_occupancy_rate,covid_icu_rate,stress_score";
const HEADER_WITHOUT_STRESS: &str =
    "hospital_id,week,icu_occupancy_rate,inpatient_occupancy_rate,covid_icu_rate";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_data_loader_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    writeln!(file, "B,2023-01-09,0.70,0.65,0.10,61.0").unwrap();
    writeln!(file, "A,2023-01-02,0.50,0.60,0.05,45.0").unwrap();
    writeln!(file, "A,2023-01-09,0.55,0.61,0.06,48.0").unwrap();
    writeln!(file, "B,2023-01-02,0.68,0.64,0.09,59.5").unwrap();

    let panel = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(panel.len(), 2);
    assert_eq!(panel.observation_count(), 4);
    let b = panel.get("B").unwrap();
    assert_eq!(b.weeks(), vec![date(2023, 1, 2), date(2023, 1, 9)]);
    assert_eq!(b.stress_values(), vec![59.5, 61.0]);
}

#[test]
fn test_data_loader_drops_unusable_rows_and_fills_rates() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    writeln!(file, "A,2023-01-02,0.50,,0.05,45.0").unwrap();
    writeln!(file, "A,2023-01-09,,0.61,0.06,48.0").unwrap();
    writeln!(file, "A,2023-01-16,-0.20,0.61,0.06,48.0").unwrap();
    writeln!(file, "A,2023-01-23,0.58,0.62,0.07,50.0").unwrap();

    let panel = DataLoader::from_csv(file.path()).unwrap();
    let series = panel.get("A").unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series.observations()[0].inpatient_occupancy_rate, 0.0);
}

#[test]
fn test_data_loader_derives_missing_stress() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER_WITHOUT_STRESS).unwrap();
    writeln!(file, "A,2023-01-02,0.50,0.60,0.05").unwrap();
    writeln!(file, "A,2023-01-09,0.58,0.62,0.07").unwrap();

    let panel = DataLoader::from_csv(file.path()).unwrap();
    let stress = panel.get("A").unwrap().stress_values();

    assert_relative_eq!(stress[0], composite_stress_score(0.50, 0.60, 0.05, 0.0), epsilon = 1e-9);
    assert_relative_eq!(stress[1], composite_stress_score(0.58, 0.62, 0.07, 0.08), epsilon = 1e-9);
}

#[test]
fn test_data_loader_error_handling() {
    assert!(DataLoader::from_csv("nonexistent_file.csv").is_err());

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "invalid,csv,format").unwrap();
    writeln!(file, "1,2,3").unwrap();
    assert!(DataLoader::from_csv(file.path()).is_err());

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "hospital_id,week,icu_occupancy_rate").unwrap();
    writeln!(file, "A,not-a-date,0.5").unwrap();
    assert!(matches!(
        DataLoader::from_csv(file.path()),
        Err(PipelineError::DataError(_))
    ));
}

#[test]
fn test_series_validation() {
    let obs = |id: &str, d: NaiveDate| WeeklyObservation::new(id, d, 0.5, 0.5, 0.1, 40.0);

    assert!(HospitalSeries::new("A", vec![]).is_err());
    assert!(HospitalSeries::new("A", vec![obs("B", date(2023, 1, 2))]).is_err());
    let backwards = vec![obs("A", date(2023, 1, 9)), obs("A", date(2023, 1, 2))];
    assert!(HospitalSeries::new("A", backwards).is_err());
    let repeated = vec![obs("A", date(2023, 1, 2)), obs("A", date(2023, 1, 2))];
    assert!(HospitalSeries::new("A", repeated).is_err());

    let mut nan = obs("A", date(2023, 1, 2));
    nan.icu_occupancy_rate = f64::NAN;
    assert!(HospitalSeries::new("A", vec![nan]).is_err());

    // Gaps are accepted here and handled by the feature builder
    let gapped = vec![obs("A", date(2023, 1, 2)), obs("A", date(2023, 1, 23))];
    assert!(HospitalSeries::new("A", gapped).is_ok());
}

#[test]
fn test_panel_sorts_and_truncates() {
    let observations: Vec<WeeklyObservation> = (0..10)
        .rev()
        .map(|i| {
            let week = date(2023, 1, 2) + chrono::Duration::weeks(i);
            WeeklyObservation::new("A", week, 0.5, 0.5, 0.1, i as f64)
        })
        .collect();
    let mut panel = Panel::from_observations(observations).unwrap();
    assert_eq!(panel.get("A").unwrap().stress_values()[0], 0.0);

    panel.truncate_history(3);
    let series = panel.get("A").unwrap();
    assert_eq!(series.stress_values(), vec![7.0, 8.0, 9.0]);
}

#[test]
fn test_panel_rejects_duplicate_hospitals() {
    let obs = WeeklyObservation::new("A", date(2023, 1, 2), 0.5, 0.5, 0.1, 40.0);
    let a = HospitalSeries::new("A", vec![obs.clone()]).unwrap();
    assert!(Panel::from_series(vec![a.clone(), a]).is_err());
}

#[test]
fn test_data_loader_skips_unparseable_weeks() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    writeln!(file, "A,2023-01-02,0.50,0.60,0.05,45.0").unwrap();
    writeln!(file, "A,2023-01-09,0.55,0.61,0.06,48.0").unwrap();
    writeln!(file, "B,2023-01-02,0.68,0.64,0.09,59.5").unwrap();
    writeln!(file, "B,01/09/2023,0.70,0.65,0.10,61.0").unwrap();

    let panel = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(panel.len(), 2);
    assert_eq!(panel.get("A").unwrap().len(), 2);
    assert_eq!(panel.get("B").unwrap().weeks(), vec![date(2023, 1, 2)]);
}

#[test]
fn test_data_loader_excludes_hospital_with_repeated_week() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    writeln!(file, "A,2023-01-02,0.50,0.60,0.05,45.0").unwrap();
    writeln!(file, "A,2023-01-09,0.55,0.61,0.06,48.0").unwrap();
    writeln!(file, "B,2023-01-02,0.68,0.64,0.09,59.5").unwrap();
    writeln!(file, "B,2023-01-02,0.70,0.65,0.10,61.0").unwrap();

    let panel = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(panel.len(), 1);
    assert!(panel.get("B").is_none());
    assert_eq!(panel.get("A").unwrap().len(), 2);
}

#[test]
fn test_lenient_panel_reports_rejected_hospitals() {
    let obs = |id: &str, d: NaiveDate| WeeklyObservation::new(id, d, 0.5, 0.5, 0.1, 40.0);
    let observations = vec![
        obs("A", date(2023, 1, 2)),
        obs("B", date(2023, 1, 2)),
        obs("B", date(2023, 1, 2)),
    ];

    assert!(Panel::from_observations(observations.clone()).is_err());

    let (panel, rejected) = Panel::from_observations_lenient(observations);
    assert_eq!(panel.hospital_ids().into_iter().collect::<Vec<_>>(), vec!["A".to_string()]);
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].hospital_id, "B");
    assert!(rejected[0].reason.contains("not strictly increasing"));
}
