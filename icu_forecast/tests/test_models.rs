use approx::assert_relative_eq;
use icu_forecast::models::{Model, RidgeRegression, Standardizer, TrainedModel, TrainingData};
use icu_forecast::PipelineError;

#[test]
fn test_standardizer_centres_and_scales() {
    let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
    let scaler = Standardizer::fit(&rows).unwrap();

    let scaled = scaler.transform(&rows).unwrap();
    assert_relative_eq!(scaled[0][0], -1.0, epsilon = 1e-12);
    assert_relative_eq!(scaled[1][0], 1.0, epsilon = 1e-12);
    // Constant columns keep unit scale
    assert_eq!(scaled[0][1], 0.0);
    assert!(scaler.transform_row(&[1.0]).is_err());
}

#[test]
fn test_standardizer_needs_rows() {
    assert!(matches!(
        Standardizer::fit(&[]),
        Err(PipelineError::EmptyTrainingSet(_))
    ));
}

#[test]
fn test_training_data_validation() {
    assert!(TrainingData::new(vec![vec![1.0]], vec![1.0, 2.0]).is_err());
    assert!(TrainingData::new(vec![vec![1.0], vec![1.0, 2.0]], vec![1.0, 2.0]).is_err());

    let data = TrainingData::new(vec![vec![1.0], vec![2.0]], vec![0.0, 1.0]).unwrap();
    assert!(data.clone().with_weights(vec![1.0]).is_err());
    assert!(data.clone().with_weights(vec![1.0, -1.0]).is_err());
    assert!(data.with_weights(vec![1.0, 2.0]).is_ok());
}

#[test]
fn test_ridge_model_name_and_width() {
    let model = RidgeRegression::new(0.5).unwrap();
    assert_eq!(model.name(), "Ridge(alpha=0.5)");

    let data = TrainingData::new(
        (0..10).map(|i| vec![i as f64, (i * i) as f64]).collect(),
        (0..10).map(|i| i as f64 * 0.1).collect(),
    )
    .unwrap();
    let trained = model.train(&data).unwrap();
    assert_eq!(trained.width(), 2);
    assert!(trained.predict_row(&[3.0, 9.0]).unwrap().is_finite());
}
