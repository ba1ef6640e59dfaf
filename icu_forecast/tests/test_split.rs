use icu_forecast::split::HospitalGroupSplitter;
use icu_forecast::synthetic::SyntheticPanel;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::BTreeSet;

fn ids(n: usize) -> BTreeSet<String> {
    (1..=n).map(|i| format!("H{:03}", i)).collect()
}

#[rstest]
#[case(2, 0.2, 1)]
#[case(5, 0.2, 1)]
#[case(10, 0.2, 2)]
#[case(11, 0.2, 3)]
#[case(4, 0.9, 3)]
fn test_split_is_disjoint_and_complete(
    #[case] n: usize,
    #[case] ratio: f64,
    #[case] holdout: usize,
) {
    let all = ids(n);
    let split = HospitalGroupSplitter::default().split(&all, ratio).unwrap();

    assert_eq!(split.holdout.len(), holdout);
    assert!(split.train.is_disjoint(&split.holdout));
    let union: BTreeSet<String> = split.train.union(&split.holdout).cloned().collect();
    assert_eq!(union, all);
}

#[test]
fn test_split_is_deterministic_for_a_seed() {
    let all = ids(20);
    let a = HospitalGroupSplitter::new(7).split(&all, 0.25).unwrap();
    let b = HospitalGroupSplitter::new(7).split(&all, 0.25).unwrap();
    assert_eq!(a, b);
    assert_eq!(HospitalGroupSplitter::default().seed(), 42);
}

#[rstest]
#[case(0.0)]
#[case(1.0)]
#[case(-0.3)]
fn test_split_rejects_invalid_ratio(#[case] ratio: f64) {
    assert!(HospitalGroupSplitter::default().split(&ids(10), ratio).is_err());
}

#[test]
fn test_split_needs_two_hospitals() {
    assert!(HospitalGroupSplitter::default().split(&ids(1), 0.2).is_err());
}

#[rstest]
#[case(10, 2)]
#[case(10, 3)]
#[case(7, 7)]
fn test_folds_cover_every_hospital_once(#[case] n: usize, #[case] k: usize) {
    let all = ids(n);
    let folds = HospitalGroupSplitter::new(3).k_folds(&all, k).unwrap();
    assert_eq!(folds.len(), k);

    for (i, a) in folds.iter().enumerate() {
        for b in folds.iter().skip(i + 1) {
            assert!(a.is_disjoint(b));
        }
    }
    let union: BTreeSet<String> = folds.iter().flatten().cloned().collect();
    assert_eq!(union, all);

    let sizes: Vec<usize> = folds.iter().map(BTreeSet::len).collect();
    let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
    assert!(max - min <= 1);
}

#[rstest]
#[case(1)]
#[case(6)]
fn test_folds_reject_invalid_count(#[case] k: usize) {
    assert!(HospitalGroupSplitter::default().k_folds(&ids(5), k).is_err());
}

#[test]
fn test_fold_splits_hold_out_each_fold() {
    let all = ids(9);
    let splits = HospitalGroupSplitter::default().fold_splits(&all, 3).unwrap();
    assert_eq!(splits.len(), 3);
    for split in &splits {
        assert_eq!(split.holdout.len(), 3);
        assert_eq!(split.train.len(), 6);
        assert!(split.train.is_disjoint(&split.holdout));
    }
}

#[test]
fn test_partition_moves_whole_hospitals() {
    let panel = SyntheticPanel::new(6, 12).generate().unwrap();
    let split = HospitalGroupSplitter::default()
        .split(&panel.hospital_ids(), 0.3)
        .unwrap();
    let (train, holdout) = split.partition(&panel);

    assert_eq!(train.hospital_ids(), split.train);
    assert_eq!(holdout.hospital_ids(), split.holdout);
    assert_eq!(
        train.observation_count() + holdout.observation_count(),
        panel.observation_count()
    );
}
