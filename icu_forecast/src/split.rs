//! Hospital-level train/holdout partitioning
//!
//! Splits operate on hospital ids, never on rows: every observation of a
//! hospital lands on the same side, so within-hospital temporal correlation
//! cannot leak into validation.

use crate::data::Panel;
use crate::error::{PipelineError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;

/// Disjoint train and holdout hospital sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSplit {
    pub train: BTreeSet<String>,
    pub holdout: BTreeSet<String>,
}

impl GroupSplit {
    /// Panels for both sides of the split
    pub fn partition(&self, panel: &Panel) -> (Panel, Panel) {
        (panel.subset(&self.train), panel.subset(&self.holdout))
    }
}

/// Seeded set partition of hospital ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HospitalGroupSplitter {
    seed: u64,
}

impl Default for HospitalGroupSplitter {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

impl HospitalGroupSplitter {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Ids in a seed-determined order, independent of input order
    fn shuffled(&self, hospital_ids: &BTreeSet<String>) -> Vec<String> {
        let mut ids: Vec<String> = hospital_ids.iter().cloned().collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        ids.shuffle(&mut rng);
        ids
    }

    /// Hold out `ceil(n * ratio)` hospitals, keeping at least one on each side
    pub fn split(&self, hospital_ids: &BTreeSet<String>, holdout_ratio: f64) -> Result<GroupSplit> {
        if !(holdout_ratio > 0.0 && holdout_ratio < 1.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "Holdout ratio must be within (0, 1), got {}",
                holdout_ratio
            )));
        }
        let n = hospital_ids.len();
        if n < 2 {
            return Err(PipelineError::InvalidParameter(format!(
                "Need at least 2 hospitals for a group split, got {}",
                n
            )));
        }

        let holdout_size = ((n as f64 * holdout_ratio).ceil() as usize).clamp(1, n - 1);
        let ids = self.shuffled(hospital_ids);
        let holdout: BTreeSet<String> = ids[..holdout_size].iter().cloned().collect();
        let train: BTreeSet<String> = ids[holdout_size..].iter().cloned().collect();

        Ok(GroupSplit { train, holdout })
    }

    /// `k` disjoint folds covering every hospital exactly once.
    ///
    /// Fold sizes differ by at most one.
    pub fn k_folds(
        &self,
        hospital_ids: &BTreeSet<String>,
        k: usize,
    ) -> Result<Vec<BTreeSet<String>>> {
        let n = hospital_ids.len();
        if k < 2 || k > n {
            return Err(PipelineError::InvalidParameter(format!(
                "Fold count must be between 2 and the number of hospitals ({}), got {}",
                n, k
            )));
        }

        let mut folds = vec![BTreeSet::new(); k];
        for (i, id) in self.shuffled(hospital_ids).into_iter().enumerate() {
            folds[i % k].insert(id);
        }
        Ok(folds)
    }

    /// Train/holdout pair for every fold of a k-fold split
    pub fn fold_splits(
        &self,
        hospital_ids: &BTreeSet<String>,
        k: usize,
    ) -> Result<Vec<GroupSplit>> {
        let folds = self.k_folds(hospital_ids, k)?;
        Ok(folds
            .iter()
            .map(|holdout| GroupSplit {
                train: hospital_ids.difference(holdout).cloned().collect(),
                holdout: holdout.clone(),
            })
            .collect())
    }
}
