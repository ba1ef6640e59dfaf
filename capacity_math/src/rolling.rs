//! Trailing-window statistics
//!
//! Contains the fixed-size window used for lag and rolling features:
//! - `RollingWindow` keeps the most recent `period` values in arrival order
//! - `WindowStats` holds mean, sample standard deviation, min and max

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::VecDeque;

/// Summary statistics over a trailing window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator); 0 for a single value
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Compute summary statistics for a slice of values
pub fn window_stats(values: &[f64]) -> Result<WindowStats> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute window statistics over an empty window".to_string(),
        ));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Window contains non-finite values".to_string(),
        ));
    }

    let std = if values.len() > 1 {
        Statistics::std_dev(values)
    } else {
        0.0
    };

    Ok(WindowStats {
        mean: Statistics::mean(values),
        std,
        min: Statistics::min(values),
        max: Statistics::max(values),
    })
}

/// Fixed-capacity window over the most recent values
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    /// Create a new window holding at most `period` values
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
        })
    }

    /// Create a window pre-filled with the trailing `period` values of `history`
    pub fn from_history(period: usize, history: &[f64]) -> Result<Self> {
        let mut window = Self::new(period)?;
        let start = history.len().saturating_sub(period);
        for &value in &history[start..] {
            window.push(value);
        }
        Ok(window)
    }

    /// Push a new value, evicting the oldest once the window is full
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.period {
            self.values.pop_front();
        }
    }

    /// Most recent value
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Value `k` steps back from the most recent (k = 0 is the latest)
    pub fn back(&self, k: usize) -> Option<f64> {
        let len = self.values.len();
        if k >= len {
            return None;
        }
        self.values.get(len - 1 - k).copied()
    }

    /// The trailing `n` values in arrival order
    pub fn tail(&self, n: usize) -> Result<Vec<f64>> {
        if n > self.values.len() {
            return Err(MathError::InsufficientData(format!(
                "Need {} values, window holds {}.",
                n,
                self.values.len()
            )));
        }
        Ok(self.values.iter().skip(self.values.len() - n).copied().collect())
    }

    /// Statistics over the trailing `n` values
    pub fn tail_stats(&self, n: usize) -> Result<WindowStats> {
        window_stats(&self.tail(n)?)
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.period
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Values in arrival order, oldest first
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}
