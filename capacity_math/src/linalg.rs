//! Dense linear algebra for small regression problems
//!
//! Feature counts here are in the tens, so plain `Vec<Vec<f64>>` matrices and
//! a Cholesky factorisation are sufficient.

use crate::{MathError, Result};

/// Dot product of two equally sized slices
pub fn dot(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(MathError::InvalidInput(format!(
            "Dot product length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Solve `a * x = b` for a symmetric positive definite `a`
pub fn cholesky_solve(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = a.len();
    if n == 0 || b.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a square {}x{} system with matching right-hand side",
            n, n
        )));
    }

    // Lower-triangular factor, row-major
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let partial: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let diag = a[i][i] - partial;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(MathError::CalculationError(format!(
                        "Matrix is not positive definite (pivot {} = {})",
                        i, diag
                    )));
                }
                l[i][j] = diag.sqrt();
            } else {
                l[i][j] = (a[i][j] - partial) / l[j][j];
            }
        }
    }

    // Forward substitution: L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let partial: f64 = (0..i).map(|k| l[i][k] * y[k]).sum();
        y[i] = (b[i] - partial) / l[i][i];
    }

    // Back substitution: L^T x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let partial: f64 = (i + 1..n).map(|k| l[k][i] * x[k]).sum();
        x[i] = (y[i] - partial) / l[i][i];
    }

    Ok(x)
}

/// Fit `y ~ intercept + rows * w` with an L2 penalty on `w` only.
///
/// Returns `(intercept, w)`.
pub fn ridge_solve(rows: &[Vec<f64>], targets: &[f64], alpha: f64) -> Result<(f64, Vec<f64>)> {
    if rows.is_empty() {
        return Err(MathError::InsufficientData(
            "Ridge regression needs at least one row".to_string(),
        ));
    }
    if rows.len() != targets.len() {
        return Err(MathError::InvalidInput(format!(
            "Rows ({}) and targets ({}) differ in length",
            rows.len(),
            targets.len()
        )));
    }
    if alpha < 0.0 || !alpha.is_finite() {
        return Err(MathError::InvalidInput(
            "Ridge penalty must be a finite non-negative number".to_string(),
        ));
    }

    let width = rows[0].len();
    if rows.iter().any(|r| r.len() != width) {
        return Err(MathError::InvalidInput(
            "All rows must have the same number of features".to_string(),
        ));
    }

    // Column 0 is the unpenalised intercept
    let dim = width + 1;
    let mut gram = vec![vec![0.0; dim]; dim];
    let mut rhs = vec![0.0; dim];
    for (row, &target) in rows.iter().zip(targets) {
        let augmented: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
        for i in 0..dim {
            rhs[i] += augmented[i] * target;
            for j in 0..=i {
                gram[i][j] += augmented[i] * augmented[j];
            }
        }
    }
    for i in 0..dim {
        for j in 0..i {
            gram[j][i] = gram[i][j];
        }
    }
    for (i, row) in gram.iter_mut().enumerate().skip(1) {
        row[i] += alpha;
    }

    let solution = cholesky_solve(&gram, &rhs)?;
    Ok((solution[0], solution[1..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cholesky_solves_spd_system() {
        let a = vec![vec![4.0, 2.0], vec![2.0, 3.0]];
        let x = cholesky_solve(&a, &[2.0, 1.0]).unwrap();
        assert_relative_eq!(x[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_indefinite_matrix() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        assert!(matches!(
            cholesky_solve(&a, &[1.0, 1.0]),
            Err(MathError::CalculationError(_))
        ));
    }

    #[test]
    fn test_ridge_recovers_exact_line_without_penalty() {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..6).map(|i| 0.25 + 0.5 * i as f64).collect();
        let (intercept, w) = ridge_solve(&rows, &targets, 0.0).unwrap();
        assert_relative_eq!(intercept, 0.25, epsilon = 1e-9);
        assert_relative_eq!(w[0], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_ridge_penalty_shrinks_weights() {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..6).map(|i| 2.0 * i as f64).collect();
        let (_, loose) = ridge_solve(&rows, &targets, 0.0).unwrap();
        let (_, tight) = ridge_solve(&rows, &targets, 50.0).unwrap();
        assert!(tight[0].abs() < loose[0].abs());
    }

    #[test]
    fn test_dot_length_mismatch() {
        assert!(dot(&[1.0], &[1.0, 2.0]).is_err());
        assert_eq!(dot(&[1.0, 2.0], &[3.0, 4.0]).unwrap(), 11.0);
    }
}
