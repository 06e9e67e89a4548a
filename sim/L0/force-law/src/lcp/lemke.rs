//! Lemke's complementary pivoting algorithm.
//!
//! The tableau holds the system
//!
//! ```text
//! I·w - M·z - e·z₀ = q
//! ```
//!
//! with the artificial variable `z₀` and `e = (1, …, 1)`. The first pivot
//! brings `z₀` into the basis at the most negative `q_i`; afterwards the
//! complement of the variable that just left enters, until `z₀` itself
//! leaves. An entering column without a positive entry is a secondary ray
//! and ends the run without a solution.

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use super::{LcpMethod, LcpSolution, LcpSolverConfig, complementarity_residual};
use crate::error::{ForceLawError, Result};

/// Solve the LCP by complementary pivoting.
///
/// # Errors
///
/// Returns [`ForceLawError::LcpNotConverged`] on ray termination or when the
/// pivot budget is exhausted.
pub fn solve_lemke(m: &DMatrix<f64>, q: &DVector<f64>, config: &LcpSolverConfig) -> Result<LcpSolution> {
    let n = q.len();
    let artificial = 2 * n;
    let rhs = 2 * n + 1;

    let Some((start_row, _)) = q
        .iter()
        .enumerate()
        .filter(|(_, qi)| **qi < 0.0)
        .min_by(|a, b| a.1.total_cmp(b.1))
    else {
        return Ok(LcpSolution {
            z: DVector::zeros(n),
            w: q.clone(),
            iterations: 0,
            residual: 0.0,
            method: LcpMethod::Trivial,
        });
    };

    // Columns: w (0..n), z (n..2n), z₀ (2n), right-hand side (2n + 1).
    let mut tableau = DMatrix::zeros(n, 2 * n + 2);
    for i in 0..n {
        tableau[(i, i)] = 1.0;
        for j in 0..n {
            tableau[(i, n + j)] = -m[(i, j)];
        }
        tableau[(i, artificial)] = -1.0;
        tableau[(i, rhs)] = q[i];
    }
    let mut basis: Vec<usize> = (0..n).collect();

    pivot(&mut tableau, start_row, artificial);
    let mut leaving = basis[start_row];
    basis[start_row] = artificial;

    for pivots in 1..=config.max_pivots {
        let entering = complement(leaving, n);

        let Some(row) = ratio_test(&tableau, &basis, entering, artificial, config.pivot_tolerance) else {
            warn!(pivots, size = n, "Lemke terminated on a ray");
            return Err(ForceLawError::LcpNotConverged {
                iterations: pivots,
                residual: f64::INFINITY,
            });
        };

        pivot(&mut tableau, row, entering);
        leaving = basis[row];
        basis[row] = entering;

        if leaving == artificial {
            let mut z = DVector::zeros(n);
            for (row, &variable) in basis.iter().enumerate() {
                if (n..2 * n).contains(&variable) {
                    z[variable - n] = tableau[(row, rhs)].max(0.0);
                }
            }
            let w = m * &z + q;
            let residual = complementarity_residual(&z, &w);
            return Ok(LcpSolution {
                z,
                w,
                iterations: pivots,
                residual,
                method: LcpMethod::Lemke,
            });
        }
    }

    warn!(pivots = config.max_pivots, size = n, "Lemke pivot budget exhausted");
    Err(ForceLawError::LcpNotConverged {
        iterations: config.max_pivots,
        residual: f64::INFINITY,
    })
}

/// Index of the complementary variable (`w_i` ↔ `z_i`).
fn complement(variable: usize, n: usize) -> usize {
    if variable < n { variable + n } else { variable - n }
}

/// Minimum ratio test on the entering column. Ties prefer the row holding
/// the artificial variable so the run terminates as early as possible.
fn ratio_test(
    tableau: &DMatrix<f64>,
    basis: &[usize],
    entering: usize,
    artificial: usize,
    pivot_tolerance: f64,
) -> Option<usize> {
    let rhs = tableau.ncols() - 1;
    let mut best: Option<(usize, f64)> = None;
    for (row, &variable) in basis.iter().enumerate() {
        let coefficient = tableau[(row, entering)];
        if coefficient <= pivot_tolerance {
            continue;
        }
        let ratio = tableau[(row, rhs)] / coefficient;
        best = match best {
            None => Some((row, ratio)),
            Some((_, best_ratio)) if ratio < best_ratio - pivot_tolerance => Some((row, ratio)),
            Some((_, best_ratio)) if ratio <= best_ratio + pivot_tolerance && variable == artificial => {
                Some((row, ratio))
            }
            keep => keep,
        };
    }
    best.map(|(row, _)| row)
}

/// Gauss-Jordan pivot on `(row, column)`.
fn pivot(tableau: &mut DMatrix<f64>, row: usize, column: usize) {
    let pivot_value = tableau[(row, column)];
    tableau.row_mut(row).scale_mut(1.0 / pivot_value);
    let pivot_row = tableau.row(row).clone_owned();
    for i in 0..tableau.nrows() {
        if i == row {
            continue;
        }
        let factor = tableau[(i, column)];
        if factor != 0.0 {
            for (j, value) in pivot_row.iter().enumerate() {
                tableau[(i, j)] -= factor * value;
            }
        }
    }
}
