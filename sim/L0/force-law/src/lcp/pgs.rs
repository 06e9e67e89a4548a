//! Projected Gauss-Seidel for LCPs.
//!
//! Each sweep updates the components in order:
//!
//! ```text
//! z_i ← max(0, (1 - ω)·z_i + ω·(z_i - w_i / M_ii))
//! ```
//!
//! where `w_i` uses the already updated components. Converges for symmetric
//! positive definite `M` and `0 < ω < 2`.

use nalgebra::{DMatrix, DVector};

use super::{LcpMethod, LcpSolution, LcpSolverConfig, complementarity_residual};
use crate::error::{ForceLawError, Result};

/// Solve the LCP by projected Gauss-Seidel, starting from `initial` (or zero).
///
/// # Errors
///
/// Returns [`ForceLawError::LcpNotConverged`] if the residual is still above
/// the tolerance after `max_iterations` sweeps.
pub fn solve_projected_gauss_seidel(
    m: &DMatrix<f64>,
    q: &DVector<f64>,
    initial: Option<&DVector<f64>>,
    config: &LcpSolverConfig,
) -> Result<LcpSolution> {
    let n = q.len();
    let omega = config.sor_factor;
    let mut z = initial.map_or_else(|| DVector::zeros(n), |z0| z0.map(|zi| zi.max(0.0)));
    let mut residual = f64::INFINITY;

    for iteration in 1..=config.max_iterations {
        for i in 0..n {
            let diagonal = m[(i, i)];
            if diagonal <= config.pivot_tolerance {
                continue;
            }
            let wi = (0..n).fold(q[i], |acc, j| m[(i, j)].mul_add(z[j], acc));
            let gauss_seidel = z[i] - wi / diagonal;
            z[i] = (1.0 - omega).mul_add(z[i], omega * gauss_seidel).max(0.0);
        }

        if iteration >= config.min_iterations {
            let w = m * &z + q;
            residual = complementarity_residual(&z, &w);
            if residual <= config.tolerance {
                return Ok(LcpSolution {
                    z,
                    w,
                    iterations: iteration,
                    residual,
                    method: LcpMethod::ProjectedGaussSeidel,
                });
            }
        }
    }

    Err(ForceLawError::LcpNotConverged {
        iterations: config.max_iterations,
        residual,
    })
}
