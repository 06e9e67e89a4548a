//! Linear complementarity problems.
//!
//! Solves
//!
//! ```text
//! w = M·z + q,   z ≥ 0,   w ≥ 0,   zᵀw = 0
//! ```
//!
//! with one of two methods:
//!
//! - **Lemke**: complementary pivoting with an artificial variable. Exact up
//!   to round-off for the matrices arising from elastic coupling (positive
//!   semi-definite, positive diagonal), but quadratic memory and cubic time.
//! - **Projected Gauss-Seidel**: cheap iterations with successive
//!   over-relaxation and warm starting; convergence is measured on the
//!   complementarity residual `‖min(z, w)‖∞`.
//!
//! [`LcpStrategy::Standard`] runs Gauss-Seidel first and falls back to Lemke
//! when the iteration budget is exhausted.
//!
//! # Example
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use sim_force_law::lcp::{LcpStrategy, LinearComplementarityProblem};
//!
//! let m = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
//! let q = DVector::from_vec(vec![-1.0, 1.0]);
//! let solution = LinearComplementarityProblem::new(LcpStrategy::Lemke)
//!     .solve(&m, &q, None)
//!     .unwrap();
//! assert!((solution.z[0] - 0.5).abs() < 1e-12);
//! assert_eq!(solution.z[1], 0.0);
//! ```

mod lemke;
mod pgs;

pub use lemke::solve_lemke;
pub use pgs::solve_projected_gauss_seidel;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ForceLawError, Result};

/// Selection of the LCP solution method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LcpStrategy {
    /// Complementary pivoting only.
    Lemke,
    /// Projected Gauss-Seidel only.
    ProjectedGaussSeidel,
    /// Projected Gauss-Seidel with Lemke as fallback.
    #[default]
    Standard,
}

/// Method that produced an [`LcpSolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LcpMethod {
    /// The trivial solution `z = 0` for `q ≥ 0`.
    Trivial,
    /// Complementary pivoting.
    Lemke,
    /// Projected Gauss-Seidel.
    ProjectedGaussSeidel,
}

/// Configuration for the LCP solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LcpSolverConfig {
    /// Maximum number of Gauss-Seidel sweeps.
    pub max_iterations: usize,

    /// Minimum sweeps before checking convergence.
    pub min_iterations: usize,

    /// Maximum number of Lemke pivots.
    pub max_pivots: usize,

    /// Convergence tolerance on the complementarity residual `‖min(z, w)‖∞`.
    pub tolerance: f64,

    /// SOR factor of the Gauss-Seidel sweeps.
    /// - 1.0: Standard Gauss-Seidel
    /// - < 1.0: Under-relaxation (more stable)
    /// - > 1.0: Over-relaxation
    pub sor_factor: f64,

    /// Pivot elements below this magnitude are treated as zero.
    pub pivot_tolerance: f64,
}

impl Default for LcpSolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            min_iterations: 1,
            max_pivots: 1000,
            tolerance: 1e-10,
            sor_factor: 1.0,
            pivot_tolerance: 1e-14,
        }
    }
}

impl LcpSolverConfig {
    /// High-accuracy configuration.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            max_iterations: 10_000,
            min_iterations: 3,
            max_pivots: 10_000,
            tolerance: 1e-14,
            sor_factor: 1.0,
            pivot_tolerance: 1e-16,
        }
    }

    /// Loose configuration for real-time use.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            max_iterations: 50,
            min_iterations: 1,
            max_pivots: 200,
            tolerance: 1e-6,
            sor_factor: 1.3,
            pivot_tolerance: 1e-12,
        }
    }

    /// Set maximum Gauss-Seidel sweeps.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Set maximum Lemke pivots.
    #[must_use]
    pub const fn with_max_pivots(mut self, max_pivots: usize) -> Self {
        self.max_pivots = max_pivots;
        self
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the SOR factor.
    #[must_use]
    pub const fn with_sor_factor(mut self, factor: f64) -> Self {
        self.sor_factor = factor;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.sor_factor <= 0.0 || self.sor_factor >= 2.0 {
            return Err(ForceLawError::invalid_config("SOR factor must be in range (0, 2)"));
        }
        if self.tolerance <= 0.0 {
            return Err(ForceLawError::invalid_config("LCP tolerance must be positive"));
        }
        if self.pivot_tolerance < 0.0 {
            return Err(ForceLawError::invalid_config("pivot tolerance must be non-negative"));
        }
        if self.max_iterations == 0 && self.max_pivots == 0 {
            return Err(ForceLawError::invalid_config(
                "LCP solver needs a positive iteration or pivot budget",
            ));
        }
        Ok(())
    }
}

/// Solution of an LCP.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LcpSolution {
    /// Complementary variable `z ≥ 0`.
    pub z: DVector<f64>,
    /// Slack `w = M·z + q ≥ 0`.
    pub w: DVector<f64>,
    /// Sweeps or pivots spent.
    pub iterations: usize,
    /// Complementarity residual `‖min(z, w)‖∞`.
    pub residual: f64,
    /// Method that produced the solution.
    pub method: LcpMethod,
}

/// Complementarity residual `‖min(z, w)‖∞`.
///
/// Zero exactly when `z ≥ 0`, `w ≥ 0` and `zᵀw = 0`.
#[must_use]
pub fn complementarity_residual(z: &DVector<f64>, w: &DVector<f64>) -> f64 {
    z.iter()
        .zip(w.iter())
        .map(|(zi, wi)| zi.min(*wi).abs())
        .fold(0.0, f64::max)
}

/// An LCP solver: a strategy plus its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearComplementarityProblem {
    /// Solution method.
    pub strategy: LcpStrategy,
    /// Solver parameters.
    pub config: LcpSolverConfig,
}

impl LinearComplementarityProblem {
    /// Create a solver with the default configuration.
    #[must_use]
    pub fn new(strategy: LcpStrategy) -> Self {
        Self {
            strategy,
            config: LcpSolverConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: LcpSolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Solve `0 ≤ z ⟂ M·z + q ≥ 0`.
    ///
    /// `initial` warm starts the Gauss-Seidel iteration when its length
    /// matches; Lemke ignores it.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] for mismatched dimensions and
    /// [`ForceLawError::LcpNotConverged`] if the selected method fails.
    pub fn solve(&self, m: &DMatrix<f64>, q: &DVector<f64>, initial: Option<&DVector<f64>>) -> Result<LcpSolution> {
        let n = q.len();
        if m.nrows() != n || m.ncols() != n {
            return Err(ForceLawError::invalid_config(format!(
                "LCP matrix is {}x{} but q has {n} entries",
                m.nrows(),
                m.ncols()
            )));
        }

        if q.iter().all(|qi| *qi >= 0.0) {
            return Ok(LcpSolution {
                z: DVector::zeros(n),
                w: q.clone(),
                iterations: 0,
                residual: 0.0,
                method: LcpMethod::Trivial,
            });
        }

        let initial = initial.filter(|z0| z0.len() == n);
        let solution = match self.strategy {
            LcpStrategy::Lemke => solve_lemke(m, q, &self.config)?,
            LcpStrategy::ProjectedGaussSeidel => solve_projected_gauss_seidel(m, q, initial, &self.config)?,
            LcpStrategy::Standard => match solve_projected_gauss_seidel(m, q, initial, &self.config) {
                Ok(solution) => solution,
                Err(err) => {
                    warn!(size = n, error = %err, "projected Gauss-Seidel failed, falling back to Lemke");
                    solve_lemke(m, q, &self.config)?
                }
            },
        };
        debug!(
            size = n,
            iterations = solution.iterations,
            residual = solution.residual,
            method = ?solution.method,
            "LCP solved"
        );
        Ok(solution)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn problem() -> (DMatrix<f64>, DVector<f64>) {
        let m = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0]);
        let q = DVector::from_vec(vec![-2.0, 1.0, -1.0]);
        (m, q)
    }

    #[test]
    fn test_trivial_solution() {
        let m = DMatrix::identity(2, 2);
        let q = DVector::from_vec(vec![1.0, 0.0]);
        let solution = LinearComplementarityProblem::default().solve(&m, &q, None).unwrap();
        assert_eq!(solution.method, LcpMethod::Trivial);
        assert_eq!(solution.z, DVector::zeros(2));
    }

    #[test]
    fn test_strategies_agree() {
        let (m, q) = problem();
        let lemke = LinearComplementarityProblem::new(LcpStrategy::Lemke)
            .solve(&m, &q, None)
            .unwrap();
        let pgs = LinearComplementarityProblem::new(LcpStrategy::ProjectedGaussSeidel)
            .solve(&m, &q, None)
            .unwrap();
        assert_eq!(lemke.method, LcpMethod::Lemke);
        assert_eq!(pgs.method, LcpMethod::ProjectedGaussSeidel);
        for i in 0..3 {
            assert_relative_eq!(lemke.z[i], pgs.z[i], epsilon = 1e-8);
        }
        assert!(lemke.residual < 1e-10);
    }

    #[test]
    fn test_standard_falls_back_to_lemke() {
        let (m, q) = problem();
        let solver = LinearComplementarityProblem::new(LcpStrategy::Standard)
            .with_config(LcpSolverConfig::default().with_max_iterations(1));
        let solution = solver.solve(&m, &q, None).unwrap();
        assert_eq!(solution.method, LcpMethod::Lemke);
        assert!(complementarity_residual(&solution.z, &solution.w) < 1e-10);
    }

    #[test]
    fn test_dimension_mismatch() {
        let m = DMatrix::identity(2, 2);
        let q = DVector::from_vec(vec![-1.0, 0.0, 1.0]);
        let err = LinearComplementarityProblem::default().solve(&m, &q, None).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_config_validation() {
        assert!(LcpSolverConfig::default().validate().is_ok());
        assert!(LcpSolverConfig::high_accuracy().validate().is_ok());
        assert!(LcpSolverConfig::realtime().validate().is_ok());
        assert!(LcpSolverConfig::default().with_sor_factor(2.5).validate().is_err());
        assert!(LcpSolverConfig::default().with_tolerance(0.0).validate().is_err());
    }

    #[test]
    fn test_residual() {
        let z = DVector::from_vec(vec![1.0, 0.0]);
        let w = DVector::from_vec(vec![0.0, 3.0]);
        assert_eq!(complementarity_residual(&z, &w), 0.0);
        let w = DVector::from_vec(vec![0.5, -0.25]);
        assert_eq!(complementarity_residual(&z, &w), 0.5);
    }
}
