//! Proximal point operators of the admissible force sets.
//!
//! Every set-valued law in this crate is written as a fixed-point equation
//!
//! ```text
//! λ = prox_C(λ - r * ġ)
//! ```
//!
//! where `C` is the convex set of admissible forces and `r > 0` is the
//! relaxation factor chosen by the outer solver. The three sets needed are the
//! half-line `[λ_min, ∞)` (unilateral normal direction), the interval
//! `[-b, b]` (planar friction) and the disc `‖λ‖ ≤ b` (spatial friction).

use nalgebra::DVector;

/// Project onto the half-line `[la_min, ∞)`.
#[must_use]
#[inline]
pub fn prox_normal(arg: f64, la_min: f64) -> f64 {
    arg.max(la_min)
}

/// Project onto the interval `[-bound, bound]`.
///
/// A negative bound is treated as zero.
#[must_use]
#[inline]
pub fn prox_interval(arg: f64, bound: f64) -> f64 {
    let bound = bound.max(0.0);
    arg.clamp(-bound, bound)
}

/// Project onto the Euclidean disc of radius `bound`.
///
/// Points inside the disc are returned unchanged; points outside are scaled
/// back onto the boundary, keeping their direction.
#[must_use]
pub fn prox_disc(arg: &DVector<f64>, bound: f64) -> DVector<f64> {
    let bound = bound.max(0.0);
    let norm = arg.norm();
    if norm <= bound {
        arg.clone()
    } else if norm < 1e-15 {
        DVector::zeros(arg.len())
    } else {
        arg * (bound / norm)
    }
}

/// Sign function with `sign(0) = 0`.
#[must_use]
#[inline]
pub(crate) fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_prox_normal() {
        assert_eq!(prox_normal(1.5, 0.0), 1.5);
        assert_eq!(prox_normal(-1.5, 0.0), 0.0);
        assert_eq!(prox_normal(-1.5, -2.0), -1.5);
    }

    #[test]
    fn test_prox_interval() {
        assert_eq!(prox_interval(0.5, 1.0), 0.5);
        assert_eq!(prox_interval(3.0, 1.0), 1.0);
        assert_eq!(prox_interval(-3.0, 1.0), -1.0);
        assert_eq!(prox_interval(3.0, -1.0), 0.0);
    }

    #[test]
    fn test_prox_disc_inside_is_identity() {
        let arg = DVector::from_vec(vec![0.3, -0.4]);
        assert_eq!(prox_disc(&arg, 1.0), arg);
    }

    #[test]
    fn test_prox_disc_outside_keeps_direction() {
        let arg = DVector::from_vec(vec![3.0, 4.0]);
        let p = prox_disc(&arg, 1.0);
        assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(p[0] / p[1], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_prox_disc_zero_bound() {
        let arg = DVector::from_vec(vec![3.0, 4.0]);
        assert_relative_eq!(prox_disc(&arg, 0.0).norm(), 0.0);
    }

    #[test]
    fn test_sign() {
        assert_eq!(sign(2.0), 1.0);
        assert_eq!(sign(-0.1), -1.0);
        assert_eq!(sign(0.0), 0.0);
    }
}
