//! Tangential friction laws on the velocity level.
//!
//! The impact counterpart of [`FrictionForceLaw`](crate::FrictionForceLaw):
//! `la` is a tangential impulse, `gdn` the post-impact slip velocity and `gda`
//! the slip velocity before the impact. Stribeck laws evaluate their
//! coefficient at the post-impact slip speed `‖gdn‖`. As on the acceleration
//! level, `la_n` is the normal impulse of the same contact, which must be
//! solved first.

use nalgebra::{DMatrix, DVector};

use crate::error::{ForceLawError, Result};
use crate::friction::{coulomb_to_xml, cone_fulfilled, cone_projection_jacobian, solve_in_cone, stribeck_to_xml};
use crate::function::{FrictionCoefficientFunction, nested_coefficient_function};
use crate::prox::{prox_disc, prox_interval};
use crate::xml::{XmlConfig, XmlElement};

/// Tangential impact law of a contact.
#[derive(Debug)]
pub enum FrictionImpactLaw {
    /// Coulomb friction impact in one tangential direction.
    PlanarCoulomb {
        /// Friction coefficient.
        mu: f64,
    },
    /// Coulomb friction impact in two tangential directions.
    SpatialCoulomb {
        /// Friction coefficient.
        mu: f64,
    },
    /// Velocity dependent friction impact in one tangential direction.
    PlanarStribeck {
        /// Friction coefficient as a function of the slip speed.
        fmu: FrictionCoefficientFunction,
    },
    /// Velocity dependent friction impact in two tangential directions.
    SpatialStribeck {
        /// Friction coefficient as a function of the slip speed.
        fmu: FrictionCoefficientFunction,
    },
}

impl FrictionImpactLaw {
    /// Name of the law as used in configuration files.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PlanarCoulomb { .. } => "PlanarCoulombImpact",
            Self::SpatialCoulomb { .. } => "SpatialCoulombImpact",
            Self::PlanarStribeck { .. } => "PlanarStribeckImpact",
            Self::SpatialStribeck { .. } => "SpatialStribeckImpact",
        }
    }

    /// Number of tangential directions (1 or 2).
    #[must_use]
    pub fn friction_directions(&self) -> usize {
        match self {
            Self::PlanarCoulomb { .. } | Self::PlanarStribeck { .. } => 1,
            Self::SpatialCoulomb { .. } | Self::SpatialStribeck { .. } => 2,
        }
    }

    /// Friction coefficient at slip speed `gd`.
    #[must_use]
    pub fn friction_coefficient(&self, gd: f64) -> f64 {
        match self {
            Self::PlanarCoulomb { mu } | Self::SpatialCoulomb { mu } => *mu,
            Self::PlanarStribeck { fmu } | Self::SpatialStribeck { fmu } => fmu.evaluate(gd),
        }
    }

    /// Impact friction laws are always set-valued.
    #[must_use]
    pub fn is_set_valued(&self) -> bool {
        true
    }

    /// Whether the slip velocity `s` is within `s_tol`.
    #[must_use]
    pub fn is_sticking_velocity(&self, s: &DVector<f64>, s_tol: f64) -> bool {
        s.norm() <= s_tol
    }

    fn bound(&self, gdn: &DVector<f64>, la_n: f64) -> f64 {
        self.friction_coefficient(gdn.norm()) * la_n.abs()
    }

    /// One proximal fixed-point step on the tangential impulse.
    ///
    /// The pre-impact velocity `gda` does not enter friction impacts and is
    /// accepted for signature symmetry with the normal impact law.
    #[must_use]
    pub fn project(&self, la: &DVector<f64>, gdn: &DVector<f64>, _gda: &DVector<f64>, la_n: f64, r: f64) -> DVector<f64> {
        let bound = self.bound(gdn, la_n);
        if self.friction_directions() == 1 {
            DVector::from_element(1, prox_interval(la[0] - r * gdn[0], bound))
        } else {
            prox_disc(&(la - gdn * r), bound)
        }
    }

    /// Jacobian of [`project`](Self::project): an `n × (2n + 1)` matrix with
    /// the blocks `∂/∂λ_T`, `∂/∂gdn` and `∂/∂λ_N`, holding the coefficient
    /// fixed at its current value.
    ///
    /// For Stribeck laws this is the Coulomb Jacobian at `μ = fmu(‖gdn‖)`;
    /// the `∂gdn` block leaves out the variation of `μ` with the slip speed.
    #[must_use]
    pub fn diff(&self, la: &DVector<f64>, gdn: &DVector<f64>, _gda: &DVector<f64>, la_n: f64, r: f64) -> DMatrix<f64> {
        let mu = self.friction_coefficient(gdn.norm());
        cone_projection_jacobian(&(la - gdn * r), mu, la_n, r)
    }

    /// Solve the single-contact impact problem `gdn + G·λ_T` directly.
    #[must_use]
    pub fn solve(&self, g_matrix: &DMatrix<f64>, gdn: &DVector<f64>, _gda: &DVector<f64>, la_n: f64) -> DVector<f64> {
        solve_in_cone(g_matrix, gdn, self.bound(gdn, la_n))
    }

    /// Check the impact friction complementarity condition within tolerances.
    #[must_use]
    pub fn is_fulfilled(
        &self,
        la: &DVector<f64>,
        gdn: &DVector<f64>,
        _gda: &DVector<f64>,
        la_n: f64,
        tol_la: f64,
        tol_gd: f64,
    ) -> bool {
        cone_fulfilled(la, gdn, self.bound(gdn, la_n), tol_la, tol_gd)
    }

    /// Whether the impulse sticks: inside the cone and without slip.
    #[must_use]
    pub fn is_sticking(
        &self,
        la: &DVector<f64>,
        gdn: &DVector<f64>,
        _gda: &DVector<f64>,
        la_n: f64,
        tol_la: f64,
        tol_gd: f64,
    ) -> bool {
        la.norm() <= self.bound(gdn, la_n) + tol_la && gdn.norm() <= tol_gd
    }

    /// Set a constant friction coefficient.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] for a negative coefficient or
    /// a Stribeck law.
    pub fn set_friction_coefficient(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(ForceLawError::invalid_config(
                "friction coefficient must be finite and non-negative",
            ));
        }
        match self {
            Self::PlanarCoulomb { mu } | Self::SpatialCoulomb { mu } => {
                *mu = value;
                Ok(())
            }
            _ => Err(ForceLawError::invalid_config(format!(
                "{} has no constant friction coefficient",
                self.type_name()
            ))),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::PlanarCoulomb { mu } | Self::SpatialCoulomb { mu } => {
                if mu.is_finite() && *mu >= 0.0 {
                    Ok(())
                } else {
                    Err(ForceLawError::invalid_config(
                        "friction coefficient must be finite and non-negative",
                    ))
                }
            }
            Self::PlanarStribeck { fmu } | Self::SpatialStribeck { fmu } => fmu.validate(),
        }
    }
}

impl XmlConfig for FrictionImpactLaw {
    fn to_xml(&self) -> Result<XmlElement> {
        match self {
            Self::PlanarCoulomb { mu } | Self::SpatialCoulomb { mu } => Ok(coulomb_to_xml(self.type_name(), *mu)),
            Self::PlanarStribeck { fmu } | Self::SpatialStribeck { fmu } => stribeck_to_xml(self.type_name(), fmu),
        }
    }

    fn from_xml(element: &XmlElement) -> Result<Self> {
        let law = match element.name.as_str() {
            "PlanarCoulombImpact" => Self::PlanarCoulomb {
                mu: element.f64_child("frictionCoefficient")?,
            },
            "SpatialCoulombImpact" => Self::SpatialCoulomb {
                mu: element.f64_child("frictionCoefficient")?,
            },
            "PlanarStribeckImpact" => Self::PlanarStribeck {
                fmu: nested_coefficient_function(element)?,
            },
            "SpatialStribeckImpact" => Self::SpatialStribeck {
                fmu: nested_coefficient_function(element)?,
            },
            other => {
                return Err(ForceLawError::UnknownElement {
                    name: other.to_string(),
                    context: "friction impact law",
                });
            }
        };
        law.validate()?;
        Ok(law)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn v(values: &[f64]) -> DVector<f64> {
        DVector::from_row_slice(values)
    }

    #[test]
    fn test_stribeck_impact_uses_post_impact_speed() {
        let law = FrictionImpactLaw::PlanarStribeck {
            fmu: FrictionCoefficientFunction::Linear { a0: 0.5, a1: -0.1 },
        };
        let gda = v(&[3.0]);
        // ‖gdn‖ = 2 -> μ = 0.3, bound 0.3 * 10
        let la = law.project(&v(&[0.0]), &v(&[-2.0]), &gda, 10.0, 10.0);
        assert_relative_eq!(la[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spatial_coulomb_impact_project_stays_in_disc() {
        let law = FrictionImpactLaw::SpatialCoulomb { mu: 0.3 };
        let zero = v(&[0.0, 0.0]);
        let la = law.project(&v(&[5.0, -5.0]), &zero, &zero, 2.0, 1.0);
        assert_relative_eq!(la.norm(), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_is_sticking() {
        let law = FrictionImpactLaw::SpatialCoulomb { mu: 0.5 };
        let zero = v(&[0.0, 0.0]);
        assert!(law.is_sticking(&v(&[0.3, 0.4]), &zero, &zero, 2.0, 1e-9, 1e-9));
        assert!(!law.is_sticking(&v(&[3.0, 4.0]), &zero, &zero, 2.0, 1e-9, 1e-9));
        assert!(!law.is_sticking(&v(&[0.3, 0.4]), &v(&[0.1, 0.0]), &zero, 2.0, 1e-9, 1e-9));
    }

    /// Central differences of `project` over `[λ_T, gdn, λ_N]`.
    fn finite_difference(
        law: &FrictionImpactLaw,
        la: &DVector<f64>,
        gdn: &DVector<f64>,
        la_n: f64,
        r: f64,
    ) -> DMatrix<f64> {
        let n = la.len();
        let h = 1e-7;
        let gda = DVector::zeros(n);
        let mut d = DMatrix::zeros(n, 2 * n + 1);
        for j in 0..2 * n + 1 {
            let (mut lp, mut lm) = (la.clone(), la.clone());
            let (mut gp, mut gm) = (gdn.clone(), gdn.clone());
            let (mut np, mut nm) = (la_n, la_n);
            if j < n {
                lp[j] += h;
                lm[j] -= h;
            } else if j < 2 * n {
                gp[j - n] += h;
                gm[j - n] -= h;
            } else {
                np += h;
                nm -= h;
            }
            let column = (law.project(&lp, &gp, &gda, np, r) - law.project(&lm, &gm, &gda, nm, r)) / (2.0 * h);
            d.set_column(j, &column);
        }
        d
    }

    #[test]
    fn test_diff_planar_matches_finite_difference() {
        let law = FrictionImpactLaw::PlanarCoulomb { mu: 0.3 };
        let gda = v(&[0.0]);
        // sticking, then sliding in both directions
        for (la, gdn) in [(0.1, 0.2), (0.2, -1.0), (-0.4, 1.5)] {
            let (la, gdn) = (v(&[la]), v(&[gdn]));
            let d = law.diff(&la, &gdn, &gda, 2.0, 0.5);
            let fd = finite_difference(&law, &la, &gdn, 2.0, 0.5);
            for j in 0..3 {
                assert_relative_eq!(d[(0, j)], fd[(0, j)], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_diff_spatial_matches_finite_difference() {
        let law = FrictionImpactLaw::SpatialCoulomb { mu: 0.3 };
        let gda = v(&[0.0, 0.0]);
        for (la, gdn) in [(v(&[1.0, 2.0]), v(&[-0.5, 0.2])), (v(&[0.1, -0.2]), v(&[0.05, 0.1]))] {
            let d = law.diff(&la, &gdn, &gda, 2.0, 0.8);
            assert_eq!(d.shape(), (2, 5));
            let fd = finite_difference(&law, &la, &gdn, 2.0, 0.8);
            for i in 0..2 {
                for j in 0..5 {
                    assert_relative_eq!(d[(i, j)], fd[(i, j)], epsilon = 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_stribeck_diff_freezes_coefficient() {
        let fmu = FrictionCoefficientFunction::Linear { a0: 0.5, a1: -0.1 };
        let law = FrictionImpactLaw::SpatialStribeck { fmu };
        let la = v(&[1.0, 2.0]);
        let gdn = v(&[0.0, 1.0]);
        let gda = v(&[0.0, 0.0]);
        let mu = law.friction_coefficient(1.0);
        assert_relative_eq!(mu, 0.4, epsilon = 1e-15);
        let frozen = FrictionImpactLaw::SpatialCoulomb { mu };
        assert_eq!(
            law.diff(&la, &gdn, &gda, 2.0, 0.8),
            frozen.diff(&la, &gdn, &gda, 2.0, 0.8)
        );
    }

    #[test]
    fn test_set_valued_and_slip_sticking() {
        let laws = [
            FrictionImpactLaw::PlanarCoulomb { mu: 0.1 },
            FrictionImpactLaw::SpatialStribeck {
                fmu: FrictionCoefficientFunction::Constant(0.2),
            },
        ];
        for law in &laws {
            assert!(law.is_set_valued());
        }
        let law = &laws[1];
        assert!(law.is_sticking_velocity(&v(&[3e-10, 4e-10]), 1e-9));
        assert!(law.is_sticking_velocity(&v(&[0.0, 0.0]), 0.0));
        assert!(!law.is_sticking_velocity(&v(&[3e-9, 4e-9]), 1e-9));
    }

    #[test]
    fn test_solve_and_fulfilled() {
        let law = FrictionImpactLaw::PlanarCoulomb { mu: 0.2 };
        let g = DMatrix::from_element(1, 1, 1.0);
        let gda = v(&[-1.0]);
        let la = law.solve(&g, &v(&[5.0]), &gda, 10.0);
        assert_relative_eq!(la[0], -2.0);
        assert!(law.is_fulfilled(&la, &v(&[5.0]), &gda, 10.0, 1e-9, 1e-9));
        assert_eq!(law.diff(&la, &v(&[5.0]), &gda, 10.0, 1.0).shape(), (1, 3));
    }

    #[test]
    fn test_xml_round_trip() {
        let law = FrictionImpactLaw::PlanarStribeck {
            fmu: FrictionCoefficientFunction::Tabular {
                x: vec![0.0, 0.5, 1.0],
                y: vec![0.6, 0.45, 0.4],
            },
        };
        let back = FrictionImpactLaw::from_xml_str(&law.to_xml_string().unwrap()).unwrap();
        assert_eq!(back.type_name(), "PlanarStribeckImpact");
        assert_eq!(back.friction_coefficient(0.25), law.friction_coefficient(0.25));

        let back = FrictionImpactLaw::from_xml_str(
            "<SpatialCoulombImpact><frictionCoefficient>-1</frictionCoefficient></SpatialCoulombImpact>",
        );
        assert!(back.unwrap_err().is_config_error());
    }
}
