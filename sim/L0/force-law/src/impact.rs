//! Normal impact laws on the velocity level.
//!
//! During an impact the outer solver works with impulses instead of forces.
//! `gda` is the relative normal velocity before the impact and `gdn` the
//! current estimate of the velocity after it.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ForceLawError, Result};
use crate::normal::unilateral_fulfilled;
use crate::prox::prox_normal;
use crate::xml::{XmlConfig, XmlElement};

/// Default velocity below which restitution is faded out.
pub const DEFAULT_GD_LIMIT: f64 = 1e-2;

/// Newton's restitution law for a unilateral contact.
///
/// The impact is resolved such that `gdn = -ε_eff·gda`. The effective
/// coefficient `ε_eff = ε·w(gda)` equals `ε` for approach velocities faster
/// than `gd_limit` and fades to zero with a C¹ cubic blend for slower ones,
/// so resting contacts do not chatter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnilateralNewtonImpact {
    /// Restitution coefficient `ε` in `[0, 1]`.
    pub epsilon: f64,
    /// Approach speed above which the full coefficient applies.
    pub gd_limit: f64,
}

impl Default for UnilateralNewtonImpact {
    fn default() -> Self {
        Self {
            epsilon: 0.0,
            gd_limit: DEFAULT_GD_LIMIT,
        }
    }
}

impl UnilateralNewtonImpact {
    /// Create a law with the given restitution coefficient and the default
    /// velocity limit.
    #[must_use]
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            ..Self::default()
        }
    }

    /// Set the velocity limit.
    #[must_use]
    pub fn with_gd_limit(mut self, gd_limit: f64) -> Self {
        self.gd_limit = gd_limit;
        self
    }

    /// Blend weight `w(gda)` in `[0, 1]`.
    #[must_use]
    pub fn restitution_weight(&self, gda: f64) -> f64 {
        let x = (-gda / self.gd_limit).clamp(0.0, 1.0);
        x * x * (3.0 - 2.0 * x)
    }

    /// Effective restitution coefficient `ε·w(gda)`.
    #[must_use]
    pub fn effective_restitution(&self, gda: f64) -> f64 {
        self.epsilon * self.restitution_weight(gda)
    }

    /// Elastic part `ε_eff·gda` of the target velocity.
    #[must_use]
    pub fn elastic_velocity(&self, gda: f64) -> f64 {
        self.effective_restitution(gda) * gda
    }

    /// Derivative of [`elastic_velocity`](Self::elastic_velocity) with respect to `gda`.
    fn elastic_velocity_slope(&self, gda: f64) -> f64 {
        let x = -gda / self.gd_limit;
        if x <= 0.0 {
            0.0
        } else if x >= 1.0 {
            self.epsilon
        } else {
            // d(w·gda)/dgda = w + gda·w'(x)·(-1/gd_limit) = w + 6x²(1 - x)
            self.epsilon * (x * x * (3.0 - 2.0 * x) + 6.0 * x * x * (1.0 - x))
        }
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(ForceLawError::invalid_config(format!(
                "restitution coefficient must lie in [0, 1], got {}",
                self.epsilon
            )));
        }
        if !self.gd_limit.is_finite() || self.gd_limit <= 0.0 {
            return Err(ForceLawError::invalid_config(
                "restitution velocity limit must be positive",
            ));
        }
        Ok(())
    }
}

/// Normal-direction impact law.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GeneralizedImpactLaw {
    /// Bilateral impact: the post-impact velocity vanishes.
    Bilateral,
    /// Unilateral impact with Newton restitution.
    UnilateralNewton(UnilateralNewtonImpact),
}

impl GeneralizedImpactLaw {
    /// Name of the law as used in configuration files.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bilateral => "BilateralImpact",
            Self::UnilateralNewton(_) => "UnilateralNewtonImpact",
        }
    }

    /// Target post-impact velocity residual `gdn + ε_eff·gda`.
    fn residual(&self, gdn: f64, gda: f64) -> f64 {
        match self {
            Self::Bilateral => gdn,
            Self::UnilateralNewton(law) => gdn + law.elastic_velocity(gda),
        }
    }

    /// One proximal fixed-point step on the impulse.
    #[must_use]
    pub fn project(&self, la: f64, gdn: f64, gda: f64, r: f64, la_min: f64) -> f64 {
        let arg = la - r * self.residual(gdn, gda);
        match self {
            Self::Bilateral => arg,
            Self::UnilateralNewton(_) => prox_normal(arg, la_min),
        }
    }

    /// Partial derivatives `[∂λ'/∂λ, ∂λ'/∂gdn, ∂λ'/∂gda]` of
    /// [`project`](Self::project).
    #[must_use]
    pub fn diff(&self, la: f64, gdn: f64, gda: f64, r: f64, la_min: f64) -> [f64; 3] {
        match self {
            Self::Bilateral => [1.0, -r, 0.0],
            Self::UnilateralNewton(law) => {
                if la - r * self.residual(gdn, gda) < la_min {
                    [0.0, 0.0, 0.0]
                } else {
                    [1.0, -r, -r * law.elastic_velocity_slope(gda)]
                }
            }
        }
    }

    /// Solve the single-contact impact directly for the Delassus scalar `g_matrix`.
    #[must_use]
    pub fn solve(&self, g_matrix: f64, gdn: f64, gda: f64) -> f64 {
        let la = -self.residual(gdn, gda) / g_matrix;
        match self {
            Self::Bilateral => la,
            Self::UnilateralNewton(_) => la.max(0.0),
        }
    }

    /// Check the impact complementarity condition within tolerances.
    #[must_use]
    pub fn is_fulfilled(&self, la: f64, gdn: f64, gda: f64, tol_la: f64, tol_gd: f64, la_min: f64) -> bool {
        let residual = self.residual(gdn, gda);
        match self {
            Self::Bilateral => residual.abs() <= tol_gd,
            Self::UnilateralNewton(_) => unilateral_fulfilled(la, residual, tol_la, tol_gd, la_min),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Bilateral => Ok(()),
            Self::UnilateralNewton(law) => law.validate(),
        }
    }
}

impl XmlConfig for GeneralizedImpactLaw {
    fn to_xml(&self) -> Result<XmlElement> {
        Ok(match self {
            Self::Bilateral => XmlElement::new(self.type_name()),
            Self::UnilateralNewton(law) => XmlElement::new(self.type_name())
                .with_child(XmlElement::leaf("restitutionCoefficient", law.epsilon))
                .with_child(XmlElement::leaf("marginalVelocity", law.gd_limit)),
        })
    }

    fn from_xml(element: &XmlElement) -> Result<Self> {
        let law = match element.name.as_str() {
            "BilateralImpact" => Self::Bilateral,
            "UnilateralNewtonImpact" => {
                let mut law = UnilateralNewtonImpact::new(element.f64_child("restitutionCoefficient")?);
                if let Some(gd_limit) = element.opt_f64_child("marginalVelocity")? {
                    law.gd_limit = gd_limit;
                }
                Self::UnilateralNewton(law)
            }
            other => {
                return Err(ForceLawError::UnknownElement {
                    name: other.to_string(),
                    context: "generalized impact law",
                });
            }
        };
        law.validate()?;
        Ok(law)
    }
}
