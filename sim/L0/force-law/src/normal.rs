//! Normal force laws on the acceleration level.
//!
//! A [`GeneralizedForceLaw`] decides the normal contact force `λ` of a single
//! contact from its gap `g` and relative acceleration `gdn`. Set-valued laws
//! (rigid bilateral and unilateral constraints) are handled by the outer
//! solver through the proximal fixed-point step [`project`] or the direct
//! [`solve`]; single-valued laws (regularized penalty laws and the Maxwell
//! multi-contact law) write their forces directly through
//! [`compute_smooth_forces`].
//!
//! [`project`]: GeneralizedForceLaw::project
//! [`solve`]: GeneralizedForceLaw::solve
//! [`compute_smooth_forces`]: GeneralizedForceLaw::compute_smooth_forces

use tracing::debug;

use crate::contact::SingleContact;
use crate::error::{ForceLawError, Result};
use crate::function::NormalForceFunction;
use crate::maxwell::{MaxwellOutcome, MaxwellUnilateralConstraint};
use crate::prox::prox_normal;
use crate::xml::{XmlConfig, XmlElement};

/// Normal-direction force law of a contact or joint.
#[derive(Debug)]
pub enum GeneralizedForceLaw {
    /// Rigid bilateral constraint `g = 0`; the force is unbounded in sign.
    Bilateral,
    /// Rigid unilateral constraint `0 ≤ λ ⟂ g ≥ 0`.
    Unilateral,
    /// Penalty law acting in both directions.
    RegularizedBilateral {
        /// Force function `(g, gd) -> λ`.
        force_function: Option<NormalForceFunction>,
    },
    /// Penalty law that only pushes.
    RegularizedUnilateral {
        /// Force function `(g, gd) -> λ`.
        force_function: Option<NormalForceFunction>,
    },
    /// Unilateral contacts elastically coupled through influence functions
    /// and solved jointly as a linear complementarity problem.
    MaxwellUnilateral(Box<MaxwellUnilateralConstraint>),
}

impl GeneralizedForceLaw {
    /// Regularized bilateral law with the given force function.
    #[must_use]
    pub fn regularized_bilateral(force_function: NormalForceFunction) -> Self {
        Self::RegularizedBilateral {
            force_function: Some(force_function),
        }
    }

    /// Regularized unilateral law with the given force function.
    #[must_use]
    pub fn regularized_unilateral(force_function: NormalForceFunction) -> Self {
        Self::RegularizedUnilateral {
            force_function: Some(force_function),
        }
    }

    /// Maxwell multi-contact law.
    #[must_use]
    pub fn maxwell(law: MaxwellUnilateralConstraint) -> Self {
        Self::MaxwellUnilateral(Box::new(law))
    }

    /// Name of the law as used in configuration files.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bilateral => "BilateralConstraint",
            Self::Unilateral => "UnilateralConstraint",
            Self::RegularizedBilateral { .. } => "RegularizedBilateralConstraint",
            Self::RegularizedUnilateral { .. } => "RegularizedUnilateralConstraint",
            Self::MaxwellUnilateral(_) => "MaxwellUnilateralConstraint",
        }
    }

    /// Whether the contact with gap `g` is active. The boundary `g == g_tol`
    /// counts as active.
    #[must_use]
    pub fn is_active(&self, g: f64, g_tol: f64) -> bool {
        match self {
            Self::Bilateral | Self::RegularizedBilateral { .. } => true,
            Self::Unilateral | Self::RegularizedUnilateral { .. } | Self::MaxwellUnilateral(_) => {
                g <= g_tol
            }
        }
    }

    /// Whether an active contact with gap velocity `gd` stays closed.
    #[must_use]
    pub fn remains_active(&self, gd: f64, gd_tol: f64) -> bool {
        match self {
            Self::Bilateral | Self::RegularizedBilateral { .. } | Self::MaxwellUnilateral(_) => true,
            Self::Unilateral | Self::RegularizedUnilateral { .. } => gd <= gd_tol,
        }
    }

    /// Whether the law is set-valued and therefore solved by projection.
    #[must_use]
    pub fn is_set_valued(&self) -> bool {
        matches!(self, Self::Bilateral | Self::Unilateral)
    }

    /// One proximal fixed-point step `λ' = prox(λ - r·gdn)`.
    ///
    /// Returns `0` for laws that are not set-valued.
    #[must_use]
    pub fn project(&self, la: f64, gdn: f64, r: f64, la_min: f64) -> f64 {
        match self {
            Self::Bilateral => la - r * gdn,
            Self::Unilateral => prox_normal(la - r * gdn, la_min),
            _ => 0.0,
        }
    }

    /// Partial derivatives `[∂λ'/∂λ, ∂λ'/∂gdn]` of [`project`](Self::project).
    #[must_use]
    pub fn diff(&self, la: f64, gdn: f64, r: f64, la_min: f64) -> [f64; 2] {
        match self {
            Self::Bilateral => [1.0, -r],
            Self::Unilateral => {
                if la - r * gdn < la_min {
                    [0.0, 0.0]
                } else {
                    [1.0, -r]
                }
            }
            _ => [0.0, 0.0],
        }
    }

    /// Solve the single-contact problem `gdn + G·λ` directly for the
    /// Delassus scalar `g_matrix`.
    ///
    /// Returns `0` for laws that are not set-valued.
    #[must_use]
    pub fn solve(&self, g_matrix: f64, gdn: f64) -> f64 {
        match self {
            Self::Bilateral => -gdn / g_matrix,
            Self::Unilateral => {
                if gdn >= 0.0 {
                    0.0
                } else {
                    (-gdn / g_matrix).max(0.0)
                }
            }
            _ => 0.0,
        }
    }

    /// Check the complementarity condition within tolerances.
    ///
    /// Always `true` for laws that are not set-valued.
    #[must_use]
    pub fn is_fulfilled(&self, la: f64, gdn: f64, tol_la: f64, tol_gd: f64, la_min: f64) -> bool {
        match self {
            Self::Bilateral => gdn.abs() <= tol_gd,
            Self::Unilateral => unilateral_fulfilled(la, gdn, tol_la, tol_gd, la_min),
            _ => true,
        }
    }

    /// The smooth force function of a regularized law, if one is attached.
    #[must_use]
    pub fn force_function(&self) -> Option<&NormalForceFunction> {
        match self {
            Self::RegularizedBilateral { force_function }
            | Self::RegularizedUnilateral { force_function } => force_function.as_ref(),
            _ => None,
        }
    }

    /// Attach the smooth force function of a regularized law.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] for laws that do not take a
    /// force function.
    pub fn set_force_function(&mut self, function: NormalForceFunction) -> Result<()> {
        match self {
            Self::RegularizedBilateral { force_function }
            | Self::RegularizedUnilateral { force_function } => {
                *force_function = Some(function);
                Ok(())
            }
            _ => Err(ForceLawError::invalid_config(format!(
                "{} does not take a force function",
                self.type_name()
            ))),
        }
    }

    /// Evaluate the smooth force function at `(g, gd)`.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::MissingForceFunction`] if the law has no force
    /// function attached.
    pub fn evaluate(&self, g: f64, gd: f64) -> Result<f64> {
        self.force_function()
            .map(|f| f.evaluate(g, gd))
            .ok_or(ForceLawError::MissingForceFunction {
                law: self.type_name(),
            })
    }

    /// Write the forces of a single-valued law into a batch of contacts.
    ///
    /// Regularized laws evaluate their force function on every contact. The
    /// Maxwell law solves all contacts jointly.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::MissingForceFunction`] for set-valued laws and
    /// regularized laws without a force function, and propagates Maxwell
    /// solver failures.
    pub fn compute_smooth_forces(&mut self, contacts: &mut [Vec<SingleContact>]) -> Result<()> {
        if let Self::MaxwellUnilateral(law) = self {
            if law.compute_smooth_forces(contacts)? == MaxwellOutcome::NoPossibleContacts {
                debug!("Maxwell law found no possible contacts");
            }
            return Ok(());
        }

        let law = self.type_name();
        let function = self
            .force_function()
            .ok_or(ForceLawError::MissingForceFunction { law })?;
        for contact in contacts.iter_mut().flatten() {
            contact.la = function.evaluate(contact.g, contact.gd);
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Bilateral | Self::Unilateral => Ok(()),
            Self::RegularizedBilateral { force_function }
            | Self::RegularizedUnilateral { force_function } => {
                force_function.as_ref().map_or(Ok(()), NormalForceFunction::validate)
            }
            Self::MaxwellUnilateral(law) => law.validate(),
        }
    }
}

/// Unilateral complementarity check shared by the normal and impact laws.
pub(crate) fn unilateral_fulfilled(la: f64, gdn: f64, tol_la: f64, tol_gd: f64, la_min: f64) -> bool {
    (gdn >= -tol_gd && (la - la_min).abs() <= tol_la) || (la - la_min >= -tol_la && gdn.abs() <= tol_gd)
}

impl XmlConfig for GeneralizedForceLaw {
    fn to_xml(&self) -> Result<XmlElement> {
        match self {
            Self::Bilateral | Self::Unilateral => Ok(XmlElement::new(self.type_name())),
            Self::RegularizedBilateral { force_function }
            | Self::RegularizedUnilateral { force_function } => {
                let mut element = XmlElement::new(self.type_name());
                if let Some(function) = force_function {
                    element.push(XmlElement::new("forceFunction").with_child(function.to_xml()?));
                }
                Ok(element)
            }
            Self::MaxwellUnilateral(law) => law.to_xml(),
        }
    }

    fn from_xml(element: &XmlElement) -> Result<Self> {
        let force_function = || -> Result<Option<NormalForceFunction>> {
            element
                .child("forceFunction")
                .map(|wrapper| {
                    wrapper
                        .first_child()
                        .ok_or_else(|| ForceLawError::missing_element("function", "forceFunction"))
                        .and_then(NormalForceFunction::from_xml)
                })
                .transpose()
        };
        match element.name.as_str() {
            "BilateralConstraint" => Ok(Self::Bilateral),
            "UnilateralConstraint" => Ok(Self::Unilateral),
            "RegularizedBilateralConstraint" => Ok(Self::RegularizedBilateral {
                force_function: force_function()?,
            }),
            "RegularizedUnilateralConstraint" => Ok(Self::RegularizedUnilateral {
                force_function: force_function()?,
            }),
            "MaxwellUnilateralConstraint" => Ok(Self::maxwell(MaxwellUnilateralConstraint::from_xml(element)?)),
            other => Err(ForceLawError::UnknownElement {
                name: other.to_string(),
                context: "generalized force law",
            }),
        }
    }
}
