//! Tangential friction laws on the acceleration level.
//!
//! Friction forces are vectors with one (planar) or two (spatial) tangential
//! components. The admissible set is the interval `[-μ|λ_N|, μ|λ_N|]` or the
//! disc of radius `μ|λ_N|`, so every operation taking `la_n` needs the normal
//! force of the same contact. Within one outer iteration the normal law of a
//! contact must therefore be solved before its friction law.

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::error::{ForceLawError, Result};
use crate::function::{FrictionCoefficientFunction, FrictionForceFunction, nested_coefficient_function};
use crate::prox::{prox_disc, prox_interval, sign};
use crate::xml::{XmlConfig, XmlElement};

/// Bisection limit of the sliding multiplier search; enough to reach
/// adjacent floating point values from any bracket.
const SLIDING_MAX_BISECTIONS: usize = 2100;
/// Bracket doublings before the sliding solve gives up on an indefinite `G`.
const SLIDING_MAX_EXPANSIONS: usize = 64;

/// Tangential force law of a contact.
#[derive(Debug)]
pub enum FrictionForceLaw {
    /// Coulomb friction in one tangential direction.
    PlanarCoulomb {
        /// Friction coefficient.
        mu: f64,
    },
    /// Coulomb friction in two tangential directions.
    SpatialCoulomb {
        /// Friction coefficient.
        mu: f64,
    },
    /// Velocity dependent friction in one tangential direction.
    PlanarStribeck {
        /// Friction coefficient as a function of the slip speed.
        fmu: FrictionCoefficientFunction,
    },
    /// Velocity dependent friction in two tangential directions.
    SpatialStribeck {
        /// Friction coefficient as a function of the slip speed.
        fmu: FrictionCoefficientFunction,
    },
    /// Smooth friction in one tangential direction.
    RegularizedPlanar {
        /// Force function `(gd, λ_N) -> λ_T`.
        force_function: Option<FrictionForceFunction>,
    },
    /// Smooth friction in two tangential directions.
    RegularizedSpatial {
        /// Force function `(gd, λ_N) -> λ_T`.
        force_function: Option<FrictionForceFunction>,
    },
}

impl FrictionForceLaw {
    /// Name of the law as used in configuration files.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PlanarCoulomb { .. } => "PlanarCoulombFriction",
            Self::SpatialCoulomb { .. } => "SpatialCoulombFriction",
            Self::PlanarStribeck { .. } => "PlanarStribeckFriction",
            Self::SpatialStribeck { .. } => "SpatialStribeckFriction",
            Self::RegularizedPlanar { .. } => "RegularizedPlanarFriction",
            Self::RegularizedSpatial { .. } => "RegularizedSpatialFriction",
        }
    }

    /// Number of tangential directions (1 or 2).
    #[must_use]
    pub fn friction_directions(&self) -> usize {
        match self {
            Self::PlanarCoulomb { .. } | Self::PlanarStribeck { .. } | Self::RegularizedPlanar { .. } => 1,
            Self::SpatialCoulomb { .. } | Self::SpatialStribeck { .. } | Self::RegularizedSpatial { .. } => 2,
        }
    }

    /// Whether the law is set-valued and therefore solved by projection.
    #[must_use]
    pub fn is_set_valued(&self) -> bool {
        !matches!(self, Self::RegularizedPlanar { .. } | Self::RegularizedSpatial { .. })
    }

    /// Whether the contact sticks, i.e. the slip `s` is within `s_tol`.
    #[must_use]
    pub fn is_sticking(&self, s: &DVector<f64>, s_tol: f64) -> bool {
        s.norm() <= s_tol
    }

    /// Friction coefficient at slip speed `gd`.
    ///
    /// Regularized laws report the coefficient of their built-in force
    /// function and `0` for custom closures.
    #[must_use]
    pub fn friction_coefficient(&self, gd: f64) -> f64 {
        match self {
            Self::PlanarCoulomb { mu } | Self::SpatialCoulomb { mu } => *mu,
            Self::PlanarStribeck { fmu } | Self::SpatialStribeck { fmu } => fmu.evaluate(gd),
            Self::RegularizedPlanar { force_function } | Self::RegularizedSpatial { force_function } => {
                match force_function {
                    Some(FrictionForceFunction::LinearRegularizedCoulomb { mu, .. }) => *mu,
                    Some(FrictionForceFunction::LinearRegularizedStribeck { fmu, .. }) => fmu.evaluate(gd),
                    _ => 0.0,
                }
            }
        }
    }

    /// Set a constant friction coefficient.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] for a negative coefficient or
    /// a law without a constant coefficient.
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

    /// Attach the force function of a regularized law.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] for set-valued laws.
    pub fn set_force_function(&mut self, function: FrictionForceFunction) -> Result<()> {
        match self {
            Self::RegularizedPlanar { force_function } | Self::RegularizedSpatial { force_function } => {
                *force_function = Some(function);
                Ok(())
            }
            _ => Err(ForceLawError::invalid_config(format!(
                "{} does not take a force function",
                self.type_name()
            ))),
        }
    }

    /// Coefficient bounding the cone on the acceleration level.
    ///
    /// The tangential argument is an acceleration here, so Stribeck laws use
    /// the static value `fmu(0)`.
    fn cone_coefficient(&self) -> f64 {
        match self {
            Self::PlanarCoulomb { mu } | Self::SpatialCoulomb { mu } => *mu,
            Self::PlanarStribeck { fmu } | Self::SpatialStribeck { fmu } => fmu.evaluate(0.0),
            Self::RegularizedPlanar { .. } | Self::RegularizedSpatial { .. } => 0.0,
        }
    }

    /// One proximal fixed-point step `λ_T' = prox_C(λ_T - r·gdn)` with the
    /// cone radius `μ|la_n|`.
    ///
    /// `la_n` is the current normal force of the same contact. Returns a zero
    /// vector for regularized laws.
    #[must_use]
    pub fn project(&self, la: &DVector<f64>, gdn: &DVector<f64>, la_n: f64, r: f64) -> DVector<f64> {
        if !self.is_set_valued() {
            return DVector::zeros(la.len());
        }
        let bound = self.cone_coefficient() * la_n.abs();
        if self.friction_directions() == 1 {
            DVector::from_element(1, prox_interval(la[0] - r * gdn[0], bound))
        } else {
            prox_disc(&(la - gdn * r), bound)
        }
    }

    /// Jacobian of [`project`](Self::project): an `n × (2n + 1)` matrix with
    /// the blocks `∂/∂λ_T`, `∂/∂gdn` and `∂/∂λ_N`.
    ///
    /// `la_n` is the current normal force of the same contact.
    #[must_use]
    pub fn diff(&self, la: &DVector<f64>, gdn: &DVector<f64>, la_n: f64, r: f64) -> DMatrix<f64> {
        let n = self.friction_directions();
        if !self.is_set_valued() {
            return DMatrix::zeros(n, 2 * n + 1);
        }
        let mu = self.cone_coefficient();
        cone_projection_jacobian(&(la - gdn * r), mu, la_n, r)
    }

    /// Solve the single-contact friction problem `gdn + G·λ_T` directly.
    ///
    /// `la_n` is the current normal force of the same contact. Returns a
    /// zero vector for regularized laws.
    #[must_use]
    pub fn solve(&self, g_matrix: &DMatrix<f64>, gdn: &DVector<f64>, la_n: f64) -> DVector<f64> {
        if !self.is_set_valued() {
            return DVector::zeros(gdn.len());
        }
        let bound = self.cone_coefficient() * la_n.abs();
        solve_in_cone(g_matrix, gdn, bound)
    }

    /// Check the friction complementarity condition within tolerances.
    ///
    /// `la_n` is the current normal force of the same contact. Always `true`
    /// for regularized laws.
    #[must_use]
    pub fn is_fulfilled(&self, la: &DVector<f64>, gdn: &DVector<f64>, la_n: f64, tol_la: f64, tol_gd: f64) -> bool {
        if !self.is_set_valued() {
            return true;
        }
        cone_fulfilled(la, gdn, self.cone_coefficient() * la_n.abs(), tol_la, tol_gd)
    }

    /// Sensitivity `∂λ_T/∂λ_N` of the sliding force for slip velocity `gd`.
    #[must_use]
    pub fn dla_t_dla_n(&self, gd: &DVector<f64>) -> DVector<f64> {
        let speed = gd.norm();
        if speed == 0.0 {
            return DVector::zeros(gd.len());
        }
        gd * (-self.friction_coefficient(speed) / speed)
    }

    /// Evaluate the force function of a regularized law.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::MissingForceFunction`] if the law has no force
    /// function attached.
    pub fn evaluate(&self, gd: &DVector<f64>, la_n: f64) -> Result<DVector<f64>> {
        match self {
            Self::RegularizedPlanar {
                force_function: Some(f),
            }
            | Self::RegularizedSpatial {
                force_function: Some(f),
            } => Ok(f.evaluate(gd, la_n)),
            _ => Err(ForceLawError::MissingForceFunction {
                law: self.type_name(),
            }),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::PlanarCoulomb { mu } | Self::SpatialCoulomb { mu } if !mu.is_finite() || *mu < 0.0 => Err(
                ForceLawError::invalid_config("friction coefficient must be finite and non-negative"),
            ),
            Self::PlanarStribeck { fmu } | Self::SpatialStribeck { fmu } => fmu.validate(),
            Self::RegularizedPlanar { force_function } | Self::RegularizedSpatial { force_function } => {
                force_function.as_ref().map_or(Ok(()), FrictionForceFunction::validate)
            }
            _ => Ok(()),
        }
    }
}

/// Jacobian of `prox_C(arg)` for the cone of radius `mu·|la_n|`, with
/// `arg = λ_T - r·gdn`. Layout `[∂/∂λ_T | ∂/∂gdn | ∂/∂λ_N]`.
pub(crate) fn cone_projection_jacobian(arg: &DVector<f64>, mu: f64, la_n: f64, r: f64) -> DMatrix<f64> {
    let n = arg.len();
    let bound = mu * la_n.abs();
    let norm = arg.norm();
    let mut d = DMatrix::zeros(n, 2 * n + 1);

    if norm <= bound {
        for i in 0..n {
            d[(i, i)] = 1.0;
            d[(i, n + i)] = -r;
        }
        return d;
    }

    let direction = arg / norm;
    // d(bound·a/‖a‖)/da = bound/‖a‖·(I - â·âᵀ)
    let d_darg = (DMatrix::identity(n, n) - &direction * direction.transpose()) * (bound / norm);
    d.view_mut((0, 0), (n, n)).copy_from(&d_darg);
    d.view_mut((0, n), (n, n)).copy_from(&(d_darg * -r));
    d.view_mut((0, 2 * n), (n, 1))
        .copy_from(&(direction * (mu * sign(la_n))));
    d
}

/// Solve `min ½λᵀGλ + λᵀgd` over the cone of radius `bound`.
pub(crate) fn solve_in_cone(g_matrix: &DMatrix<f64>, gd: &DVector<f64>, bound: f64) -> DVector<f64> {
    if gd.len() == 1 {
        return DVector::from_element(1, prox_interval(-gd[0] / g_matrix[(0, 0)], bound));
    }

    // A singular G has no unique sticking force, so only the boundary is tried.
    let stick = match g_matrix.clone().lu().solve(&(-gd)) {
        Some(stick) if stick.norm() <= bound => return stick,
        Some(stick) => stick,
        None => -gd,
    };

    // On the boundary λ = -(G + νI)⁻¹·gd for the multiplier ν ≥ 0 with
    // ‖λ‖ = bound. ‖λ(ν)‖ decreases in ν and is at most ‖gd‖/ν for a
    // positive semi-definite G, which brackets the root.
    if bound <= 0.0 {
        return DVector::zeros(gd.len());
    }
    let at = |nu: f64| {
        let shifted = g_matrix + DMatrix::identity(gd.len(), gd.len()) * nu;
        shifted.lu().solve(&(-gd))
    };
    let mut lower = 0.0;
    let mut upper = gd.norm() / bound;
    let mut expansions = 0;
    while at(upper).is_none_or(|la| la.norm() > bound) {
        if expansions == SLIDING_MAX_EXPANSIONS {
            warn!(bound, "sliding multiplier not bracketed, projecting the stick solution");
            return prox_disc(&stick, bound);
        }
        lower = upper;
        upper *= 2.0;
        expansions += 1;
    }
    for _ in 0..SLIDING_MAX_BISECTIONS {
        let middle = 0.5 * (lower + upper);
        if middle <= lower || middle >= upper {
            break;
        }
        match at(middle) {
            Some(la) if la.norm() <= bound => upper = middle,
            _ => lower = middle,
        }
    }
    at(upper).map_or_else(|| prox_disc(&stick, bound), |la| prox_disc(&la, bound))
}

/// Friction complementarity check for the cone of radius `bound`.
///
/// Either the contact slides and the force lies on the cone boundary opposite
/// to the slip, or it sticks inside the cone.
pub(crate) fn cone_fulfilled(la: &DVector<f64>, gdn: &DVector<f64>, bound: f64, tol_la: f64, tol_gd: f64) -> bool {
    let speed = gdn.norm();
    let sliding_direction = if speed > 0.0 {
        gdn / speed
    } else {
        DVector::zeros(gdn.len())
    };
    if (la + sliding_direction * bound).norm() <= tol_la {
        return true;
    }
    la.norm() <= bound + tol_la && speed <= tol_gd
}

pub(crate) fn coulomb_to_xml(name: &str, mu: f64) -> XmlElement {
    XmlElement::new(name).with_child(XmlElement::leaf("frictionCoefficient", mu))
}

pub(crate) fn stribeck_to_xml(name: &str, fmu: &FrictionCoefficientFunction) -> Result<XmlElement> {
    Ok(XmlElement::new(name).with_child(XmlElement::new("frictionFunction").with_child(fmu.to_xml()?)))
}

impl XmlConfig for FrictionForceLaw {
    fn to_xml(&self) -> Result<XmlElement> {
        match self {
            Self::PlanarCoulomb { mu } | Self::SpatialCoulomb { mu } => Ok(coulomb_to_xml(self.type_name(), *mu)),
            Self::PlanarStribeck { fmu } | Self::SpatialStribeck { fmu } => stribeck_to_xml(self.type_name(), fmu),
            Self::RegularizedPlanar { force_function } | Self::RegularizedSpatial { force_function } => {
                let mut element = XmlElement::new(self.type_name());
                if let Some(function) = force_function {
                    element.push(XmlElement::new("frictionForceFunction").with_child(function.to_xml()?));
                }
                Ok(element)
            }
        }
    }

    fn from_xml(element: &XmlElement) -> Result<Self> {
        let force_function = || -> Result<Option<FrictionForceFunction>> {
            element
                .child("frictionForceFunction")
                .map(|wrapper| {
                    wrapper
                        .first_child()
                        .ok_or_else(|| ForceLawError::missing_element("function", "frictionForceFunction"))
                        .and_then(FrictionForceFunction::from_xml)
                })
                .transpose()
        };
        let law = match element.name.as_str() {
            "PlanarCoulombFriction" => Self::PlanarCoulomb {
                mu: element.f64_child("frictionCoefficient")?,
            },
            "SpatialCoulombFriction" => Self::SpatialCoulomb {
                mu: element.f64_child("frictionCoefficient")?,
            },
            "PlanarStribeckFriction" => Self::PlanarStribeck {
                fmu: nested_coefficient_function(element)?,
            },
            "SpatialStribeckFriction" => Self::SpatialStribeck {
                fmu: nested_coefficient_function(element)?,
            },
            "RegularizedPlanarFriction" => Self::RegularizedPlanar {
                force_function: force_function()?,
            },
            "RegularizedSpatialFriction" => Self::RegularizedSpatial {
                force_function: force_function()?,
            },
            other => {
                return Err(ForceLawError::UnknownElement {
                    name: other.to_string(),
                    context: "friction force law",
                });
            }
        };
        law.validate()?;
        Ok(law)
    }
}
