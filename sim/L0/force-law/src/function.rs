//! Smooth functions supplied by the model author.
//!
//! Regularized laws evaluate a force function directly instead of projecting a
//! multiplier, Stribeck laws look up a velocity-dependent friction coefficient
//! and the Maxwell contact couples contact points through influence functions.
//! Each family is a closed set of built-in variants, which can be written to
//! and read from XML, plus a `Custom` variant owning an arbitrary closure.

use std::fmt;

use nalgebra::{DVector, Vector2};

use crate::error::{ForceLawError, Result};
use crate::xml::{XmlConfig, XmlElement};

/// Closure type for custom normal force functions `(g, gd) -> force`.
pub type NormalForceFn = dyn Fn(f64, f64) -> f64 + Send + Sync;
/// Closure type for custom friction force functions `(gd, laN) -> force`.
pub type FrictionForceFn = dyn Fn(&DVector<f64>, f64) -> DVector<f64> + Send + Sync;
/// Closure type for custom friction coefficient functions `gd -> μ`.
pub type FrictionCoefficientFn = dyn Fn(f64) -> f64 + Send + Sync;
/// Closure type for custom influence functions `(ζ₁, ζ₂) -> coefficient`.
pub type InfluenceFn = dyn Fn(&Vector2<f64>, &Vector2<f64>) -> f64 + Send + Sync;

/// Force function `(g, gd) -> λ` of a regularized normal law.
pub enum NormalForceFunction {
    /// Penalty spring-damper that only pushes: zero for `g > 0`, damping
    /// only while approaching.
    LinearRegularizedUnilateral {
        /// Stiffness `c`.
        stiffness: f64,
        /// Damping `d`.
        damping: f64,
    },
    /// Penalty spring-damper acting in both directions: `-c·g - d·gd`.
    LinearRegularizedBilateral {
        /// Stiffness `c`.
        stiffness: f64,
        /// Damping `d`.
        damping: f64,
    },
    /// Spring-damper with unloaded length: `c·(g - l0) + d·gd`.
    LinearSpringDamper {
        /// Stiffness `c`.
        stiffness: f64,
        /// Damping `d`.
        damping: f64,
        /// Unloaded length `l0`.
        unloaded_length: f64,
    },
    /// Arbitrary closure.
    Custom(Box<NormalForceFn>),
}

impl NormalForceFunction {
    /// Wrap a closure.
    #[must_use]
    pub fn custom(f: impl Fn(f64, f64) -> f64 + Send + Sync + 'static) -> Self {
        Self::Custom(Box::new(f))
    }

    /// Evaluate the force for gap `g` and gap velocity `gd`.
    #[must_use]
    pub fn evaluate(&self, g: f64, gd: f64) -> f64 {
        match self {
            Self::LinearRegularizedUnilateral { stiffness, damping } => {
                if g > 0.0 {
                    0.0
                } else if gd < 0.0 {
                    -stiffness * g - damping * gd
                } else {
                    -stiffness * g
                }
            }
            Self::LinearRegularizedBilateral { stiffness, damping } => -stiffness * g - damping * gd,
            Self::LinearSpringDamper {
                stiffness,
                damping,
                unloaded_length,
            } => stiffness * (g - unloaded_length) + damping * gd,
            Self::Custom(f) => f(g, gd),
        }
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::LinearRegularizedUnilateral { stiffness, damping }
            | Self::LinearRegularizedBilateral { stiffness, damping }
            | Self::LinearSpringDamper {
                stiffness, damping, ..
            } => {
                if !stiffness.is_finite() || *stiffness < 0.0 {
                    return Err(ForceLawError::invalid_config(
                        "stiffness must be finite and non-negative",
                    ));
                }
                if !damping.is_finite() || *damping < 0.0 {
                    return Err(ForceLawError::invalid_config(
                        "damping must be finite and non-negative",
                    ));
                }
                Ok(())
            }
            Self::Custom(_) => Ok(()),
        }
    }
}

impl fmt::Debug for NormalForceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinearRegularizedUnilateral { stiffness, damping } => f
                .debug_struct("LinearRegularizedUnilateral")
                .field("stiffness", stiffness)
                .field("damping", damping)
                .finish(),
            Self::LinearRegularizedBilateral { stiffness, damping } => f
                .debug_struct("LinearRegularizedBilateral")
                .field("stiffness", stiffness)
                .field("damping", damping)
                .finish(),
            Self::LinearSpringDamper {
                stiffness,
                damping,
                unloaded_length,
            } => f
                .debug_struct("LinearSpringDamper")
                .field("stiffness", stiffness)
                .field("damping", damping)
                .field("unloaded_length", unloaded_length)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl XmlConfig for NormalForceFunction {
    fn to_xml(&self) -> Result<XmlElement> {
        Ok(match self {
            Self::LinearRegularizedUnilateral { stiffness, damping } => {
                XmlElement::new("LinearRegularizedUnilateralConstraint")
                    .with_child(XmlElement::leaf("stiffnessCoefficient", stiffness))
                    .with_child(XmlElement::leaf("dampingCoefficient", damping))
            }
            Self::LinearRegularizedBilateral { stiffness, damping } => {
                XmlElement::new("LinearRegularizedBilateralConstraint")
                    .with_child(XmlElement::leaf("stiffnessCoefficient", stiffness))
                    .with_child(XmlElement::leaf("dampingCoefficient", damping))
            }
            Self::LinearSpringDamper {
                stiffness,
                damping,
                unloaded_length,
            } => XmlElement::new("LinearSpringDamperForce")
                .with_child(XmlElement::leaf("stiffnessCoefficient", stiffness))
                .with_child(XmlElement::leaf("dampingCoefficient", damping))
                .with_child(XmlElement::leaf("unloadedLength", unloaded_length)),
            Self::Custom(_) => {
                return Err(ForceLawError::Unserializable {
                    what: "normal force function",
                });
            }
        })
    }

    fn from_xml(element: &XmlElement) -> Result<Self> {
        let function = match element.name.as_str() {
            "LinearRegularizedUnilateralConstraint" => Self::LinearRegularizedUnilateral {
                stiffness: element.f64_child("stiffnessCoefficient")?,
                damping: element.f64_child("dampingCoefficient")?,
            },
            "LinearRegularizedBilateralConstraint" => Self::LinearRegularizedBilateral {
                stiffness: element.f64_child("stiffnessCoefficient")?,
                damping: element.f64_child("dampingCoefficient")?,
            },
            "LinearSpringDamperForce" => Self::LinearSpringDamper {
                stiffness: element.f64_child("stiffnessCoefficient")?,
                damping: element.f64_child("dampingCoefficient")?,
                unloaded_length: element.opt_f64_child("unloadedLength")?.unwrap_or(0.0),
            },
            other => {
                return Err(ForceLawError::UnknownElement {
                    name: other.to_string(),
                    context: "normal force function",
                });
            }
        };
        function.validate()?;
        Ok(function)
    }
}

/// Velocity dependent friction coefficient `μ(gd)`.
pub enum FrictionCoefficientFunction {
    /// `μ = value`.
    Constant(f64),
    /// `μ = a0 + a1·gd`.
    Linear {
        /// Offset.
        a0: f64,
        /// Slope.
        a1: f64,
    },
    /// Piecewise linear interpolation of a table, held constant outside it.
    Tabular {
        /// Strictly increasing sample abscissae.
        x: Vec<f64>,
        /// Values at the samples.
        y: Vec<f64>,
    },
    /// Stribeck curve `μ_k + (μ_s - μ_k)·exp(-|gd|/v_s)`.
    Stribeck {
        /// Static coefficient (at zero velocity).
        mu_static: f64,
        /// Kinetic coefficient (at high velocity).
        mu_kinetic: f64,
        /// Stribeck velocity `v_s`.
        stribeck_velocity: f64,
    },
    /// Arbitrary closure.
    Custom(Box<FrictionCoefficientFn>),
}

impl FrictionCoefficientFunction {
    /// Wrap a closure.
    #[must_use]
    pub fn custom(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self::Custom(Box::new(f))
    }

    /// Create a Stribeck curve.
    #[must_use]
    pub fn stribeck(mu_static: f64, mu_kinetic: f64, stribeck_velocity: f64) -> Self {
        Self::Stribeck {
            mu_static,
            mu_kinetic,
            stribeck_velocity,
        }
    }

    /// Evaluate `μ(gd)`.
    #[must_use]
    pub fn evaluate(&self, gd: f64) -> f64 {
        match self {
            Self::Constant(mu) => *mu,
            Self::Linear { a0, a1 } => a0 + a1 * gd,
            Self::Tabular { x, y } => interpolate(x, y, gd),
            Self::Stribeck {
                mu_static,
                mu_kinetic,
                stribeck_velocity,
            } => mu_kinetic + (mu_static - mu_kinetic) * (-gd.abs() / stribeck_velocity).exp(),
            Self::Custom(f) => f(gd),
        }
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Tabular { x, y } => {
                if x.is_empty() || x.len() != y.len() {
                    return Err(ForceLawError::invalid_config(format!(
                        "tabular friction function needs equally many x and y samples (got {} and {})",
                        x.len(),
                        y.len()
                    )));
                }
                if x.windows(2).any(|w| w[1] <= w[0]) {
                    return Err(ForceLawError::invalid_config(
                        "tabular friction function abscissae must be strictly increasing",
                    ));
                }
                Ok(())
            }
            Self::Stribeck {
                stribeck_velocity, ..
            } if *stribeck_velocity <= 0.0 => Err(ForceLawError::invalid_config(
                "Stribeck velocity must be positive",
            )),
            _ => Ok(()),
        }
    }
}

fn interpolate(x: &[f64], y: &[f64], at: f64) -> f64 {
    let (Some(&x_first), Some(&x_last)) = (x.first(), x.last()) else {
        return 0.0;
    };
    if at <= x_first {
        return y.first().copied().unwrap_or(0.0);
    }
    if at >= x_last {
        return y.last().copied().unwrap_or(0.0);
    }
    let upper = x.partition_point(|&xi| xi <= at).max(1);
    match (x.get(upper - 1..=upper), y.get(upper - 1..=upper)) {
        (Some(&[x0, x1]), Some(&[y0, y1])) => y0 + (y1 - y0) * (at - x0) / (x1 - x0),
        _ => y.last().copied().unwrap_or(0.0),
    }
}

impl fmt::Debug for FrictionCoefficientFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(mu) => f.debug_tuple("Constant").field(mu).finish(),
            Self::Linear { a0, a1 } => f
                .debug_struct("Linear")
                .field("a0", a0)
                .field("a1", a1)
                .finish(),
            Self::Tabular { x, y } => f
                .debug_struct("Tabular")
                .field("x", x)
                .field("y", y)
                .finish(),
            Self::Stribeck {
                mu_static,
                mu_kinetic,
                stribeck_velocity,
            } => f
                .debug_struct("Stribeck")
                .field("mu_static", mu_static)
                .field("mu_kinetic", mu_kinetic)
                .field("stribeck_velocity", stribeck_velocity)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl XmlConfig for FrictionCoefficientFunction {
    fn to_xml(&self) -> Result<XmlElement> {
        Ok(match self {
            Self::Constant(mu) => XmlElement::new("ConstantFunction").with_child(XmlElement::leaf("a0", mu)),
            Self::Linear { a0, a1 } => XmlElement::new("LinearFunction")
                .with_child(XmlElement::leaf("a0", a0))
                .with_child(XmlElement::leaf("a1", a1)),
            Self::Tabular { x, y } => XmlElement::new("TabularFunction")
                .with_child(XmlElement::float_list("x", x))
                .with_child(XmlElement::float_list("y", y)),
            Self::Stribeck {
                mu_static,
                mu_kinetic,
                stribeck_velocity,
            } => XmlElement::new("StribeckFunction")
                .with_child(XmlElement::leaf("staticCoefficient", mu_static))
                .with_child(XmlElement::leaf("kineticCoefficient", mu_kinetic))
                .with_child(XmlElement::leaf("stribeckVelocity", stribeck_velocity)),
            Self::Custom(_) => {
                return Err(ForceLawError::Unserializable {
                    what: "friction coefficient function",
                });
            }
        })
    }

    fn from_xml(element: &XmlElement) -> Result<Self> {
        let function = match element.name.as_str() {
            "ConstantFunction" => Self::Constant(element.f64_child("a0")?),
            "LinearFunction" => Self::Linear {
                a0: element.opt_f64_child("a0")?.unwrap_or(0.0),
                a1: element.f64_child("a1")?,
            },
            "TabularFunction" => Self::Tabular {
                x: element.required_child("x")?.text_f64_list()?,
                y: element.required_child("y")?.text_f64_list()?,
            },
            "StribeckFunction" => Self::Stribeck {
                mu_static: element.f64_child("staticCoefficient")?,
                mu_kinetic: element.f64_child("kineticCoefficient")?,
                stribeck_velocity: element.f64_child("stribeckVelocity")?,
            },
            other => {
                return Err(ForceLawError::UnknownElement {
                    name: other.to_string(),
                    context: "friction coefficient function",
                });
            }
        };
        function.validate()?;
        Ok(function)
    }
}

/// Default marginal velocity below which regularized friction grows linearly.
pub const DEFAULT_MARGINAL_VELOCITY: f64 = 0.01;

/// Force function `(gd_T, laN) -> λ_T` of a regularized friction law.
pub enum FrictionForceFunction {
    /// Coulomb friction regularized linearly below `marginal_velocity`.
    LinearRegularizedCoulomb {
        /// Friction coefficient.
        mu: f64,
        /// Velocity below which the force grows linearly.
        marginal_velocity: f64,
    },
    /// Stribeck friction regularized linearly below `marginal_velocity`.
    LinearRegularizedStribeck {
        /// Friction coefficient as a function of the slip speed.
        fmu: FrictionCoefficientFunction,
        /// Velocity below which the force grows linearly.
        marginal_velocity: f64,
    },
    /// Arbitrary closure.
    Custom(Box<FrictionForceFn>),
}

impl FrictionForceFunction {
    /// Linearly regularized Coulomb friction with the default marginal velocity.
    #[must_use]
    pub fn coulomb(mu: f64) -> Self {
        Self::LinearRegularizedCoulomb {
            mu,
            marginal_velocity: DEFAULT_MARGINAL_VELOCITY,
        }
    }

    /// Wrap a closure.
    #[must_use]
    pub fn custom(f: impl Fn(&DVector<f64>, f64) -> DVector<f64> + Send + Sync + 'static) -> Self {
        Self::Custom(Box::new(f))
    }

    /// Evaluate the tangential force for slip velocity `gd` and normal force `la_n`.
    #[must_use]
    pub fn evaluate(&self, gd: &DVector<f64>, la_n: f64) -> DVector<f64> {
        match self {
            Self::LinearRegularizedCoulomb {
                mu,
                marginal_velocity,
            } => {
                let norm = gd.norm();
                if norm < *marginal_velocity {
                    gd * (-la_n * mu / marginal_velocity)
                } else {
                    gd * (-la_n * mu / norm)
                }
            }
            Self::LinearRegularizedStribeck {
                fmu,
                marginal_velocity,
            } => {
                let norm = gd.norm();
                if norm < *marginal_velocity {
                    gd * (-la_n * fmu.evaluate(*marginal_velocity) / marginal_velocity)
                } else {
                    gd * (-la_n * fmu.evaluate(norm) / norm)
                }
            }
            Self::Custom(f) => f(gd, la_n),
        }
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::LinearRegularizedCoulomb {
                mu,
                marginal_velocity,
            } => {
                if *mu < 0.0 {
                    return Err(ForceLawError::invalid_config(
                        "friction coefficient must be non-negative",
                    ));
                }
                validate_marginal_velocity(*marginal_velocity)
            }
            Self::LinearRegularizedStribeck {
                fmu,
                marginal_velocity,
            } => {
                fmu.validate()?;
                validate_marginal_velocity(*marginal_velocity)
            }
            Self::Custom(_) => Ok(()),
        }
    }
}

fn validate_marginal_velocity(marginal_velocity: f64) -> Result<()> {
    if !marginal_velocity.is_finite() || marginal_velocity <= 0.0 {
        return Err(ForceLawError::invalid_config(
            "marginal velocity must be positive",
        ));
    }
    Ok(())
}

impl fmt::Debug for FrictionForceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinearRegularizedCoulomb {
                mu,
                marginal_velocity,
            } => f
                .debug_struct("LinearRegularizedCoulomb")
                .field("mu", mu)
                .field("marginal_velocity", marginal_velocity)
                .finish(),
            Self::LinearRegularizedStribeck {
                fmu,
                marginal_velocity,
            } => f
                .debug_struct("LinearRegularizedStribeck")
                .field("fmu", fmu)
                .field("marginal_velocity", marginal_velocity)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl XmlConfig for FrictionForceFunction {
    fn to_xml(&self) -> Result<XmlElement> {
        Ok(match self {
            Self::LinearRegularizedCoulomb {
                mu,
                marginal_velocity,
            } => XmlElement::new("LinearRegularizedCoulombFriction")
                .with_child(XmlElement::leaf("marginalVelocity", marginal_velocity))
                .with_child(XmlElement::leaf("frictionCoefficient", mu)),
            Self::LinearRegularizedStribeck {
                fmu,
                marginal_velocity,
            } => XmlElement::new("LinearRegularizedStribeckFriction")
                .with_child(XmlElement::leaf("marginalVelocity", marginal_velocity))
                .with_child(XmlElement::new("frictionFunction").with_child(fmu.to_xml()?)),
            Self::Custom(_) => {
                return Err(ForceLawError::Unserializable {
                    what: "friction force function",
                });
            }
        })
    }

    fn from_xml(element: &XmlElement) -> Result<Self> {
        let marginal_velocity = element
            .opt_f64_child("marginalVelocity")?
            .unwrap_or(DEFAULT_MARGINAL_VELOCITY);
        let function = match element.name.as_str() {
            "LinearRegularizedCoulombFriction" => Self::LinearRegularizedCoulomb {
                mu: element.f64_child("frictionCoefficient")?,
                marginal_velocity,
            },
            "LinearRegularizedStribeckFriction" => Self::LinearRegularizedStribeck {
                fmu: nested_coefficient_function(element)?,
                marginal_velocity,
            },
            other => {
                return Err(ForceLawError::UnknownElement {
                    name: other.to_string(),
                    context: "friction force function",
                });
            }
        };
        function.validate()?;
        Ok(function)
    }
}

/// Read the function nested in a `<frictionFunction>` child.
pub(crate) fn nested_coefficient_function(element: &XmlElement) -> Result<FrictionCoefficientFunction> {
    let wrapper = element.required_child("frictionFunction")?;
    let inner = wrapper
        .first_child()
        .ok_or_else(|| ForceLawError::missing_element("function", "frictionFunction"))?;
    FrictionCoefficientFunction::from_xml(inner)
}

/// Elastic coupling coefficient between two contour points.
///
/// The arguments are the contour (Lagrange) parameters of the two points. A
/// positive coefficient `c` means that a unit normal force at the second point
/// opens the gap at the first point by `c`.
pub enum InfluenceFunction {
    /// Local flexibility: `flexibility` for coincident contour parameters,
    /// zero otherwise. Couples a contact point only with itself.
    Flexibility {
        /// Compliance of the contour at the contact point.
        flexibility: f64,
    },
    /// The same coupling for every pair of points.
    Constant {
        /// Coupling value.
        coupling: f64,
    },
    /// Arbitrary closure.
    Custom(Box<InfluenceFn>),
}

impl InfluenceFunction {
    /// Wrap a closure.
    #[must_use]
    pub fn custom(f: impl Fn(&Vector2<f64>, &Vector2<f64>) -> f64 + Send + Sync + 'static) -> Self {
        Self::Custom(Box::new(f))
    }

    /// Evaluate the coupling between the points at `zeta_1` and `zeta_2`.
    #[must_use]
    pub fn evaluate(&self, zeta_1: &Vector2<f64>, zeta_2: &Vector2<f64>) -> f64 {
        match self {
            Self::Flexibility { flexibility } => {
                if (zeta_1 - zeta_2).norm() < f64::EPSILON {
                    *flexibility
                } else {
                    0.0
                }
            }
            Self::Constant { coupling } => *coupling,
            Self::Custom(f) => f(zeta_1, zeta_2),
        }
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Flexibility { flexibility } if !flexibility.is_finite() || *flexibility < 0.0 => {
                Err(ForceLawError::invalid_config(
                    "flexibility must be finite and non-negative",
                ))
            }
            Self::Constant { coupling } if !coupling.is_finite() => Err(
                ForceLawError::invalid_config("coupling value must be finite"),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for InfluenceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flexibility { flexibility } => f
                .debug_struct("Flexibility")
                .field("flexibility", flexibility)
                .finish(),
            Self::Constant { coupling } => f
                .debug_struct("Constant")
                .field("coupling", coupling)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl XmlConfig for InfluenceFunction {
    fn to_xml(&self) -> Result<XmlElement> {
        Ok(match self {
            Self::Flexibility { flexibility } => XmlElement::new("FlexibilityInfluenceFunction")
                .with_child(XmlElement::leaf("flexibility", flexibility)),
            Self::Constant { coupling } => XmlElement::new("ConstantInfluenceFunction")
                .with_child(XmlElement::leaf("couplingValue", coupling)),
            Self::Custom(_) => {
                return Err(ForceLawError::Unserializable {
                    what: "influence function",
                });
            }
        })
    }

    fn from_xml(element: &XmlElement) -> Result<Self> {
        let function = match element.name.as_str() {
            "FlexibilityInfluenceFunction" => Self::Flexibility {
                flexibility: element.f64_child("flexibility")?,
            },
            "ConstantInfluenceFunction" => Self::Constant {
                coupling: element.f64_child("couplingValue")?,
            },
            other => {
                return Err(ForceLawError::UnknownElement {
                    name: other.to_string(),
                    context: "influence function",
                });
            }
        };
        function.validate()?;
        Ok(function)
    }
}
