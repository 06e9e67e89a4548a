//! Non-smooth contact force and impact laws.
//!
//! This crate defines the constitutive laws a time-stepping multibody solver
//! calls for every contact or joint: given gaps, relative velocities and the
//! current force estimate, what reaction force (or impulse) satisfies the
//! complementarity condition of the constraint?
//!
//! # Law Families
//!
//! | Level | Normal direction | Tangential direction |
//! |-------|------------------|----------------------|
//! | Acceleration | [`GeneralizedForceLaw`] | [`FrictionForceLaw`] |
//! | Velocity (impact) | [`GeneralizedImpactLaw`] | [`FrictionImpactLaw`] |
//!
//! Set-valued laws (rigid constraints, Coulomb and Stribeck friction) are
//! solved by the outer solver through the proximal fixed-point iteration
//!
//! ```text
//! λ ← prox_C(λ - r·ġ)
//! ```
//!
//! using `project`, its Jacobian `diff`, the direct `solve` and the
//! acceptance check `is_fulfilled`. Regularized laws are single-valued and
//! evaluate a [`NormalForceFunction`] or [`FrictionForceFunction`] instead.
//!
//! The [`MaxwellUnilateralConstraint`] couples many unilateral contacts on
//! deformable contours through [`InfluenceFunction`]s and solves them jointly
//! as a linear complementarity problem ([`lcp`]).
//!
//! Friction needs the normal force of the same contact: within one outer
//! iteration, solve the normal law of a contact before its friction law.
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use sim_force_law::{FrictionForceLaw, GeneralizedForceLaw};
//!
//! let normal = GeneralizedForceLaw::Unilateral;
//! assert!(normal.is_active(-0.001, 0.0));
//!
//! // approaching with gdn = -0.5: the projection pushes back
//! let la_n = normal.project(0.0, -0.5, 1.0, 0.0);
//! assert_eq!(la_n, 0.5);
//!
//! // the friction force is bounded by μ·λ_N
//! let friction = FrictionForceLaw::PlanarCoulomb { mu: 0.3 };
//! let la_t = friction.project(&DVector::from_element(1, 0.0), &DVector::from_element(1, -10.0), la_n, 1.0);
//! assert!((la_t[0] - 0.15).abs() < 1e-12);
//! ```
//!
//! # Configuration
//!
//! Every law, function and the Maxwell configuration reads and writes itself
//! as XML through [`XmlConfig`]:
//!
//! ```
//! use sim_force_law::{FrictionForceLaw, XmlConfig};
//!
//! let law = FrictionForceLaw::PlanarCoulomb { mu: 0.3 };
//! let xml = law.to_xml_string().unwrap();
//! let back = FrictionForceLaw::from_xml_str(&xml).unwrap();
//! assert_eq!(back.friction_coefficient(0.0), 0.3);
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**.

#![doc(html_root_url = "https://docs.rs/sim-force-law/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod contact;
mod error;
mod friction;
mod friction_impact;
mod function;
mod impact;
pub mod lcp;
mod maxwell;
mod normal;
pub mod prox;
mod xml;

pub use contact::{ContactIndex, Contour, ContourArena, ContourId, SingleContact};
pub use error::{ForceLawError, Result};
pub use friction::FrictionForceLaw;
pub use friction_impact::FrictionImpactLaw;
pub use function::{
    DEFAULT_MARGINAL_VELOCITY, FrictionCoefficientFunction, FrictionForceFunction, InfluenceFunction,
    NormalForceFunction,
};
pub use impact::{DEFAULT_GD_LIMIT, GeneralizedImpactLaw, UnilateralNewtonImpact};
pub use lcp::{LcpSolution, LcpSolverConfig, LcpStrategy, LinearComplementarityProblem};
pub use maxwell::{
    ContactLocation, CouplingRegistry, MaxwellOutcome, MaxwellParameters, MaxwellStep,
    MaxwellUnilateralConstraint, compute_coupling_coefficient, compute_influence_coefficient,
};
pub use normal::GeneralizedForceLaw;
pub use xml::{XmlConfig, XmlElement};
