//! Maxwell contact: elastically coupled unilateral contacts.
//!
//! Rigid unilateral contacts are solved one at a time. When several contact
//! points lie on the same deformable contours, the force at one point also
//! opens the gap at the others. The Maxwell law models this with an influence
//! matrix `C`, whose entry `C_ij` is the gap opened at point `i` by a unit
//! force at point `j`, and solves all points at once:
//!
//! ```text
//! 0 ≤ λ ⟂ C·λ + g ≥ 0
//! ```
//!
//! Each call of [`MaxwellUnilateralConstraint::compute_smooth_forces`] builds
//! a [`MaxwellStep`] (possible contacts, influence matrix, rigid-body gap),
//! solves the LCP warm started from the previous solution and writes the
//! forces back into the contacts.
//!
//! # Example
//!
//! ```
//! use nalgebra::Vector2;
//! use sim_force_law::{
//!     ContourArena, InfluenceFunction, MaxwellOutcome, MaxwellParameters,
//!     MaxwellUnilateralConstraint, SingleContact,
//! };
//!
//! let mut arena = ContourArena::new();
//! let plane = arena.insert("plane", 1.0).unwrap();
//! let ball = arena.insert("ball", 0.05).unwrap();
//!
//! let mut law = MaxwellUnilateralConstraint::new(MaxwellParameters::default());
//! law.add_contour_coupling(plane, plane, InfluenceFunction::Flexibility { flexibility: 1e-3 })
//!     .unwrap();
//! law.initialize_contour_couplings(&arena).unwrap();
//!
//! let mut contacts = vec![vec![
//!     SingleContact::new(plane, ball)
//!         .with_gap(-1e-4, 0.0)
//!         .with_zeta(Vector2::zeros(), Vector2::zeros()),
//! ]];
//! let outcome = law.compute_smooth_forces(&mut contacts).unwrap();
//! assert!(matches!(outcome, MaxwellOutcome::Solved { contacts: 1, .. }));
//! assert!((contacts[0][0].la - 0.1).abs() < 1e-9);
//! ```

mod step;

pub use step::{ContactLocation, MaxwellStep, compute_coupling_coefficient, compute_influence_coefficient};

use step::{contact_at, missing_contact};

use std::collections::BTreeMap;

use nalgebra::{DVector, Vector2};
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::contact::{ContourArena, ContourId, SingleContact};
use crate::error::{ForceLawError, Result};
use crate::function::InfluenceFunction;
use crate::lcp::{LcpSolution, LcpStrategy, LinearComplementarityProblem};
use crate::xml::{XmlConfig, XmlElement};

/// Scalar parameters of the Maxwell law.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaxwellParameters {
    /// Damping applied to contacts below [`gap_limit`](Self::gap_limit):
    /// `λ ← max(0, λ - d·gd)`.
    pub damping_coefficient: f64,

    /// Contacts with a gap below this value are damped.
    pub gap_limit: f64,

    /// Contacts with a gap up to this value take part in the solve.
    pub contact_tolerance: f64,
}

impl Default for MaxwellParameters {
    fn default() -> Self {
        Self {
            damping_coefficient: 0.0,
            gap_limit: 0.0,
            contact_tolerance: 0.0,
        }
    }
}

impl MaxwellParameters {
    /// Set the damping coefficient.
    #[must_use]
    pub const fn with_damping_coefficient(mut self, d: f64) -> Self {
        self.damping_coefficient = d;
        self
    }

    /// Set the damping gap limit.
    #[must_use]
    pub const fn with_gap_limit(mut self, gap_limit: f64) -> Self {
        self.gap_limit = gap_limit;
        self
    }

    /// Set the contact tolerance.
    #[must_use]
    pub const fn with_contact_tolerance(mut self, tolerance: f64) -> Self {
        self.contact_tolerance = tolerance;
        self
    }

    /// Validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if !self.damping_coefficient.is_finite() || self.damping_coefficient < 0.0 {
            return Err(ForceLawError::invalid_config(
                "damping coefficient must be finite and non-negative",
            ));
        }
        if !self.gap_limit.is_finite() {
            return Err(ForceLawError::invalid_config("gap limit must be finite"));
        }
        if !self.contact_tolerance.is_finite() {
            return Err(ForceLawError::invalid_config("contact tolerance must be finite"));
        }
        Ok(())
    }
}

/// Influence functions keyed by ordered contour pairs.
///
/// A function registered for `(a, b)` also answers `(b, a)` with swapped
/// arguments.
#[derive(Debug, Default)]
pub struct CouplingRegistry {
    functions: BTreeMap<(ContourId, ContourId), InfluenceFunction>,
}

impl CouplingRegistry {
    /// Register a function, replacing any previous one for the same pair.
    pub fn insert(&mut self, first: ContourId, second: ContourId, function: InfluenceFunction) {
        if first != second {
            self.functions.remove(&(second, first));
        }
        self.functions.insert((first, second), function);
    }

    /// The function registered for a pair, in either order.
    #[must_use]
    pub fn get(&self, first: ContourId, second: ContourId) -> Option<&InfluenceFunction> {
        self.functions
            .get(&(first, second))
            .or_else(|| self.functions.get(&(second, first)))
    }

    /// Coefficient between the point `zeta_1` on `first` and `zeta_2` on
    /// `second`, or `None` if the pair is not coupled.
    #[must_use]
    pub fn coefficient(
        &self,
        first: ContourId,
        second: ContourId,
        zeta_1: &Vector2<f64>,
        zeta_2: &Vector2<f64>,
    ) -> Option<f64> {
        if let Some(function) = self.functions.get(&(first, second)) {
            return Some(function.evaluate(zeta_1, zeta_2));
        }
        self.functions
            .get(&(second, first))
            .map(|function| function.evaluate(zeta_2, zeta_1))
    }

    /// Registered contour pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (ContourId, ContourId)> + '_ {
        self.functions.keys().copied()
    }

    /// Number of registered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether no pair is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// A coupling referring to contours by name, resolved against a
/// [`ContourArena`] by
/// [`initialize_contour_couplings`](MaxwellUnilateralConstraint::initialize_contour_couplings).
#[derive(Debug)]
struct NamedCoupling {
    contour1: String,
    contour2: String,
    function: InfluenceFunction,
}

/// Result of a Maxwell solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxwellOutcome {
    /// The LCP was solved and the forces written.
    Solved {
        /// Number of contacts in the solve.
        contacts: usize,
        /// Sweeps or pivots the LCP solver spent.
        iterations: usize,
    },
    /// No contact was close enough; all forces were set to zero.
    NoPossibleContacts,
}

/// Unilateral contacts coupled through influence functions.
#[derive(Debug, Default)]
pub struct MaxwellUnilateralConstraint {
    parameters: MaxwellParameters,
    lcp: LinearComplementarityProblem,
    couplings: CouplingRegistry,
    coupling_names: BTreeMap<(ContourId, ContourId), (String, String)>,
    pending: Vec<NamedCoupling>,
    previous_step: Option<MaxwellStep>,
    solution0: Option<DVector<f64>>,
    material_constant: Option<f64>,
}

impl MaxwellUnilateralConstraint {
    /// Create a law with the given parameters and the standard LCP strategy.
    #[must_use]
    pub fn new(parameters: MaxwellParameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }

    /// Replace the LCP solver.
    #[must_use]
    pub fn with_lcp(mut self, lcp: LinearComplementarityProblem) -> Self {
        self.lcp = lcp;
        self
    }

    /// The scalar parameters.
    #[must_use]
    pub fn parameters(&self) -> &MaxwellParameters {
        &self.parameters
    }

    /// Set the damping coefficient.
    pub fn set_damping_coefficient(&mut self, d: f64) {
        self.parameters.damping_coefficient = d;
    }

    /// Set the damping gap limit.
    pub fn set_gap_limit(&mut self, gap_limit: f64) {
        self.parameters.gap_limit = gap_limit;
    }

    /// The LCP solver.
    #[must_use]
    pub fn lcp(&self) -> &LinearComplementarityProblem {
        &self.lcp
    }

    /// The resolved couplings.
    #[must_use]
    pub fn couplings(&self) -> &CouplingRegistry {
        &self.couplings
    }

    /// Couple two contours by handle.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] if the function parameters
    /// are invalid.
    pub fn add_contour_coupling(&mut self, first: ContourId, second: ContourId, function: InfluenceFunction) -> Result<()> {
        function.validate()?;
        self.couplings.insert(first, second, function);
        self.coupling_names.remove(&(first, second));
        self.coupling_names.remove(&(second, first));
        self.previous_step = None;
        Ok(())
    }

    /// Couple two contours by name; resolved in
    /// [`initialize_contour_couplings`](Self::initialize_contour_couplings).
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] if the function parameters
    /// are invalid.
    pub fn add_contour_coupling_by_name(
        &mut self,
        first: impl Into<String>,
        second: impl Into<String>,
        function: InfluenceFunction,
    ) -> Result<()> {
        function.validate()?;
        self.pending.push(NamedCoupling {
            contour1: first.into(),
            contour2: second.into(),
            function,
        });
        Ok(())
    }

    /// Resolve named couplings and check every coupled contour against the
    /// arena. Called once at model-build time.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::UnknownContour`] for names or handles not in
    /// the arena, and [`ForceLawError::InvalidConfig`] for invalid parameters.
    pub fn initialize_contour_couplings(&mut self, arena: &ContourArena) -> Result<()> {
        self.validate()?;
        for coupling in std::mem::take(&mut self.pending) {
            let first = arena.find(&coupling.contour1).ok_or_else(|| ForceLawError::UnknownContour {
                name: coupling.contour1.clone(),
            })?;
            let second = arena.find(&coupling.contour2).ok_or_else(|| ForceLawError::UnknownContour {
                name: coupling.contour2.clone(),
            })?;
            self.couplings.insert(first, second, coupling.function);
            self.coupling_names.remove(&(second, first));
            self.coupling_names
                .insert((first, second), (coupling.contour1, coupling.contour2));
        }
        for (first, second) in self.couplings.pairs() {
            arena.check(first)?;
            arena.check(second)?;
        }
        if self.couplings.is_empty() {
            warn!("Maxwell contact has no contour couplings; the influence matrix will be zero");
        }
        self.previous_step = None;
        debug!(couplings = self.couplings.len(), "Maxwell contour couplings initialized");
        Ok(())
    }

    /// Average eigenvalue of `C`, computed on first use and cached.
    ///
    /// The average eigenvalue equals `trace(C) / n`.
    pub fn compute_material_constant(&mut self, step: &MaxwellStep) -> f64 {
        if let Some(value) = self.material_constant {
            return value;
        }
        let c = step.influence_matrix();
        let value = if c.nrows() == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let n = c.nrows() as f64;
            c.trace() / n
        };
        if value > 0.0 {
            self.material_constant = Some(value);
        }
        value
    }

    /// The cached material constant, if computed.
    #[must_use]
    pub fn material_constant(&self) -> Option<f64> {
        self.material_constant
    }

    /// The warm start for the next solve.
    #[must_use]
    pub fn solution0(&self) -> Option<&DVector<f64>> {
        self.solution0.as_ref()
    }

    /// The step of the last solve.
    #[must_use]
    pub fn last_step(&self) -> Option<&MaxwellStep> {
        self.previous_step.as_ref()
    }

    /// Forget warm start, cached material constant and the previous step.
    pub fn reset(&mut self) {
        self.previous_step = None;
        self.solution0 = None;
        self.material_constant = None;
    }

    /// Build the context of a new step, reusing coefficients of the last one.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`MaxwellStep::assemble`].
    pub fn assemble_step(&self, contacts: &[Vec<SingleContact>]) -> Result<MaxwellStep> {
        MaxwellStep::assemble(
            contacts,
            self.parameters.contact_tolerance,
            &self.couplings,
            self.previous_step.as_ref(),
        )
    }

    /// Solve the LCP of a step.
    ///
    /// Warm starts from the previous solution when the number of contacts
    /// matches, otherwise from `max(0, -g / c̄)` with the material constant
    /// `c̄`.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::LcpNotConverged`] if the LCP solver fails.
    pub fn solve_step(&mut self, step: &MaxwellStep) -> Result<LcpSolution> {
        let material_constant = self.compute_material_constant(step);
        let initial = match &self.solution0 {
            Some(solution) if solution.len() == step.len() => solution.clone(),
            _ if material_constant > 0.0 => step.rigid_body_gap().map(|g| (-g / material_constant).max(0.0)),
            _ => DVector::zeros(step.len()),
        };
        let solution = self
            .lcp
            .solve(step.influence_matrix(), step.rigid_body_gap(), Some(&initial))?;
        self.solution0 = Some(solution.z.clone());
        Ok(solution)
    }

    /// Write the solution of a step into the contacts, damping those below
    /// the gap limit. Contacts not in the step get zero force.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] if `la` does not have one
    /// entry per possible contact or `contacts` lacks a point of the step.
    /// The contacts are left untouched in that case.
    pub fn distribute(&self, step: &MaxwellStep, la: &DVector<f64>, contacts: &mut [Vec<SingleContact>]) -> Result<()> {
        if la.len() != step.len() {
            return Err(ForceLawError::invalid_config(format!(
                "solution has {} entries for {} possible contacts",
                la.len(),
                step.len()
            )));
        }
        for index in step.possible_contact_points() {
            contact_at(contacts, *index)?;
        }

        for contact in contacts.iter_mut().flatten() {
            contact.la = 0.0;
        }
        for (k, index) in step.possible_contact_points().iter().enumerate() {
            let contact = contacts
                .get_mut(index.kinematics)
                .and_then(|points| points.get_mut(index.point))
                .ok_or_else(|| missing_contact(*index))?;
            let mut force = la[k];
            if contact.g < self.parameters.gap_limit {
                force = (force - self.parameters.damping_coefficient * contact.gd).max(0.0);
            }
            contact.la = force;
        }
        Ok(())
    }

    /// Solve all contacts jointly and write their normal forces.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::LcpNotConverged`] if the LCP solver fails; the
    /// contact forces are left untouched in that case. Propagates the
    /// [`ForceLawError::InvalidConfig`] of [`distribute`](Self::distribute).
    pub fn compute_smooth_forces(&mut self, contacts: &mut [Vec<SingleContact>]) -> Result<MaxwellOutcome> {
        let step = self.assemble_step(contacts)?;
        if step.is_empty() {
            for contact in contacts.iter_mut().flatten() {
                contact.la = 0.0;
            }
            self.previous_step = Some(step);
            return Ok(MaxwellOutcome::NoPossibleContacts);
        }

        let solution = match self.solve_step(&step) {
            Ok(solution) => solution,
            Err(err) => {
                warn!(contacts = step.len(), error = %err, "Maxwell contact solve failed");
                return Err(err);
            }
        };
        self.distribute(&step, &solution.z, contacts)?;
        debug!(
            contacts = step.len(),
            reused = step.reused_coefficients(),
            iterations = solution.iterations,
            "Maxwell contact solved"
        );
        let outcome = MaxwellOutcome::Solved {
            contacts: step.len(),
            iterations: solution.iterations,
        };
        self.previous_step = Some(step);
        Ok(outcome)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.parameters.validate()?;
        self.lcp.config.validate()
    }
}

fn strategy_name(strategy: LcpStrategy) -> &'static str {
    match strategy {
        LcpStrategy::Lemke => "Lemke",
        LcpStrategy::ProjectedGaussSeidel => "ProjectedGaussSeidel",
        LcpStrategy::Standard => "Standard",
    }
}

impl XmlConfig for MaxwellUnilateralConstraint {
    fn to_xml(&self) -> Result<XmlElement> {
        let mut element = XmlElement::new("MaxwellUnilateralConstraint")
            .with_child(XmlElement::leaf("dampingCoefficient", self.parameters.damping_coefficient))
            .with_child(XmlElement::leaf("gapLimit", self.parameters.gap_limit))
            .with_child(XmlElement::leaf("contactTolerance", self.parameters.contact_tolerance))
            .with_child(XmlElement::leaf("lcpStrategy", strategy_name(self.lcp.strategy)));

        let coupling = |contour1: &str, contour2: &str, function: &InfluenceFunction| -> Result<XmlElement> {
            Ok(XmlElement::new("contourCoupling")
                .with_child(XmlElement::leaf("contour1", contour1))
                .with_child(XmlElement::leaf("contour2", contour2))
                .with_child(XmlElement::new("function").with_child(function.to_xml()?)))
        };
        for (first, second) in self.couplings.pairs() {
            let (name1, name2) = self
                .coupling_names
                .get(&(first, second))
                .ok_or(ForceLawError::Unserializable {
                    what: "contour coupling registered by handle",
                })?;
            let function = self.couplings.get(first, second).ok_or_else(|| ForceLawError::UnknownContour {
                name: first.to_string(),
            })?;
            element.push(coupling(name1, name2, function)?);
        }
        for named in &self.pending {
            element.push(coupling(&named.contour1, &named.contour2, &named.function)?);
        }
        Ok(element)
    }

    fn from_xml(element: &XmlElement) -> Result<Self> {
        element.expect_name("MaxwellUnilateralConstraint", "generalized force law")?;
        let defaults = MaxwellParameters::default();
        let parameters = MaxwellParameters {
            damping_coefficient: element
                .opt_f64_child("dampingCoefficient")?
                .unwrap_or(defaults.damping_coefficient),
            gap_limit: element.opt_f64_child("gapLimit")?.unwrap_or(defaults.gap_limit),
            contact_tolerance: element
                .opt_f64_child("contactTolerance")?
                .unwrap_or(defaults.contact_tolerance),
        };
        let mut lcp = LinearComplementarityProblem::default();
        if let Some(strategy) = element.child("lcpStrategy") {
            lcp.strategy = match strategy.text.trim() {
                "Lemke" => LcpStrategy::Lemke,
                "ProjectedGaussSeidel" => LcpStrategy::ProjectedGaussSeidel,
                "Standard" => LcpStrategy::Standard,
                other => {
                    return Err(ForceLawError::invalid_value(
                        "lcpStrategy",
                        format!("unknown strategy: {other}"),
                    ));
                }
            };
        }

        let mut law = Self::new(parameters).with_lcp(lcp);
        for coupling in element.children_named("contourCoupling") {
            let function = coupling
                .required_child("function")?
                .first_child()
                .ok_or_else(|| ForceLawError::missing_element("influence function", "function"))?;
            law.add_contour_coupling_by_name(
                coupling.text_child("contour1")?,
                coupling.text_child("contour2")?,
                InfluenceFunction::from_xml(function)?,
            )?;
        }
        law.validate()?;
        Ok(law)
    }
}
