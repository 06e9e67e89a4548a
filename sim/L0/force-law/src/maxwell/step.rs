//! Per-step state of the Maxwell contact solve.

use nalgebra::{DMatrix, DVector, Vector2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::CouplingRegistry;
use crate::contact::{ContactIndex, ContourId, SingleContact};
use crate::error::{ForceLawError, Result};

/// Where a possible contact point sits: its contours and contour parameters.
///
/// Two points with equal locations have equal influence coefficients, which
/// lets a step reuse the coefficients of the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactLocation {
    /// The two contours in contact.
    pub contours: [ContourId; 2],
    /// Contour parameters of the point on each contour.
    pub zeta: [Vector2<f64>; 2],
}

impl From<&SingleContact> for ContactLocation {
    fn from(contact: &SingleContact) -> Self {
        Self {
            contours: contact.contours,
            zeta: contact.zeta,
        }
    }
}

/// Context of one Maxwell solve.
///
/// Built in three passes over the outer contact list:
/// [`update_possible_contact_points`](Self::update_possible_contact_points),
/// [`update_influence_matrix`](Self::update_influence_matrix) and
/// [`update_rigid_body_gap`](Self::update_rigid_body_gap).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaxwellStep {
    possible_contact_points: Vec<ContactIndex>,
    locations: Vec<ContactLocation>,
    influence_matrix: DMatrix<f64>,
    rigid_body_gap: DVector<f64>,
    reused_coefficients: usize,
}

impl MaxwellStep {
    /// Create an empty step.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run all three passes.
    ///
    /// # Errors
    ///
    /// Cannot fail for the contact list the points were collected from; see
    /// [`update_rigid_body_gap`](Self::update_rigid_body_gap).
    pub fn assemble(
        contacts: &[Vec<SingleContact>],
        contact_tolerance: f64,
        couplings: &CouplingRegistry,
        previous: Option<&MaxwellStep>,
    ) -> Result<Self> {
        let mut step = Self::new();
        step.update_possible_contact_points(contacts, contact_tolerance);
        step.update_influence_matrix(couplings, previous);
        step.update_rigid_body_gap(contacts)?;
        Ok(step)
    }

    /// Record every contact with `g ≤ contact_tolerance` as possible.
    pub fn update_possible_contact_points(&mut self, contacts: &[Vec<SingleContact>], contact_tolerance: f64) {
        self.possible_contact_points.clear();
        self.locations.clear();
        for (kinematics, points) in contacts.iter().enumerate() {
            for (point, contact) in points.iter().enumerate() {
                if contact.g <= contact_tolerance {
                    self.possible_contact_points.push(ContactIndex::new(kinematics, point));
                    self.locations.push(ContactLocation::from(contact));
                }
            }
        }
    }

    /// Assemble the symmetric influence matrix `C` of the possible contacts.
    ///
    /// Only the upper triangle is evaluated; the lower one is mirrored.
    /// Coefficients between points found at the same location in `previous`
    /// are copied instead of recomputed.
    pub fn update_influence_matrix(&mut self, couplings: &CouplingRegistry, previous: Option<&MaxwellStep>) {
        let n = self.locations.len();
        let previous_index = previous.map_or_else(|| vec![None; n], |p| self.match_previous(p));

        self.reused_coefficients = 0;
        let mut c = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let value = match (previous, previous_index[i], previous_index[j]) {
                    (Some(p), Some(pi), Some(pj)) => {
                        self.reused_coefficients += 1;
                        p.influence_matrix[(pi, pj)]
                    }
                    _ if i == j => compute_influence_coefficient(couplings, &self.locations[i]),
                    _ => compute_coupling_coefficient(couplings, &self.locations[i], &self.locations[j]),
                };
                c[(i, j)] = value;
                c[(j, i)] = value;
            }
        }
        self.influence_matrix = c;
    }

    /// Pair every point with a distinct point of `previous` at the same
    /// location, preferring the one with the same contact index.
    ///
    /// Coincident points must map to different previous points, otherwise
    /// their coupling would be read from a diagonal entry.
    fn match_previous(&self, previous: &MaxwellStep) -> Vec<Option<usize>> {
        let mut taken = vec![false; previous.locations.len()];
        let mut matched = Vec::with_capacity(self.locations.len());
        for (index, location) in self.possible_contact_points.iter().zip(&self.locations) {
            let candidates: Vec<usize> = (0..previous.locations.len())
                .filter(|&p| !taken[p] && previous.locations[p] == *location)
                .collect();
            let found = candidates
                .iter()
                .copied()
                .find(|&p| previous.possible_contact_points[p] == *index)
                .or_else(|| candidates.first().copied());
            if let Some(p) = found {
                taken[p] = true;
            }
            matched.push(found);
        }
        matched
    }

    /// Collect the gaps of the possible contacts.
    ///
    /// # Errors
    ///
    /// Returns [`ForceLawError::InvalidConfig`] if `contacts` lacks a point
    /// recorded in this step.
    pub fn update_rigid_body_gap(&mut self, contacts: &[Vec<SingleContact>]) -> Result<()> {
        let gaps = self
            .possible_contact_points
            .iter()
            .map(|index| contact_at(contacts, *index).map(|contact| contact.g))
            .collect::<Result<Vec<_>>>()?;
        self.rigid_body_gap = DVector::from_vec(gaps);
        Ok(())
    }

    /// Indices of the possible contacts, in matrix order.
    #[must_use]
    pub fn possible_contact_points(&self) -> &[ContactIndex] {
        &self.possible_contact_points
    }

    /// Locations of the possible contacts, in matrix order.
    #[must_use]
    pub fn locations(&self) -> &[ContactLocation] {
        &self.locations
    }

    /// The influence matrix `C`.
    #[must_use]
    pub fn influence_matrix(&self) -> &DMatrix<f64> {
        &self.influence_matrix
    }

    /// The gaps of the possible contacts without elastic deformation.
    #[must_use]
    pub fn rigid_body_gap(&self) -> &DVector<f64> {
        &self.rigid_body_gap
    }

    /// Upper-triangle coefficients copied from the previous step.
    #[must_use]
    pub fn reused_coefficients(&self) -> usize {
        self.reused_coefficients
    }

    /// Number of possible contacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.possible_contact_points.len()
    }

    /// Whether no contact is possible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.possible_contact_points.is_empty()
    }
}

/// The contact at `index`, or an error if the list has no such point.
pub(crate) fn contact_at(contacts: &[Vec<SingleContact>], index: ContactIndex) -> Result<&SingleContact> {
    contacts
        .get(index.kinematics)
        .and_then(|points| points.get(index.point))
        .ok_or_else(|| missing_contact(index))
}

pub(crate) fn missing_contact(index: ContactIndex) -> ForceLawError {
    ForceLawError::invalid_config(format!(
        "contact list has no point {} of kinematics {}",
        index.point, index.kinematics
    ))
}

/// Self-influence of a contact point: the compliance of both contours at the
/// point.
#[must_use]
pub fn compute_influence_coefficient(couplings: &CouplingRegistry, location: &ContactLocation) -> f64 {
    (0..2)
        .filter_map(|k| {
            couplings.coefficient(
                location.contours[k],
                location.contours[k],
                &location.zeta[k],
                &location.zeta[k],
            )
        })
        .sum()
}

/// Coupling between two contact points: the influence of every contour of the
/// first point on every contour of the second that has a registered function.
#[must_use]
pub fn compute_coupling_coefficient(couplings: &CouplingRegistry, first: &ContactLocation, second: &ContactLocation) -> f64 {
    let mut value = 0.0;
    for k in 0..2 {
        for l in 0..2 {
            if let Some(c) = couplings.coefficient(first.contours[k], second.contours[l], &first.zeta[k], &second.zeta[l]) {
                value += c;
            }
        }
    }
    value
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::function::InfluenceFunction;

    fn setup() -> (CouplingRegistry, ContourId, ContourId) {
        let (plane, ball) = (ContourId(0), ContourId(1));
        let mut couplings = CouplingRegistry::default();
        couplings.insert(plane, plane, InfluenceFunction::Flexibility { flexibility: 2e-6 });
        couplings.insert(ball, ball, InfluenceFunction::Flexibility { flexibility: 1e-6 });
        couplings.insert(plane, ball, InfluenceFunction::Constant { coupling: 5e-7 });
        (couplings, plane, ball)
    }

    fn contact(plane: ContourId, ball: ContourId, g: f64, s: f64) -> SingleContact {
        SingleContact::new(plane, ball)
            .with_gap(g, 0.0)
            .with_zeta(Vector2::new(s, 0.0), Vector2::new(0.0, 0.0))
    }

    #[test]
    fn test_possible_contacts_are_filtered_by_gap() {
        let (couplings, plane, ball) = setup();
        let contacts = vec![
            vec![contact(plane, ball, -1e-3, 0.0), contact(plane, ball, 1.0, 0.5)],
            vec![contact(plane, ball, 0.0, 1.0)],
        ];
        let step = MaxwellStep::assemble(&contacts, 0.0, &couplings, None).unwrap();
        assert_eq!(
            step.possible_contact_points(),
            &[ContactIndex::new(0, 0), ContactIndex::new(1, 0)]
        );
        assert_eq!(step.rigid_body_gap().as_slice(), &[-1e-3, 0.0]);
    }

    #[test]
    fn test_influence_matrix_entries() {
        let (couplings, plane, ball) = setup();
        let contacts = vec![vec![contact(plane, ball, -1e-3, 0.0), contact(plane, ball, -1e-3, 0.5)]];
        let step = MaxwellStep::assemble(&contacts, 0.0, &couplings, None).unwrap();
        let c = step.influence_matrix();
        // diagonal: both flexibilities
        assert!((c[(0, 0)] - 3e-6).abs() < 1e-18);
        // off-diagonal: plane-plane vanishes for distinct parameters, the
        // ball-ball parameters coincide, and the plane-ball constant counts
        // in both orders
        assert!((c[(0, 1)] - (1e-6 + 2.0 * 5e-7)).abs() < 1e-18);
        assert_eq!(c[(0, 1)], c[(1, 0)]);
    }

    #[test]
    fn test_coefficients_are_reused() {
        let (couplings, plane, ball) = setup();
        let mut contacts = vec![vec![contact(plane, ball, -1e-3, 0.0), contact(plane, ball, -1e-3, 0.5)]];
        let first = MaxwellStep::assemble(&contacts, 0.0, &couplings, None).unwrap();
        assert_eq!(first.reused_coefficients(), 0);

        contacts[0][1].g = -2e-3;
        let second = MaxwellStep::assemble(&contacts, 0.0, &couplings, Some(&first)).unwrap();
        assert_eq!(second.reused_coefficients(), 3);
        assert_eq!(second.influence_matrix(), first.influence_matrix());

        contacts[0][1].zeta[0].x = 0.7;
        let third = MaxwellStep::assemble(&contacts, 0.0, &couplings, Some(&second)).unwrap();
        assert_eq!(third.reused_coefficients(), 1);
    }

    #[test]
    fn test_coincident_contacts_keep_their_coupling() {
        let (plane, ball) = (ContourId(0), ContourId(1));
        let mut couplings = CouplingRegistry::default();
        couplings.insert(plane, plane, InfluenceFunction::Flexibility { flexibility: 2e-3 });
        couplings.insert(ball, ball, InfluenceFunction::Flexibility { flexibility: 1e-3 });
        couplings.insert(plane, ball, InfluenceFunction::Constant { coupling: 5e-4 });
        let contacts = vec![vec![contact(plane, ball, -1e-3, 0.0), contact(plane, ball, -1e-3, 0.0)]];

        let fresh = MaxwellStep::assemble(&contacts, 0.0, &couplings, None).unwrap();
        assert!((fresh.influence_matrix()[(0, 1)] - 4e-3).abs() < 1e-15);

        let reused = MaxwellStep::assemble(&contacts, 0.0, &couplings, Some(&fresh)).unwrap();
        assert_eq!(reused.reused_coefficients(), 3);
        assert_eq!(reused.influence_matrix(), fresh.influence_matrix());

        // a third coincident point has no partner in the previous step
        let mut more = contacts.clone();
        more[0].push(contact(plane, ball, -1e-3, 0.0));
        let grown = MaxwellStep::assemble(&more, 0.0, &couplings, Some(&fresh)).unwrap();
        let c = grown.influence_matrix();
        assert_eq!(grown.reused_coefficients(), 3);
        assert!((c[(0, 2)] - 4e-3).abs() < 1e-15);
        assert!((c[(2, 2)] - 3e-3).abs() < 1e-15);
    }

    #[test]
    fn test_gap_of_missing_contact_is_rejected() {
        let (couplings, plane, ball) = setup();
        let contacts = vec![vec![contact(plane, ball, -1e-3, 0.0)], vec![contact(plane, ball, -1e-3, 0.5)]];
        let mut step = MaxwellStep::assemble(&contacts, 0.0, &couplings, None).unwrap();
        let err = step.update_rigid_body_gap(&contacts[..1]).unwrap_err();
        assert!(err.is_config_error());
    }
}
