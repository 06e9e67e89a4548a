//! Maxwell contact on randomly generated contact sets.
//!
//! The influence matrix must stay symmetric whatever the influence functions
//! return, and every solve must satisfy the complementarity condition
//! `0 ≤ λ ⟂ C·λ + g ≥ 0`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use nalgebra::{DMatrix, DVector, Vector2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sim_force_law::{
    ContourArena, ContourId, GeneralizedForceLaw, InfluenceFunction, LcpStrategy, LinearComplementarityProblem,
    MaxwellOutcome, MaxwellParameters, MaxwellUnilateralConstraint, SingleContact,
    compute_coupling_coefficient, compute_influence_coefficient,
};

// ============================================================================
// Helpers
// ============================================================================

fn contours() -> (ContourArena, Vec<ContourId>) {
    let mut arena = ContourArena::new();
    let ids = ["plane", "ball", "beam"]
        .iter()
        .zip([1.0, 0.05, 0.3])
        .map(|(name, length)| arena.insert(*name, length).unwrap())
        .collect();
    (arena, ids)
}

fn random_contacts(rng: &mut StdRng, ids: &[ContourId], sets: usize, per_set: usize) -> Vec<Vec<SingleContact>> {
    (0..sets)
        .map(|_| {
            (0..per_set)
                .map(|_| {
                    let first = ids[rng.gen_range(0..ids.len())];
                    let second = ids[rng.gen_range(0..ids.len())];
                    SingleContact::new(first, second)
                        .with_gap(rng.gen_range(-1e-3..1e-3), rng.gen_range(-0.1..0.1))
                        .with_zeta(
                            Vector2::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)),
                            Vector2::new(rng.gen_range(0.0..1.0), 0.0),
                        )
                })
                .collect()
        })
        .collect()
}

/// A coupling that decays with distance and weighs the two arguments
/// differently, so `f(a, b) != f(b, a)`.
fn lopsided(scale: f64) -> InfluenceFunction {
    InfluenceFunction::custom(move |a, b| scale * (-(a - b).norm()).exp() * (1.0 + 0.5 * a.x - 0.25 * b.y))
}

fn assert_complementary(c: &DMatrix<f64>, g: &DVector<f64>, la: &DVector<f64>) {
    let w = c * la + g;
    for i in 0..la.len() {
        assert!(la[i] >= 0.0, "negative force {} at {i}", la[i]);
        assert!(w[i] >= -1e-9, "penetration {} at {i}", w[i]);
        assert!((la[i] * w[i]).abs() < 1e-9, "not complementary at {i}");
    }
}

// ============================================================================
// Influence matrix
// ============================================================================

/// Random contacts on three contours with non-symmetric custom couplings.
///
/// `C` is mirrored from its upper triangle and must be exactly symmetric.
#[test]
fn influence_matrix_is_symmetric() {
    let mut rng = StdRng::seed_from_u64(42);
    let (arena, ids) = contours();

    for trial in 0..20 {
        let mut law = MaxwellUnilateralConstraint::new(MaxwellParameters::default().with_contact_tolerance(1.0));
        for (k, &first) in ids.iter().enumerate() {
            for &second in &ids[k..] {
                law.add_contour_coupling(first, second, lopsided(rng.gen_range(1e-4..1e-3)))
                    .unwrap();
            }
        }
        law.initialize_contour_couplings(&arena).unwrap();

        let contacts = random_contacts(&mut rng, &ids, 3, 4);
        let step = law.assemble_step(&contacts).unwrap();
        assert_eq!(step.len(), 12, "trial {trial}");

        let c = step.influence_matrix();
        assert_eq!(c, &c.transpose(), "trial {trial}");

        let locations = step.locations();
        for i in 0..step.len() {
            assert_eq!(c[(i, i)], compute_influence_coefficient(law.couplings(), &locations[i]));
            for j in i + 1..step.len() {
                assert_eq!(
                    c[(i, j)],
                    compute_coupling_coefficient(law.couplings(), &locations[i], &locations[j])
                );
            }
        }
    }
}

// ============================================================================
// Solves
// ============================================================================

/// Contacts spread over two kinematics with flexible contours: each strategy
/// produces a complementary solution, and open contacts carry no force.
#[test]
fn random_solves_are_complementary() {
    let mut rng = StdRng::seed_from_u64(7);
    let (arena, ids) = contours();

    for strategy in [LcpStrategy::Standard, LcpStrategy::Lemke, LcpStrategy::ProjectedGaussSeidel] {
        let mut law = MaxwellUnilateralConstraint::new(MaxwellParameters::default())
            .with_lcp(LinearComplementarityProblem::new(strategy));
        for &id in &ids {
            law.add_contour_coupling(id, id, InfluenceFunction::Flexibility { flexibility: 1e-3 })
                .unwrap();
        }
        law.add_contour_coupling(ids[0], ids[1], InfluenceFunction::Constant { coupling: 2e-5 })
            .unwrap();
        law.initialize_contour_couplings(&arena).unwrap();

        for _ in 0..5 {
            let mut contacts = random_contacts(&mut rng, &ids, 2, 3);
            law.compute_smooth_forces(&mut contacts).unwrap();

            for contact in contacts.iter().flatten() {
                if contact.g > 0.0 {
                    assert_eq!(contact.la, 0.0);
                }
            }

            let step = law.last_step().unwrap();
            let la = DVector::from_iterator(
                step.len(),
                step.possible_contact_points()
                    .iter()
                    .map(|index| contacts[index.kinematics][index.point].la),
            );
            assert_complementary(step.influence_matrix(), step.rigid_body_gap(), &la);
        }
    }
}

/// A ball resting on a plane over several steps: the second step reuses all
/// coefficients and the warm start, and yields the same forces.
#[test]
fn resting_contact_reuses_previous_step() {
    let (arena, ids) = contours();
    let (plane, ball) = (ids[0], ids[1]);

    let mut law = MaxwellUnilateralConstraint::new(MaxwellParameters::default());
    law.add_contour_coupling(plane, plane, InfluenceFunction::Flexibility { flexibility: 1e-3 })
        .unwrap();
    law.add_contour_coupling(ball, ball, InfluenceFunction::Flexibility { flexibility: 1e-3 })
        .unwrap();
    law.initialize_contour_couplings(&arena).unwrap();

    let at = |s: f64, g: f64| {
        SingleContact::new(plane, ball)
            .with_gap(g, 0.0)
            .with_zeta(Vector2::new(s, 0.0), Vector2::new(s, 0.0))
    };
    let mut contacts = vec![vec![at(0.0, -2e-4), at(0.5, -4e-4)]];

    let first = law.compute_smooth_forces(&mut contacts).unwrap();
    assert!(matches!(first, MaxwellOutcome::Solved { contacts: 2, .. }));
    let forces: Vec<f64> = contacts[0].iter().map(|c| c.la).collect();
    assert!((forces[0] - 0.1).abs() < 1e-9);
    assert!((forces[1] - 0.2).abs() < 1e-9);

    law.compute_smooth_forces(&mut contacts).unwrap();
    assert_eq!(law.last_step().unwrap().reused_coefficients(), 3);
    for (contact, expected) in contacts[0].iter().zip(&forces) {
        assert!((contact.la - expected).abs() < 1e-9);
    }
}

/// The Maxwell law plugged in as an ordinary normal law.
#[test]
fn maxwell_through_generalized_force_law() {
    let (arena, ids) = contours();
    let mut maxwell = MaxwellUnilateralConstraint::new(MaxwellParameters::default());
    maxwell
        .add_contour_coupling_by_name("beam", "beam", InfluenceFunction::Flexibility { flexibility: 5e-4 })
        .unwrap();
    maxwell.initialize_contour_couplings(&arena).unwrap();

    let mut law = GeneralizedForceLaw::maxwell(maxwell);
    assert!(!law.is_set_valued());
    assert!(law.is_active(-1e-4, 0.0));

    let mut contacts = vec![vec![
        SingleContact::new(ids[2], ids[1])
            .with_gap(-1e-4, 0.0)
            .with_zeta(Vector2::zeros(), Vector2::zeros()),
    ]];
    law.compute_smooth_forces(&mut contacts).unwrap();
    assert!((contacts[0][0].la - 0.2).abs() < 1e-9);

    // nothing in contact: forces cleared, no error
    contacts[0][0].g = 1e-2;
    law.compute_smooth_forces(&mut contacts).unwrap();
    assert_eq!(contacts[0][0].la, 0.0);
}
