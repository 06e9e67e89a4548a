//! Contact law behaviour as seen from an outer solver.
//!
//! Each test drives the laws through the calls a time-stepping scheme makes:
//! activity checks, proximal iterations until `is_fulfilled`, and
//! configuration round trips.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use sim_force_law::{
    ForceLawError, FrictionCoefficientFunction, FrictionForceLaw, FrictionImpactLaw, GeneralizedForceLaw,
    GeneralizedImpactLaw, NormalForceFunction, UnilateralNewtonImpact, XmlConfig,
};

// ============================================================================
// Normal direction
// ============================================================================

/// Single unilateral contact, first open then penetrating.
///
/// Configuration:
/// - `g = 0.01`, `gTol = 0`: open
/// - `g = -0.001`, `gTol = 0`: closed
/// - approaching with `gdn = -0.5`, `r = 1`: one projection gives `λ = 0.5`
#[test]
fn single_unilateral_contact_scenario() {
    let law = GeneralizedForceLaw::Unilateral;

    assert!(!law.is_active(0.01, 0.0));
    assert!(law.is_active(-0.001, 0.0));
    assert_eq!(law.project(0.0, -0.5, 1.0, 0.0), 0.5);
}

#[test]
fn activity_is_boundary_inclusive_for_unilateral_laws() {
    let laws = [
        GeneralizedForceLaw::Unilateral,
        GeneralizedForceLaw::RegularizedUnilateral { force_function: None },
    ];
    for law in &laws {
        for g_tol in [0.0, 1e-6, -1e-6] {
            for g in [g_tol - 1e-9, g_tol, g_tol + 1e-9] {
                assert_eq!(law.is_active(g, g_tol), g <= g_tol, "{} at g={g}", law.type_name());
            }
        }
    }
}

#[test]
fn projection_is_idempotent_once_feasible() {
    let unilateral = GeneralizedForceLaw::Unilateral;
    let bilateral = GeneralizedForceLaw::Bilateral;
    for la in [0.0, 0.25, 3.0, 1e4] {
        for r in [0.1, 1.0, 7.5] {
            assert_eq!(unilateral.project(la, 0.0, r, 0.0), la);
            assert_eq!(bilateral.project(la, 0.0, r, 0.0), la);
        }
    }
}

#[test]
fn bilateral_projection_is_never_clamped() {
    let law = GeneralizedForceLaw::Bilateral;
    for (la, gdn, r) in [(0.0, 1.0, 1.0), (-2.0, 3.0, 0.5), (5.0, -1.0, 2.0)] {
        assert_eq!(law.project(la, gdn, r, 0.0), la - r * gdn);
    }
}

/// Fixed-point iteration `λ ← prox(λ - r·(W·λ + h))` for one contact with
/// Delassus scalar `W = 2` and free acceleration `h = -3` converges to
/// `λ = 1.5`, where the direct solve lands in one step.
#[test]
fn proximal_iteration_reaches_direct_solution() {
    let law = GeneralizedForceLaw::Unilateral;
    let (w, h) = (2.0, -3.0);
    let r = 0.3;

    let mut la: f64 = 0.0;
    for _ in 0..200 {
        let gdn = w * la + h;
        if law.is_fulfilled(la, gdn, 1e-10, 1e-10, 0.0) {
            break;
        }
        la = law.project(la, gdn, r, 0.0);
    }

    assert_relative_eq!(la, law.solve(w, h), epsilon = 1e-9);
    assert_relative_eq!(la, 1.5, epsilon = 1e-9);
}

// ============================================================================
// Impacts
// ============================================================================

#[test]
fn newton_restitution_vanishes_for_slow_and_separating_contacts() {
    let newton = UnilateralNewtonImpact::new(0.9);
    let law = GeneralizedImpactLaw::UnilateralNewton(newton);

    // elastic part tends to zero as the approach speed does
    let speeds = [1e-2, 1e-3, 1e-4, 1e-5];
    let elastic: Vec<f64> = speeds.iter().map(|s| newton.elastic_velocity(-s).abs()).collect();
    assert!(elastic.windows(2).all(|w| w[1] < w[0]));
    assert!(elastic[3] < 1e-9);

    // no restitution impulse for a separating contact
    for gda in [0.0, 0.1, 2.0] {
        assert_eq!(newton.elastic_velocity(gda), 0.0);
        assert_eq!(law.solve(1.0, 0.0, gda), 0.0);
    }
}

#[test]
fn newton_impact_reverses_fast_approach() {
    let law = GeneralizedImpactLaw::UnilateralNewton(UnilateralNewtonImpact::new(0.5));
    // mass 2 hitting at 3 m/s: post-impact velocity 1.5 m/s
    let (w, gda) = (0.5, -3.0);
    let la = law.solve(w, gda, gda);
    let gdn = gda + w * la;
    assert_relative_eq!(gdn, 1.5, epsilon = 1e-12);
    assert!(law.is_fulfilled(la, gdn, gda, 1e-10, 1e-10, 0.0));
}

// ============================================================================
// Friction
// ============================================================================

#[test]
fn coulomb_projection_stays_in_cone() {
    let law = FrictionForceLaw::SpatialCoulomb { mu: 0.4 };
    let la_n = 2.5;
    let bound = 0.4 * la_n;
    for (x, y) in [(0.0, 0.0), (0.3, -0.2), (5.0, 1.0), (-7.0, -7.0), (0.0, 1.0)] {
        let la = DVector::from_vec(vec![x, y]);
        let gdn = DVector::from_vec(vec![y, -x]);
        let projected = law.project(&la, &gdn, la_n, 0.7);
        assert!(projected.norm() <= bound + 1e-12);

        let zero = DVector::zeros(2);
        if la.norm() <= bound {
            assert_eq!(law.project(&la, &zero, la_n, 0.7), la);
        }
    }
}

#[test]
fn friction_follows_normal_force() {
    let normal = GeneralizedForceLaw::Unilateral;
    let friction = FrictionForceLaw::PlanarCoulomb { mu: 0.5 };

    // normal solved first, friction uses the result
    let la_n = normal.solve(1.0, -4.0);
    let g = DMatrix::from_element(1, 1, 1.0);
    let la_t = friction.solve(&g, &DVector::from_element(1, 10.0), la_n);

    assert_relative_eq!(la_n, 4.0);
    assert_relative_eq!(la_t[0], -2.0);
    assert!(friction.is_fulfilled(&la_t, &DVector::from_element(1, 8.0), la_n, 1e-12, 1e-12));
}

#[test]
fn spatial_sliding_solution_lies_on_cone_boundary() {
    let law = FrictionForceLaw::SpatialCoulomb { mu: 0.3 };
    let g = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
    let gd = DVector::from_vec(vec![4.0, -3.0]);
    let la_n = 1.0;

    let la = law.solve(&g, &gd, la_n);
    assert_relative_eq!(la.norm(), 0.3, epsilon = 1e-9);

    // optimality on the disc: the force opposes the resulting slip
    let slip = &g * &la + &gd;
    let cosine = la.dot(&slip) / (la.norm() * slip.norm());
    assert_relative_eq!(cosine, -1.0, epsilon = 1e-6);
}

#[test]
fn stribeck_impact_sticks_inside_cone() {
    let law = FrictionImpactLaw::SpatialStribeck {
        fmu: FrictionCoefficientFunction::stribeck(0.6, 0.4, 0.05),
    };
    let zero = DVector::zeros(2);
    let la = DVector::from_vec(vec![0.3, 0.3]);
    assert!(law.is_sticking(&la, &zero, &zero, 1.0, 1e-9, 1e-9));
    assert!(!law.is_sticking(&(la * 2.0), &zero, &zero, 1.0, 1e-9, 1e-9));
}

/// An outer solver classifies force and impact friction with the same calls.
#[test]
fn friction_families_share_set_valued_dispatch() {
    let force = FrictionForceLaw::SpatialCoulomb { mu: 0.4 };
    let impact = FrictionImpactLaw::SpatialCoulomb { mu: 0.4 };
    let slip = DVector::from_vec(vec![1e-10, 0.0]);

    assert_eq!(force.is_set_valued(), impact.is_set_valued());
    assert_eq!(force.is_sticking(&slip, 1e-9), impact.is_sticking_velocity(&slip, 1e-9));
    assert!(impact.is_sticking_velocity(&slip, 1e-9));
    assert!(!impact.is_sticking_velocity(&(slip * 100.0), 1e-9));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn planar_coulomb_round_trip() {
    let law = FrictionForceLaw::PlanarCoulomb { mu: 0.3 };
    let xml = law.to_xml_string().unwrap();
    assert!(xml.contains("<frictionCoefficient>0.3</frictionCoefficient>"));

    let back = FrictionForceLaw::from_xml_str(&xml).unwrap();
    assert_eq!(back.friction_coefficient(0.0), 0.3);
    assert_eq!(back.friction_directions(), 1);
}

#[test]
fn custom_functions_cannot_be_written() {
    let law = GeneralizedForceLaw::regularized_unilateral(NormalForceFunction::custom(|g, _| -g));
    let err = law.to_xml().unwrap_err();
    assert!(matches!(err, ForceLawError::Unserializable { .. }));
}
