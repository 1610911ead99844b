//! End-to-end scenarios across the elimination, simplex, double-description
//! and branch-and-bound layers.

use linarith_core::{
    ConstraintMatrix, DdConverter, DdStatus, ElimStatus, EliminationEngine, MipSolver, MipStatus,
    SimplexSolver, SimplexStatus, Solution,
};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Signed;

fn rational(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

fn objective(coeffs: &[i64]) -> Vec<BigRational> {
    coeffs.iter().map(|&c| rational(c)).collect()
}

fn empty(ncols: usize, cst: usize) -> ConstraintMatrix {
    ConstraintMatrix::new(ncols, cst).unwrap()
}

fn success_simplex(status: SimplexStatus) -> Solution {
    match status {
        SimplexStatus::Success(s) => s,
        other => panic!("expected Success, got {other:?}"),
    }
}

/// The triangle-ish region x >= 0, y >= 0, x + y <= 4, x <= 3 as `a·x <= c`
/// rows, with the sign constraints folded in.
fn quad_region() -> ConstraintMatrix {
    ConstraintMatrix::from_rows(&[&[-1, 0, 0], &[0, -1, 0], &[1, 1, 4], &[1, 0, 3]], 2).unwrap()
}

#[test]
fn scenario_feasibility_and_bounds() {
    let leq = quad_region();
    let eq = empty(3, 2);
    let mut engine = EliminationEngine::new();
    assert!(engine.is_consistent(&leq, &eq).unwrap());

    let slots = engine.bound(&leq, &eq).unwrap();
    let x_bounds = match &slots[0] {
        ElimStatus::Consistent(m) => m,
        other => panic!("expected a consistent bound system, got {other:?}"),
    };
    // Projection onto x is exactly 0 <= x <= 3.
    assert!(x_bounds.satisfied_as_leq(&[rational(0), rational(0)]));
    assert!(x_bounds.satisfied_as_leq(&[rational(3), rational(0)]));
    assert!(!x_bounds.satisfied_as_leq(&[rational(4), rational(0)]));
    assert!(!x_bounds.satisfied_as_leq(&[rational(-1), rational(0)]));
}

#[test]
fn scenario_maximize_over_region() {
    let leq = ConstraintMatrix::from_rows(&[&[1, 1, 4], &[1, 0, 3]], 2).unwrap();
    let vc = ConstraintMatrix::vc_all_nonneg(2);
    let mut solver = SimplexSolver::new();
    let sol = success_simplex(
        solver
            .maximize(&objective(&[1, 1, 0]), &vc, &empty(3, 2), &leq)
            .unwrap(),
    );
    assert_eq!(sol.value, rational(4));
    assert_eq!(&sol.point[0] + &sol.point[1], rational(4));
    assert!(leq.satisfied_as_leq(&sol.point));
    assert!(!sol.point[0].is_negative() && !sol.point[1].is_negative());
}

#[test]
fn scenario_infeasible_system_both_layers() {
    // x >= 0 and x <= -1.
    let elim_view = ConstraintMatrix::from_rows(&[&[-1, 0], &[1, -1]], 1).unwrap();
    let mut engine = EliminationEngine::new();
    assert!(!engine.is_consistent(&elim_view, &empty(2, 1)).unwrap());

    let leq = ConstraintMatrix::from_rows(&[&[1, -1]], 1).unwrap();
    let vc = ConstraintMatrix::vc_all_nonneg(1);
    let mut solver = SimplexSolver::new();
    let status = solver
        .maximize(&objective(&[1, 0]), &vc, &empty(2, 1), &leq)
        .unwrap();
    assert_eq!(status, SimplexStatus::NoFeasibleSolution);
}

#[test]
fn scenario_integer_branching() {
    // max x + 5y s.t. y - x <= 2, 5x + 6y <= 27, x <= 4, x, y >= 0 integer:
    // the relaxation peaks fractionally at (15/11, 37/11), the integer
    // optimum is 16 at (1, 3).
    let leq = ConstraintMatrix::from_rows(&[&[-1, 1, 2], &[5, 6, 27], &[1, 0, 4]], 2).unwrap();
    let vc = ConstraintMatrix::vc_all_nonneg(2);
    let mut solver = MipSolver::new();
    let status = solver
        .maximize_integer(
            &objective(&[1, 5, 0]),
            &vc,
            &empty(3, 2),
            &leq,
            false,
            &[false, false],
        )
        .unwrap();
    let sol = match status {
        MipStatus::Success(s) => s,
        other => panic!("expected Success, got {other:?}"),
    };
    assert_eq!(sol.value, rational(16));
    assert_eq!(sol.point, vec![rational(1), rational(3)]);
    assert!(solver.stats().nodes > 1);
}

#[test]
fn scenario_ray_round_trip() {
    // Triangle x >= 0, y >= 0, x + y <= 4 in H-representation.
    let h = ConstraintMatrix::from_rows(&[&[1, 0, 0], &[0, 1, 0], &[-1, -1, 4]], 2).unwrap();
    let mut dd = DdConverter::new();
    let rays = match dd.to_rays(&h).unwrap() {
        DdStatus::Feasible(m) => m,
        DdStatus::Infeasible => panic!("triangle is nonempty"),
    };
    let back = match dd.to_constraints(&rays).unwrap() {
        DdStatus::Feasible(m) => m,
        DdStatus::Infeasible => panic!("triangle is nonempty"),
    };

    // The reconstruction must describe the same region, up to row order and
    // scaling: probe with points on both sides of every original facet.
    let accepts = |m: &ConstraintMatrix, x: i64, y: i64| {
        (0..m.nrows()).all(|r| {
            let v = m.eval_row(r, &[rational(x), rational(y)]) + m.get(r, 2);
            !v.is_negative()
        })
    };
    for (x, y) in [(0, 0), (4, 0), (0, 4), (1, 2), (2, 2)] {
        assert!(accepts(&back, x, y), "({x}, {y}) should be inside");
    }
    for (x, y) in [(-1, 0), (0, -1), (3, 2), (5, 0), (0, 5)] {
        assert!(!accepts(&back, x, y), "({x}, {y}) should be outside");
    }
}

#[test]
fn scenario_hull_intersection() {
    // [0, 3] x [0, 3] intersected with [2, 5] x [2, 5] is [2, 3] x [2, 3].
    let a = ConstraintMatrix::from_rows(&[&[-1, 0, 0], &[0, -1, 0], &[1, 0, 3], &[0, 1, 3]], 2)
        .unwrap();
    let b = ConstraintMatrix::from_rows(&[&[-1, 0, -2], &[0, -1, -2], &[1, 0, 5], &[0, 1, 5]], 2)
        .unwrap();
    let mut engine = EliminationEngine::new();
    let status = engine.union_or_intersect_hulls(&[a, b], true).unwrap();
    let m = match status {
        ElimStatus::Consistent(m) => m,
        other => panic!("expected overlap, got {other:?}"),
    };
    assert!(m.satisfied_as_leq(&[rational(2), rational(3)]));
    assert!(!m.satisfied_as_leq(&[rational(1), rational(2)]));
    assert!(!m.satisfied_as_leq(&[rational(2), rational(4)]));
}
