//! Double description: halfspace (H) ↔ generator (V) representation.
//!
//! A polyhedron can be described by inequality rows `a·x + b >= 0` or by
//! generators in homogeneous coordinates, where an affine coordinate of 1
//! marks a vertex and 0 marks a ray. Both conversion directions reduce to one
//! exact-arithmetic core: computing the generators of a cone
//! `{ y : M·y >= 0 }` one constraint row at a time.
//!
//! ## Algorithm
//!
//! The generator set starts as bidirectional unit generators (lines). For
//! each constraint row, the first line with a nonzero value is oriented into
//! a ray and used to cancel the row's value in every other generator; once no
//! line remains, generators are partitioned by sign, every
//! (negative, positive) pair is combined with the minimal integer multipliers
//! that cancel the row, and a combined generator is discarded when another
//! generator's saturated set contains the pair's common saturated set
//! (zero-pattern redundancy pruning). Negative generators are dropped. A
//! constraint no remaining generator can satisfy empties the cone and the
//! conversion reports infeasible.
//!
//! ## References
//!
//! - Motzkin et al.: "The Double Description Method" (1953)
//! - Fukuda & Prodon: "Double Description Method Revisited" (1996)

use num_rational::BigRational;
use num_traits::{Signed, Zero};
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{LinarithError, LinarithResult};
use crate::matrix::ConstraintMatrix;
use crate::rat;

/// Saturated-constraint index set, kept sorted ascending.
type SatSet = SmallVec<[usize; 16]>;

/// Outcome of a representation conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdStatus {
    /// The polyhedron is nonempty; here is the converted representation.
    Feasible(ConstraintMatrix),
    /// The polyhedron is empty (or, for `to_constraints`, the generator
    /// matrix describes one).
    Infeasible,
}

/// Statistics for the double-description converter.
#[derive(Debug, Clone, Default)]
pub struct DdStats {
    /// Constraint rows processed.
    pub rows_processed: u64,
    /// Lines oriented into rays.
    pub lines_oriented: u64,
    /// (negative, positive) pairs combined into new generators.
    pub pairs_combined: u64,
    /// Candidate generators pruned by the zero-pattern test.
    pub rays_pruned: u64,
}

#[derive(Debug, Clone)]
struct Generator {
    coords: Vec<BigRational>,
    sat: SatSet,
    is_line: bool,
}

/// Exact double-description converter.
#[derive(Debug, Default)]
pub struct DdConverter {
    stats: DdStats,
}

impl DdConverter {
    /// Create a converter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get statistics.
    pub fn stats(&self) -> &DdStats {
        &self.stats
    }

    /// Convert an H-representation (`a·x + b >= 0` rows, constant at
    /// `cst_col`) into a generator matrix.
    ///
    /// Output rows are homogeneous generators; the coordinate at `cst_col`
    /// is 1 for vertices and 0 for rays, and remaining lines are emitted as
    /// two opposite rays. Reports [`DdStatus::Infeasible`] when no generator
    /// carries a positive affine coordinate, i.e. the polyhedron is empty.
    pub fn to_rays(&mut self, cs: &ConstraintMatrix) -> LinarithResult<DdStatus> {
        check_no_symbolic(cs)?;
        let cst = cs.cst_col();
        let dim = cst + 1;

        let mut rows: Vec<Vec<BigRational>> = cs
            .iter_rows()
            .map(|r| r[..dim].to_vec())
            .collect();
        // Homogenization: the affine coordinate is itself nonnegative.
        let mut lambda = vec![BigRational::zero(); dim];
        lambda[cst] = BigRational::from_integer(1.into());
        rows.push(lambda);

        let gens = self.dual_cone(&rows, dim);

        let mut out = ConstraintMatrix::new(dim, cst)?;
        let mut feasible = false;
        for g in &gens {
            if g.is_line {
                // A line saturates every row, including λ >= 0, so its affine
                // coordinate is zero; emit both directions.
                out.push_row(normalized(&g.coords))?;
                out.push_row(normalized(&g.coords.iter().map(|x| -x).collect::<Vec<_>>()))?;
                continue;
            }
            let affine = &g.coords[cst];
            if affine.is_positive() {
                feasible = true;
                let scale = BigRational::from_integer(1.into()) / affine;
                out.push_row(g.coords.iter().map(|x| rat::guard(x * &scale)).collect())?;
            } else {
                debug_assert!(affine.is_zero(), "λ >= 0 was enforced");
                out.push_row(normalized(&g.coords))?;
            }
        }

        if feasible {
            Ok(DdStatus::Feasible(out))
        } else {
            debug!("to_rays: no generator with positive affine coordinate");
            Ok(DdStatus::Infeasible)
        }
    }

    /// Convert a generator matrix back into an H-representation.
    ///
    /// Requires at least one generator with a nonzero affine component;
    /// otherwise the polyhedron is empty. Remaining lines of the constraint
    /// cone are emitted as inequality pairs (equalities), and trivial rows
    /// (`0·x + b >= 0`) are dropped.
    pub fn to_constraints(&mut self, rays: &ConstraintMatrix) -> LinarithResult<DdStatus> {
        check_no_symbolic(rays)?;
        let cst = rays.cst_col();
        let dim = cst + 1;

        let has_affine = (0..rays.nrows()).any(|r| !rays.get(r, cst).is_zero());
        if !has_affine {
            debug!("to_constraints: no generator carries an affine component");
            return Ok(DdStatus::Infeasible);
        }

        // Valid inequalities h satisfy h·g >= 0 for every generator g: the
        // constraint cone is the dual of the generator rows.
        let rows: Vec<Vec<BigRational>> = rays.iter_rows().map(|r| r[..dim].to_vec()).collect();
        let gens = self.dual_cone(&rows, dim);

        let mut out = ConstraintMatrix::new(dim, cst)?;
        for g in &gens {
            let trivial = g.coords[..cst].iter().all(|x| x.is_zero());
            if trivial {
                continue;
            }
            out.push_row(normalized(&g.coords))?;
            if g.is_line {
                out.push_row(normalized(&g.coords.iter().map(|x| -x).collect::<Vec<_>>()))?;
            }
        }
        Ok(DdStatus::Feasible(out))
    }

    /// Generators of the cone `{ y : rows·y >= 0 }`.
    fn dual_cone(&mut self, rows: &[Vec<BigRational>], dim: usize) -> Vec<Generator> {
        let mut gens: Vec<Generator> = (0..dim)
            .map(|j| {
                let mut coords = vec![BigRational::zero(); dim];
                coords[j] = BigRational::from_integer(1.into());
                Generator {
                    coords,
                    sat: SatSet::new(),
                    is_line: true,
                }
            })
            .collect();

        for (i, a) in rows.iter().enumerate() {
            self.stats.rows_processed += 1;
            let vals: Vec<BigRational> = gens.iter().map(|g| dot(a, &g.coords)).collect();

            let line_hit = gens
                .iter()
                .zip(vals.iter())
                .position(|(g, v)| g.is_line && !v.is_zero());

            if let Some(li) = line_hit {
                self.stats.lines_oriented += 1;
                // Orient the line so its value on this row is positive; it
                // becomes a ray saturating every earlier row.
                let mut v0 = vals[li].clone();
                if v0.is_negative() {
                    for x in gens[li].coords.iter_mut() {
                        *x = -&*x;
                    }
                    v0 = -v0;
                }
                gens[li].is_line = false;
                gens[li].sat = (0..i).collect();
                let pivot = gens[li].coords.clone();

                for (j, g) in gens.iter_mut().enumerate() {
                    if j == li {
                        continue;
                    }
                    let vj = &vals[j];
                    if !vj.is_zero() {
                        // g := v0·g − vj·pivot, which zeroes this row's value
                        // and stays in the cone because ±pivot was a line.
                        for (x, p) in g.coords.iter_mut().zip(pivot.iter()) {
                            *x = rat::guard(&(&*x * &v0) - &(vj * p));
                        }
                        rat::normalize_content(&mut g.coords);
                    }
                    if !g.is_line {
                        g.sat.push(i);
                    }
                }
            } else {
                // All lines already saturate this row; partition the rays.
                let mut keep: Vec<Generator> = Vec::new();
                let mut pos: Vec<(Generator, BigRational)> = Vec::new();
                let mut neg: Vec<(Generator, BigRational)> = Vec::new();
                for (g, v) in gens.into_iter().zip(vals.into_iter()) {
                    if g.is_line || v.is_zero() {
                        let mut g = g;
                        if !g.is_line {
                            g.sat.push(i);
                        }
                        keep.push(g);
                    } else if v.is_positive() {
                        pos.push((g, v));
                    } else {
                        neg.push((g, v));
                    }
                }

                let mut combined: Vec<Generator> = Vec::new();
                for (n, vn) in &neg {
                    for (p, vp) in &pos {
                        let common = intersect_sorted(&n.sat, &p.sat);
                        let dominated = keep
                            .iter()
                            .filter(|g| !g.is_line)
                            .chain(pos.iter().map(|(g, _)| g))
                            .chain(neg.iter().map(|(g, _)| g))
                            .chain(combined.iter())
                            .any(|g| {
                                !std::ptr::eq(g, n) && !std::ptr::eq(g, p) && is_subset(&common, &g.sat)
                            });
                        if dominated {
                            self.stats.rays_pruned += 1;
                            continue;
                        }
                        self.stats.pairs_combined += 1;
                        // (−vn)·p + vp·n cancels the row with positive weights.
                        let wn = -vn;
                        let mut coords: Vec<BigRational> = p
                            .coords
                            .iter()
                            .zip(n.coords.iter())
                            .map(|(pc, nc)| rat::guard(&(pc * &wn) + &(nc * vp)))
                            .collect();
                        rat::normalize_content(&mut coords);
                        let mut sat = common;
                        sat.push(i);
                        combined.push(Generator {
                            coords,
                            sat,
                            is_line: false,
                        });
                    }
                }

                for (g, v) in pos {
                    debug_assert!(v.is_positive());
                    keep.push(g);
                }
                keep.extend(combined);
                gens = keep;

                if gens.is_empty() {
                    debug!("dual_cone emptied at row {i}");
                    return gens;
                }
            }
        }
        gens
    }
}

fn check_no_symbolic(m: &ConstraintMatrix) -> LinarithResult<()> {
    if m.nsym() != 0 {
        return Err(LinarithError::DimensionMismatch {
            what: "symbolic-constant columns in ray conversion",
            expected: 0,
            found: m.nsym(),
        });
    }
    Ok(())
}

/// Rewrite `a·x <= c` rows as H-representation rows `(-a)·x + c >= 0`.
pub fn leq_to_hrep(leq: &ConstraintMatrix) -> LinarithResult<ConstraintMatrix> {
    let cst = leq.cst_col();
    let mut out = ConstraintMatrix::new(cst + 1, cst)?;
    for r in 0..leq.nrows() {
        let mut row: Vec<BigRational> = leq.row(r)[..cst].iter().map(|x| -x).collect();
        row.push(leq.get(r, cst).clone());
        out.push_row(row)?;
    }
    Ok(out)
}

/// Rewrite H-representation rows `a·x + b >= 0` as `(-a)·x <= b`.
pub fn hrep_to_leq(h: &ConstraintMatrix) -> LinarithResult<ConstraintMatrix> {
    leq_to_hrep(h)
}

fn dot(a: &[BigRational], b: &[BigRational]) -> BigRational {
    let mut acc = BigRational::zero();
    for (x, y) in a.iter().zip(b.iter()) {
        if !x.is_zero() && !y.is_zero() {
            acc = rat::mul_add(&acc, x, y);
        }
    }
    acc
}

fn normalized(coords: &[BigRational]) -> Vec<BigRational> {
    let mut v = coords.to_vec();
    rat::normalize_content(&mut v);
    v
}

fn intersect_sorted(a: &SatSet, b: &SatSet) -> SatSet {
    let mut out = SatSet::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn is_subset(a: &SatSet, b: &SatSet) -> bool {
    let mut j = 0;
    for &x in a {
        while j < b.len() && b[j] < x {
            j += 1;
        }
        if j >= b.len() || b[j] != x {
            return false;
        }
        j += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64) -> BigRational {
        BigRational::from_integer(n.into())
    }

    fn feasible(status: DdStatus) -> ConstraintMatrix {
        match status {
            DdStatus::Feasible(m) => m,
            DdStatus::Infeasible => panic!("expected feasible polyhedron"),
        }
    }

    /// Collect the vertex rows (affine coordinate 1) of a generator matrix.
    fn vertices(m: &ConstraintMatrix) -> Vec<Vec<BigRational>> {
        (0..m.nrows())
            .filter(|&r| !m.get(r, m.cst_col()).is_zero())
            .map(|r| m.row(r)[..m.cst_col()].to_vec())
            .collect()
    }

    #[test]
    fn test_triangle_to_rays() {
        // x >= 0, y >= 0, x + y <= 4 as H-rep rows a·x + b >= 0.
        let h = ConstraintMatrix::from_rows(&[&[1, 0, 0], &[0, 1, 0], &[-1, -1, 4]], 2).unwrap();
        let mut dd = DdConverter::new();
        let rays = feasible(dd.to_rays(&h).unwrap());
        let mut vs = vertices(&rays);
        vs.sort();
        assert_eq!(
            vs,
            vec![
                vec![rat(0), rat(0)],
                vec![rat(0), rat(4)],
                vec![rat(4), rat(0)],
            ]
        );
    }

    #[test]
    fn test_triangle_round_trip() {
        let h = ConstraintMatrix::from_rows(&[&[1, 0, 0], &[0, 1, 0], &[-1, -1, 4]], 2).unwrap();
        let mut dd = DdConverter::new();
        let rays = feasible(dd.to_rays(&h).unwrap());
        let back = feasible(dd.to_constraints(&rays).unwrap());

        // The reconstructed system must accept exactly the triangle.
        let inside: [&[i64; 2]; 4] = [&[0, 0], &[4, 0], &[0, 4], &[1, 2]];
        let outside: [&[i64; 2]; 3] = [&[5, 0], &[-1, 0], &[3, 2]];
        let sat = |m: &ConstraintMatrix, p: &[i64; 2]| {
            (0..m.nrows()).all(|r| {
                let v = m.eval_row(r, &[rat(p[0]), rat(p[1])]) + m.get(r, 2);
                !v.is_negative()
            })
        };
        for p in inside {
            assert!(sat(&back, p), "{p:?} should satisfy the reconstruction");
        }
        for p in outside {
            assert!(!sat(&back, p), "{p:?} should violate the reconstruction");
        }
    }

    #[test]
    fn test_unbounded_quadrant_has_rays() {
        // x >= 1, y >= 0: one vertex at (1, 0) plus two recession rays.
        let h = ConstraintMatrix::from_rows(&[&[1, 0, -1], &[0, 1, 0]], 2).unwrap();
        let mut dd = DdConverter::new();
        let rays = feasible(dd.to_rays(&h).unwrap());
        let vs = vertices(&rays);
        assert_eq!(vs, vec![vec![rat(1), rat(0)]]);
        let recession: Vec<_> = (0..rays.nrows())
            .filter(|&r| rays.get(r, 2).is_zero())
            .collect();
        assert_eq!(recession.len(), 2);
    }

    #[test]
    fn test_empty_polyhedron_infeasible() {
        // x >= 1 and x <= 0: -x + 0 >= 0 together with x - 1 >= 0.
        let h = ConstraintMatrix::from_rows(&[&[1, -1], &[-1, 0]], 1).unwrap();
        let mut dd = DdConverter::new();
        assert_eq!(dd.to_rays(&h).unwrap(), DdStatus::Infeasible);
    }

    #[test]
    fn test_to_constraints_requires_affine_generator() {
        // Two pure rays, no vertex: empty polyhedron.
        let rays = ConstraintMatrix::from_rows(&[&[1, 0, 0], &[0, 1, 0]], 2).unwrap();
        let mut dd = DdConverter::new();
        assert_eq!(dd.to_constraints(&rays).unwrap(), DdStatus::Infeasible);
    }

    #[test]
    fn test_leq_hrep_round_trip() {
        let leq = ConstraintMatrix::from_rows(&[&[1, 1, 4], &[-1, 0, 0]], 2).unwrap();
        let h = leq_to_hrep(&leq).unwrap();
        assert_eq!(*h.get(0, 0), rat(-1));
        assert_eq!(*h.get(0, 2), rat(4));
        let back = hrep_to_leq(&h).unwrap();
        assert_eq!(back, leq);
    }
}
