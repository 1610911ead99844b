//! Fourier-Motzkin elimination and bound reduction.
//!
//! The elimination engine projects variables out of `a·x <= c` systems by
//! pairwise-combining upper- and lower-bound rows, tightens or relaxes
//! per-variable bounds, and detects inconsistency exactly.
//!
//! ## Algorithm
//!
//! 1. Partition rows by the sign of the eliminated variable's coefficient
//! 2. Normalize positive rows to coefficient `+1`, negative rows to `-1`
//!    (the dark-shadow variant first tightens the negative rows' constants)
//! 3. Every (positive, negative) pair sums to a row without the variable
//! 4. `reduce` merges redundant bounds and reports contradictions
//!
//! ## References
//!
//! - Dantzig & Eaves: "Fourier-Motzkin Elimination and Its Dual" (1973)
//! - Pugh: "The Omega Test" (1991), for the dark-shadow tightening

use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{LinarithError, LinarithResult};
use crate::matrix::{check_same_shape, ConstraintMatrix};
use crate::rat;

/// Configuration for the elimination engine.
#[derive(Debug, Clone)]
pub struct ElimConfig {
    /// Maximum rows a single elimination step may synthesize.
    pub max_rows: usize,
}

impl Default for ElimConfig {
    fn default() -> Self {
        Self { max_rows: 10_000 }
    }
}

/// Statistics for the elimination engine.
#[derive(Debug, Clone, Default)]
pub struct ElimStats {
    /// Variables eliminated.
    pub vars_eliminated: u64,
    /// Rows synthesized by pairwise combination.
    pub rows_generated: u64,
    /// Rows dropped as redundant or trivial.
    pub rows_dropped: u64,
    /// Inconsistencies detected.
    pub inconsistencies: u64,
}

/// Outcome of an elimination or reduction step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElimStatus {
    /// The system survived; here is the transformed matrix.
    Consistent(ConstraintMatrix),
    /// The system has no solution.
    Inconsistent,
    /// The row budget was exhausted before finishing; retry with a larger
    /// [`ElimConfig::max_rows`].
    ExceededBudget,
}

/// Comparison of two constant terms that may carry symbolic parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CstOrder {
    Known(std::cmp::Ordering),
    /// Symbolic parts differ, so the constants cannot be ordered.
    Unknown,
}

fn compare_csts(
    ca: &BigRational,
    sa: &[BigRational],
    cb: &BigRational,
    sb: &[BigRational],
) -> CstOrder {
    if sa == sb {
        CstOrder::Known(ca.cmp(cb))
    } else {
        CstOrder::Unknown
    }
}

/// Fourier-Motzkin elimination engine.
#[derive(Debug, Default)]
pub struct EliminationEngine {
    config: ElimConfig,
    stats: ElimStats,
}

impl EliminationEngine {
    /// Create with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with an explicit configuration.
    pub fn with_config(config: ElimConfig) -> Self {
        Self {
            config,
            stats: ElimStats::default(),
        }
    }

    /// Get statistics.
    pub fn stats(&self) -> &ElimStats {
        &self.stats
    }

    /// Eliminate variable `var` from the inequality system `leq`.
    ///
    /// When `darkshadow` is set, the constants of the lower-bound rows are
    /// tightened by one before normalization, shrinking the projection to the
    /// region whose every point extends to an *integer* value of `var`.
    pub fn eliminate(
        &mut self,
        var: usize,
        leq: &ConstraintMatrix,
        darkshadow: bool,
    ) -> LinarithResult<ElimStatus> {
        if var >= leq.cst_col() {
            return Err(LinarithError::DimensionMismatch {
                what: "eliminated variable index",
                expected: leq.cst_col(),
                found: var,
            });
        }

        // Fail fast: a row with no variables and a strictly negative constant
        // is 0 <= negative.
        for r in 0..leq.nrows() {
            if leq.row_vars_zero(r)
                && leq.row_sym_zero(r)
                && leq.get(r, leq.cst_col()).is_negative()
            {
                self.stats.inconsistencies += 1;
                debug!("elimination found 0 <= negative at row {r}");
                return Ok(ElimStatus::Inconsistent);
            }
        }

        let cst = leq.cst_col();
        let mut out = ConstraintMatrix::new(leq.ncols(), cst)?;
        let mut pos: Vec<Vec<BigRational>> = Vec::new();
        let mut neg: Vec<Vec<BigRational>> = Vec::new();
        let mut referencing = 0usize;
        let mut the_row = 0usize;

        for r in 0..leq.nrows() {
            let a = leq.get(r, var);
            if a.is_zero() {
                out.push_row(leq.row(r).to_vec())?;
                continue;
            }
            referencing += 1;
            the_row = r;
            let mut row = leq.row(r).to_vec();
            if a.is_negative() && darkshadow {
                row[cst] = &row[cst] - BigRational::one();
            }
            // Normalize the coefficient of `var` to +1 or -1.
            let scale = BigRational::one() / a.abs();
            for x in row.iter_mut() {
                if !x.is_zero() {
                    *x = rat::guard(&*x * &scale);
                }
            }
            if a.is_positive() {
                pos.push(row);
            } else {
                neg.push(row);
            }
        }

        if referencing == 1 {
            // Nothing to eliminate against; the row passes through unchanged.
            out.push_row(leq.row(the_row).to_vec())?;
        } else {
            for p in &pos {
                for n in &neg {
                    let mut combined: Vec<BigRational> = p
                        .iter()
                        .zip(n.iter())
                        .map(|(a, b)| rat::guard(a + b))
                        .collect();
                    combined[var] = BigRational::zero();
                    rat::normalize_content(&mut combined);
                    self.stats.rows_generated += 1;
                    out.push_row(combined)?;
                    if out.nrows() > self.config.max_rows {
                        return Ok(ElimStatus::ExceededBudget);
                    }
                }
            }
        }

        self.stats.vars_eliminated += 1;
        self.reduce(&out, true)
    }

    /// Merge redundant rows and detect contradictions.
    ///
    /// Duplicate and trivial `0 <= c` rows are dropped first. Rows that
    /// constrain exactly one variable are grouped per variable; within a
    /// group the tightest bound survives under intersection semantics
    /// (`is_intersect`) and the loosest under union semantics. Constants
    /// whose symbolic parts differ are incomparable and both rows are kept.
    pub fn reduce(
        &mut self,
        m: &ConstraintMatrix,
        is_intersect: bool,
    ) -> LinarithResult<ElimStatus> {
        let cst = m.cst_col();
        let mut removed: FxHashSet<usize> = FxHashSet::default();

        // Trivial and contradictory rows.
        for r in 0..m.nrows() {
            if m.row_vars_zero(r) {
                if !m.row_sym_zero(r) {
                    continue; // incomparable, keep
                }
                if m.get(r, cst).is_negative() {
                    self.stats.inconsistencies += 1;
                    debug!("reduce found 0 <= negative at row {r}");
                    return Ok(ElimStatus::Inconsistent);
                }
                removed.insert(r);
            }
        }

        // Exact duplicates.
        for a in 0..m.nrows() {
            if removed.contains(&a) {
                continue;
            }
            for b in (a + 1)..m.nrows() {
                if !removed.contains(&b) && m.rows_equal(a, b) {
                    removed.insert(b);
                }
            }
        }

        // Per-variable bound groups. A row constraining exactly one variable
        // with coefficient a is normalized by dividing by a (sign included):
        //   a > 0:  x <= c/a + (s/a)·σ       (upper bound)
        //   a < 0:  x >= c/a + (s/a)·σ       (lower bound)
        struct Bound {
            row: usize,
            cnorm: BigRational,
            snorm: Vec<BigRational>,
        }
        let mut uppers: FxHashMap<usize, Vec<Bound>> = FxHashMap::default();
        let mut lowers: FxHashMap<usize, Vec<Bound>> = FxHashMap::default();

        for r in 0..m.nrows() {
            if removed.contains(&r) {
                continue;
            }
            let nonzero: Vec<usize> = (0..cst).filter(|&j| !m.get(r, j).is_zero()).collect();
            if nonzero.len() != 1 {
                continue;
            }
            let var = nonzero[0];
            let a = m.get(r, var).clone();
            let cnorm = rat::guard(m.get(r, cst) / &a);
            let snorm: Vec<BigRational> = (cst + 1..m.ncols())
                .map(|j| rat::guard(m.get(r, j) / &a))
                .collect();
            let bound = Bound { row: r, cnorm, snorm };
            if a.is_positive() {
                uppers.entry(var).or_default().push(bound);
            } else {
                lowers.entry(var).or_default().push(bound);
            }
        }

        // Within a class, keep one row per symbolic signature.
        // Uppers: intersection keeps the minimum, union the maximum.
        // Lowers: intersection keeps the maximum, union the minimum.
        fn retain_best(
            bounds: &FxHashMap<usize, Vec<Bound>>,
            keep_max: bool,
            removed: &mut FxHashSet<usize>,
        ) {
            for group in bounds.values() {
                let mut best: FxHashMap<&[BigRational], &Bound> = FxHashMap::default();
                for b in group {
                    match best.get(b.snorm.as_slice()) {
                        None => {
                            best.insert(b.snorm.as_slice(), b);
                        }
                        Some(cur) => {
                            let better = if keep_max {
                                b.cnorm > cur.cnorm
                            } else {
                                b.cnorm < cur.cnorm
                            };
                            if better {
                                removed.insert(cur.row);
                                best.insert(b.snorm.as_slice(), b);
                            } else {
                                removed.insert(b.row);
                            }
                        }
                    }
                }
            }
        }
        retain_best(&uppers, !is_intersect, &mut removed);
        retain_best(&lowers, is_intersect, &mut removed);

        // Cross-check retained lower bounds against retained upper bounds.
        for (var, ups) in &uppers {
            let Some(lows) = lowers.get(var) else { continue };
            for u in ups.iter().filter(|u| !removed.contains(&u.row)) {
                for l in lows.iter().filter(|l| !removed.contains(&l.row)) {
                    if let CstOrder::Known(std::cmp::Ordering::Greater) =
                        compare_csts(&l.cnorm, &l.snorm, &u.cnorm, &u.snorm)
                    {
                        self.stats.inconsistencies += 1;
                        debug!("reduce: lower bound exceeds upper bound for variable {var}");
                        return Ok(ElimStatus::Inconsistent);
                    }
                }
            }
        }

        self.stats.rows_dropped += removed.len() as u64;
        Ok(ElimStatus::Consistent(
            m.filter_rows(|r| !removed.contains(&r)),
        ))
    }

    /// Decide whether the combined system `leq` ∧ `eq` has a solution.
    ///
    /// Equalities are converted to inequality pairs, then every variable is
    /// eliminated in turn; any `0 <= negative` residue is a contradiction.
    /// A blown row budget is reported as consistent (conservative).
    pub fn is_consistent(
        &mut self,
        leq: &ConstraintMatrix,
        eq: &ConstraintMatrix,
    ) -> LinarithResult<bool> {
        let mut cur = merge_with_equalities(leq, eq)?;
        for var in 0..cur.cst_col() {
            match self.eliminate(var, &cur, false)? {
                ElimStatus::Consistent(next) => cur = next,
                ElimStatus::Inconsistent => return Ok(false),
                ElimStatus::ExceededBudget => {
                    debug!("is_consistent: row budget exhausted, answering consistent");
                    return Ok(true);
                }
            }
        }
        Ok(true)
    }

    /// Per-variable bound systems.
    ///
    /// Slot `i` of the result holds the system obtained by eliminating every
    /// variable except `i`, i.e. the projection of the polyhedron onto `i`.
    pub fn bound(
        &mut self,
        leq: &ConstraintMatrix,
        eq: &ConstraintMatrix,
    ) -> LinarithResult<Vec<ElimStatus>> {
        let base = merge_with_equalities(leq, eq)?;
        let nvars = base.cst_col();
        let mut slots = Vec::with_capacity(nvars);
        for i in 0..nvars {
            let mut cur = base.clone();
            let mut slot = None;
            for j in 0..nvars {
                if j == i {
                    continue;
                }
                match self.eliminate(j, &cur, false)? {
                    ElimStatus::Consistent(next) => cur = next,
                    other => {
                        slot = Some(other);
                        break;
                    }
                }
            }
            slots.push(slot.unwrap_or(ElimStatus::Consistent(cur)));
        }
        Ok(slots)
    }

    /// Union or intersect a list of convex hulls through their per-variable
    /// bounds.
    ///
    /// Every hull is projected onto each variable via [`Self::bound`]; all
    /// resulting bound rows are accumulated into one system and [`Self::reduce`]d
    /// under the requested semantics. An inconsistent result of an
    /// intersection means the hulls do not overlap.
    pub fn union_or_intersect_hulls(
        &mut self,
        hulls: &[ConstraintMatrix],
        is_intersect: bool,
    ) -> LinarithResult<ElimStatus> {
        let first = hulls
            .first()
            .ok_or(LinarithError::EmptySystem("no hulls to combine"))?;
        let empty_eq = ConstraintMatrix::new(first.ncols(), first.cst_col())?;
        let mut acc = ConstraintMatrix::new(first.ncols(), first.cst_col())?;

        for hull in hulls {
            check_same_shape(first, hull)?;
            let slots = self.bound(hull, &empty_eq)?;
            let mut hull_empty = false;
            let mut hull_rows: Vec<Vec<BigRational>> = Vec::new();
            for slot in &slots {
                match slot {
                    ElimStatus::Consistent(m) => {
                        hull_rows.extend(m.iter_rows().map(|r| r.to_vec()));
                    }
                    ElimStatus::Inconsistent => {
                        hull_empty = true;
                        break;
                    }
                    ElimStatus::ExceededBudget => return Ok(ElimStatus::ExceededBudget),
                }
            }
            if hull_empty {
                if is_intersect {
                    // Intersecting with an empty hull empties everything.
                    self.stats.inconsistencies += 1;
                    return Ok(ElimStatus::Inconsistent);
                }
                continue; // an empty hull contributes nothing to a union
            }
            for row in hull_rows {
                acc.push_row(row)?;
            }
        }

        self.reduce(&acc, is_intersect)
    }
}

/// Append each equality row of `eq` to `leq` as a `<=` / `>=` pair.
pub(crate) fn merge_with_equalities(
    leq: &ConstraintMatrix,
    eq: &ConstraintMatrix,
) -> LinarithResult<ConstraintMatrix> {
    if eq.nrows() > 0 {
        check_same_shape(leq, eq)?;
    }
    let mut out = leq.clone();
    for r in 0..eq.nrows() {
        out.push_row(eq.row(r).to_vec())?;
        out.push_row(eq.row(r).iter().map(|x| -x).collect())?;
    }
    Ok(out)
}
