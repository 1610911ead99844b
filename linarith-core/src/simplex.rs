//! Exact two-phase rational simplex over constraint matrices.
//!
//! Maximizes (or, via duality, minimizes) a linear objective subject to a
//! `leq` system `A·x <= b`, an `eq` system, and per-variable sign
//! constraints. All arithmetic is exact rational with the magnitude guard of
//! [`crate::rat`] applied at every combination step.
//!
//! ## Algorithm
//!
//! The input is first normalized to standard form: every equality involving
//! exactly one sign-unconstrained variable substitutes that variable out,
//! remaining equalities become inequality pairs, and each remaining
//! unconstrained variable `v` is split into `v' - v''` with both parts
//! nonnegative. One slack variable per inequality turns the system into a
//! dictionary. When the all-slack basis is not immediately feasible, phase 1
//! maximizes `-xa` for an auxiliary variable `xa` added to every row; the
//! system is feasible exactly when that optimum is 0, after which `xa` is
//! pivoted out and its column deleted. Phase 2 then optimizes the real
//! objective.
//!
//! Cycling is prevented by a pivot-pair history: a realized
//! (entering, leaving) pair is never retried within one solve, which bounds
//! the pivot count by the number of distinct pairs. When every ratio-test
//! candidate for an entering column has been tried, the ratio test is relaxed
//! to ignore the sign restriction; a column with no candidate at all is
//! disabled for the remainder of the solve. Stalled solves fall back to
//! zero-coefficient entering columns and, only under
//! [`SimplexConfig::relax_negative_entering`], to objective-worsening ones.
//!
//! Minimization constructs the dual program
//! `min {c·x : A·x <= b, x >= 0} = max {(-b)·y : (-A^T)·y <= c, y >= 0}`
//! and reads the primal point off the dual optimum's slack reduced costs.
//!
//! ## References
//!
//! - Chvátal: "Linear Programming" (1983), chapters 2-5
//! - Bland: "New finite pivoting rules for the simplex method" (1977)

use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::{LinarithError, LinarithResult};
use crate::matrix::{check_same_shape, ConstraintMatrix};
use crate::rat;

/// Realized (entering column, leaving variable) pivot pairs.
type PivotHistory = FxHashSet<(usize, usize)>;

/// Configuration for the simplex solver.
#[derive(Debug, Clone)]
pub struct SimplexConfig {
    /// Maximum number of pivots across both phases.
    pub max_iterations: u64,
    /// Allow objective-worsening entering columns when a solve stalls.
    ///
    /// This is an approximation mode: it can report a looser bound than the
    /// true optimum. Off by default.
    pub relax_negative_entering: bool,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            relax_negative_entering: false,
        }
    }
}

/// Statistics for one solver instance, cumulative across solves.
#[derive(Debug, Clone, Default)]
pub struct SimplexStats {
    /// Total pivots performed.
    pub pivots: u64,
    /// Pivots spent building a feasible basis.
    pub phase1_pivots: u64,
    /// Pivots chosen by the sign-relaxed ratio test.
    pub relaxed_pivots: u64,
    /// Entering columns disabled after exhausting their pivot pairs.
    pub columns_disabled: u64,
}

/// An optimal assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// Objective value at the optimum, excluding symbolic terms.
    pub value: BigRational,
    /// Residual symbolic-constant coefficients of the objective value.
    pub symbolic: Vec<BigRational>,
    /// Optimal point in the caller's variable space.
    pub point: Vec<BigRational>,
}

/// Outcome of a simplex solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimplexStatus {
    /// A finite optimum was found and verified.
    Success(Solution),
    /// The objective is unbounded over the feasible region.
    Unbound,
    /// The constraint system has no solution.
    NoFeasibleSolution,
    /// An optimum was reached but fails the feasibility audit. This is a
    /// defect class, not a normal outcome.
    OptimalInfeasible,
    /// The iteration budget ran out, or the solve stalled with every pivot
    /// avenue exhausted.
    TimedOut,
}

/// A recorded equality substitution `var = Σ expr[j]·x_j - expr[cst] - Σ expr[k]·σ_k`.
///
/// `expr` is the consumed equality row divided by the variable's coefficient
/// and negated, with the variable's own position zeroed; in this form a
/// constraint row absorbs the substitution by a uniform full-width
/// `row += row[var] * expr` after zeroing `row[var]`.
#[derive(Debug, Clone)]
struct Subst {
    var: usize,
    expr: Vec<BigRational>,
}

/// Standard-form system: `leq` is `A·x <= b` with every variable nonnegative.
#[derive(Debug, Clone)]
struct Normalized {
    leq: ConstraintMatrix,
    /// `z = obj[0..n]·x + obj[n] + obj[n+1..]·σ` over the normalized columns.
    obj: Vec<BigRational>,
    substs: Vec<Subst>,
    /// `(v, v'')` pairs from splitting an unconstrained `v` into `v - v''`.
    splits: Vec<(usize, usize)>,
    orig_nvars: usize,
}

impl Normalized {
    /// Map a normalized-variable assignment back to the caller's variables.
    ///
    /// Symbolic constants are taken at zero.
    fn back_substitute(&self, x: &[BigRational]) -> Vec<BigRational> {
        let mut point: Vec<BigRational> = x[..self.orig_nvars].to_vec();
        for &(v, v2) in &self.splits {
            point[v] = rat::guard(&x[v] - &x[v2]);
        }
        let cst = self.orig_nvars;
        for s in self.substs.iter().rev() {
            let mut acc = -&s.expr[cst];
            for j in 0..cst {
                if !s.expr[j].is_zero() {
                    acc = rat::mul_add(&acc, &s.expr[j], &point[j]);
                }
            }
            point[s.var] = acc;
        }
        point
    }
}

/// Slack-form dictionary.
///
/// Row `i` states `Σ rows[i][j]·x_j = rows[i][cst] + Σ rows[i][k]·σ_k` with
/// `basis[i]` the basic variable of the row (unit column). The cost row
/// states `z + Σ cost[j]·x_j = cost[cst] + Σ cost[k]·σ_k`, so a nonbasic
/// column improves the objective exactly when its cost entry is negative,
/// and at the basic solution `z = cost[cst] + cost_sym·σ`.
#[derive(Debug, Clone)]
struct Tableau {
    rows: Vec<Vec<BigRational>>,
    cost: Vec<BigRational>,
    /// Structural (pre-slack) variable count.
    nvars: usize,
    /// Current variable-column count; the constant column sits at this index.
    total: usize,
    nsym: usize,
    basis: Vec<usize>,
    in_basis: Vec<bool>,
    /// Phase-1 auxiliary column, when present.
    aux: Option<usize>,
}

impl Tableau {
    fn build(leq: &ConstraintMatrix, with_aux: bool) -> Self {
        let n = leq.nvars();
        let m = leq.nrows();
        let nsym = leq.nsym();
        let total = n + m + usize::from(with_aux);
        let width = total + 1 + nsym;

        let mut rows = Vec::with_capacity(m);
        for i in 0..m {
            let src = leq.row(i);
            let mut row = vec![BigRational::zero(); width];
            row[..n].clone_from_slice(&src[..n]);
            row[n + i] = BigRational::one();
            if with_aux {
                row[n + m] = -BigRational::one();
            }
            row[total] = src[n].clone();
            for k in 0..nsym {
                row[total + 1 + k] = src[n + 1 + k].clone();
            }
            rows.push(row);
        }

        let mut in_basis = vec![false; total];
        for v in n..n + m {
            in_basis[v] = true;
        }
        Self {
            rows,
            cost: vec![BigRational::zero(); width],
            nvars: n,
            total,
            nsym,
            basis: (n..n + m).collect(),
            in_basis,
            aux: with_aux.then_some(n + m),
        }
    }

    fn width(&self) -> usize {
        self.total + 1 + self.nsym
    }

    fn cst(&self) -> usize {
        self.total
    }

    /// Gauss-Jordan step: make `entering` the basic variable of `row`.
    fn pivot(&mut self, entering: usize, row: usize) {
        let p = self.rows[row][entering].clone();
        debug_assert!(!p.is_zero(), "pivot on a zero coefficient");
        let inv = BigRational::one() / &p;
        for x in self.rows[row].iter_mut() {
            if !x.is_zero() {
                *x = rat::guard(&*x * &inv);
            }
        }
        self.rows[row][entering] = BigRational::one();

        let pivot_row = self.rows[row].clone();
        for (i, r) in self.rows.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            eliminate_column(r, entering, &pivot_row);
        }
        eliminate_column(&mut self.cost, entering, &pivot_row);

        let leaving = self.basis[row];
        self.in_basis[leaving] = false;
        self.in_basis[entering] = true;
        self.basis[row] = entering;
    }

    /// Express the real objective through the current nonbasic variables.
    fn install_objective(&mut self, obj: &[BigRational]) {
        let n = self.nvars;
        let cst = self.cst();
        self.cost = vec![BigRational::zero(); self.width()];
        for j in 0..n {
            self.cost[j] = -&obj[j];
        }
        self.cost[cst] = obj[n].clone();
        for k in 0..self.nsym {
            self.cost[cst + 1 + k] = obj[n + 1 + k].clone();
        }
        for r in 0..self.rows.len() {
            let bv = self.basis[r];
            if self.cost[bv].is_zero() {
                continue;
            }
            let row = self.rows[r].clone();
            eliminate_column(&mut self.cost, bv, &row);
        }
    }

    /// Delete the auxiliary column; it must be nonbasic.
    fn drop_aux(&mut self, aux: usize) {
        debug_assert!(!self.in_basis[aux]);
        debug_assert_eq!(aux, self.total - 1, "auxiliary column is the last variable");
        for r in &mut self.rows {
            r.remove(aux);
        }
        self.cost.remove(aux);
        self.in_basis.remove(aux);
        self.total -= 1;
        self.aux = None;
        debug_assert!(self.basis.iter().all(|&b| b < self.total));
    }

    /// Values of the structural variables at the current basic solution.
    fn structural_point(&self) -> Vec<BigRational> {
        let mut x = vec![BigRational::zero(); self.nvars];
        let cst = self.cst();
        for (r, &bv) in self.basis.iter().enumerate() {
            if bv < self.nvars {
                x[bv] = self.rows[r][cst].clone();
            }
        }
        x
    }
}

/// `row -= row[col] * pivot_row`, leaving an exact zero at `col`.
fn eliminate_column(row: &mut [BigRational], col: usize, pivot_row: &[BigRational]) {
    let f = row[col].clone();
    if f.is_zero() {
        return;
    }
    for (x, p) in row.iter_mut().zip(pivot_row.iter()) {
        if !p.is_zero() {
            *x = rat::guard(&*x - &(&f * p));
        }
    }
    row[col] = BigRational::zero();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CostClass {
    Improving,
    Flat,
    Worsening,
}

enum Leaving {
    /// Chosen row; `true` when the sign-relaxed ratio test picked it.
    Row(usize, bool),
    /// No row carries a positive entry in the entering column.
    Unbounded,
    /// Candidate rows exist but every pivot pair was already tried.
    Exhausted,
}

enum ScanOutcome {
    Pivoted,
    Unbound,
    /// No nonbasic column of the requested cost class exists.
    NoCandidates,
    /// Columns of the class exist but all are disabled.
    Blocked,
}

enum IterateEnd {
    Optimal,
    Unbound,
    TimedOut,
}

/// Outcome of the core solve, before solution extraction.
enum CoreOutcome {
    Optimal(Tableau),
    Unbound,
    NoFeasibleSolution,
    TimedOut,
}

/// Exact two-phase simplex solver.
#[derive(Debug, Default)]
pub struct SimplexSolver {
    config: SimplexConfig,
    stats: SimplexStats,
}

impl SimplexSolver {
    /// Create a solver with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a solver with a custom configuration.
    pub fn with_config(config: SimplexConfig) -> Self {
        Self {
            config,
            stats: SimplexStats::default(),
        }
    }

    /// Get statistics.
    pub fn stats(&self) -> &SimplexStats {
        &self.stats
    }

    /// Maximize `objective · (x, 1, σ)` subject to `leq` (`A·x <= b`), `eq`
    /// (`A·x = b`) and the per-variable sign constraints in `vc`.
    ///
    /// `objective` must span the full constraint width: one coefficient per
    /// variable, a constant term at `cst_col`, then symbolic-constant
    /// coefficients. The returned point is in the caller's variable space
    /// and has been checked against the original system.
    pub fn maximize(
        &mut self,
        objective: &[BigRational],
        vc: &ConstraintMatrix,
        eq: &ConstraintMatrix,
        leq: &ConstraintMatrix,
    ) -> LinarithResult<SimplexStatus> {
        validate(objective, vc, eq, leq)?;
        let norm = normalize(objective, vc, eq, leq)?;
        match self.solve_core(&norm)? {
            CoreOutcome::Optimal(t) => Ok(self.audit_maximum(&t, &norm, vc, eq, leq)),
            CoreOutcome::Unbound => Ok(SimplexStatus::Unbound),
            CoreOutcome::NoFeasibleSolution => Ok(SimplexStatus::NoFeasibleSolution),
            CoreOutcome::TimedOut => Ok(SimplexStatus::TimedOut),
        }
    }

    /// Minimize the objective over the same constraint shape as
    /// [`SimplexSolver::maximize`].
    ///
    /// Solved through the dual program, so constraint matrices must not
    /// carry symbolic-constant columns; symbolic coefficients of the
    /// objective itself are returned unchanged.
    pub fn minimize(
        &mut self,
        objective: &[BigRational],
        vc: &ConstraintMatrix,
        eq: &ConstraintMatrix,
        leq: &ConstraintMatrix,
    ) -> LinarithResult<SimplexStatus> {
        validate(objective, vc, eq, leq)?;
        if leq.nsym() != 0 {
            return Err(LinarithError::DimensionMismatch {
                what: "symbolic-constant columns in minimize",
                expected: 0,
                found: leq.nsym(),
            });
        }
        let norm = normalize(objective, vc, eq, leq)?;
        let n = norm.leq.nvars();
        let m = norm.leq.nrows();
        let cst = norm.leq.cst_col();

        // min {c·x : A·x <= b, x >= 0} = max {(-b)·y : (-A^T)·y <= c, y >= 0}
        let mut dual_leq = ConstraintMatrix::new(m + 1, m)?;
        for j in 0..n {
            let mut row: Vec<BigRational> =
                (0..m).map(|i| -norm.leq.get(i, j)).collect();
            row.push(norm.obj[j].clone());
            dual_leq.push_row(row)?;
        }
        let mut dual_obj: Vec<BigRational> = (0..m).map(|i| -norm.leq.get(i, cst)).collect();
        dual_obj.push(BigRational::zero());
        let dual = Normalized {
            leq: dual_leq,
            obj: dual_obj,
            substs: Vec::new(),
            splits: Vec::new(),
            orig_nvars: m,
        };

        match self.solve_core(&dual)? {
            CoreOutcome::Optimal(t) => {
                // The primal optimum is the reduced-cost row of the dual's
                // slack columns; slack j of dual row j corresponds to x_j.
                let x: Vec<BigRational> = (0..n).map(|j| t.cost[m + j].clone()).collect();
                let value = rat::guard(&t.cost[t.cst()] + &norm.obj[n]);
                let point = norm.back_substitute(&x);
                let feasible = x.iter().all(|v| !v.is_negative())
                    && norm.leq.satisfied_as_leq(&x)
                    && audit_original(&point, vc, eq, leq);
                if feasible {
                    Ok(SimplexStatus::Success(Solution {
                        value,
                        symbolic: Vec::new(),
                        point,
                    }))
                } else {
                    debug!("dual optimum failed the primal feasibility audit");
                    Ok(SimplexStatus::OptimalInfeasible)
                }
            }
            // An unbounded dual certifies an infeasible primal.
            CoreOutcome::Unbound => Ok(SimplexStatus::NoFeasibleSolution),
            CoreOutcome::NoFeasibleSolution => {
                // An infeasible dual only certifies "primal unbounded or
                // infeasible"; a zero-objective probe on the primal decides
                // which.
                let feasibility = Normalized {
                    leq: norm.leq.clone(),
                    obj: vec![BigRational::zero(); norm.obj.len()],
                    substs: Vec::new(),
                    splits: Vec::new(),
                    orig_nvars: norm.leq.nvars(),
                };
                Ok(match self.solve_core(&feasibility)? {
                    CoreOutcome::Optimal(_) => SimplexStatus::Unbound,
                    CoreOutcome::NoFeasibleSolution => SimplexStatus::NoFeasibleSolution,
                    // A zero objective cannot be unbounded.
                    CoreOutcome::Unbound => SimplexStatus::Unbound,
                    CoreOutcome::TimedOut => SimplexStatus::TimedOut,
                })
            }
            CoreOutcome::TimedOut => Ok(SimplexStatus::TimedOut),
        }
    }

    /// Run phase 1 (when needed) and phase 2 on a standard-form system.
    fn solve_core(&mut self, norm: &Normalized) -> LinarithResult<CoreOutcome> {
        let m = norm.leq.nrows();
        let n = norm.leq.nvars();
        let cst = norm.leq.cst_col();
        let b_nonneg = (0..m).all(|r| !norm.leq.get(r, cst).is_negative());
        let has_improving = norm.obj[..n].iter().any(|c| c.is_positive());
        let needs_aux = m > 0 && !(b_nonneg && has_improving);

        let mut t = Tableau::build(&norm.leq, needs_aux);
        let mut pivots = 0u64;

        if let Some(aux) = t.aux {
            if let Some(end) = self.run_phase1(&mut t, aux, &mut pivots) {
                return Ok(end);
            }
        }

        t.install_objective(&norm.obj);
        let mut history = PivotHistory::default();
        let mut disabled: FxHashSet<usize> = FxHashSet::default();
        match self.iterate(&mut t, &mut history, &mut disabled, &mut pivots, false) {
            IterateEnd::Optimal => Ok(CoreOutcome::Optimal(t)),
            IterateEnd::Unbound => Ok(CoreOutcome::Unbound),
            IterateEnd::TimedOut => Ok(CoreOutcome::TimedOut),
        }
    }

    /// Build a feasible basis by maximizing `-xa`. Returns `Some` on early
    /// exit, `None` when a genuine feasible basis is installed.
    fn run_phase1(
        &mut self,
        t: &mut Tableau,
        aux: usize,
        pivots: &mut u64,
    ) -> Option<CoreOutcome> {
        let cst = t.cst();
        // max(-xa) in the stored convention: z + xa = 0.
        t.cost = vec![BigRational::zero(); t.width()];
        t.cost[aux] = BigRational::one();

        let mut history = PivotHistory::default();
        let mut disabled: FxHashSet<usize> = FxHashSet::default();

        // One forced pivot on the most negative constant makes every row
        // constant nonnegative.
        let row = (0..t.rows.len()).min_by(|&a, &b| t.rows[a][cst].cmp(&t.rows[b][cst]))?;
        history.insert((aux, t.basis[row]));
        t.pivot(aux, row);
        *pivots += 1;
        self.stats.pivots += 1;
        self.stats.phase1_pivots += 1;

        match self.iterate(t, &mut history, &mut disabled, pivots, true) {
            IterateEnd::TimedOut => return Some(CoreOutcome::TimedOut),
            // The auxiliary objective is bounded above by zero; an unbounded
            // report can only come out of relaxed pivoting gone wrong.
            IterateEnd::Unbound => return Some(CoreOutcome::NoFeasibleSolution),
            IterateEnd::Optimal => {}
        }
        if !t.cost[t.cst()].is_zero() {
            debug!("phase 1 optimum {} != 0", rat::fraction_string(&t.cost[t.cst()]));
            return Some(CoreOutcome::NoFeasibleSolution);
        }

        // xa sits at 0; if it is still basic, swap it out or drop its row.
        if let Some(r) = t.basis.iter().position(|&bv| bv == aux) {
            let entering =
                (0..t.total).find(|&j| j != aux && !t.in_basis[j] && !t.rows[r][j].is_zero());
            match entering {
                Some(j) => {
                    t.pivot(j, r);
                    *pivots += 1;
                    self.stats.pivots += 1;
                    self.stats.phase1_pivots += 1;
                }
                None => {
                    // The row states xa = 0 by itself; it is redundant.
                    t.rows.remove(r);
                    t.basis.remove(r);
                    t.in_basis[aux] = false;
                }
            }
        }
        t.drop_aux(aux);
        None
    }

    fn iterate(
        &mut self,
        t: &mut Tableau,
        history: &mut PivotHistory,
        disabled: &mut FxHashSet<usize>,
        pivots: &mut u64,
        phase1: bool,
    ) -> IterateEnd {
        loop {
            if *pivots >= self.config.max_iterations {
                return IterateEnd::TimedOut;
            }
            match self.scan_columns(t, CostClass::Improving, history, disabled, pivots, phase1) {
                ScanOutcome::Pivoted => continue,
                ScanOutcome::Unbound => return IterateEnd::Unbound,
                ScanOutcome::NoCandidates => return IterateEnd::Optimal,
                ScanOutcome::Blocked => {}
            }
            // Improving columns exist but are jammed; degenerate pivots on
            // flat columns can move the basis past the blockage.
            if matches!(
                self.scan_columns(t, CostClass::Flat, history, disabled, pivots, phase1),
                ScanOutcome::Pivoted
            ) {
                continue;
            }
            if self.config.relax_negative_entering
                && matches!(
                    self.scan_columns(t, CostClass::Worsening, history, disabled, pivots, phase1),
                    ScanOutcome::Pivoted
                )
            {
                continue;
            }
            debug!("solve stalled with every pivot avenue exhausted");
            return IterateEnd::TimedOut;
        }
    }

    /// Try one pivot on the first usable nonbasic column of the given cost
    /// class, in column-index order.
    fn scan_columns(
        &mut self,
        t: &mut Tableau,
        class: CostClass,
        history: &mut PivotHistory,
        disabled: &mut FxHashSet<usize>,
        pivots: &mut u64,
        phase1: bool,
    ) -> ScanOutcome {
        let mut any = false;
        for j in 0..t.total {
            if t.in_basis[j] {
                continue;
            }
            let wanted = match class {
                CostClass::Improving => t.cost[j].is_negative(),
                CostClass::Flat => t.cost[j].is_zero(),
                CostClass::Worsening => t.cost[j].is_positive(),
            };
            if !wanted {
                continue;
            }
            any = true;
            if disabled.contains(&j) {
                continue;
            }
            match choose_leaving(t, j, history) {
                Leaving::Row(r, relaxed) => {
                    if relaxed {
                        self.stats.relaxed_pivots += 1;
                    }
                    history.insert((j, t.basis[r]));
                    t.pivot(j, r);
                    *pivots += 1;
                    self.stats.pivots += 1;
                    if phase1 {
                        self.stats.phase1_pivots += 1;
                    }
                    return ScanOutcome::Pivoted;
                }
                Leaving::Unbounded => {
                    if class == CostClass::Improving {
                        return ScanOutcome::Unbound;
                    }
                    // A flat or worsening column cannot certify an unbounded
                    // objective; just stop considering it.
                    disabled.insert(j);
                    self.stats.columns_disabled += 1;
                }
                Leaving::Exhausted => {
                    disabled.insert(j);
                    self.stats.columns_disabled += 1;
                }
            }
        }
        if any {
            ScanOutcome::Blocked
        } else {
            ScanOutcome::NoCandidates
        }
    }

    /// Extract, back-substitute and audit the phase-2 optimum.
    fn audit_maximum(
        &self,
        t: &Tableau,
        norm: &Normalized,
        vc: &ConstraintMatrix,
        eq: &ConstraintMatrix,
        leq: &ConstraintMatrix,
    ) -> SimplexStatus {
        let cst = t.cst();
        let value = t.cost[cst].clone();
        let symbolic = t.cost[cst + 1..].to_vec();
        let x = t.structural_point();
        let point = norm.back_substitute(&x);

        let feasible = t.rows.iter().all(|r| !r[cst].is_negative())
            && x.iter().all(|v| !v.is_negative())
            && audit_original(&point, vc, eq, leq);
        if feasible {
            SimplexStatus::Success(Solution {
                value,
                symbolic,
                point,
            })
        } else {
            debug!("optimum failed the feasibility audit");
            SimplexStatus::OptimalInfeasible
        }
    }
}

/// Ratio-test leaving row for entering column `j`.
fn choose_leaving(t: &Tableau, j: usize, history: &PivotHistory) -> Leaving {
    let cst = t.cst();
    let mut best: Option<(usize, BigRational)> = None;
    let mut has_pos = false;
    for (r, row) in t.rows.iter().enumerate() {
        let a = &row[j];
        if !a.is_positive() {
            continue;
        }
        has_pos = true;
        if history.contains(&(j, t.basis[r])) {
            continue;
        }
        let ratio = &row[cst] / a;
        if best.as_ref().map_or(true, |(_, b)| ratio < *b) {
            best = Some((r, ratio));
        }
    }
    if let Some((r, _)) = best {
        return Leaving::Row(r, false);
    }
    if !has_pos {
        return Leaving::Unbounded;
    }
    // Positive entries exist but their pairs were all tried: relax the sign
    // restriction so a slack basic variable can still bound the move.
    let mut best: Option<(usize, BigRational)> = None;
    for (r, row) in t.rows.iter().enumerate() {
        let a = &row[j];
        if a.is_zero() || history.contains(&(j, t.basis[r])) {
            continue;
        }
        let ratio = &row[cst] / a;
        if best.as_ref().map_or(true, |(_, b)| ratio < *b) {
            best = Some((r, ratio));
        }
    }
    match best {
        Some((r, _)) => Leaving::Row(r, true),
        None => Leaving::Exhausted,
    }
}

/// Check a candidate point against the caller's original system.
///
/// Inequality and equality rows are only enforced when the system carries no
/// symbolic-constant columns, since a symbolic right-hand side has no fixed
/// numeric value to compare against.
fn audit_original(
    point: &[BigRational],
    vc: &ConstraintMatrix,
    eq: &ConstraintMatrix,
    leq: &ConstraintMatrix,
) -> bool {
    let signs_ok = (0..vc.nrows()).all(|v| !vc.vc_is_nonneg(v) || !point[v].is_negative());
    if !signs_ok {
        return false;
    }
    if leq.nsym() != 0 {
        return true;
    }
    leq.satisfied_as_leq(point) && eq.satisfied_as_eq(point)
}

fn validate(
    objective: &[BigRational],
    vc: &ConstraintMatrix,
    eq: &ConstraintMatrix,
    leq: &ConstraintMatrix,
) -> LinarithResult<()> {
    if leq.nvars() == 0 {
        return Err(LinarithError::EmptySystem("no variables to optimize over"));
    }
    if eq.nrows() > 0 {
        check_same_shape(leq, eq)?;
    }
    if objective.len() != leq.ncols() {
        return Err(LinarithError::DimensionMismatch {
            what: "objective row length",
            expected: leq.ncols(),
            found: objective.len(),
        });
    }
    if vc.nrows() != leq.nvars() {
        return Err(LinarithError::VarConstraintShape {
            rows: vc.nrows(),
            vars: leq.nvars(),
        });
    }
    Ok(())
}

/// Bring the caller's system into standard form.
fn normalize(
    objective: &[BigRational],
    vc: &ConstraintMatrix,
    eq: &ConstraintMatrix,
    leq: &ConstraintMatrix,
) -> LinarithResult<Normalized> {
    let nvars = leq.nvars();
    let mut obj = objective.to_vec();
    let mut leq_w = leq.clone();
    let mut eq_rows: Vec<Vec<BigRational>> = eq.iter_rows().map(|r| r.to_vec()).collect();
    let mut consumed = vec![false; eq_rows.len()];
    let mut free: Vec<bool> = (0..nvars).map(|v| !vc.vc_is_nonneg(v)).collect();
    let mut substs: Vec<Subst> = Vec::new();

    // Equalities touching exactly one sign-unconstrained variable eliminate
    // it outright; repeat until no equality qualifies.
    loop {
        let mut progressed = false;
        for i in 0..eq_rows.len() {
            if consumed[i] {
                continue;
            }
            let mut frees = (0..nvars).filter(|&j| free[j] && !eq_rows[i][j].is_zero());
            let v = match (frees.next(), frees.next()) {
                (Some(v), None) => v,
                _ => continue,
            };
            let a = eq_rows[i][v].clone();
            let mut expr: Vec<BigRational> =
                eq_rows[i].iter().map(|x| rat::guard(-(x / &a))).collect();
            expr[v] = BigRational::zero();

            for r in 0..leq_w.nrows() {
                apply_subst_row(leq_w.row_mut(r), v, &expr);
            }
            for (k, row) in eq_rows.iter_mut().enumerate() {
                if k != i && !consumed[k] {
                    apply_subst_row(row, v, &expr);
                }
            }
            apply_subst_obj(&mut obj, v, &expr, nvars);

            consumed[i] = true;
            free[v] = false;
            substs.push(Subst { var: v, expr });
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    // Remaining equalities become inequality pairs.
    let mut rest = ConstraintMatrix::new(leq.ncols(), nvars)?;
    for (i, row) in eq_rows.iter().enumerate() {
        if !consumed[i] {
            rest.push_row(row.clone())?;
        }
    }
    let mut leq_w = crate::elim::merge_with_equalities(&leq_w, &rest)?;

    // Split each remaining unconstrained variable v into v - v''.
    let mut splits: Vec<(usize, usize)> = Vec::new();
    for v in 0..nvars {
        if !free[v] {
            continue;
        }
        let used = !obj[v].is_zero() || (0..leq_w.nrows()).any(|r| !leq_w.get(r, v).is_zero());
        if !used {
            // An unreferenced free variable simply takes the value 0.
            continue;
        }
        let v2 = leq_w.cst_col();
        leq_w.insert_col_before(v2);
        obj.insert(v2, BigRational::zero());
        for r in 0..leq_w.nrows() {
            let a = leq_w.get(r, v).clone();
            if !a.is_zero() {
                leq_w.set(r, v2, -a);
            }
        }
        let negated = -&obj[v];
        obj[v2] = negated;
        splits.push((v, v2));
    }

    Ok(Normalized {
        leq: leq_w,
        obj,
        substs,
        splits,
        orig_nvars: nvars,
    })
}

/// Absorb a substitution into a constraint row: `row += row[var] * expr`.
fn apply_subst_row(row: &mut [BigRational], var: usize, expr: &[BigRational]) {
    let f = row[var].clone();
    if f.is_zero() {
        return;
    }
    row[var] = BigRational::zero();
    for (x, e) in row.iter_mut().zip(expr.iter()) {
        if !e.is_zero() {
            *x = rat::guard(&*x + &(&f * e));
        }
    }
}

/// Absorb a substitution into the natural-form objective, where constant and
/// symbolic columns carry the opposite sign from constraint rows.
fn apply_subst_obj(obj: &mut [BigRational], var: usize, expr: &[BigRational], cst: usize) {
    let f = obj[var].clone();
    if f.is_zero() {
        return;
    }
    obj[var] = BigRational::zero();
    for j in 0..obj.len() {
        if expr[j].is_zero() {
            continue;
        }
        let term = &f * &expr[j];
        obj[j] = if j < cst {
            rat::guard(&obj[j] + &term)
        } else {
            rat::guard(&obj[j] - &term)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn rational(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn obj(coeffs: &[i64]) -> Vec<BigRational> {
        coeffs.iter().map(|&c| rational(c)).collect()
    }

    fn empty(ncols: usize, cst: usize) -> ConstraintMatrix {
        ConstraintMatrix::new(ncols, cst).unwrap()
    }

    fn success(status: SimplexStatus) -> Solution {
        match status {
            SimplexStatus::Success(s) => s,
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn test_maximize_bounded() {
        // max x + y s.t. x + y <= 4, x <= 3, x, y >= 0
        let leq = ConstraintMatrix::from_rows(&[&[1, 1, 4], &[1, 0, 3]], 2).unwrap();
        let vc = ConstraintMatrix::vc_all_nonneg(2);
        let mut s = SimplexSolver::new();
        let sol = success(s.maximize(&obj(&[1, 1, 0]), &vc, &empty(3, 2), &leq).unwrap());
        assert_eq!(sol.value, rational(4));
        assert_eq!(&sol.point[0] + &sol.point[1], rational(4));
        assert!(leq.satisfied_as_leq(&sol.point));
    }

    #[test]
    fn test_maximize_infeasible() {
        // x <= -1 with x >= 0
        let leq = ConstraintMatrix::from_rows(&[&[1, -1]], 1).unwrap();
        let vc = ConstraintMatrix::vc_all_nonneg(1);
        let mut s = SimplexSolver::new();
        let status = s.maximize(&obj(&[1, 0]), &vc, &empty(2, 1), &leq).unwrap();
        assert_eq!(status, SimplexStatus::NoFeasibleSolution);
    }

    #[test]
    fn test_maximize_unbounded() {
        let leq = empty(3, 2);
        let vc = ConstraintMatrix::vc_all_nonneg(2);
        let mut s = SimplexSolver::new();
        let status = s.maximize(&obj(&[1, 0, 0]), &vc, &empty(3, 2), &leq).unwrap();
        assert_eq!(status, SimplexStatus::Unbound);
    }

    #[test]
    fn test_minimize_via_dual() {
        // min 2x s.t. x >= 1, i.e. -x <= -1
        let leq = ConstraintMatrix::from_rows(&[&[-1, -1]], 1).unwrap();
        let vc = ConstraintMatrix::vc_all_nonneg(1);
        let mut s = SimplexSolver::new();
        let sol = success(s.minimize(&obj(&[2, 0]), &vc, &empty(2, 1), &leq).unwrap());
        assert_eq!(sol.value, rational(2));
        assert_eq!(sol.point, vec![rational(1)]);
    }

    #[test]
    fn test_minimize_unbounded() {
        // min -x with x >= 0 and no upper bound
        let leq = empty(2, 1);
        let vc = ConstraintMatrix::vc_all_nonneg(1);
        let mut s = SimplexSolver::new();
        let status = s.minimize(&obj(&[-1, 0]), &vc, &empty(2, 1), &leq).unwrap();
        assert_eq!(status, SimplexStatus::Unbound);
    }

    #[test]
    fn test_minimize_infeasible_with_infeasible_dual() {
        // x - y <= -1 and y - x <= -1 sum to 0 <= -2, so the system is
        // empty. For min -x the dual is infeasible as well, which on its own
        // cannot distinguish an unbounded primal from an empty one.
        let leq = ConstraintMatrix::from_rows(&[&[1, -1, -1], &[-1, 1, -1]], 2).unwrap();
        let vc = ConstraintMatrix::vc_all_nonneg(2);
        let mut s = SimplexSolver::new();
        let status = s.minimize(&obj(&[-1, 0, 0]), &vc, &empty(3, 2), &leq).unwrap();
        assert_eq!(status, SimplexStatus::NoFeasibleSolution);
    }

    #[test]
    fn test_relaxed_ratio_test_after_pair_exhaustion() {
        // x <= 2 and -x <= 5. Once the sign-correct leaving row for column 0
        // is spent, the relaxed ratio test falls back to the negative entry.
        let leq = ConstraintMatrix::from_rows(&[&[1, 2], &[-1, 5]], 1).unwrap();
        let t = Tableau::build(&leq, false);
        let mut history = PivotHistory::default();
        history.insert((0, t.basis[0]));
        match choose_leaving(&t, 0, &history) {
            Leaving::Row(r, relaxed) => {
                assert_eq!(r, 1);
                assert!(relaxed);
            }
            _ => panic!("expected a relaxed leaving row"),
        }
    }

    #[test]
    fn test_relax_negative_entering_unjams_a_blocked_solve() {
        // Cost row with one improving column whose only sign-correct pivot
        // pair is already spent and one worsening column. The strict
        // fallback chain refuses to pivot at all; the relaxed mode moves.
        let leq = ConstraintMatrix::from_rows(&[&[1, 0, 2], &[0, 1, 3]], 2).unwrap();
        let run = |relax: bool| {
            let mut s = SimplexSolver::with_config(SimplexConfig {
                relax_negative_entering: relax,
                ..SimplexConfig::default()
            });
            let mut t = Tableau::build(&leq, false);
            t.cost = vec![
                rational(-1),
                rational(1),
                rational(0),
                rational(0),
                rational(0),
            ];
            let mut history = PivotHistory::default();
            history.insert((0, t.basis[0]));
            let mut disabled: FxHashSet<usize> = FxHashSet::default();
            let mut pivots = 0u64;
            s.iterate(&mut t, &mut history, &mut disabled, &mut pivots, false);
            s.stats.pivots
        };
        assert_eq!(run(false), 0, "a strict solve has no admissible pivot");
        assert!(run(true) > 0, "the relaxed mode pivots a worsening column");
    }

    #[test]
    fn test_duality_consistency() {
        let leq = ConstraintMatrix::from_rows(&[&[1, 1, 4], &[1, 0, 3]], 2).unwrap();
        let vc = ConstraintMatrix::vc_all_nonneg(2);
        let mut s = SimplexSolver::new();
        let max = success(s.maximize(&obj(&[1, 1, 0]), &vc, &empty(3, 2), &leq).unwrap());
        let min = success(s.minimize(&obj(&[-1, -1, 0]), &vc, &empty(3, 2), &leq).unwrap());
        assert_eq!(max.value, -min.value);
    }

    #[test]
    fn test_equality_substitution() {
        // max x s.t. x = 2 with x sign-unconstrained
        let eq = ConstraintMatrix::from_rows(&[&[1, 2]], 1).unwrap();
        let vc = ConstraintMatrix::vc_all_free(1);
        let mut s = SimplexSolver::new();
        let sol = success(s.maximize(&obj(&[1, 0]), &vc, &eq, &empty(2, 1)).unwrap());
        assert_eq!(sol.value, rational(2));
        assert_eq!(sol.point, vec![rational(2)]);
    }

    #[test]
    fn test_free_variable_split() {
        // max -x s.t. x >= -5 with x sign-unconstrained: optimum at x = -5
        let leq = ConstraintMatrix::from_rows(&[&[-1, 5]], 1).unwrap();
        let vc = ConstraintMatrix::vc_all_free(1);
        let mut s = SimplexSolver::new();
        let sol = success(s.maximize(&obj(&[-1, 0]), &vc, &empty(2, 1), &leq).unwrap());
        assert_eq!(sol.value, rational(5));
        assert_eq!(sol.point, vec![rational(-5)]);
    }

    #[test]
    fn test_equality_as_pair() {
        // max y s.t. x + y = 3, y <= 2, both nonnegative
        let eq = ConstraintMatrix::from_rows(&[&[1, 1, 3]], 2).unwrap();
        let leq = ConstraintMatrix::from_rows(&[&[0, 1, 2]], 2).unwrap();
        let vc = ConstraintMatrix::vc_all_nonneg(2);
        let mut s = SimplexSolver::new();
        let sol = success(s.maximize(&obj(&[0, 1, 0]), &vc, &eq, &leq).unwrap());
        assert_eq!(sol.value, rational(2));
        assert_eq!(sol.point, vec![rational(1), rational(2)]);
    }

    #[test]
    fn test_symbolic_objective_value() {
        // max x s.t. x <= 2 + σ: value 2 with a residual coefficient 1 on σ
        let leq = ConstraintMatrix::from_rows(&[&[1, 2, 1]], 1).unwrap();
        let vc = ConstraintMatrix::vc_all_nonneg(1);
        let mut s = SimplexSolver::new();
        let sol = success(s.maximize(&obj(&[1, 0, 0]), &vc, &empty(3, 1), &leq).unwrap());
        assert_eq!(sol.value, rational(2));
        assert_eq!(sol.symbolic, vec![rational(1)]);
    }

    #[test]
    fn test_iteration_budget() {
        let leq = ConstraintMatrix::from_rows(&[&[1, 1, 4], &[1, 0, 3]], 2).unwrap();
        let vc = ConstraintMatrix::vc_all_nonneg(2);
        let mut s = SimplexSolver::with_config(SimplexConfig {
            max_iterations: 0,
            ..SimplexConfig::default()
        });
        let status = s.maximize(&obj(&[1, 1, 0]), &vc, &empty(3, 2), &leq).unwrap();
        assert_eq!(status, SimplexStatus::TimedOut);
    }

    #[test]
    fn test_validation_errors() {
        let leq = ConstraintMatrix::from_rows(&[&[1, 1, 4]], 2).unwrap();
        let vc = ConstraintMatrix::vc_all_nonneg(1);
        let mut s = SimplexSolver::new();
        assert!(matches!(
            s.maximize(&obj(&[1, 1, 0]), &vc, &empty(3, 2), &leq),
            Err(LinarithError::VarConstraintShape { .. })
        ));
        let vc2 = ConstraintMatrix::vc_all_nonneg(2);
        assert!(matches!(
            s.maximize(&obj(&[1, 1]), &vc2, &empty(3, 2), &leq),
            Err(LinarithError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_phase1_from_negative_constants() {
        // max x + y s.t. x + y >= 1 (as -x - y <= -1), x + y <= 4
        let leq = ConstraintMatrix::from_rows(&[&[-1, -1, -1], &[1, 1, 4]], 2).unwrap();
        let vc = ConstraintMatrix::vc_all_nonneg(2);
        let mut s = SimplexSolver::new();
        let sol = success(s.maximize(&obj(&[1, 1, 0]), &vc, &empty(3, 2), &leq).unwrap());
        assert_eq!(sol.value, rational(4));
        assert!(s.stats().phase1_pivots > 0);
    }
}
