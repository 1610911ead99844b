//! Branch-and-bound integer and 0/1 optimization on top of the simplex
//! solver.
//!
//! ## Algorithm
//!
//! Each node solves its LP relaxation exactly. An integral relaxation optimum
//! becomes the incumbent; otherwise the first fractional component is
//! branched on with a floor child (`x <= ⌊v⌋`) and a ceiling child
//! (`x >= ⌈v⌉`), or the equality children `x = 0` / `x = 1` in binary mode.
//! Children whose relaxation cannot strictly beat the incumbent are pruned
//! without expansion. A per-variable fork counter, scoped to the current
//! search path and restored on backtrack, bounds how often one column may be
//! branched on; hitting the limit treats the path as infeasible. This
//! safeguard is layered above the simplex solver's own pivot anti-cycling.
//!
//! The incumbent lives in a search context owned by the top-level call and
//! threaded through the recursion by mutable reference; nothing is shared
//! between solves.

use num_rational::BigRational;
use num_traits::{One, Zero};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{LinarithError, LinarithResult};
use crate::matrix::ConstraintMatrix;
use crate::rat;
use crate::simplex::{SimplexConfig, SimplexSolver, SimplexStatus, Solution};

/// Configuration for the branch-and-bound solver.
#[derive(Debug, Clone)]
pub struct MipConfig {
    /// How many times one column may be branched on along a single search
    /// path before that path is abandoned.
    pub max_forks_per_var: u32,
    /// Configuration handed to every relaxation solve.
    pub simplex: SimplexConfig,
}

impl Default for MipConfig {
    fn default() -> Self {
        Self {
            max_forks_per_var: 8,
            simplex: SimplexConfig::default(),
        }
    }
}

/// Statistics for one solver instance, cumulative across solves.
#[derive(Debug, Clone, Default)]
pub struct MipStats {
    /// Search nodes visited.
    pub nodes: u64,
    /// LP relaxations solved.
    pub relaxations: u64,
    /// Branches pruned against the incumbent.
    pub pruned: u64,
    /// Paths abandoned by the per-variable fork limit.
    pub fork_limit_hits: u64,
}

/// Outcome of an integer solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MipStatus {
    /// An integral (or 0/1) optimum was found.
    Success(Solution),
    /// The relaxation is unbounded.
    Unbound,
    /// No integral point satisfies the constraints.
    NoFeasibleSolution,
    /// Every surviving branch was pruned against the incumbent bound.
    NoBetterThanBest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sense {
    Max,
    Min,
}

/// Per-node verdict; the incumbent itself lives in the search context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeStatus {
    Improved,
    Unbound,
    Infeasible,
    Pruned,
}

/// Mutable state owned by one top-level solve.
#[derive(Debug, Default)]
struct SearchContext {
    best: Option<Solution>,
    /// Branch counts per column along the current path.
    forks: FxHashMap<usize, u32>,
}

/// Branch-and-bound solver for integer and 0/1 linear programs.
#[derive(Debug, Default)]
pub struct MipSolver {
    config: MipConfig,
    stats: MipStats,
}

impl MipSolver {
    /// Create a solver with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a solver with a custom configuration.
    pub fn with_config(config: MipConfig) -> Self {
        Self {
            config,
            stats: MipStats::default(),
        }
    }

    /// Get statistics.
    pub fn stats(&self) -> &MipStats {
        &self.stats
    }

    /// Maximize the objective over integral (or, with `is_binary`, 0/1)
    /// assignments.
    ///
    /// Columns flagged in `rational_mask` are exempt from the integrality
    /// requirement and stay continuous. The constraint shape matches
    /// [`SimplexSolver::maximize`].
    pub fn maximize_integer(
        &mut self,
        objective: &[BigRational],
        vc: &ConstraintMatrix,
        eq: &ConstraintMatrix,
        leq: &ConstraintMatrix,
        is_binary: bool,
        rational_mask: &[bool],
    ) -> LinarithResult<MipStatus> {
        self.solve_root(objective, vc, eq, leq, is_binary, rational_mask, Sense::Max)
    }

    /// Minimize the objective over integral (or 0/1) assignments.
    ///
    /// Relaxations go through [`SimplexSolver::minimize`], so the constraint
    /// matrices must not carry symbolic-constant columns.
    pub fn minimize_integer(
        &mut self,
        objective: &[BigRational],
        vc: &ConstraintMatrix,
        eq: &ConstraintMatrix,
        leq: &ConstraintMatrix,
        is_binary: bool,
        rational_mask: &[bool],
    ) -> LinarithResult<MipStatus> {
        self.solve_root(objective, vc, eq, leq, is_binary, rational_mask, Sense::Min)
    }

    #[allow(clippy::too_many_arguments)]
    fn solve_root(
        &mut self,
        objective: &[BigRational],
        vc: &ConstraintMatrix,
        eq: &ConstraintMatrix,
        leq: &ConstraintMatrix,
        is_binary: bool,
        rational_mask: &[bool],
        sense: Sense,
    ) -> LinarithResult<MipStatus> {
        if rational_mask.len() != leq.nvars() {
            return Err(LinarithError::DimensionMismatch {
                what: "rational-mask length",
                expected: leq.nvars(),
                found: rational_mask.len(),
            });
        }
        let mut ctx = SearchContext::default();
        let node = self.solve_node(objective, vc, eq, leq, is_binary, rational_mask, sense, &mut ctx)?;
        Ok(match node {
            NodeStatus::Unbound => MipStatus::Unbound,
            NodeStatus::Infeasible => MipStatus::NoFeasibleSolution,
            NodeStatus::Pruned => MipStatus::NoBetterThanBest,
            NodeStatus::Improved => {
                debug_assert!(ctx.best.is_some(), "Improved without an incumbent");
                match ctx.best.take() {
                    Some(sol) => MipStatus::Success(sol),
                    None => MipStatus::NoFeasibleSolution,
                }
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn solve_node(
        &mut self,
        objective: &[BigRational],
        vc: &ConstraintMatrix,
        eq: &ConstraintMatrix,
        leq: &ConstraintMatrix,
        is_binary: bool,
        rational_mask: &[bool],
        sense: Sense,
        ctx: &mut SearchContext,
    ) -> LinarithResult<NodeStatus> {
        self.stats.nodes += 1;
        self.stats.relaxations += 1;
        let mut lp = SimplexSolver::with_config(self.config.simplex.clone());
        let relaxed = match sense {
            Sense::Max => lp.maximize(objective, vc, eq, leq)?,
            Sense::Min => lp.minimize(objective, vc, eq, leq)?,
        };
        let sol = match relaxed {
            SimplexStatus::Success(sol) => sol,
            SimplexStatus::Unbound => return Ok(NodeStatus::Unbound),
            SimplexStatus::NoFeasibleSolution => return Ok(NodeStatus::Infeasible),
            SimplexStatus::OptimalInfeasible | SimplexStatus::TimedOut => {
                // A relaxation that cannot be solved cleanly cannot certify
                // anything below it; abandon the path.
                debug!("relaxation ended with {relaxed:?}, abandoning branch");
                return Ok(NodeStatus::Infeasible);
            }
        };

        if let Some(best) = &ctx.best {
            let beats = match sense {
                Sense::Max => sol.value > best.value,
                Sense::Min => sol.value < best.value,
            };
            if !beats {
                self.stats.pruned += 1;
                return Ok(NodeStatus::Pruned);
            }
        }

        let branch_col = (0..leq.nvars())
            .find(|&j| !rational_mask[j] && !accepts(&sol.point[j], is_binary));
        let Some(col) = branch_col else {
            debug!(
                "new incumbent with value {}",
                rat::fraction_string(&sol.value)
            );
            ctx.best = Some(sol);
            return Ok(NodeStatus::Improved);
        };

        let count = ctx.forks.entry(col).or_insert(0);
        if *count >= self.config.max_forks_per_var {
            self.stats.fork_limit_hits += 1;
            debug!("fork limit reached on column {col}, abandoning path");
            return Ok(NodeStatus::Infeasible);
        }
        *count += 1;

        let value = sol.point[col].clone();
        let (down, up) = if is_binary {
            let zero = self.branch_eq(eq, leq.ncols(), col, BigRational::zero())?;
            let one = self.branch_eq(eq, leq.ncols(), col, BigRational::one())?;
            let down = self.solve_node(objective, vc, &zero, leq, is_binary, rational_mask, sense, ctx)?;
            let up = self.solve_node(objective, vc, &one, leq, is_binary, rational_mask, sense, ctx)?;
            (down, up)
        } else {
            let floor = BigRational::from_integer(rat::floor_int(&value));
            let ceil = BigRational::from_integer(rat::ceil_int(&value));
            let lower = self.branch_leq(leq, col, false, floor)?;
            let upper = self.branch_leq(leq, col, true, ceil)?;
            let down = self.solve_node(objective, vc, eq, &lower, is_binary, rational_mask, sense, ctx)?;
            let up = self.solve_node(objective, vc, eq, &upper, is_binary, rational_mask, sense, ctx)?;
            (down, up)
        };

        // Restore the path-scoped fork count on backtrack.
        if let Some(c) = ctx.forks.get_mut(&col) {
            *c -= 1;
        }

        Ok(combine(down, up))
    }

    /// `leq` plus `x_col <= bound`, or `x_col >= bound` when `flip` is set.
    fn branch_leq(
        &self,
        leq: &ConstraintMatrix,
        col: usize,
        flip: bool,
        bound: BigRational,
    ) -> LinarithResult<ConstraintMatrix> {
        let mut out = leq.clone();
        let mut row = vec![BigRational::zero(); leq.ncols()];
        if flip {
            row[col] = -BigRational::one();
            row[leq.cst_col()] = -bound;
        } else {
            row[col] = BigRational::one();
            row[leq.cst_col()] = bound;
        }
        out.push_row(row)?;
        Ok(out)
    }

    /// `eq` plus `x_col = bound`.
    fn branch_eq(
        &self,
        eq: &ConstraintMatrix,
        ncols: usize,
        col: usize,
        bound: BigRational,
    ) -> LinarithResult<ConstraintMatrix> {
        let mut out = eq.clone();
        let mut row = vec![BigRational::zero(); ncols];
        row[col] = BigRational::one();
        row[eq.cst_col()] = bound;
        out.push_row(row)?;
        Ok(out)
    }
}

/// Integrality acceptance for one component.
fn accepts(v: &BigRational, is_binary: bool) -> bool {
    if is_binary {
        rat::is_zero_or_one(v)
    } else {
        rat::is_int(v)
    }
}

/// Fold two child verdicts into the parent's.
fn combine(down: NodeStatus, up: NodeStatus) -> NodeStatus {
    if down == NodeStatus::Unbound || up == NodeStatus::Unbound {
        return NodeStatus::Unbound;
    }
    if down == NodeStatus::Improved || up == NodeStatus::Improved {
        return NodeStatus::Improved;
    }
    if down == NodeStatus::Pruned || up == NodeStatus::Pruned {
        return NodeStatus::Pruned;
    }
    NodeStatus::Infeasible
}
