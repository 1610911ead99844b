//! Exact linear-arithmetic constraint solving.
//!
//! This crate bundles three cooperating solvers over exact rational
//! constraint matrices:
//!
//! - [`EliminationEngine`]: Fourier-Motzkin projection, per-variable bound
//!   computation, consistency checking, and convex-hull union/intersection.
//! - [`DdConverter`]: double-description conversion between halfspace and
//!   generator representations of a polyhedron.
//! - [`SimplexSolver`]: exact two-phase simplex maximization, with
//!   minimization through the dual program.
//! - [`MipSolver`]: branch-and-bound integer and 0/1 optimization on top of
//!   the simplex solver.
//!
//! All coefficients are [`num_rational::BigRational`]; arbitrary-precision
//! growth is bounded by the magnitude guard in [`rat`]. Infeasibility,
//! unboundedness and resource exhaustion are ordinary status values, never
//! errors or panics; [`LinarithError`] is reserved for malformed input.
//!
//! # Example
//!
//! ```
//! use linarith_core::{ConstraintMatrix, SimplexSolver, SimplexStatus};
//! use num_rational::BigRational;
//!
//! // maximize x + y subject to x + y <= 4, x <= 3, x >= 0, y >= 0
//! let leq = ConstraintMatrix::from_rows(&[&[1, 1, 4], &[1, 0, 3]], 2)?;
//! let eq = ConstraintMatrix::new(3, 2)?;
//! let vc = ConstraintMatrix::vc_all_nonneg(2);
//! let objective: Vec<BigRational> = [1, 1, 0]
//!     .iter()
//!     .map(|&c| BigRational::from_integer(c.into()))
//!     .collect();
//!
//! let mut solver = SimplexSolver::new();
//! match solver.maximize(&objective, &vc, &eq, &leq)? {
//!     SimplexStatus::Success(sol) => {
//!         assert_eq!(sol.value, BigRational::from_integer(4.into()));
//!     }
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! # Ok::<(), linarith_core::LinarithError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod dd;
pub mod elim;
pub mod error;
pub mod matrix;
pub mod mip;
pub mod rat;
pub mod simplex;

pub use dd::{hrep_to_leq, leq_to_hrep, DdConverter, DdStats, DdStatus};
pub use elim::{ElimConfig, ElimStats, ElimStatus, EliminationEngine};
pub use error::{LinarithError, LinarithResult};
pub use matrix::{check_same_shape, ConstraintMatrix};
pub use mip::{MipConfig, MipSolver, MipStats, MipStatus};
pub use simplex::{SimplexConfig, SimplexSolver, SimplexStats, SimplexStatus, Solution};
