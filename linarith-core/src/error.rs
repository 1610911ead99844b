//! Error types for malformed solver input.
//!
//! Only precondition violations (shape and dimension problems) surface as
//! [`LinarithError`]. Infeasibility, unboundedness and resource exhaustion
//! are ordinary outcomes and are reported through the status enums of the
//! individual solvers ([`crate::simplex::SimplexStatus`],
//! [`crate::mip::MipStatus`], [`crate::elim::ElimStatus`]).

use thiserror::Error;

/// Error type for malformed constraint-system input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinarithError {
    /// Two matrices that must agree on a dimension do not.
    #[error("dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Which input pair disagrees.
        what: &'static str,
        /// The dimension implied by the first input.
        expected: usize,
        /// The dimension found on the offending input.
        found: usize,
    },
    /// The constant-column index does not fall inside the matrix.
    #[error("constant column {cst_col} out of range for matrix with {ncols} columns")]
    ConstantColumnOutOfRange {
        /// The claimed constant-column index.
        cst_col: usize,
        /// The actual column count.
        ncols: usize,
    },
    /// The variable-constraint matrix is not square in the variable count.
    #[error("variable-constraint matrix has {rows} rows for {vars} variables")]
    VarConstraintShape {
        /// Rows in the variable-constraint matrix.
        rows: usize,
        /// Number of variables in the system.
        vars: usize,
    },
    /// An operation that needs at least one constraint or variable got none.
    #[error("empty system: {0}")]
    EmptySystem(&'static str),
}

/// Result alias for fallible public entry points.
pub type LinarithResult<T> = Result<T, LinarithError>;
