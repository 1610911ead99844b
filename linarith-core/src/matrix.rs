//! Constraint matrices with a distinguished constant column.
//!
//! A [`ConstraintMatrix`] stores one linear constraint per row. Columns
//! `0..cst_col` hold variable coefficients, column `cst_col` the constant
//! term, and any columns past `cst_col` hold symbolic-constant coefficients.
//! The same shape serves three roles:
//!
//! - `leq` systems: row means `a·x <= c + s·σ`
//! - `eq` systems: row means `a·x = c + s·σ`
//! - `vc` variable-constraint systems: one row per variable, `-1` on the
//!   diagonal meaning "variable >= 0", an all-zero row meaning unconstrained
//!
//! Matrices are plain owned values; solvers copy them into working form and
//! never mutate a caller's input in place.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;

use crate::error::{LinarithError, LinarithResult};

/// Resizable 2D container of exact rationals with a constant-column boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintMatrix {
    rows: Vec<Vec<BigRational>>,
    ncols: usize,
    cst_col: usize,
}

impl ConstraintMatrix {
    /// Empty matrix with the given width and constant column.
    pub fn new(ncols: usize, cst_col: usize) -> LinarithResult<Self> {
        if cst_col >= ncols {
            return Err(LinarithError::ConstantColumnOutOfRange { cst_col, ncols });
        }
        Ok(Self {
            rows: Vec::new(),
            ncols,
            cst_col,
        })
    }

    /// Zero matrix of the given dimensions.
    pub fn zeros(nrows: usize, ncols: usize, cst_col: usize) -> LinarithResult<Self> {
        let mut m = Self::new(ncols, cst_col)?;
        m.rows = vec![vec![BigRational::zero(); ncols]; nrows];
        Ok(m)
    }

    /// Build from explicit integer element lists (testing convenience).
    pub fn from_rows(rows: &[&[i64]], cst_col: usize) -> LinarithResult<Self> {
        let ncols = rows.first().map_or(cst_col + 1, |r| r.len());
        let mut m = Self::new(ncols, cst_col)?;
        for r in rows {
            if r.len() != ncols {
                return Err(LinarithError::DimensionMismatch {
                    what: "row length",
                    expected: ncols,
                    found: r.len(),
                });
            }
            m.rows
                .push(r.iter().map(|&v| BigRational::from_integer(BigInt::from(v))).collect());
        }
        Ok(m)
    }

    /// Variable-constraint matrix declaring every variable nonnegative.
    pub fn vc_all_nonneg(nvars: usize) -> Self {
        let mut m = Self::vc_all_free(nvars);
        for v in 0..nvars {
            m.rows[v][v] = -BigRational::from_integer(BigInt::from(1));
        }
        m
    }

    /// Variable-constraint matrix declaring every variable unconstrained.
    pub fn vc_all_free(nvars: usize) -> Self {
        Self {
            rows: vec![vec![BigRational::zero(); nvars + 1]; nvars],
            ncols: nvars + 1,
            cst_col: nvars,
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Index of the constant column.
    pub fn cst_col(&self) -> usize {
        self.cst_col
    }

    /// Number of variable columns.
    pub fn nvars(&self) -> usize {
        self.cst_col
    }

    /// Number of symbolic-constant columns.
    pub fn nsym(&self) -> usize {
        self.ncols - self.cst_col - 1
    }

    /// Element accessor.
    pub fn get(&self, row: usize, col: usize) -> &BigRational {
        &self.rows[row][col]
    }

    /// Element mutator.
    pub fn set(&mut self, row: usize, col: usize, value: BigRational) {
        self.rows[row][col] = value;
    }

    /// Borrow one row.
    pub fn row(&self, row: usize) -> &[BigRational] {
        &self.rows[row]
    }

    /// Mutably borrow one row.
    pub fn row_mut(&mut self, row: usize) -> &mut [BigRational] {
        &mut self.rows[row]
    }

    /// Iterate over rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[BigRational]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Append a row; its length must match the matrix width.
    pub fn push_row(&mut self, row: Vec<BigRational>) -> LinarithResult<()> {
        if row.len() != self.ncols {
            return Err(LinarithError::DimensionMismatch {
                what: "pushed row length",
                expected: self.ncols,
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append an all-zero row.
    pub fn grow_row(&mut self) {
        self.rows.push(vec![BigRational::zero(); self.ncols]);
    }

    /// Append an all-zero column after the last column.
    pub fn grow_col(&mut self) {
        for r in &mut self.rows {
            r.push(BigRational::zero());
        }
        self.ncols += 1;
    }

    /// Insert an all-zero column before `col`, shifting `cst_col` if needed.
    pub fn insert_col_before(&mut self, col: usize) {
        for r in &mut self.rows {
            r.insert(col, BigRational::zero());
        }
        if col <= self.cst_col {
            self.cst_col += 1;
        }
        self.ncols += 1;
    }

    /// Remove a row.
    pub fn delete_row(&mut self, row: usize) {
        self.rows.remove(row);
    }

    /// Remove a column, shifting `cst_col` if needed.
    pub fn delete_col(&mut self, col: usize) {
        debug_assert!(col != self.cst_col, "cannot delete the constant column");
        for r in &mut self.rows {
            r.remove(col);
        }
        if col < self.cst_col {
            self.cst_col -= 1;
        }
        self.ncols -= 1;
    }

    /// Sub-matrix keeping the rows whose indices satisfy `keep`.
    pub fn filter_rows(&self, mut keep: impl FnMut(usize) -> bool) -> Self {
        Self {
            rows: self
                .rows
                .iter()
                .enumerate()
                .filter(|(i, _)| keep(*i))
                .map(|(_, r)| r.clone())
                .collect(),
            ncols: self.ncols,
            cst_col: self.cst_col,
        }
    }

    /// Sub-matrix of the row range `lo..hi`.
    pub fn inner_rows(&self, lo: usize, hi: usize) -> Self {
        Self {
            rows: self.rows[lo..hi].to_vec(),
            ncols: self.ncols,
            cst_col: self.cst_col,
        }
    }

    /// Sub-matrix of the variable-column range `lo..hi`, keeping the
    /// constant and symbolic columns.
    pub fn inner_cols(&self, lo: usize, hi: usize) -> Self {
        debug_assert!(lo <= hi && hi <= self.cst_col);
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut row: Vec<BigRational> = r[lo..hi].to_vec();
                row.extend_from_slice(&r[self.cst_col..]);
                row
            })
            .collect();
        Self {
            rows,
            ncols: (hi - lo) + (self.ncols - self.cst_col),
            cst_col: hi - lo,
        }
    }

    /// Scale one row by `factor`.
    pub fn scale_row(&mut self, row: usize, factor: &BigRational) {
        for x in &mut self.rows[row] {
            if !x.is_zero() {
                *x = crate::rat::guard(&*x * factor);
            }
        }
    }

    /// Add row `src` into row `dst`.
    pub fn add_row_to_row(&mut self, src: usize, dst: usize) {
        debug_assert_ne!(src, dst);
        let src_row = self.rows[src].clone();
        for (x, s) in self.rows[dst].iter_mut().zip(src_row.iter()) {
            if !s.is_zero() {
                *x = crate::rat::guard(&*x + s);
            }
        }
    }

    /// `true` when every entry of the row is zero.
    pub fn row_is_zero(&self, row: usize) -> bool {
        self.rows[row].iter().all(|x| x.is_zero())
    }

    /// `true` when every variable coefficient of the row is zero.
    pub fn row_vars_zero(&self, row: usize) -> bool {
        self.rows[row][..self.cst_col].iter().all(|x| x.is_zero())
    }

    /// `true` when every symbolic-constant coefficient of the row is zero.
    pub fn row_sym_zero(&self, row: usize) -> bool {
        self.rows[row][self.cst_col + 1..].iter().all(|x| x.is_zero())
    }

    /// `true` when two rows are elementwise equal.
    pub fn rows_equal(&self, a: usize, b: usize) -> bool {
        self.rows[a] == self.rows[b]
    }

    /// Dot product of the row's variable coefficients with `point`.
    pub fn eval_row(&self, row: usize, point: &[BigRational]) -> BigRational {
        let mut acc = BigRational::zero();
        for (a, x) in self.rows[row][..self.cst_col].iter().zip(point.iter()) {
            if !a.is_zero() {
                acc = crate::rat::mul_add(&acc, a, x);
            }
        }
        acc
    }

    /// Check `point` against every row read as `a·x <= c`.
    ///
    /// Symbolic-constant columns are taken at zero.
    pub fn satisfied_as_leq(&self, point: &[BigRational]) -> bool {
        (0..self.nrows()).all(|r| self.eval_row(r, point) <= self.rows[r][self.cst_col])
    }

    /// Check `point` against every row read as `a·x = c`.
    pub fn satisfied_as_eq(&self, point: &[BigRational]) -> bool {
        (0..self.nrows()).all(|r| self.eval_row(r, point) == self.rows[r][self.cst_col])
    }

    /// `true` when the vc row for `var` constrains it to be nonnegative.
    pub fn vc_is_nonneg(&self, var: usize) -> bool {
        !self.row_is_zero(var)
    }
}

/// Validate that two matrices agree on width and constant column.
pub fn check_same_shape(a: &ConstraintMatrix, b: &ConstraintMatrix) -> LinarithResult<()> {
    if a.ncols() != b.ncols() {
        return Err(LinarithError::DimensionMismatch {
            what: "matrix width",
            expected: a.ncols(),
            found: b.ncols(),
        });
    }
    if a.cst_col() != b.cst_col() {
        return Err(LinarithError::DimensionMismatch {
            what: "constant column",
            expected: a.cst_col(),
            found: b.cst_col(),
        });
    }
    Ok(())
}
