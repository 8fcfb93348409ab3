//! Small dense square matrices used for transition probabilities.
//!
//! This is deliberately not a linear algebra layer: the sampler only needs
//! multiply, powers, and the matrix exponential on state spaces of a handful
//! of states.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, TreehistError};

/// Maximum number of Taylor terms accumulated by [`expm`] before bailing out.
const MAX_EXPM_TERMS: usize = 64;

/// Dense row-major square matrix of `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareMatrix {
    size: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    /// Creates a matrix of zeros.
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    /// Creates an identity matrix.
    pub fn identity(size: usize) -> Self {
        let mut matrix = Self::zeros(size);
        for i in 0..size {
            matrix.set(i, i, 1.0);
        }
        matrix
    }

    /// Builds a matrix from explicit rows, validating squareness.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, TreehistError> {
        let size = rows.len();
        for (index, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(TreehistError::Config(
                    ErrorInfo::new("non-square-matrix", "matrix rows must match row count")
                        .with_context("rows", size.to_string())
                        .with_context("row", index.to_string())
                        .with_context("row_len", row.len().to_string()),
                ));
            }
        }
        Ok(Self {
            size,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Number of rows (and columns).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Entry accessor.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.size + col]
    }

    /// Entry mutator.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.size + col] = value;
    }

    /// Immutable view of one row.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.size..(row + 1) * self.size]
    }

    /// Matrix product `self * other`. Both operands must share a size.
    pub fn mul(&self, other: &SquareMatrix) -> SquareMatrix {
        debug_assert_eq!(self.size, other.size);
        let n = self.size;
        let mut out = SquareMatrix::zeros(n);
        for i in 0..n {
            for k in 0..n {
                let lhs = self.get(i, k);
                if lhs == 0.0 {
                    continue;
                }
                for j in 0..n {
                    out.data[i * n + j] += lhs * other.get(k, j);
                }
            }
        }
        out
    }

    /// Returns `self` with every entry multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> SquareMatrix {
        SquareMatrix {
            size: self.size,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    /// Maximum absolute row sum (the induced infinity norm).
    pub fn max_abs_row_sum(&self) -> f64 {
        (0..self.size)
            .map(|i| self.row(i).iter().map(|v| v.abs()).sum())
            .fold(0.0, f64::max)
    }

    /// Checks that every row sums to one within `tol` and all entries are
    /// non-negative (allowing `-tol` of floating noise).
    pub fn is_row_stochastic(&self, tol: f64) -> bool {
        for i in 0..self.size {
            let row = self.row(i);
            if row.iter().any(|&v| v < -tol) {
                return false;
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > tol {
                return false;
            }
        }
        true
    }
}

/// Computes `exp(q * t)` by scaling and squaring with a Taylor series.
///
/// Adequate for the small generator matrices this project works with; the
/// scaling step keeps the scaled norm at or below one half so the series
/// converges quickly.
pub fn expm(q: &SquareMatrix, t: f64) -> Result<SquareMatrix, TreehistError> {
    if !t.is_finite() || t < 0.0 {
        return Err(TreehistError::Rate(
            ErrorInfo::new("bad-branch-length", "matrix exponential needs finite t >= 0")
                .with_context("t", t.to_string()),
        ));
    }
    let n = q.size();
    let scaled = q.scaled(t);
    let norm = scaled.max_abs_row_sum();
    let squarings = if norm > 0.5 {
        (norm / 0.5).log2().ceil() as i32
    } else {
        0
    };
    let base = scaled.scaled(0.5f64.powi(squarings));

    let mut result = SquareMatrix::identity(n);
    let mut term = SquareMatrix::identity(n);
    for k in 1..=MAX_EXPM_TERMS {
        term = term.mul(&base).scaled(1.0 / k as f64);
        let magnitude = term.max_abs_row_sum();
        for i in 0..n {
            for j in 0..n {
                result.set(i, j, result.get(i, j) + term.get(i, j));
            }
        }
        if magnitude < 1e-16 {
            break;
        }
    }
    for _ in 0..squarings {
        result = result.mul(&result);
    }
    Ok(result)
}
