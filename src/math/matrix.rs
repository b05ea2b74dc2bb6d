//! n×n square matrix, 1 ≤ n ≤ 4.
//!
//! # Convention
//! - Storage is **row-major**: element (row, col) lives at `row * n + col`
//! - Vectors are **column vectors** on the right: `M · v`
//! - `a.mul_assign(&b)` sets `a = a · b`, so `b` is applied to a vector first
//!
//! The determinant is computed by cofactor expansion over an explicit list of
//! active rows and columns, so minors are evaluated without copying the
//! matrix. The inverse is `adjoint / determinant`.

use std::fmt;

use approx::abs_diff_eq;
use log::error;

use super::vector::{Vector, MAX_DIMENSION};
use crate::error::{Error, Result};

const LOG_NAME: &str = "rasterworld::matrix";

/// Determinants within this distance of zero are treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-12;

/// Square matrix owning its backing storage.
///
/// Like [`Vector`], a matrix may be uninitialized ([`SquareMatrix::default`]
/// or after [`SquareMatrix::take`]); every operation then fails with
/// `NotInitialized`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SquareMatrix {
    n: usize,
    data: Option<Box<[f64]>>,
}

fn check_dimension(n: usize) -> Result<()> {
    if (1..=MAX_DIMENSION).contains(&n) {
        Ok(())
    } else {
        error!(target: LOG_NAME, "Invalid matrix dimension: {n}");
        Err(Error::invalid_operation(format!(
            "matrix dimension must be within 1..=4, got {n}"
        )))
    }
}

impl SquareMatrix {
    pub fn zeros(n: usize) -> Result<Self> {
        check_dimension(n)?;
        Ok(Self {
            n,
            data: Some(vec![0.0; n * n].into_boxed_slice()),
        })
    }

    pub fn identity(n: usize) -> Result<Self> {
        let mut m = Self::zeros(n)?;
        let data = m.data_mut()?;
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Ok(m)
    }

    /// Builds a matrix from `n * n` row-major values.
    pub fn from_slice(n: usize, values: &[f64]) -> Result<Self> {
        check_dimension(n)?;
        if values.len() != n * n {
            return Err(Error::length_mismatch(format!(
                "expected {} values for a {n}x{n} matrix, got {}",
                n * n,
                values.len()
            )));
        }
        Ok(Self {
            n,
            data: Some(values.to_vec().into_boxed_slice()),
        })
    }

    pub fn from_rows<const N: usize>(rows: [[f64; N]; N]) -> Result<Self> {
        let values: Vec<f64> = rows.iter().flatten().copied().collect();
        Self::from_slice(N, &values)
    }

    /// Moves the storage out, leaving `self` uninitialized.
    pub fn take(&mut self) -> SquareMatrix {
        let n = std::mem::take(&mut self.n);
        SquareMatrix {
            n,
            data: self.data.take(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.data.is_some()
    }

    fn data(&self) -> Result<&[f64]> {
        self.data.as_deref().ok_or_else(|| {
            error!(target: LOG_NAME, "The matrix is not initialized");
            Error::not_initialized("the matrix is not initialized")
        })
    }

    fn data_mut(&mut self) -> Result<&mut [f64]> {
        self.data.as_deref_mut().ok_or_else(|| {
            error!(target: LOG_NAME, "The matrix is not initialized");
            Error::not_initialized("the matrix is not initialized")
        })
    }

    /// Dimension of the matrix.
    pub fn n(&self) -> Result<usize> {
        self.data()?;
        Ok(self.n)
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.n || col >= self.n {
            error!(
                target: LOG_NAME,
                "Index ({row}, {col}) out of bound {}x{}", self.n, self.n
            );
            return Err(Error::index_out_of_bound(format!(
                "matrix index ({row}, {col}) out of bound {}x{}",
                self.n, self.n
            )));
        }
        Ok(())
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        let data = self.data()?;
        self.check_index(row, col)?;
        Ok(data[row * self.n + col])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.data()?;
        self.check_index(row, col)?;
        let n = self.n;
        self.data_mut()?[row * n + col] = value;
        Ok(())
    }

    /// Column `col` as a vector. Requires n ≥ 2.
    pub fn column(&self, col: usize) -> Result<Vector> {
        let data = self.data()?;
        self.check_index(0, col)?;
        let values: Vec<f64> = (0..self.n).map(|row| data[row * self.n + col]).collect();
        Vector::from_slice(&values)
    }

    pub fn set_column(&mut self, col: usize, v: &Vector) -> Result<()> {
        self.data()?;
        self.check_index(0, col)?;
        let lanes = v.lanes()?;
        let n = self.n;
        if lanes.len() != n {
            return Err(Error::length_mismatch(format!(
                "column of length {} for a {n}x{n} matrix",
                lanes.len()
            )));
        }
        let data = self.data_mut()?;
        for (row, value) in lanes.iter().enumerate() {
            data[row * n + col] = *value;
        }
        Ok(())
    }

    fn check_same_n(&self, other: &SquareMatrix, op: &str) -> Result<()> {
        if self.n != other.n {
            error!(
                target: LOG_NAME,
                "Call of SquareMatrix::{op}: matrices of unequal size {} and {}", self.n, other.n
            );
            return Err(Error::length_mismatch(format!(
                "{op} between {}x{} and {}x{} matrices",
                self.n, self.n, other.n, other.n
            )));
        }
        Ok(())
    }

    pub fn add_assign(&mut self, other: &SquareMatrix) -> Result<()> {
        let rhs = other.data()?;
        self.data()?;
        self.check_same_n(other, "add_assign")?;
        for (a, b) in self.data_mut()?.iter_mut().zip(rhs) {
            *a += b;
        }
        Ok(())
    }

    pub fn sub_assign(&mut self, other: &SquareMatrix) -> Result<()> {
        let rhs = other.data()?;
        self.data()?;
        self.check_same_n(other, "sub_assign")?;
        for (a, b) in self.data_mut()?.iter_mut().zip(rhs) {
            *a -= b;
        }
        Ok(())
    }

    /// `self = self · other`.
    pub fn mul_assign(&mut self, other: &SquareMatrix) -> Result<()> {
        let rhs = other.data()?;
        let lhs = self.data()?;
        self.check_same_n(other, "mul_assign")?;
        let n = self.n;
        let mut product = vec![0.0; n * n];
        for row in 0..n {
            for col in 0..n {
                product[row * n + col] = (0..n).map(|k| lhs[row * n + k] * rhs[k * n + col]).sum();
            }
        }
        self.data_mut()?.copy_from_slice(&product);
        Ok(())
    }

    /// Scalar multiplication in place.
    pub fn scale(&mut self, factor: f64) -> Result<()> {
        for value in self.data_mut()?.iter_mut() {
            *value *= factor;
        }
        Ok(())
    }

    /// Transforms `v` in place: `v = self · v`.
    pub fn apply(&self, v: &mut Vector) -> Result<()> {
        let data = self.data()?;
        let lanes = v.lanes_mut()?;
        let n = self.n;
        if lanes.len() != n {
            error!(
                target: LOG_NAME,
                "Call of SquareMatrix::apply: {n}x{n} matrix with vector of length {}",
                lanes.len()
            );
            return Err(Error::length_mismatch(format!(
                "cannot apply a {n}x{n} matrix to a vector of length {}",
                lanes.len()
            )));
        }
        let mut result = [0.0; MAX_DIMENSION];
        for (row, slot) in result.iter_mut().take(n).enumerate() {
            *slot = (0..n).map(|k| data[row * n + k] * lanes[k]).sum();
        }
        lanes.copy_from_slice(&result[..n]);
        Ok(())
    }

    pub fn transpose(&self) -> Result<SquareMatrix> {
        let data = self.data()?;
        let n = self.n;
        let mut values = vec![0.0; n * n];
        for row in 0..n {
            for col in 0..n {
                values[col * n + row] = data[row * n + col];
            }
        }
        SquareMatrix::from_slice(n, &values)
    }

    /// The leading `size`×`size` block.
    pub fn submatrix(&self, size: usize) -> Result<SquareMatrix> {
        let data = self.data()?;
        if size == 0 || size > self.n {
            return Err(Error::index_out_of_bound(format!(
                "submatrix of size {size} from a {}x{} matrix",
                self.n, self.n
            )));
        }
        let values: Vec<f64> = (0..size)
            .flat_map(|row| (0..size).map(move |col| data[row * self.n + col]))
            .collect();
        SquareMatrix::from_slice(size, &values)
    }

    pub fn determinant(&self) -> Result<f64> {
        let n = self.n()?;
        let all: Vec<usize> = (0..n).collect();
        self.determinant_of(&all, &all)
    }

    /// Determinant of the minor formed by `rows` × `cols`.
    pub fn determinant_of(&self, rows: &[usize], cols: &[usize]) -> Result<f64> {
        let data = self.data()?;
        if rows.len() != cols.len() {
            return Err(Error::length_mismatch(format!(
                "minor with {} rows and {} columns is not square",
                rows.len(),
                cols.len()
            )));
        }
        if rows.is_empty() {
            return Err(Error::invalid_operation(
                "determinant of an empty minor is undefined",
            ));
        }
        if let Some(bad) = rows.iter().chain(cols).find(|&&i| i >= self.n) {
            return Err(Error::index_out_of_bound(format!(
                "minor index {bad} out of bound {}",
                self.n
            )));
        }
        Ok(Self::expand(data, self.n, rows, cols))
    }

    fn expand(data: &[f64], n: usize, rows: &[usize], cols: &[usize]) -> f64 {
        let at = |r: usize, c: usize| data[r * n + c];
        match rows.len() {
            1 => at(rows[0], cols[0]),
            2 => at(rows[0], cols[0]) * at(rows[1], cols[1]) - at(rows[0], cols[1]) * at(rows[1], cols[0]),
            _ => {
                let mut det = 0.0;
                for (j, &col) in cols.iter().enumerate() {
                    let value = at(rows[0], col);
                    if value == 0.0 {
                        continue;
                    }
                    let rest: Vec<usize> = cols.iter().copied().filter(|&c| c != col).collect();
                    let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
                    det += sign * value * Self::expand(data, n, &rows[1..], &rest);
                }
                det
            }
        }
    }

    /// Algebraic complement of (row, col).
    pub fn cofactor(&self, row: usize, col: usize) -> Result<f64> {
        self.data()?;
        self.check_index(row, col)?;
        if self.n == 1 {
            return Ok(1.0);
        }
        let rows: Vec<usize> = (0..self.n).filter(|&r| r != row).collect();
        let cols: Vec<usize> = (0..self.n).filter(|&c| c != col).collect();
        let sign = if (row + col) % 2 == 0 { 1.0 } else { -1.0 };
        Ok(sign * self.determinant_of(&rows, &cols)?)
    }

    /// Transpose of the cofactor matrix.
    pub fn adjoint(&self) -> Result<SquareMatrix> {
        let n = self.n()?;
        let mut adj = SquareMatrix::zeros(n)?;
        for row in 0..n {
            for col in 0..n {
                adj.set(col, row, self.cofactor(row, col)?)?;
            }
        }
        Ok(adj)
    }

    pub fn inverse(&self) -> Result<SquareMatrix> {
        let det = self.determinant()?;
        if abs_diff_eq!(det, 0.0, epsilon = SINGULAR_EPSILON) {
            error!(target: LOG_NAME, "The matrix is not invertible (determinant {det})");
            return Err(Error::invalid_operation(
                "matrix is not invertible: determinant is zero",
            ));
        }
        let mut inv = self.adjoint()?;
        inv.scale(1.0 / det)?;
        Ok(inv)
    }

    // =========================================================================
    // 4x4 transform constructors
    // =========================================================================

    fn from_rows4(rows: [[f64; 4]; 4]) -> SquareMatrix {
        SquareMatrix {
            n: 4,
            data: Some(rows.iter().flatten().copied().collect()),
        }
    }

    /// Translation stored in the last column.
    pub fn translation(x: f64, y: f64, z: f64) -> SquareMatrix {
        Self::from_rows4([
            [1.0, 0.0, 0.0, x],
            [0.0, 1.0, 0.0, y],
            [0.0, 0.0, 1.0, z],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn scaling(x: f64, y: f64, z: f64) -> SquareMatrix {
        Self::from_rows4([
            [x, 0.0, 0.0, 0.0],
            [0.0, y, 0.0, 0.0],
            [0.0, 0.0, z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_x(angle: f64) -> SquareMatrix {
        let (s, c) = angle.sin_cos();
        Self::from_rows4([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, c, -s, 0.0],
            [0.0, s, c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_y(angle: f64) -> SquareMatrix {
        let (s, c) = angle.sin_cos();
        Self::from_rows4([
            [c, 0.0, s, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [-s, 0.0, c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_z(angle: f64) -> SquareMatrix {
        let (s, c) = angle.sin_cos();
        Self::from_rows4([
            [c, -s, 0.0, 0.0],
            [s, c, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Left-handed perspective projection; `w` ends up holding view-space z.
    pub fn perspective_lh(fov: f64, aspect_ratio: f64, near: f64, far: f64) -> SquareMatrix {
        let t = near * (fov / 2.0).tan();
        let r = t * aspect_ratio;
        let a = (far + near) / (near - far);
        let b = -2.0 * far * near / (far - near);
        Self::from_rows4([
            [near / r, 0.0, 0.0, 0.0],
            [0.0, near / t, 0.0, 0.0],
            [0.0, 0.0, a, b],
            [0.0, 0.0, 1.0, 0.0],
        ])
    }

    /// Maps normalized coordinates in [-1, 1] to pixels, y pointing down.
    /// z is scaled by `depth`.
    pub fn viewport(width: usize, height: usize, depth: f64) -> SquareMatrix {
        let w = width as f64 / 2.0;
        let h = height as f64 / 2.0;
        Self::from_rows4([
            [w, 0.0, 0.0, w],
            [0.0, -h, 0.0, h],
            [0.0, 0.0, depth, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }
}

impl fmt::Display for SquareMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(data) = self.data.as_deref() else {
            return f.write_str("(uninitialized)");
        };
        let precision = f.precision().unwrap_or(2);
        for row in 0..self.n {
            for col in 0..self.n {
                if col > 0 {
                    f.write_str("\t")?;
                }
                write!(f, "{:.precision$}", data[row * self.n + col])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
