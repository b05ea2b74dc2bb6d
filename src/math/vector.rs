//! Fixed-length numeric vector (2, 3 or 4 lanes).
//!
//! The length is chosen at construction and never changes. A vector can also
//! be *uninitialized*: that is the state of [`Vector::default`] and of any
//! vector whose storage was moved out with [`Vector::take`]. Every operation on
//! an uninitialized vector fails with [`ErrorKind::NotInitialized`].
//!
//! [`ErrorKind::NotInitialized`]: crate::error::ErrorKind::NotInitialized

use std::fmt;

use log::error;

use crate::error::{Error, Result};

const LOG_NAME: &str = "rasterworld::vector";

/// Largest supported vector length.
pub const MAX_DIMENSION: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Lanes {
    values: [f64; MAX_DIMENSION],
    len: usize,
}

impl Lanes {
    fn as_slice(&self) -> &[f64] {
        &self.values[..self.len]
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values[..self.len]
    }
}

/// A 2-, 3- or 4-lane vector of `f64`.
///
/// `clone()` produces an independent copy. Ownership transfer that leaves the
/// source behind in the uninitialized state is explicit, via [`Vector::take`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vector {
    storage: Option<Lanes>,
}

fn check_dimension(n: usize) -> Result<()> {
    if (2..=MAX_DIMENSION).contains(&n) {
        Ok(())
    } else {
        error!(target: LOG_NAME, "Invalid vector length: {n}");
        Err(Error::invalid_operation(format!(
            "vector length must be 2, 3 or 4, got {n}"
        )))
    }
}

impl Vector {
    /// A zero vector of length `n`.
    pub fn zeros(n: usize) -> Result<Self> {
        check_dimension(n)?;
        Ok(Self {
            storage: Some(Lanes {
                values: [0.0; MAX_DIMENSION],
                len: n,
            }),
        })
    }

    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let mut v = Self::zeros(values.len())?;
        v.lanes_mut()?.copy_from_slice(values);
        Ok(v)
    }

    /// Moves the storage out, leaving `self` uninitialized.
    pub fn take(&mut self) -> Vector {
        Vector {
            storage: self.storage.take(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.storage.is_some()
    }

    fn storage(&self) -> Result<&Lanes> {
        self.storage.as_ref().ok_or_else(|| {
            error!(target: LOG_NAME, "The vector is not initialized");
            Error::not_initialized("the vector is not initialized")
        })
    }

    fn storage_mut(&mut self) -> Result<&mut Lanes> {
        self.storage.as_mut().ok_or_else(|| {
            error!(target: LOG_NAME, "The vector is not initialized");
            Error::not_initialized("the vector is not initialized")
        })
    }

    /// The lanes as a slice.
    pub fn lanes(&self) -> Result<&[f64]> {
        Ok(self.storage()?.as_slice())
    }

    pub fn lanes_mut(&mut self) -> Result<&mut [f64]> {
        Ok(self.storage_mut()?.as_mut_slice())
    }

    /// Number of lanes.
    pub fn len(&self) -> Result<usize> {
        Ok(self.storage()?.len)
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        let lanes = self.lanes()?;
        lanes.get(index).copied().ok_or_else(|| {
            error!(target: LOG_NAME, "Index {index} out of bound {}", lanes.len());
            Error::index_out_of_bound(format!(
                "vector index {index} out of bound {}",
                lanes.len()
            ))
        })
    }

    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        let lanes = self.lanes_mut()?;
        let len = lanes.len();
        match lanes.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => {
                error!(target: LOG_NAME, "Index {index} out of bound {len}");
                Err(Error::index_out_of_bound(format!(
                    "vector index {index} out of bound {len}"
                )))
            }
        }
    }

    pub fn set_all(&mut self, value: f64) -> Result<()> {
        self.lanes_mut()?.fill(value);
        Ok(())
    }

    fn zip_with(&mut self, other: &Vector, op: &str, f: impl Fn(f64, f64) -> f64) -> Result<()> {
        let rhs = other.lanes()?;
        let lhs = self.lanes_mut()?;
        if lhs.len() != rhs.len() {
            error!(
                target: LOG_NAME,
                "Call of Vector::{op}: two vectors of unequal length: {} and {}",
                lhs.len(),
                rhs.len()
            );
            return Err(Error::length_mismatch(format!(
                "{op} between vectors of length {} and {}",
                lhs.len(),
                rhs.len()
            )));
        }
        for (a, b) in lhs.iter_mut().zip(rhs) {
            *a = f(*a, *b);
        }
        Ok(())
    }

    /// `self += other`, lane by lane.
    pub fn add_assign(&mut self, other: &Vector) -> Result<()> {
        self.zip_with(other, "add_assign", |a, b| a + b)
    }

    /// `self -= other`, lane by lane.
    pub fn sub_assign(&mut self, other: &Vector) -> Result<()> {
        self.zip_with(other, "sub_assign", |a, b| a - b)
    }

    /// `self = self × other`. Only defined for 3-lane vectors.
    pub fn cross_assign(&mut self, other: &Vector) -> Result<()> {
        let rhs = other.lanes()?;
        let lhs = self.lanes_mut()?;
        if lhs.len() != rhs.len() {
            error!(
                target: LOG_NAME,
                "Call of Vector::cross_assign: two vectors of unequal length: {} and {}",
                lhs.len(),
                rhs.len()
            );
            return Err(Error::length_mismatch(format!(
                "cross product between vectors of length {} and {}",
                lhs.len(),
                rhs.len()
            )));
        }
        if lhs.len() != 3 {
            error!(target: LOG_NAME, "Cross product requested for length {}", lhs.len());
            return Err(Error::invalid_operation(
                "cross product is only defined for 3-lane vectors",
            ));
        }
        let x = lhs[1] * rhs[2] - lhs[2] * rhs[1];
        let y = lhs[2] * rhs[0] - lhs[0] * rhs[2];
        let z = lhs[0] * rhs[1] - lhs[1] * rhs[0];
        lhs.copy_from_slice(&[x, y, z]);
        Ok(())
    }

    /// Scalar multiplication in place.
    pub fn scale(&mut self, factor: f64) -> Result<()> {
        for lane in self.lanes_mut()? {
            *lane *= factor;
        }
        Ok(())
    }

    pub fn dot(&self, other: &Vector) -> Result<f64> {
        let lhs = self.lanes()?;
        let rhs = other.lanes()?;
        if lhs.len() != rhs.len() {
            error!(
                target: LOG_NAME,
                "Call of Vector::dot: two vectors of unequal length: {} and {}",
                lhs.len(),
                rhs.len()
            );
            return Err(Error::length_mismatch(format!(
                "dot product between vectors of length {} and {}",
                lhs.len(),
                rhs.len()
            )));
        }
        Ok(lhs.iter().zip(rhs).map(|(a, b)| a * b).sum())
    }

    /// Euclidean length.
    pub fn norm(&self) -> Result<f64> {
        Ok(self.dot(self)?.sqrt())
    }

    pub fn normalize(&mut self) -> Result<()> {
        let norm = self.norm()?;
        if norm <= f64::EPSILON {
            return Err(Error::invalid_operation("cannot normalize a zero vector"));
        }
        self.scale(1.0 / norm)
    }

    /// Divides a 4-lane homogeneous point by its `w` lane.
    ///
    /// Left untouched when `w` is 0 or 1.
    pub fn homogeneous_divide(&mut self) -> Result<()> {
        let lanes = self.lanes_mut()?;
        if lanes.len() != 4 {
            return Err(Error::invalid_operation(
                "homogeneous divide requires a 4-lane vector",
            ));
        }
        let w = lanes[3];
        if w != 0.0 && w != 1.0 {
            for lane in lanes.iter_mut() {
                *lane /= w;
            }
        }
        Ok(())
    }

    /// The first three lanes as a new 3-lane vector.
    pub fn to_vec3(&self) -> Result<Vector> {
        let lanes = self.lanes()?;
        if lanes.len() < 3 {
            return Err(Error::length_mismatch(format!(
                "cannot take three lanes of a length {} vector",
                lanes.len()
            )));
        }
        Vector::from_slice(&lanes[..3])
    }
}

impl From<[f64; 2]> for Vector {
    fn from(values: [f64; 2]) -> Self {
        Self {
            storage: Some(Lanes {
                values: [values[0], values[1], 0.0, 0.0],
                len: 2,
            }),
        }
    }
}

impl From<[f64; 3]> for Vector {
    fn from(values: [f64; 3]) -> Self {
        Self {
            storage: Some(Lanes {
                values: [values[0], values[1], values[2], 0.0],
                len: 3,
            }),
        }
    }
}

impl From<[f64; 4]> for Vector {
    fn from(values: [f64; 4]) -> Self {
        Self {
            storage: Some(Lanes { values, len: 4 }),
        }
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.storage {
            None => f.write_str("(uninitialized)"),
            Some(lanes) => {
                let precision = f.precision().unwrap_or(2);
                f.write_str("(")?;
                for (i, v) in lanes.as_slice().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v:.precision$}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use approx::assert_relative_eq;

    fn assert_lanes_eq(v: &Vector, expected: &[f64]) {
        let lanes = v.lanes().unwrap();
        assert_eq!(lanes.len(), expected.len());
        for (a, b) in lanes.iter().zip(expected) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn rejects_unsupported_lengths() {
        assert_eq!(
            Vector::zeros(5).unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );
        assert!(Vector::from_slice(&[1.0]).is_err());
        assert_eq!(Vector::zeros(3).unwrap().len().unwrap(), 3);
    }

    #[test]
    fn add_then_sub_restores_original() {
        let mut v1 = Vector::from([1.5, -2.25, 3.0, 1.0]);
        let v2 = Vector::from([0.1, 7.0, -4.5, 2.0]);
        v1.add_assign(&v2).unwrap();
        v1.sub_assign(&v2).unwrap();
        assert_lanes_eq(&v1, &[1.5, -2.25, 3.0, 1.0]);
    }

    #[test]
    fn cross_product_is_anti_commutative() {
        let a = Vector::from([1.0, 2.0, 3.0]);
        let b = Vector::from([-4.0, 0.5, 2.0]);

        let mut ab = a.clone();
        ab.cross_assign(&b).unwrap();
        let mut ba = b.clone();
        ba.cross_assign(&a).unwrap();
        ba.scale(-1.0).unwrap();

        assert_lanes_eq(&ab, ba.lanes().unwrap());
    }

    #[test]
    fn cross_product_of_axes() {
        let mut x = Vector::from([1.0, 0.0, 0.0]);
        x.cross_assign(&Vector::from([0.0, 1.0, 0.0])).unwrap();
        assert_lanes_eq(&x, &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn cross_product_requires_three_lanes() {
        let mut a = Vector::from([1.0, 2.0, 3.0, 4.0]);
        let b = Vector::from([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            a.cross_assign(&b).unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );
    }

    #[test]
    fn mismatched_lengths_fail() {
        let mut a = Vector::from([1.0, 2.0, 3.0]);
        let b = Vector::from([1.0, 2.0]);
        assert_eq!(a.add_assign(&b).unwrap_err().kind(), ErrorKind::LengthMismatch);
        assert_eq!(a.sub_assign(&b).unwrap_err().kind(), ErrorKind::LengthMismatch);
        assert_eq!(a.cross_assign(&b).unwrap_err().kind(), ErrorKind::LengthMismatch);
        assert_eq!(a.dot(&b).unwrap_err().kind(), ErrorKind::LengthMismatch);
    }

    #[test]
    fn take_leaves_source_uninitialized() {
        let mut source = Vector::from([1.0, 2.0, 3.0]);
        let moved = source.take();

        assert_lanes_eq(&moved, &[1.0, 2.0, 3.0]);
        assert!(!source.is_initialized());
        assert_eq!(source.len().unwrap_err().kind(), ErrorKind::NotInitialized);
        assert_eq!(source.get(0).unwrap_err().kind(), ErrorKind::NotInitialized);
        assert_eq!(source.scale(2.0).unwrap_err().kind(), ErrorKind::NotInitialized);
        assert_eq!(
            source.dot(&moved).unwrap_err().kind(),
            ErrorKind::NotInitialized
        );
    }

    #[test]
    fn clone_is_independent() {
        let original = Vector::from([1.0, 2.0]);
        let mut copy = original.clone();
        copy.set(0, 9.0).unwrap();
        assert_eq!(original.get(0).unwrap(), 1.0);
        assert_eq!(copy.get(0).unwrap(), 9.0);
    }

    #[test]
    fn index_out_of_bound() {
        let mut v = Vector::from([1.0, 2.0, 3.0]);
        assert_eq!(v.get(3).unwrap_err().kind(), ErrorKind::IndexOutOfBound);
        assert_eq!(v.set(7, 1.0).unwrap_err().kind(), ErrorKind::IndexOutOfBound);
    }

    #[test]
    fn dot_and_normalize() {
        let mut v = Vector::from([3.0, 4.0, 0.0]);
        assert_relative_eq!(v.dot(&v).unwrap(), 25.0);
        v.normalize().unwrap();
        assert_relative_eq!(v.norm().unwrap(), 1.0, epsilon = 1e-12);
        assert!(Vector::zeros(3).unwrap().normalize().is_err());
    }

    #[test]
    fn homogeneous_divide_scales_by_w() {
        let mut p = Vector::from([2.0, 4.0, 6.0, 2.0]);
        p.homogeneous_divide().unwrap();
        assert_lanes_eq(&p, &[1.0, 2.0, 3.0, 1.0]);

        let mut at_infinity = Vector::from([2.0, 4.0, 6.0, 0.0]);
        at_infinity.homogeneous_divide().unwrap();
        assert_lanes_eq(&at_infinity, &[2.0, 4.0, 6.0, 0.0]);
    }

    #[test]
    fn display_uses_precision() {
        let v = Vector::from([1.0, 2.5]);
        assert_eq!(format!("{v}"), "(1.00, 2.50)");
        assert_eq!(format!("{v:.1}"), "(1.0, 2.5)");
        assert_eq!(format!("{}", Vector::default()), "(uninitialized)");
    }
}
