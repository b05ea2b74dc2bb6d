//! Transform component for placing models in a scene.
//!
//! Provides a [`Transform`] struct with a fluent API for managing position,
//! rotation (Euler angles), and scale.

use crate::error::Result;
use crate::math::SquareMatrix;

/// A 3D transform with position, rotation (Euler angles), and scale.
///
/// Provides a fluent API where mutating methods return `&mut Self` for chaining:
///
/// ```ignore
/// transform
///     .set_position_xyz(5.0, 2.0, 0.0)
///     .rotate_y(0.1)
///     .set_scale_uniform(2.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    position: [f64; 3],
    rotation: [f64; 3], // Euler angles in radians: x=pitch, y=yaw, z=roll
    scale: [f64; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    /// Create a new transform with default values (position=0, rotation=0, scale=1).
    pub fn new() -> Self {
        Self::default()
    }

    // ============ Position ============

    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub fn set_position_xyz(&mut self, x: f64, y: f64, z: f64) -> &mut Self {
        self.position = [x, y, z];
        self
    }

    /// Translate by a delta vector.
    pub fn translate(&mut self, delta: [f64; 3]) -> &mut Self {
        for (p, d) in self.position.iter_mut().zip(delta) {
            *p += d;
        }
        self
    }

    pub fn translate_z(&mut self, dz: f64) -> &mut Self {
        self.position[2] += dz;
        self
    }

    // ============ Rotation ============

    /// Get the rotation (Euler angles in radians).
    pub fn rotation(&self) -> [f64; 3] {
        self.rotation
    }

    /// Rotate around the X axis (pitch).
    pub fn rotate_x(&mut self, angle: f64) -> &mut Self {
        self.rotation[0] += angle;
        self
    }

    /// Rotate around the Y axis (yaw).
    pub fn rotate_y(&mut self, angle: f64) -> &mut Self {
        self.rotation[1] += angle;
        self
    }

    /// Rotate around the Z axis (roll).
    pub fn rotate_z(&mut self, angle: f64) -> &mut Self {
        self.rotation[2] += angle;
        self
    }

    // ============ Scale ============

    pub fn scale(&self) -> [f64; 3] {
        self.scale
    }

    pub fn set_scale(&mut self, scale: [f64; 3]) -> &mut Self {
        self.scale = scale;
        self
    }

    /// Set uniform scale (same value for x, y, z).
    pub fn set_scale_uniform(&mut self, s: f64) -> &mut Self {
        self.scale = [s; 3];
        self
    }

    /// Multiply the current scale uniformly.
    pub fn scale_uniform(&mut self, factor: f64) -> &mut Self {
        for s in &mut self.scale {
            *s *= factor;
        }
        self
    }

    // ============ Matrix Generation ============

    /// Generate the 4x4 transformation matrix.
    ///
    /// Order: Translation * RotationX * RotationY * RotationZ * Scale
    /// (Scale applied first, then rotations, then translation)
    pub fn to_matrix(&self) -> Result<SquareMatrix> {
        let [px, py, pz] = self.position;
        let [rx, ry, rz] = self.rotation;
        let [sx, sy, sz] = self.scale;

        let mut m = SquareMatrix::translation(px, py, pz);
        m.mul_assign(&SquareMatrix::rotation_x(rx))?;
        m.mul_assign(&SquareMatrix::rotation_y(ry))?;
        m.mul_assign(&SquareMatrix::rotation_z(rz))?;
        m.mul_assign(&SquareMatrix::scaling(sx, sy, sz))?;
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector;
    use approx::assert_relative_eq;

    #[test]
    fn test_default() {
        let t = Transform::default();
        assert_eq!(t.position(), [0.0; 3]);
        assert_eq!(t.rotation(), [0.0; 3]);
        assert_eq!(t.scale(), [1.0; 3]);
    }

    #[test]
    fn test_fluent_api() {
        let mut t = Transform::new();
        t.set_position_xyz(1.0, 2.0, 3.0)
            .rotate_y(0.5)
            .set_scale_uniform(2.0);

        assert_eq!(t.position(), [1.0, 2.0, 3.0]);
        assert_relative_eq!(t.rotation()[1], 0.5);
        assert_eq!(t.scale(), [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_translate() {
        let mut t = Transform::new();
        t.set_position_xyz(1.0, 0.0, 0.0)
            .translate([2.0, 0.0, 0.0])
            .translate_z(-4.0);
        assert_eq!(t.position(), [3.0, 0.0, -4.0]);
    }

    #[test]
    fn test_scale_uniform() {
        let mut t = Transform::new();
        t.set_scale([2.0, 3.0, 4.0]).scale_uniform(2.0);
        assert_eq!(t.scale(), [4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_to_matrix_identity() {
        let m = Transform::default().to_matrix().unwrap();
        assert_eq!(m, SquareMatrix::identity(4).unwrap());
    }

    #[test]
    fn test_scale_then_rotate_then_translate() {
        let mut t = Transform::new();
        t.set_position_xyz(0.0, 0.0, -5.0)
            .rotate_z(std::f64::consts::FRAC_PI_2)
            .set_scale_uniform(2.0);

        let mut p = Vector::from([1.0, 0.0, 0.0, 1.0]);
        t.to_matrix().unwrap().apply(&mut p).unwrap();
        assert_relative_eq!(p.get(0).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.get(1).unwrap(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(p.get(2).unwrap(), -5.0, epsilon = 1e-12);
    }
}
