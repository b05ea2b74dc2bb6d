//! Screen-space triangle over a shared vertex pool.
//!
//! A [`Triangle`] stores only an offset and three indices into a vertex pool
//! owned elsewhere (the scene). The pool is passed in at [`Triangle::build`]
//! time, so the triangle never holds a reference that could dangle when the
//! pool grows.
//!
//! # Plane equation
//!
//! `build` solves
//!
//! ```text
//! a·x_k + b·y_k + c·z_k = 1    for k = 1..3
//! ```
//!
//! and depth anywhere on the face is evaluated as `z = (1 - a·x - b·y) / c`.
//! This is an affine interpolation in screen space, not a perspective-correct
//! one, and the lighting stage relies on it exactly.
//!
//! # Coverage
//!
//! A point is inside when the three edge functions share a sign; points on an
//! edge count as inside. Zero-area triangles cover nothing.

use log::{error, trace};

use crate::error::{Error, Result};
use crate::math::{SquareMatrix, Vector};

const LOG_NAME: &str = "rasterworld::triangle";

/// Plane coefficients with `a·x + b·y + c·z = 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// Integer pixel bounds of a triangle, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

/// A triangle referencing three vertices of a shared pool.
#[derive(Clone, Debug, PartialEq)]
pub struct Triangle {
    offset: usize,
    indices: [usize; 3],
    // Absolute indices into the scene's normal pool.
    normal_indices: Option<[usize; 3]>,

    // Derived by `build`.
    points: [[f64; 3]; 3],
    plane: Option<Plane>,
}

/// 2D edge function: signed doubled area of (a, b, p).
#[inline]
fn edge_function(a: [f64; 3], b: [f64; 3], px: f64, py: f64) -> f64 {
    (b[0] - a[0]) * (py - a[1]) - (b[1] - a[1]) * (px - a[0])
}

impl Triangle {
    /// `v1..v3` are 0-based indices relative to `offset`.
    pub fn new(offset: usize, v1: usize, v2: usize, v3: usize) -> Self {
        Self {
            offset,
            indices: [v1, v2, v3],
            normal_indices: None,
            points: [[0.0; 3]; 3],
            plane: None,
        }
    }

    /// Attaches absolute indices into a normal pool.
    pub fn with_normals(mut self, normals: [usize; 3]) -> Self {
        self.normal_indices = Some(normals);
        self
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn indices(&self) -> [usize; 3] {
        self.indices
    }

    /// Absolute pool indices of the three vertices.
    pub fn vertex_indices(&self) -> [usize; 3] {
        self.indices.map(|i| self.offset + i)
    }

    pub fn normal_indices(&self) -> Option<[usize; 3]> {
        self.normal_indices
    }

    /// Projected points from the last `build`.
    pub fn points(&self) -> [[f64; 3]; 3] {
        self.points
    }

    /// Plane from the last successful `build`.
    pub fn plane(&self) -> Option<Plane> {
        self.plane
    }

    pub fn is_built(&self) -> bool {
        self.plane.is_some()
    }

    /// Recomputes the projected points and the plane from `vertices`.
    ///
    /// Must run again whenever the referenced vertices change. Fails when an
    /// index is outside the pool or when the plane passes through the origin
    /// (no `a·x + b·y + c·z = 1` form exists).
    pub fn build(&mut self, vertices: &[Vector]) -> Result<()> {
        self.plane = None;
        for (k, index) in self.vertex_indices().into_iter().enumerate() {
            let vertex = vertices.get(index).ok_or_else(|| {
                error!(
                    target: LOG_NAME,
                    "Vertex index {index} out of bound {}",
                    vertices.len()
                );
                Error::index_out_of_bound(format!(
                    "vertex index {index} out of bound {}",
                    vertices.len()
                ))
            })?;
            let lanes = vertex.lanes()?;
            if lanes.len() < 3 {
                return Err(Error::length_mismatch(format!(
                    "vertex {index} has {} lanes, need at least 3",
                    lanes.len()
                )));
            }
            self.points[k] = [lanes[0], lanes[1], lanes[2]];
        }

        let system = SquareMatrix::from_rows(self.points)?;
        let inverse = system.inverse().map_err(|e| {
            e.context(format!(
                "triangle {:?} lies on a plane through the origin",
                self.vertex_indices()
            ))
        })?;
        let mut abc = Vector::from([1.0, 1.0, 1.0]);
        inverse.apply(&mut abc)?;
        let [a, b, c] = [abc.get(0)?, abc.get(1)?, abc.get(2)?];
        self.plane = Some(Plane { a, b, c });
        trace!(target: LOG_NAME, "Built triangle {}", self);
        Ok(())
    }

    /// Doubled signed screen-space area.
    fn signed_area(&self) -> f64 {
        let [p1, p2, p3] = self.points;
        edge_function(p1, p2, p3[0], p3[1])
    }

    /// Whether (x, y) lies inside or on the border of the projected triangle.
    pub fn is_in(&self, x: f64, y: f64) -> bool {
        if self.plane.is_none() || self.signed_area() == 0.0 {
            return false;
        }
        let [p1, p2, p3] = self.points;
        let e1 = edge_function(p1, p2, x, y);
        let e2 = edge_function(p2, p3, x, y);
        let e3 = edge_function(p3, p1, x, y);
        (e1 >= 0.0 && e2 >= 0.0 && e3 >= 0.0) || (e1 <= 0.0 && e2 <= 0.0 && e3 <= 0.0)
    }

    /// Depth of the face at (x, y). NaN before the triangle is built.
    #[inline]
    pub fn z(&self, x: f64, y: f64) -> f64 {
        match self.plane {
            Some(Plane { a, b, c }) => (1.0 - a * x - b * y) / c,
            None => f64::NAN,
        }
    }

    /// Barycentric weights of (x, y) relative to the three projected points.
    pub fn areal_coordinates(&self, x: f64, y: f64) -> Result<Vector> {
        if self.plane.is_none() {
            return Err(Error::not_initialized("triangle has not been built"));
        }
        let area = self.signed_area();
        if area == 0.0 {
            error!(
                target: LOG_NAME,
                "Degenerate triangle {:?} has no areal coordinates",
                self.vertex_indices()
            );
            return Err(Error::invalid_operation("degenerate triangle has zero area"));
        }
        let [p1, p2, p3] = self.points;
        let w1 = edge_function(p2, p3, x, y) / area;
        let w2 = edge_function(p3, p1, x, y) / area;
        let w3 = 1.0 - w1 - w2;
        Ok(Vector::from([w1, w2, w3]))
    }

    /// Unit plane normal, oriented toward the viewer (+z).
    pub fn face_normal(&self) -> Result<Vector> {
        let Plane { a, b, c } = self
            .plane
            .ok_or_else(|| Error::not_initialized("triangle has not been built"))?;
        let mut normal = Vector::from([a, b, c]);
        normal.normalize()?;
        if c < 0.0 {
            normal.scale(-1.0)?;
        }
        Ok(normal)
    }

    /// Floor/ceil bounding box of the projected points.
    pub fn bounds(&self) -> Result<Bounds> {
        if self.plane.is_none() {
            return Err(Error::not_initialized("triangle has not been built"));
        }
        let [p1, p2, p3] = self.points;
        Ok(Bounds {
            min_x: p1[0].min(p2[0]).min(p3[0]).floor() as i64,
            min_y: p1[1].min(p2[1]).min(p3[1]).floor() as i64,
            max_x: p1[0].max(p2[0]).max(p3[0]).ceil() as i64,
            max_y: p1[1].max(p2[1]).max(p3[1]).ceil() as i64,
        })
    }

    /// Pixels of a `width`×`height` extent covered by this triangle.
    ///
    /// Empty when the triangle has not been built.
    pub fn covered_pixels(
        &self,
        width: usize,
        height: usize,
    ) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (x_range, y_range) = match self.bounds() {
            Ok(b) if width > 0 && height > 0 => {
                let min_x = b.min_x.max(0);
                let max_x = b.max_x.min(width as i64 - 1);
                let min_y = b.min_y.max(0);
                let max_y = b.max_y.min(height as i64 - 1);
                (min_x..=max_x, min_y..=max_y)
            }
            _ => (0..=-1, 0..=-1),
        };
        y_range
            .flat_map(move |y| x_range.clone().map(move |x| (x, y)))
            .filter(move |&(x, y)| self.is_in(x as f64, y as f64))
            .map(|(x, y)| (x as usize, y as usize))
    }
}

impl std::fmt::Display for Triangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [p1, p2, p3] = self.points;
        write!(
            f,
            "[{:?}] ({:.2}, {:.2}, {:.2}) ({:.2}, {:.2}, {:.2}) ({:.2}, {:.2}, {:.2})",
            self.vertex_indices(),
            p1[0],
            p1[1],
            p1[2],
            p2[0],
            p2[1],
            p2[2],
            p3[0],
            p3[1],
            p3[2]
        )?;
        if let Some(Plane { a, b, c }) = self.plane {
            write!(f, " plane {a:.4}x + {b:.4}y + {c:.4}z = 1")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use approx::assert_relative_eq;

    fn pool(points: &[[f64; 3]]) -> Vec<Vector> {
        points
            .iter()
            .map(|p| Vector::from([p[0], p[1], p[2], 1.0]))
            .collect()
    }

    fn flat_triangle() -> Triangle {
        let vertices = pool(&[[0.0, 0.0, 5.0], [4.0, 0.0, 5.0], [0.0, 4.0, 5.0]]);
        let mut t = Triangle::new(0, 0, 1, 2);
        t.build(&vertices).unwrap();
        t
    }

    #[test]
    fn constant_depth_plane() {
        let t = flat_triangle();
        assert_relative_eq!(t.z(1.0, 1.0), 5.0, epsilon = 1e-9);
        assert!(t.is_in(1.0, 1.0));
        assert!(!t.is_in(5.0, 5.0));
    }

    #[test]
    fn border_counts_as_inside() {
        let t = flat_triangle();
        assert!(t.is_in(0.0, 0.0));
        assert!(t.is_in(2.0, 2.0));
        assert!(t.is_in(2.0, 0.0));
        assert!(!t.is_in(-0.1, 1.0));
    }

    #[test]
    fn winding_does_not_matter() {
        let vertices = pool(&[[0.0, 0.0, 5.0], [0.0, 4.0, 5.0], [4.0, 0.0, 5.0]]);
        let mut t = Triangle::new(0, 0, 1, 2);
        t.build(&vertices).unwrap();
        assert!(t.is_in(1.0, 1.0));
        assert!(!t.is_in(3.0, 3.0));
    }

    #[test]
    fn sloped_plane_depth() {
        // z = 2 + x
        let vertices = pool(&[[0.0, 0.0, 2.0], [4.0, 0.0, 6.0], [0.0, 4.0, 2.0]]);
        let mut t = Triangle::new(0, 0, 1, 2);
        t.build(&vertices).unwrap();
        assert_relative_eq!(t.z(1.0, 1.0), 3.0, epsilon = 1e-9);
        assert_relative_eq!(t.z(2.0, 0.5), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn offset_shifts_indices() {
        let vertices = pool(&[
            [9.0, 9.0, 9.0],
            [0.0, 0.0, 5.0],
            [4.0, 0.0, 5.0],
            [0.0, 4.0, 5.0],
        ]);
        let mut t = Triangle::new(1, 0, 1, 2);
        t.build(&vertices).unwrap();
        assert_eq!(t.vertex_indices(), [1, 2, 3]);
        assert!(t.is_in(1.0, 1.0));
    }

    #[test]
    fn out_of_pool_index_fails() {
        let vertices = pool(&[[0.0, 0.0, 5.0], [4.0, 0.0, 5.0]]);
        let mut t = Triangle::new(0, 0, 1, 2);
        assert_eq!(
            t.build(&vertices).unwrap_err().kind(),
            ErrorKind::IndexOutOfBound
        );
        assert!(!t.is_built());
    }

    #[test]
    fn plane_through_origin_fails() {
        let vertices = pool(&[[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 4.0, 0.0]]);
        let mut t = Triangle::new(0, 0, 1, 2);
        let err = t.build(&vertices).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(err.cause().is_some());
    }

    #[test]
    fn areal_coordinates_sum_to_one() {
        let t = flat_triangle();
        let w = t.areal_coordinates(1.0, 1.0).unwrap();
        let lanes = w.lanes().unwrap();
        assert_relative_eq!(lanes.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(lanes[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(lanes[1], 0.25, epsilon = 1e-12);
        assert_relative_eq!(lanes[2], 0.25, epsilon = 1e-12);

        let at_vertex = t.areal_coordinates(4.0, 0.0).unwrap();
        assert_relative_eq!(at_vertex.get(1).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_triangle() {
        // Collinear in screen space (y = 1), plane still solvable with c = 0.
        let vertices = pool(&[[0.0, 1.0, 1.0], [2.0, 1.0, 2.0], [4.0, 1.0, 5.0]]);
        let mut t = Triangle::new(0, 0, 1, 2);
        t.build(&vertices).unwrap();
        assert!(!t.is_in(1.0, 1.0));
        assert_eq!(
            t.areal_coordinates(1.0, 1.0).unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(t.covered_pixels(10, 10).count(), 0);
    }

    #[test]
    fn bounds_floor_and_ceil() {
        let vertices = pool(&[[0.5, 0.2, 5.0], [3.7, 0.9, 5.0], [1.1, 2.3, 5.0]]);
        let mut t = Triangle::new(0, 0, 1, 2);
        t.build(&vertices).unwrap();
        assert_eq!(
            t.bounds().unwrap(),
            Bounds {
                min_x: 0,
                min_y: 0,
                max_x: 4,
                max_y: 3
            }
        );
    }

    #[test]
    fn covered_pixels_clip_to_extent() {
        let t = flat_triangle();
        let all: Vec<_> = t.covered_pixels(100, 100).collect();
        // Lattice points with x + y <= 4.
        assert_eq!(all.len(), 15);

        let clipped: Vec<_> = t.covered_pixels(2, 2).collect();
        assert_eq!(clipped, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn unbuilt_triangle_is_inert() {
        let t = Triangle::new(0, 0, 1, 2);
        assert!(!t.is_in(0.0, 0.0));
        assert!(t.z(0.0, 0.0).is_nan());
        assert_eq!(t.bounds().unwrap_err().kind(), ErrorKind::NotInitialized);
        assert_eq!(t.covered_pixels(10, 10).count(), 0);
    }

    #[test]
    fn face_normal_faces_viewer() {
        let t = flat_triangle();
        let n = t.face_normal().unwrap();
        assert_relative_eq!(n.get(2).unwrap(), 1.0, epsilon = 1e-12);

        // Same plane at negative depth flips the sign of c.
        let vertices = pool(&[[0.0, 0.0, -5.0], [4.0, 0.0, -5.0], [0.0, 4.0, -5.0]]);
        let mut behind = Triangle::new(0, 0, 1, 2);
        behind.build(&vertices).unwrap();
        assert_relative_eq!(behind.face_normal().unwrap().get(2).unwrap(), 1.0, epsilon = 1e-12);
    }
}
