//! The scene: vertex pools, triangles, frame and lighting.
//!
//! Models are appended to a shared vertex pool. A second, equally long pool
//! holds the working copy that transforms are applied to; triangles are always
//! built from the working pool. [`Scene::build`] renders one frame.

use log::{debug, error, info};

use crate::config::RenderConfig;
use crate::error::{Degraded, Error, Result};
use crate::light::{LightingModel, SurfacePoint};
use crate::math::{SquareMatrix, Vector};
use crate::mesh::MeshSource;
use crate::render::{FrameStore, Pixel};
use crate::triangle::Triangle;

const LOG_NAME: &str = "rasterworld::scene";

/// Vertex range one model occupies in the scene's pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectRange {
    pub offset: usize,
    pub len: usize,
}

impl ObjectRange {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

#[derive(Debug)]
pub struct Scene {
    vertices: Vec<Vector>,
    transformed_vertices: Vec<Vector>,
    normals: Vec<Vector>,
    transformed_normals: Vec<Vector>,
    triangles: Vec<Triangle>,
    frame: FrameStore,
    lighting: LightingModel,
}

/// Converts a 1-based mesh index into an index below `len`.
fn zero_based(index: usize, len: usize, what: &str) -> Result<usize> {
    if index == 0 || index > len {
        error!(target: LOG_NAME, "Face references {what} {index}, model has {len}");
        return Err(Error::index_out_of_bound(format!(
            "{what} index {index} outside 1..={len}"
        )));
    }
    Ok(index - 1)
}

/// `M · v` for a homogeneous point, divided back by `w`.
fn transform_point(matrix: &SquareMatrix, vertex: &mut Vector) -> Result<()> {
    matrix.apply(vertex)?;
    vertex.homogeneous_divide()
}

/// Inverse-transpose of the leading 3×3 block.
fn normal_matrix(matrix: &SquareMatrix) -> Result<SquareMatrix> {
    matrix
        .submatrix(3)?
        .inverse()
        .and_then(|inverse| inverse.transpose())
        .map_err(|e| e.context("transform has no normal matrix"))
}

fn transform_normal(matrix: &SquareMatrix, normal: &mut Vector) -> Result<()> {
    matrix.apply(normal)?;
    normal.normalize()
}

/// Splits one face into triangles appended to `out`.
fn face_triangles(
    model: &impl MeshSource,
    index: usize,
    offset: usize,
    normal_offset: usize,
    out: &mut Vec<Triangle>,
) -> Result<()> {
    let face = model.face(index)?;
    let corners = face.vertex_indexes.len();
    if !(3..=4).contains(&corners) {
        error!(target: LOG_NAME, "Cannot decompose a face with {corners} vertices");
        return Err(Error::unhandled(format!(
            "face with {corners} vertices, only triangles and quads are handled"
        )));
    }

    let v = face
        .vertex_indexes
        .iter()
        .map(|&i| zero_based(i, model.vertex_count(), "vertex"))
        .collect::<Result<Vec<_>>>()?;
    let n = if face.vertex_normal_indexes.len() == corners {
        let n = face
            .vertex_normal_indexes
            .iter()
            .map(|&i| zero_based(i, model.normal_count(), "normal").map(|i| i + normal_offset))
            .collect::<Result<Vec<_>>>()?;
        Some(n)
    } else {
        None
    };

    let mut push = |a: usize, b: usize, c: usize| {
        let triangle = Triangle::new(offset, v[a], v[b], v[c]);
        out.push(match &n {
            Some(n) => triangle.with_normals([n[a], n[b], n[c]]),
            None => triangle,
        });
    };
    if corners == 4 {
        push(0, 3, 2);
    }
    push(0, 1, 2);
    Ok(())
}

impl Scene {
    /// Fails when the frame and lighting extents differ.
    pub fn new(frame: FrameStore, lighting: LightingModel) -> Result<Self> {
        if (frame.width(), frame.height()) != (lighting.width(), lighting.height()) {
            return Err(Error::length_mismatch(format!(
                "frame is {}x{} but lighting covers {}x{}",
                frame.width(),
                frame.height(),
                lighting.width(),
                lighting.height()
            )));
        }
        Ok(Self {
            vertices: Vec::new(),
            transformed_vertices: Vec::new(),
            normals: Vec::new(),
            transformed_normals: Vec::new(),
            triangles: Vec::new(),
            frame,
            lighting,
        })
    }

    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        let frame = match config.device.create() {
            Some(device) => FrameStore::with_device(config.width, config.height, device)?,
            None => FrameStore::new(config.width, config.height)?,
        };
        let lighting = LightingModel::with_coefficients(
            config.point_lights(),
            config.width,
            config.height,
            config.specular_min_cos,
            config.diffuse_factor,
            config.ambient_factor,
        )?;
        Self::new(frame, lighting)
    }

    /// Appends a model's vertices, normals and triangles.
    ///
    /// Quads are split along their 1-3 diagonal. Nothing is appended when any
    /// face is rejected.
    pub fn add_model(&mut self, model: &impl MeshSource) -> Result<ObjectRange> {
        let offset = self.vertices.len();
        let normal_offset = self.normals.len();

        let vertices = (0..model.vertex_count())
            .map(|i| model.vertex(i).map(|[x, y, z]| Vector::from([x, y, z, 1.0])))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.context("failed to read model vertices"))?;
        let normals = (0..model.normal_count())
            .map(|i| model.normal(i).map(Vector::from))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.context("failed to read model normals"))?;

        let mut triangles = Vec::with_capacity(model.face_count());
        for i in 0..model.face_count() {
            face_triangles(model, i, offset, normal_offset, &mut triangles)
                .map_err(|e| e.context(format!("face {i} of model at offset {offset}")))?;
        }

        debug!(
            target: LOG_NAME,
            "Added model at offset {}: {} vertices, {} normals, {} triangles",
            offset,
            vertices.len(),
            normals.len(),
            triangles.len()
        );

        let range = ObjectRange {
            offset,
            len: vertices.len(),
        };
        self.transformed_vertices.extend(vertices.iter().cloned());
        self.vertices.extend(vertices);
        self.transformed_normals.extend(normals.iter().cloned());
        self.normals.extend(normals);
        self.triangles.extend(triangles);
        Ok(range)
    }

    /// Like [`Scene::add_model`], then moves the new vertices by `matrix`.
    ///
    /// Nothing is appended when the model or the transform is rejected.
    pub fn add_model_with_transform(
        &mut self,
        model: &impl MeshSource,
        matrix: &SquareMatrix,
    ) -> Result<ObjectRange> {
        let nm = if model.normal_count() > 0 {
            Some(normal_matrix(matrix)?)
        } else {
            None
        };
        let mark = (self.vertices.len(), self.normals.len(), self.triangles.len());
        let range = self.add_model(model)?;

        let moved = self.transform_range(range, matrix).and_then(|()| match &nm {
            Some(nm) => (mark.1..self.normals.len()).try_for_each(|i| {
                transform_normal(nm, &mut self.normals[i])?;
                self.transformed_normals[i] = self.normals[i].clone();
                Ok(())
            }),
            None => Ok(()),
        });
        if let Err(e) = moved {
            error!(target: LOG_NAME, "Dropping model at offset {}: {}", range.offset, e);
            self.truncate(mark);
            return Err(e.context(format!("failed to place model at offset {}", range.offset)));
        }
        Ok(range)
    }

    fn truncate(&mut self, (vertices, normals, triangles): (usize, usize, usize)) {
        self.vertices.truncate(vertices);
        self.transformed_vertices.truncate(vertices);
        self.normals.truncate(normals);
        self.transformed_normals.truncate(normals);
        self.triangles.truncate(triangles);
    }

    /// Applies `matrix` to a vertex range in both pools.
    pub fn transform_range(&mut self, range: ObjectRange, matrix: &SquareMatrix) -> Result<()> {
        if range.end() > self.vertices.len() {
            return Err(Error::index_out_of_bound(format!(
                "object range {}..{} outside pool of {}",
                range.offset,
                range.end(),
                self.vertices.len()
            )));
        }
        for i in range.offset..range.end() {
            transform_point(matrix, &mut self.vertices[i])?;
            self.transformed_vertices[i] = self.vertices[i].clone();
        }
        Ok(())
    }

    /// Rebuilds the working pools as `matrix` applied to the originals and
    /// moves the lights along.
    pub fn model_view_transform(&mut self, matrix: &SquareMatrix) -> Result<()> {
        for (source, target) in self.vertices.iter().zip(&mut self.transformed_vertices) {
            let mut vertex = source.clone();
            transform_point(matrix, &mut vertex)?;
            *target = vertex;
        }
        if !self.normals.is_empty() {
            let nm = normal_matrix(matrix)?;
            for (source, target) in self.normals.iter().zip(&mut self.transformed_normals) {
                let mut normal = source.clone();
                transform_normal(&nm, &mut normal)?;
                *target = normal;
            }
        }
        self.lighting.model_view_transform(matrix)
    }

    /// Renders one frame from the working pools.
    pub fn build(&mut self) -> Result<()> {
        info!(target: LOG_NAME, "Start to build the scene: {} triangles", self.triangles.len());
        self.frame.clean_all_buffers();
        self.lighting.reset();

        let mut written = 0;
        for (i, triangle) in self.triangles.iter_mut().enumerate() {
            triangle
                .build(&self.transformed_vertices)
                .map_err(|e| e.context(format!("triangle {i} failed to build")))?;
            written += self.frame.write_from(triangle);
        }

        let (width, height) = (self.frame.width(), self.frame.height());
        for triangle in &self.triangles {
            for (x, y) in triangle.covered_pixels(width, height) {
                let z = triangle.z(x as f64, y as f64);
                if !z.is_finite() {
                    continue;
                }
                let is_visible = z == self.frame.depth_buffer()[y * width + x];
                let surface = surface_at(triangle, &self.transformed_normals, x, y, z)?;
                self.lighting.sample_surface(x, y, &surface, is_visible)?;
            }
        }

        let mut shaded = 0;
        for y in 0..height {
            for x in 0..width {
                if self.frame.depth_buffer()[y * width + x].is_finite() {
                    let color = self.lighting.shade_pixel(x, y)?;
                    self.frame.set_color(x, y, color)?;
                    shaded += 1;
                }
            }
        }
        info!(
            target: LOG_NAME,
            "Scene built: {} depth writes, {} pixels shaded", written, shaded
        );
        Ok(())
    }

    /// Stored depth at (x, y), with both coordinates wrapped into the frame.
    pub fn depth(&self, x: i64, y: i64) -> f64 {
        let x = x.rem_euclid(self.frame.width() as i64);
        let y = y.rem_euclid(self.frame.height() as i64);
        self.frame.get_or_default(x, y).z
    }

    pub fn pixel(&self, x: i64, y: i64) -> std::result::Result<Pixel, Degraded<Pixel>> {
        self.frame.get(x, y)
    }

    pub fn vertices(&self) -> &[Vector] {
        &self.vertices
    }

    pub fn transformed_vertices(&self) -> &[Vector] {
        &self.transformed_vertices
    }

    pub fn normals(&self) -> &[Vector] {
        &self.normals
    }

    pub fn transformed_normals(&self) -> &[Vector] {
        &self.transformed_normals
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn frame(&self) -> &FrameStore {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut FrameStore {
        &mut self.frame
    }

    pub fn lighting(&self) -> &LightingModel {
        &self.lighting
    }
}

/// Surface point of `triangle` under pixel (x, y).
///
/// Vertex normals are blended with areal weights when the triangle has them,
/// otherwise the plane normal is used.
fn surface_at(
    triangle: &Triangle,
    normals: &[Vector],
    x: usize,
    y: usize,
    z: f64,
) -> Result<SurfacePoint> {
    let (x, y) = (x as f64, y as f64);
    let normal = match triangle.normal_indices() {
        Some(indices) => {
            let weights = triangle.areal_coordinates(x, y)?;
            let mut blended = Vector::zeros(3)?;
            for (k, index) in indices.into_iter().enumerate() {
                let mut n = normals
                    .get(index)
                    .cloned()
                    .ok_or_else(|| {
                        Error::index_out_of_bound(format!(
                            "normal index {index} out of bound {}",
                            normals.len()
                        ))
                    })?;
                n.scale(weights.get(k)?)?;
                blended.add_assign(&n)?;
            }
            match blended.normalize() {
                Ok(()) => blended,
                Err(_) => triangle.face_normal()?,
            }
        }
        None => triangle.face_normal()?,
    };
    Ok(SurfacePoint {
        position: Vector::from([x, y, z]),
        normal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::{self, BLACK, WHITE};
    use crate::error::ErrorKind;
    use crate::light::{PointLight, DEFAULT_AMBIENT_FACTOR};
    use crate::mesh::{Face, MeshModel};
    use approx::assert_relative_eq;

    fn scene(width: usize, height: usize, lights: Vec<PointLight>) -> Scene {
        Scene::new(
            FrameStore::new(width, height).unwrap(),
            LightingModel::new(lights, width, height).unwrap(),
        )
        .unwrap()
    }

    fn screen_triangle(z: f64) -> MeshModel {
        let mut model = MeshModel::new();
        model.push_vertex([0.0, 0.0, z]);
        model.push_vertex([7.0, 0.0, z]);
        model.push_vertex([0.0, 7.0, z]);
        model.push_face(Face::new([1, 2, 3]));
        model
    }

    #[test]
    fn triangle_face_fills_both_pools() {
        let mut scene = scene(8, 8, vec![]);
        let first = scene.add_model(&screen_triangle(-2.0)).unwrap();
        assert_eq!(first, ObjectRange { offset: 0, len: 3 });

        let second = scene.add_model(&screen_triangle(-3.0)).unwrap();
        assert_eq!(second, ObjectRange { offset: 3, len: 3 });
        assert_eq!(scene.vertices().len(), 6);
        assert_eq!(scene.transformed_vertices().len(), 6);
        assert_eq!(scene.triangles().len(), 2);
        assert_eq!(scene.triangles()[1].vertex_indices(), [3, 4, 5]);
        assert_eq!(scene.vertices()[3], Vector::from([0.0, 0.0, -3.0, 1.0]));
    }

    #[test]
    fn quad_splits_into_two_triangles() {
        let mut model = MeshModel::new();
        for p in [[0.0, 0.0, -1.0], [4.0, 0.0, -1.0], [4.0, 4.0, -1.0], [0.0, 4.0, -1.0]] {
            model.push_vertex(p);
        }
        model.push_face(Face::new([1, 2, 3, 4]));

        let mut scene = scene(8, 8, vec![]);
        scene.add_model(&model).unwrap();
        let indices: Vec<_> = scene.triangles().iter().map(Triangle::indices).collect();
        assert_eq!(indices, vec![[0, 3, 2], [0, 1, 2]]);
    }

    #[test]
    fn large_faces_are_rejected() {
        let mut model = MeshModel::new();
        for i in 0..5 {
            model.push_vertex([i as f64, (i * i) as f64, -1.0]);
        }
        model.push_face(Face::new([1, 2, 3, 4, 5]));

        let mut scene = scene(8, 8, vec![]);
        let err = scene.add_model(&model).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unhandled);
        assert!(scene.vertices().is_empty());
        assert!(scene.triangles().is_empty());
    }

    #[test]
    fn bad_face_indices_are_rejected() {
        let mut model = screen_triangle(-1.0);
        model.push_face(Face::new([1, 2, 9]));
        let mut scene = scene(8, 8, vec![]);
        let err = scene.add_model(&model).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfBound);
        assert_eq!(err.chain().count(), 2);
    }

    #[test]
    fn vertex_normals_are_rebased() {
        let mut model = screen_triangle(-1.0);
        model.push_normal([0.0, 0.0, 1.0]);
        model.push_face(Face::new([1, 2, 3]).with_normals([1, 1, 1]));

        let mut scene = scene(8, 8, vec![]);
        scene.add_model(&model).unwrap();
        scene.add_model(&model).unwrap();
        assert_eq!(scene.normals().len(), 2);
        assert_eq!(scene.triangles()[0].normal_indices(), None);
        assert_eq!(scene.triangles()[3].normal_indices(), Some([1, 1, 1]));
    }

    #[test]
    fn build_shades_covered_pixels() {
        let mut scene = scene(8, 8, vec![PointLight::new([2.0, 2.0, 10.0], 1.0, WHITE)]);
        scene.add_model(&screen_triangle(-2.0)).unwrap();
        scene.build().unwrap();

        assert_relative_eq!(scene.depth(1, 1), -2.0, epsilon = 1e-9);
        let ambient = colors::scale(WHITE, DEFAULT_AMBIENT_FACTOR);
        let lit = scene.pixel(1, 1).unwrap().color;
        assert!(colors::split(lit).0 > colors::split(ambient).0);

        let background = scene.pixel(7, 7).unwrap();
        assert_eq!(background.color, BLACK);
        assert_eq!(background.z, f64::NEG_INFINITY);
    }

    #[test]
    fn hidden_layer_stays_dark_under_nearer_one() {
        // The light sits between a large far triangle and a small near one.
        let light = PointLight::new([1.0, 1.0, 0.0], 1.0, WHITE);
        let ambient = colors::scale(WHITE, DEFAULT_AMBIENT_FACTOR);

        let mut near = MeshModel::new();
        near.push_vertex([0.0, 0.0, 5.0]);
        near.push_vertex([3.0, 0.0, 5.0]);
        near.push_vertex([0.0, 3.0, 5.0]);
        near.push_face(Face::new([1, 2, 3]));

        let mut scene = scene(8, 8, vec![light]);
        scene.add_model(&screen_triangle(-2.0)).unwrap();
        scene.add_model(&near).unwrap();
        scene.build().unwrap();

        // The near triangle wins the depth test but faces away from the light.
        assert_relative_eq!(scene.depth(1, 1), 5.0, epsilon = 1e-9);
        assert!(!scene.lighting().sample(1, 1, 0).unwrap().is_exposed);
        assert_eq!(scene.pixel(1, 1).unwrap().color, ambient);

        // Only the far triangle covers (5, 1), and the light reaches it.
        assert_relative_eq!(scene.depth(5, 1), -2.0, epsilon = 1e-9);
        assert!(scene.lighting().sample(5, 1, 0).unwrap().is_exposed);
        assert_ne!(scene.pixel(5, 1).unwrap().color, ambient);
    }

    #[test]
    fn quad_diagonal_is_lit_like_its_interior() {
        let ambient = colors::scale(WHITE, DEFAULT_AMBIENT_FACTOR);
        let mut quad = MeshModel::new();
        for position in [[0.0, 0.0, -2.0], [6.0, 0.0, -2.0], [6.0, 6.0, -2.0], [0.0, 6.0, -2.0]] {
            quad.push_vertex(position);
        }
        quad.push_face(Face::new([1, 2, 3, 4]));

        let mut scene = scene(8, 8, vec![PointLight::new([3.0, 3.0, 10.0], 1.0, WHITE)]);
        scene.add_model(&quad).unwrap();
        scene.build().unwrap();

        // (2, 2) lies on the diagonal shared by both halves.
        for (x, y) in [(2, 2), (4, 1)] {
            assert!(scene.lighting().sample(x, y, 0).unwrap().is_exposed);
            assert_ne!(scene.pixel(x as i64, y as i64).unwrap().color, ambient);
        }
    }

    #[test]
    fn rejected_transform_leaves_pools_untouched() {
        let mut scene = scene(8, 8, vec![]);
        scene.add_model(&screen_triangle(-2.0)).unwrap();

        let mut model = screen_triangle(-3.0);
        model.push_normal([0.0, 0.0, 1.0]);
        let err = scene
            .add_model_with_transform(&model, &SquareMatrix::scaling(1.0, 1.0, 0.0))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(scene.vertices().len(), 3);
        assert_eq!(scene.transformed_vertices().len(), 3);
        assert!(scene.normals().is_empty());
        assert!(scene.transformed_normals().is_empty());
        assert_eq!(scene.triangles().len(), 1);
    }

    #[test]
    fn depth_wraps_around_the_frame() {
        let mut scene = scene(8, 6, vec![]);
        scene.add_model(&screen_triangle(-2.0)).unwrap();
        scene.build().unwrap();

        for (x, y) in [(0, 0), (1, 2), (3, 3), (7, 5)] {
            assert_eq!(scene.depth(x, y).to_bits(), scene.depth(x + 8, y + 6).to_bits());
        }
        assert_eq!(scene.depth(-1, -1).to_bits(), scene.depth(7, 5).to_bits());
    }

    #[test]
    fn model_view_transform_keeps_originals() {
        let mut scene = scene(8, 8, vec![PointLight::new([0.0, 0.0, 1.0], 1.0, WHITE)]);
        scene.add_model(&screen_triangle(-2.0)).unwrap();
        scene
            .model_view_transform(&SquareMatrix::translation(1.0, 0.0, -1.0))
            .unwrap();

        assert_eq!(scene.vertices()[1], Vector::from([7.0, 0.0, -2.0, 1.0]));
        assert_eq!(scene.transformed_vertices()[1], Vector::from([8.0, 0.0, -3.0, 1.0]));
        assert_eq!(
            scene.lighting().lights()[0].transformed_position(),
            &Vector::from([1.0, 0.0, 0.0])
        );
    }

    #[test]
    fn add_with_transform_moves_only_new_range() {
        let mut scene = scene(8, 8, vec![]);
        scene.add_model(&screen_triangle(-1.0)).unwrap();
        let range = scene
            .add_model_with_transform(&screen_triangle(-1.0), &SquareMatrix::translation(0.0, 0.0, -4.0))
            .unwrap();

        assert_eq!(range.offset, 3);
        assert_eq!(scene.vertices()[0], Vector::from([0.0, 0.0, -1.0, 1.0]));
        assert_eq!(scene.vertices()[3], Vector::from([0.0, 0.0, -5.0, 1.0]));
        assert_eq!(scene.transformed_vertices()[3], scene.vertices()[3]);
    }

    #[test]
    fn plane_through_origin_fails_build() {
        let mut model = MeshModel::new();
        model.push_vertex([0.0, 0.0, 0.0]);
        model.push_vertex([4.0, 0.0, 0.0]);
        model.push_vertex([0.0, 4.0, 0.0]);
        model.push_face(Face::new([1, 2, 3]));

        let mut scene = scene(8, 8, vec![]);
        scene.add_model(&model).unwrap();
        let err = scene.build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(err.report().lines().last().unwrap().contains("triangle 0"));
    }

    #[test]
    fn mismatched_extents_are_rejected() {
        let err = Scene::new(FrameStore::new(4, 4).unwrap(), LightingModel::new(vec![], 4, 5).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LengthMismatch);
    }

    #[test]
    fn from_config_mirrors_frame() {
        let config = RenderConfig::from_ron_str("(width: 16, height: 8, device: Host)").unwrap();
        let scene = Scene::from_config(&config).unwrap();
        assert!(scene.frame().is_mirrored());
        assert_eq!(scene.lighting().lights().len(), 1);
    }
}
