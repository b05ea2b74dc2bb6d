//! Mesh input: the accessors the scene reads models through.

use std::path::Path;

use log::{debug, error};

use crate::error::{Error, Result};

const LOG_NAME: &str = "rasterworld::mesh";

/// A polygon of a mesh. All indices are 1-based, as in OBJ files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Face {
    pub vertex_indexes: Vec<usize>,
    pub vertex_texture_indexes: Vec<usize>,
    pub vertex_normal_indexes: Vec<usize>,
}

impl Face {
    /// A face with positions only.
    pub fn new(vertex_indexes: impl IntoIterator<Item = usize>) -> Self {
        Self {
            vertex_indexes: vertex_indexes.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_normals(mut self, normal_indexes: impl IntoIterator<Item = usize>) -> Self {
        self.vertex_normal_indexes = normal_indexes.into_iter().collect();
        self
    }

    pub fn with_textures(mut self, texture_indexes: impl IntoIterator<Item = usize>) -> Self {
        self.vertex_texture_indexes = texture_indexes.into_iter().collect();
        self
    }
}

/// Index-based access to a parsed mesh.
///
/// Every accessor fails with `IndexOutOfBound` when `index >= count`.
pub trait MeshSource {
    fn vertex_count(&self) -> usize;
    fn vertex(&self, index: usize) -> Result<[f64; 3]>;

    fn normal_count(&self) -> usize;
    fn normal(&self, index: usize) -> Result<[f64; 3]>;

    fn texture_count(&self) -> usize;
    fn texture(&self, index: usize) -> Result<&[f64]>;

    fn face_count(&self) -> usize;
    fn face(&self, index: usize) -> Result<&Face>;
}

fn out_of_bound(what: &str, index: usize, len: usize) -> Error {
    error!(target: LOG_NAME, "{what} index {index} out of bound {len}");
    Error::index_out_of_bound(format!("{what} index {index} out of bound {len}"))
}

/// In-memory mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshModel {
    vertices: Vec<[f64; 3]>,
    normals: Vec<[f64; 3]>,
    textures: Vec<Vec<f64>>,
    faces: Vec<Face>,
}

impl MeshModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex and returns its 1-based index.
    pub fn push_vertex(&mut self, position: [f64; 3]) -> usize {
        self.vertices.push(position);
        self.vertices.len()
    }

    /// Adds a normal and returns its 1-based index.
    pub fn push_normal(&mut self, normal: [f64; 3]) -> usize {
        self.normals.push(normal);
        self.normals.len()
    }

    /// Adds a texture coordinate row and returns its 1-based index.
    pub fn push_texture(&mut self, uv: impl IntoIterator<Item = f64>) -> usize {
        self.textures.push(uv.into_iter().collect());
        self.textures.len()
    }

    pub fn push_face(&mut self, face: Face) {
        self.faces.push(face);
    }

    /// Axis-aligned cube of half-extent 1 centered at the origin, six quads.
    pub fn cube() -> Self {
        let mut model = Self::new();
        for position in [
            [-1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [1.0, 1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, 1.0],
            [1.0, -1.0, 1.0],
            [-1.0, 1.0, 1.0],
            [-1.0, -1.0, 1.0],
        ] {
            model.push_vertex(position);
        }
        for corners in [
            [1, 2, 3, 4], // front
            [4, 3, 5, 6], // right
            [6, 5, 7, 8], // back
            [8, 7, 2, 1], // left
            [2, 7, 5, 3], // top
            [6, 8, 1, 4], // bottom
        ] {
            model.push_face(Face::new(corners));
        }
        model
    }

    /// Loads every object of an OBJ file into one model.
    ///
    /// Polygons are kept as written; the scene splits quads itself. Indices
    /// of later objects are rebased past the rows of earlier ones.
    pub fn from_obj(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = tobj::LoadOptions {
            triangulate: false,
            single_index: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };
        let (models, _materials) = tobj::load_obj(path, &options)
            .map_err(|e| Error::load(format!("failed to read {}: {e}", path.display())))?;

        let mut model = Self::new();
        for object in &models {
            model.append_tobj(&object.mesh);
            debug!(
                target: LOG_NAME,
                "Loaded object '{}' from {}: {} positions",
                object.name,
                path.display(),
                object.mesh.positions.len() / 3
            );
        }
        debug!(
            target: LOG_NAME,
            "Mesh {} has {} vertices and {} faces",
            path.display(),
            model.vertices.len(),
            model.faces.len()
        );
        Ok(model)
    }

    fn append_tobj(&mut self, mesh: &tobj::Mesh) {
        let vertex_base = self.vertices.len();
        let normal_base = self.normals.len();
        let texture_base = self.textures.len();

        self.vertices.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64]),
        );
        self.normals.extend(
            mesh.normals
                .chunks_exact(3)
                .map(|n| [n[0] as f64, n[1] as f64, n[2] as f64]),
        );
        self.textures.extend(
            mesh.texcoords
                .chunks_exact(2)
                .map(|t| vec![t[0] as f64, t[1] as f64]),
        );

        // An empty arity list means every face is a triangle.
        let arities: Vec<usize> = if mesh.face_arities.is_empty() {
            vec![3; mesh.indices.len() / 3]
        } else {
            mesh.face_arities.iter().map(|&a| a as usize).collect()
        };

        let rebase = |indices: &[u32], start: usize, arity: usize, base: usize| -> Vec<usize> {
            indices
                .get(start..start + arity)
                .map(|slice| slice.iter().map(|&i| i as usize + base + 1).collect())
                .unwrap_or_default()
        };

        let mut start = 0;
        for arity in arities {
            self.faces.push(Face {
                vertex_indexes: rebase(&mesh.indices, start, arity, vertex_base),
                vertex_texture_indexes: rebase(&mesh.texcoord_indices, start, arity, texture_base),
                vertex_normal_indexes: rebase(&mesh.normal_indices, start, arity, normal_base),
            });
            start += arity;
        }
    }
}

impl MeshSource for MeshModel {
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn vertex(&self, index: usize) -> Result<[f64; 3]> {
        self.vertices
            .get(index)
            .copied()
            .ok_or_else(|| out_of_bound("vertex", index, self.vertices.len()))
    }

    fn normal_count(&self) -> usize {
        self.normals.len()
    }

    fn normal(&self, index: usize) -> Result<[f64; 3]> {
        self.normals
            .get(index)
            .copied()
            .ok_or_else(|| out_of_bound("normal", index, self.normals.len()))
    }

    fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn texture(&self, index: usize) -> Result<&[f64]> {
        self.textures
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| out_of_bound("texture", index, self.textures.len()))
    }

    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn face(&self, index: usize) -> Result<&Face> {
        self.faces
            .get(index)
            .ok_or_else(|| out_of_bound("face", index, self.faces.len()))
    }
}
