//! A CPU software rasterizer.
//!
//! Models are loaded into a [`Scene`], whose shared vertex pool is turned into
//! screen-space triangles. Each triangle is rasterized through its plane
//! equation into a z-buffer ([`FrameStore`]), then every covered pixel is shaded
//! by a multi-point-light [`LightingModel`]. The frame can be mirrored to a
//! separate device memory space through [`render::DeviceMemory`].
//!
//! # Quick Start
//!
//! ```ignore
//! use rasterworld::prelude::*;
//!
//! let mut scene = Scene::from_config(&RenderConfig::default())?;
//! scene.add_model(&MeshModel::cube())?;
//! scene.model_view_transform(&SquareMatrix::viewport(800, 600, 400.0))?;
//! scene.build()?;
//! scene.frame().save_png("cube.png")?;
//! ```

pub mod colors;
pub mod config;
pub mod error;
pub mod light;
pub mod math;
pub mod mesh;
pub mod render;
pub mod scene;
pub mod transform;
pub mod triangle;

pub use config::{LightConfig, RenderConfig};
pub use error::{Degraded, Error, ErrorKind, Result};
pub use light::{LightingModel, PointLight};
pub use mesh::{Face, MeshModel, MeshSource};
pub use render::{FrameStore, Pixel};
pub use scene::{ObjectRange, Scene};
pub use transform::Transform;
pub use triangle::Triangle;

/// Prelude module for convenient imports.
///
/// # Example
/// ```ignore
/// use rasterworld::prelude::*;
/// ```
pub mod prelude {
    // Errors
    pub use crate::error::{Degraded, Error, ErrorKind, Result};

    // Math
    pub use crate::math::{SquareMatrix, Vector};
    pub use crate::transform::Transform;

    // Input
    pub use crate::config::{LightConfig, RenderConfig};
    pub use crate::mesh::{Face, MeshModel, MeshSource};

    // Rendering
    pub use crate::light::{LightingModel, PointLight};
    pub use crate::render::{DeviceBackend, FrameStore, Pixel};
    pub use crate::scene::{ObjectRange, Scene};
}

/// Module exposing internals for benchmarking. Not part of the stable API.
pub mod bench {
    pub use crate::render::FrameStore;
    pub use crate::triangle::Triangle;
}
