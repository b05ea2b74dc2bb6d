//! Render configuration, stored as RON.
//!
//! ```ron
//! (
//!     width: 640,
//!     height: 480,
//!     lights: [(position: (0.0, 0.0, 10.0), power: 4.0, color: 0xFFFFFF)],
//!     device: Host,
//! )
//! ```
//!
//! Every field is optional. Out-of-range values fall back to their defaults
//! with a warning.

use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::colors::{Rgb, WHITE};
use crate::error::{Error, Result};
use crate::light::{
    PointLight, DEFAULT_AMBIENT_FACTOR, DEFAULT_DIFFUSE_FACTOR, DEFAULT_SPECULAR_MIN_COS,
};
use crate::render::DeviceBackend;

const LOG_NAME: &str = "rasterworld::config";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub position: [f64; 3],
    pub power: f64,
    pub color: Rgb,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 10.0],
            power: 1.0,
            color: WHITE,
        }
    }
}

impl From<&LightConfig> for PointLight {
    fn from(config: &LightConfig) -> Self {
        PointLight::new(config.position, config.power, config.color)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: usize,
    pub height: usize,
    pub lights: Vec<LightConfig>,
    /// Minimum reflection cosine for a specular highlight.
    pub specular_min_cos: f64,
    pub diffuse_factor: f64,
    pub ambient_factor: f64,
    pub device: DeviceBackend,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            lights: vec![LightConfig::default()],
            specular_min_cos: DEFAULT_SPECULAR_MIN_COS,
            diffuse_factor: DEFAULT_DIFFUSE_FACTOR,
            ambient_factor: DEFAULT_AMBIENT_FACTOR,
            device: DeviceBackend::default(),
        }
    }
}

impl RenderConfig {
    pub fn from_ron_str(s: &str) -> Result<Self> {
        let config: RenderConfig =
            ron::from_str(s).map_err(|e| Error::load(format!("invalid render config: {e}")))?;
        Ok(config.sanitized())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::load(format!("failed to read {}: {e}", path.display())))?;
        Self::from_ron_str(&contents).map_err(|e| e.context(format!("in {}", path.display())))
    }

    pub fn to_ron_string(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty)
            .map_err(|e| Error::load(format!("failed to serialize render config: {e}")))
    }

    /// Lights ready for a [`LightingModel`](crate::light::LightingModel).
    pub fn point_lights(&self) -> Vec<PointLight> {
        self.lights.iter().map(PointLight::from).collect()
    }

    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.width == 0 || self.height == 0 {
            warn!(
                target: LOG_NAME,
                "Frame size {}x{} is empty, using {}x{}",
                self.width,
                self.height,
                defaults.width,
                defaults.height
            );
            self.width = defaults.width;
            self.height = defaults.height;
        }
        if !(0.0..1.0).contains(&self.specular_min_cos) {
            warn!(
                target: LOG_NAME,
                "specular_min_cos {} outside [0, 1), using {}",
                self.specular_min_cos,
                defaults.specular_min_cos
            );
            self.specular_min_cos = defaults.specular_min_cos;
        }
        if self.diffuse_factor.is_nan() || self.diffuse_factor < 0.0 {
            warn!(target: LOG_NAME, "Negative diffuse_factor, using {}", defaults.diffuse_factor);
            self.diffuse_factor = defaults.diffuse_factor;
        }
        if self.ambient_factor.is_nan() || self.ambient_factor < 0.0 {
            warn!(target: LOG_NAME, "Negative ambient_factor, using {}", defaults.ambient_factor);
            self.ambient_factor = defaults.ambient_factor;
        }
        if self.lights.is_empty() {
            warn!(target: LOG_NAME, "No lights configured, frame will be black");
        }
        self
    }
}
