//! Point lights and the per-pixel lighting accumulator.
//!
//! Shading happens in two passes over a frame. First every covered
//! (triangle, pixel) pair is fed to [`LightingModel::sample_surface`], which
//! records per light whether the pixel's visible surface is the point nearest
//! to that light and facing it. Then [`LightingModel::shade_pixel`]
//! composites ambient, diffuse and specular terms from the cached samples.

use log::{debug, error};

use crate::colors::{self, Rgb, BLACK};
use crate::error::{Error, Result};
use crate::math::{SquareMatrix, Vector};

const LOG_NAME: &str = "rasterworld::lighting";

pub const DEFAULT_SPECULAR_MIN_COS: f64 = 0.999;
pub const DEFAULT_DIFFUSE_FACTOR: f64 = 1.0 / (2.0 * std::f64::consts::PI);
pub const DEFAULT_AMBIENT_FACTOR: f64 = 0.1;

/// Direction from the surface toward the viewer.
const VIEW: [f64; 3] = [0.0, 0.0, 1.0];

/// Relative tolerance under which two light distances count as equal.
const DISTANCE_EPSILON: f64 = 1e-9;

/// A point light emitting `color` with the given `power`.
#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    position: Vector,
    transformed: Vector,
    pub power: f64,
    pub color: Rgb,
}

impl PointLight {
    pub fn new(position: [f64; 3], power: f64, color: Rgb) -> Self {
        let position = Vector::from(position);
        Self {
            transformed: position.clone(),
            position,
            power,
            color,
        }
    }

    /// Position as constructed.
    pub fn position(&self) -> &Vector {
        &self.position
    }

    /// Position after the last model-view transform.
    pub fn transformed_position(&self) -> &Vector {
        &self.transformed
    }
}

/// What one light sees at one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightSample {
    pub is_exposed: bool,
    pub is_specular: bool,
    pub specular_factor: f64,
    /// max(0, cos) between the visible surface normal and the light direction.
    pub diffuse_cos: f64,
    /// Shortest light-to-surface distance seen so far along this pixel.
    pub distance: f64,
}

impl Default for LightSample {
    fn default() -> Self {
        Self {
            is_exposed: false,
            is_specular: false,
            specular_factor: 0.0,
            diffuse_cos: 0.0,
            distance: f64::INFINITY,
        }
    }
}

/// A surface point under a pixel, in the same space as the transformed lights.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfacePoint {
    pub position: Vector,
    /// Unit normal oriented toward the viewer.
    pub normal: Vector,
}

#[derive(Debug)]
pub struct LightingModel {
    lights: Vec<PointLight>,
    width: usize,
    height: usize,
    samples: Vec<LightSample>,
    specular_min_cos: f64,
    diffuse_factor: f64,
    ambient_factor: f64,
}

impl LightingModel {
    /// Creates a model with the default coefficients.
    pub fn new(lights: Vec<PointLight>, width: usize, height: usize) -> Result<Self> {
        Self::with_coefficients(
            lights,
            width,
            height,
            DEFAULT_SPECULAR_MIN_COS,
            DEFAULT_DIFFUSE_FACTOR,
            DEFAULT_AMBIENT_FACTOR,
        )
    }

    pub fn with_coefficients(
        lights: Vec<PointLight>,
        width: usize,
        height: usize,
        specular_min_cos: f64,
        diffuse_factor: f64,
        ambient_factor: f64,
    ) -> Result<Self> {
        let len = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(lights.len()))
            .ok_or_else(|| {
                Error::invalid_operation(format!(
                    "{} lights over {width}x{height} pixels overflow the sample buffer",
                    lights.len()
                ))
            })?;
        let samples = vec![LightSample::default(); len];
        debug!(
            target: LOG_NAME,
            "Lighting model with {} lights over {}x{} pixels",
            lights.len(),
            width,
            height
        );
        Ok(Self {
            lights,
            width,
            height,
            samples,
            specular_min_cos,
            diffuse_factor,
            ambient_factor,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn specular_min_cos(&self) -> f64 {
        self.specular_min_cos
    }

    pub fn diffuse_factor(&self) -> f64 {
        self.diffuse_factor
    }

    pub fn ambient_factor(&self) -> f64 {
        self.ambient_factor
    }

    /// Moves every light's working position by `matrix`; originals are kept.
    pub fn model_view_transform(&mut self, matrix: &SquareMatrix) -> Result<()> {
        for light in &mut self.lights {
            let p = &light.position;
            let mut homogeneous = Vector::from([p.get(0)?, p.get(1)?, p.get(2)?, 1.0]);
            matrix.apply(&mut homogeneous)?;
            homogeneous.homogeneous_divide()?;
            light.transformed = homogeneous.to_vec3()?;
        }
        Ok(())
    }

    fn pixel_range(&self, x: usize, y: usize) -> Result<std::ops::Range<usize>> {
        if x >= self.width || y >= self.height {
            error!(
                target: LOG_NAME,
                "Pixel ({}, {}) outside {}x{} light buffer", x, y, self.width, self.height
            );
            return Err(Error::index_out_of_bound(format!(
                "pixel ({x}, {y}) outside {}x{} light buffer",
                self.width, self.height
            )));
        }
        let start = (y * self.width + x) * self.lights.len();
        Ok(start..start + self.lights.len())
    }

    /// Clears every cached sample.
    pub fn reset(&mut self) {
        self.samples.fill(LightSample::default());
    }

    /// Clears the cached samples of one pixel.
    pub fn init_pixel(&mut self, x: usize, y: usize) -> Result<()> {
        let range = self.pixel_range(x, y)?;
        self.samples[range].fill(LightSample::default());
        Ok(())
    }

    /// Records one surface covering pixel (x, y).
    ///
    /// `is_visible` marks the surface that won the depth test at this pixel.
    pub fn sample_surface(
        &mut self,
        x: usize,
        y: usize,
        surface: &SurfacePoint,
        is_visible: bool,
    ) -> Result<()> {
        let range = self.pixel_range(x, y)?;
        let view = Vector::from(VIEW);
        for (light, sample) in self.lights.iter().zip(&mut self.samples[range]) {
            let mut to_light = light.transformed.clone();
            to_light.sub_assign(&surface.position)?;
            let distance = to_light.norm()?;

            let cos = if distance > 0.0 {
                to_light.scale(1.0 / distance)?;
                surface.normal.dot(&to_light)?
            } else {
                0.0
            };

            // Surfaces meeting on a shared edge sit at the same distance.
            let tolerance = DISTANCE_EPSILON * distance.max(1.0);
            if distance < sample.distance - tolerance {
                sample.distance = distance;
                sample.is_exposed = is_visible && cos > 0.0;
            } else if is_visible {
                sample.distance = sample.distance.min(distance);
                sample.is_exposed = distance <= sample.distance + tolerance && cos > 0.0;
            }

            if is_visible {
                sample.diffuse_cos = cos.max(0.0);
                // R = 2(n·l)n - l
                let mut reflected = surface.normal.clone();
                reflected.scale(2.0 * cos)?;
                reflected.sub_assign(&to_light)?;
                let specular_cos = reflected.dot(&view)?;
                sample.is_specular = cos > 0.0 && specular_cos > self.specular_min_cos;
                sample.specular_factor = if sample.is_specular {
                    (specular_cos - self.specular_min_cos) / (1.0 - self.specular_min_cos)
                } else {
                    0.0
                };
            }
        }
        Ok(())
    }

    /// Cached sample of `light` at pixel (x, y).
    pub fn sample(&self, x: usize, y: usize, light: usize) -> Result<&LightSample> {
        let range = self.pixel_range(x, y)?;
        if light >= self.lights.len() {
            return Err(Error::index_out_of_bound(format!(
                "light {light} out of bound {}",
                self.lights.len()
            )));
        }
        Ok(&self.samples[range.start + light])
    }

    /// Composites the final color of pixel (x, y).
    pub fn shade_pixel(&self, x: usize, y: usize) -> Result<Rgb> {
        let range = self.pixel_range(x, y)?;
        let color = self
            .lights
            .iter()
            .zip(&self.samples[range])
            .fold(BLACK, |acc, (light, sample)| {
                let ambient = colors::scale(light.color, self.ambient_factor);
                let (diffuse, specular) = if sample.is_exposed {
                    let diffuse = colors::scale(
                        light.color,
                        self.diffuse_factor * light.power * sample.diffuse_cos,
                    );
                    let specular = if sample.is_specular {
                        colors::scale(light.color, sample.specular_factor)
                    } else {
                        BLACK
                    };
                    (diffuse, specular)
                } else {
                    (BLACK, BLACK)
                };
                colors::add(acc, colors::add3(ambient, diffuse, specular))
            });
        Ok(color)
    }
}
