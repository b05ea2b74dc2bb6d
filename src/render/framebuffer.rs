//! Frame storage: a depth buffer and a color buffer of identical extent.
//!
//! Cells are laid out row-major (`y * width + x`). The depth test keeps the
//! *greater* value: a larger z is nearer to the viewer, so cleared cells hold
//! negative infinity.

use std::path::Path;

use image::RgbImage;
use log::{debug, error};

use super::device::{DeviceHandle, DeviceMemory};
use crate::colors::{self, Rgb, BLACK};
use crate::error::{Degraded, Error, Result};
use crate::triangle::Triangle;

const LOG_NAME: &str = "rasterworld::frame";

/// One cell of the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pixel {
    pub z: f64,
    pub color: Rgb,
}

impl Default for Pixel {
    fn default() -> Self {
        Self {
            z: f64::NEG_INFINITY,
            color: BLACK,
        }
    }
}

/// Device-side copy of both buffers. Freed when dropped.
#[derive(Debug)]
struct DeviceMirror {
    device: Box<dyn DeviceMemory>,
    depth: DeviceHandle,
    color: DeviceHandle,
}

impl Drop for DeviceMirror {
    fn drop(&mut self) {
        for handle in [self.depth, self.color] {
            if let Err(e) = self.device.free(handle) {
                error!(target: LOG_NAME, "Failed to release device buffer: {}", e.report());
            }
        }
    }
}

/// Owning depth and color storage, optionally mirrored to device memory.
#[derive(Debug)]
pub struct FrameStore {
    width: usize,
    height: usize,
    depth: Vec<f64>,
    color: Vec<Rgb>,
    mirror: Option<DeviceMirror>,
}

impl FrameStore {
    /// Allocates a cleared host-only frame.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_operation(format!(
                "frame extent {width}x{height} is empty"
            )));
        }
        let len = width.checked_mul(height).ok_or_else(|| {
            Error::invalid_operation(format!("frame extent {width}x{height} overflows"))
        })?;
        Ok(Self {
            width,
            height,
            depth: vec![f64::NEG_INFINITY; len],
            color: vec![BLACK; len],
            mirror: None,
        })
    }

    /// Allocates a cleared frame mirrored to `device`.
    ///
    /// Both device buffers are seeded with one copy-to-device.
    pub fn with_device(width: usize, height: usize, mut device: Box<dyn DeviceMemory>) -> Result<Self> {
        let mut frame = Self::new(width, height)?;
        let depth_bytes = std::mem::size_of_val(frame.depth.as_slice());
        let color_bytes = std::mem::size_of_val(frame.color.as_slice());

        let depth = device
            .allocate(depth_bytes)
            .map_err(|e| e.context("failed to allocate device depth buffer"))?;
        let color = match device.allocate(color_bytes) {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(free_err) = device.free(depth) {
                    error!(target: LOG_NAME, "Failed to release device buffer: {}", free_err.report());
                }
                return Err(e.context("failed to allocate device color buffer"));
            }
        };

        frame.mirror = Some(DeviceMirror {
            device,
            depth,
            color,
        });
        frame.upload()?;
        Ok(frame)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirror.is_some()
    }

    pub fn depth_buffer(&self) -> &[f64] {
        &self.depth
    }

    pub fn color_buffer(&self) -> &[Rgb] {
        &self.color
    }

    /// Resets every depth cell to negative infinity.
    pub fn clean_z_buffer(&mut self) {
        self.depth.fill(f64::NEG_INFINITY);
    }

    /// Resets depth to negative infinity and color to black.
    pub fn clean_all_buffers(&mut self) {
        self.clean_z_buffer();
        self.color.fill(BLACK);
    }

    /// Depth-tests every covered pixel of a built triangle.
    ///
    /// Returns how many cells were overwritten.
    pub fn write_from(&mut self, triangle: &Triangle) -> usize {
        let mut written = 0;
        for (x, y) in triangle.covered_pixels(self.width, self.height) {
            let z = triangle.z(x as f64, y as f64);
            if !z.is_finite() {
                continue;
            }
            let cell = &mut self.depth[y * self.width + x];
            if z > *cell {
                *cell = z;
                written += 1;
            }
        }
        written
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        let in_x = x >= 0 && (x as u64) < self.width as u64;
        let in_y = y >= 0 && (y as u64) < self.height as u64;
        (in_x && in_y).then(|| y as usize * self.width + x as usize)
    }

    fn cell(&self, index: usize) -> Pixel {
        Pixel {
            z: self.depth[index],
            color: self.color[index],
        }
    }

    /// Reads one cell.
    ///
    /// Outside the extent the (0, 0) cell is returned inside [`Degraded`]
    /// along with an `IndexOutOfBound` error.
    pub fn get(&self, x: i64, y: i64) -> std::result::Result<Pixel, Degraded<Pixel>> {
        match self.index(x, y) {
            Some(i) => Ok(self.cell(i)),
            None => {
                let err = Error::index_out_of_bound(format!(
                    "pixel ({x}, {y}) outside {}x{} frame",
                    self.width, self.height
                ));
                error!(target: LOG_NAME, "{}", err);
                Err(Degraded {
                    value: self.cell(0),
                    error: err,
                })
            }
        }
    }

    /// Like [`FrameStore::get`], keeping only the value.
    pub fn get_or_default(&self, x: i64, y: i64) -> Pixel {
        self.get(x, y).unwrap_or_else(Degraded::into_value)
    }

    pub fn set_color(&mut self, x: usize, y: usize, color: Rgb) -> Result<()> {
        let index = self
            .index(x as i64, y as i64)
            .ok_or_else(|| {
                Error::index_out_of_bound(format!(
                    "pixel ({x}, {y}) outside {}x{} frame",
                    self.width, self.height
                ))
            })?;
        self.color[index] = color;
        Ok(())
    }

    /// Copies both host buffers to the device mirror. No-op without one.
    pub fn upload(&mut self) -> Result<()> {
        let Some(mirror) = self.mirror.as_mut() else {
            return Ok(());
        };
        mirror
            .device
            .copy_to_device(bytemuck::cast_slice(self.depth.as_slice()), mirror.depth)
            .map_err(|e| e.context("depth upload failed"))?;
        mirror
            .device
            .copy_to_device(bytemuck::cast_slice(self.color.as_slice()), mirror.color)
            .map_err(|e| e.context("color upload failed"))?;
        debug!(target: LOG_NAME, "Uploaded {}x{} frame to device", self.width, self.height);
        Ok(())
    }

    /// Overwrites both host buffers from the device mirror. No-op without one.
    pub fn download(&mut self) -> Result<()> {
        let Some(mirror) = self.mirror.as_mut() else {
            return Ok(());
        };
        mirror
            .device
            .copy_from_device(mirror.depth, bytemuck::cast_slice_mut(self.depth.as_mut_slice()))
            .map_err(|e| e.context("depth download failed"))?;
        mirror
            .device
            .copy_from_device(mirror.color, bytemuck::cast_slice_mut(self.color.as_mut_slice()))
            .map_err(|e| e.context("color download failed"))?;
        debug!(target: LOG_NAME, "Downloaded {}x{} frame from device", self.width, self.height);
        Ok(())
    }

    /// The color buffer as an 8-bit RGB image.
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            image::Rgb(colors::to_bytes(self.color[y as usize * self.width + x as usize]))
        })
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.to_image()
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| Error::load(format!("failed to write {}: {e}", path.display())))
    }
}
