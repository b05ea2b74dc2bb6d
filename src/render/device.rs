//! Device memory backends for mirroring frame buffers.
//!
//! The rasterizer never looks inside device memory; it only copies byte ranges
//! in and out through the four operations of [`DeviceMemory`]. Which backend
//! is used is a startup decision ([`DeviceBackend`]).

use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const LOG_NAME: &str = "rasterworld::device";

/// Opaque handle to a device allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceHandle(u64);

impl DeviceHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// The four operations the rasterizer needs from a device runtime.
///
/// Transfers are blocking: when a call returns, the copy is complete.
pub trait DeviceMemory: fmt::Debug {
    fn allocate(&mut self, size: usize) -> Result<DeviceHandle>;
    fn free(&mut self, handle: DeviceHandle) -> Result<()>;
    fn copy_to_device(&mut self, host: &[u8], handle: DeviceHandle) -> Result<()>;
    fn copy_from_device(&mut self, handle: DeviceHandle, host: &mut [u8]) -> Result<()>;
}

/// Backend that hands out handles and ignores every transfer.
#[derive(Debug, Default)]
pub struct NullDevice {
    next: u64,
}

impl DeviceMemory for NullDevice {
    fn allocate(&mut self, _size: usize) -> Result<DeviceHandle> {
        self.next += 1;
        Ok(DeviceHandle(self.next))
    }

    fn free(&mut self, _handle: DeviceHandle) -> Result<()> {
        Ok(())
    }

    fn copy_to_device(&mut self, _host: &[u8], _handle: DeviceHandle) -> Result<()> {
        Ok(())
    }

    fn copy_from_device(&mut self, _handle: DeviceHandle, _host: &mut [u8]) -> Result<()> {
        Ok(())
    }
}

/// Backend keeping a separate memory space on the host.
///
/// Every allocation is an independent byte block, so it behaves like real
/// device memory: the mirror only changes through explicit copies.
#[derive(Debug, Default)]
pub struct HostDevice {
    blocks: HashMap<DeviceHandle, Vec<u8>>,
    next: u64,
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }

    pub fn allocation_count(&self) -> usize {
        self.blocks.len()
    }

    fn block_mut(&mut self, handle: DeviceHandle, size: usize) -> Result<&mut Vec<u8>> {
        let block = self
            .blocks
            .get_mut(&handle)
            .ok_or_else(|| Error::device(format!("unknown device handle {}", handle.0)))?;
        if block.len() != size {
            return Err(Error::length_mismatch(format!(
                "transfer of {size} bytes into a {} byte allocation",
                block.len()
            )));
        }
        Ok(block)
    }
}

impl DeviceMemory for HostDevice {
    fn allocate(&mut self, size: usize) -> Result<DeviceHandle> {
        self.next += 1;
        let handle = DeviceHandle(self.next);
        self.blocks.insert(handle, vec![0; size]);
        debug!(target: LOG_NAME, "Allocated {size} bytes as handle {}", handle.0);
        Ok(handle)
    }

    fn free(&mut self, handle: DeviceHandle) -> Result<()> {
        self.blocks
            .remove(&handle)
            .map(|_| debug!(target: LOG_NAME, "Freed handle {}", handle.0))
            .ok_or_else(|| Error::device(format!("double free of device handle {}", handle.0)))
    }

    fn copy_to_device(&mut self, host: &[u8], handle: DeviceHandle) -> Result<()> {
        self.block_mut(handle, host.len())?.copy_from_slice(host);
        Ok(())
    }

    fn copy_from_device(&mut self, handle: DeviceHandle, host: &mut [u8]) -> Result<()> {
        host.copy_from_slice(self.block_mut(handle, host.len())?);
        Ok(())
    }
}

/// Backend selection made at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceBackend {
    /// No mirror at all.
    #[default]
    Off,
    /// Mirror through [`NullDevice`].
    NoOp,
    /// Mirror through [`HostDevice`].
    Host,
}

impl DeviceBackend {
    /// Instantiates the backend, `None` for [`DeviceBackend::Off`].
    pub fn create(self) -> Option<Box<dyn DeviceMemory>> {
        match self {
            DeviceBackend::Off => None,
            DeviceBackend::NoOp => Some(Box::new(NullDevice::default())),
            DeviceBackend::Host => Some(Box::new(HostDevice::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn host_device_round_trip() {
        let mut device = HostDevice::new();
        let handle = device.allocate(4).unwrap();
        device.copy_to_device(&[1, 2, 3, 4], handle).unwrap();

        let mut back = [0u8; 4];
        device.copy_from_device(handle, &mut back).unwrap();
        assert_eq!(back, [1, 2, 3, 4]);
        assert_eq!(device.allocated_bytes(), 4);

        device.free(handle).unwrap();
        assert_eq!(device.allocation_count(), 0);
        assert_eq!(device.free(handle).unwrap_err().kind(), ErrorKind::Device);
    }

    #[test]
    fn host_device_checks_sizes() {
        let mut device = HostDevice::new();
        let handle = device.allocate(8).unwrap();
        assert_eq!(
            device.copy_to_device(&[0; 4], handle).unwrap_err().kind(),
            ErrorKind::LengthMismatch
        );
    }

    #[test]
    fn handles_are_unique() {
        let mut device = NullDevice::default();
        let a = device.allocate(1).unwrap();
        let b = device.allocate(1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn backend_selection() {
        assert!(DeviceBackend::Off.create().is_none());
        assert!(DeviceBackend::NoOp.create().is_some());
        assert!(DeviceBackend::Host.create().is_some());
    }
}
