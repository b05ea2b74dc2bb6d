//! Frame storage and its device mirror.

pub mod device;
pub mod framebuffer;

pub use device::{DeviceBackend, DeviceHandle, DeviceMemory, HostDevice, NullDevice};
pub use framebuffer::{FrameStore, Pixel};
