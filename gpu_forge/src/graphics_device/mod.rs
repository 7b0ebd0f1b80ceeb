/// Graphics device module - backend traits and descriptors

// Module declarations
pub mod graphics_device;
pub mod buffer;
pub mod frame_buffer;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use buffer::*;
pub use frame_buffer::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
