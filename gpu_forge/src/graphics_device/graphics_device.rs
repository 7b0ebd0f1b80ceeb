/// GraphicsDevice trait - resource factory and pass executor

use std::sync::{Arc, Mutex, MutexGuard};
use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::effect::{ComputeKernel, KernelIo};
use crate::graphics_device::{
    BackendBuffer, BackendFrameBuffer, BufferDesc, FrameBufferDesc,
};

// ============================================================================
// Capabilities and status
// ============================================================================

bitflags! {
    /// Features a backend exposes; creation requests are validated against them
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// CPU-mappable buffers
        const MAPPABLE = 1 << 0;
        /// Unordered access views and compute dispatch
        const COMPUTE_TARGET = 1 << 1;
        /// Structured buffer views
        const STRUCTURED_VIEW = 1 << 2;
    }
}

/// Device status polled at the start of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Rendering allowed
    Operational,
    /// Lost; frames are skipped until the device becomes available again
    Lost,
    /// Available again but every resource must be recreated
    NotReset,
}

/// Device statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Number of live backend buffers
    pub buffers_alive: u32,
    /// Bytes held by live backend buffers
    pub buffer_memory: u64,
    /// Compute dispatches executed
    pub dispatches: u32,
    /// Thread groups executed
    pub groups_executed: u64,
    /// Draw calls executed
    pub draw_calls: u32,
    /// Number of device resets
    pub resets: u32,
}

// ============================================================================
// GraphicsDevice trait
// ============================================================================

/// Main device interface
///
/// Implemented by backend plugins (soft rasterizer, mocks...). Devices are
/// shared as `Arc<Mutex<dyn GraphicsDevice>>`; lock the device before any
/// resource state, never the other way around.
pub trait GraphicsDevice: Send + Sync {
    /// Adapter description
    fn description(&self) -> &str;

    /// Features this device supports
    fn capabilities(&self) -> Capabilities;

    /// Current device status
    fn status(&self) -> DeviceStatus;

    /// Reset a device in the `NotReset` state; every backend handle created
    /// before the reset is invalid afterwards
    fn reset(&mut self) -> Result<()>;

    /// Create buffer storage, optionally filled with `initial_data`
    /// (shorter initial data is zero-padded)
    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Box<dyn BackendBuffer>>;

    /// Create frame buffer storage
    fn create_frame_buffer(&mut self, desc: &FrameBufferDesc) -> Result<Box<dyn BackendFrameBuffer>>;

    /// Run `groups` thread groups of a compute kernel
    fn dispatch(
        &mut self,
        kernel: &dyn ComputeKernel,
        io: &mut KernelIo<'_>,
        groups: [u32; 3],
    ) -> Result<()>;

    /// Issue a draw call with the currently bound streams
    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    /// Get device statistics
    fn stats(&self) -> DeviceStats;
}

/// Device shared between the context, its resources and the scheduler
pub type SharedDevice = Arc<Mutex<dyn GraphicsDevice>>;

/// Lock a shared device
pub fn lock_device(device: &SharedDevice) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
    device
        .lock()
        .map_err(|_| Error::BackendError("Graphics device lock poisoned".to_string()))
}

/// Iterate every group id of a dispatch, x fastest
pub fn for_each_group<F>(groups: [u32; 3], mut f: F) -> Result<()>
where
    F: FnMut([u32; 3]) -> Result<()>,
{
    for z in 0..groups[2] {
        for y in 0..groups[1] {
            for x in 0..groups[0] {
                f([x, y, z])?;
            }
        }
    }
    Ok(())
}
