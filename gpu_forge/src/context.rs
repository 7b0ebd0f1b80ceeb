//! Render context - explicit handle to a device and its resource factory
//!
//! A `RenderContext` bundles the shared device, its lifecycle manager, the
//! configuration and the default frame buffer. It is cheap to clone; every
//! clone addresses the same device.
//!
//! # Example
//!
//! ```ignore
//! let context = RenderContext::new(device, DeviceConfig::default())?;
//! let buffer = context.make_vertex_buffer(
//!     BufferUsage::Static,
//!     AccessFlags::GPU_READ | AccessFlags::GPU_WRITE | AccessFlags::GPU_UNORDERED,
//!     4096,
//!     None,
//!     4,
//! )?;
//! let uav = context.make_buffer_uav(&buffer, ElementFormat::R32_UINT)?;
//! let mut scheduler = context.scheduler();
//! ```

use std::sync::{Arc, Mutex};

use crate::config::DeviceConfig;
use crate::error::Result;
use crate::frame_buffer::FrameBuffer;
use crate::graphics_device::{
    lock_device, AccessFlags, BufferBinding, BufferDesc, BufferUsage, Capabilities, DeviceStats,
    ElementFormat, FrameBufferDesc, GraphicsDevice, SharedDevice,
};
use crate::lifecycle::LifecycleManager;
use crate::resource::{
    make_shader_resource_view, make_unordered_access_view,
    make_unordered_access_view_with_counter, Buffer, ShaderResourceView, UnorderedAccessView,
};
use crate::scheduler::FrameScheduler;
use crate::engine_info;

struct ContextInner {
    device: SharedDevice,
    lifecycle: LifecycleManager,
    config: DeviceConfig,
    default_frame_buffer: FrameBuffer,
}

/// Shared handle to a device, its lifecycle manager and default frame buffer
#[derive(Clone)]
pub struct RenderContext {
    inner: Arc<ContextInner>,
}

impl RenderContext {
    /// Wrap a device and create the default frame buffer
    pub fn new<D: GraphicsDevice + 'static>(device: D, config: DeviceConfig) -> Result<Self> {
        let device: SharedDevice = Arc::new(Mutex::new(device));
        Self::from_shared(device, config)
    }

    /// Build a context around an already shared device
    pub fn from_shared(device: SharedDevice, config: DeviceConfig) -> Result<Self> {
        let lifecycle = LifecycleManager::new();
        let default_frame_buffer = FrameBuffer::create(
            &device,
            &lifecycle,
            FrameBufferDesc::new("default", config.screen_width, config.screen_height),
        )?;

        {
            let dev = lock_device(&device)?;
            engine_info!(
                "forge::Context",
                "Context created on '{}' ({:?}, capabilities {:?})",
                dev.description(),
                config.backend,
                dev.capabilities()
            );
        }

        Ok(Self {
            inner: Arc::new(ContextInner {
                device,
                lifecycle,
                config,
                default_frame_buffer,
            }),
        })
    }

    pub fn device(&self) -> &SharedDevice {
        &self.inner.device
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.inner.lifecycle
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    pub fn default_frame_buffer(&self) -> &FrameBuffer {
        &self.inner.default_frame_buffer
    }

    pub fn capabilities(&self) -> Result<Capabilities> {
        Ok(lock_device(&self.inner.device)?.capabilities())
    }

    pub fn stats(&self) -> Result<DeviceStats> {
        Ok(lock_device(&self.inner.device)?.stats())
    }

    /// New scheduler submitting to this context's device
    pub fn scheduler(&self) -> FrameScheduler {
        FrameScheduler::new(self)
    }

    // ===== RESOURCE FACTORY =====

    /// Create a buffer from a full descriptor
    pub fn create_buffer(&self, desc: BufferDesc, initial_data: Option<&[u8]>) -> Result<Buffer> {
        Buffer::create(&self.inner.device, &self.inner.lifecycle, desc, initial_data)
    }

    /// Create a vertex-bound buffer
    pub fn make_vertex_buffer(
        &self,
        usage: BufferUsage,
        access: AccessFlags,
        size: u64,
        initial_data: Option<&[u8]>,
        stride: u32,
    ) -> Result<Buffer> {
        let desc = BufferDesc::new(usage, access, size)
            .with_stride(stride)
            .with_binding(BufferBinding::Vertex);
        self.create_buffer(desc, initial_data)
    }

    /// Create an index-bound buffer
    pub fn make_index_buffer(
        &self,
        usage: BufferUsage,
        access: AccessFlags,
        size: u64,
        initial_data: Option<&[u8]>,
        stride: u32,
    ) -> Result<Buffer> {
        let desc = BufferDesc::new(usage, access, size)
            .with_stride(stride)
            .with_binding(BufferBinding::Index);
        self.create_buffer(desc, initial_data)
    }

    pub fn make_buffer_srv(&self, buffer: &Buffer, format: ElementFormat) -> Result<ShaderResourceView> {
        make_shader_resource_view(buffer, format)
    }

    pub fn make_buffer_uav(&self, buffer: &Buffer, format: ElementFormat) -> Result<UnorderedAccessView> {
        make_unordered_access_view(buffer, format)
    }

    pub fn make_buffer_uav_with_counter(
        &self,
        buffer: &Buffer,
        format: ElementFormat,
        initial_count: u32,
    ) -> Result<UnorderedAccessView> {
        make_unordered_access_view_with_counter(buffer, format, initial_count)
    }

    /// Create an offscreen frame buffer
    pub fn make_frame_buffer(&self, desc: FrameBufferDesc) -> Result<FrameBuffer> {
        FrameBuffer::create(&self.inner.device, &self.inner.lifecycle, desc)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
