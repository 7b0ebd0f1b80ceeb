//! Mock graphics device for unit tests (no GPU required)
//!
//! Buffers are plain byte vectors, kernels run group by group on the calling
//! thread. A `MockControl` handle shared with the test scripts device loss
//! and reads counters after the device was moved into a context.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec4;

use crate::config::DeviceConfig;
use crate::context::RenderContext;
use crate::effect::{ComputeKernel, KernelIo};
use crate::error::{Error, Result};
use crate::graphics_device::{
    for_each_group, BackendBuffer, BackendFrameBuffer, BufferAccess, BufferDesc, Capabilities,
    ClearMask, DeviceStats, DeviceStatus, FrameBufferDesc, GraphicsDevice,
};

// ============================================================================
// Mock control
// ============================================================================

/// Test-side handle on a `MockGraphicsDevice`
pub struct MockControl {
    status: Mutex<DeviceStatus>,
    epoch: AtomicU32,
    pub buffers_created: AtomicU32,
    pub frame_buffers_created: AtomicU32,
    pub dispatches: AtomicU32,
    pub draws: AtomicU32,
    pub resets: AtomicU32,
    pub unmaps: AtomicU32,
    failing_buffer_creations: AtomicU32,
}

impl MockControl {
    pub fn set_status(&self, status: DeviceStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn status(&self) -> DeviceStatus {
        *self.status.lock().unwrap()
    }

    /// Loss: old buffers stop working
    pub fn lose_device(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.set_status(DeviceStatus::Lost);
    }

    /// Device available again, waiting for reset
    pub fn restore_device(&self) {
        self.set_status(DeviceStatus::NotReset);
    }

    /// Make the next `count` buffer creations fail
    pub fn fail_buffer_creations(&self, count: u32) {
        self.failing_buffer_creations.store(count, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    data: Mutex<Vec<u8>>,
    epoch: u32,
    control: Arc<MockControl>,
}

impl MockBuffer {
    fn check_alive(&self) -> Result<()> {
        if self.control.epoch.load(Ordering::SeqCst) != self.epoch {
            return Err(Error::DeviceLost("mock buffer from a previous device".to_string()));
        }
        Ok(())
    }
}

impl BackendBuffer for MockBuffer {
    fn capacity(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        self.check_alive()?;
        let data = self.data.lock().unwrap();
        let start = offset as usize;
        out.copy_from_slice(&data[start..start + out.len()]);
        Ok(())
    }

    fn write(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.check_alive()?;
        let mut data = self.data.lock().unwrap();
        let start = offset as usize;
        data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn map(&self, _access: BufferAccess, size: u64) -> Result<Vec<u8>> {
        self.check_alive()?;
        Ok(self.data.lock().unwrap()[..size as usize].to_vec())
    }

    fn unmap(&self, written: Option<&[u8]>) -> Result<()> {
        self.control.unmaps.fetch_add(1, Ordering::SeqCst);
        if let Some(bytes) = written {
            self.write(0, bytes)?;
        }
        Ok(())
    }
}

// ============================================================================
// Mock Frame Buffer
// ============================================================================

pub struct MockFrameBuffer {
    desc: FrameBufferDesc,
    color: Mutex<Vec<Vec4>>,
    depth: Mutex<Vec<f32>>,
}

impl BackendFrameBuffer for MockFrameBuffer {
    fn width(&self) -> u32 {
        self.desc.width
    }

    fn height(&self) -> u32 {
        self.desc.height
    }

    fn clear(&self, mask: ClearMask, color: Vec4, depth: f32, _stencil: u32) -> Result<()> {
        if mask.contains(ClearMask::COLOR) {
            self.color.lock().unwrap().fill(color);
        }
        if mask.contains(ClearMask::DEPTH) {
            self.depth.lock().unwrap().fill(depth);
        }
        Ok(())
    }

    fn discard(&self, _mask: ClearMask) -> Result<()> {
        Ok(())
    }

    fn read_color(&self, _attachment: u32) -> Result<Vec<Vec4>> {
        Ok(self.color.lock().unwrap().clone())
    }

    fn read_depth(&self) -> Result<Vec<f32>> {
        Ok(self.depth.lock().unwrap().clone())
    }
}

// ============================================================================
// Mock Graphics Device
// ============================================================================

pub struct MockGraphicsDevice {
    capabilities: Capabilities,
    control: Arc<MockControl>,
}

impl MockGraphicsDevice {
    pub fn new(capabilities: Capabilities) -> (Self, Arc<MockControl>) {
        let control = Arc::new(MockControl {
            status: Mutex::new(DeviceStatus::Operational),
            epoch: AtomicU32::new(0),
            buffers_created: AtomicU32::new(0),
            frame_buffers_created: AtomicU32::new(0),
            dispatches: AtomicU32::new(0),
            draws: AtomicU32::new(0),
            resets: AtomicU32::new(0),
            unmaps: AtomicU32::new(0),
            failing_buffer_creations: AtomicU32::new(0),
        });
        (
            Self {
                capabilities,
                control: control.clone(),
            },
            control,
        )
    }

    fn check_operational(&self) -> Result<()> {
        match self.control.status() {
            DeviceStatus::Operational => Ok(()),
            status => Err(Error::DeviceLost(format!("mock device is {:?}", status))),
        }
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn description(&self) -> &str {
        "Mock Device"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn status(&self) -> DeviceStatus {
        self.control.status()
    }

    fn reset(&mut self) -> Result<()> {
        if self.control.status() == DeviceStatus::Lost {
            return Err(Error::DeviceLost("mock device still lost".to_string()));
        }
        self.control.resets.fetch_add(1, Ordering::SeqCst);
        self.control.set_status(DeviceStatus::Operational);
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Box<dyn BackendBuffer>> {
        self.check_operational()?;
        let failing = self
            .control
            .failing_buffer_creations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(Error::BackendError("mock buffer allocation failed".to_string()));
        }
        self.control.buffers_created.fetch_add(1, Ordering::SeqCst);
        let mut data = vec![0u8; desc.size as usize];
        if let Some(initial) = initial_data {
            data[..initial.len()].copy_from_slice(initial);
        }
        Ok(Box::new(MockBuffer {
            data: Mutex::new(data),
            epoch: self.control.epoch.load(Ordering::SeqCst),
            control: self.control.clone(),
        }))
    }

    fn create_frame_buffer(&mut self, desc: &FrameBufferDesc) -> Result<Box<dyn BackendFrameBuffer>> {
        self.check_operational()?;
        self.control.frame_buffers_created.fetch_add(1, Ordering::SeqCst);
        let pixels = (desc.width * desc.height) as usize;
        Ok(Box::new(MockFrameBuffer {
            desc: desc.clone(),
            color: Mutex::new(vec![Vec4::ZERO; pixels]),
            depth: Mutex::new(vec![1.0; pixels]),
        }))
    }

    fn dispatch(&mut self, kernel: &dyn ComputeKernel, io: &mut KernelIo<'_>, groups: [u32; 3]) -> Result<()> {
        self.check_operational()?;
        self.control.dispatches.fetch_add(1, Ordering::SeqCst);
        for_each_group(groups, |group| kernel.execute_group(group, io))
    }

    fn draw(&mut self, _vertex_count: u32, _first_vertex: u32) -> Result<()> {
        self.check_operational()?;
        self.control.draws.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            dispatches: MockControl::count(&self.control.dispatches),
            draw_calls: MockControl::count(&self.control.draws),
            resets: MockControl::count(&self.control.resets),
            ..DeviceStats::default()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Context on a mock device with every capability
pub fn mock_context() -> (RenderContext, Arc<MockControl>) {
    mock_context_with(Capabilities::all())
}

/// Context on a mock device with the given capabilities
pub fn mock_context_with(capabilities: Capabilities) -> (RenderContext, Arc<MockControl>) {
    let (device, control) = MockGraphicsDevice::new(capabilities);
    let config = DeviceConfig {
        screen_width: 4,
        screen_height: 4,
        ..DeviceConfig::default()
    };
    let context = RenderContext::new(device, config).unwrap();
    (context, control)
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
