/// SoftDevice - CPU-emulated implementation of GraphicsDevice
///
/// The backend profile chosen at creation fixes the capabilities:
/// `Legacy` devices only expose mappable vertex/index buffers, `Compute`
/// devices add unordered access, structured views and compute dispatch.
/// Kernels run group by group on the calling thread, in grid order.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use gpu_forge::forge::device::{
    for_each_group, BackendBuffer, BackendFrameBuffer, BufferDesc, Capabilities, DeviceStats,
    DeviceStatus, FrameBufferDesc, GraphicsDevice,
};
use gpu_forge::forge::effect::{ComputeKernel, KernelIo};
use gpu_forge::forge::{BackendKind, DeviceConfig, Error, Result};
use gpu_forge::{engine_debug, engine_info, engine_warn};

use crate::soft_buffer::SoftBuffer;
use crate::soft_context::SoftContext;
use crate::soft_frame_buffer::SoftFrameBuffer;
use crate::validation::ValidationStats;

const SOURCE: &str = "forge::soft::Device";

/// Capabilities of a backend profile
pub fn profile_capabilities(kind: BackendKind) -> Capabilities {
    match kind {
        BackendKind::Legacy => Capabilities::MAPPABLE,
        BackendKind::Compute => Capabilities::all(),
    }
}

pub struct SoftDevice {
    ctx: Arc<SoftContext>,
    description: String,
    capabilities: Capabilities,
}

impl SoftDevice {
    pub fn new(config: &DeviceConfig) -> Self {
        let capabilities = profile_capabilities(config.backend);
        engine_info!(
            SOURCE,
            "Soft device '{}' created ({:?} profile, validation {})",
            config.description,
            config.backend,
            if config.enable_validation { "on" } else { "off" }
        );
        Self {
            ctx: Arc::new(SoftContext::new(config.enable_validation)),
            description: config.description.clone(),
            capabilities,
        }
    }

    /// Handle used to script device loss after the device moved into a context
    pub fn handle(&self) -> SoftDeviceHandle {
        SoftDeviceHandle {
            ctx: self.ctx.clone(),
        }
    }
}

impl GraphicsDevice for SoftDevice {
    fn description(&self) -> &str {
        &self.description
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn status(&self) -> DeviceStatus {
        self.ctx.status()
    }

    fn reset(&mut self) -> Result<()> {
        match self.ctx.status() {
            DeviceStatus::Lost => Err(Error::DeviceLost("device is still lost".to_string())),
            _ => {
                self.ctx.set_status(DeviceStatus::Operational);
                let resets = self.ctx.resets.fetch_add(1, Ordering::Relaxed) + 1;
                engine_info!(SOURCE, "Device reset (#{})", resets);
                Ok(())
            }
        }
    }

    fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Box<dyn BackendBuffer>> {
        self.ctx.check_operational("create a buffer")?;
        if let Some(data) = initial_data {
            if data.len() as u64 > desc.size {
                return Err(Error::SizeMismatch(format!(
                    "{} bytes of initial data for a {} byte buffer",
                    data.len(),
                    desc.size
                )));
            }
        }
        engine_debug!(SOURCE, "Buffer storage of {} bytes ({:?})", desc.size, desc.access);
        Ok(Box::new(SoftBuffer::new(self.ctx.clone(), desc.size, initial_data)))
    }

    fn create_frame_buffer(&mut self, desc: &FrameBufferDesc) -> Result<Box<dyn BackendFrameBuffer>> {
        self.ctx.check_operational("create a frame buffer")?;
        Ok(Box::new(SoftFrameBuffer::new(self.ctx.clone(), desc)))
    }

    fn dispatch(&mut self, kernel: &dyn ComputeKernel, io: &mut KernelIo<'_>, groups: [u32; 3]) -> Result<()> {
        self.ctx.check_operational("dispatch")?;
        if !self.capabilities.contains(Capabilities::COMPUTE_TARGET) {
            return Err(Error::InvalidOperation(format!(
                "'{}' has no compute support",
                self.description
            )));
        }
        if io.writable_slot_count() == 0 {
            self.ctx.validation.dispatch_without_writes(io.technique());
        }

        for_each_group(groups, |group| kernel.execute_group(group, io))?;

        let count = groups.iter().map(|&n| n as u64).product::<u64>();
        self.ctx.dispatches.fetch_add(1, Ordering::Relaxed);
        self.ctx.groups_executed.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    fn draw(&mut self, _vertex_count: u32, _first_vertex: u32) -> Result<()> {
        self.ctx.check_operational("draw")?;
        self.ctx.draw_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stats(&self) -> DeviceStats {
        self.ctx.stats()
    }
}

/// Test and sample handle on a soft device
#[derive(Clone)]
pub struct SoftDeviceHandle {
    ctx: Arc<SoftContext>,
}

impl SoftDeviceHandle {
    pub fn status(&self) -> DeviceStatus {
        self.ctx.status()
    }

    /// Lose the device: every existing buffer and frame buffer stops working
    pub fn simulate_device_lost(&self) {
        engine_warn!(SOURCE, "Simulating device loss");
        self.ctx.lose();
    }

    /// Make a lost device available again; it waits for a reset
    pub fn simulate_device_available(&self) {
        if self.ctx.status() == DeviceStatus::Lost {
            self.ctx.set_status(DeviceStatus::NotReset);
        }
    }

    pub fn stats(&self) -> DeviceStats {
        self.ctx.stats()
    }

    pub fn validation_enabled(&self) -> bool {
        self.ctx.validation.is_enabled()
    }

    pub fn validation_stats(&self) -> ValidationStats {
        self.ctx.validation.stats()
    }

    pub fn reset_validation_stats(&self) {
        self.ctx.validation.reset();
    }
}

#[cfg(test)]
#[path = "soft_device_tests.rs"]
mod tests;
