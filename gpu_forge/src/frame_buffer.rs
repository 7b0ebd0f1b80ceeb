//! Frame buffer - logical render-target set
//!
//! Backed by a backend frame buffer and tracked by the lifecycle manager:
//! recreated on device reset with undefined contents. Cloning a `FrameBuffer`
//! clones the handle, not the targets.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Vec4;

use crate::error::Result;
use crate::graphics_device::{
    lock_device, BackendFrameBuffer, ClearMask, DeviceStatus, FrameBufferDesc, GraphicsDevice,
    SharedDevice,
};
use crate::lifecycle::{LifecycleManager, ResourceKey, ResourceState, TrackedResource};
use crate::resource::UnorderedAccessView;
use crate::{engine_bail, engine_debug, engine_err};

const SOURCE: &str = "forge::FrameBuffer";

struct FrameBufferState {
    backend: Option<Box<dyn BackendFrameBuffer>>,
    lifecycle: ResourceState,
    uavs: Vec<(u32, UnorderedAccessView)>,
}

pub(crate) struct FrameBufferShared {
    key: ResourceKey,
    desc: FrameBufferDesc,
    state: Mutex<FrameBufferState>,
}

impl FrameBufferShared {
    fn lock_state(&self) -> MutexGuard<'_, FrameBufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TrackedResource for FrameBufferShared {
    fn label(&self) -> String {
        format!("frame buffer '{}'", self.desc.name)
    }

    fn is_lost(&self) -> bool {
        self.lock_state().lifecycle == ResourceState::Lost
    }

    fn mark_lost(&self) {
        let mut state = self.lock_state();
        state.backend = None;
        state.lifecycle = ResourceState::Lost;
    }

    fn recreate(&self, device: &mut dyn GraphicsDevice) -> Result<()> {
        let backend = device.create_frame_buffer(&self.desc)?;
        let mut state = self.lock_state();
        state.backend = Some(backend);
        state.lifecycle = ResourceState::Reset;
        Ok(())
    }
}

/// Logical frame buffer
#[derive(Clone)]
pub struct FrameBuffer {
    shared: Arc<FrameBufferShared>,
}

impl FrameBuffer {
    pub(crate) fn create(
        device: &SharedDevice,
        lifecycle: &LifecycleManager,
        desc: FrameBufferDesc,
    ) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail!(SOURCE, ResourceCreation, "frame buffer '{}' has a zero extent", desc.name);
        }

        let backend = {
            let mut dev = lock_device(device)?;
            let status = dev.status();
            if status != DeviceStatus::Operational {
                engine_bail!(SOURCE, DeviceLost, "cannot create '{}' while the device is {:?}", desc.name, status);
            }
            dev.create_frame_buffer(&desc)?
        };

        engine_debug!(
            SOURCE,
            "Created frame buffer '{}' {}x{} ({} color, depth: {})",
            desc.name,
            desc.width,
            desc.height,
            desc.color_attachments,
            desc.depth_stencil
        );

        let shared = lifecycle.register_with(|key| FrameBufferShared {
            key,
            desc,
            state: Mutex::new(FrameBufferState {
                backend: Some(backend),
                lifecycle: ResourceState::Unbound,
                uavs: Vec::new(),
            }),
        });
        Ok(Self { shared })
    }

    pub fn id(&self) -> ResourceKey {
        self.shared.key
    }

    pub fn desc(&self) -> &FrameBufferDesc {
        &self.shared.desc
    }

    pub fn name(&self) -> &str {
        &self.shared.desc.name
    }

    pub fn width(&self) -> u32 {
        self.shared.desc.width
    }

    pub fn height(&self) -> u32 {
        self.shared.desc.height
    }

    pub fn lifecycle_state(&self) -> ResourceState {
        self.shared.lock_state().lifecycle
    }

    /// Attach a UAV to `slot`, replacing any previous attachment
    pub fn attach_uav(&self, slot: u32, uav: UnorderedAccessView) {
        let mut state = self.shared.lock_state();
        state.uavs.retain(|(existing, _)| *existing != slot);
        state.uavs.push((slot, uav));
        state.uavs.sort_by_key(|(slot, _)| *slot);
    }

    pub fn detach_uav(&self, slot: u32) -> Option<UnorderedAccessView> {
        let mut state = self.shared.lock_state();
        let index = state.uavs.iter().position(|(existing, _)| *existing == slot)?;
        Some(state.uavs.remove(index).1)
    }

    pub fn uav(&self, slot: u32) -> Option<UnorderedAccessView> {
        self.shared
            .lock_state()
            .uavs
            .iter()
            .find(|(existing, _)| *existing == slot)
            .map(|(_, uav)| uav.clone())
    }

    /// Attached UAVs ordered by slot
    pub fn uav_attachments(&self) -> Vec<(u32, UnorderedAccessView)> {
        self.shared.lock_state().uavs.clone()
    }

    fn with_backend<T>(&self, f: impl FnOnce(&dyn BackendFrameBuffer) -> Result<T>) -> Result<T> {
        let state = self.shared.lock_state();
        match state.backend.as_deref() {
            Some(backend) => f(backend),
            None => Err(engine_err!(SOURCE, DeviceLost, "frame buffer '{}' is lost", self.name())),
        }
    }

    pub(crate) fn mark_used(&self) {
        let mut state = self.shared.lock_state();
        if matches!(state.lifecycle, ResourceState::Unbound | ResourceState::Reset) {
            state.lifecycle = ResourceState::Bound;
        }
    }

    pub(crate) fn clear(&self, mask: ClearMask, color: Vec4, depth: f32, stencil: u32) -> Result<()> {
        self.with_backend(|backend| backend.clear(mask, color, depth, stencil))
    }

    pub(crate) fn discard(&self, mask: ClearMask) -> Result<()> {
        self.with_backend(|backend| backend.discard(mask))
    }

    /// Read back a color attachment
    pub fn read_color(&self, attachment: u32) -> Result<Vec<Vec4>> {
        if attachment >= self.desc().color_attachments {
            engine_bail!(SOURCE, InvalidResource, "'{}' has no color attachment {}", self.name(), attachment);
        }
        self.with_backend(|backend| backend.read_color(attachment))
    }

    /// Read back the depth plane
    pub fn read_depth(&self) -> Result<Vec<f32>> {
        if !self.desc().depth_stencil {
            engine_bail!(SOURCE, InvalidResource, "'{}' has no depth plane", self.name());
        }
        self.with_backend(|backend| backend.read_depth())
    }
}

impl PartialEq for FrameBuffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for FrameBuffer {}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("name", &self.shared.desc.name)
            .field("width", &self.shared.desc.width)
            .field("height", &self.shared.desc.height)
            .finish()
    }
}
