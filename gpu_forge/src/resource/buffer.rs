//! Buffer - logical GPU buffer
//!
//! A `Buffer` is the exclusive owner of a byte array living in backend
//! storage. The logical buffer survives device resets: on loss its storage is
//! dropped, on reset a new storage is created and, when a CPU mirror is
//! retained, refilled from it.
//!
//! Views reference the buffer weakly and mappers borrow it, so neither can
//! outlive it.
//!
//! Content becomes `Valid` only through a write covering the whole buffer:
//! initial data of full length, a full-range upload, a published write
//! mapping, a copy from a valid source, or a dispatch or draw binding the
//! buffer through a UAV. Partial writes keep the previous state.
//!
//! The mirror follows every CPU upload and every copy into the buffer.
//! Results of compute passes are not captured.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::graphics_device::{
    lock_device, AccessFlags, BackendBuffer, BufferAccess, BufferBinding, BufferDesc,
    BufferUsage, Capabilities, DeviceStatus, GraphicsDevice, SharedDevice,
};
use crate::lifecycle::{LifecycleManager, ResourceKey, ResourceState, TrackedResource};
use crate::resource::Mapper;
use crate::{engine_bail, engine_debug, engine_err};

const SOURCE: &str = "forge::Buffer";

/// Whether the buffer bytes are meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentState {
    /// Written by an upload, a copy or a pass since the last invalidation
    Valid,
    /// Never written, resized, or lost with the device and not restored
    Undefined,
}

// ============================================================================
// Shared state
// ============================================================================

pub(crate) struct BufferState {
    pub(crate) storage: Option<Box<dyn BackendBuffer>>,
    pub(crate) size: u64,
    pub(crate) generation: u32,
    pub(crate) lifecycle: ResourceState,
    pub(crate) content: ContentState,
    pub(crate) mapped: Option<BufferAccess>,
    pub(crate) mirror: Option<Vec<u8>>,
    pub(crate) counter: u32,
}

impl BufferState {
    /// Storage of a usable buffer, DeviceLost otherwise
    pub(crate) fn storage(&self, key: ResourceKey) -> Result<&dyn BackendBuffer> {
        match self.storage.as_deref() {
            Some(storage) => Ok(storage),
            None => Err(engine_err!(SOURCE, DeviceLost, "buffer {:?} has no backend storage", key)),
        }
    }

    fn mark_used(&mut self) {
        if matches!(self.lifecycle, ResourceState::Unbound | ResourceState::Reset) {
            self.lifecycle = ResourceState::Bound;
        }
    }
}

/// State shared between a buffer, its views and the lifecycle manager
pub(crate) struct BufferShared {
    key: ResourceKey,
    desc: BufferDesc,
    device: SharedDevice,
    state: Mutex<BufferState>,
}

impl BufferShared {
    pub(crate) fn key(&self) -> ResourceKey {
        self.key
    }

    pub(crate) fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_mapped(&self) -> bool {
        self.lock_state().mapped.is_some()
    }

    pub(crate) fn size(&self) -> u64 {
        self.lock_state().size
    }

    /// Read `out.len()` bytes at `offset` on behalf of a pass
    pub(crate) fn read_range(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let state = self.lock_state();
        check_range(self.key, offset, out.len() as u64, state.size)?;
        state.storage(self.key)?.read(offset, out)
    }

    /// Write `data` at `offset` on behalf of a pass
    pub(crate) fn write_range(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut state = self.lock_state();
        check_range(self.key, offset, data.len() as u64, state.size)?;
        state.storage(self.key)?.write(offset, data)
    }

    /// Record a pass that wrote the buffer through a UAV
    pub(crate) fn mark_written(&self) {
        self.lock_state().content = ContentState::Valid;
    }

    /// Check the buffer can be bound to a pass and mark it used
    pub(crate) fn prepare_gpu_use(&self, initial_counter: Option<u32>) -> Result<()> {
        let mut state = self.lock_state();
        if state.lifecycle == ResourceState::Lost || state.storage.is_none() {
            engine_bail!(SOURCE, DeviceLost, "buffer {:?} is lost", self.key);
        }
        if let Some(count) = initial_counter {
            state.counter = count;
        }
        state.mark_used();
        Ok(())
    }

    /// Atomically bump the hidden counter, returning the previous value
    pub(crate) fn increment_counter(&self) -> Result<u32> {
        if !self.desc.access.contains(AccessFlags::COUNTER) {
            engine_bail!(SOURCE, InvalidOperation, "buffer {:?} has no counter", self.key);
        }
        let mut state = self.lock_state();
        let previous = state.counter;
        state.counter = previous.wrapping_add(1);
        Ok(previous)
    }

    pub(crate) fn counter(&self) -> u32 {
        self.lock_state().counter
    }
}

impl TrackedResource for BufferShared {
    fn label(&self) -> String {
        format!("buffer {:?}", self.key)
    }

    fn is_lost(&self) -> bool {
        self.lock_state().lifecycle == ResourceState::Lost
    }

    fn mark_lost(&self) {
        let mut state = self.lock_state();
        state.storage = None;
        state.lifecycle = ResourceState::Lost;
        state.content = ContentState::Undefined;
    }

    fn recreate(&self, device: &mut dyn GraphicsDevice) -> Result<()> {
        let mut state = self.lock_state();
        let desc = BufferDesc {
            size: state.size,
            ..self.desc.clone()
        };
        let storage = device.create_buffer(&desc, state.mirror.as_deref())?;
        state.storage = Some(storage);
        state.generation = state.generation.wrapping_add(1);
        state.lifecycle = ResourceState::Reset;
        state.counter = 0;
        if state.mirror.is_some() {
            state.content = ContentState::Valid;
        } else {
            state.content = ContentState::Undefined;
            engine_debug!(SOURCE, "Buffer {:?} recreated without mirror, content undefined", self.key);
        }
        Ok(())
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Check an access-flag combination against itself and the device capabilities
pub fn validate_desc(
    desc: &BufferDesc,
    capabilities: Capabilities,
    initial_data: Option<&[u8]>,
) -> Result<()> {
    let access = desc.access;

    if desc.size == 0 {
        engine_bail!(SOURCE, ResourceCreation, "buffer size must be non-zero");
    }
    if desc.stride != 0 && desc.size % desc.stride as u64 != 0 {
        engine_bail!(
            SOURCE,
            ResourceCreation,
            "size {} is not a multiple of stride {}",
            desc.size,
            desc.stride
        );
    }

    if access.contains(AccessFlags::IMMUTABLE) {
        if access.intersects(AccessFlags::CPU_WRITE | AccessFlags::GPU_WRITE | AccessFlags::GPU_UNORDERED) {
            engine_bail!(SOURCE, ResourceCreation, "immutable buffer cannot be written ({:?})", access);
        }
        if desc.usage == BufferUsage::Dynamic {
            engine_bail!(SOURCE, ResourceCreation, "immutable buffer cannot be dynamic");
        }
        if initial_data.is_none() {
            engine_bail!(SOURCE, ResourceCreation, "immutable buffer needs initial data");
        }
    }

    if access.intersects(AccessFlags::CPU_READ | AccessFlags::CPU_WRITE)
        && !capabilities.contains(Capabilities::MAPPABLE)
    {
        engine_bail!(SOURCE, ResourceCreation, "device cannot map buffers ({:?})", access);
    }

    if access.contains(AccessFlags::GPU_UNORDERED) && !capabilities.contains(Capabilities::COMPUTE_TARGET) {
        engine_bail!(SOURCE, ResourceCreation, "device has no unordered access support");
    }

    if access.contains(AccessFlags::GPU_STRUCTURED) {
        if !capabilities.contains(Capabilities::STRUCTURED_VIEW) {
            engine_bail!(SOURCE, ResourceCreation, "device has no structured buffer support");
        }
        if desc.stride == 0 {
            engine_bail!(SOURCE, ResourceCreation, "structured buffer needs a stride");
        }
    }

    if access.contains(AccessFlags::COUNTER) && !access.contains(AccessFlags::GPU_UNORDERED) {
        engine_bail!(SOURCE, ResourceCreation, "counter requires unordered access");
    }

    if let Some(data) = initial_data {
        if data.len() as u64 > desc.size {
            engine_bail!(
                SOURCE,
                SizeMismatch,
                "initial data is {} bytes, buffer holds {}",
                data.len(),
                desc.size
            );
        }
    }

    Ok(())
}

fn check_range(key: ResourceKey, offset: u64, len: u64, size: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(engine_err!(
            SOURCE,
            SizeMismatch,
            "range {}..{} outside buffer {:?} of {} bytes",
            offset,
            offset.saturating_add(len),
            key,
            size
        )),
    }
}

// ============================================================================
// Buffer
// ============================================================================

/// Logical GPU buffer
pub struct Buffer {
    shared: Arc<BufferShared>,
}

impl Buffer {
    /// Validate, allocate and register a buffer
    pub(crate) fn create(
        device: &SharedDevice,
        lifecycle: &LifecycleManager,
        mut desc: BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self> {
        let storage = {
            let mut dev = lock_device(device)?;
            validate_desc(&desc, dev.capabilities(), initial_data)?;
            let status = dev.status();
            if status != DeviceStatus::Operational {
                engine_bail!(SOURCE, DeviceLost, "cannot create a buffer while the device is {:?}", status);
            }
            dev.create_buffer(&desc, initial_data)?
        };

        // Immutable content must survive a reset
        if desc.access.contains(AccessFlags::IMMUTABLE) {
            desc.retain_mirror = true;
        }

        let mirror = desc.retain_mirror.then(|| {
            let mut mirror = vec![0u8; desc.size as usize];
            if let Some(data) = initial_data {
                mirror[..data.len()].copy_from_slice(data);
            }
            mirror
        });
        let content = if initial_data.is_some_and(|data| data.len() as u64 == desc.size) {
            ContentState::Valid
        } else {
            ContentState::Undefined
        };
        let size = desc.size;

        let shared = lifecycle.register_with(|key| BufferShared {
            key,
            desc,
            device: device.clone(),
            state: Mutex::new(BufferState {
                storage: Some(storage),
                size,
                generation: 0,
                lifecycle: ResourceState::Unbound,
                content,
                mapped: None,
                mirror,
                counter: 0,
            }),
        });

        engine_debug!(
            SOURCE,
            "Created buffer {:?}: {} bytes, {:?}, {:?}",
            shared.key,
            size,
            shared.desc.usage,
            shared.desc.access
        );

        Ok(Self { shared })
    }

    pub(crate) fn shared(&self) -> &Arc<BufferShared> {
        &self.shared
    }

    // ===== ACCESSORS =====

    /// Stable identity
    pub fn id(&self) -> ResourceKey {
        self.shared.key
    }

    /// Creation descriptor (its size is the creation size, see `size()`)
    pub fn desc(&self) -> &BufferDesc {
        &self.shared.desc
    }

    pub fn usage(&self) -> BufferUsage {
        self.shared.desc.usage
    }

    pub fn access(&self) -> AccessFlags {
        self.shared.desc.access
    }

    pub fn stride(&self) -> u32 {
        self.shared.desc.stride
    }

    pub fn binding(&self) -> BufferBinding {
        self.shared.desc.binding
    }

    /// Current logical size in bytes
    pub fn size(&self) -> u64 {
        self.shared.size()
    }

    /// Number of `stride`-sized elements (0 for untyped buffers)
    pub fn element_count(&self) -> u64 {
        match self.shared.desc.stride {
            0 => 0,
            stride => self.size() / stride as u64,
        }
    }

    /// Incremented each time the backend storage is replaced
    pub fn generation(&self) -> u32 {
        self.shared.lock_state().generation
    }

    pub fn lifecycle_state(&self) -> ResourceState {
        self.shared.lock_state().lifecycle
    }

    pub fn content_state(&self) -> ContentState {
        self.shared.lock_state().content
    }

    pub fn is_mapped(&self) -> bool {
        self.shared.is_mapped()
    }

    pub fn has_mirror(&self) -> bool {
        self.shared.lock_state().mirror.is_some()
    }

    /// Copy of the CPU mirror, if retained
    pub fn mirror(&self) -> Option<Vec<u8>> {
        self.shared.lock_state().mirror.clone()
    }

    /// Current value of the hidden counter
    pub fn counter(&self) -> u32 {
        self.shared.counter()
    }

    // ===== OPERATIONS =====

    /// Change the logical size of a Dynamic buffer
    ///
    /// Content becomes undefined. Storage is only reallocated when growing
    /// past the current capacity.
    pub fn resize(&self, new_size: u64) -> Result<()> {
        if self.usage() != BufferUsage::Dynamic {
            engine_bail!(SOURCE, InvalidOperation, "buffer {:?} is static and cannot be resized", self.id());
        }

        let stride = self.stride() as u64;
        if new_size == 0 || (stride != 0 && new_size % stride != 0) {
            engine_bail!(SOURCE, SizeMismatch, "cannot resize buffer {:?} to {} bytes", self.id(), new_size);
        }

        let mut device = lock_device(&self.shared.device)?;
        let mut state = self.shared.lock_state();
        if state.mapped.is_some() {
            engine_bail!(SOURCE, ConcurrentAccess, "buffer {:?} is mapped", self.id());
        }

        let capacity = state.storage(self.id())?.capacity();
        if new_size > capacity {
            let desc = BufferDesc {
                size: new_size,
                ..self.shared.desc.clone()
            };
            state.storage = Some(device.create_buffer(&desc, None)?);
            state.generation = state.generation.wrapping_add(1);
        }

        state.size = new_size;
        state.content = ContentState::Undefined;
        state.counter = 0;
        if let Some(mirror) = state.mirror.as_mut() {
            mirror.clear();
            mirror.resize(new_size as usize, 0);
        }

        engine_debug!(SOURCE, "Resized buffer {:?} to {} bytes (capacity {})", self.id(), new_size, capacity.max(new_size));
        Ok(())
    }

    /// Upload `data` at byte `offset`
    pub fn update_subresource(&self, offset: u64, data: &[u8]) -> Result<()> {
        if self.access().contains(AccessFlags::IMMUTABLE) {
            engine_bail!(SOURCE, InvalidOperation, "buffer {:?} is immutable", self.id());
        }

        let mut state = self.shared.lock_state();
        if state.mapped.is_some() {
            engine_bail!(SOURCE, ConcurrentAccess, "buffer {:?} is mapped", self.id());
        }
        check_range(self.id(), offset, data.len() as u64, state.size)?;
        state.storage(self.id())?.write(offset, data)?;

        if let Some(mirror) = state.mirror.as_mut() {
            let start = offset as usize;
            mirror[start..start + data.len()].copy_from_slice(data);
        }
        if offset == 0 && data.len() as u64 == state.size {
            state.content = ContentState::Valid;
        }
        Ok(())
    }

    /// GPU copy of the whole buffer into the front of `dst`
    pub fn copy_to_buffer(&self, dst: &Buffer) -> Result<()> {
        if Arc::ptr_eq(&self.shared, &dst.shared) {
            engine_bail!(SOURCE, InvalidOperation, "cannot copy buffer {:?} onto itself", self.id());
        }
        if dst.access().contains(AccessFlags::IMMUTABLE) {
            engine_bail!(SOURCE, InvalidOperation, "destination buffer {:?} is immutable", dst.id());
        }

        // Lock in key order so two opposite copies cannot deadlock
        let (mut src_state, mut dst_state) = if self.id() < dst.id() {
            let src = self.shared.lock_state();
            let dst = dst.shared.lock_state();
            (src, dst)
        } else {
            let dst = dst.shared.lock_state();
            let src = self.shared.lock_state();
            (src, dst)
        };

        if src_state.mapped.is_some() || dst_state.mapped.is_some() {
            engine_bail!(SOURCE, ConcurrentAccess, "copy {:?} -> {:?} while mapped", self.id(), dst.id());
        }
        if dst_state.size < src_state.size {
            engine_bail!(
                SOURCE,
                SizeMismatch,
                "destination {:?} holds {} bytes, source {:?} has {}",
                dst.id(),
                dst_state.size,
                self.id(),
                src_state.size
            );
        }

        let src_storage = src_state.storage(self.id())?;
        src_storage.copy_to(dst_state.storage(dst.id())?, src_state.size)?;
        if let Some(mirror) = dst_state.mirror.as_mut() {
            src_storage.read(0, &mut mirror[..src_state.size as usize])?;
        }

        dst_state.content = src_state.content;
        dst_state.mark_used();
        src_state.mark_used();
        Ok(())
    }

    /// Map the buffer for CPU access
    pub fn map(&self, access: BufferAccess) -> Result<Mapper<'_>> {
        Mapper::new(self, access)
    }

    /// Mark the buffer as used by a pass
    pub(crate) fn mark_used(&self) -> Result<()> {
        self.shared.prepare_gpu_use(None)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("Buffer")
            .field("id", &self.shared.key)
            .field("size", &state.size)
            .field("usage", &self.shared.desc.usage)
            .field("access", &self.shared.desc.access)
            .field("lifecycle", &state.lifecycle)
            .finish()
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
