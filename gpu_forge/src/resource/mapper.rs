//! Mapper - scoped CPU access window on a buffer
//!
//! A `Mapper` maps the buffer when created and releases the mapping when
//! dropped, whatever the exit path. At most one mapper may exist per buffer.
//! Write modes publish their bytes back (and into the mirror) on release,
//! provided they were written through the mapper at all.

use std::ops::{Deref, DerefMut};

use bytemuck::Pod;

use crate::error::Result;
use crate::graphics_device::BufferAccess;
use crate::resource::{Buffer, ContentState};
use crate::{engine_bail, engine_error, engine_trace, engine_warn};

const SOURCE: &str = "forge::Mapper";

/// RAII mapping of a buffer
pub struct Mapper<'a> {
    buffer: &'a Buffer,
    access: BufferAccess,
    generation: u32,
    data: Vec<u8>,
    dirty: bool,
}

impl<'a> Mapper<'a> {
    /// Map `buffer` in the given mode
    ///
    /// Fails with `MapFailed` when the buffer lacks the CPU access flag for
    /// the mode or is already mapped, and `DeviceLost` when lost.
    pub fn new(buffer: &'a Buffer, access: BufferAccess) -> Result<Self> {
        let required = access.required_flags();
        if !buffer.access().contains(required) {
            engine_bail!(
                SOURCE,
                MapFailed,
                "buffer {:?} is GPU-exclusive for {:?} (needs {:?})",
                buffer.id(),
                access,
                required
            );
        }

        let shared = buffer.shared();
        let mut state = shared.lock_state();
        if let Some(current) = state.mapped {
            engine_bail!(SOURCE, MapFailed, "buffer {:?} is already mapped {:?}", buffer.id(), current);
        }

        let size = state.size;
        let data = state.storage(buffer.id())?.map(access, size)?;
        state.mapped = Some(access);
        let generation = state.generation;
        drop(state);

        engine_trace!(SOURCE, "Mapped buffer {:?} {:?} ({} bytes)", buffer.id(), access, size);

        Ok(Self {
            buffer,
            access,
            generation,
            data,
            dirty: false,
        })
    }

    pub fn access(&self) -> BufferAccess {
        self.access
    }

    /// Mapped size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the buffer storage changed since the map
    pub fn is_stale(&self) -> bool {
        let state = self.buffer.shared().lock_state();
        state.generation != self.generation || state.storage.is_none()
    }

    fn assert_current(&self) {
        if self.is_stale() {
            panic!(
                "stale Mapper on buffer {:?}: backend storage changed since the map",
                self.buffer.id()
            );
        }
    }

    /// Mapped bytes
    pub fn as_slice(&self) -> &[u8] {
        self.assert_current();
        &self.data
    }

    /// Mapped bytes, writable in write modes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.assert_current();
        assert!(
            self.access.writes(),
            "buffer {:?} is mapped read-only",
            self.buffer.id()
        );
        self.dirty = true;
        &mut self.data
    }

    /// Copy the mapped bytes out as `T` elements
    pub fn read_as<T: Pod>(&self) -> Vec<T> {
        self.as_slice()
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    /// Write `values` starting at element `offset` (in units of `T`)
    pub fn write_from<T: Pod>(&mut self, offset: usize, values: &[T]) {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let start = offset * std::mem::size_of::<T>();
        self.as_mut_slice()[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl Deref for Mapper<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for Mapper<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl Drop for Mapper<'_> {
    fn drop(&mut self) {
        let id = self.buffer.id();
        let mut state = self.buffer.shared().lock_state();
        state.mapped = None;

        if state.generation != self.generation {
            engine_warn!(SOURCE, "Released stale mapping of buffer {:?}", id);
            return;
        }
        let publish = self.access.writes() && self.dirty;
        let written = publish.then_some(self.data.as_slice());
        let Some(storage) = state.storage.as_deref() else {
            engine_warn!(SOURCE, "Released mapping of lost buffer {:?}", id);
            return;
        };
        if let Err(e) = storage.unmap(written) {
            engine_error!(SOURCE, "Failed to unmap buffer {:?}: {}", id, e);
            return;
        }

        if publish {
            let len = self.data.len().min(state.size as usize);
            if let Some(mirror) = state.mirror.as_mut() {
                mirror[..len].copy_from_slice(&self.data[..len]);
            }
            state.content = ContentState::Valid;
        }
        engine_trace!(SOURCE, "Unmapped buffer {:?}", id);
    }
}

#[cfg(test)]
#[path = "mapper_tests.rs"]
mod tests;
