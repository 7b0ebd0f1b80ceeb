/// SoftBuffer - system-memory implementation of BackendBuffer

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gpu_forge::engine_error;
use gpu_forge::forge::device::{BackendBuffer, BufferAccess};
use gpu_forge::forge::{Error, Result};

use crate::soft_context::SoftContext;

const SOURCE: &str = "forge::soft::Buffer";

/// Soft buffer storage
pub struct SoftBuffer {
    /// Shared device state (status, epoch, counters)
    ctx: Arc<SoftContext>,
    /// Backing bytes
    data: Mutex<Vec<u8>>,
    /// Device epoch at creation
    epoch: u32,
    /// Access of the open mapping, if any
    mapping: Mutex<Option<BufferAccess>>,
}

impl SoftBuffer {
    pub(crate) fn new(ctx: Arc<SoftContext>, capacity: u64, initial_data: Option<&[u8]>) -> Self {
        let mut data = vec![0u8; capacity as usize];
        if let Some(initial) = initial_data {
            data[..initial.len()].copy_from_slice(initial);
        }
        ctx.buffers_alive.fetch_add(1, Ordering::Relaxed);
        ctx.buffer_memory.fetch_add(capacity, Ordering::Relaxed);
        let epoch = ctx.epoch();
        Self {
            ctx,
            data: Mutex::new(data),
            epoch,
            mapping: Mutex::new(None),
        }
    }

    fn bytes(&self) -> Result<MutexGuard<'_, Vec<u8>>> {
        self.ctx.check_epoch(self.epoch, "buffer")?;
        Ok(self.data.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

fn range(offset: u64, len: usize, capacity: usize) -> Result<std::ops::Range<usize>> {
    let start = offset as usize;
    match start.checked_add(len) {
        Some(end) if end <= capacity => Ok(start..end),
        _ => {
            engine_error!(SOURCE, "Access {}..+{} outside {} byte storage", offset, len, capacity);
            Err(Error::BackendError(format!(
                "access at {} of {} bytes exceeds storage of {} bytes",
                offset, len, capacity
            )))
        }
    }
}

impl BackendBuffer for SoftBuffer {
    fn capacity(&self) -> u64 {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).len() as u64
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let data = self.bytes()?;
        let range = range(offset, out.len(), data.len())?;
        out.copy_from_slice(&data[range]);
        Ok(())
    }

    fn write(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut data = self.bytes()?;
        let range = range(offset, bytes.len(), data.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    fn copy_to(&self, dst: &dyn BackendBuffer, size: u64) -> Result<()> {
        let staging = {
            let data = self.bytes()?;
            let range = range(0, size as usize, data.len())?;
            data[range].to_vec()
        };
        let dst_capacity = dst.capacity();
        if size < dst_capacity {
            self.ctx.validation.partial_copy(size, dst_capacity);
        }
        dst.write(0, &staging)
    }

    fn map(&self, access: BufferAccess, size: u64) -> Result<Vec<u8>> {
        let data = self.bytes()?;
        let range = range(0, size as usize, data.len())?;
        let mut mapping = self.mapping.lock().unwrap_or_else(PoisonError::into_inner);
        if mapping.is_some() {
            return Err(Error::MapFailed("soft buffer is already mapped".to_string()));
        }
        *mapping = Some(access);
        Ok(data[range].to_vec())
    }

    fn unmap(&self, written: Option<&[u8]>) -> Result<()> {
        let access = self.mapping.lock().unwrap_or_else(PoisonError::into_inner).take();
        match (access, written) {
            (_, Some(bytes)) => self.write(0, bytes),
            (Some(access), None) if access.writes() => {
                self.ctx.validation.unused_write_map();
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Drop for SoftBuffer {
    fn drop(&mut self) {
        let capacity = self.data.get_mut().map(|data| data.len()).unwrap_or(0) as u64;
        self.ctx.buffers_alive.fetch_sub(1, Ordering::Relaxed);
        self.ctx.buffer_memory.fetch_sub(capacity, Ordering::Relaxed);
    }
}
