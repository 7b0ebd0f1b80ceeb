/// SoftContext - state shared by a soft device and every object it created
///
/// Holds the device status, the loss epoch and the statistic counters.
/// Buffers and frame buffers keep an `Arc` to it and compare their creation
/// epoch against the current one: after a loss every older object fails
/// with `DeviceLost`.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use gpu_forge::forge::device::{DeviceStats, DeviceStatus};
use gpu_forge::forge::{Error, Result};

use crate::validation::ValidationTracker;

pub(crate) struct SoftContext {
    status: Mutex<DeviceStatus>,
    epoch: AtomicU32,
    pub(crate) validation: ValidationTracker,
    pub(crate) buffers_alive: AtomicU32,
    pub(crate) buffer_memory: AtomicU64,
    pub(crate) dispatches: AtomicU32,
    pub(crate) groups_executed: AtomicU64,
    pub(crate) draw_calls: AtomicU32,
    pub(crate) resets: AtomicU32,
}

impl SoftContext {
    pub(crate) fn new(enable_validation: bool) -> Self {
        Self {
            status: Mutex::new(DeviceStatus::Operational),
            epoch: AtomicU32::new(0),
            validation: ValidationTracker::new(enable_validation),
            buffers_alive: AtomicU32::new(0),
            buffer_memory: AtomicU64::new(0),
            dispatches: AtomicU32::new(0),
            groups_executed: AtomicU64::new(0),
            draw_calls: AtomicU32::new(0),
            resets: AtomicU32::new(0),
        }
    }

    pub(crate) fn status(&self) -> DeviceStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_status(&self, status: DeviceStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub(crate) fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Invalidate every object created so far
    pub(crate) fn lose(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.set_status(DeviceStatus::Lost);
    }

    pub(crate) fn check_operational(&self, what: &str) -> Result<()> {
        match self.status() {
            DeviceStatus::Operational => Ok(()),
            status => Err(Error::DeviceLost(format!("cannot {} while the device is {:?}", what, status))),
        }
    }

    /// Fail with `DeviceLost` if `epoch` predates the last loss
    pub(crate) fn check_epoch(&self, epoch: u32, what: &str) -> Result<()> {
        if epoch != self.epoch() {
            return Err(Error::DeviceLost(format!("{} belongs to a lost device", what)));
        }
        Ok(())
    }

    pub(crate) fn stats(&self) -> DeviceStats {
        DeviceStats {
            buffers_alive: self.buffers_alive.load(Ordering::Relaxed),
            buffer_memory: self.buffer_memory.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            groups_executed: self.groups_executed.load(Ordering::Relaxed),
            draw_calls: self.draw_calls.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }
}
