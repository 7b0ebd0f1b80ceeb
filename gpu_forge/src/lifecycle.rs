//! Device resource lifecycle manager
//!
//! Tracks every live buffer and frame buffer created through a `RenderContext`
//! so that a device loss can invalidate their backend handles and the
//! following reset can recreate them. Components owning derived resources
//! (views, precomputed data) subscribe as listeners and rebuild those in
//! `on_reset_device`.
//!
//! Entries are held weakly: dropping a resource is its deregistration, dead
//! entries are pruned on the next notification.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use slotmap::{new_key_type, SlotMap};

use crate::error::{Error, Result};
use crate::graphics_device::{lock_device, GraphicsDevice};
use crate::scheduler::FrameScheduler;
use crate::{engine_info, engine_warn};

new_key_type! {
    /// Stable identity of a tracked resource
    pub struct ResourceKey;
}

/// Lifecycle state of a tracked resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Created, never used by a pass
    Unbound,
    /// Used by at least one pass since creation or reset
    Bound,
    /// Backend handle invalidated by a device loss
    Lost,
    /// Backend handle recreated after a reset, not yet used
    Reset,
}

/// Resource whose backend handle follows the device lifecycle
pub(crate) trait TrackedResource: Send + Sync {
    /// Name used in lifecycle logs
    fn label(&self) -> String;

    /// Whether the backend handle was dropped and not recreated yet
    fn is_lost(&self) -> bool;

    /// Drop the backend handle
    fn mark_lost(&self);

    /// Create a new backend handle on the reset device
    fn recreate(&self, device: &mut dyn GraphicsDevice) -> Result<()>;
}

/// Component notified of device loss and reset
///
/// `on_reset_device` runs after every tracked resource has been recreated;
/// it receives the scheduler so that the component can regenerate content
/// the GPU produced (e.g. re-run a compute pass).
pub trait DeviceResourceListener: Send {
    /// Called once when the loss is detected
    fn on_lost_device(&mut self);

    /// Called once after the device and all tracked resources are recreated
    fn on_reset_device(&mut self, scheduler: &mut FrameScheduler) -> Result<()>;
}

/// Lifecycle manager owned by a `RenderContext`
pub struct LifecycleManager {
    resources: Mutex<SlotMap<ResourceKey, Weak<dyn TrackedResource>>>,
    listeners: Mutex<Vec<Weak<Mutex<dyn DeviceResourceListener>>>>,
    device_lost: AtomicBool,
    reset_count: AtomicU32,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            resources: Mutex::new(SlotMap::with_key()),
            listeners: Mutex::new(Vec::new()),
            device_lost: AtomicBool::new(false),
            reset_count: AtomicU32::new(0),
        }
    }

    // ===== REGISTRATION =====

    /// Create a resource under a fresh key and track it
    pub(crate) fn register_with<T, F>(&self, make: F) -> Arc<T>
    where
        T: TrackedResource + 'static,
        F: FnOnce(ResourceKey) -> T,
    {
        let mut resources = self.lock_resources();
        let placeholder: Weak<dyn TrackedResource> = Weak::<T>::new();
        let key = resources.insert(placeholder);
        let resource = Arc::new(make(key));
        let tracked: Weak<dyn TrackedResource> = Arc::downgrade(&resource) as Weak<dyn TrackedResource>;
        resources[key] = tracked;
        resource
    }

    /// Subscribe a component to loss/reset notifications
    ///
    /// The manager keeps a weak reference; dropping the component unsubscribes it.
    pub fn subscribe<L>(&self, listener: &Arc<Mutex<L>>)
    where
        L: DeviceResourceListener + 'static,
    {
        let listener: Arc<Mutex<dyn DeviceResourceListener>> = listener.clone();
        self.lock_listeners().push(Arc::downgrade(&listener));
    }

    // ===== QUERIES =====

    /// Number of live tracked resources
    pub fn resource_count(&self) -> usize {
        self.lock_resources()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.lock_listeners()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether a loss was notified and no reset followed yet
    pub fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Acquire)
    }

    /// Number of completed resets
    pub fn reset_count(&self) -> u32 {
        self.reset_count.load(Ordering::Acquire)
    }

    // ===== NOTIFICATIONS =====

    /// Invalidate every tracked backend handle, then notify listeners
    pub fn notify_device_lost(&self) {
        let resources = self.live_resources();
        for resource in &resources {
            resource.mark_lost();
        }
        self.device_lost.store(true, Ordering::Release);

        let listeners = self.live_listeners();
        for listener in &listeners {
            listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .on_lost_device();
        }

        engine_warn!(
            "forge::Lifecycle",
            "Device lost: {} resources invalidated, {} listeners notified",
            resources.len(),
            listeners.len()
        );
    }

    /// Reset the device, recreate every tracked resource, then let listeners
    /// regenerate their derived data through `scheduler`
    pub fn notify_device_reset(&self, scheduler: &mut FrameScheduler) -> Result<()> {
        let device = scheduler.context().device().clone();
        lock_device(&device)?.reset()?;
        self.restore_resources(scheduler)
    }

    /// Finish an interrupted reset on a device that is operational again
    ///
    /// Only resources still lost are recreated. Listeners are notified once
    /// every resource is back.
    pub fn restore_resources(&self, scheduler: &mut FrameScheduler) -> Result<()> {
        let resources = self.live_resources();
        {
            let device = scheduler.context().device().clone();
            let mut device = lock_device(&device)?;
            for resource in resources.iter().filter(|resource| resource.is_lost()) {
                resource.recreate(&mut *device).map_err(|e| {
                    Error::BackendError(format!("Failed to recreate {}: {}", resource.label(), e))
                })?;
            }
        }
        self.device_lost.store(false, Ordering::Release);
        self.reset_count.fetch_add(1, Ordering::AcqRel);

        let listeners = self.live_listeners();
        for listener in &listeners {
            listener
                .lock()
                .map_err(|_| Error::BackendError("Device listener lock poisoned".to_string()))?
                .on_reset_device(scheduler)?;
        }

        engine_info!(
            "forge::Lifecycle",
            "Device reset: {} resources recreated, {} listeners restored",
            resources.len(),
            listeners.len()
        );
        Ok(())
    }

    // ===== INTERNAL =====

    fn lock_resources(&self) -> MutexGuard<'_, SlotMap<ResourceKey, Weak<dyn TrackedResource>>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<Weak<Mutex<dyn DeviceResourceListener>>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upgrade live entries and prune dead ones
    fn live_resources(&self) -> Vec<Arc<dyn TrackedResource>> {
        let mut resources = self.lock_resources();
        resources.retain(|_, weak| weak.strong_count() > 0);
        resources.values().filter_map(Weak::upgrade).collect()
    }

    fn live_listeners(&self) -> Vec<Arc<Mutex<dyn DeviceResourceListener>>> {
        let mut listeners = self.lock_listeners();
        listeners.retain(|weak| weak.strong_count() > 0);
        listeners.iter().filter_map(Weak::upgrade).collect()
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
