/*!
# GpuForge - Soft Backend

CPU-emulated implementation of the `gpu_forge` device traits.

Buffers and frame buffers live in system memory and compute kernels run on
the calling thread. Two profiles are available, picked by `BackendKind` at
creation: `Legacy` (mappable vertex/index buffers only) and `Compute`
(unordered access, structured buffers, counters and compute dispatch).
Device loss can be simulated through a `SoftDeviceHandle`, and a validation
layer counts suspicious usage patterns.

```ignore
let (context, handle) = gpu_forge_backend_soft::create_context(DeviceConfig::default())?;
let mut scheduler = context.scheduler();
handle.simulate_device_lost();
assert_eq!(scheduler.begin_frame()?, FrameStatus::Skipped);
```
*/

mod soft_context;
mod soft_buffer;
mod soft_frame_buffer;
mod soft_device;
mod validation;

use gpu_forge::forge::{DeviceConfig, RenderContext, Result};

pub use soft_buffer::SoftBuffer;
pub use soft_device::{profile_capabilities, SoftDevice, SoftDeviceHandle};
pub use soft_frame_buffer::{SoftFrameBuffer, DISCARD_COLOR, DISCARD_DEPTH};
pub use validation::{print_validation_report, ValidationStats};

/// Create a soft device for `config.backend`
pub fn create_device(config: &DeviceConfig) -> (SoftDevice, SoftDeviceHandle) {
    let device = SoftDevice::new(config);
    let handle = device.handle();
    (device, handle)
}

/// Create a soft device and wrap it in a render context
pub fn create_context(config: DeviceConfig) -> Result<(RenderContext, SoftDeviceHandle)> {
    let (device, handle) = create_device(&config);
    let context = RenderContext::new(device, config)?;
    Ok((context, handle))
}
