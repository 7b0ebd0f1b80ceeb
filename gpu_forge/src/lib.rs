/*!
# GpuForge

Backend-agnostic GPU resource and pass-scheduling layer.

This crate provides typed buffers with CPU/GPU access contracts, views and
scoped mappers over them, a device-resource lifecycle manager that survives
device loss, and a frame scheduler that submits compute dispatches, copies,
clears and draws in call order. Backends (soft rasterizer, test mocks)
implement the `GraphicsDevice` trait and declare their capabilities.

## Architecture

- **RenderContext**: Explicit handle to a device and its resource factory
- **Buffer**: Logical buffer (Static/Dynamic, access flags, mirror, generation)
- **ShaderResourceView / UnorderedAccessView**: Typed views resolved at use time
- **Mapper**: RAII CPU window on a buffer
- **LifecycleManager**: Device loss/reset notification and resource recreation
- **FrameScheduler**: Ordered submission of dispatches, copies, clears and draws
- **Effect / Technique**: Named parameters and compute kernels
*/

// Internal modules
mod error;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod resource;
pub mod lifecycle;
pub mod effect;
pub mod frame_buffer;
pub mod scheduler;
pub mod context;

// Main forge namespace module
pub mod forge {
    // Error types
    pub use crate::error::{Error, Result};

    // Context and configuration
    pub use crate::context::RenderContext;
    pub use crate::config::{BackendKind, DeviceConfig};

    // Device trait
    pub use crate::graphics_device::GraphicsDevice;

    // Logging sub-module (types and slot functions, NOT macros)
    pub mod log {
        pub use crate::log::{
            reset_logger, set_logger, set_min_severity, min_severity,
            DefaultLogger, LogEntry, LogSeverity, Logger,
        };
    }

    // Backend seam
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Buffers, views, mappers
    pub mod resource {
        pub use crate::resource::*;
    }

    // Lifecycle manager
    pub mod lifecycle {
        pub use crate::lifecycle::{DeviceResourceListener, LifecycleManager, ResourceKey, ResourceState};
    }

    // Effects and kernels
    pub mod effect {
        pub use crate::effect::*;
    }

    // Frame buffers and scheduler
    pub mod frame {
        pub use crate::frame_buffer::FrameBuffer;
        pub use crate::scheduler::*;
    }
}

// Re-export math library at crate root
pub use glam;
pub use bytemuck;
