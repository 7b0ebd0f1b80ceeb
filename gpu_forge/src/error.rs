//! Error types for the GpuForge engine
//!
//! This module defines the error taxonomy used by the resource layer
//! (buffers, views, mappers), the lifecycle manager and the pass scheduler,
//! plus the `engine_err!` / `engine_bail!` helpers that log a failure before
//! handing it back to the caller.

use std::fmt;

/// Result type for GpuForge operations
pub type Result<T> = std::result::Result<T, Error>;

/// GpuForge errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Access-flag combination unsupported by the active backend, or
    /// self-contradictory (e.g. Immutable + GPU write)
    ResourceCreation(String),

    /// Operation not allowed on this resource (resizing a Static buffer,
    /// updating an Immutable one, copying a buffer onto itself...)
    InvalidOperation(String),

    /// Update or copy attempted while the buffer is mapped
    ConcurrentAccess(String),

    /// Destination too small, or range outside the buffer
    SizeMismatch(String),

    /// View requested on a buffer lacking the needed access flag
    IncompatibleAccess(String),

    /// Buffer could not be mapped (GPU-exclusive or already mapped)
    MapFailed(String),

    /// The device (or the resource's backend handle) is lost.
    /// Fatal to the current frame, recoverable at the next reset.
    DeviceLost(String),

    /// Backend-specific error
    BackendError(String),

    /// Invalid resource (dangling view, unknown parameter, ...)
    InvalidResource(String),

    /// Initialization failed (context, device, subsystems)
    InitializationFailed(String),
}

impl Error {
    /// Whether this error is the recoverable device-lost condition
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Error::DeviceLost(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::ConcurrentAccess(msg) => write!(f, "Concurrent access: {}", msg),
            Error::SizeMismatch(msg) => write!(f, "Size mismatch: {}", msg),
            Error::IncompatibleAccess(msg) => write!(f, "Incompatible access: {}", msg),
            Error::MapFailed(msg) => write!(f, "Map failed: {}", msg),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Build an error of the given kind, logging it at ERROR severity first
///
/// # Example
///
/// ```ignore
/// let err = engine_err!("forge::Buffer", InvalidOperation, "buffer {} is static", id);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $kind:ident, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::forge::Error::$kind(message)
    }};
}

/// Log an error of the given kind and return it from the enclosing function
///
/// # Example
///
/// ```ignore
/// engine_bail!("forge::Buffer", SizeMismatch, "copy needs {} bytes", size);
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $kind:ident, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $kind, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
