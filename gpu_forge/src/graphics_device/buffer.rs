/// Backend buffer trait, buffer descriptor and access flags

use bitflags::bitflags;
use crate::error::Result;

bitflags! {
    /// CPU/GPU access hints declared when a buffer is created
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        /// CPU may map the buffer for reading
        const CPU_READ = 1 << 0;
        /// CPU may map the buffer for writing
        const CPU_WRITE = 1 << 1;
        /// GPU reads the buffer (vertex stream, shader resource)
        const GPU_READ = 1 << 2;
        /// GPU writes the buffer
        const GPU_WRITE = 1 << 3;
        /// GPU random-access writes (unordered access view)
        const GPU_UNORDERED = 1 << 4;
        /// Structured buffer (typed elements of `stride` bytes)
        const GPU_STRUCTURED = 1 << 5;
        /// Content fixed at creation
        const IMMUTABLE = 1 << 6;
        /// Hidden append/consume counter
        const COUNTER = 1 << 7;
    }
}

/// Declared update frequency of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Fixed size, rarely updated
    Static,
    /// Resizable, updated often
    Dynamic,
}

/// How the buffer is consumed by the input assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferBinding {
    /// Vertex stream (also used for compute-only buffers)
    Vertex,
    /// Index stream
    Index,
}

/// CPU access mode of a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl BufferAccess {
    /// Whether the mapping exposes the current content
    pub fn reads(&self) -> bool {
        matches!(self, BufferAccess::ReadOnly | BufferAccess::ReadWrite)
    }

    /// Whether the mapping publishes its bytes back on unmap
    pub fn writes(&self) -> bool {
        matches!(self, BufferAccess::WriteOnly | BufferAccess::ReadWrite)
    }

    /// Access flags a buffer must carry to be mapped in this mode
    pub fn required_flags(&self) -> AccessFlags {
        match self {
            BufferAccess::ReadOnly => AccessFlags::CPU_READ,
            BufferAccess::WriteOnly => AccessFlags::CPU_WRITE,
            BufferAccess::ReadWrite => AccessFlags::CPU_READ | AccessFlags::CPU_WRITE,
        }
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Element stride in bytes (0 if untyped)
    pub stride: u32,
    /// Static or Dynamic
    pub usage: BufferUsage,
    /// Access hints
    pub access: AccessFlags,
    /// Vertex or index stream
    pub binding: BufferBinding,
    /// Keep a CPU-side mirror of every CPU upload (restored after a device reset)
    pub retain_mirror: bool,
}

impl BufferDesc {
    /// Untyped vertex-bound buffer without mirror
    pub fn new(usage: BufferUsage, access: AccessFlags, size: u64) -> Self {
        Self {
            size,
            stride: 0,
            usage,
            access,
            binding: BufferBinding::Vertex,
            retain_mirror: false,
        }
    }

    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_binding(mut self, binding: BufferBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn with_mirror(mut self) -> Self {
        self.retain_mirror = true;
        self
    }
}

/// Element format of a view or index stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum ElementFormat {
    R8_UINT,
    R16_UINT,
    R32_UINT,
    R32_SINT,
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32G32B32A32_UINT,
}

impl ElementFormat {
    /// Returns size in bytes for this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            ElementFormat::R8_UINT => 1,
            ElementFormat::R16_UINT => 2,
            ElementFormat::R32_UINT | ElementFormat::R32_SINT | ElementFormat::R32_SFLOAT => 4,
            ElementFormat::R32G32_SFLOAT => 8,
            ElementFormat::R32G32B32_SFLOAT => 12,
            ElementFormat::R32G32B32A32_SFLOAT | ElementFormat::R32G32B32A32_UINT => 16,
        }
    }
}

/// Buffer storage owned by a backend
///
/// Implemented by backend-specific buffer types. The storage is freed when
/// dropped; the logical `resource::Buffer` survives device resets by swapping
/// its storage for a freshly created one.
pub trait BackendBuffer: Send + Sync {
    /// Allocated size in bytes (may exceed the logical size after a shrink)
    fn capacity(&self) -> u64;

    /// Read bytes starting at `offset`
    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()>;

    /// Write bytes starting at `offset`
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// GPU-side copy of the first `size` bytes into `dst`
    fn copy_to(&self, dst: &dyn BackendBuffer, size: u64) -> Result<()> {
        let mut staging = vec![0u8; size as usize];
        self.read(0, &mut staging)?;
        dst.write(0, &staging)
    }

    /// Expose the first `size` bytes to the CPU
    fn map(&self, access: BufferAccess, size: u64) -> Result<Vec<u8>>;

    /// Release a mapping; `written` carries the bytes to publish for write modes
    fn unmap(&self, written: Option<&[u8]>) -> Result<()>;
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
