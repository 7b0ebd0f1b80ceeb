//! Buffer views - typed shader-visible windows on a buffer
//!
//! A view never owns its buffer. It resolves the buffer at use time, so a
//! view created once observes resizes, uploads and device resets of the
//! underlying buffer.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use crate::error::Result;
use crate::graphics_device::{AccessFlags, ElementFormat};
use crate::lifecycle::ResourceKey;
use crate::resource::{Buffer, BufferShared};
use crate::{engine_bail, engine_err};

const SOURCE: &str = "forge::View";

/// Shader-side role of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Read-only shader resource
    ShaderResource,
    /// Random-access read/write
    UnorderedAccess,
}

/// Common view data
#[derive(Clone)]
pub struct BufferView {
    kind: ViewKind,
    format: ElementFormat,
    buffer_id: ResourceKey,
    buffer: Weak<BufferShared>,
    initial_counter: Option<u32>,
}

impl BufferView {
    fn new(buffer: &Buffer, kind: ViewKind, format: ElementFormat, initial_counter: Option<u32>) -> Result<Self> {
        let element_size = format.size_bytes() as u64;
        if buffer.size() % element_size != 0 {
            engine_bail!(
                SOURCE,
                InvalidOperation,
                "{:?} elements ({} bytes) do not tile buffer {:?} of {} bytes",
                format,
                element_size,
                buffer.id(),
                buffer.size()
            );
        }
        if buffer.access().contains(AccessFlags::GPU_STRUCTURED) && buffer.stride() as u64 != element_size {
            engine_bail!(
                SOURCE,
                InvalidOperation,
                "{:?} does not match the {} byte stride of structured buffer {:?}",
                format,
                buffer.stride(),
                buffer.id()
            );
        }

        Ok(Self {
            kind,
            format,
            buffer_id: buffer.id(),
            buffer: Arc::downgrade(buffer.shared()),
            initial_counter,
        })
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn format(&self) -> ElementFormat {
        self.format
    }

    /// Identity of the viewed buffer
    pub fn buffer_id(&self) -> ResourceKey {
        self.buffer_id
    }

    /// Counter value applied when the view is bound to a pass
    pub fn initial_counter(&self) -> Option<u32> {
        self.initial_counter
    }

    /// Whether the viewed buffer is still alive
    pub fn is_alive(&self) -> bool {
        self.buffer.strong_count() > 0
    }

    /// Number of elements in the viewed buffer at its current size
    pub fn element_count(&self) -> Result<u64> {
        Ok(self.resolve()?.size() / self.format.size_bytes() as u64)
    }

    /// Upgrade to the buffer state, `InvalidResource` if the buffer was dropped
    pub(crate) fn resolve(&self) -> Result<Arc<BufferShared>> {
        self.buffer.upgrade().ok_or_else(|| {
            engine_err!(SOURCE, InvalidResource, "buffer {:?} behind {:?} view was dropped", self.buffer_id, self.kind)
        })
    }

    /// Whether both views address the same buffer
    pub fn aliases(&self, other: &BufferView) -> bool {
        Weak::ptr_eq(&self.buffer, &other.buffer)
    }
}

impl PartialEq for BufferView {
    fn eq(&self, other: &Self) -> bool {
        self.aliases(other)
            && self.kind == other.kind
            && self.format == other.format
            && self.initial_counter == other.initial_counter
    }
}

impl Eq for BufferView {}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("buffer", &self.buffer_id)
            .finish()
    }
}

// ============================================================================
// Typed views
// ============================================================================

/// Read-only view bound to SRV slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderResourceView(BufferView);

/// Read/write view bound to UAV slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnorderedAccessView(BufferView);

impl Deref for ShaderResourceView {
    type Target = BufferView;

    fn deref(&self) -> &BufferView {
        &self.0
    }
}

impl Deref for UnorderedAccessView {
    type Target = BufferView;

    fn deref(&self) -> &BufferView {
        &self.0
    }
}

/// Create a shader resource view; the buffer needs `GPU_READ`
pub fn make_shader_resource_view(buffer: &Buffer, format: ElementFormat) -> Result<ShaderResourceView> {
    if !buffer.access().contains(AccessFlags::GPU_READ) {
        engine_bail!(SOURCE, IncompatibleAccess, "buffer {:?} is not GPU-readable", buffer.id());
    }
    BufferView::new(buffer, ViewKind::ShaderResource, format, None).map(ShaderResourceView)
}

/// Create an unordered access view; the buffer needs `GPU_WRITE | GPU_UNORDERED`
pub fn make_unordered_access_view(buffer: &Buffer, format: ElementFormat) -> Result<UnorderedAccessView> {
    check_unordered(buffer)?;
    BufferView::new(buffer, ViewKind::UnorderedAccess, format, None).map(UnorderedAccessView)
}

/// Create an unordered access view that resets the buffer counter when bound
pub fn make_unordered_access_view_with_counter(
    buffer: &Buffer,
    format: ElementFormat,
    initial_count: u32,
) -> Result<UnorderedAccessView> {
    check_unordered(buffer)?;
    if !buffer.access().contains(AccessFlags::COUNTER) {
        engine_bail!(SOURCE, IncompatibleAccess, "buffer {:?} has no counter", buffer.id());
    }
    BufferView::new(buffer, ViewKind::UnorderedAccess, format, Some(initial_count)).map(UnorderedAccessView)
}

fn check_unordered(buffer: &Buffer) -> Result<()> {
    let required = AccessFlags::GPU_WRITE | AccessFlags::GPU_UNORDERED;
    if !buffer.access().contains(required) {
        engine_bail!(
            SOURCE,
            IncompatibleAccess,
            "buffer {:?} needs {:?}, has {:?}",
            buffer.id(),
            required,
            buffer.access()
        );
    }
    Ok(())
}

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;
