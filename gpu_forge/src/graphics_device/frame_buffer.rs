/// Backend frame buffer trait - groups color and depth/stencil planes
///
/// A frame buffer is the set of render targets a pass clears and draws into.
/// The logical `target::FrameBuffer` owns one of these and swaps it for a
/// fresh one after a device reset.

use bitflags::bitflags;
use glam::Vec4;
use crate::error::Result;

bitflags! {
    /// Planes affected by a clear or discard
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Descriptor for creating a frame buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBufferDesc {
    /// Debug name (used in pass logs)
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of color attachments
    pub color_attachments: u32,
    /// Whether a depth/stencil plane is attached
    pub depth_stencil: bool,
}

impl FrameBufferDesc {
    /// One color attachment plus depth/stencil
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            color_attachments: 1,
            depth_stencil: true,
        }
    }
}

/// Frame buffer storage owned by a backend
pub trait BackendFrameBuffer: Send + Sync {
    /// Get the width in pixels
    fn width(&self) -> u32;

    /// Get the height in pixels
    fn height(&self) -> u32;

    /// Clear the selected planes
    fn clear(&self, mask: ClearMask, color: Vec4, depth: f32, stencil: u32) -> Result<()>;

    /// Mark the selected planes as undefined
    fn discard(&self, mask: ClearMask) -> Result<()>;

    /// Read back a color attachment (row-major)
    fn read_color(&self, attachment: u32) -> Result<Vec<Vec4>>;

    /// Read back the depth plane (row-major)
    fn read_depth(&self) -> Result<Vec<f32>>;
}
