/// SoftFrameBuffer - system-memory color and depth/stencil planes

use std::sync::{Arc, Mutex, PoisonError};

use glam::Vec4;
use gpu_forge::forge::device::{BackendFrameBuffer, ClearMask, FrameBufferDesc};
use gpu_forge::forge::{Error, Result};

use crate::soft_context::SoftContext;

/// Color written into discarded color planes
pub const DISCARD_COLOR: Vec4 = Vec4::new(1.0, 0.0, 1.0, 1.0);
/// Depth written into discarded depth planes
pub const DISCARD_DEPTH: f32 = -1.0;

struct Planes {
    color: Vec<Vec<Vec4>>,
    depth: Option<Vec<f32>>,
    stencil: Option<Vec<u32>>,
}

pub struct SoftFrameBuffer {
    ctx: Arc<SoftContext>,
    desc: FrameBufferDesc,
    epoch: u32,
    planes: Mutex<Planes>,
}

impl SoftFrameBuffer {
    pub(crate) fn new(ctx: Arc<SoftContext>, desc: &FrameBufferDesc) -> Self {
        let pixels = desc.width as usize * desc.height as usize;
        let planes = Planes {
            color: (0..desc.color_attachments).map(|_| vec![Vec4::ZERO; pixels]).collect(),
            depth: desc.depth_stencil.then(|| vec![1.0; pixels]),
            stencil: desc.depth_stencil.then(|| vec![0; pixels]),
        };
        let epoch = ctx.epoch();
        Self {
            ctx,
            desc: desc.clone(),
            epoch,
            planes: Mutex::new(planes),
        }
    }

    /// Read back the stencil plane (row-major)
    pub fn read_stencil(&self) -> Result<Vec<u32>> {
        self.with_planes(|planes| {
            planes
                .stencil
                .clone()
                .ok_or_else(|| Error::InvalidResource(format!("frame buffer '{}' has no stencil plane", self.desc.name)))
        })
    }

    fn with_planes<T>(&self, f: impl FnOnce(&mut Planes) -> Result<T>) -> Result<T> {
        self.ctx.check_epoch(self.epoch, "frame buffer")?;
        let mut planes = self.planes.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut planes)
    }

    fn fill(planes: &mut Planes, mask: ClearMask, color: Vec4, depth: f32, stencil: u32) {
        if mask.contains(ClearMask::COLOR) {
            for attachment in &mut planes.color {
                attachment.fill(color);
            }
        }
        if mask.contains(ClearMask::DEPTH) {
            if let Some(plane) = planes.depth.as_mut() {
                plane.fill(depth);
            }
        }
        if mask.contains(ClearMask::STENCIL) {
            if let Some(plane) = planes.stencil.as_mut() {
                plane.fill(stencil);
            }
        }
    }
}

impl BackendFrameBuffer for SoftFrameBuffer {
    fn width(&self) -> u32 {
        self.desc.width
    }

    fn height(&self) -> u32 {
        self.desc.height
    }

    fn clear(&self, mask: ClearMask, color: Vec4, depth: f32, stencil: u32) -> Result<()> {
        self.with_planes(|planes| {
            Self::fill(planes, mask, color, depth, stencil);
            Ok(())
        })
    }

    fn discard(&self, mask: ClearMask) -> Result<()> {
        self.with_planes(|planes| {
            Self::fill(planes, mask, DISCARD_COLOR, DISCARD_DEPTH, 0xDEAD);
            Ok(())
        })
    }

    fn read_color(&self, attachment: u32) -> Result<Vec<Vec4>> {
        self.with_planes(|planes| {
            planes.color.get(attachment as usize).cloned().ok_or_else(|| {
                Error::InvalidResource(format!(
                    "frame buffer '{}' has no color attachment {}",
                    self.desc.name, attachment
                ))
            })
        })
    }

    fn read_depth(&self) -> Result<Vec<f32>> {
        self.with_planes(|planes| {
            planes
                .depth
                .clone()
                .ok_or_else(|| Error::InvalidResource(format!("frame buffer '{}' has no depth plane", self.desc.name)))
        })
    }
}
