/// Pass commands - per-frame log of issued operations

use glam::Vec4;

use crate::graphics_device::{ClearMask, ElementFormat};
use crate::lifecycle::ResourceKey;

/// Operation issued through the scheduler, in issue order
#[derive(Debug, Clone, PartialEq)]
pub enum PassCommand {
    BeginFrame {
        index: u64,
    },
    BindFrameBuffer {
        name: String,
    },
    Clear {
        target: String,
        mask: ClearMask,
        color: Vec4,
        depth: f32,
        stencil: u32,
    },
    Discard {
        target: String,
        mask: ClearMask,
    },
    Dispatch {
        technique: String,
        groups: [u32; 3],
    },
    CopyBuffer {
        src: ResourceKey,
        dst: ResourceKey,
        bytes: u64,
    },
    BindVertexStream {
        slot: u32,
        buffer: ResourceKey,
        stride: u32,
    },
    BindIndexStream {
        buffer: ResourceKey,
        format: ElementFormat,
    },
    Draw {
        target: String,
        vertex_count: u32,
        first_vertex: u32,
    },
}

impl PassCommand {
    /// Technique name of a dispatch
    pub fn technique(&self) -> Option<&str> {
        match self {
            PassCommand::Dispatch { technique, .. } => Some(technique),
            _ => None,
        }
    }
}

/// Summary returned by `FrameScheduler::end_frame`
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Index of the frame (starting at 1)
    pub frame_index: u64,
    /// Issued commands in order
    pub commands: Vec<PassCommand>,
}

impl FrameReport {
    /// Number of dispatches in the frame
    pub fn dispatch_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, PassCommand::Dispatch { .. }))
            .count()
    }

    /// Technique names of the frame's dispatches, in order
    pub fn dispatch_order(&self) -> Vec<&str> {
        self.commands.iter().filter_map(PassCommand::technique).collect()
    }
}

/// Outcome of `FrameScheduler::begin_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame may be rendered
    Ready,
    /// The device is lost; skip rendering this frame
    Skipped,
}
