//! Frame scheduler - ordered submission of passes
//!
//! Passes execute in call order on a single in-order queue; there is no
//! dependency graph. Each call validates its bindings, forwards the work to
//! the device and appends a `PassCommand` to the frame log.

use std::sync::{Arc, Weak};

use glam::Vec4;

use crate::context::RenderContext;
use crate::effect::{BoundSlot, Effect, KernelIo, ParameterValue, Technique};
use crate::error::Result;
use crate::frame_buffer::FrameBuffer;
use crate::graphics_device::{
    lock_device, AccessFlags, BufferBinding, Capabilities, ClearMask, DeviceStatus, ElementFormat,
};
use crate::lifecycle::ResourceKey;
use crate::resource::{Buffer, BufferShared, BufferView, ViewKind};
use crate::scheduler::{FrameReport, FrameStatus, PassCommand};
use crate::{engine_bail, engine_err, engine_trace};

const SOURCE: &str = "forge::Scheduler";

struct StreamBinding {
    slot: u32,
    id: ResourceKey,
    buffer: Weak<BufferShared>,
}

/// Per-context pass scheduler
pub struct FrameScheduler {
    context: RenderContext,
    current: Option<FrameBuffer>,
    vertex_streams: Vec<StreamBinding>,
    index_stream: Option<StreamBinding>,
    commands: Vec<PassCommand>,
    frame_index: u64,
}

impl FrameScheduler {
    pub fn new(context: &RenderContext) -> Self {
        Self {
            context: context.clone(),
            current: None,
            vertex_streams: Vec::new(),
            index_stream: None,
            commands: Vec::new(),
            frame_index: 0,
        }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Index of the current (or last) frame, 0 before the first frame
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Commands issued since the frame began
    pub fn commands(&self) -> &[PassCommand] {
        &self.commands
    }

    // ===== FRAME =====

    /// Start a frame, driving device loss and reset
    ///
    /// A lost device is notified once and the frame is skipped; a device
    /// waiting for reset is reset (resources recreated, listeners restored)
    /// and the frame proceeds. When recreation fails the error is returned
    /// and the next frame retries it.
    pub fn begin_frame(&mut self) -> Result<FrameStatus> {
        self.frame_index += 1;
        self.commands.clear();
        self.vertex_streams.clear();
        self.index_stream = None;
        self.current = None;
        self.commands.push(PassCommand::BeginFrame {
            index: self.frame_index,
        });

        let status = lock_device(self.context.device())?.status();
        let context = self.context.clone();
        let lifecycle = context.lifecycle();
        match status {
            DeviceStatus::Operational => {
                // A previous reset stopped before every resource was recreated
                if lifecycle.is_device_lost() {
                    lifecycle.restore_resources(self)?;
                }
            }
            DeviceStatus::Lost => {
                if !lifecycle.is_device_lost() {
                    lifecycle.notify_device_lost();
                }
                engine_trace!(SOURCE, "Frame {} skipped, device lost", self.frame_index);
                return Ok(FrameStatus::Skipped);
            }
            DeviceStatus::NotReset => {
                if !lifecycle.is_device_lost() {
                    lifecycle.notify_device_lost();
                }
                lifecycle.notify_device_reset(self)?;
            }
        }

        self.bind_frame_buffer(None);
        Ok(FrameStatus::Ready)
    }

    /// Close the frame and hand back its command log
    pub fn end_frame(&mut self) -> FrameReport {
        self.vertex_streams.clear();
        self.index_stream = None;
        FrameReport {
            frame_index: self.frame_index,
            commands: std::mem::take(&mut self.commands),
        }
    }

    // ===== FRAME BUFFERS =====

    /// Make `frame_buffer` current (`None` = default frame buffer)
    pub fn bind_frame_buffer(&mut self, frame_buffer: Option<&FrameBuffer>) {
        self.current = frame_buffer.cloned();
        let name = self.cur_frame_buffer().name().to_string();
        self.commands.push(PassCommand::BindFrameBuffer { name });
    }

    /// Current frame buffer
    pub fn cur_frame_buffer(&self) -> &FrameBuffer {
        self.current
            .as_ref()
            .unwrap_or_else(|| self.context.default_frame_buffer())
    }

    /// Clear planes of the current frame buffer
    pub fn clear(&mut self, mask: ClearMask, color: Vec4, depth: f32, stencil: u32) -> Result<()> {
        let target = self.cur_frame_buffer().clone();
        target.clear(mask, color, depth, stencil)?;
        target.mark_used();
        self.commands.push(PassCommand::Clear {
            target: target.name().to_string(),
            mask,
            color,
            depth,
            stencil,
        });
        Ok(())
    }

    /// Mark planes of the current frame buffer as undefined
    pub fn discard(&mut self, mask: ClearMask) -> Result<()> {
        let target = self.cur_frame_buffer().clone();
        target.discard(mask)?;
        self.commands.push(PassCommand::Discard {
            target: target.name().to_string(),
            mask,
        });
        Ok(())
    }

    // ===== COMPUTE =====

    /// Run `technique` of `effect` over an `x * y * z` grid of thread groups
    ///
    /// # Panics
    ///
    /// Panics if a bound buffer is mapped.
    pub fn dispatch(&mut self, effect: &Effect, technique: &Technique, x: u32, y: u32, z: u32) -> Result<()> {
        if x == 0 || y == 0 || z == 0 {
            engine_bail!(SOURCE, InvalidOperation, "dispatch of '{}' with empty grid {}x{}x{}", technique.name(), x, y, z);
        }
        if !self.context.capabilities()?.contains(Capabilities::COMPUTE_TARGET) {
            engine_bail!(SOURCE, InvalidOperation, "device cannot run compute technique '{}'", technique.name());
        }

        let kernel = technique.kernel();
        let mut views: Vec<&BufferView> = Vec::with_capacity(kernel.slots().len());
        let mut bound = Vec::with_capacity(kernel.slots().len());
        for slot in kernel.slots() {
            let view: &BufferView = match (slot.kind, effect.parameter_by_name(&slot.name)) {
                (ViewKind::ShaderResource, Some(ParameterValue::Srv(srv))) => &**srv,
                (ViewKind::UnorderedAccess, Some(ParameterValue::Uav(uav))) => &**uav,
                (_, None) => engine_bail!(
                    SOURCE,
                    InvalidResource,
                    "technique '{}' slot '{}' is not bound",
                    technique.name(),
                    slot.name
                ),
                (kind, Some(other)) => engine_bail!(
                    SOURCE,
                    InvalidOperation,
                    "technique '{}' slot '{}' expects {:?}, parameter holds {}",
                    technique.name(),
                    slot.name,
                    kind,
                    other.type_name()
                ),
            };

            let buffer = view.resolve()?;
            assert!(
                !buffer.is_mapped(),
                "dispatch of '{}' binds buffer {:?} while it is mapped",
                technique.name(),
                buffer.key()
            );
            views.push(view);
            bound.push(BoundSlot {
                name: slot.name.clone(),
                kind: slot.kind,
                format: view.format(),
                buffer,
            });
        }

        if self.context.config().hazard_checks {
            check_aliasing(technique, &views)?;
        }

        for (slot, view) in bound.iter().zip(&views) {
            slot.buffer.prepare_gpu_use(view.initial_counter())?;
        }
        let written: Vec<Arc<BufferShared>> = bound
            .iter()
            .filter(|slot| slot.kind == ViewKind::UnorderedAccess)
            .map(|slot| slot.buffer.clone())
            .collect();

        {
            let mut io = KernelIo::new(technique.name(), effect.parameters(), bound);
            let mut device = lock_device(self.context.device())?;
            device.dispatch(kernel, &mut io, [x, y, z])?;
        }
        for buffer in &written {
            buffer.mark_written();
        }

        engine_trace!(SOURCE, "Dispatched '{}' {}x{}x{}", technique.name(), x, y, z);
        self.commands.push(PassCommand::Dispatch {
            technique: technique.name().to_string(),
            groups: [x, y, z],
        });
        Ok(())
    }

    /// Copy `src` into `dst` at this point of the frame
    pub fn copy_buffer(&mut self, src: &Buffer, dst: &Buffer) -> Result<()> {
        src.copy_to_buffer(dst)?;
        self.commands.push(PassCommand::CopyBuffer {
            src: src.id(),
            dst: dst.id(),
            bytes: src.size(),
        });
        Ok(())
    }

    // ===== DRAW =====

    /// Bind `buffer` as vertex stream `slot`
    ///
    /// # Panics
    ///
    /// Panics if the buffer is mapped.
    pub fn bind_vertex_stream(&mut self, slot: u32, buffer: &Buffer, stride: u32) -> Result<()> {
        assert!(!buffer.is_mapped(), "vertex stream {:?} is mapped", buffer.id());
        if !buffer.access().contains(AccessFlags::GPU_READ) {
            engine_bail!(SOURCE, IncompatibleAccess, "vertex stream {:?} is not GPU-readable", buffer.id());
        }
        buffer.mark_used()?;

        self.vertex_streams.retain(|stream| stream.slot != slot);
        self.vertex_streams.push(StreamBinding {
            slot,
            id: buffer.id(),
            buffer: Arc::downgrade(buffer.shared()),
        });
        self.commands.push(PassCommand::BindVertexStream {
            slot,
            buffer: buffer.id(),
            stride,
        });
        Ok(())
    }

    /// Bind `buffer` as the index stream
    ///
    /// # Panics
    ///
    /// Panics if the buffer is mapped.
    pub fn bind_index_stream(&mut self, buffer: &Buffer, format: ElementFormat) -> Result<()> {
        assert!(!buffer.is_mapped(), "index stream {:?} is mapped", buffer.id());
        if buffer.binding() != BufferBinding::Index {
            engine_bail!(SOURCE, InvalidOperation, "buffer {:?} is not an index buffer", buffer.id());
        }
        if !matches!(format, ElementFormat::R16_UINT | ElementFormat::R32_UINT) {
            engine_bail!(SOURCE, InvalidOperation, "{:?} is not an index format", format);
        }
        buffer.mark_used()?;

        self.index_stream = Some(StreamBinding {
            slot: 0,
            id: buffer.id(),
            buffer: Arc::downgrade(buffer.shared()),
        });
        self.commands.push(PassCommand::BindIndexStream {
            buffer: buffer.id(),
            format,
        });
        Ok(())
    }

    /// Draw with the bound streams into the current frame buffer
    ///
    /// UAVs attached to the frame buffer are bound for the draw like the UAV
    /// slots of a dispatch: counters restart at their initial value and the
    /// buffers are considered written.
    ///
    /// # Panics
    ///
    /// Panics if a bound stream or an attached UAV buffer is mapped.
    pub fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        if self.vertex_streams.is_empty() {
            engine_bail!(SOURCE, InvalidOperation, "draw without a vertex stream");
        }
        for stream in self.vertex_streams.iter().chain(self.index_stream.as_ref()) {
            let buffer = stream.buffer.upgrade().ok_or_else(|| {
                engine_err!(SOURCE, InvalidResource, "stream buffer {:?} was dropped", stream.id)
            })?;
            assert!(!buffer.is_mapped(), "draw reads stream {:?} while it is mapped", stream.id);
            buffer.prepare_gpu_use(None)?;
        }

        let target = self.cur_frame_buffer().clone();
        let mut written = Vec::new();
        for (slot, uav) in target.uav_attachments() {
            let buffer = uav.resolve()?;
            assert!(
                !buffer.is_mapped(),
                "draw into '{}' binds UAV slot {} while buffer {:?} is mapped",
                target.name(),
                slot,
                buffer.key()
            );
            buffer.prepare_gpu_use(uav.initial_counter())?;
            written.push(buffer);
        }

        lock_device(self.context.device())?.draw(vertex_count, first_vertex)?;
        target.mark_used();
        for buffer in &written {
            buffer.mark_written();
        }

        self.commands.push(PassCommand::Draw {
            target: target.name().to_string(),
            vertex_count,
            first_vertex,
        });
        Ok(())
    }
}

fn check_aliasing(technique: &Technique, views: &[&BufferView]) -> Result<()> {
    for (i, a) in views.iter().enumerate() {
        for b in &views[i + 1..] {
            if a.kind() != b.kind() && a.aliases(b) {
                engine_bail!(
                    SOURCE,
                    InvalidOperation,
                    "technique '{}' binds buffer {:?} as both SRV and UAV",
                    technique.name(),
                    a.buffer_id()
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "frame_scheduler_tests.rs"]
mod tests;
