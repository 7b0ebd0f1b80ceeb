/// Scene compositor - three-pass frame around the GPU particle system
///
/// Pass 0 renders the dissolving mesh into the scene buffer, which also
/// appends emit positions through the particle emit view. Pass 1 advances
/// the particles and renders them into the fog buffer. Pass 2 blends both
/// into the default frame buffer.

use glam::{Vec3, Vec4};
use gpu_forge::forge::device::{AccessFlags, BufferUsage, ClearMask, ElementFormat, FrameBufferDesc};
use gpu_forge::forge::frame::{FrameBuffer, FrameScheduler};
use gpu_forge::forge::resource::{Buffer, ShaderResourceView};
use gpu_forge::forge::{RenderContext, Result};
use gpu_forge::{engine_bail, engine_debug, engine_info};

use crate::particles::GpuParticleSystem;

const SOURCE: &str = "demo::Compositor";

pub const SCENE_CLEAR_COLOR: Vec4 = Vec4::new(0.2, 0.4, 0.6, 1.0);
/// Scene clear color when the output is gamma corrected
pub const SCENE_CLEAR_COLOR_GAMMA: Vec4 = Vec4::new(0.029, 0.133, 0.325, 1.0);
pub const FOG_CLEAR_COLOR: Vec4 = Vec4::ZERO;
pub const SCREEN_CLEAR_COLOR: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Dissolve threshold gained per second
pub const DISSOLVE_SPEED: f32 = 0.5;

const NUM_PARTICLES: u32 = 4096;
const NUM_EMITTERS: u32 = 16;

/// Corners of the dissolving box
const CUBE_CORNERS: [Vec3; 8] = [
    Vec3::new(0.5, -0.25, 0.25),
    Vec3::new(1.0, -0.25, 0.25),
    Vec3::new(1.0, -0.25, -0.25),
    Vec3::new(0.5, -0.25, -0.25),
    Vec3::new(0.5, 0.25, 0.25),
    Vec3::new(1.0, 0.25, 0.25),
    Vec3::new(1.0, 0.25, -0.25),
    Vec3::new(0.5, 0.25, -0.25),
];

/// Outcome of one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassResult {
    /// Work must be flushed before the next pass
    pub need_flush: bool,
    /// Last pass of the frame
    pub finished: bool,
}

pub struct SceneCompositor {
    context: RenderContext,
    scene_buffer: FrameBuffer,
    fog_buffer: FrameBuffer,
    particles: GpuParticleSystem,
    mesh: Buffer,
    mesh_srv: ShaderResourceView,
    quad: Buffer,
    dissolve_level: f32,
    gamma: bool,
}

impl SceneCompositor {
    /// Create the offscreen buffers at `width x height` and the particle system
    pub fn new(context: &RenderContext, width: u32, height: u32) -> Result<Self> {
        let (scene_buffer, fog_buffer) = make_offscreen(context, width, height)?;
        let particles = GpuParticleSystem::new(context, NUM_PARTICLES, NUM_EMITTERS)?;

        // Dissolves from the bottom up: the threshold is the height above y = -0.5
        let points: Vec<Vec4> = CUBE_CORNERS.iter().map(|corner| corner.extend(corner.y + 0.5)).collect();
        let mesh = context.make_vertex_buffer(
            BufferUsage::Static,
            AccessFlags::GPU_READ | AccessFlags::IMMUTABLE,
            (points.len() * 16) as u64,
            Some(bytemuck::cast_slice(&points)),
            16,
        )?;
        let mesh_srv = context.make_buffer_srv(&mesh, ElementFormat::R32G32B32A32_SFLOAT)?;

        let corners: [Vec4; 4] = [
            Vec4::new(-1.0, 1.0, 0.0, 1.0),
            Vec4::new(1.0, 1.0, 0.0, 1.0),
            Vec4::new(-1.0, -1.0, 0.0, 1.0),
            Vec4::new(1.0, -1.0, 0.0, 1.0),
        ];
        let quad = context.make_vertex_buffer(
            BufferUsage::Static,
            AccessFlags::GPU_READ | AccessFlags::IMMUTABLE,
            64,
            Some(bytemuck::cast_slice(&corners)),
            16,
        )?;

        engine_info!(SOURCE, "Compositor ready at {}x{}", width, height);
        Ok(Self {
            context: context.clone(),
            scene_buffer,
            fog_buffer,
            particles,
            mesh,
            mesh_srv,
            quad,
            dissolve_level: 0.0,
            gamma: false,
        })
    }

    pub fn scene_buffer(&self) -> &FrameBuffer {
        &self.scene_buffer
    }

    pub fn fog_buffer(&self) -> &FrameBuffer {
        &self.fog_buffer
    }

    pub fn particles(&self) -> &GpuParticleSystem {
        &self.particles
    }

    pub fn dissolve_level(&self) -> f32 {
        self.dissolve_level
    }

    /// Clear the scene with gamma-corrected colors
    pub fn set_gamma(&mut self, gamma: bool) {
        self.gamma = gamma;
    }

    /// Re-create the offscreen buffers for a new output size
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let (scene_buffer, fog_buffer) = make_offscreen(&self.context, width, height)?;
        self.scene_buffer = scene_buffer;
        self.fog_buffer = fog_buffer;
        engine_debug!(SOURCE, "Resized offscreen buffers to {}x{}", width, height);
        Ok(())
    }

    /// Run pass `pass` of the frame
    pub fn render_pass(&mut self, scheduler: &mut FrameScheduler, pass: u32, elapsed: f32) -> Result<PassResult> {
        match pass {
            0 => {
                scheduler.bind_frame_buffer(Some(&self.scene_buffer));
                let color = if self.gamma { SCENE_CLEAR_COLOR_GAMMA } else { SCENE_CLEAR_COLOR };
                scheduler.clear(ClearMask::COLOR | ClearMask::DEPTH, color, 1.0, 0)?;
                self.scene_buffer.attach_uav(0, self.particles.emit_uav().clone());

                // Mesh pass: the draw binds the emit view and restarts its
                // counter, then the dissolving corners are appended to it
                self.dissolve_level += elapsed * DISSOLVE_SPEED;
                scheduler.bind_vertex_stream(0, &self.mesh, 16)?;
                scheduler.draw(CUBE_CORNERS.len() as u32, 0)?;
                self.particles
                    .append_emitters(scheduler, &self.mesh_srv, self.dissolve_level)?;

                Ok(PassResult {
                    need_flush: true,
                    finished: false,
                })
            }
            1 => {
                self.particles.update(scheduler, elapsed)?;

                scheduler.bind_frame_buffer(Some(&self.fog_buffer));
                scheduler.clear(ClearMask::COLOR | ClearMask::DEPTH, FOG_CLEAR_COLOR, 1.0, 0)?;
                scheduler.bind_vertex_stream(0, self.particles.pos_buffer(), 16)?;
                scheduler.draw(self.particles.max_particles(), 0)?;

                Ok(PassResult {
                    need_flush: true,
                    finished: false,
                })
            }
            2 => {
                scheduler.bind_frame_buffer(None);
                scheduler.clear(ClearMask::COLOR | ClearMask::DEPTH, SCREEN_CLEAR_COLOR, 1.0, 0)?;

                // Full-screen blend of the scene and fog buffers
                scheduler.bind_vertex_stream(0, &self.quad, 16)?;
                scheduler.draw(4, 0)?;

                Ok(PassResult {
                    need_flush: true,
                    finished: true,
                })
            }
            _ => engine_bail!(SOURCE, InvalidOperation, "compositor has no pass {}", pass),
        }
    }

    /// Run every pass of one frame, returning the number of passes
    pub fn render_frame(&mut self, scheduler: &mut FrameScheduler, elapsed: f32) -> Result<u32> {
        let mut pass = 0;
        loop {
            let result = self.render_pass(scheduler, pass, elapsed)?;
            pass += 1;
            if result.finished {
                return Ok(pass);
            }
        }
    }
}

fn make_offscreen(context: &RenderContext, width: u32, height: u32) -> Result<(FrameBuffer, FrameBuffer)> {
    let scene = context.make_frame_buffer(FrameBufferDesc::new("scene", width, height))?;
    let fog = context.make_frame_buffer(FrameBufferDesc::new("fog", width, height))?;
    Ok((scene, fog))
}

#[cfg(test)]
#[path = "compositor_tests.rs"]
mod tests;
