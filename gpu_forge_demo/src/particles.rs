/// GPU particles - compute-driven particle positions fed by an append buffer
///
/// Every particle is one `Vec4` (xyz position, w remaining life). Dead
/// particles (`w <= 0`) are respawned on the CPU at the positions appended
/// by the mesh pass, then the `Update` kernel advances the living ones.

use gpu_forge::forge::device::{AccessFlags, BufferAccess, BufferDesc, BufferUsage, ClearMask, ElementFormat};
use gpu_forge::forge::effect::{Effect, FnKernel, ResourceSlot, Technique};
use gpu_forge::forge::frame::FrameScheduler;
use gpu_forge::forge::resource::{Buffer, ShaderResourceView, UnorderedAccessView};
use gpu_forge::forge::{RenderContext, Result};
use glam::Vec4;
use gpu_forge::{engine_bail, engine_debug, engine_err, engine_trace};

const SOURCE: &str = "demo::GpuParticles";

const UPDATE_GROUP_SIZE: u32 = 256;
const APPEND_GROUP_SIZE: u32 = 64;

/// Seconds between two CPU emissions
pub const EMIT_INTERVAL: f32 = 0.05;
/// Life given to a respawned particle
pub const SPAWN_LIFE: f32 = 8.0;
/// Vertical speed of living particles
pub const PARTICLE_VELOCITY: f32 = -2.0;

/// Position of a particle that has never been emitted
pub const DEAD_PARTICLE: Vec4 = Vec4::new(0.0, 0.0, 0.0, -1.0);

// ===== KERNELS =====

fn update_kernel() -> FnKernel {
    FnKernel::new(
        vec![ResourceSlot::uav("particle_pos_rw_buff")],
        [UPDATE_GROUP_SIZE, 1, 1],
        |group, io| {
            let elapsed = io.uniform_f32("elapse_time")?;
            let velocity = io.uniform_f32("particle_velocity")?;
            let count = io.slot_len("particle_pos_rw_buff")?;

            let first = (group[0] * UPDATE_GROUP_SIZE) as u64;
            if first >= count {
                return Ok(());
            }
            let len = (count - first).min(UPDATE_GROUP_SIZE as u64) as usize;
            let mut particles = vec![Vec4::ZERO; len];
            io.load_vec4s("particle_pos_rw_buff", first, &mut particles)?;
            for particle in particles.iter_mut().filter(|p| p.w > 0.0) {
                particle.y += velocity * elapsed;
                particle.w -= elapsed;
            }
            io.store_vec4s("particle_pos_rw_buff", first, &particles)
        },
    )
}

/// Appends every mesh point whose dissolve threshold is below `dissolve_level`
fn append_kernel() -> FnKernel {
    FnKernel::new(
        vec![ResourceSlot::srv("mesh_points"), ResourceSlot::uav("particle_emit_buff")],
        [APPEND_GROUP_SIZE, 1, 1],
        |group, io| {
            let level = io.uniform_f32("dissolve_level")?;
            let count = io.slot_len("mesh_points")?;
            let capacity = io.slot_len("particle_emit_buff")?;

            let first = (group[0] * APPEND_GROUP_SIZE) as u64;
            if first >= count {
                return Ok(());
            }
            let len = (count - first).min(APPEND_GROUP_SIZE as u64) as usize;
            let mut points = vec![Vec4::ZERO; len];
            io.load_vec4s("mesh_points", first, &mut points)?;
            for point in points.iter().filter(|p| p.w < level) {
                let slot = io.increment_counter("particle_emit_buff")? as u64;
                if slot < capacity {
                    io.store_vec4s("particle_emit_buff", slot, &[point.truncate().extend(1.0)])?;
                }
            }
            Ok(())
        },
    )
}

// ============================================================================
// PARTICLE SYSTEM
// ============================================================================

pub struct GpuParticleSystem {
    effect: Effect,
    update: Technique,
    append: Technique,
    max_particles: u32,
    max_emitters: u32,
    pos_buffer: Buffer,
    pos_srv: ShaderResourceView,
    pos_uav: UnorderedAccessView,
    emit_buffer: Buffer,
    emit_uav: UnorderedAccessView,
    pos_staging: Buffer,
    emit_staging: Buffer,
    particles: Vec<Vec4>,
    accumulate_time: f32,
    emissions: u32,
}

impl GpuParticleSystem {
    /// Create the position, emit and staging buffers for `max_particles`
    /// particles, respawning at most `max_emitters` of them per emission
    pub fn new(context: &RenderContext, max_particles: u32, max_emitters: u32) -> Result<Self> {
        if max_particles == 0 {
            engine_bail!(SOURCE, InvalidOperation, "particle system needs at least one particle");
        }

        let effect = Effect::new("GpuParticles")
            .with_technique(Technique::new("Update", update_kernel()))
            .with_technique(Technique::new("Append", append_kernel()));
        let update = find_technique(&effect, "Update")?;
        let append = find_technique(&effect, "Append")?;

        let particles = vec![DEAD_PARTICLE; max_particles as usize];
        let size = max_particles as u64 * 16;
        let gpu_rw = AccessFlags::GPU_READ | AccessFlags::GPU_WRITE | AccessFlags::GPU_UNORDERED;

        let pos_buffer = context.create_buffer(
            BufferDesc::new(BufferUsage::Dynamic, gpu_rw, size)
                .with_stride(16)
                .with_mirror(),
            Some(bytemuck::cast_slice(&particles)),
        )?;
        let pos_srv = context.make_buffer_srv(&pos_buffer, ElementFormat::R32G32B32A32_SFLOAT)?;
        let pos_uav = context.make_buffer_uav(&pos_buffer, ElementFormat::R32G32B32A32_SFLOAT)?;

        let emit_buffer = context.create_buffer(
            BufferDesc::new(
                BufferUsage::Dynamic,
                gpu_rw | AccessFlags::GPU_STRUCTURED | AccessFlags::COUNTER,
                size,
            )
            .with_stride(16),
            Some(bytemuck::cast_slice(&particles)),
        )?;
        let emit_uav = context.make_buffer_uav_with_counter(&emit_buffer, ElementFormat::R32G32B32A32_SFLOAT, 0)?;

        let staging = || {
            context.create_buffer(
                BufferDesc::new(BufferUsage::Dynamic, AccessFlags::CPU_READ, size).with_stride(16),
                None,
            )
        };
        let pos_staging = staging()?;
        let emit_staging = staging()?;

        engine_debug!(SOURCE, "Particle system with {} particles, {} emitters", max_particles, max_emitters);
        Ok(Self {
            effect,
            update,
            append,
            max_particles,
            max_emitters,
            pos_buffer,
            pos_srv,
            pos_uav,
            emit_buffer,
            emit_uav,
            pos_staging,
            emit_staging,
            particles,
            accumulate_time: 0.0,
            emissions: 0,
        })
    }

    pub fn max_particles(&self) -> u32 {
        self.max_particles
    }

    pub fn pos_buffer(&self) -> &Buffer {
        &self.pos_buffer
    }

    pub fn pos_srv(&self) -> &ShaderResourceView {
        &self.pos_srv
    }

    /// Append view the mesh pass writes emit positions through
    pub fn emit_uav(&self) -> &UnorderedAccessView {
        &self.emit_uav
    }

    /// Positions appended since the emit view was last bound
    pub fn emitted_count(&self) -> u32 {
        self.emit_buffer.counter()
    }

    /// Number of CPU emissions so far
    pub fn emissions(&self) -> u32 {
        self.emissions
    }

    /// Append the points of `mesh_points` that dissolve below `dissolve_level`
    ///
    /// Binding the emit view restarts the append counter at zero.
    pub fn append_emitters(
        &mut self,
        scheduler: &mut FrameScheduler,
        mesh_points: &ShaderResourceView,
        dissolve_level: f32,
    ) -> Result<()> {
        let count = mesh_points.element_count()? as u32;
        self.effect.set_parameter("mesh_points", mesh_points.clone());
        self.effect.set_parameter("particle_emit_buff", self.emit_uav.clone());
        self.effect.set_parameter("dissolve_level", dissolve_level);
        scheduler.dispatch(&self.effect, &self.append, count.div_ceil(APPEND_GROUP_SIZE).max(1), 1, 1)
    }

    /// Advance the simulation by `elapsed_time` seconds
    pub fn update(&mut self, scheduler: &mut FrameScheduler, elapsed_time: f32) -> Result<()> {
        self.auto_emit(scheduler, elapsed_time)?;

        scheduler.bind_frame_buffer(None);
        scheduler.discard(ClearMask::COLOR)?;

        self.effect.set_parameter("elapse_time", elapsed_time);
        self.effect.set_parameter("particle_velocity", PARTICLE_VELOCITY);
        self.effect.set_parameter("particle_pos_rw_buff", self.pos_uav.clone());
        self.effect.set_parameter("particle_emit_buff", self.emit_uav.clone());
        scheduler.dispatch(
            &self.effect,
            &self.update,
            self.max_particles.div_ceil(UPDATE_GROUP_SIZE),
            1,
            1,
        )
    }

    /// Respawn dead particles at the appended emit positions every
    /// `EMIT_INTERVAL` seconds
    fn auto_emit(&mut self, scheduler: &mut FrameScheduler, elapsed_time: f32) -> Result<()> {
        self.accumulate_time += elapsed_time;
        if self.accumulate_time < EMIT_INTERVAL {
            return Ok(());
        }
        self.accumulate_time -= EMIT_INTERVAL;

        let sources = self.emit_positions(scheduler)?;
        if sources.is_empty() {
            return Ok(());
        }

        scheduler.copy_buffer(&self.pos_buffer, &self.pos_staging)?;
        let current = {
            let mapper = self.pos_staging.map(BufferAccess::ReadOnly)?;
            mapper.read_as::<Vec4>()
        };

        let mut sources = sources.iter();
        let mut spawned = 0;
        for (particle, gpu) in self.particles.iter_mut().zip(current) {
            let source = if gpu.w <= 0.0 { sources.next() } else { None };
            *particle = match source {
                Some(source) => {
                    spawned += 1;
                    source.truncate().extend(SPAWN_LIFE)
                }
                None => gpu,
            };
        }

        self.pos_buffer.update_subresource(0, bytemuck::cast_slice(&self.particles))?;
        self.emissions += 1;
        engine_trace!(SOURCE, "Emission {} respawned {} particles", self.emissions, spawned);
        Ok(())
    }

    fn emit_positions(&self, scheduler: &mut FrameScheduler) -> Result<Vec<Vec4>> {
        let available = self.emitted_count().min(self.max_particles).min(self.max_emitters) as usize;
        if available == 0 {
            return Ok(Vec::new());
        }
        scheduler.copy_buffer(&self.emit_buffer, &self.emit_staging)?;
        let mapper = self.emit_staging.map(BufferAccess::ReadOnly)?;
        let mut positions = mapper.read_as::<Vec4>();
        positions.truncate(available);
        Ok(positions)
    }

    /// Copy the particle positions back to the CPU
    pub fn read_particles(&self, scheduler: &mut FrameScheduler) -> Result<Vec<Vec4>> {
        scheduler.copy_buffer(&self.pos_buffer, &self.pos_staging)?;
        let mapper = self.pos_staging.map(BufferAccess::ReadOnly)?;
        let particles = mapper.read_as::<Vec4>();
        Ok(particles)
    }

    /// Number of particles with remaining life
    pub fn live_count(&self, scheduler: &mut FrameScheduler) -> Result<usize> {
        Ok(self.read_particles(scheduler)?.iter().filter(|p| p.w > 0.0).count())
    }
}

fn find_technique(effect: &Effect, name: &str) -> Result<Technique> {
    effect
        .technique_by_name(name)
        .cloned()
        .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "effect '{}' has no technique '{}'", effect.name(), name))
}

#[cfg(test)]
#[path = "particles_tests.rs"]
mod tests;
