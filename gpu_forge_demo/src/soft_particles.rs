/// Soft particles - CPU-simulated smoke uploaded every frame
///
/// Particles are emitted round-robin at a fixed rate, slowed down as they
/// age and sorted back-to-front along the view direction before the vertex
/// and index buffers are refreshed with `update_subresource`.

use bytemuck::{Pod, Zeroable};
use gpu_forge::forge::device::{AccessFlags, BufferUsage, ElementFormat};
use gpu_forge::forge::frame::FrameScheduler;
use gpu_forge::forge::resource::Buffer;
use gpu_forge::forge::{RenderContext, Result};
use glam::Vec3;
use gpu_forge::{engine_bail, engine_debug};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdst::{RadixKey, RadixSort};

const SOURCE: &str = "demo::SoftParticles";

pub const MAX_PARTICLES: usize = 500;

/// Where every particle is born
pub const EMIT_POSITION: Vec3 = Vec3::new(0.0, 0.7, 3.0);

/// Life of a particle that is not simulated
const DEAD_LIFE: f32 = -1.0;

/// One particle as laid out in the vertex buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    pub pos: Vec3,
    pub vel: Vec3,
    /// Normalized age in `[0, 1)`, negative when dead
    pub life: f32,
    pub size: f32,
}

impl ParticleVertex {
    pub fn is_alive(&self) -> bool {
        self.life > DEAD_LIFE
    }
}

/// Simulation settings
#[derive(Debug, Clone, PartialEq)]
pub struct SoftParticlesConfig {
    /// Seconds a particle lives
    pub life_span: f32,
    /// Seconds between two emissions
    pub emit_rate: f32,
    /// Initial speed
    pub velocity: f32,
    pub min_size: f32,
    pub max_size: f32,
    /// Volume rendering: a third of the particles, 1.5x larger
    pub volume: bool,
    /// Seed of the emission jitter
    pub seed: u64,
}

impl Default for SoftParticlesConfig {
    fn default() -> Self {
        Self {
            life_span: 5.0,
            emit_rate: 0.015,
            velocity: 3.0,
            min_size: 1.0,
            max_size: 1.25,
            volume: false,
            seed: 0x5eed,
        }
    }
}

/// Particle index keyed by descending view depth
#[derive(Debug, Clone, Copy)]
struct DepthKey {
    key: u32,
    index: u32,
}

impl DepthKey {
    fn new(depth: f32, index: u32) -> Self {
        Self {
            key: !ordered_bits(depth),
            index,
        }
    }
}

impl RadixKey for DepthKey {
    const LEVELS: usize = 4;

    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        (self.key >> (level * 8)) as u8
    }
}

/// Map an `f32` to a `u32` with the same ordering
fn ordered_bits(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

// ============================================================================
// SOFT PARTICLES
// ============================================================================

pub struct SoftParticles {
    config: SoftParticlesConfig,
    particles: Vec<ParticleVertex>,
    indices: Vec<u32>,
    keys: Vec<DepthKey>,
    rng: StdRng,
    last_emit_time: f64,
    next_emitted: usize,
    animate: bool,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
}

impl SoftParticles {
    pub fn new(context: &RenderContext, config: SoftParticlesConfig) -> Result<Self> {
        if config.emit_rate <= 0.0 || config.life_span <= 0.0 {
            engine_bail!(
                SOURCE,
                InvalidOperation,
                "emit rate {} and life span {} must be positive",
                config.emit_rate,
                config.life_span
            );
        }

        let vertex_size = std::mem::size_of::<ParticleVertex>();
        let vertex_buffer = context.make_vertex_buffer(
            BufferUsage::Dynamic,
            AccessFlags::GPU_READ,
            (MAX_PARTICLES * vertex_size) as u64,
            None,
            vertex_size as u32,
        )?;
        let index_buffer = context.make_index_buffer(
            BufferUsage::Dynamic,
            AccessFlags::GPU_READ,
            (MAX_PARTICLES * 4) as u64,
            None,
            4,
        )?;

        let dead = ParticleVertex {
            life: DEAD_LIFE,
            ..ParticleVertex::zeroed()
        };
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            particles: vec![dead; MAX_PARTICLES],
            indices: (0..MAX_PARTICLES as u32).collect(),
            keys: Vec::with_capacity(MAX_PARTICLES),
            last_emit_time: 0.0,
            next_emitted: 0,
            animate: true,
            vertex_buffer,
            index_buffer,
        })
    }

    pub fn particles(&self) -> &[ParticleVertex] {
        &self.particles
    }

    /// Draw order from the last sort, farthest first
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn alive_count(&self) -> usize {
        self.particles.iter().filter(|p| p.is_alive()).count()
    }

    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    /// Pause or resume the simulation
    pub fn set_animate(&mut self, animate: bool) {
        self.animate = animate;
    }

    fn emit_rate(&self) -> f32 {
        if self.config.volume {
            self.config.emit_rate * 3.0
        } else {
            self.config.emit_rate
        }
    }

    fn size_range(&self) -> (f32, f32) {
        let scale = if self.config.volume { 1.5 } else { 1.0 };
        (self.config.min_size * scale, self.config.max_size * scale)
    }

    /// Uniform in `[-1, 1)`
    fn jitter(&mut self) -> f32 {
        self.rng.gen_range(-1.0..1.0)
    }

    fn emit(&mut self, index: usize) {
        let direction = Vec3::new(1.0, 0.3 * self.jitter(), 0.3 * self.jitter()).normalize();
        self.particles[index] = ParticleVertex {
            pos: EMIT_POSITION,
            vel: direction * self.config.velocity,
            life: 0.0,
            size: 0.0,
        };
    }

    /// Emit the particles due since the last emission and age every living one
    pub fn advance(&mut self, time: f64, elapsed: f32) {
        if !self.animate {
            self.last_emit_time = time;
            return;
        }

        let due = ((time - self.last_emit_time) / self.emit_rate() as f64) as usize;
        if due > 0 {
            for _ in 0..due {
                self.emit(self.next_emitted);
                self.next_emitted = (self.next_emitted + 1) % MAX_PARTICLES;
            }
            self.last_emit_time = time;
        }

        let (min_size, max_size) = self.size_range();
        let life_span = self.config.life_span;
        for particle in self.particles.iter_mut().filter(|p| p.is_alive()) {
            let life_sq = particle.life * particle.life;
            // Slow down by half with age, drift upwards
            let mut vel = particle.vel * (1.0 - 0.5 * life_sq);
            vel.y += 0.5;

            particle.pos += vel * elapsed;
            particle.life += elapsed / life_span;
            particle.size = min_size + (max_size - min_size) * particle.life;
            if particle.life > 0.99 {
                particle.life = DEAD_LIFE;
            }
        }
    }

    /// Order the particles back-to-front along `dir` (normalized) seen from `eye`
    pub fn sort(&mut self, eye: Vec3, dir: Vec3) {
        self.keys.clear();
        self.keys.extend(
            self.particles
                .iter()
                .enumerate()
                .map(|(i, particle)| DepthKey::new(dir.dot(particle.pos - eye), i as u32)),
        );
        self.keys.radix_sort_unstable();

        self.indices.clear();
        self.indices.extend(self.keys.iter().map(|key| key.index));
    }

    /// Push the particles and the sorted indices to the GPU buffers
    pub fn upload(&self) -> Result<()> {
        self.vertex_buffer.update_subresource(0, bytemuck::cast_slice(&self.particles))?;
        self.index_buffer.update_subresource(0, bytemuck::cast_slice(&self.indices))
    }

    /// Simulate, sort, upload and draw one frame into the current frame buffer
    pub fn render(&mut self, scheduler: &mut FrameScheduler, time: f64, elapsed: f32, eye: Vec3, look_at: Vec3) -> Result<()> {
        self.advance(time, elapsed);
        self.sort(eye, (look_at - eye).normalize_or_zero());
        self.upload()?;

        scheduler.bind_vertex_stream(0, &self.vertex_buffer, std::mem::size_of::<ParticleVertex>() as u32)?;
        scheduler.bind_index_stream(&self.index_buffer, ElementFormat::R32_UINT)?;
        scheduler.draw(MAX_PARTICLES as u32, 0)?;

        engine_debug!(SOURCE, "Drew {} live particles", self.alive_count());
        Ok(())
    }
}

#[cfg(test)]
#[path = "soft_particles_tests.rs"]
mod tests;
