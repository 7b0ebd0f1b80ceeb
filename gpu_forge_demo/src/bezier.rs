/// Simple Bezier - tessellation of bicubic patches
///
/// Each patch has 16 control points. The technique is picked from the
/// partition type and the wireframe switch; it evaluates the patch on a grid
/// whose resolution follows the `tessellation_factor` parameter, then the
/// frame clears the current frame buffer and draws the grid.

use glam::{Mat4, Vec3, Vec4};
use gpu_forge::forge::device::{AccessFlags, BufferUsage, ClearMask, ElementFormat};
use gpu_forge::forge::effect::{Effect, FnKernel, ResourceSlot, Technique};
use gpu_forge::forge::frame::FrameScheduler;
use gpu_forge::forge::resource::{Buffer, ShaderResourceView, UnorderedAccessView};
use gpu_forge::forge::{RenderContext, Result};
use gpu_forge::{engine_bail, engine_debug, engine_err};

use crate::compositor::{PassResult, SCENE_CLEAR_COLOR, SCENE_CLEAR_COLOR_GAMMA};

const SOURCE: &str = "demo::SimpleBezier";

/// Highest tessellation level of a patch edge
pub const MAX_TESS_FACTOR: u32 = 64;
/// Factor set when the sample starts
pub const DEFAULT_TESS_FACTOR: f32 = 8.0;

pub const CONTROL_POINTS_PER_PATCH: usize = 16;
/// Grid vertices reserved per patch at the highest level
pub const VERTICES_PER_PATCH: u64 = ((MAX_TESS_FACTOR + 1) * (MAX_TESS_FACTOR + 1)) as u64;

/// Control points, row by row. The first patch is flat, the second one is a
/// dome next to it.
const CONTROL_POINTS: [Vec3; 2 * CONTROL_POINTS_PER_PATCH] = [
    Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0),
    Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 0.0), Vec3::new(2.0, 1.0, 0.0), Vec3::new(3.0, 1.0, 0.0),
    Vec3::new(0.0, 2.0, 0.0), Vec3::new(1.0, 2.0, 0.0), Vec3::new(2.0, 2.0, 0.0), Vec3::new(3.0, 2.0, 0.0),
    Vec3::new(0.0, 3.0, 0.0), Vec3::new(1.0, 3.0, 0.0), Vec3::new(2.0, 3.0, 0.0), Vec3::new(3.0, 3.0, 0.0),
    Vec3::new(4.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0), Vec3::new(7.0, 0.0, 0.0),
    Vec3::new(4.0, 1.0, 0.0), Vec3::new(5.0, 1.0, 1.0), Vec3::new(6.0, 1.0, 1.0), Vec3::new(7.0, 1.0, 0.0),
    Vec3::new(4.0, 2.0, 0.0), Vec3::new(5.0, 2.0, 1.0), Vec3::new(6.0, 2.0, 1.0), Vec3::new(7.0, 2.0, 0.0),
    Vec3::new(4.0, 3.0, 0.0), Vec3::new(5.0, 3.0, 0.0), Vec3::new(6.0, 3.0, 0.0), Vec3::new(7.0, 3.0, 0.0),
];

/// How the tessellation factor is rounded to an edge level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionType {
    #[default]
    Integer,
    Even,
    Odd,
}

impl PartitionType {
    /// Partition at `index` in the selection list, `Integer` when out of range
    pub fn from_index(index: u32) -> Self {
        match index {
            1 => PartitionType::Even,
            2 => PartitionType::Odd,
            _ => PartitionType::Integer,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PartitionType::Integer => "Integer",
            PartitionType::Even => "Even",
            PartitionType::Odd => "Odd",
        }
    }

    /// Segments per patch edge for `factor`
    pub fn segments(self, factor: f32) -> u32 {
        let level = (factor.ceil() as u32).clamp(1, MAX_TESS_FACTOR);
        match self {
            PartitionType::Integer => level,
            PartitionType::Even => (level + level % 2).clamp(2, MAX_TESS_FACTOR),
            PartitionType::Odd => (level + 1 - level % 2).min(MAX_TESS_FACTOR - 1),
        }
    }
}

fn bernstein(t: f32) -> [f32; 4] {
    let s = 1.0 - t;
    [s * s * s, 3.0 * t * s * s, 3.0 * t * t * s, t * t * t]
}

/// Evaluates one patch per group on a `(n + 1) x (n + 1)` grid
fn tessellate_kernel(partition: PartitionType) -> FnKernel {
    FnKernel::new(
        vec![ResourceSlot::srv("control_points"), ResourceSlot::uav("tess_vertices")],
        [1, 1, 1],
        move |group, io| {
            let segments = partition.segments(io.uniform_f32("tessellation_factor")?);
            let patch = group[0] as u64;

            let mut points = [Vec4::ZERO; CONTROL_POINTS_PER_PATCH];
            io.load_vec4s("control_points", patch * CONTROL_POINTS_PER_PATCH as u64, &mut points)?;

            let step = 1.0 / segments as f32;
            let mut vertices = Vec::with_capacity(((segments + 1) * (segments + 1)) as usize);
            for j in 0..=segments {
                let bv = bernstein(j as f32 * step);
                for i in 0..=segments {
                    let bu = bernstein(i as f32 * step);
                    let mut position = Vec3::ZERO;
                    for (b, weight_v) in bv.iter().enumerate() {
                        for (a, weight_u) in bu.iter().enumerate() {
                            position += points[b * 4 + a].truncate() * (weight_u * weight_v);
                        }
                    }
                    vertices.push(position.extend(1.0));
                }
            }
            io.store_vec4s("tess_vertices", patch * VERTICES_PER_PATCH, &vertices)
        },
    )
}

fn technique_name(partition: PartitionType, wireframe: bool) -> String {
    if wireframe {
        format!("{}Wireframe", partition.name())
    } else {
        partition.name().to_string()
    }
}

// ============================================================================
// SAMPLE
// ============================================================================

pub struct SimpleBezier {
    effect: Effect,
    technique: Technique,
    control_points: Buffer,
    control_srv: ShaderResourceView,
    tess_vertices: Buffer,
    tess_uav: UnorderedAccessView,
    partition: PartitionType,
    tess_factor: f32,
    wireframe: bool,
    gamma: bool,
}

impl SimpleBezier {
    pub fn new(context: &RenderContext) -> Result<Self> {
        let mut effect = Effect::new("SimpleBezier");
        for partition in [PartitionType::Integer, PartitionType::Even, PartitionType::Odd] {
            for wireframe in [false, true] {
                let name = technique_name(partition, wireframe);
                effect.add_technique(Technique::new(&name, tessellate_kernel(partition)));
            }
        }

        let points: Vec<Vec4> = CONTROL_POINTS.iter().map(|point| point.extend(1.0)).collect();
        let control_points = context.make_vertex_buffer(
            BufferUsage::Static,
            AccessFlags::GPU_READ | AccessFlags::IMMUTABLE,
            (points.len() * 16) as u64,
            Some(bytemuck::cast_slice(&points)),
            16,
        )?;
        let control_srv = context.make_buffer_srv(&control_points, ElementFormat::R32G32B32A32_SFLOAT)?;

        let tess_vertices = context.make_vertex_buffer(
            BufferUsage::Static,
            AccessFlags::GPU_READ | AccessFlags::GPU_WRITE | AccessFlags::GPU_UNORDERED,
            Self::num_patches() as u64 * VERTICES_PER_PATCH * 16,
            None,
            16,
        )?;
        let tess_uav = context.make_buffer_uav(&tess_vertices, ElementFormat::R32G32B32A32_SFLOAT)?;

        effect.set_parameter("control_points", control_srv.clone());
        effect.set_parameter("tess_vertices", tess_uav.clone());
        effect.set_parameter("tessellation_factor", DEFAULT_TESS_FACTOR);
        let technique = find_technique(&effect, &technique_name(PartitionType::Integer, false))?;

        engine_debug!(SOURCE, "{} patches, technique '{}'", Self::num_patches(), technique.name());
        Ok(Self {
            effect,
            technique,
            control_points,
            control_srv,
            tess_vertices,
            tess_uav,
            partition: PartitionType::Integer,
            tess_factor: DEFAULT_TESS_FACTOR,
            wireframe: false,
            gamma: false,
        })
    }

    pub fn num_patches() -> u32 {
        (CONTROL_POINTS.len() / CONTROL_POINTS_PER_PATCH) as u32
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    pub fn technique(&self) -> &Technique {
        &self.technique
    }

    pub fn control_points(&self) -> &Buffer {
        &self.control_points
    }

    pub fn control_srv(&self) -> &ShaderResourceView {
        &self.control_srv
    }

    /// Tessellated grids, `VERTICES_PER_PATCH` vertices reserved per patch
    pub fn tess_vertices(&self) -> &Buffer {
        &self.tess_vertices
    }

    pub fn tess_uav(&self) -> &UnorderedAccessView {
        &self.tess_uav
    }

    pub fn partition_type(&self) -> PartitionType {
        self.partition
    }

    pub fn tessellation_factor(&self) -> f32 {
        self.tess_factor
    }

    pub fn is_wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn set_gamma(&mut self, gamma: bool) {
        self.gamma = gamma;
    }

    pub fn set_tessellation_factor(&mut self, factor: f32) -> Result<()> {
        if !factor.is_finite() || factor <= 0.0 {
            engine_bail!(SOURCE, InvalidOperation, "tessellation factor {} must be positive", factor);
        }
        self.tess_factor = factor;
        self.effect.set_parameter("tessellation_factor", factor);
        Ok(())
    }

    /// Select the partition at `index` of the partition list
    pub fn set_partition_type(&mut self, index: u32) -> Result<()> {
        self.partition = PartitionType::from_index(index);
        self.update_technique()
    }

    pub fn set_wireframe(&mut self, wireframe: bool) -> Result<()> {
        self.wireframe = wireframe;
        self.update_technique()
    }

    fn update_technique(&mut self) -> Result<()> {
        self.technique = find_technique(&self.effect, &technique_name(self.partition, self.wireframe))?;
        Ok(())
    }

    /// Segments per patch edge at the current factor and partition
    pub fn segments(&self) -> u32 {
        self.partition.segments(self.tess_factor)
    }

    /// Vertices drawn per frame: a triangle list, or a line list over the
    /// grid edges in wireframe mode
    pub fn vertex_count(&self) -> u32 {
        let n = self.segments();
        let per_patch = if self.wireframe { 4 * n * (n + 1) } else { 6 * n * n };
        per_patch * Self::num_patches()
    }

    /// Clear the current frame buffer, tessellate and draw the patches
    pub fn render_frame(&mut self, scheduler: &mut FrameScheduler, eye: Vec3, view_proj: Mat4) -> Result<PassResult> {
        self.effect.set_parameter("view_proj", view_proj);
        self.effect.set_parameter("camera_pos_world", eye.extend(1.0));

        let color = if self.gamma { SCENE_CLEAR_COLOR_GAMMA } else { SCENE_CLEAR_COLOR };
        scheduler.clear(ClearMask::COLOR | ClearMask::DEPTH, color, 1.0, 0)?;

        scheduler.dispatch(&self.effect, &self.technique, Self::num_patches(), 1, 1)?;
        scheduler.bind_vertex_stream(0, &self.tess_vertices, 16)?;
        scheduler.draw(self.vertex_count(), 0)?;

        Ok(PassResult {
            need_flush: true,
            finished: true,
        })
    }
}

fn find_technique(effect: &Effect, name: &str) -> Result<Technique> {
    effect
        .technique_by_name(name)
        .cloned()
        .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "effect '{}' has no technique '{}'", effect.name(), name))
}

#[cfg(test)]
#[path = "bezier_tests.rs"]
mod tests;
