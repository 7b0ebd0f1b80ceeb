//! Bitonic sort - sorts `u32` keys with compute passes over two ping-pong buffers
//!
//! The keys are viewed as a `height x 512` matrix. Levels up to the block
//! size are sorted inside each row; larger levels transpose the matrix,
//! sort the columns as rows, transpose back and sort the rows again. The
//! result is copied into a CPU-readable staging buffer and mapped.

use gpu_forge::forge::device::{AccessFlags, BufferAccess, BufferUsage, ElementFormat};
use gpu_forge::forge::effect::{Effect, FnKernel, ResourceSlot, Technique};
use gpu_forge::forge::frame::FrameScheduler;
use gpu_forge::forge::lifecycle::DeviceResourceListener;
use gpu_forge::forge::resource::{Buffer, ShaderResourceView, UnorderedAccessView};
use gpu_forge::forge::{RenderContext, Result};
use gpu_forge::{engine_bail, engine_debug, engine_err, engine_info};

const SOURCE: &str = "demo::BitonicSort";

/// Keys sorted by one thread group
pub const BITONIC_BLOCK_SIZE: u32 = 512;
/// Tile edge of the transpose kernel
pub const TRANSPOSE_BLOCK_SIZE: u32 = 16;
/// Smallest supported key count
pub const MIN_ELEMENTS: u32 = BITONIC_BLOCK_SIZE * TRANSPOSE_BLOCK_SIZE;
/// Largest supported key count
pub const MAX_ELEMENTS: u32 = BITONIC_BLOCK_SIZE * BITONIC_BLOCK_SIZE;

// ============================================================================
// KERNELS
// ============================================================================

/// One merge step per level over a 512-key block of `Data`
fn bitonic_kernel() -> FnKernel {
    FnKernel::new(
        vec![ResourceSlot::uav("Data")],
        [BITONIC_BLOCK_SIZE, 1, 1],
        |group, io| {
            let level = io.uniform_u32("g_iLevel")?;
            let level_mask = io.uniform_u32("g_iLevelMask")?;
            let base = group[0] * BITONIC_BLOCK_SIZE;

            let mut shared = vec![0u32; BITONIC_BLOCK_SIZE as usize];
            let mut next = vec![0u32; BITONIC_BLOCK_SIZE as usize];
            io.load_u32s("Data", base as u64, &mut shared)?;

            let mut j = level >> 1;
            while j > 0 {
                for gi in 0..BITONIC_BLOCK_SIZE {
                    let ascending = shared[(gi & !j) as usize] <= shared[(gi | j) as usize];
                    let take_partner = ascending == ((level_mask & (base + gi)) != 0);
                    next[gi as usize] = if take_partner {
                        shared[(gi ^ j) as usize]
                    } else {
                        shared[gi as usize]
                    };
                }
                std::mem::swap(&mut shared, &mut next);
                j >>= 1;
            }

            io.store_u32s("Data", base as u64, &shared)
        },
    )
}

/// `Data[c * g_iHeight + r] = Input[r * g_iWidth + c]`, one 16x16 tile per group
fn transpose_kernel() -> FnKernel {
    const TILE: usize = TRANSPOSE_BLOCK_SIZE as usize;
    FnKernel::new(
        vec![ResourceSlot::srv("Input"), ResourceSlot::uav("Data")],
        [TRANSPOSE_BLOCK_SIZE, TRANSPOSE_BLOCK_SIZE, 1],
        |group, io| {
            let width = io.uniform_u32("g_iWidth")? as u64;
            let height = io.uniform_u32("g_iHeight")? as u64;
            let first_col = (group[0] * TRANSPOSE_BLOCK_SIZE) as u64;
            let first_row = (group[1] * TRANSPOSE_BLOCK_SIZE) as u64;

            let mut tile = [[0u32; TILE]; TILE];
            for (r, row) in tile.iter_mut().enumerate() {
                io.load_u32s("Input", (first_row + r as u64) * width + first_col, row)?;
            }
            for c in 0..TILE {
                let column: [u32; TILE] = std::array::from_fn(|r| tile[r][c]);
                io.store_u32s("Data", (first_col + c as u64) * height + first_row, &column)?;
            }
            Ok(())
        },
    )
}

/// Effect holding the `Bitonic` and `Transpose` techniques
pub fn make_sort_effect() -> Effect {
    Effect::new("BitonicSort")
        .with_technique(Technique::new("Bitonic", bitonic_kernel()))
        .with_technique(Technique::new("Transpose", transpose_kernel()))
}

fn technique(effect: &Effect, name: &str) -> Result<Technique> {
    effect
        .technique_by_name(name)
        .cloned()
        .ok_or_else(|| engine_err!(SOURCE, InvalidResource, "effect '{}' has no technique '{}'", effect.name(), name))
}

// ============================================================================
// SORTER
// ============================================================================

/// GPU sorter for a fixed number of `u32` keys
pub struct BitonicSorter {
    effect: Effect,
    bitonic: Technique,
    transpose: Technique,
    num_elements: u32,
    matrix_width: u32,
    matrix_height: u32,
    buffers: [Buffer; 2],
    srvs: [ShaderResourceView; 2],
    uavs: [UnorderedAccessView; 2],
    readback: Buffer,
    input: Vec<u32>,
    results: Vec<u32>,
    data_lost: bool,
}

impl BitonicSorter {
    /// Create the ping-pong buffers, their views and the staging buffer
    ///
    /// `num_elements` must be `512 * h` with `h` a power of two between 16
    /// and 512.
    pub fn new(context: &RenderContext, num_elements: u32) -> Result<Self> {
        if !(MIN_ELEMENTS..=MAX_ELEMENTS).contains(&num_elements) || !num_elements.is_power_of_two() {
            engine_bail!(
                SOURCE,
                InvalidOperation,
                "cannot sort {} keys (power of two between {} and {} required)",
                num_elements,
                MIN_ELEMENTS,
                MAX_ELEMENTS
            );
        }

        let effect = make_sort_effect();
        let bitonic = technique(&effect, "Bitonic")?;
        let transpose = technique(&effect, "Transpose")?;

        let access = AccessFlags::GPU_READ
            | AccessFlags::GPU_WRITE
            | AccessFlags::GPU_UNORDERED
            | AccessFlags::GPU_STRUCTURED;
        let size = num_elements as u64 * 4;
        let buffers = [
            context.make_vertex_buffer(BufferUsage::Dynamic, access, size, None, 4)?,
            context.make_vertex_buffer(BufferUsage::Dynamic, access, size, None, 4)?,
        ];
        let srvs = [
            context.make_buffer_srv(&buffers[0], ElementFormat::R32_UINT)?,
            context.make_buffer_srv(&buffers[1], ElementFormat::R32_UINT)?,
        ];
        let uavs = [
            context.make_buffer_uav(&buffers[0], ElementFormat::R32_UINT)?,
            context.make_buffer_uav(&buffers[1], ElementFormat::R32_UINT)?,
        ];
        let readback = context.make_vertex_buffer(BufferUsage::Dynamic, AccessFlags::CPU_READ, size, None, 0)?;

        engine_info!(SOURCE, "Bitonic sorter ready for {} keys", num_elements);
        Ok(Self {
            effect,
            bitonic,
            transpose,
            num_elements,
            matrix_width: BITONIC_BLOCK_SIZE,
            matrix_height: num_elements / BITONIC_BLOCK_SIZE,
            buffers,
            srvs,
            uavs,
            readback,
            input: Vec::new(),
            results: Vec::new(),
            data_lost: false,
        })
    }

    pub fn num_elements(&self) -> u32 {
        self.num_elements
    }

    /// Keys from the last completed sort
    pub fn results(&self) -> &[u32] {
        &self.results
    }

    /// Whether a device loss destroyed the keys since the last sort
    pub fn is_data_lost(&self) -> bool {
        self.data_lost
    }

    /// Upload `keys`, sort them on the device and read the result back
    pub fn sort(&mut self, scheduler: &mut FrameScheduler, keys: &[u32]) -> Result<&[u32]> {
        if keys.len() != self.num_elements as usize {
            engine_bail!(
                SOURCE,
                SizeMismatch,
                "sorter holds {} keys, got {}",
                self.num_elements,
                keys.len()
            );
        }
        self.input.clear();
        self.input.extend_from_slice(keys);
        self.run(scheduler)?;
        Ok(&self.results)
    }

    fn set_constants(&mut self, level: u32, level_mask: u32, width: u32, height: u32) {
        self.effect.set_parameter("g_iLevel", level);
        self.effect.set_parameter("g_iLevelMask", level_mask);
        self.effect.set_parameter("g_iWidth", width);
        self.effect.set_parameter("g_iHeight", height);
    }

    fn run(&mut self, scheduler: &mut FrameScheduler) -> Result<()> {
        let (width, height) = (self.matrix_width, self.matrix_height);
        let groups = self.num_elements / BITONIC_BLOCK_SIZE;

        self.buffers[0].update_subresource(0, bytemuck::cast_slice(&self.input))?;

        // Sort the rows for the levels up to the block size
        let mut level = 2;
        while level <= BITONIC_BLOCK_SIZE {
            self.set_constants(level, level, height, width);
            self.effect.set_parameter("Data", self.uavs[0].clone());
            scheduler.dispatch(&self.effect, &self.bitonic, groups, 1, 1)?;
            level *= 2;
        }

        // Transpose, sort the columns, transpose back, sort the rows
        let mut level = BITONIC_BLOCK_SIZE * 2;
        while level <= self.num_elements {
            self.set_constants(
                level / BITONIC_BLOCK_SIZE,
                (level & !self.num_elements) / BITONIC_BLOCK_SIZE,
                width,
                height,
            );
            self.effect.set_parameter("Data", self.uavs[1].clone());
            self.effect.set_parameter("Input", self.srvs[0].clone());
            scheduler.dispatch(
                &self.effect,
                &self.transpose,
                width / TRANSPOSE_BLOCK_SIZE,
                height / TRANSPOSE_BLOCK_SIZE,
                1,
            )?;
            scheduler.dispatch(&self.effect, &self.bitonic, groups, 1, 1)?;

            self.set_constants(BITONIC_BLOCK_SIZE, level, height, width);
            self.effect.set_parameter("Data", self.uavs[0].clone());
            self.effect.set_parameter("Input", self.srvs[1].clone());
            scheduler.dispatch(
                &self.effect,
                &self.transpose,
                height / TRANSPOSE_BLOCK_SIZE,
                width / TRANSPOSE_BLOCK_SIZE,
                1,
            )?;
            scheduler.dispatch(&self.effect, &self.bitonic, groups, 1, 1)?;
            level *= 2;
        }

        scheduler.copy_buffer(&self.buffers[0], &self.readback)?;
        {
            let mapper = self.readback.map(BufferAccess::ReadOnly)?;
            self.results = mapper.read_as::<u32>();
        }
        self.data_lost = false;
        engine_debug!(SOURCE, "Sorted {} keys", self.num_elements);
        Ok(())
    }
}

impl DeviceResourceListener for BitonicSorter {
    fn on_lost_device(&mut self) {
        self.data_lost = true;
    }

    /// The ping-pong buffers keep no mirror: upload the last keys again
    fn on_reset_device(&mut self, scheduler: &mut FrameScheduler) -> Result<()> {
        if self.input.is_empty() {
            return Ok(());
        }
        self.run(scheduler)
    }
}

#[cfg(test)]
#[path = "bitonic_sort_tests.rs"]
mod tests;
