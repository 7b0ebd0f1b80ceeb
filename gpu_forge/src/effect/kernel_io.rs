//! Kernel I/O - what a running kernel sees of its dispatch
//!
//! Uniforms come from the effect parameters; buffer slots are resolved and
//! validated by the scheduler before the first group runs. Element indices
//! are in units of the element type read or written.

use std::mem::size_of;
use std::sync::Arc;

use bytemuck::Pod;
use glam::{Mat4, Vec4};
use rustc_hash::FxHashMap;

use crate::effect::ParameterValue;
use crate::error::Result;
use crate::graphics_device::ElementFormat;
use crate::resource::{BufferShared, ViewKind};
use crate::{engine_bail, engine_err};

const SOURCE: &str = "forge::KernelIo";

/// Buffer slot resolved for one dispatch
pub(crate) struct BoundSlot {
    pub(crate) name: String,
    pub(crate) kind: ViewKind,
    pub(crate) format: ElementFormat,
    pub(crate) buffer: Arc<BufferShared>,
}

/// Uniform and buffer access for a running kernel
pub struct KernelIo<'a> {
    technique: &'a str,
    parameters: &'a FxHashMap<String, ParameterValue>,
    slots: Vec<BoundSlot>,
}

impl<'a> KernelIo<'a> {
    pub(crate) fn new(
        technique: &'a str,
        parameters: &'a FxHashMap<String, ParameterValue>,
        slots: Vec<BoundSlot>,
    ) -> Self {
        Self {
            technique,
            parameters,
            slots,
        }
    }

    /// Name of the running technique
    pub fn technique(&self) -> &str {
        self.technique
    }

    /// Number of UAV slots
    pub fn writable_slot_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.kind == ViewKind::UnorderedAccess)
            .count()
    }

    // ===== UNIFORMS =====

    fn parameter(&self, name: &str) -> Result<&ParameterValue> {
        self.parameters.get(name).ok_or_else(|| {
            engine_err!(SOURCE, InvalidResource, "technique '{}' reads unset parameter '{}'", self.technique, name)
        })
    }

    pub fn uniform_u32(&self, name: &str) -> Result<u32> {
        match self.parameter(name)? {
            ParameterValue::UInt(value) => Ok(*value),
            ParameterValue::Int(value) if *value >= 0 => Ok(*value as u32),
            other => Err(mismatch(self.technique, name, "uint", other)),
        }
    }

    pub fn uniform_i32(&self, name: &str) -> Result<i32> {
        match self.parameter(name)? {
            ParameterValue::Int(value) => Ok(*value),
            ParameterValue::UInt(value) if *value <= i32::MAX as u32 => Ok(*value as i32),
            other => Err(mismatch(self.technique, name, "int", other)),
        }
    }

    pub fn uniform_f32(&self, name: &str) -> Result<f32> {
        match self.parameter(name)? {
            ParameterValue::Float(value) => Ok(*value),
            other => Err(mismatch(self.technique, name, "float", other)),
        }
    }

    pub fn uniform_vec4(&self, name: &str) -> Result<Vec4> {
        match self.parameter(name)? {
            ParameterValue::Float4(value) => Ok(*value),
            other => Err(mismatch(self.technique, name, "float4", other)),
        }
    }

    pub fn uniform_mat4(&self, name: &str) -> Result<Mat4> {
        match self.parameter(name)? {
            ParameterValue::Float4x4(value) => Ok(*value),
            other => Err(mismatch(self.technique, name, "float4x4", other)),
        }
    }

    // ===== BUFFER SLOTS =====

    fn slot(&self, name: &str) -> Result<&BoundSlot> {
        match self.slots.iter().find(|slot| slot.name == name) {
            Some(slot) => Ok(slot),
            None => Err(engine_err!(SOURCE, InvalidResource, "technique '{}' declares no slot '{}'", self.technique, name)),
        }
    }

    fn writable_slot(&self, name: &str) -> Result<&BoundSlot> {
        let slot = self.slot(name)?;
        if slot.kind != ViewKind::UnorderedAccess {
            engine_bail!(SOURCE, InvalidOperation, "technique '{}' writes through read-only slot '{}'", self.technique, name);
        }
        Ok(slot)
    }

    /// Number of view-format elements in the slot's buffer
    pub fn slot_len(&self, name: &str) -> Result<u64> {
        let slot = self.slot(name)?;
        Ok(slot.buffer.size() / slot.format.size_bytes() as u64)
    }

    /// Read `out.len()` elements starting at element `first`
    pub fn load<T: Pod>(&self, name: &str, first: u64, out: &mut [T]) -> Result<()> {
        let slot = self.slot(name)?;
        slot.buffer
            .read_range(first * size_of::<T>() as u64, bytemuck::cast_slice_mut(out))
    }

    /// Write `data` starting at element `first` (UAV slots only)
    pub fn store<T: Pod>(&mut self, name: &str, first: u64, data: &[T]) -> Result<()> {
        let slot = self.writable_slot(name)?;
        slot.buffer
            .write_range(first * size_of::<T>() as u64, bytemuck::cast_slice(data))
    }

    pub fn load_u32s(&self, name: &str, first: u64, out: &mut [u32]) -> Result<()> {
        self.load(name, first, out)
    }

    pub fn store_u32s(&mut self, name: &str, first: u64, data: &[u32]) -> Result<()> {
        self.store(name, first, data)
    }

    pub fn load_vec4s(&self, name: &str, first: u64, out: &mut [Vec4]) -> Result<()> {
        self.load(name, first, out)
    }

    pub fn store_vec4s(&mut self, name: &str, first: u64, data: &[Vec4]) -> Result<()> {
        self.store(name, first, data)
    }

    /// Bump the hidden counter of a UAV slot, returning the previous value
    pub fn increment_counter(&mut self, name: &str) -> Result<u32> {
        self.writable_slot(name)?.buffer.increment_counter()
    }

    /// Current counter value of a slot
    pub fn counter(&self, name: &str) -> Result<u32> {
        Ok(self.slot(name)?.buffer.counter())
    }
}

fn mismatch(technique: &str, name: &str, expected: &str, found: &ParameterValue) -> crate::error::Error {
    engine_err!(
        SOURCE,
        InvalidOperation,
        "technique '{}' reads '{}' as {}, parameter holds {}",
        technique,
        name,
        expected,
        found.type_name()
    )
}
