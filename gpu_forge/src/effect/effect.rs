/// Effect - named parameters and techniques of a compute program

use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Vec4};
use rustc_hash::FxHashMap;

use crate::effect::ComputeKernel;
use crate::resource::{ShaderResourceView, UnorderedAccessView};

/// Value bound to an effect parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    UInt(u32),
    Int(i32),
    Float(f32),
    Float4(Vec4),
    Float4x4(Mat4),
    Srv(ShaderResourceView),
    Uav(UnorderedAccessView),
}

impl ParameterValue {
    /// Shader-side type name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::UInt(_) => "uint",
            ParameterValue::Int(_) => "int",
            ParameterValue::Float(_) => "float",
            ParameterValue::Float4(_) => "float4",
            ParameterValue::Float4x4(_) => "float4x4",
            ParameterValue::Srv(_) => "srv",
            ParameterValue::Uav(_) => "uav",
        }
    }
}

impl From<u32> for ParameterValue {
    fn from(value: u32) -> Self {
        ParameterValue::UInt(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        ParameterValue::Int(value)
    }
}

impl From<f32> for ParameterValue {
    fn from(value: f32) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<Vec4> for ParameterValue {
    fn from(value: Vec4) -> Self {
        ParameterValue::Float4(value)
    }
}

impl From<Mat4> for ParameterValue {
    fn from(value: Mat4) -> Self {
        ParameterValue::Float4x4(value)
    }
}

impl From<ShaderResourceView> for ParameterValue {
    fn from(value: ShaderResourceView) -> Self {
        ParameterValue::Srv(value)
    }
}

impl From<UnorderedAccessView> for ParameterValue {
    fn from(value: UnorderedAccessView) -> Self {
        ParameterValue::Uav(value)
    }
}

/// Named entry point of an effect
#[derive(Clone)]
pub struct Technique {
    name: String,
    kernel: Arc<dyn ComputeKernel>,
}

impl Technique {
    pub fn new<K: ComputeKernel + 'static>(name: &str, kernel: K) -> Self {
        Self {
            name: name.to_string(),
            kernel: Arc::new(kernel),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kernel(&self) -> &dyn ComputeKernel {
        self.kernel.as_ref()
    }
}

impl fmt::Debug for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Technique")
            .field("name", &self.name)
            .field("slots", &self.kernel.slots())
            .field("group_size", &self.kernel.group_size())
            .finish()
    }
}

/// Compute effect: parameter table plus techniques
#[derive(Debug, Clone)]
pub struct Effect {
    name: String,
    parameters: FxHashMap<String, ParameterValue>,
    techniques: FxHashMap<String, Technique>,
}

impl Effect {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: FxHashMap::default(),
            techniques: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add (or replace) a technique
    pub fn add_technique(&mut self, technique: Technique) {
        self.techniques.insert(technique.name.clone(), technique);
    }

    pub fn with_technique(mut self, technique: Technique) -> Self {
        self.add_technique(technique);
        self
    }

    pub fn technique_by_name(&self, name: &str) -> Option<&Technique> {
        self.techniques.get(name)
    }

    /// Bind a parameter, replacing the previous value
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParameterValue>) {
        self.parameters.insert(name.to_string(), value.into());
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }

    pub fn clear_parameter(&mut self, name: &str) -> Option<ParameterValue> {
        self.parameters.remove(name)
    }

    pub fn parameters(&self) -> &FxHashMap<String, ParameterValue> {
        &self.parameters
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
