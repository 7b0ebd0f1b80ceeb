/// Compute kernel trait and implementations.
///
/// A kernel is the compiled program behind a technique. CPU-emulating
/// backends run it one thread group at a time through `execute_group`.

use crate::error::Result;
use crate::effect::KernelIo;
use crate::resource::ViewKind;

/// Named resource slot a kernel reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    /// Effect parameter name bound to the slot
    pub name: String,
    /// Expected view kind
    pub kind: ViewKind,
}

impl ResourceSlot {
    /// Shader resource (read-only) slot
    pub fn srv(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ViewKind::ShaderResource,
        }
    }

    /// Unordered access (read/write) slot
    pub fn uav(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ViewKind::UnorderedAccess,
        }
    }
}

/// Compute program executed by a dispatch
pub trait ComputeKernel: Send + Sync {
    /// Resource slots resolved from effect parameters before the dispatch
    fn slots(&self) -> &[ResourceSlot];

    /// Threads per group
    fn group_size(&self) -> [u32; 3];

    /// Execute every thread of one group
    fn execute_group(&self, group_id: [u32; 3], io: &mut KernelIo<'_>) -> Result<()>;
}

type GroupFn = dyn Fn([u32; 3], &mut KernelIo<'_>) -> Result<()> + Send + Sync;

/// Closure-based kernel
///
/// # Example
///
/// ```ignore
/// let kernel = FnKernel::new(vec![ResourceSlot::uav("out_buff")], [64, 1, 1], |group, io| {
///     let base = group[0] as u64 * 64;
///     let values: Vec<u32> = (0..64).map(|i| (base + i) as u32).collect();
///     io.store_u32s("out_buff", base, &values)
/// });
/// ```
pub struct FnKernel {
    slots: Vec<ResourceSlot>,
    group_size: [u32; 3],
    callback: Box<GroupFn>,
}

impl FnKernel {
    pub fn new<F>(slots: Vec<ResourceSlot>, group_size: [u32; 3], callback: F) -> Self
    where
        F: Fn([u32; 3], &mut KernelIo<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            slots,
            group_size,
            callback: Box::new(callback),
        }
    }
}

impl ComputeKernel for FnKernel {
    fn slots(&self) -> &[ResourceSlot] {
        &self.slots
    }

    fn group_size(&self) -> [u32; 3] {
        self.group_size
    }

    fn execute_group(&self, group_id: [u32; 3], io: &mut KernelIo<'_>) -> Result<()> {
        (self.callback)(group_id, io)
    }
}
