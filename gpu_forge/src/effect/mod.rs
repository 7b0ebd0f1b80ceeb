/// Effect module - parameters, techniques and compute kernels

pub mod effect;
pub mod kernel;
pub mod kernel_io;

pub use effect::*;
pub use kernel::*;
pub use kernel_io::KernelIo;
pub(crate) use kernel_io::BoundSlot;
