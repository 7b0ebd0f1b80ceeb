/// Scheduler module - frame and pass submission

pub mod frame_scheduler;
pub mod pass_command;

pub use frame_scheduler::FrameScheduler;
pub use pass_command::*;
