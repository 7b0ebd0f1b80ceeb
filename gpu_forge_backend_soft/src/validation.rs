/// Validation layer - counts suspicious but legal usage patterns
///
/// The soft backend never rejects these patterns; it only counts them so a
/// sample can print a report at shutdown. With the `verbose-validation`
/// feature every occurrence is also logged.

use colored::*;
use std::sync::atomic::{AtomicU32, Ordering};

/// Snapshot of the validation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    /// Copies that do not cover the whole destination
    pub partial_copies: u32,
    /// Dispatches that bind no writable slot
    pub dispatches_without_writes: u32,
    /// Write mappings released without publishing any bytes
    pub unused_write_maps: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.partial_copies + self.dispatches_without_writes + self.unused_write_maps
    }
}

/// Thread-safe counters owned by one soft device
pub(crate) struct ValidationTracker {
    enabled: bool,
    partial_copies: AtomicU32,
    dispatches_without_writes: AtomicU32,
    unused_write_maps: AtomicU32,
}

impl ValidationTracker {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            partial_copies: AtomicU32::new(0),
            dispatches_without_writes: AtomicU32::new(0),
            unused_write_maps: AtomicU32::new(0),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn partial_copy(&self, copied: u64, dst_capacity: u64) {
        if self.record(&self.partial_copies) {
            report(format!("copy of {} bytes into a {} byte buffer", copied, dst_capacity));
        }
    }

    pub(crate) fn dispatch_without_writes(&self, technique: &str) {
        if self.record(&self.dispatches_without_writes) {
            report(format!("technique '{}' dispatched without a writable slot", technique));
        }
    }

    pub(crate) fn unused_write_map(&self) {
        if self.record(&self.unused_write_maps) {
            report("write mapping released without data".to_string());
        }
    }

    pub(crate) fn stats(&self) -> ValidationStats {
        ValidationStats {
            partial_copies: self.partial_copies.load(Ordering::Relaxed),
            dispatches_without_writes: self.dispatches_without_writes.load(Ordering::Relaxed),
            unused_write_maps: self.unused_write_maps.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        self.partial_copies.store(0, Ordering::Relaxed);
        self.dispatches_without_writes.store(0, Ordering::Relaxed);
        self.unused_write_maps.store(0, Ordering::Relaxed);
    }

    fn record(&self, counter: &AtomicU32) -> bool {
        if !self.enabled {
            return false;
        }
        counter.fetch_add(1, Ordering::Relaxed);
        true
    }
}

#[cfg(feature = "verbose-validation")]
fn report(message: String) {
    gpu_forge::engine_warn!("forge::soft::Validation", "{}", message);
}

#[cfg(not(feature = "verbose-validation"))]
fn report(_message: String) {}

/// Print a colored summary of the validation counters
pub fn print_validation_report(stats: &ValidationStats) {
    if stats.total() == 0 {
        println!("\n{}", "✓ No validation findings".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Report ===".bright_blue().bold());
    if stats.partial_copies > 0 {
        println!("  {} {}", "Partial copies:".yellow().bold(), stats.partial_copies);
    }
    if stats.dispatches_without_writes > 0 {
        println!("  {} {}", "Dispatches without writes:".yellow().bold(), stats.dispatches_without_writes);
    }
    if stats.unused_write_maps > 0 {
        println!("  {} {}", "Unused write maps:".cyan(), stats.unused_write_maps);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());
    println!("{}\n", "=========================".bright_blue().bold());
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
