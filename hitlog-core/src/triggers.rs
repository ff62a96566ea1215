use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::Hex;

/// The runtime-mutable logging window driven by the two trigger addresses.
///
/// With a start offset configured, logging begins disabled and is enabled
/// the first time the start instruction executes; without one, logging is on
/// from the first instruction. The stop trigger disables logging whenever it
/// executes. Neither trigger is ever re-armed, but the flag writes are
/// unconditional, so a start trigger executing after a stop re-enables
/// logging.
///
/// The flag is read on every counted execution from any thread of the
/// target, so it is a relaxed atomic; a slightly stale read around a
/// transition is accepted.
pub struct Triggers {
    start_offset: Option<u64>,
    stop_offset: Option<u64>,
    logging: AtomicBool,
}

impl Triggers {
    pub fn new(start_offset: Option<u64>, stop_offset: Option<u64>) -> Self {
        Self {
            start_offset,
            stop_offset,
            logging: AtomicBool::new(start_offset.is_none()),
        }
    }

    /// Whether executions should currently be counted.
    #[inline]
    pub fn logging(&self) -> bool {
        self.logging.load(Ordering::Relaxed)
    }

    /// Enables logging. Re-hits while already enabled are no-ops in effect;
    /// the diagnostic notice fires only on the actual transition.
    pub fn start(&self, pc: u64) {
        if !self.logging.swap(true, Ordering::Relaxed) {
            info!(pc = %Hex(pc), "logging started by start trigger");
        }
    }

    /// Disables logging. Same idempotency as [`Triggers::start`].
    pub fn stop(&self, pc: u64) {
        if self.logging.swap(false, Ordering::Relaxed) {
            info!(pc = %Hex(pc), "logging stopped by stop trigger");
        }
    }

    /// Resolves the configured module-relative offsets against the selected
    /// module's base address.
    pub fn resolve(&self, base: u64) -> ResolvedTriggers {
        ResolvedTriggers {
            start: self.start_offset.map(|offset| base.wrapping_add(offset)),
            stop: self.stop_offset.map(|offset| base.wrapping_add(offset)),
        }
    }
}

/// Absolute trigger addresses, known once the module base is.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResolvedTriggers {
    pub start: Option<u64>,
    pub stop: Option<u64>,
}
