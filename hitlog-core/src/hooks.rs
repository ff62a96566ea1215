use bitflags::bitflags;

use crate::error::ArtifactError;
use crate::module::ImageInfo;

bitflags! {
    /// Pre-execution hooks to attach to one discovered instruction.
    ///
    /// The three checks are independent and non-exclusive: an instruction
    /// can carry any subset, e.g. a start trigger placed on the first
    /// instruction of the module carries both `TRACE_START` and `COUNT`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct HookSet: u8 {
        /// Executing this instruction enables logging.
        const TRACE_START = 1 << 0;
        /// Executing this instruction disables logging.
        const TRACE_STOP = 1 << 1;
        /// Executing this instruction bumps its hit counter.
        const COUNT = 1 << 2;
    }
}

/// Capability interface between a host instrumentation engine and the
/// tracer.
///
/// The host (or an adapter wrapping one) delivers image-load events as the
/// target process maps images, asks once per static instruction which hooks
/// to attach via [`on_instruction`], invokes the attached per-execution
/// callbacks immediately before every dynamic execution of that
/// instruction, and finally delivers [`on_terminate`] once no further
/// callbacks can fire.
///
/// The per-execution callbacks run on whichever target thread is executing
/// the instruction, so implementations must be safe under concurrent `&self`
/// calls and must not block or allocate there.
///
/// All methods default to no-ops so partial implementations can serve as
/// test fakes.
///
/// [`on_instruction`]: InstrumentHooks::on_instruction
/// [`on_terminate`]: InstrumentHooks::on_terminate
pub trait InstrumentHooks {
    /// An image was loaded into the target process.
    fn on_image_load(&self, image: &ImageInfo<'_>) {
        let _ = image;
    }

    /// The instruction at `pc` has been discovered (translated), before any
    /// execution of it. Returns the set of pre-execution hooks to attach;
    /// the host caches the answer for the lifetime of the run.
    fn on_instruction(&self, pc: u64) -> HookSet {
        let _ = pc;
        HookSet::empty()
    }

    /// An instruction carrying [`HookSet::TRACE_START`] is about to execute.
    fn on_trace_start(&self, pc: u64) {
        let _ = pc;
    }

    /// An instruction carrying [`HookSet::TRACE_STOP`] is about to execute.
    fn on_trace_stop(&self, pc: u64) {
        let _ = pc;
    }

    /// An instruction carrying [`HookSet::COUNT`] is about to execute.
    fn on_counted_exec(&self, pc: u64) {
        let _ = pc;
    }

    /// The target process is terminating; the host guarantees no further
    /// callbacks fire after this.
    fn on_terminate(&self) -> Result<(), ArtifactError> {
        Ok(())
    }
}
