//! Replay host: drives the capability interface from a recorded run.
//!
//! The driver mirrors how a translating host delivers events: image loads
//! are forwarded as they appear in the stream, instruction discovery happens
//! exactly once per address (the first time it is about to execute), and the
//! hooks attached at discovery are invoked before every execution of that
//! address for the rest of the run. At end of stream the termination event
//! fires, after which no further callbacks are delivered.

use std::io::Read;

use hashbrown::HashMap;
use tracing::{debug, trace};

use hitlog_core::hooks::{HookSet, InstrumentHooks};
use hitlog_core::module::ImageInfo;
use hitlog_core::Hex;

use crate::record::Record;
use crate::{ReadError, TraceReader};

/// Totals accumulated over one replayed run.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Image-load events forwarded.
    pub images: u64,
    /// Distinct instruction addresses discovered.
    pub discovered: u64,
    /// Execution events replayed.
    pub executed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("trace does not begin with a magic record")]
    MissingMagic,

    #[error("trace contains a duplicate magic record")]
    DuplicateMagic,

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Artifact(#[from] hitlog_core::error::ArtifactError),
}

/// Replays a recorded run through `hooks`.
///
/// Hooks attached to one instruction run before it in a fixed order: start
/// trigger, stop trigger, count. An address first executed before its
/// image's load record was seen keeps the empty hook set it was discovered
/// with, just as with a host that translated the code before the load event
/// was delivered.
pub fn replay<R, H>(input: R, hooks: &H) -> Result<ReplayStats, ReplayError>
where
    R: Read,
    H: InstrumentHooks + ?Sized,
{
    let mut reader = TraceReader::new(input);
    match reader.next_record()? {
        Some(Record::Magic) => {}
        _ => return Err(ReplayError::MissingMagic),
    }

    let mut discovered: HashMap<u64, HookSet> = HashMap::new();
    let mut stats = ReplayStats::default();

    while let Some(record) = reader.next_record()? {
        match record {
            Record::Magic => return Err(ReplayError::DuplicateMagic),
            Record::Image(image) => {
                stats.images += 1;
                hooks.on_image_load(&ImageInfo {
                    name: image.name(),
                    low: image.low(),
                    high: image.high(),
                    main: image.main(),
                });
            }
            Record::Exec(exec) => {
                let pc = exec.pc();
                let attached = match discovered.get(&pc) {
                    Some(attached) => *attached,
                    None => {
                        let attached = hooks.on_instruction(pc);
                        trace!(pc = %Hex(pc), hooks = ?attached, "discovered instruction");
                        discovered.insert(pc, attached);
                        stats.discovered += 1;
                        attached
                    }
                };
                if attached.contains(HookSet::TRACE_START) {
                    hooks.on_trace_start(pc);
                }
                if attached.contains(HookSet::TRACE_STOP) {
                    hooks.on_trace_stop(pc);
                }
                if attached.contains(HookSet::COUNT) {
                    hooks.on_counted_exec(pc);
                }
                stats.executed += 1;
            }
        }
    }

    debug!(
        images = stats.images,
        discovered = stats.discovered,
        executed = stats.executed,
        "replay complete"
    );
    hooks.on_terminate()?;
    Ok(stats)
}
