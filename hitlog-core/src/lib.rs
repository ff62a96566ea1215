//! Core engine for per-instruction hit-count tracing.
//!
//! The engine records, for a single targeted module, how many times each
//! instruction address inside that module executed during one run of a
//! target process, and serializes the resulting per-address table as a raw
//! byte map for downstream disassembly tooling.
//!
//! The crate is host-agnostic: it never talks to an instrumentation engine
//! directly. Instead, [`engine::HitLogger`] implements the
//! [`hooks::InstrumentHooks`] capability interface and an external adapter
//! forwards the host's image-load, instruction-discovery, execution and
//! termination events to it. The `module` component decides which loaded
//! image is "the module", `hits` owns the saturating counters, `triggers`
//! owns the logging-enabled window, and `artifact` flushes the table at
//! termination.

pub mod artifact;
pub mod config;
pub mod engine;
pub mod error;
pub mod hits;
pub mod hooks;
pub mod module;
pub mod triggers;

/// Display wrapper that renders addresses as zero-padded hex in log fields.
#[derive(Copy, Clone)]
pub struct Hex<T>(pub T);

impl std::fmt::Display for Hex<u64> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl std::fmt::Display for Hex<Option<u64>> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(v) => write!(f, "Some({})", Hex(v)),
            None => write!(f, "None"),
        }
    }
}
