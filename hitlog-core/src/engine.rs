use std::sync::{Mutex, OnceLock};

use tracing::{error, info, warn};

use crate::artifact::ArtifactWriter;
use crate::config::Config;
use crate::error::ArtifactError;
use crate::hits::HitCounts;
use crate::hooks::{HookSet, InstrumentHooks};
use crate::module::{selects, ImageInfo, ModuleRange};
use crate::triggers::{ResolvedTriggers, Triggers};
use crate::Hex;

/// Engine context: all state for one traced run.
///
/// A single explicitly constructed object stands in for what an in-process
/// tool would keep in globals: the module selection, the trigger window, the
/// hit table and the artifact handle. Every host callback takes `&self`; the
/// selection is write-once and the rest is atomic or mutex-guarded, so
/// callbacks may arrive concurrently from any thread of the target.
pub struct HitLogger {
    module_filter: Option<String>,
    triggers: Triggers,
    selected: OnceLock<Selection>,
    artifact: Mutex<Option<ArtifactWriter>>,
}

struct Selection {
    range: ModuleRange,
    triggers: ResolvedTriggers,
    /// `None` when table allocation failed; the run proceeds uninstrumented.
    hits: Option<HitCounts>,
}

impl HitLogger {
    /// Builds the engine context and eagerly creates the artifact file.
    pub fn new(config: Config) -> Result<Self, ArtifactError> {
        let artifact = ArtifactWriter::create(&config.output)?;
        Ok(Self {
            module_filter: config.module,
            triggers: Triggers::new(config.start_offset, config.stop_offset),
            selected: OnceLock::new(),
            artifact: Mutex::new(Some(artifact)),
        })
    }

    /// Address range of the selected module, once one has been selected.
    pub fn module(&self) -> Option<ModuleRange> {
        self.selected.get().map(|selection| selection.range)
    }

    /// Whether executions are currently being counted.
    pub fn logging(&self) -> bool {
        self.triggers.logging()
    }

    /// Current counter value for a module-relative offset.
    pub fn count_at(&self, offset: u64) -> Option<u8> {
        let selection = self.selected.get()?;
        let index = usize::try_from(offset).ok()?;
        selection.hits.as_ref()?.get(index)
    }

    fn take_artifact(&self) -> Option<ArtifactWriter> {
        let mut guard = match self.artifact.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take()
    }
}

impl InstrumentHooks for HitLogger {
    fn on_image_load(&self, image: &ImageInfo<'_>) {
        info!(
            name = image.name,
            low = %Hex(image.low),
            high = %Hex(image.high),
            main = image.main,
            "image loaded"
        );
        if !selects(self.module_filter.as_deref(), image) {
            return;
        }

        let mut fresh = false;
        self.selected.get_or_init(|| {
            fresh = true;
            let range = ModuleRange::new(image.low, image.high);
            let hits = match HitCounts::alloc(range.size()) {
                Ok(hits) => Some(hits),
                Err(err) => {
                    error!(
                        name = image.name,
                        size = range.size(),
                        error = %err,
                        "hit table allocation failed, run continues uninstrumented"
                    );
                    None
                }
            };
            let triggers = self.triggers.resolve(range.base());
            info!(
                name = image.name,
                size = range.size(),
                start = %Hex(triggers.start),
                stop = %Hex(triggers.stop),
                "tracking module"
            );
            Selection {
                range,
                triggers,
                hits,
            }
        });
        if !fresh {
            warn!(name = image.name, "module already selected, ignoring later match");
        }
    }

    fn on_instruction(&self, pc: u64) -> HookSet {
        let Some(selection) = self.selected.get() else {
            return HookSet::empty();
        };
        let mut hooks = HookSet::empty();
        if selection.triggers.start == Some(pc) {
            hooks |= HookSet::TRACE_START;
        }
        if selection.triggers.stop == Some(pc) {
            hooks |= HookSet::TRACE_STOP;
        }
        // No table means no counting possible; the trigger hooks are still
        // attached since they act on the flag, not the table.
        if selection.hits.is_some() && selection.range.contains(pc) {
            hooks |= HookSet::COUNT;
        }
        hooks
    }

    fn on_trace_start(&self, pc: u64) {
        self.triggers.start(pc);
    }

    fn on_trace_stop(&self, pc: u64) {
        self.triggers.stop(pc);
    }

    fn on_counted_exec(&self, pc: u64) {
        if !self.triggers.logging() {
            return;
        }
        let Some(selection) = self.selected.get() else {
            return;
        };
        let Some(hits) = selection.hits.as_ref() else {
            return;
        };
        hits.record(selection.range.index_of(pc));
    }

    fn on_terminate(&self) -> Result<(), ArtifactError> {
        let Some(artifact) = self.take_artifact() else {
            warn!("termination delivered twice, artifact already written");
            return Ok(());
        };
        match self.selected.get() {
            Some(selection) => match selection.hits.as_ref() {
                Some(hits) => {
                    info!(
                        path = %artifact.path().display(),
                        size = hits.len(),
                        "writing instruction hits"
                    );
                    artifact.write_counts(&hits.snapshot())
                }
                None => {
                    warn!("hit table was never allocated, leaving artifact empty");
                    artifact.write_counts(&[])
                }
            },
            None => {
                warn!("no image matched the module selection, leaving artifact empty");
                artifact.write_counts(&[])
            }
        }
    }
}
