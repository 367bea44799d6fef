//! The concrete compiler and program for a site.
//!
//! Compiling loads `quire.toml` into a [`ConfigHandle`] and assembles the
//! default transformers and emitters into a [`SiteProgram`]. Running the
//! program performs one full pass; in watch mode it also starts the
//! content watcher, whose rebuilds reuse the same program until the next
//! recompile retires it.

use super::program::{
    Compiler, Generation, Notifier, Program, RunContext, RunOutput, SharedOutput, Teardown,
};
use crate::actor::WatchPair;
use crate::actor::build::{RebuildHandler, RebuildOutcome};
use crate::actor::fs::{ChangeSet, WatchFilter, WatchTarget};
use crate::config::{ConfigHandle, SiteConfig};
use crate::content::{DocumentStore, IgnoreSet, is_markdown};
use crate::core::slug::{Slug, SlugTracker};
use crate::generator::write::{Scope, write_artifacts};
use crate::generator::{self, EmitContext, Emitter, OutputSet};
use crate::logger::{status_error, status_success, status_warning};
use crate::pipeline::{PassReport, Pipeline, StageContext, panic_message, transform};
use crate::utils::path::normalize_path;
use crate::{debug, log};
use anyhow::{Context, Result, anyhow};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

// ============================================================================
// Compiler
// ============================================================================

/// Builds a [`SiteProgram`] from the persisted config handle.
///
/// The handle is shared with the dev server, so a recompile that swaps in
/// a new config is seen by request handlers too.
pub struct SiteCompiler {
    handle: Arc<ConfigHandle>,
}

impl SiteCompiler {
    pub fn new(handle: Arc<ConfigHandle>) -> Self {
        Self { handle }
    }
}

impl Compiler for SiteCompiler {
    fn compile(&mut self, entry: &Path) -> Result<Arc<dyn Program>> {
        debug!("build"; "compiling {}", entry.display());
        Ok(Arc::new(SiteProgram::new(self.handle.get())?))
    }

    fn recompile(&mut self) -> Result<Arc<dyn Program>> {
        if self.handle.reload()? {
            log!("config"; "reloaded {}", self.handle.path().display());
        }
        Ok(Arc::new(SiteProgram::new(self.handle.get())?))
    }

    fn config_paths(&self) -> Vec<PathBuf> {
        vec![self.handle.path().to_path_buf()]
    }
}

// ============================================================================
// Program
// ============================================================================

/// Slug claims and failures of one pass. Never outlives the pass.
#[derive(Debug, Default)]
pub struct PassState {
    pub slugs: SlugTracker,
    pub report: PassReport,
}

impl PassState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What one pass produced.
#[derive(Debug)]
pub struct PassOutcome {
    pub documents: usize,
    pub output: OutputSet,
    pub failures: usize,
}

pub struct SiteProgram {
    site: Arc<Site>,
}

struct Site {
    config: Arc<SiteConfig>,
    pipeline: Pipeline,
    emitters: Vec<Box<dyn Emitter>>,
    ignore: Arc<IgnoreSet>,
    pool: rayon::ThreadPool,
    /// Canonical content dir, matching paths reported by the watcher
    content_root: PathBuf,
}

impl SiteProgram {
    pub fn new(config: Arc<SiteConfig>) -> Result<Self> {
        let pipeline = Pipeline::new(transform::default_transformers())?;
        let ignore = IgnoreSet::new(&config.site.ignore_patterns)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.build.concurrency.unwrap_or(0))
            .thread_name(|i| format!("quire-doc-{i}"))
            .build()
            .context("failed to create worker pool")?;

        Ok(Self {
            site: Arc::new(Site {
                content_root: normalize_path(config.content_dir()),
                config,
                pipeline,
                emitters: generator::default_emitters(),
                ignore: Arc::new(ignore),
                pool,
            }),
        })
    }

    fn watch(
        &self,
        runtime: &tokio::runtime::Handle,
        ctx: &RunContext,
    ) -> Result<Teardown> {
        let site = &self.site;
        let cancelled = Arc::new(AtomicBool::new(false));
        let rebuilder = Arc::new(ContentRebuilder {
            site: Arc::clone(site),
            generation: ctx.generation,
            lock: Arc::clone(&ctx.lock),
            notify: ctx.notify.clone(),
            output: Arc::clone(&ctx.output),
            cancelled: Arc::clone(&cancelled),
        });

        let targets = [
            WatchTarget::tree(&site.content_root),
            WatchTarget::tree(normalize_path(site.config.static_dir())),
        ];
        let pair = WatchPair::spawn(runtime, "watch", &targets, site.watch_filter(), rebuilder)
            .context("failed to watch content")?;
        debug!("watch"; "content watcher up for {}", ctx.generation);

        Ok(Teardown::new(move || {
            cancelled.store(true, Ordering::SeqCst);
            pair.stop();
        }))
    }
}

impl Program for SiteProgram {
    fn run(&self, ctx: RunContext) -> Result<RunOutput> {
        let previous = ctx.previous();
        let PassOutcome {
            documents,
            output,
            failures,
        } = self.site.pass(previous.as_ref(), None)?;

        let config = &self.site.config;
        let teardown = match &ctx.runtime {
            Some(runtime) if config.serving && config.serve.watch => self.watch(runtime, &ctx)?,
            _ => Teardown::none(),
        };

        Ok(RunOutput {
            documents,
            output,
            failures,
            teardown,
        })
    }
}

impl Site {
    /// Discover, transform, emit and write.
    ///
    /// With `changed`, emitters that support it only emit those documents,
    /// and only files owned by them can be removed from the output tree.
    fn pass(&self, previous: Option<&OutputSet>, changed: Option<&BTreeSet<Slug>>) -> Result<PassOutcome> {
        let config = &*self.config;
        let mut state = PassState::new();

        let (mut store, rejected) =
            DocumentStore::load(config.content_dir(), &self.ignore, &mut state.slugs);
        state.report.record_rejected(rejected);

        let slugs: BTreeSet<Slug> = store.slugs().cloned().collect();
        let ctx = StageContext {
            config,
            slugs: &slugs,
        };
        let resources = self
            .pool
            .install(|| self.pipeline.run(&mut store, &ctx, &mut state.report))?;
        state.report.log_failures();

        let emit = EmitContext::new(config, &state.report);
        let artifacts = generator::collect(&self.emitters, &emit, &store, &resources, changed)?;
        let summary = write_artifacts(
            config.output_dir(),
            artifacts,
            previous,
            state.report.failed(),
            changed.map_or(Scope::Full, Scope::Partial),
        )?;
        debug!(
            "build";
            "{} written, {} unchanged, {} removed",
            summary.written.len(),
            summary.unchanged,
            summary.removed.len()
        );

        Ok(PassOutcome {
            documents: store.len(),
            output: summary.output,
            failures: state.report.failures().len(),
        })
    }

    /// Content files that are not ignored, and anything under the static dir.
    fn watch_filter(&self) -> WatchFilter {
        let content = self.content_root.clone();
        let statics = normalize_path(self.config.static_dir());
        let ignore = Arc::clone(&self.ignore);
        Box::new(move |path: &Path| match path.strip_prefix(&content) {
            Ok(rel) => !ignore.is_ignored(&rel.to_string_lossy().replace('\\', "/")),
            Err(_) => path.starts_with(&statics),
        })
    }

    /// Slugs to emit partially, when every change is an edit of an
    /// existing Markdown document.
    fn partial_slugs(&self, changes: &ChangeSet) -> Option<BTreeSet<Slug>> {
        let rel = |p: &Path| {
            p.strip_prefix(&self.content_root)
                .ok()
                .map(|r| r.to_string_lossy().replace('\\', "/"))
        };
        if !changes.only_modified(|p| rel(p).is_some_and(|r| is_markdown(&r))) {
            return None;
        }
        changes
            .paths()
            .map(|p| rel(p).and_then(|r| Slug::from_file_path(Path::new(&r)).ok()))
            .collect()
    }
}

// ============================================================================
// Content rebuilds
// ============================================================================

/// Re-runs the loaded program's pass on content changes.
struct ContentRebuilder {
    site: Arc<Site>,
    generation: Generation,
    lock: Arc<RwLock<()>>,
    notify: Notifier,
    output: SharedOutput,
    /// Set by teardown; a rebuild queued behind a recompile must not run.
    cancelled: Arc<AtomicBool>,
}

impl ContentRebuilder {
    fn rebuild_locked(&self, changes: &ChangeSet) -> Result<Option<PassOutcome>> {
        if self.cancelled.load(Ordering::SeqCst) {
            debug!("watch"; "{} retired, dropping {}", self.generation, changes.describe());
            return Ok(None);
        }

        let changed = self.site.partial_slugs(changes);
        let previous = self.output.lock().clone();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.site.pass(previous.as_ref(), changed.as_ref())
        }))
        .unwrap_or_else(|panic| Err(anyhow!("rebuild panicked: {}", panic_message(panic.as_ref()))))?;

        *self.output.lock() = Some(outcome.output.clone());
        Ok(Some(outcome))
    }
}

impl RebuildHandler for ContentRebuilder {
    fn rebuild(&self, changes: &ChangeSet) -> RebuildOutcome {
        let started = Instant::now();
        let result = {
            let _guard = self.lock.write();
            self.rebuild_locked(changes)
        };

        match result {
            Ok(Some(outcome)) => {
                let summary = format!(
                    "{} ({} documents in {}ms)",
                    changes.describe(),
                    outcome.documents,
                    started.elapsed().as_millis()
                );
                if outcome.failures == 0 {
                    status_success(&summary);
                } else {
                    status_warning(&format!("{summary}, {} failed", outcome.failures));
                }
                self.notify.notify();
            }
            Ok(None) => {}
            Err(e) => status_error("rebuild failed, keeping previous output", &format!("{e:#}")),
        }
        RebuildOutcome::Done
    }
}

#[cfg(test)]
mod tests;
