//! The single build critical section.
//!
//! [`Orchestrator::request_build`] may be called from any thread. Requests
//! queue on the write lock; once inside, a request that is no longer the
//! latest returns [`BuildStatus::Superseded`] without doing work. An
//! in-flight build is never cancelled.
//!
//! Failures are fatal only until the first build succeeds. After that a
//! failed compile or run is logged and recorded, the previous output stays
//! on disk, and no reload notification is sent.

use super::gate::{BuildLock, Ticket, Ticketer, new_lock};
use super::program::{
    Compiler, Generation, Notifier, Program, ProgramArena, RunContext, RunOutput, SharedOutput,
    Teardown,
};
use crate::generator::OutputSet;
use crate::logger::{status_error, status_success, status_warning};
use crate::pipeline::panic_message;
use crate::utils::plural_s;
use crate::debug;
use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    Built,
    /// Built, with this many document-level failures.
    Degraded(usize),
    /// A newer request was issued before this one got the lock.
    Superseded,
    /// A later build failed; the previous output is untouched.
    Failed,
}

impl BuildStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Built | Self::Degraded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Degraded(usize),
    Failed(String),
}

/// One executed build.
#[derive(Debug, Clone)]
pub struct BuildRecord {
    /// Ticket of the request that ran.
    pub sequence: u64,
    /// When the request was issued, before waiting for the lock.
    pub triggered: Instant,
    pub finished: Instant,
    pub reason: String,
    pub generation: Option<Generation>,
    pub outcome: BuildOutcome,
    /// Output paths after the build, relative to the output directory.
    pub files: Vec<PathBuf>,
}

impl BuildRecord {
    /// Time from the request to the end of the build, lock wait included.
    pub fn elapsed(&self) -> Duration {
        self.finished.saturating_duration_since(self.triggered)
    }
}

impl fmt::Display for BuildRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.sequence, self.reason)?;
        if let Some(generation) = self.generation {
            write!(f, " {generation}")?;
        }
        let outcome = match &self.outcome {
            BuildOutcome::Success => "ok".to_string(),
            BuildOutcome::Degraded(n) => format!("{n} failed"),
            BuildOutcome::Failed(_) => "failed".to_string(),
        };
        write!(
            f,
            ": {outcome}, {} files, {}ms",
            self.files.len(),
            self.elapsed().as_millis()
        )
    }
}

struct State {
    compiler: Box<dyn Compiler>,
    arena: ProgramArena,
    teardown: Option<Teardown>,
    last: Option<BuildRecord>,
    succeeded: bool,
}

pub struct Orchestrator {
    entry: PathBuf,
    lock: BuildLock,
    ticketer: Ticketer,
    state: Mutex<State>,
    output: SharedOutput,
    notify: Notifier,
    runtime: Option<tokio::runtime::Handle>,
}

impl Orchestrator {
    pub fn new(entry: &Path, compiler: Box<dyn Compiler>) -> Self {
        Self {
            entry: entry.to_path_buf(),
            lock: new_lock(),
            ticketer: Ticketer::new(),
            state: Mutex::new(State {
                compiler,
                arena: ProgramArena::new(),
                teardown: None,
                last: None,
                succeeded: false,
            }),
            output: SharedOutput::default(),
            notify: Notifier::noop(),
            runtime: None,
        }
    }

    /// Called once after every successful build.
    pub fn with_notifier(mut self, notify: Notifier) -> Self {
        self.notify = notify;
        self
    }

    /// Runtime handed to programs for background work (watch mode).
    pub fn with_runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn lock(&self) -> &BuildLock {
        &self.lock
    }

    #[cfg(test)]
    pub fn last_record(&self) -> Option<BuildRecord> {
        self.state.lock().last.clone()
    }

    pub fn output(&self) -> Option<OutputSet> {
        self.output.lock().clone()
    }

    #[cfg(test)]
    pub fn active_generation(&self) -> Option<Generation> {
        self.state.lock().arena.active()
    }

    pub fn config_paths(&self) -> Vec<PathBuf> {
        self.state.lock().compiler.config_paths()
    }

    /// Compile, run and emit as one atomic build.
    ///
    /// Returns `Err` only when the first build fails.
    pub fn request_build(&self, reason: &str) -> Result<BuildStatus> {
        let ticket = self.ticketer.issue();
        let triggered = Instant::now();

        let status = {
            let _guard = self.lock.write();
            if self.ticketer.is_stale(ticket) {
                debug!("build"; "skipping superseded request #{} ({reason})", ticket.get());
                return Ok(BuildStatus::Superseded);
            }
            let mut state = self.state.lock();
            self.build_locked(&mut state, ticket, triggered, reason)?
        };

        if status.is_success() {
            self.notify.notify();
        }
        Ok(status)
    }

    /// Stop the active program, if any.
    pub fn shutdown(&self) {
        let _guard = self.lock.write();
        let mut state = self.state.lock();
        retire(&mut state);
    }

    fn build_locked(
        &self,
        state: &mut State,
        ticket: Ticket,
        triggered: Instant,
        reason: &str,
    ) -> Result<BuildStatus> {
        let first = !state.succeeded;
        retire(state);

        debug!("build"; "#{} {reason}", ticket.get());
        let compiled = if first {
            state.compiler.compile(&self.entry)
        } else {
            state.compiler.recompile()
        };
        let program = match compiled {
            Ok(program) => program,
            Err(e) => {
                return self.fail(state, ticket, triggered, reason, None, first, e.context("compile failed"));
            }
        };

        let generation = state.arena.load(Arc::clone(&program));
        let ctx = RunContext {
            generation,
            lock: Arc::clone(&self.lock),
            notify: self.notify.clone(),
            runtime: self.runtime.clone(),
            output: Arc::clone(&self.output),
        };

        let run = catch_unwind(AssertUnwindSafe(|| program.run(ctx)))
            .unwrap_or_else(|panic| Err(anyhow!("build panicked: {}", panic_message(panic.as_ref()))));

        let RunOutput {
            documents,
            output,
            failures,
            teardown,
        } = match run {
            Ok(out) => out,
            Err(e) => {
                state.arena.take(generation);
                return self.fail(state, ticket, triggered, reason, Some(generation), first, e);
            }
        };

        let elapsed = triggered.elapsed();
        let (status, outcome) = if failures == 0 {
            (BuildStatus::Built, BuildOutcome::Success)
        } else {
            (BuildStatus::Degraded(failures), BuildOutcome::Degraded(failures))
        };

        let summary = format!(
            "{documents} document{}, {} file{} in {}ms",
            plural_s(documents),
            output.len(),
            plural_s(output.len()),
            elapsed.as_millis()
        );
        if failures == 0 {
            status_success(&summary);
        } else {
            status_warning(&format!("{summary} ({failures} failed)"));
        }

        let record = BuildRecord {
            sequence: ticket.get(),
            triggered,
            finished: Instant::now(),
            reason: reason.to_string(),
            generation: Some(generation),
            outcome,
            files: output.paths().map(Path::to_path_buf).collect(),
        };
        debug!("build"; "{record}");
        state.last = Some(record);
        *self.output.lock() = Some(output);
        state.teardown = Some(teardown);
        state.succeeded = true;
        Ok(status)
    }

    #[allow(clippy::too_many_arguments)]
    fn fail(
        &self,
        state: &mut State,
        ticket: Ticket,
        triggered: Instant,
        reason: &str,
        generation: Option<Generation>,
        first: bool,
        error: anyhow::Error,
    ) -> Result<BuildStatus> {
        if first {
            return Err(error);
        }

        let message = format!("{error:#}");
        status_error("build failed, keeping previous output", &message);
        let record = BuildRecord {
            sequence: ticket.get(),
            triggered,
            finished: Instant::now(),
            reason: reason.to_string(),
            generation,
            outcome: BuildOutcome::Failed(message),
            files: self
                .output
                .lock()
                .as_ref()
                .map(|o| o.paths().map(Path::to_path_buf).collect())
                .unwrap_or_default(),
        };
        debug!("build"; "{record}");
        state.last = Some(record);
        Ok(BuildStatus::Failed)
    }
}

/// Take the active generation out of the arena and run its teardown.
fn retire(state: &mut State) {
    if let Some(generation) = state.arena.active() {
        state.arena.take(generation);
        debug!("build"; "retired {generation}");
    }
    if let Some(teardown) = state.teardown.take() {
        teardown.run();
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(teardown) = state.teardown.take() {
            teardown.run();
        }
    }
}
