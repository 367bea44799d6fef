//! Compiler and loaded-program interfaces, and the generation arena.
//!
//! A [`Compiler`] turns the site configuration into a [`Program`]. Each
//! successful compile is loaded into the [`ProgramArena`] under a fresh
//! [`Generation`] and run once. A run hands back a [`Teardown`] that stops
//! whatever the program left running (the inner content watcher), and the
//! orchestrator invokes it before the next compile.

use super::gate::BuildLock;
use crate::generator::OutputSet;
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of one loaded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Output set of the last successful build.
///
/// Owned by the orchestrator; content rebuilds inside a loaded program
/// update it under the build lock.
pub type SharedOutput = Arc<Mutex<Option<OutputSet>>>;

/// Called after each successful build to tell subscribers to reload.
#[derive(Clone)]
pub struct Notifier(Arc<dyn Fn() + Send + Sync>);

impl Notifier {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn noop() -> Self {
        Self::new(|| {})
    }

    #[inline]
    pub fn notify(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Notifier")
    }
}

/// Stops what a program run left behind. Never blocks.
#[derive(Default)]
pub struct Teardown(Option<Box<dyn FnOnce() + Send>>);

impl Teardown {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn run(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "Teardown(..)" } else { "Teardown(none)" })
    }
}

/// Everything a program run may use.
pub struct RunContext {
    pub generation: Generation,
    /// The build lock; the run itself is called with it held for writing,
    /// later content rebuilds started by the program take it themselves.
    pub lock: BuildLock,
    pub notify: Notifier,
    /// Runtime for background work. `None` in single-shot builds.
    pub runtime: Option<tokio::runtime::Handle>,
    pub output: SharedOutput,
}

impl RunContext {
    /// Snapshot of the previous output set.
    pub fn previous(&self) -> Option<OutputSet> {
        self.output.lock().clone()
    }
}

#[derive(Debug)]
pub struct RunOutput {
    pub documents: usize,
    pub output: OutputSet,
    /// Number of document-level failures; non-zero means degraded.
    pub failures: usize,
    pub teardown: Teardown,
}

/// A loaded build program.
pub trait Program: Send + Sync {
    fn run(&self, ctx: RunContext) -> Result<RunOutput>;
}

/// Turns configuration into a loadable program.
pub trait Compiler: Send {
    /// First compile, from the config entry point.
    fn compile(&mut self, entry: &Path) -> Result<Arc<dyn Program>>;

    /// Compile again from the persisted configuration handle.
    fn recompile(&mut self) -> Result<Arc<dyn Program>>;

    /// Paths whose change requires a recompile rather than a content rebuild.
    fn config_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Loaded programs keyed by generation.
#[derive(Default)]
pub struct ProgramArena {
    programs: BTreeMap<Generation, Arc<dyn Program>>,
    next: u64,
}

impl ProgramArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, program: Arc<dyn Program>) -> Generation {
        self.next += 1;
        let generation = Generation(self.next);
        self.programs.insert(generation, program);
        generation
    }

    pub fn take(&mut self, generation: Generation) -> Option<Arc<dyn Program>> {
        self.programs.remove(&generation)
    }

    /// The most recently loaded generation still in the arena.
    pub fn active(&self) -> Option<Generation> {
        self.programs.keys().next_back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Nothing;

    impl Program for Nothing {
        fn run(&self, _ctx: RunContext) -> Result<RunOutput> {
            Ok(RunOutput {
                documents: 0,
                output: OutputSet::new(),
                failures: 0,
                teardown: Teardown::none(),
            })
        }
    }

    #[test]
    fn test_arena_generations_increase() {
        let mut arena = ProgramArena::new();
        assert!(arena.active().is_none());

        let g1 = arena.load(Arc::new(Nothing));
        let g2 = arena.load(Arc::new(Nothing));
        assert!(g1 < g2);
        assert_eq!(arena.active(), Some(g2));

        assert!(arena.take(g2).is_some());
        assert_eq!(arena.active(), Some(g1));
        assert!(arena.take(g2).is_none());

        // generations are never reused
        let g3 = arena.load(Arc::new(Nothing));
        assert!(g3 > g2);
    }

    #[test]
    fn test_teardown_runs_once() {
        let flag = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&flag);
        Teardown::new(move || f.store(true, Ordering::SeqCst)).run();
        assert!(flag.load(Ordering::SeqCst));

        Teardown::none().run();
    }
}
