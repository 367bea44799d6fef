//! Build orchestration: one build at a time, latest request wins.
//!
//! # Module Structure
//!
//! ```text
//! build/
//! ├── gate          # BuildLock, Ticketer
//! ├── program       # Compiler / Program traits, ProgramArena, Teardown
//! ├── orchestrator  # Orchestrator::request_build
//! └── site          # SiteCompiler, SiteProgram (the real pipeline)
//! ```

mod gate;
mod orchestrator;
pub mod program;
mod site;

pub use gate::{BuildLock, new_lock};
pub use orchestrator::{BuildStatus, Orchestrator};
pub use program::Notifier;
pub use site::SiteCompiler;
