//! Transparent frida launcher with script shimming
//!
//! This library wraps the `frida` CLI so that legacy scripts keep working on
//! modern frida runtimes without being edited.
//!
//! ## Architecture
//!
//! The launcher works by:
//! 1. Resolving the real `frida` binary (PATH first, then sibling directories)
//! 2. Rewriting every `-l`/`--load` argument to point at a temporary copy of
//!    the script with a compatibility shim prepended
//! 3. Spawning `frida` with the rewritten arguments while a background watcher
//!    keeps each temporary copy in sync with its original
//! 4. Deleting every temporary copy once `frida` exits, on all exit paths
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::process::ExitCode;
//!
//! fn main() -> ExitCode {
//!     let args: Vec<String> = std::env::args().skip(1).collect();
//!     ExitCode::from(fridac::run(args) as u8)
//! }
//! ```

pub use args::rewrite_args;
pub use exec::run;
pub use script::TrackedScript;
pub use watcher::ScriptWatcher;

pub mod args;
pub mod exec;
pub mod resolver;
pub mod script;
pub mod watcher;

/// Compatibility shim prepended to every loaded script.
///
/// Embedded at compile time; immutable for the lifetime of the process.
pub const SHIM_JS: &str = include_str!("shim.js");
