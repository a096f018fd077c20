//! Frida binary resolution
//!
//! Finds the real `frida` executable to proxy. PATH wins; otherwise the
//! directories next to the running launcher are probed, which covers
//! installs where frida and fridac land in the same scripts directory
//! without that directory being on PATH.

use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

/// Command name looked up on PATH.
pub const FRIDA_COMMAND: &str = "frida";

/// File names probed in sibling directories, in order.
#[cfg(windows)]
const CANDIDATE_NAMES: &[&str] = &["frida.exe", "frida.cmd", "frida.bat", "frida"];
#[cfg(not(windows))]
const CANDIDATE_NAMES: &[&str] = &["frida"];

/// Resolve the path to the frida binary, or `None` if it cannot be found.
pub fn locate_frida() -> Option<PathBuf> {
    if let Ok(path) = which::which(FRIDA_COMMAND) {
        log::debug!("resolved frida on PATH: {}", path.display());
        return Some(path);
    }

    probe_directories(&sibling_directories())
}

/// Directories containing the running executable and the invocation path.
fn sibling_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(exe) = env::current_exe() {
        let exe = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = exe.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Some(argv0) = env::args_os().next() {
        let invoked = PathBuf::from(argv0);
        let invoked = invoked.canonicalize().unwrap_or(invoked);
        if let Some(parent) = invoked.parent() {
            if !parent.as_os_str().is_empty() {
                dirs.push(parent.to_path_buf());
            }
        }
    }

    dirs
}

/// Probe candidate file names in each directory, first match wins.
///
/// Directories are deduplicated so a combined exe/argv0 directory is only
/// scanned once.
fn probe_directories(dirs: &[PathBuf]) -> Option<PathBuf> {
    let mut seen = HashSet::new();

    for dir in dirs {
        if !seen.insert(dir.clone()) {
            continue;
        }

        for name in CANDIDATE_NAMES {
            let candidate = dir.join(name);
            if is_regular_file(&candidate) {
                log::debug!("resolved frida next to launcher: {}", candidate.display());
                return Some(candidate);
            }
        }
    }

    None
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
