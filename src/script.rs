//! Shimmed script construction and lifecycle
//!
//! This module owns the temp-file side of script shimming: building a
//! shim-prefixed copy of a user script, refreshing it in place when the
//! original changes, and removing it during shutdown.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A user script that has been replaced by a shimmed temporary copy.
#[derive(Debug)]
pub struct TrackedScript {
    /// Resolved path to the user's real script; never written by fridac.
    pub original_path: PathBuf,
    /// Uniquely-named temporary file owned exclusively by fridac.
    pub shimmed_path: PathBuf,
    /// Modification time of the original as of the last successful write.
    pub last_modified: SystemTime,
}

/// Write `shim_text` + marker + the original file's bytes to `shimmed_path`.
///
/// The content is assembled in memory and written in one pass, then synced,
/// so a reader of `shimmed_path` never observes a partial snapshot. The
/// target is truncated in place rather than recreated, keeping any handle
/// frida already holds on the path valid.
pub fn write_shimmed_content(
    shim_text: &str,
    original_path: &Path,
    shimmed_path: &Path,
) -> Result<()> {
    let original_bytes = fs::read(original_path)
        .with_context(|| format!("failed to read script {}", original_path.display()))?;
    let marker = shim_end_marker(original_path);

    let mut content =
        Vec::with_capacity(shim_text.len() + marker.len() + original_bytes.len());
    content.extend_from_slice(shim_text.as_bytes());
    content.extend_from_slice(marker.as_bytes());
    content.extend_from_slice(&original_bytes);

    let mut file = File::create(shimmed_path)
        .with_context(|| format!("failed to open {}", shimmed_path.display()))?;
    file.write_all(&content)
        .with_context(|| format!("failed to write {}", shimmed_path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync {}", shimmed_path.display()))?;

    Ok(())
}

/// Provenance line separating the shim from the original script bytes.
///
/// The exact format is a compatibility contract consumed by frida's script
/// loader and by humans inspecting the temp file.
fn shim_end_marker(original_path: &Path) -> String {
    format!(
        "\n// ---- SHIM END. SOURCE: {} ----\n",
        original_path.display()
    )
}

/// Create the shimmed temporary copy for a user-supplied script path.
///
/// Fails if the path does not name an existing regular file. The temp file
/// keeps a `.js` suffix so frida's own file-type sniffing still works.
pub fn create_shimmed_script(shim_text: &str, script_path: &str) -> Result<TrackedScript> {
    create_shimmed_script_in(shim_text, script_path, &env::temp_dir())
}

/// As [`create_shimmed_script`], with the temp-file directory made explicit.
///
/// Any failure after the temp file has been allocated removes it again, so
/// an aborted startup never leaves a stray `fridac_*.js` behind.
pub(crate) fn create_shimmed_script_in(
    shim_text: &str,
    script_path: &str,
    temp_dir: &Path,
) -> Result<TrackedScript> {
    let original_path = PathBuf::from(shellexpand::tilde(script_path).as_ref());
    if !original_path.is_file() {
        bail!("script file not found: {script_path}");
    }
    // Resolve before the first write so the marker line names the same
    // absolute path on every regeneration.
    let original_path = original_path.canonicalize().unwrap_or(original_path);

    let temp_file = tempfile::Builder::new()
        .prefix("fridac_")
        .suffix(".js")
        .tempfile_in(temp_dir)
        .context("failed to create shimmed temp file")?;
    // Persist: deletion belongs to the supervisor's shutdown sequence.
    let (_file, shimmed_path) = temp_file
        .keep()
        .context("failed to persist shimmed temp file")?;

    if let Err(e) = write_shimmed_content(shim_text, &original_path, &shimmed_path) {
        let _ = fs::remove_file(&shimmed_path);
        return Err(e);
    }

    track_script(original_path, shimmed_path)
}

/// Record the original's modification time and assemble the tracked entry.
///
/// A stat failure here (the original vanishing right after a successful
/// write) removes the temp file before the error is returned; at this point
/// no tracked entry exists yet, so nobody else would delete it.
fn track_script(original_path: PathBuf, shimmed_path: PathBuf) -> Result<TrackedScript> {
    match fs::metadata(&original_path).and_then(|m| m.modified()) {
        Ok(last_modified) => Ok(TrackedScript {
            original_path,
            shimmed_path,
            last_modified,
        }),
        Err(e) => {
            let _ = fs::remove_file(&shimmed_path);
            Err(e).with_context(|| format!("failed to stat {}", original_path.display()))
        }
    }
}

/// Best-effort removal of shimmed temp files.
///
/// A failure (or an already-missing file) never prevents removal of the
/// remaining paths.
pub fn remove_shimmed_files(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => log::debug!("removed shimmed script {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("failed to remove {}: {}", path.display(), e),
        }
    }
}
