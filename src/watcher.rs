//! Background change watcher for tracked scripts
//!
//! A single polling thread keeps every shimmed temp file synchronized with
//! its original while frida runs. Polling (rather than native filesystem
//! notification) keeps the behavior identical across platforms and network
//! filesystems; the poll interval bounds both reload latency and stop
//! latency.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::script::{write_shimmed_content, TrackedScript};

/// How often tracked originals are polled for modification-time changes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on how long [`ScriptWatcher::stop`] waits for the thread.
const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle to the background watcher thread.
///
/// The watcher owns the tracked script list; the set of entries is fixed at
/// spawn time and only each entry's temp-file content and last-seen
/// modification time change afterwards.
pub struct ScriptWatcher {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl ScriptWatcher {
    /// Start watching the given scripts on a background thread.
    pub fn spawn(scripts: Vec<TrackedScript>, shim_text: &'static str) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || watch_loop(&stop_rx, scripts, shim_text));
        Self { stop_tx, handle }
    }

    /// Cooperatively stop the watcher and wait for it, bounded.
    ///
    /// The thread observes the stop request within one poll interval and
    /// never aborts an in-flight refresh, so by the time this returns (or
    /// gives up) no further writes to the shimmed files are issued.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());

        let deadline = Instant::now() + JOIN_TIMEOUT;
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        if self.handle.is_finished() {
            let _ = self.handle.join();
        } else {
            log::warn!("script watcher did not stop within {JOIN_TIMEOUT:?}; detaching");
        }
    }
}

fn watch_loop(stop_rx: &Receiver<()>, mut scripts: Vec<TrackedScript>, shim_text: &str) {
    loop {
        match stop_rx.recv_timeout(POLL_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {}
        }

        for script in &mut scripts {
            poll_script(script, shim_text);
        }
    }
}

/// Check one script for changes and refresh its shimmed copy if needed.
///
/// Per-script failures are never fatal: an unreadable original or a failed
/// rewrite is retried on the next tick, for as long as the process runs.
fn poll_script(script: &mut TrackedScript, shim_text: &str) {
    let modified = match std::fs::metadata(&script.original_path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) => {
            log::debug!(
                "cannot stat {}: {}; retrying next tick",
                script.original_path.display(),
                e
            );
            return;
        }
    };

    if modified == script.last_modified {
        return;
    }

    match write_shimmed_content(shim_text, &script.original_path, &script.shimmed_path) {
        Ok(()) => {
            script.last_modified = modified;
            log::debug!("refreshed shimmed script for {}", script.original_path.display());
        }
        Err(e) => {
            eprintln!(
                "failed to refresh shimmed script for {}: {e:#}",
                script.original_path.display()
            );
        }
    }
}
