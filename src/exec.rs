//! Launcher orchestration: resolve, rewrite, spawn, supervise, clean up
//!
//! This module contains the `run` function that drives the whole launch:
//! binary resolution, argument rewriting, watcher startup, child process
//! supervision with interrupt handling, and the single shutdown sequence
//! every exit path funnels through.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::thread;
use std::time::{Duration, Instant};

use crate::args::rewrite_args;
use crate::resolver::locate_frida;
use crate::script::remove_shimmed_files;
use crate::watcher::ScriptWatcher;
use crate::SHIM_JS;

/// How long a child is given to exit after an interrupt before fridac
/// stops waiting and reports the conventional interrupted exit code.
const INTERRUPT_GRACE: Duration = Duration::from_secs(5);

/// Granularity of the child wait loop.
const WAIT_TICK: Duration = Duration::from_millis(50);

/// Exit code reported when the child outlives the interrupt grace period.
const EXIT_INTERRUPTED: i32 = 130;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Launch frida with shimmed script arguments and supervise it to exit.
///
/// All fatal startup errors are reported on stderr and mapped to exit code
/// 1; otherwise the child's own exit status is propagated. Temp files
/// created for shimmed scripts are removed on every path out of this
/// function, after the watcher has been stopped.
pub fn run(args: Vec<String>) -> i32 {
    let Some(frida_path) = locate_frida() else {
        eprintln!("frida binary not found in PATH: frida");
        return 1;
    };

    if SHIM_JS.trim().is_empty() {
        eprintln!("embedded compatibility shim is empty");
        return 1;
    }

    let (rewritten_args, tracked_scripts) = match rewrite_args(&args, SHIM_JS) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{e:#}");
            return 1;
        }
    };

    // Snapshot the temp paths now: the watcher takes ownership of the
    // tracked entries, while shutdown only needs the path values, which are
    // fixed for the rest of the run.
    let shimmed_paths: Vec<PathBuf> = tracked_scripts
        .iter()
        .map(|script| script.shimmed_path.clone())
        .collect();

    let watcher = if tracked_scripts.is_empty() {
        None
    } else {
        Some(ScriptWatcher::spawn(tracked_scripts, SHIM_JS))
    };

    let exit_code = match supervise(&frida_path, &rewritten_args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("failed to run frida: {e:#}");
            1
        }
    };

    // Ordered shutdown: the watcher is stopped and joined before any
    // deletion, so a refresh never races a removal of the same file.
    if let Some(watcher) = watcher {
        watcher.stop();
    }
    remove_shimmed_files(&shimmed_paths);

    exit_code
}

/// Spawn the frida binary and wait for it, honoring user interrupts.
fn supervise(frida_path: &Path, args: &[String]) -> Result<i32> {
    // Clear the flag before the handler can set it, so an interrupt landing
    // during installation is kept rather than wiped.
    INTERRUPTED.store(false, Ordering::SeqCst);
    install_interrupt_handler();

    let mut child = Command::new(frida_path)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("failed to spawn {}", frida_path.display()))?;

    log::debug!("spawned {} (pid {})", frida_path.display(), child.id());

    loop {
        if let Some(status) = child.try_wait().context("failed to wait for frida")? {
            return Ok(exit_status_code(&status));
        }

        if INTERRUPTED.load(Ordering::SeqCst) {
            return Ok(shutdown_after_interrupt(&mut child));
        }

        thread::sleep(WAIT_TICK);
    }
}

/// Ask the child to terminate and give it a bounded grace period.
///
/// Returns the child's status if it exits in time (signal deaths read as
/// 128+signal, so a SIGINT-killed child yields 130), otherwise the
/// conventional interrupted code with the child left to the OS.
fn shutdown_after_interrupt(child: &mut Child) -> i32 {
    terminate_child(child);

    let deadline = Instant::now() + INTERRUPT_GRACE;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(status)) => return exit_status_code(&status),
            Ok(None) => thread::sleep(WAIT_TICK),
            Err(e) => {
                log::warn!("failed to wait for interrupted child: {e}");
                break;
            }
        }
    }

    EXIT_INTERRUPTED
}

/// Request graceful termination of the child.
fn terminate_child(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(child.id() as i32);
        if let Err(e) = kill(pid, Signal::SIGTERM) {
            log::debug!("SIGTERM to {pid} failed: {e}");
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = child.kill() {
            log::debug!("failed to kill child: {e}");
        }
    }
}

/// Map an exit status to a process exit code.
///
/// Unix signal parity: a signal-terminated child reads as 128 + signal.
fn exit_status_code(status: &ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    status.code().unwrap_or(1)
}

/// Install the Ctrl-C handler once per process.
///
/// The handler only sets a flag; the wait loop in [`supervise`] turns it
/// into graceful child termination so cleanup always runs on the main line.
fn install_interrupt_handler() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst)) {
            log::warn!("failed to install interrupt handler: {e}");
        }
    });
}
