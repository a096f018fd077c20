//! Argument vector rewriting
//!
//! Scans frida's argument vector for script-loading flags and substitutes
//! each script path with a shimmed temporary copy, leaving every other token
//! untouched and in its original position.

use anyhow::{bail, Result};
use std::env;
use std::fs;
use std::path::Path;

use crate::script::{create_shimmed_script_in, TrackedScript};

/// Rewrite script-loading arguments to point at shimmed temp files.
///
/// Recognizes the two-token forms `-l <path>` and `--load <path>` as well as
/// the joined form `--load=<path>`. Returns the rewritten vector together
/// with one [`TrackedScript`] per rewritten occurrence, in argument order.
///
/// Errors are fatal to the whole rewrite; temp files already created for
/// earlier occurrences are removed before the error is returned.
pub fn rewrite_args(
    args: &[String],
    shim_text: &str,
) -> Result<(Vec<String>, Vec<TrackedScript>)> {
    rewrite_args_in(args, shim_text, &env::temp_dir())
}

/// As [`rewrite_args`], with the temp-file directory made explicit.
pub(crate) fn rewrite_args_in(
    args: &[String],
    shim_text: &str,
    temp_dir: &Path,
) -> Result<(Vec<String>, Vec<TrackedScript>)> {
    let mut rewritten = Vec::with_capacity(args.len());
    let mut tracked: Vec<TrackedScript> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];

        if arg == "-l" || arg == "--load" {
            let Some(script_path) = args.get(i + 1) else {
                discard_partial(&tracked);
                bail!("missing script path after {arg}");
            };

            let script = match create_shimmed_script_in(shim_text, script_path, temp_dir) {
                Ok(script) => script,
                Err(e) => {
                    discard_partial(&tracked);
                    return Err(e);
                }
            };

            rewritten.push(arg.clone());
            rewritten.push(script.shimmed_path.display().to_string());
            tracked.push(script);
            i += 2;
            continue;
        }

        if let Some(script_path) = arg.strip_prefix("--load=") {
            let script = match create_shimmed_script_in(shim_text, script_path, temp_dir) {
                Ok(script) => script,
                Err(e) => {
                    discard_partial(&tracked);
                    return Err(e);
                }
            };

            rewritten.push(format!("--load={}", script.shimmed_path.display()));
            tracked.push(script);
            i += 1;
            continue;
        }

        rewritten.push(arg.clone());
        i += 1;
    }

    Ok((rewritten, tracked))
}

/// Remove temp files created before a rewrite error, so a failed startup
/// leaves nothing behind.
fn discard_partial(tracked: &[TrackedScript]) {
    for script in tracked {
        let _ = fs::remove_file(&script.shimmed_path);
    }
}
