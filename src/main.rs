//! fridac - transparent frida launcher
//!
//! Proxies the real `frida` binary, injecting a compatibility shim into every
//! script passed via `-l`/`--load` and keeping the injected copies current
//! while frida runs.

use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let exit_code = fridac::run(args);
    ExitCode::from(exit_code.clamp(0, 255) as u8)
}
