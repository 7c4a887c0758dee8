//! Lock-holder listing support for the no-privilege workflow.
//!
//! Instead of querying NVML, the operator can capture
//! `fuser -v /dev/nvidia*` output once (with whatever privilege that needs)
//! and feed it in via `--fuser-output`; this module parses that text into
//! PIDs. When the flag is absent, fuser is invoked directly.

use log::warn;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

/// Extract PIDs from fuser-style output.
///
/// Accepts both the plain stdout form (whitespace-separated PIDs) and the
/// verbose table form, where a PID column may carry access-flag suffixes
/// ("1234m"). Device-path and command columns are ignored. A line whose PID
/// candidates are all malformed is skipped with a warning; the rest of the
/// input still parses.
pub fn parse_fuser_listing(text: &str) -> Vec<u32> {
    let mut pids = Vec::new();

    for line in text.lines() {
        let mut candidates = 0;
        let mut parsed = 0;

        for token in line.split_whitespace() {
            // Device paths end in ':' in the verbose table.
            if token.ends_with(':') {
                continue;
            }
            // Only tokens leading with a digit can be PIDs; usernames and
            // commands like "python3" must not trip the malformed warning.
            if !token.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            candidates += 1;
            let trimmed = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
            match trimmed.parse::<u32>() {
                Ok(pid) => {
                    parsed += 1;
                    if !pids.contains(&pid) {
                        pids.push(pid);
                    }
                }
                Err(_) => warn!("skipping malformed PID token {token:?} in fuser output"),
            }
        }

        if candidates > 0 && parsed == 0 {
            warn!("skipping fuser output line with no usable PID: {line:?}");
        }
    }

    pids
}

/// Resolve the `--fuser-output` argument: a readable file path (including
/// /dev/stdin) is loaded, anything else is taken as the listing text itself.
pub fn read_fuser_argument(arg: &str) -> io::Result<String> {
    if Path::new(arg).exists() {
        fs::read_to_string(arg)
    } else {
        Ok(arg.to_string())
    }
}

/// Run fuser against the NVIDIA device nodes and capture its stdout.
///
/// The shell is needed for glob expansion. Unavailability of fuser is a
/// warning and an empty scan, not an error.
pub fn run_fuser() -> Option<String> {
    capture_listing("fuser -v /dev/nvidia* 2>/dev/null")
}

/// Capture the listing command's stdout, distinguishing "tool unavailable"
/// from "tool ran and found nothing". fuser exits non-zero when no device is
/// held, so only the shell's command-not-found code means unavailable.
fn capture_listing(command: &str) -> Option<String> {
    const SH_COMMAND_NOT_FOUND: i32 = 127;

    let output = Command::new("sh").arg("-c").arg(command).output();

    match output {
        Ok(output) if output.status.code() == Some(SH_COMMAND_NOT_FOUND) => {
            warn!("fuser is not available; continuing with an empty lock-holder listing");
            None
        }
        Ok(output) => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
        Err(e) => {
            warn!("failed to run fuser: {e}");
            None
        }
    }
}
