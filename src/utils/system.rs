use crate::error::ReaperError;
use crate::gpu::process::SysInfo;
use log::debug;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use nix::unistd::{sysconf, SysconfVar};
use nix::unistd::{Uid, User};
use procfs::process::Process;
use std::fs;

/// Look up procfs metadata for a PID.
///
/// Returns `None` when the process has already exited or /proc is not
/// readable for it; the caller classifies that as the no-process condition.
pub fn lookup_process(pid: u32) -> Option<SysInfo> {
    let process = match Process::new(pid as i32) {
        Ok(p) => p,
        Err(e) => {
            debug!("no system info for pid {pid}: {e}");
            return None;
        }
    };

    let stat = process.stat().ok()?;
    let username = process
        .uid()
        .ok()
        .and_then(|uid| User::from_uid(Uid::from_raw(uid)).ok().flatten())
        .map(|user| user.name)
        .unwrap_or_default();

    // Zombies keep their stat entry but report an empty cmdline.
    let cmdline = process.cmdline().unwrap_or_default().join(" ");

    let start_secs = stat.starttime as f64 / get_clock_ticks_per_second() as f64;
    let uptime = get_system_uptime();
    let age_secs = if uptime > 0.0 && uptime >= start_secs {
        Some((uptime - start_secs) as u64)
    } else {
        None
    };

    Some(SysInfo {
        name: stat.comm.clone(),
        username,
        cmdline,
        age_secs,
        zombie: stat.state == 'Z',
    })
}

/// Outcome of signalling one kill candidate.
pub enum KillOutcome {
    Killed,
    /// The process exited between the scan and the kill.
    AlreadyGone,
}

pub fn kill_process(pid: u32) -> Result<KillOutcome, ReaperError> {
    match kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(_) => Ok(KillOutcome::Killed),
        Err(nix::Error::ESRCH) => Ok(KillOutcome::AlreadyGone),
        Err(nix::Error::EPERM) => Err(ReaperError::KillPermissionDenied(pid)),
        Err(e) => Err(ReaperError::Signal { pid, source: e }),
    }
}

pub fn get_clock_ticks_per_second() -> u64 {
    sysconf(SysconfVar::CLK_TCK)
        .ok()
        .flatten()
        .map(|ticks| ticks as u64)
        .unwrap_or(100)
}

pub fn get_system_uptime() -> f64 {
    fs::read_to_string("/proc/uptime")
        .ok()
        .and_then(|content| content.split_whitespace().next().map(String::from))
        .and_then(|uptime_str| uptime_str.parse().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_own_process_has_cmdline_and_age() {
        let info = lookup_process(std::process::id()).expect("own process must exist");
        assert!(!info.zombie);
        assert!(!info.cmdline.is_empty());
        assert!(info.age_secs.is_some());
    }

    #[test]
    fn lookup_missing_pid_is_none() {
        // PIDs near the 4M default pid_max ceiling are never in use in test
        // environments.
        assert!(lookup_process(4_000_000).is_none());
    }
}
