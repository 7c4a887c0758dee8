//! Report rendering and kill execution.
//!
//! Two mutually exclusive output modes share one plan: the grouped human
//! report, and a pipe-clean PID list for a separately privileged kill step.

use crate::classify::Plan;
use crate::gpu::process::ProcessRecord;
use crate::utils::formatting::{format_age, format_memory_size};
use crate::utils::system::{kill_process, KillOutcome};
use log::error;
use prettytable::{format, row, Row, Table};
use std::collections::BTreeSet;
use textwrap::fill;

const RULE_WIDTH: usize = 88;
const COMMAND_WIDTH: usize = 60;

pub fn print_scan_summary(count: usize) {
    if count == 0 {
        println!("Found 0 GPU processes");
    } else {
        println!("Found {count} GPU processes (after whitelist filtering)");
    }
}

/// One section per selected criterion, in selection order. Empty groups are
/// still printed so the operator sees that a criterion matched nothing.
pub fn print_groups(plan: &Plan) {
    for (criterion, records) in &plan.groups {
        println!("\n{}", "=".repeat(RULE_WIDTH));
        println!("{}", criterion.header());
        println!("{}", "=".repeat(RULE_WIDTH));

        if records.is_empty() {
            println!("No processes matched this criterion");
            continue;
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_CLEAN);
        table.set_titles(row![
            "PID", "USER", "GPU", "MEMORY", "UTIL", "AGE", "STATE", "COMMAND"
        ]);
        for record in records {
            table.add_row(process_row(record));
        }
        table.printstd();

        println!("{} process(es) matched this criterion", records.len());
    }
}

fn process_row(record: &ProcessRecord) -> Row {
    let (gpu, memory, util) = match &record.gpu {
        Some(gpu) => (
            gpu.index.to_string(),
            format_memory_size(gpu.memory_used),
            format!("{}%", gpu.utilization),
        ),
        None => ("-".to_string(), "-".to_string(), "-".to_string()),
    };

    let (user, age, state, command) = match &record.sys {
        Some(sys) => (
            sys.username.clone(),
            sys.age_secs.map(format_age).unwrap_or_else(|| "-".to_string()),
            if sys.zombie { "zombie" } else { "ok" }.to_string(),
            if sys.cmdline.is_empty() {
                format!("[{}]", sys.name)
            } else {
                fill(&sys.cmdline, COMMAND_WIDTH)
            },
        ),
        None => (
            "-".to_string(),
            "-".to_string(),
            "no info".to_string(),
            "-".to_string(),
        ),
    };

    row![record.pid, user, gpu, memory, util, age, state, command]
}

/// Final TOTAL line. The count is over unique PIDs, so a process matching
/// several criteria is counted once.
pub fn print_total(plan: &Plan, dry_run: bool) {
    println!("\n{}", "=".repeat(RULE_WIDTH));
    if plan.kill_pids.is_empty() {
        println!("TOTAL: no processes matched the selected criteria");
    } else if dry_run {
        println!("TOTAL: would kill {} process(es)", plan.kill_pids.len());
        println!("Run without --dry-run to actually kill the processes.");
    } else {
        println!("TOTAL: killing {} process(es)", plan.kill_pids.len());
    }
}

/// Send SIGKILL to each candidate once. Per-PID failures are reported and do
/// not stop the remaining kills; returns how many failed.
pub fn execute_kills(pids: &BTreeSet<u32>) -> usize {
    let mut failures = 0;

    for &pid in pids {
        match kill_process(pid) {
            Ok(KillOutcome::Killed) => println!("Killed process {pid}"),
            // Exited between scan and kill; nothing left to do.
            Ok(KillOutcome::AlreadyGone) => println!("Process {pid} no longer exists"),
            Err(e) => {
                error!("{e}");
                failures += 1;
            }
        }
    }

    failures
}

/// PID-list mode output: one integer per line, newline-terminated, nothing
/// else. Consumers pipe this straight into a kill command.
pub fn render_pid_list(pids: &BTreeSet<u32>) -> String {
    let mut out = String::new();
    for pid in pids {
        out.push_str(&pid.to_string());
        out.push('\n');
    }
    out
}

pub fn print_pid_list(pids: &BTreeSet<u32>) {
    print!("{}", render_pid_list(pids));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{build_plan, Criterion};
    use crate::gpu::process::{GpuUsage, ProcessRecord, SysInfo};

    fn idle_record(pid: u32) -> ProcessRecord {
        ProcessRecord {
            pid,
            gpu: Some(GpuUsage {
                index: 0,
                utilization: 0,
                memory_used: 414 * 1024 * 1024,
            }),
            sys: Some(SysInfo {
                name: "python".to_string(),
                username: "alice".to_string(),
                cmdline: "python train.py".to_string(),
                age_secs: Some(1650),
                zombie: false,
            }),
        }
    }

    #[test]
    fn pid_list_is_sorted_one_per_line() {
        let pids: BTreeSet<u32> = [42, 7, 1000].into_iter().collect();
        assert_eq!(render_pid_list(&pids), "7\n42\n1000\n");
    }

    #[test]
    fn empty_pid_list_renders_nothing() {
        assert_eq!(render_pid_list(&BTreeSet::new()), "");
    }

    #[test]
    fn pid_list_round_trips_to_the_plan_kill_set() {
        let records = vec![idle_record(3), idle_record(1), idle_record(2)];
        let plan = build_plan(&records, &[Criterion::ZeroUtil, Criterion::TooOld(12)]);

        let parsed: BTreeSet<u32> = render_pid_list(&plan.kill_pids)
            .lines()
            .map(|line| line.parse::<u32>().unwrap())
            .collect();

        assert_eq!(parsed, plan.kill_pids);
    }

    #[test]
    fn rows_for_records_without_gpu_or_sys_info_use_placeholders() {
        let bare = ProcessRecord {
            pid: 9,
            gpu: None,
            sys: None,
        };
        let cells = process_row(&bare);
        assert_eq!(cells.get_cell(0).unwrap().get_content(), "9");
        assert_eq!(cells.get_cell(6).unwrap().get_content(), "no info");
    }
}
