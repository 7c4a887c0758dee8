mod classify;
mod error;
mod fuser;
mod gpu;
mod report;
mod utils;

use clap::{Arg, ArgAction, Command};
use classify::{Criterion, Whitelist};
use flexi_logger::Logger;
use gpu::process::ProcessRecord;
use log::warn;
use std::error::Error;
use std::process::ExitCode;
use utils::system::lookup_process;

struct Config {
    dry_run: bool,
    output_pids: bool,
    criteria: Vec<Criterion>,
    fuser_output: Option<String>,
    whitelist: Whitelist,
}

fn parse_arguments() -> Config {
    let matches = Command::new("nvreaper")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Kill processes holding NVIDIA GPU memory based on idle, zombie and age criteria")
        .after_help(
            "No-privilege workflow:\n  \
             sudo fuser -v /dev/nvidia* 2>/dev/null \\\n    \
             | nvreaper --zero-util --fuser-output /dev/stdin --output-pids \\\n    \
             | xargs sudo kill -9",
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Show what would be killed without killing anything"),
        )
        .arg(
            Arg::new("zero-util")
                .long("zero-util")
                .action(ArgAction::SetTrue)
                .help("Select processes holding GPU memory at zero GPU utilization"),
        )
        .arg(
            Arg::new("zombies")
                .long("zombies")
                .action(ArgAction::SetTrue)
                .help("Select zombie processes"),
        )
        .arg(
            Arg::new("no-process")
                .long("no-process")
                .action(ArgAction::SetTrue)
                .help("Select PIDs with no matching OS process"),
        )
        .arg(
            Arg::new("too-old")
                .long("too-old")
                .value_name("HOURS")
                .value_parser(clap::value_parser!(u64))
                .help("Select processes running for at least HOURS hours"),
        )
        .arg(
            Arg::new("output-pids")
                .long("output-pids")
                .action(ArgAction::SetTrue)
                .help("Print candidate PIDs one per line for an external kill step; implies --dry-run"),
        )
        .arg(
            Arg::new("fuser-output")
                .long("fuser-output")
                .value_name("PATH_OR_TEXT")
                .help("Pre-captured 'fuser -v /dev/nvidia*' output, as a file path (e.g. /dev/stdin) or inline text, instead of invoking fuser"),
        )
        .arg(
            Arg::new("whitelist")
                .long("whitelist")
                .value_name("NAME_OR_PID")
                .action(ArgAction::Append)
                .help("Additional process name or PID to exempt from all criteria"),
        )
        .get_matches();

    // Criteria keep a fixed report order regardless of flag order.
    let mut criteria = Vec::new();
    if matches.get_flag("zero-util") {
        criteria.push(Criterion::ZeroUtil);
    }
    if let Some(&hours) = matches.get_one::<u64>("too-old") {
        criteria.push(Criterion::TooOld(hours));
    }
    if matches.get_flag("zombies") {
        criteria.push(Criterion::Zombie);
    }
    if matches.get_flag("no-process") {
        criteria.push(Criterion::NoProcess);
    }

    let extra_whitelist: Vec<String> = matches
        .get_many::<String>("whitelist")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let output_pids = matches.get_flag("output-pids");

    Config {
        // PID-list mode never kills; the consumer does.
        dry_run: matches.get_flag("dry-run") || output_pids,
        output_pids,
        criteria,
        fuser_output: matches
            .get_one::<String>("fuser-output")
            .map(String::clone),
        whitelist: Whitelist::with_defaults(&extra_whitelist),
    }
}

fn collect_records(config: &Config) -> Vec<ProcessRecord> {
    let mut records = gpu::info::collect_gpu_processes();

    let fuser_text = match &config.fuser_output {
        Some(arg) => match fuser::read_fuser_argument(arg) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("failed to read fuser output {arg:?}: {e}");
                None
            }
        },
        None => fuser::run_fuser(),
    };

    if let Some(text) = fuser_text {
        for pid in fuser::parse_fuser_listing(&text) {
            records.entry(pid).or_insert_with(|| ProcessRecord {
                pid,
                gpu: None,
                sys: lookup_process(pid),
            });
        }
    }

    let mut records: Vec<ProcessRecord> = records
        .into_values()
        .filter(|record| !config.whitelist.contains(record))
        .collect();
    records.sort_by_key(|record| record.pid);
    records
}

fn run(config: &Config) -> usize {
    if !config.output_pids {
        println!("Gathering GPU process information...");
    }

    let records = collect_records(config);
    let plan = classify::build_plan(&records, &config.criteria);

    if config.output_pids {
        report::print_pid_list(&plan.kill_pids);
        return 0;
    }

    report::print_scan_summary(records.len());

    if config.criteria.is_empty() {
        println!("No kill criteria specified. Use --help to see available options.");
        return 0;
    }

    report::print_groups(&plan);
    report::print_total(&plan, config.dry_run);

    if config.dry_run {
        return 0;
    }
    report::execute_kills(&plan.kill_pids)
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    // Diagnostics go to stderr so --output-pids stdout stays pipe-clean.
    let _logger = Logger::try_with_env_or_str("info")?.start()?;

    let config = parse_arguments();
    let failed_kills = run(&config);

    if failed_kills > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
