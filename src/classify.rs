//! Criterion evaluation over collected process records.
//!
//! Criteria are independent predicates combined with OR: each selected one
//! contributes a display group, and the union of the groups forms the kill
//! set. The set is keyed by PID, so a process matching several criteria is
//! signalled at most once.

use crate::gpu::process::ProcessRecord;
use std::collections::{BTreeSet, HashSet};

/// Infrastructure processes that must never be considered for termination.
pub const DEFAULT_WHITELIST: [&str; 5] = [
    "nv-fabricmanager",
    "nvitop",
    "nvtop",
    "nvidia-persistenced",
    "nvidia-smi",
];

/// Process names and PIDs exempt from classification.
pub struct Whitelist {
    names: HashSet<String>,
    pids: HashSet<u32>,
}

impl Whitelist {
    /// Built-in names plus operator additions; numeric entries whitelist by
    /// PID.
    pub fn with_defaults(extra: &[String]) -> Self {
        let mut names: HashSet<String> =
            DEFAULT_WHITELIST.iter().map(|s| s.to_string()).collect();
        let mut pids = HashSet::new();

        for entry in extra {
            match entry.parse::<u32>() {
                Ok(pid) => {
                    pids.insert(pid);
                }
                Err(_) => {
                    names.insert(entry.clone());
                }
            }
        }

        Whitelist { names, pids }
    }

    pub fn contains(&self, record: &ProcessRecord) -> bool {
        if self.pids.contains(&record.pid) {
            return true;
        }
        record.name().is_some_and(|name| self.names.contains(name))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Criterion {
    /// Holding memory while the device reports 0% utilization.
    ZeroUtil,
    /// Running for at least this many hours.
    TooOld(u64),
    Zombie,
    /// No matching OS process was found during enrichment.
    NoProcess,
}

impl Criterion {
    pub fn header(&self) -> String {
        match self {
            Criterion::ZeroUtil => "ZERO GPU UTILIZATION".to_string(),
            Criterion::TooOld(hours) => format!("PROCESSES OLDER THAN {hours} HOURS"),
            Criterion::Zombie => "ZOMBIE PROCESSES".to_string(),
            Criterion::NoProcess => "PROCESSES WITHOUT SYSTEM INFO".to_string(),
        }
    }

    pub fn matches(&self, record: &ProcessRecord) -> bool {
        match self {
            Criterion::ZeroUtil => record
                .gpu
                .as_ref()
                .is_some_and(|g| g.utilization == 0 && g.memory_used > 0),
            Criterion::TooOld(hours) => record
                .age_secs()
                .is_some_and(|secs| secs >= hours.saturating_mul(3600)),
            Criterion::Zombie => record.is_zombie(),
            Criterion::NoProcess => !record.has_sys_info(),
        }
    }
}

/// The result of one classification pass: per-criterion display groups plus
/// the deduplicated kill set.
pub struct Plan<'a> {
    pub groups: Vec<(Criterion, Vec<&'a ProcessRecord>)>,
    pub kill_pids: BTreeSet<u32>,
}

/// Classify records against the selected criteria.
///
/// Records are expected in ascending PID order and already
/// whitelist-filtered; group order follows the criteria order.
pub fn build_plan<'a>(records: &'a [ProcessRecord], criteria: &[Criterion]) -> Plan<'a> {
    let mut groups = Vec::with_capacity(criteria.len());
    let mut kill_pids = BTreeSet::new();

    for &criterion in criteria {
        let matched: Vec<&ProcessRecord> = records
            .iter()
            .filter(|record| criterion.matches(record))
            .collect();
        kill_pids.extend(matched.iter().map(|record| record.pid));
        groups.push((criterion, matched));
    }

    Plan { groups, kill_pids }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::process::{GpuUsage, SysInfo};

    fn record(pid: u32, util: u32, mem_mb: u64, age_secs: Option<u64>, zombie: bool) -> ProcessRecord {
        ProcessRecord {
            pid,
            gpu: Some(GpuUsage {
                index: 0,
                utilization: util,
                memory_used: mem_mb * 1024 * 1024,
            }),
            sys: Some(SysInfo {
                name: format!("proc{pid}"),
                username: "alice".to_string(),
                cmdline: format!("python train.py --run {pid}"),
                age_secs,
                zombie,
            }),
        }
    }

    fn orphan(pid: u32) -> ProcessRecord {
        ProcessRecord {
            pid,
            gpu: None,
            sys: None,
        }
    }

    #[test]
    fn zero_util_requires_memory_held() {
        let idle = record(1, 0, 414, Some(60), false);
        let empty = record(2, 0, 0, Some(60), false);
        let busy = record(3, 85, 414, Some(60), false);

        assert!(Criterion::ZeroUtil.matches(&idle));
        assert!(!Criterion::ZeroUtil.matches(&empty));
        assert!(!Criterion::ZeroUtil.matches(&busy));
    }

    #[test]
    fn too_old_threshold_is_inclusive() {
        let at_threshold = record(1, 50, 100, Some(12 * 3600), false);
        let younger = record(2, 50, 100, Some(12 * 3600 - 1), false);

        assert!(Criterion::TooOld(12).matches(&at_threshold));
        assert!(!Criterion::TooOld(12).matches(&younger));
    }

    #[test]
    fn huge_too_old_threshold_does_not_overflow() {
        let old = record(1, 50, 100, Some(u64::MAX), false);
        assert!(Criterion::TooOld(u64::MAX).matches(&old));
        assert!(!Criterion::TooOld(u64::MAX).matches(&record(2, 50, 100, Some(60), false)));
    }

    #[test]
    fn unknown_age_never_matches_too_old() {
        let unknown = record(1, 50, 100, None, false);
        assert!(!Criterion::TooOld(1).matches(&unknown));
    }

    #[test]
    fn no_process_matches_only_missing_sys_info() {
        assert!(Criterion::NoProcess.matches(&orphan(1)));
        assert!(!Criterion::NoProcess.matches(&record(2, 0, 10, Some(1), false)));
    }

    #[test]
    fn whitelisted_name_and_pid_are_excluded() {
        let whitelist = Whitelist::with_defaults(&["myjob".to_string(), "77".to_string()]);

        let mut smi = record(10, 0, 10, Some(1), false);
        smi.sys.as_mut().unwrap().name = "nvidia-smi".to_string();
        let mut job = record(11, 0, 10, Some(1), false);
        job.sys.as_mut().unwrap().name = "myjob".to_string();
        let by_pid = record(77, 0, 10, Some(1), false);
        let kept = record(12, 0, 10, Some(1), false);

        assert!(whitelist.contains(&smi));
        assert!(whitelist.contains(&job));
        assert!(whitelist.contains(&by_pid));
        assert!(!whitelist.contains(&kept));
    }

    #[test]
    fn nameless_record_is_not_name_whitelisted() {
        let whitelist = Whitelist::with_defaults(&[]);
        assert!(!whitelist.contains(&orphan(1)));
    }

    #[test]
    fn multi_criteria_match_kills_once() {
        // Zombie that is also idle and old: three groups, one kill entry.
        let target = record(5, 0, 414, Some(48 * 3600), true);
        let records = vec![target];
        let criteria = [Criterion::ZeroUtil, Criterion::TooOld(12), Criterion::Zombie];

        let plan = build_plan(&records, &criteria);

        for (_, group) in &plan.groups {
            assert_eq!(group.len(), 1);
        }
        assert_eq!(plan.kill_pids.len(), 1);
        assert!(plan.kill_pids.contains(&5));
    }

    #[test]
    fn kill_set_is_union_of_groups() {
        let records = vec![
            record(1, 0, 414, Some(60), false),          // zero-util only
            record(2, 90, 100, Some(20 * 3600), false),  // too-old only
            orphan(3),                                   // no-process only
            record(4, 60, 100, Some(60), false),         // matches nothing
        ];
        let criteria = [
            Criterion::ZeroUtil,
            Criterion::TooOld(12),
            Criterion::NoProcess,
        ];

        let plan = build_plan(&records, &criteria);

        let expected: BTreeSet<u32> = [1, 2, 3].into_iter().collect();
        assert_eq!(plan.kill_pids, expected);
    }

    #[test]
    fn idle_young_process_lands_in_zero_util_group_only() {
        // 0% utilization, 414MB held, 27.5 minutes old, 12h age threshold.
        let records = vec![record(9, 0, 414, Some(1650), false)];
        let criteria = [Criterion::ZeroUtil, Criterion::TooOld(12)];

        let plan = build_plan(&records, &criteria);

        assert_eq!(plan.groups[0].1.len(), 1);
        assert!(plan.groups[1].1.is_empty());
        assert_eq!(plan.kill_pids.len(), 1);
    }

    #[test]
    fn empty_scan_produces_empty_groups() {
        let plan = build_plan(&[], &[Criterion::ZeroUtil, Criterion::Zombie]);
        assert!(plan.groups.iter().all(|(_, group)| group.is_empty()));
        assert!(plan.kill_pids.is_empty());
    }
}
