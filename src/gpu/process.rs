/// GPU usage attributed to one process.
///
/// Utilization is device-level, not per-process: NVML reports one figure per
/// GPU and every process on that GPU carries it.
#[derive(Clone, Debug)]
pub struct GpuUsage {
    pub index: u32,
    pub utilization: u32,
    pub memory_used: u64,
}

/// Metadata looked up from procfs for a PID.
#[derive(Clone, Debug)]
pub struct SysInfo {
    pub name: String,
    pub username: String,
    pub cmdline: String,
    pub age_secs: Option<u64>,
    pub zombie: bool,
}

/// One process observed holding GPU memory, merged from the GPU driver view
/// and the OS view. Built once per scan and not mutated afterwards.
#[derive(Clone, Debug)]
pub struct ProcessRecord {
    pub pid: u32,
    pub gpu: Option<GpuUsage>,
    pub sys: Option<SysInfo>,
}

impl ProcessRecord {
    pub fn has_sys_info(&self) -> bool {
        self.sys.is_some()
    }

    pub fn is_zombie(&self) -> bool {
        self.sys.as_ref().is_some_and(|s| s.zombie)
    }

    pub fn name(&self) -> Option<&str> {
        self.sys.as_ref().map(|s| s.name.as_str())
    }

    pub fn age_secs(&self) -> Option<u64> {
        self.sys.as_ref().and_then(|s| s.age_secs)
    }
}
