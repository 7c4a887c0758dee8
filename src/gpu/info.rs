use crate::gpu::process::{GpuUsage, ProcessRecord};
use crate::utils::system::lookup_process;
use log::warn;
use nvml_wrapper::enums::device::UsedGpuMemory;
use nvml_wrapper::struct_wrappers::device::ProcessInfo as NvmlProcessInfo;
use nvml_wrapper::Nvml;
use std::collections::HashMap;

/// Enumerate processes holding GPU memory via NVML, keyed by PID.
///
/// Any NVML failure degrades to a warning and a smaller (possibly empty)
/// result; one unreadable device never aborts the scan.
pub fn collect_gpu_processes() -> HashMap<u32, ProcessRecord> {
    let nvml = match Nvml::init() {
        Ok(nvml) => nvml,
        Err(e) => {
            warn!("failed to initialize NVML: {e}");
            return HashMap::new();
        }
    };

    let device_count = match nvml.device_count() {
        Ok(count) => count,
        Err(e) => {
            warn!("failed to count GPU devices: {e}");
            return HashMap::new();
        }
    };

    let mut result = HashMap::new();

    for index in 0..device_count {
        let device = match nvml.device_by_index(index) {
            Ok(device) => device,
            Err(e) => {
                warn!("failed to open GPU {index}: {e}");
                continue;
            }
        };

        // Device-level figure; attributed to every process on this GPU.
        let utilization = device.utilization_rates().map(|u| u.gpu).unwrap_or(0);

        let compute = device.running_compute_processes().unwrap_or_else(|e| {
            warn!("failed to list compute processes on GPU {index}: {e}");
            Vec::new()
        });
        let graphics = device.running_graphics_processes().unwrap_or_else(|e| {
            warn!("failed to list graphics processes on GPU {index}: {e}");
            Vec::new()
        });

        for process in compute.into_iter().chain(graphics) {
            insert_record(&mut result, index, utilization, process);
        }
    }

    result
}

fn insert_record(
    result: &mut HashMap<u32, ProcessRecord>,
    index: u32,
    utilization: u32,
    process: NvmlProcessInfo,
) {
    let memory_used = match process.used_gpu_memory {
        UsedGpuMemory::Used(bytes) => bytes,
        UsedGpuMemory::Unavailable => 0,
    };

    // A process can show up as both compute and graphics; first sighting wins.
    result.entry(process.pid).or_insert_with(|| ProcessRecord {
        pid: process.pid,
        gpu: Some(GpuUsage {
            index,
            utilization,
            memory_used,
        }),
        sys: lookup_process(process.pid),
    });
}
