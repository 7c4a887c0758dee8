use thiserror::Error;

/// Failures that can occur when signalling a kill candidate.
///
/// Collection and enrichment problems never surface here: missing NVML, a
/// malformed fuser line or an unreadable /proc entry degrade to warnings or
/// to the no-process classification instead.
#[derive(Debug, Error)]
pub enum ReaperError {
    #[error("permission denied to kill process {0}")]
    KillPermissionDenied(u32),
    #[error("failed to signal process {pid}: {source}")]
    Signal { pid: u32, source: nix::Error },
}
