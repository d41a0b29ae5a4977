use std::path::Path;

use sysinfo::{Networks, Pid, ProcessesToUpdate, System};
use thiserror::Error;

use crate::metric::Metric;

/// Errors that could occur while setting up process monitoring.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The id of the current process could not be determined on this platform.
    #[error("failed to determine current process id: {0}")]
    Pid(&'static str),
}

/// Identity of the hosting process, used for default tags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessDetails {
    pid: u32,
    name: String,
    hostname: String,
}

impl ProcessDetails {
    /// Collects the details of the current process.
    pub fn current() -> Self {
        let name = std::env::current_exe()
            .ok()
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());

        ProcessDetails {
            pid: std::process::id(),
            name,
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
        }
    }

    /// Process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Executable name, without extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the host the process runs on.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

/// Samples the resource usage of the hosting process.
///
/// CPU usage is measured between consecutive samples, so the first sample always reports zero. Network counters are
/// host-wide and report the bytes seen since the previous sample.
pub struct ProcessMonitor {
    system: System,
    networks: Networks,
    pid: Pid,
}

impl ProcessMonitor {
    /// Creates a monitor for the current process.
    ///
    /// # Errors
    ///
    /// If the current process id cannot be determined, an error is returned.
    pub fn new() -> Result<Self, ProcessError> {
        let pid = sysinfo::get_current_pid().map_err(ProcessError::Pid)?;
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        Ok(ProcessMonitor { system, networks: Networks::new_with_refreshed_list(), pid })
    }

    /// Takes a fresh sample of the process's resource usage.
    pub fn sample(&mut self) -> Vec<Metric> {
        self.system.refresh_memory();
        self.system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        self.networks.refresh();

        let mut metrics = Vec::with_capacity(6);

        if let Some(process) = self.system.process(self.pid) {
            let resident = process.memory();
            let total = self.system.total_memory();
            let memory_percentage = if total == 0 { 0.0 } else { resident as f64 * 100.0 / total as f64 };

            metrics.push(Metric::new("cpuUsedPercentage", f64::from(process.cpu_usage())));
            metrics.push(Metric::new("memoryUsagePercentage", memory_percentage));
            metrics.push(Metric::new("residentSetSize", resident / 1024));
            metrics.push(Metric::new("virtualMemorySize", process.virtual_memory() / 1024));
        }

        let (received, transmitted) = self.networks.iter().fold((0u64, 0u64), |(rx, tx), (_, data)| {
            (rx.saturating_add(data.received()), tx.saturating_add(data.transmitted()))
        });
        metrics.push(Metric::new("bytesReceived", received));
        metrics.push(Metric::new("bytesTransmitted", transmitted));

        metrics
    }
}
