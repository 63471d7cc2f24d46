//! Host and process resource readings behind `!system`.

use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};

use crate::Error;

#[derive(Debug, Clone)]
pub struct SystemReport {
    pub cpu_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    /// Resident set size of this process, when the platform reports it.
    pub process_rss_bytes: Option<u64>,
}

impl SystemReport {
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total_bytes == 0 {
            return 0.0;
        }
        self.memory_used_bytes as f64 * 100.0 / self.memory_total_bytes as f64
    }
}

fn read_system() -> SystemReport {
    let mut sys = System::new();
    // cpu usage is a delta between two refreshes
    sys.refresh_cpu();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();
    sys.refresh_memory();

    let process_rss_bytes = sysinfo::get_current_pid().ok().and_then(|pid| {
        sys.refresh_process(pid);
        sys.process(pid).map(|p| p.memory())
    });

    SystemReport {
        cpu_percent: sys.global_cpu_info().cpu_usage(),
        memory_used_bytes: sys.used_memory(),
        memory_total_bytes: sys.total_memory(),
        process_rss_bytes,
    }
}

/// Samples off the async workers since the cpu reading has to wait.
pub async fn sample_system() -> Result<SystemReport, Error> {
    tokio::task::spawn_blocking(read_system)
        .await
        .map_err(|e| Error::Platform(format!("system sampling failed: {e}")))
}
