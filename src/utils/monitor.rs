#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    pub cpu_usage: f32,
    pub resident_mb: u64,
    pub resident_percent: f32,
    pub peak_resident_mb: u64,
    pub elapsed: Duration,
}

/// Tracks process resources while a plate is converted.
///
/// Well images are held in memory between transform and load, so the peak
/// resident size is the number worth watching on large plates.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    state: Option<Mutex<MonitorState>>,
    started: Instant,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    pid: Pid,
    peak_resident_mb: u64,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let state = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => {
                    let mut system = System::new();
                    system.refresh_memory();
                    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                    Some(Mutex::new(MonitorState {
                        system,
                        pid,
                        peak_resident_mb: 0,
                    }))
                }
                Err(e) => {
                    tracing::warn!("System monitoring unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            state,
            started: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> Option<ResourceSnapshot> {
        let mut state = self.state.as_ref()?.lock().ok()?;
        let pid = state.pid;
        state.system.refresh_memory();
        state
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let total_mb = state.system.total_memory() / 1024 / 1024;
        let (cpu_usage, resident_mb) = {
            let process = state.system.process(pid)?;
            (process.cpu_usage(), process.memory() / 1024 / 1024)
        };

        state.peak_resident_mb = state.peak_resident_mb.max(resident_mb);

        let resident_percent = if total_mb > 0 {
            (resident_mb as f32 / total_mb as f32) * 100.0
        } else {
            0.0
        };

        Some(ResourceSnapshot {
            cpu_usage,
            resident_mb,
            resident_percent,
            peak_resident_mb: state.peak_resident_mb,
            elapsed: self.started.elapsed(),
        })
    }

    pub fn log_phase(&self, phase: &str) {
        if let Some(snapshot) = self.snapshot() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB ({:.1}%), Peak: {}MB, Time: {:?}",
                phase,
                snapshot.cpu_usage,
                snapshot.resident_mb,
                snapshot.resident_percent,
                snapshot.peak_resident_mb,
                snapshot.elapsed
            );
        }
    }

    pub fn log_summary(&self) {
        if let Some(snapshot) = self.snapshot() {
            tracing::info!(
                "📊 Conversion finished - Total Time: {:?}, Peak Memory: {}MB",
                snapshot.elapsed,
                snapshot.peak_resident_mb
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_phase(&self, _phase: &str) {}

    pub fn log_summary(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
