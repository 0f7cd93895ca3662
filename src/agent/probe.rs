//! Host resource sampling (§4.4 step 1, §1's `HostProbe` collaborator).

use async_trait::async_trait;
use sysinfo::System;

use crate::error::Result;

#[derive(Debug, Clone, Copy)]
pub struct HostSample {
    /// Available cores, as a fractional scalar: `sum((100 - percpu_percent) / 100)`.
    pub cpus: f64,
    /// Available memory, in bytes.
    pub mem_bytes: u64,
}

/// Capability interface the control loop samples once per cycle. Production
/// code uses [`SysinfoProbe`]; tests supply a fixed-value fake.
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn sample(&self) -> Result<HostSample>;
}

/// Samples CPU and memory via `sysinfo`, the ecosystem's cross-platform
/// substitute for the original's `psutil` calls.
pub struct SysinfoProbe {
    system: tokio::sync::Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            system: tokio::sync::Mutex::new(system),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostProbe for SysinfoProbe {
    async fn sample(&self) -> Result<HostSample> {
        let mut system = self.system.lock().await;

        // A 1-second sampling window, matching `psutil.cpu_percent(interval=1)`.
        system.refresh_cpu_all();
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        system.refresh_cpu_all();

        let cpus: f64 = system
            .cpus()
            .iter()
            .map(|cpu| (100.0 - cpu.cpu_usage() as f64) / 100.0)
            .sum();

        system.refresh_memory();
        let mem_bytes = system.available_memory();

        Ok(HostSample { cpus, mem_bytes })
    }
}

#[cfg(test)]
pub struct FixedProbe {
    pub sample: HostSample,
}

#[cfg(test)]
#[async_trait]
impl HostProbe for FixedProbe {
    async fn sample(&self) -> Result<HostSample> {
        Ok(self.sample)
    }
}
