//! The agent-side container lifecycle adapter (§4.3).
//!
//! [`ContainerRuntime`] is the capability interface the control loop depends
//! on; [`docker`] implements it against a real Docker daemon, [`fake`]
//! supplies an in-memory stand-in for tests.

pub mod docker;
pub mod fake;

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::{NetworkMode, PortMapping, TaskState};

pub use docker::DockerRuntime;
pub use fake::FakeRuntime;

/// Resolved handle to a pulled image; opaque to callers.
#[derive(Debug, Clone)]
pub struct ImageHandle(pub String);

/// Resolved handle to a running container; opaque to callers.
#[derive(Debug, Clone)]
pub struct ContainerHandle(pub String);

/// Everything the runtime needs to start a container for one task.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub task_id: String,
    pub framework_name: String,
    pub image: String,
    pub cpu_shares: f64,
    pub mem_limit_bytes: u64,
    pub network: NetworkMode,
    pub port_mappings: Vec<PortMapping>,
}

impl RunSpec {
    /// `"<framework>-<task_id>"` with whitespace replaced by `-` (§4.3).
    pub fn container_name(&self) -> String {
        format!("{}-{}", self.framework_name, self.task_id).replace(' ', "-")
    }

    /// `cpu_shares * 100_000` over a fixed 100ms period, the CFS quota/period
    /// convention Docker expects directly as container create arguments.
    pub fn cpu_quota(&self) -> i64 {
        (self.cpu_shares * 100_000.0) as i64
    }

    pub const CPU_PERIOD_US: i64 = 100_000;
}

/// Capability interface mapping task descriptors to container lifecycle
/// actions. Implementors must not hold any lock across these calls — they
/// may block on real I/O for image pulls or daemon round-trips (§5).
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ensure_image(&self, image: &str, force_pull: bool) -> Result<ImageHandle>;
    async fn run(&self, spec: &RunSpec) -> Result<ContainerHandle>;
    async fn status(&self, task_id: &str) -> Result<TaskState>;
    async fn logs(&self, task_id: &str, tail_lines: usize) -> Result<Vec<u8>>;
}
