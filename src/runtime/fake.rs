//! An in-memory [`ContainerRuntime`] for agent control-loop tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ContainerHandle, ContainerRuntime, ImageHandle, RunSpec};
use crate::error::{Error, Result};
use crate::messages::TaskState;

#[derive(Debug, Clone)]
struct FakeContainer {
    state: TaskState,
    logs: Vec<u8>,
}

/// Scripts container lifecycles for tests: each task advances through a
/// caller-supplied sequence of states, one step per [`ContainerRuntime::status`]
/// call, so a test can simulate `STARTING -> RUNNING -> COMPLETED` without a
/// real daemon.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    containers: Arc<Mutex<HashMap<String, FakeContainer>>>,
    scripts: Arc<Mutex<HashMap<String, Vec<TaskState>>>>,
    pulls: Arc<Mutex<Vec<String>>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the sequence of states `status()` should walk through for
    /// `task_id`, one per call, holding on the last entry once exhausted.
    pub async fn script(&self, task_id: &str, states: Vec<TaskState>) {
        self.scripts
            .lock()
            .await
            .insert(task_id.to_string(), states);
    }

    pub async fn pulled_images(&self) -> Vec<String> {
        self.pulls.lock().await.clone()
    }

    pub async fn set_logs(&self, task_id: &str, logs: &[u8]) {
        if let Some(container) = self.containers.lock().await.get_mut(task_id) {
            container.logs = logs.to_vec();
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ensure_image(&self, image: &str, _force_pull: bool) -> Result<ImageHandle> {
        self.pulls.lock().await.push(image.to_string());
        Ok(ImageHandle(image.to_string()))
    }

    async fn run(&self, spec: &RunSpec) -> Result<ContainerHandle> {
        self.containers.lock().await.insert(
            spec.task_id.clone(),
            FakeContainer {
                state: TaskState::Starting,
                logs: Vec::new(),
            },
        );
        Ok(ContainerHandle(spec.container_name()))
    }

    async fn status(&self, task_id: &str) -> Result<TaskState> {
        let mut scripts = self.scripts.lock().await;
        if let Some(steps) = scripts.get_mut(task_id) {
            if !steps.is_empty() {
                let next = if steps.len() > 1 {
                    steps.remove(0)
                } else {
                    steps[0]
                };
                if let Some(container) = self.containers.lock().await.get_mut(task_id) {
                    container.state = next;
                }
                return Ok(next);
            }
        }

        self.containers
            .lock()
            .await
            .get(task_id)
            .map(|c| c.state)
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))
    }

    async fn logs(&self, task_id: &str, tail_lines: usize) -> Result<Vec<u8>> {
        let containers = self.containers.lock().await;
        let container = containers
            .get(task_id)
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))?;
        let lines: Vec<&[u8]> = container.logs.split(|&b| b == b'\n').collect();
        let start = lines.len().saturating_sub(tail_lines);
        Ok(lines[start..].join(&b'\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_walks_the_scripted_sequence() {
        let runtime = FakeRuntime::new();
        runtime
            .run(&RunSpec {
                task_id: "t1".to_string(),
                framework_name: "fw".to_string(),
                image: "nginx".to_string(),
                cpu_shares: 1.0,
                mem_limit_bytes: 1024,
                network: crate::messages::NetworkMode::Bridge,
                port_mappings: vec![],
            })
            .await
            .unwrap();

        runtime
            .script(
                "t1",
                vec![TaskState::Starting, TaskState::Running, TaskState::Completed],
            )
            .await;

        assert_eq!(runtime.status("t1").await.unwrap(), TaskState::Starting);
        assert_eq!(runtime.status("t1").await.unwrap(), TaskState::Running);
        assert_eq!(runtime.status("t1").await.unwrap(), TaskState::Completed);
        assert_eq!(runtime.status("t1").await.unwrap(), TaskState::Completed);
    }

    #[tokio::test]
    async fn logs_returns_only_the_tail() {
        let runtime = FakeRuntime::new();
        runtime
            .run(&RunSpec {
                task_id: "t1".to_string(),
                framework_name: "fw".to_string(),
                image: "nginx".to_string(),
                cpu_shares: 1.0,
                mem_limit_bytes: 1024,
                network: crate::messages::NetworkMode::Bridge,
                port_mappings: vec![],
            })
            .await
            .unwrap();
        runtime.set_logs("t1", b"a\nb\nc\nd\ne").await;

        let tail = runtime.logs("t1", 2).await.unwrap();
        assert_eq!(tail, b"d\ne");
    }
}
