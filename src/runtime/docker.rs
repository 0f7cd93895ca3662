//! Production [`ContainerRuntime`] backed by a local Docker daemon.
//!
//! Grounded on `original_source/agent/python/dockerhelper.py`'s
//! image-resolution and exit-code mapping, expressed against `bollard`
//! instead of hand-rolled HTTP-over-socket calls.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogsOptions, StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ContainerHandle, ContainerRuntime, ImageHandle, RunSpec};
use crate::error::{Error, Result};
use crate::messages::{NetworkMode, TaskState};

pub struct DockerRuntime {
    docker: Docker,
    /// task_id -> container id, read/written only from the agent's control
    /// loop; the mutex exists to satisfy `Send` across await points, not to
    /// arbitrate contention (§5: "needs no locking").
    containers: Arc<Mutex<HashMap<String, String>>>,
}

impl DockerRuntime {
    pub fn connect() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|e| Error::Runtime(e.to_string()))?;
        Ok(Self {
            docker,
            containers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    async fn container_id(&self, task_id: &str) -> Result<String> {
        self.containers
            .lock()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))
    }
}

fn network_mode_str(mode: NetworkMode) -> &'static str {
    match mode {
        NetworkMode::Host => "host",
        NetworkMode::Bridge => "bridge",
        NetworkMode::None => "none",
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ensure_image(&self, image: &str, force_pull: bool) -> Result<ImageHandle> {
        let already_present = self.docker.inspect_image(image).await.is_ok();

        if force_pull || !already_present {
            debug!(%image, "pulling image");
            let options = Some(CreateImageOptions {
                from_image: image,
                ..Default::default()
            });
            let mut stream = self.docker.create_image(options, None, None);
            while let Some(progress) = stream.next().await {
                progress.map_err(|e| Error::ImagePull {
                    image: image.to_string(),
                    message: e.to_string(),
                })?;
            }
        }

        Ok(ImageHandle(image.to_string()))
    }

    async fn run(&self, spec: &RunSpec) -> Result<ContainerHandle> {
        let name = spec.container_name();

        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
            .port_mappings
            .iter()
            .map(|p| {
                let container_key = match &p.protocol {
                    Some(proto) => format!("{}/{}", p.container_port, proto),
                    None => format!("{}/tcp", p.container_port),
                };
                (
                    container_key,
                    Some(vec![PortBinding {
                        host_ip: None,
                        host_port: Some(p.host_port.to_string()),
                    }]),
                )
            })
            .collect();

        let host_config = HostConfig {
            cpu_quota: Some(spec.cpu_quota()),
            cpu_period: Some(RunSpec::CPU_PERIOD_US),
            memory: Some(spec.mem_limit_bytes as i64),
            network_mode: Some(network_mode_str(spec.network).to_string()),
            port_bindings: Some(port_bindings),
            ..Default::default()
        };

        let config = ContainerConfig {
            image: Some(spec.image.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = Some(CreateContainerOptions {
            name: name.clone(),
            platform: None,
        });

        let created = self
            .docker
            .create_container(options, config)
            .await
            .map_err(|e| Error::Runtime(e.to_string()))?;

        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::Runtime(e.to_string()))?;

        self.containers
            .lock()
            .await
            .insert(spec.task_id.clone(), created.id.clone());

        Ok(ContainerHandle(created.id))
    }

    async fn status(&self, task_id: &str) -> Result<TaskState> {
        let container_id = self.container_id(task_id).await?;
        let inspect = self
            .docker
            .inspect_container(&container_id, None)
            .await
            .map_err(|e| Error::Runtime(e.to_string()))?;

        let status = inspect
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| format!("{s:?}").to_lowercase())
            .unwrap_or_default();

        match status.as_str() {
            "running" => Ok(TaskState::Running),
            "restarting" | "created" => Ok(TaskState::Starting),
            "exited" | "dead" | "removing" => {
                let exit_code = inspect
                    .state
                    .as_ref()
                    .and_then(|s| s.exit_code)
                    .unwrap_or(-1);
                Ok(match exit_code {
                    0 => TaskState::Completed,
                    137 => TaskState::Killed,
                    _ => TaskState::Errored,
                })
            }
            other => {
                warn!(%other, %task_id, "unrecognized container status, reporting as errored");
                Ok(TaskState::Errored)
            }
        }
    }

    async fn logs(&self, task_id: &str, tail_lines: usize) -> Result<Vec<u8>> {
        let container_id = self.container_id(task_id).await?;
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail_lines.to_string(),
            ..Default::default()
        });

        let mut stream = self.docker.logs(&container_id, options);
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            if let Ok(log) = chunk {
                out.extend_from_slice(&log.into_bytes());
            }
        }
        Ok(out)
    }
}
