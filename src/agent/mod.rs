//! The agent control loop (§4.4): sample, report, heartbeat, dispatch.

pub mod identity;
pub mod probe;

pub use identity::AgentIdentity;
pub use probe::{HostProbe, HostSample, SysinfoProbe};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::messages::{AgentInfo, ContainerKind, Envelope, Resource, TaskInfo, TaskState};
use crate::runtime::{ContainerRuntime, RunSpec};
use crate::transport::MessageTransport;
use crate::Result;

/// Runs the periodic heartbeat loop described in §4.4.
///
/// Generic over its three capability dependencies so production code wires
/// up [`SysinfoProbe`]/[`UdpTransport`](crate::transport::UdpTransport)/
/// [`DockerRuntime`](crate::runtime::DockerRuntime) and tests wire up fakes.
pub struct AgentRuntime<P, T, R> {
    identity: AgentIdentity,
    ping_rate: Duration,
    probe: P,
    transport: T,
    runtime: R,
    /// task_id -> last known TaskInfo this agent is tracking locally.
    tasks: Mutex<HashMap<String, TaskInfo>>,
}

impl<P, T, R> AgentRuntime<P, T, R>
where
    P: HostProbe,
    T: MessageTransport,
    R: ContainerRuntime,
{
    pub fn new(identity: AgentIdentity, ping_rate: Duration, probe: P, transport: T, runtime: R) -> Self {
        Self {
            identity,
            ping_rate,
            probe,
            transport,
            runtime,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Runs forever, one iteration per `ping_rate`. Transient failures never
    /// terminate the loop (§4.4 step 5).
    pub async fn run(self: Arc<Self>) {
        info!(agent_id = %self.identity.id, "agent control loop starting");
        loop {
            if let Err(e) = self.tick().await {
                warn!(error = %e, "heartbeat cycle failed, will retry next cycle");
            }
            tokio::time::sleep(self.ping_rate).await;
        }
    }

    async fn tick(&self) -> Result<()> {
        let sample = self.probe.sample().await?;
        let reported_tasks = self.refresh_local_task_states().await;

        let agent_info = AgentInfo {
            id: self.identity.id.clone(),
            name: self.identity.name.clone(),
            ping_rate_ms: self.ping_rate.as_millis() as u64,
            resources: vec![
                Resource::cpus(sample.cpus),
                Resource::mem(sample.mem_bytes as f64),
            ],
            attributes: vec![],
        };

        let request = Envelope::Ping {
            agent: agent_info,
            tasks: reported_tasks,
        };

        let timeout = self.ping_rate * 2;
        let response = match self.transport.exchange(&request, timeout).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "ping exchange failed, skipping this cycle");
                return Ok(());
            }
        };

        self.handle_pong(response).await;
        Ok(())
    }

    /// Refreshes every locally tracked task from the runtime, fetching a logs
    /// tail and recording `error_message` when a task has errored (§4.4
    /// step 2, §4.3).
    async fn refresh_local_task_states(&self) -> Vec<TaskInfo> {
        let mut tasks = self.tasks.lock().await;
        let mut reported = Vec::with_capacity(tasks.len());

        for task in tasks.values_mut() {
            match self.runtime.status(&task.task_id).await {
                Ok(state) => {
                    task.state = state;
                    if state == TaskState::Errored {
                        match self.runtime.logs(&task.task_id, 100).await {
                            Ok(logs) => {
                                task.error_message =
                                    Some(String::from_utf8_lossy(&logs).into_owned());
                            }
                            Err(e) => warn!(task_id = %task.task_id, error = %e, "failed to fetch logs"),
                        }
                    }
                }
                Err(e) => {
                    debug!(task_id = %task.task_id, error = %e, "runtime has no status for task");
                }
            }
            reported.push(task.clone());
        }

        reported
    }

    /// If the pong carries a task, dispatches it to the runtime (§4.4 step 4).
    /// Non-DOCKER kinds are acknowledged but never run (§7).
    async fn handle_pong(&self, response: Envelope) {
        let Envelope::Pong { run_task, .. } = response else {
            warn!("expected Pong in response to Ping, ignoring");
            return;
        };

        let Some(payload) = run_task else {
            return;
        };

        let task = payload.task;
        if task.container.kind != ContainerKind::Docker {
            warn!(task_id = %task.task_id, "unsupported container kind, acknowledging without running");
            self.tasks.lock().await.insert(task.task_id.clone(), task);
            return;
        }

        info!(task_id = %task.task_id, image = %task.container.image, "dispatching task to runtime");
        self.tasks
            .lock()
            .await
            .insert(task.task_id.clone(), task.clone());

        if let Err(e) = self.dispatch(&task).await {
            error!(task_id = %task.task_id, error = %e, "failed to start task");
        }
    }

    async fn dispatch(&self, task: &TaskInfo) -> Result<()> {
        self.runtime.ensure_image(&task.container.image, false).await?;

        let cpu_shares = task
            .resources
            .iter()
            .find(|r| r.name == "cpus")
            .and_then(|r| r.scalar())
            .unwrap_or(0.0);
        let mem_limit_bytes = task
            .resources
            .iter()
            .find(|r| r.name == "mem")
            .and_then(|r| r.scalar())
            .unwrap_or(0.0) as u64;

        let spec = RunSpec {
            task_id: task.task_id.clone(),
            framework_name: task.framework.name.clone(),
            image: task.container.image.clone(),
            cpu_shares,
            mem_limit_bytes,
            network: task.container.network,
            port_mappings: task.container.port_mappings.clone(),
        };

        self.runtime.run(&spec).await?;
        Ok(())
    }
}
