//! The process-wide in-memory registry of agents, tasks, and frameworks.
//!
//! [`StateStore`] is the only component in the crate that holds shared
//! mutable state; every mutation goes through one of its methods so the
//! locking discipline lives in a single place (§9's "no global variable
//! escapes this component").

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::messages::{AgentInfo, FrameworkInfo, Offer, TaskInfo, TaskState};

/// Milliseconds since the Unix epoch. The store never reads the wall clock
/// itself; callers pass `now_ms` so tests can drive time deterministically.
pub type Millis = u64;

pub fn now_ms() -> Millis {
    chrono::Utc::now().timestamp_millis() as Millis
}

#[derive(Debug, Clone)]
struct AgentRecord {
    info: AgentInfo,
    last_ping_ms: Millis,
}

impl AgentRecord {
    /// Invariant 4: an agent is alive iff `now - last_ping <= 2 * ping_rate_ms`.
    fn is_alive(&self, now_ms: Millis) -> bool {
        now_ms.saturating_sub(self.last_ping_ms) <= 2 * self.info.ping_rate_ms
    }

    /// Invariant 4's `2 * ping_rate_ms`, with no floor: §4.2 also mentions a
    /// `max(ping_rate_ms, 5000)` clamp, but that reading contradicts §3
    /// invariant 4 and the exact-boundary scenario in §8 for agents with a
    /// sub-5s cadence. Resolved in favor of invariant 4 (see DESIGN.md); the
    /// `max(.., 5000)` floor is honored instead as the background sweep's
    /// default *cadence* in `master::reaper`, which is a cheap/free-to-be-slower
    /// knob rather than a correctness-bearing one.
    fn reap_threshold_ms(&self) -> Millis {
        2 * self.info.ping_rate_ms
    }
}

#[derive(Default)]
struct Registry {
    agents: HashMap<String, AgentRecord>,
    tasks: HashMap<String, TaskInfo>,
    frameworks: HashMap<String, FrameworkInfo>,
    /// Insertion order for `tasks`, used to break ties deterministically in
    /// `next_unissued_for_agent` (§4.2: "tie-breaking ... unspecified;
    /// implementations should pick deterministically").
    task_order: Vec<String>,
}

/// The shared agent/task/framework registry.
///
/// Cloning a `StateStore` clones the `Arc`, not the data; every clone sees
/// the same registry. A single `RwLock` guards the whole registry rather
/// than per-entity locks — simple, and the entity counts in scope for this
/// system (dozens to low thousands of agents) never make lock contention a
/// bottleneck in practice.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<RwLock<Registry>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Registry::default())),
        }
    }

    /// Upsert by `agent.id`, refreshing `last_ping`. Never fails.
    pub async fn refresh_agent(&self, agent: AgentInfo, now_ms: Millis) -> String {
        let id = agent.id.clone();
        let mut reg = self.inner.write().await;
        reg.agents.insert(
            id.clone(),
            AgentRecord {
                info: agent,
                last_ping_ms: now_ms,
            },
        );
        debug!(agent_id = %id, "refreshed agent");
        id
    }

    /// Folds reported task states into the store.
    ///
    /// For each reported task: if the id is known, overwrite `state` (and
    /// `error_message`, when set); otherwise insert the report verbatim —
    /// tolerating an agent that outlived a master restart (§4.2).
    pub async fn refresh_task_states(&self, reported: Vec<TaskInfo>) {
        let mut reg = self.inner.write().await;
        for task in reported {
            match reg.tasks.get_mut(&task.task_id) {
                Some(existing) => {
                    existing.state = task.state;
                    if task.error_message.is_some() {
                        existing.error_message = task.error_message;
                    }
                }
                None => {
                    reg.task_order.push(task.task_id.clone());
                    reg.tasks.insert(task.task_id.clone(), task);
                }
            }
        }
    }

    /// Inserts a new task as `UNISSUED` and upserts its framework.
    ///
    /// If a task with the same id already exists in a non-`UNISSUED` state,
    /// that state is preserved rather than reset — a deliberate tightening
    /// of the original's resurrect-to-`UNISSUED` behavior (§8, §9 Open
    /// Question 1; recorded in DESIGN.md).
    pub async fn add_task(&self, task: TaskInfo, framework: FrameworkInfo) -> String {
        let mut reg = self.inner.write().await;
        let task_id = task.task_id.clone();

        reg.frameworks.insert(framework.framework_id.clone(), framework);

        match reg.tasks.get(&task_id) {
            Some(existing) if existing.state != TaskState::Unissued => {
                debug!(%task_id, state = %existing.state, "add_task: preserving non-unissued state");
            }
            _ => {
                if !reg.tasks.contains_key(&task_id) {
                    reg.task_order.push(task_id.clone());
                }
                reg.tasks.insert(task_id.clone(), task);
                info!(%task_id, "task added as UNISSUED");
            }
        }

        task_id
    }

    /// Atomically finds the (deterministically) first `UNISSUED` task bound
    /// to `agent_id`, flips it to `ISSUED`, and returns it.
    ///
    /// A single write-lock critical section makes this at-most-once under
    /// concurrent pings for the same agent (§3 invariant 2, §5).
    pub async fn next_unissued_for_agent(&self, agent_id: &str) -> Option<TaskInfo> {
        let mut reg = self.inner.write().await;
        let task_id = reg
            .task_order
            .iter()
            .find(|id| {
                reg.tasks
                    .get(*id)
                    .is_some_and(|t| t.agent_id == agent_id && t.state == TaskState::Unissued)
            })
            .cloned()?;

        let task = reg.tasks.get_mut(&task_id).expect("looked up above");
        task.state = TaskState::Issued;
        Some(task.clone())
    }

    pub async fn list_agents(&self) -> Vec<(AgentInfo, Millis)> {
        let reg = self.inner.read().await;
        reg.agents
            .values()
            .map(|r| (r.info.clone(), r.last_ping_ms))
            .collect()
    }

    pub async fn list_tasks(&self) -> Vec<TaskInfo> {
        let reg = self.inner.read().await;
        reg.task_order
            .iter()
            .filter_map(|id| reg.tasks.get(id).cloned())
            .collect()
    }

    pub async fn list_frameworks(&self) -> Vec<FrameworkInfo> {
        let reg = self.inner.read().await;
        reg.frameworks.values().cloned().collect()
    }

    pub fn offer_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Builds one offer per live agent, each with a fresh `offer_id` and the
    /// agent's `resources`/`attributes` copied verbatim (§4.5). Resources are
    /// never decremented by outstanding tasks (§3 invariant 5).
    pub async fn build_offers(&self, framework_id: &str) -> Vec<Offer> {
        let reg = self.inner.read().await;
        reg.agents
            .values()
            .map(|record| Offer {
                offer_id: uuid::Uuid::new_v4().to_string(),
                framework_id: framework_id.to_string(),
                agent_id: record.info.id.clone(),
                resources: record.info.resources.clone(),
                attributes: record.info.attributes.clone(),
            })
            .collect()
    }

    /// Evicts agents whose heartbeat lapsed more than `2 * ping_rate_ms` ago
    /// (no floor; invariant 4). Tasks bound to a reaped agent are left in
    /// place (§4.2).
    pub async fn reap_stale_agents(&self, now_ms: Millis) -> Vec<String> {
        let mut reg = self.inner.write().await;
        let stale: Vec<String> = reg
            .agents
            .iter()
            .filter(|(_, record)| {
                now_ms.saturating_sub(record.last_ping_ms) > record.reap_threshold_ms()
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            reg.agents.remove(id);
            info!(agent_id = %id, "reaped stale agent");
        }
        stale
    }

    /// Invariant 4, exposed directly for tests and for any caller that wants
    /// to check a single agent without listing all of them.
    pub async fn is_agent_alive(&self, agent_id: &str, now_ms: Millis) -> bool {
        let reg = self.inner.read().await;
        reg.agents
            .get(agent_id)
            .is_some_and(|record| record.is_alive(now_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ContainerKind, ContainerSpec, NetworkMode, Resource};

    fn agent(id: &str, ping_rate_ms: u64) -> AgentInfo {
        AgentInfo {
            id: id.to_string(),
            name: format!("worker-{id}"),
            ping_rate_ms,
            resources: vec![Resource::cpus(4.0), Resource::mem(8_000_000_000.0)],
            attributes: vec![],
        }
    }

    fn task(id: &str, agent_id: &str) -> TaskInfo {
        TaskInfo {
            task_id: id.to_string(),
            name: "nginx".to_string(),
            framework: FrameworkInfo {
                framework_id: "f1".to_string(),
                name: "fw".to_string(),
            },
            agent_id: agent_id.to_string(),
            resources: vec![Resource::cpus(1.0)],
            container: ContainerSpec {
                kind: ContainerKind::Docker,
                image: "nginx".to_string(),
                network: NetworkMode::Bridge,
                port_mappings: vec![],
            },
            state: TaskState::Unissued,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn refresh_agent_upserts_and_updates_last_ping() {
        let store = StateStore::new();
        store.refresh_agent(agent("aaa", 1000), 1_000).await;
        store.refresh_agent(agent("aaa", 1000), 2_000).await;

        let agents = store.list_agents().await;
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].1, 2_000);
    }

    #[tokio::test]
    async fn add_task_then_next_unissued_is_at_most_once() {
        let store = StateStore::new();
        store.refresh_agent(agent("aaa", 1000), 0).await;
        store
            .add_task(task("t1", "aaa"), FrameworkInfo {
                framework_id: "f1".to_string(),
                name: "fw".to_string(),
            })
            .await;

        let first = store.next_unissued_for_agent("aaa").await;
        assert!(first.is_some());
        assert_eq!(first.unwrap().state, TaskState::Issued);

        let second = store.next_unissued_for_agent("aaa").await;
        assert!(second.is_none());

        let stored = store.list_tasks().await;
        assert_eq!(stored[0].state, TaskState::Issued);
    }

    #[tokio::test]
    async fn re_adding_a_non_unissued_task_preserves_its_state() {
        let store = StateStore::new();
        let framework = FrameworkInfo {
            framework_id: "f1".to_string(),
            name: "fw".to_string(),
        };
        store.add_task(task("t1", "aaa"), framework.clone()).await;
        store.next_unissued_for_agent("aaa").await;

        // agent reports RUNNING
        let mut running = task("t1", "aaa");
        running.state = TaskState::Running;
        store.refresh_task_states(vec![running]).await;

        // framework resubmits the same task id (e.g. a retry)
        store.add_task(task("t1", "aaa"), framework).await;

        let tasks = store.list_tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].state, TaskState::Running);
    }

    #[tokio::test]
    async fn refresh_task_states_inserts_unknown_tasks_verbatim() {
        let store = StateStore::new();
        let mut reported = task("ghost", "aaa");
        reported.state = TaskState::Running;
        store.refresh_task_states(vec![reported]).await;

        let tasks = store.list_tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_id, "ghost");
        assert_eq!(tasks[0].state, TaskState::Running);
    }

    #[tokio::test]
    async fn reap_boundary_matches_spec_exactly() {
        let store = StateStore::new();
        store.refresh_agent(agent("aaa", 1000), 0).await;

        // exactly 2 * ping_rate: retained
        let reaped = store.reap_stale_agents(2000).await;
        assert!(reaped.is_empty());
        assert_eq!(store.list_agents().await.len(), 1);

        // one ms past: removed
        let reaped = store.reap_stale_agents(2001).await;
        assert_eq!(reaped, vec!["aaa".to_string()]);
        assert!(store.list_agents().await.is_empty());
    }

    #[tokio::test]
    async fn reaping_an_agent_does_not_touch_its_tasks() {
        let store = StateStore::new();
        store.refresh_agent(agent("aaa", 1000), 0).await;
        store
            .add_task(task("t1", "aaa"), FrameworkInfo {
                framework_id: "f1".to_string(),
                name: "fw".to_string(),
            })
            .await;
        store.next_unissued_for_agent("aaa").await;

        store.reap_stale_agents(5000).await;

        let tasks = store.list_tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].state, TaskState::Issued);
    }

    #[tokio::test]
    async fn offers_reflect_latest_resources_verbatim() {
        let store = StateStore::new();
        store.refresh_agent(agent("aaa", 1000), 0).await;

        let offers = store.build_offers("f1").await;
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].agent_id, "aaa");
        assert_eq!(offers[0].resources.len(), 2);
    }

    #[tokio::test]
    async fn offer_request_with_no_agents_returns_empty_offers() {
        let store = StateStore::new();
        let offers = store.build_offers("f1").await;
        assert!(offers.is_empty());
    }
}
