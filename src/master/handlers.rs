//! The three master-side request handlers (§4.5).
//!
//! Each handler takes a decoded request [`Envelope`] and the shared
//! [`StateStore`], returning the response to send back — or `None` when the
//! request is malformed and must be dropped silently (§7).

use tracing::{debug, info, warn};

use crate::messages::{Envelope, RunTaskPayload};
use crate::store::{now_ms, StateStore};

/// Ping handler: refresh liveness, fold in reported task states, hand back
/// at most one unissued task bound to this agent.
pub async fn handle_ping(
    store: &StateStore,
    agent: crate::messages::AgentInfo,
    tasks: Vec<crate::messages::TaskInfo>,
) -> Option<Envelope> {
    if agent.id.is_empty() {
        warn!("dropping malformed ping: empty agent id");
        return None;
    }

    let agent_id = store.refresh_agent(agent, now_ms()).await;
    store.refresh_task_states(tasks).await;

    let run_task = store
        .next_unissued_for_agent(&agent_id)
        .await
        .map(|task| {
            info!(task_id = %task.task_id, %agent_id, "dispatching task in pong");
            RunTaskPayload { task }
        });

    Some(Envelope::Pong { agent_id, run_task })
}

/// Offer request handler: reap stale agents first (the heartbeat path is the
/// only reap trigger that matters for freshness, §4.6), then snapshot every
/// live agent into one offer each.
pub async fn handle_request_offers(store: &StateStore, framework_id: String) -> Envelope {
    let reaped = store.reap_stale_agents(now_ms()).await;
    if !reaped.is_empty() {
        debug!(count = reaped.len(), "reaped stale agents before building offers");
    }

    let offers = store.build_offers(&framework_id).await;
    Envelope::Offers {
        framework_id,
        offers,
    }
}

/// Task submission handler: store the task as `UNISSUED`, acknowledge.
///
/// No liveness or resource-fit validation happens here (§4.5) — that's the
/// framework's responsibility per §1.
pub async fn handle_run_task(store: &StateStore, task: crate::messages::TaskInfo) -> Envelope {
    let framework = task.framework.clone();
    let task_id = store.add_task(task, framework).await;
    Envelope::TaskAck { task_id }
}

/// Dispatches a decoded request to the matching handler. Returns `None` for
/// malformed pings and for any response-shaped envelope received where a
/// request was expected (never happens over a well-behaved transport, but a
/// stray byte sequence could decode into one).
pub async fn dispatch(store: &StateStore, request: Envelope) -> Option<Envelope> {
    match request {
        Envelope::Ping { agent, tasks } => handle_ping(store, agent, tasks).await,
        Envelope::RequestOffers { framework_id } => {
            Some(handle_request_offers(store, framework_id).await)
        }
        Envelope::RunTask { task } => Some(handle_run_task(store, task).await),
        other => {
            warn!(?other, "dropping unexpected request-shaped envelope");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{
        AgentInfo, ContainerKind, ContainerSpec, FrameworkInfo, NetworkMode, Resource, TaskInfo,
        TaskState,
    };

    fn agent_info(id: &str) -> AgentInfo {
        AgentInfo {
            id: id.to_string(),
            name: "worker-1".to_string(),
            ping_rate_ms: 1000,
            resources: vec![Resource::cpus(4.0), Resource::mem(8_000_000_000.0)],
            attributes: vec![],
        }
    }

    fn run_task_request(task_id: &str, agent_id: &str) -> Envelope {
        Envelope::RunTask {
            task: TaskInfo {
                task_id: task_id.to_string(),
                name: "nginx".to_string(),
                framework: FrameworkInfo {
                    framework_id: "f1".to_string(),
                    name: "my-framework".to_string(),
                },
                agent_id: agent_id.to_string(),
                resources: vec![Resource::cpus(1.0)],
                container: ContainerSpec {
                    kind: ContainerKind::Docker,
                    image: "nginx".to_string(),
                    network: NetworkMode::Host,
                    port_mappings: vec![],
                },
                state: TaskState::Unissued,
                error_message: None,
            },
        }
    }

    #[tokio::test]
    async fn register_then_receive_task_scenario() {
        let store = StateStore::new();

        // A1 pings bare.
        let response = dispatch(
            &store,
            Envelope::Ping {
                agent: agent_info("aaa"),
                tasks: vec![],
            },
        )
        .await
        .unwrap();
        assert_eq!(
            response,
            Envelope::Pong {
                agent_id: "aaa".to_string(),
                run_task: None
            }
        );

        // F1 requests offers.
        let response = dispatch(
            &store,
            Envelope::RequestOffers {
                framework_id: "f1".to_string(),
            },
        )
        .await
        .unwrap();
        let Envelope::Offers { offers, .. } = response else {
            panic!("expected Offers");
        };
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].agent_id, "aaa");

        // F1 submits RunTask.
        dispatch(&store, run_task_request("t1", "aaa")).await;

        // A1 pings again, receives the task.
        let response = dispatch(
            &store,
            Envelope::Ping {
                agent: agent_info("aaa"),
                tasks: vec![],
            },
        )
        .await
        .unwrap();
        let Envelope::Pong { run_task, .. } = response else {
            panic!("expected Pong");
        };
        let run_task = run_task.expect("expected a dispatched task");
        assert_eq!(run_task.task.task_id, "t1");

        let tasks = store.list_tasks().await;
        assert_eq!(tasks[0].state, TaskState::Issued);
    }

    #[tokio::test]
    async fn concurrent_pings_dispatch_the_task_exactly_once() {
        let store = StateStore::new();
        dispatch(
            &store,
            Envelope::Ping {
                agent: agent_info("aaa"),
                tasks: vec![],
            },
        )
        .await;
        dispatch(&store, run_task_request("t1", "aaa")).await;

        let store_a = store.clone();
        let store_b = store.clone();
        let (resp_a, resp_b) = tokio::join!(
            dispatch(
                &store_a,
                Envelope::Ping {
                    agent: agent_info("aaa"),
                    tasks: vec![],
                },
            ),
            dispatch(
                &store_b,
                Envelope::Ping {
                    agent: agent_info("aaa"),
                    tasks: vec![],
                },
            ),
        );

        let carries_task = |resp: &Option<Envelope>| match resp {
            Some(Envelope::Pong { run_task, .. }) => run_task.is_some(),
            _ => false,
        };

        assert_ne!(carries_task(&resp_a), carries_task(&resp_b));
    }

    #[tokio::test]
    async fn malformed_ping_with_empty_agent_id_is_dropped() {
        let store = StateStore::new();
        let response = dispatch(
            &store,
            Envelope::Ping {
                agent: agent_info(""),
                tasks: vec![],
            },
        )
        .await;

        assert!(response.is_none());
        assert!(store.list_agents().await.is_empty());
    }

    #[tokio::test]
    async fn ping_carrying_an_unknown_task_is_inserted_verbatim() {
        let store = StateStore::new();
        let mut unknown = match run_task_request("ghost", "aaa") {
            Envelope::RunTask { task } => task,
            _ => unreachable!(),
        };
        unknown.state = TaskState::Running;

        dispatch(
            &store,
            Envelope::Ping {
                agent: agent_info("aaa"),
                tasks: vec![unknown],
            },
        )
        .await;

        let tasks = store.list_tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_id, "ghost");
        assert_eq!(tasks[0].state, TaskState::Running);
    }
}
