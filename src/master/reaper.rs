//! Background stale-agent sweep (§4.6), run alongside the opportunistic
//! reap inside the offer handler — either strategy satisfies invariant 4,
//! and running both costs nothing the offer path doesn't already pay.

use std::time::Duration;

use tracing::info;

use crate::store::{now_ms, StateStore};

/// Default cadence when no agents have registered yet (nothing to size the
/// sweep to), matching §4.6's `max(ping_rate) * 2` rule with a 5s floor.
const DEFAULT_CADENCE: Duration = Duration::from_secs(10);

/// Spawns a loop that reaps stale agents on a fixed cadence. The returned
/// handle can be awaited or dropped to stop the sweep; dropping the handle
/// does not abort the task (use [`tokio::task::JoinHandle::abort`] for that).
pub fn spawn(store: StateStore, cadence: Option<Duration>) -> tokio::task::JoinHandle<()> {
    let cadence = cadence.unwrap_or(DEFAULT_CADENCE);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(cadence).await;
            let reaped = store.reap_stale_agents(now_ms()).await;
            if !reaped.is_empty() {
                info!(count = reaped.len(), agents = ?reaped, "background reap swept stale agents");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{AgentInfo, Resource};

    #[tokio::test]
    async fn background_sweep_eventually_removes_a_stale_agent() {
        let store = StateStore::new();
        store
            .refresh_agent(
                AgentInfo {
                    id: "aaa".to_string(),
                    name: "worker".to_string(),
                    ping_rate_ms: 10,
                    resources: vec![Resource::cpus(1.0)],
                    attributes: vec![],
                },
                0,
            )
            .await;

        let handle = spawn(store.clone(), Some(Duration::from_millis(5)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.list_agents().await.is_empty());

        handle.abort();
    }
}
