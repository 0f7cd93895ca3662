//! Derives a stable agent id and a human name at start-up (§4.4 step 1).

use tracing::warn;

/// Identity an agent advertises to the master. `id` must be stable across
/// restarts so the master's `last_ping`/task bindings keep referring to the
/// same record.
pub struct AgentIdentity {
    pub id: String,
    pub name: String,
}

impl AgentIdentity {
    /// Derives `id` from the primary network interface's MAC address, the
    /// most stable hardware identity available on a constrained worker
    /// machine. When no interface reports a MAC (containers, some VMs), a
    /// fresh UUID is used instead — a documented fallback the original
    /// (MAC-only) implementation doesn't need to make because it assumes
    /// bare-metal workers.
    pub fn derive() -> Self {
        let id = mac_address::get_mac_address()
            .ok()
            .flatten()
            .map(|mac| mac.to_string())
            .unwrap_or_else(|| {
                warn!("no MAC address available, falling back to a random agent id");
                uuid::Uuid::new_v4().to_string()
            });

        let name = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string());

        Self { id, name }
    }
}
