//! CLI surfaces for the two binaries (§6). Flags are parsed with `clap`,
//! with `.env` values loaded by `dotenvy` ahead of `parse()` honored through
//! `clap`'s `env` feature. There are no secrets to validate here — the
//! master/agent split carries no authentication in scope (§1).

use clap::Parser;

fn default_master_port() -> u16 {
    5683
}

fn default_api_port() -> u16 {
    8080
}

#[derive(Debug, Parser)]
#[command(name = "master", about = "Edge RM master: control plane + read API")]
pub struct MasterArgs {
    /// LAN IP to bind both servers to.
    #[arg(long, env = "EDGE_RM_HOST")]
    pub host: String,

    /// UDP port for the agent/framework control plane.
    #[arg(long, env = "EDGE_RM_PORT", default_value_t = default_master_port())]
    pub port: u16,

    /// TCP port for the read-only HTTP JSON API.
    #[arg(long = "api-port", env = "EDGE_RM_API_PORT", default_value_t = default_api_port())]
    pub api_port: u16,
}

#[derive(Debug, Parser)]
#[command(name = "agent", about = "Edge RM agent: heartbeats and runs tasks")]
pub struct AgentArgs {
    /// Master IP (or hostname, DNS-resolved) to register with.
    #[arg(long, env = "EDGE_RM_MASTER_HOST")]
    pub host: String,

    /// Master's UDP control-plane port.
    #[arg(long, env = "EDGE_RM_MASTER_PORT", default_value_t = default_master_port())]
    pub port: u16,

    /// Heartbeat cadence in milliseconds.
    #[arg(long = "ping-rate-ms", env = "EDGE_RM_PING_RATE_MS", default_value_t = 1000)]
    pub ping_rate_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_args_parse_with_defaults() {
        let args = MasterArgs::parse_from(["master", "--host", "10.0.0.1"]);
        assert_eq!(args.host, "10.0.0.1");
        assert_eq!(args.port, 5683);
        assert_eq!(args.api_port, 8080);
    }

    #[test]
    fn agent_args_parse_with_overrides() {
        let args = AgentArgs::parse_from([
            "agent",
            "--host",
            "master.local",
            "--port",
            "6000",
            "--ping-rate-ms",
            "500",
        ]);
        assert_eq!(args.host, "master.local");
        assert_eq!(args.port, 6000);
        assert_eq!(args.ping_rate_ms, 500);
    }
}
