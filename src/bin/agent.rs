use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use edge_rm::agent::{AgentIdentity, AgentRuntime, SysinfoProbe};
use edge_rm::config::AgentArgs;
use edge_rm::runtime::DockerRuntime;
use edge_rm::transport::UdpTransport;
use tracing::{error, Level};

async fn resolve_master_addr(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    if let Ok(addr) = format!("{host}:{port}").parse::<SocketAddr>() {
        return Ok(addr);
    }

    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("could not resolve {host}"))
        })
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = AgentArgs::parse();
    let identity = AgentIdentity::derive();

    tracing::info!(agent_id = %identity.id, name = %identity.name, "starting edge-rm agent");

    let master_addr = match resolve_master_addr(&args.host, args.port).await {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "failed to resolve master address");
            std::process::exit(1);
        }
    };

    let transport = match UdpTransport::connect(master_addr).await {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "failed to open UDP transport");
            std::process::exit(1);
        }
    };

    let runtime = match DockerRuntime::connect() {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "failed to connect to the local Docker daemon");
            std::process::exit(1);
        }
    };

    let agent = Arc::new(AgentRuntime::new(
        identity,
        Duration::from_millis(args.ping_rate_ms),
        SysinfoProbe::new(),
        transport,
        runtime,
    ));

    agent.run().await;
}
