//! The master process: UDP control-plane transport, background reaper, and
//! the read-only HTTP JSON API, all sharing one [`StateStore`] (§4.5, §4.6,
//! §6).

pub mod api;
pub mod handlers;
pub mod reaper;
pub mod transport;

use std::net::SocketAddr;

use tracing::error;

use crate::error::Result;
use crate::store::StateStore;

/// Runs the master's two servers (UDP control plane, HTTP read API) and the
/// background reaper concurrently, `tokio::select!`ing between the control
/// plane and the API server so either one failing surfaces immediately
/// rather than leaving the other running headless.
pub async fn run(udp_addr: SocketAddr, api_host: &str, api_port: u16) -> Result<()> {
    let store = StateStore::new();
    let _reaper = reaper::spawn(store.clone(), None);

    tokio::select! {
        result = transport::serve(udp_addr, store.clone()) => {
            if let Err(e) = result {
                error!(error = %e, "UDP transport failed");
            }
        }
        result = api::run(api_host, api_port, store) => {
            if let Err(e) = result {
                error!(error = %e, "HTTP API failed");
            }
        }
    }

    Ok(())
}
