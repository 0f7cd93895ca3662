//! Master-side transport glue: owns the UDP socket, decodes each datagram,
//! dispatches it to the endpoint handlers, and replies to the origin
//! address (§6, §4.6's "transport glue").

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::Result;
use crate::master::handlers;
use crate::messages;
use crate::store::StateStore;

/// Serves the master's request endpoints over UDP until the process exits.
///
/// A single socket multiplexes `ping`/`request`/`task` — the variant tag in
/// the decoded [`messages::Envelope`] stands in for the named endpoints §6
/// describes, since the wire framing itself (CoAP, response codes) is an
/// external collaborator this crate doesn't implement. Each datagram is
/// dispatched on its own spawned task so independent requests run
/// concurrently (§5: "request handlers may run in parallel on independent
/// worker tasks"); ordering is preserved per-agent because the state store's
/// own locking serializes any two mutations that actually touch the same
/// record.
pub async fn serve(addr: SocketAddr, store: StateStore) -> Result<()> {
    let socket = Arc::new(UdpSocket::bind(addr).await?);
    tracing::info!(%addr, "master UDP transport listening");

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "udp recv failed, continuing");
                continue;
            }
        };

        let request = match messages::decode(&buf[..len]) {
            Ok(request) => request,
            Err(e) => {
                warn!(%from, error = %e, "dropping undecodable datagram");
                continue;
            }
        };

        let store = store.clone();
        let socket = Arc::clone(&socket);
        tokio::spawn(async move {
            debug!(%from, "dispatching request");
            let Some(response) = handlers::dispatch(&store, request).await else {
                return;
            };

            match messages::encode(&response) {
                Ok(payload) => {
                    if let Err(e) = socket.send_to(&payload, from).await {
                        warn!(%from, error = %e, "failed to send response");
                    }
                }
                Err(e) => warn!(error = %e, "failed to encode response"),
            }
        });
    }
}
