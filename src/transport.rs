//! Abstract request/response transport (§6's "constrained-network
//! RESTful UDP-based protocol", treated here as an external collaborator).
//!
//! The core only depends on [`MessageTransport`]; [`UdpTransport`] is the
//! concrete agent-side client used against a real master.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::{Error, Result};
use crate::messages::{self, Envelope};

/// What the agent's control loop depends on to exchange one request/response
/// pair with the master. Every exchange carries its own timeout; a timeout
/// never mutates local state (§5).
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn exchange(&self, request: &Envelope, timeout: Duration) -> Result<Envelope>;
}

/// UDP client transport: one datagram out, one datagram back, within the
/// caller-supplied timeout. Named endpoints (`ping`, `request`, `task`) are
/// folded into the single `Envelope` tag rather than separate sockets/paths —
/// the framing detail §6 calls out as a wire-protocol concern this crate
/// doesn't own.
pub struct UdpTransport {
    socket: UdpSocket,
    master_addr: SocketAddr,
}

impl UdpTransport {
    pub async fn connect(master_addr: SocketAddr) -> Result<Self> {
        let bind_addr: SocketAddr = if master_addr.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        Ok(Self {
            socket,
            master_addr,
        })
    }
}

#[async_trait]
impl MessageTransport for UdpTransport {
    async fn exchange(&self, request: &Envelope, timeout: Duration) -> Result<Envelope> {
        let payload = messages::encode(request)?;
        self.socket
            .send_to(&payload, self.master_addr)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let mut buf = vec![0u8; 64 * 1024];
        let recv = tokio::time::timeout(timeout, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| Error::Timeout(timeout))?
            .map_err(|e| Error::Transport(e.to_string()))?;

        let (len, from) = recv;
        debug!(%from, len, "received response datagram");
        messages::decode(&buf[..len])
    }
}
