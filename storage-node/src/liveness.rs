//! UDP liveness check.
//!
//! [`wait_for_server`] keeps sending `ping` until something answers or the
//! overall timeout passes. [`EchoResponder`] is the matching server side.

use std::{future::Future, io, net::SocketAddr, time::Duration};

use thiserror::Error;
use tokio::{net::UdpSocket, select, time::timeout};
use tracing::{debug, info, warn};

pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(3);
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

const PING: &[u8] = b"ping";
const PONG: &[u8] = b"pong";

#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("no socket address found for {0}")]
    NoAddress(String),
    #[error("liveness socket error: {0}")]
    Io(#[from] io::Error),
    #[error("no reply from {addr} within {timeout:?}")]
    Timeout { addr: SocketAddr, timeout: Duration },
}

/// Pings `address` until it replies, for at most `within`.
pub async fn wait_for_server(address: &str, within: Duration) -> Result<(), LivenessError> {
    let addr = tokio::net::lookup_host(address)
        .await
        .map_err(|source| LivenessError::Resolve {
            addr: address.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| LivenessError::NoAddress(address.to_string()))?;

    let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(addr).await?;

    info!(%addr, "waiting for server");
    timeout(within, ping_until_reply(&socket))
        .await
        .map_err(|_| LivenessError::Timeout {
            addr,
            timeout: within,
        })?
}

async fn ping_until_reply(socket: &UdpSocket) -> Result<(), LivenessError> {
    let mut buf = [0u8; 512];
    loop {
        socket.send(PING).await?;
        match timeout(RETRY_INTERVAL, socket.recv(&mut buf)).await {
            Ok(Ok(_)) => return Ok(()),
            Ok(Err(err)) => {
                // Usually ECONNREFUSED while nothing listens on the port yet.
                debug!(error = ?err, "ping read failed");
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
            Err(_) => debug!("no reply yet"),
        }
    }
}

/// Answers `ping` with `pong` and echoes every other datagram.
pub struct EchoResponder {
    socket: UdpSocket,
}

impl EchoResponder {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let EchoResponder { socket } = self;
        tokio::pin!(shutdown);
        let mut buf = [0u8; 512];

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("echo responder shutting down");
                    break;
                }
                received = socket.recv_from(&mut buf) => {
                    let (len, peer) = match received {
                        Ok(received) => received,
                        Err(err) => {
                            warn!(error = ?err, "failed to receive datagram");
                            continue;
                        }
                    };
                    let payload = &buf[..len];
                    let reply = if payload == PING { PONG } else { payload };
                    if let Err(err) = socket.send_to(reply, peer).await {
                        warn!(peer = %peer, error = ?err, "failed to send reply");
                    }
                }
            }
        }
    }
}
