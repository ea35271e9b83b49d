use std::net::IpAddr;

use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tokio::net::UdpSocket;
use tracing::trace;

/// One inbound event observed on the covert channel.
///
/// For a frame, `peer_addr` is the observed address field carrying the
/// encoded literal and the datagram body is empty; for an acknowledgment,
/// `payload` is the acknowledgment text and `peer_addr` identifies the peer
/// to answer to.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Inbound {
    pub payload: Vec<u8>,
    pub peer_addr: String,
    pub peer_port: u16,
}

/// Sends and receives opaque frames addressed to / from a peer. Actually
/// placing packets on the wire (raw sockets, privileges) is this
/// collaborator's business; the reliability core only ever sees address
/// strings and payload bytes. Introduced as a trait to mock the I/O away for
/// testing.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, payload: &[u8], peer_addr: &str, peer_port: u16) -> anyhow::Result<()>;

    async fn recv(&self) -> anyhow::Result<Inbound>;
}

/// Default transport backed by a plain UDP socket. A deployment that wants
/// the address field of the outer packet under its control replaces this with
/// a raw-socket implementation; the core does not care.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind(bind_addr: &str, port: u16) -> anyhow::Result<UdpTransport> {
        let socket = UdpSocket::bind((bind_addr, port)).await?;
        Ok(UdpTransport { socket })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, payload: &[u8], peer_addr: &str, peer_port: u16) -> anyhow::Result<()> {
        trace!("UDP socket: sending {} bytes to {}:{}", payload.len(), peer_addr, peer_port);

        let addr: IpAddr = peer_addr.parse()?;
        self.socket.send_to(payload, (addr, peer_port)).await?;
        Ok(())
    }

    async fn recv(&self) -> anyhow::Result<Inbound> {
        let mut buf = vec![0u8; 1024];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);

        Ok(Inbound {
            payload: buf,
            peer_addr: from.ip().to_string(),
            peer_port: from.port(),
        })
    }
}
