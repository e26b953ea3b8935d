//! UDP client transport (§4.3). One bound socket, recv/send in a plain loop;
//! unlike TCP there is no per-client state here at all — everything needed
//! to route a reply travels with the pending-query entry instead. Grounded
//! on the teacher's `protocol/udp.rs`, trimmed to the read/write pair the
//! event loop actually drives.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::error::Result;
use crate::pool::BufferPool;
use crate::sandbox::require_unsandboxed;

pub struct UdpSession {
    socket: UdpSocket,
    buffers: BufferPool,
}

/// Largest UDP datagram this front-end will ever read; oversized client
/// queries beyond this are simply a kernel-level truncation, not something
/// the guard has to special-case.
pub const MAX_UDP_QUERY_SIZE: usize = 65536;

impl UdpSession {
    pub async fn bind(addr: SocketAddr, buffers: BufferPool) -> Result<Self> {
        require_unsandboxed("udp socket bind")?;
        let socket = UdpSocket::bind(addr).await?;
        Ok(UdpSession { socket, buffers })
    }

    /// Wrap a socket handed down by the parent process over the main IPC
    /// channel rather than bound directly.
    pub fn from_socket(socket: UdpSocket, buffers: BufferPool) -> Self {
        UdpSession { socket, buffers }
    }

    /// Wait for the next datagram, returning its bytes and sender address.
    pub async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = self.buffers.get();
        buf.resize(MAX_UDP_QUERY_SIZE, 0);
        let (len, peer) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf.to_vec(), peer))
    }

    pub async fn send(&self, buf: &[u8], peer: SocketAddr) -> Result<()> {
        self.socket.send_to(buf, peer).await?;
        Ok(())
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}
