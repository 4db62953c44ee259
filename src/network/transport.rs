//! Multicast UDP sockets
//!
//! Thin blocking wrappers over `socket2`-configured sockets. The sender is
//! fire-and-forget: one `send_to` per frame, no buffering, no retry. The
//! receiver joins the group, binds the wildcard address, and reads with a
//! short timeout so its owning loop can observe a stop signal promptly.
//! Both keep their socket buffers small, trading throughput headroom for
//! freshness.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::NetworkConfig;
use crate::constants::SOCKET_BUFFER_BYTES;
use crate::error::TransportError;

/// Outcome of one bounded receive call
#[derive(Debug)]
pub enum Recv {
    /// A datagram arrived; `len` bytes are valid in the caller's buffer
    Packet { len: usize, from: SocketAddr },
    /// The timeout elapsed with nothing to read. Not an error: this is how
    /// the receive loop re-checks its running flag.
    TimedOut,
}

/// Sending half of the multicast transport
pub struct MulticastSender {
    socket: UdpSocket,
    dest: SocketAddrV4,
}

impl MulticastSender {
    /// Create and configure the outbound socket. No bind to a fixed port;
    /// the OS picks an ephemeral source.
    pub fn open(config: &NetworkConfig) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::SocketSetup(e.to_string()))?;
        socket
            .set_multicast_ttl_v4(config.multicast_ttl)
            .map_err(|e| TransportError::SocketSetup(e.to_string()))?;
        socket
            .set_multicast_loop_v4(config.multicast_loopback)
            .map_err(|e| TransportError::SocketSetup(e.to_string()))?;
        socket
            .set_send_buffer_size(SOCKET_BUFFER_BYTES)
            .map_err(|e| TransportError::SocketSetup(e.to_string()))?;

        Ok(Self {
            socket: socket.into(),
            dest: SocketAddrV4::new(config.group, config.port),
        })
    }

    /// One `send_to` toward the group. Callers count failures and move on;
    /// a lost datagram is indistinguishable from one dropped in the network.
    pub fn send(&self, payload: &[u8]) -> std::io::Result<usize> {
        self.socket.send_to(payload, self.dest)
    }

    pub fn destination(&self) -> SocketAddrV4 {
        self.dest
    }
}

/// Receiving half of the multicast transport
pub struct MulticastReceiver {
    socket: UdpSocket,
    group: Ipv4Addr,
}

impl MulticastReceiver {
    /// Bind the wildcard address on the configured port, join the group on
    /// all interfaces, and arm the receive timeout.
    pub fn open(config: &NetworkConfig) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::SocketSetup(e.to_string()))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::SocketSetup(e.to_string()))?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket
            .set_reuse_port(true)
            .map_err(|e| TransportError::SocketSetup(e.to_string()))?;
        socket
            .set_recv_buffer_size(SOCKET_BUFFER_BYTES)
            .map_err(|e| TransportError::SocketSetup(e.to_string()))?;

        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
        socket
            .bind(&bind_addr.into())
            .map_err(|e| TransportError::BindFailed(format!("port {}: {e}", config.port)))?;
        socket
            .join_multicast_v4(&config.group, &Ipv4Addr::UNSPECIFIED)
            .map_err(|e| TransportError::JoinFailed(format!("{}: {e}", config.group)))?;

        let socket: UdpSocket = socket.into();
        socket
            .set_read_timeout(Some(config.recv_timeout()))
            .map_err(|e| TransportError::SocketSetup(e.to_string()))?;

        Ok(Self {
            socket,
            group: config.group,
        })
    }

    /// One blocking receive bounded by the configured timeout
    pub fn recv(&self, buf: &mut [u8]) -> Result<Recv, TransportError> {
        match self.socket.recv_from(buf) {
            Ok((len, from)) => Ok(Recv::Packet { len, from }),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(Recv::TimedOut)
            }
            Err(e) => Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }
}

impl Drop for MulticastReceiver {
    fn drop(&mut self) {
        // Leaving an already-dead group is fine; the kernel drops
        // membership with the socket anyway.
        let _ = self
            .socket
            .leave_multicast_v4(&self.group, &Ipv4Addr::UNSPECIFIED);
    }
}
