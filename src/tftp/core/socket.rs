use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use super::error::DecodeError;
use super::options::deadline_after;
use super::packet::{ErrorCode, MAX_DATAGRAM, Packet};

/// Decode one received datagram, rejecting anything above [`MAX_DATAGRAM`].
///
/// `buf` may be one byte longer than the limit so oversize input is detectable.
pub fn decode_datagram(buf: &[u8]) -> Result<Packet, DecodeError> {
    if buf.len() > MAX_DATAGRAM {
        return Err(DecodeError::Oversized {
            max: MAX_DATAGRAM,
            actual: buf.len(),
        });
    }
    Packet::deserialize(buf)
}

/// Receive one datagram, waiting no later than `deadline`.
///
/// Returns `Ok(None)` once the deadline passes.
pub fn recv_until(
    socket: &UdpSocket,
    buf: &mut [u8],
    deadline: Instant,
) -> io::Result<Option<(usize, SocketAddr)>> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Ok(None);
    }
    socket.set_read_timeout(Some(remaining))?;

    match socket.recv_from(buf) {
        Ok(received) => Ok(Some(received)),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Packet transport of a single transfer, bound to one peer
pub trait Socket: Send {
    /// Send a packet to the peer
    fn send(&self, packet: &Packet) -> io::Result<()>;

    /// Wait up to `timeout` for the next valid packet from the peer.
    ///
    /// Returns `Ok(None)` on timeout. Malformed datagrams are dropped.
    fn recv(&self, timeout: Duration) -> io::Result<Option<Packet>>;

    fn peer(&self) -> SocketAddr;
}

/// A UDP socket exchanging packets with one peer.
///
/// Datagrams from any other address are answered with an
/// `Unknown transfer ID` error and otherwise ignored.
pub struct PeerSocket {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl PeerSocket {
    pub fn new(socket: UdpSocket, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }

    /// Bind an ephemeral socket on `ip` for a transfer with `peer`
    pub fn bind(ip: std::net::IpAddr, peer: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::new(ip, 0))?;
        Ok(Self::new(socket, peer))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn reject_stranger(&self, from: SocketAddr) {
        log::warn!(
            "Datagram from unknown transfer id {} (expected {})",
            from,
            self.peer
        );
        let error = Packet::error(ErrorCode::UnknownId, "unknown transfer id");
        if let Err(e) = self.socket.send_to(&error.serialize(), from) {
            log::debug!("Failed to notify {}: {}", from, e);
        }
    }
}

impl Socket for PeerSocket {
    fn send(&self, packet: &Packet) -> io::Result<()> {
        self.socket.send_to(&packet.serialize(), self.peer)?;
        Ok(())
    }

    fn recv(&self, timeout: Duration) -> io::Result<Option<Packet>> {
        let deadline = deadline_after(timeout);
        let mut buf = [0u8; MAX_DATAGRAM + 1];

        while let Some((amt, from)) = recv_until(&self.socket, &mut buf, deadline)? {
            if from != self.peer {
                self.reject_stranger(from);
                continue;
            }
            match decode_datagram(&buf[..amt]) {
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => log::warn!("Dropping datagram from {}: {}", from, e),
            }
        }

        Ok(None)
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }
}

/// A session's view of the shared listening socket (single port mode).
///
/// The listener decodes datagrams and forwards this peer's packets over a
/// channel; replies go out through the listening socket itself.
pub struct ServerSocket {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    receiver: Receiver<Packet>,
}

impl ServerSocket {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr, receiver: Receiver<Packet>) -> Self {
        Self {
            socket,
            peer,
            receiver,
        }
    }
}

impl Socket for ServerSocket {
    fn send(&self, packet: &Packet) -> io::Result<()> {
        self.socket.send_to(&packet.serialize(), self.peer)?;
        Ok(())
    }

    fn recv(&self, timeout: Duration) -> io::Result<Option<Packet>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(packet) => Ok(Some(packet)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "listener closed",
            )),
        }
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }
}
