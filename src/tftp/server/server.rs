use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use super::config::Config;
use super::worker::{Request, Worker};
use crate::tftp::core::{
    MAX_DATAGRAM, Options, Packet, PeerSocket, ServerSocket, Storage, decode_datagram,
};

/// A live transfer known to the listener
struct Session {
    /// Packet channel into the worker (single port mode only)
    sender: Option<Sender<Packet>>,
    handle: JoinHandle<()>,
}

/// TFTP server
///
/// Listens for requests and hands each accepted one to a [`Worker`] thread.
/// In single port mode the listener also forwards every later packet of a
/// session to its worker, keyed by the peer address.
pub struct Server {
    socket: Arc<UdpSocket>,
    config: Config,
    storage: Arc<dyn Storage>,
    sessions: HashMap<SocketAddr, Session>,
}

impl Server {
    /// Bind the listening socket
    pub fn new(config: &Config) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::new(config.ip_address, config.port))?;
        Ok(Self {
            socket: Arc::new(socket),
            config: config.clone(),
            storage: Arc::new(config.storage()),
            sessions: HashMap::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn options(&self) -> Options {
        self.config.opt_local
    }

    /// Serve requests until the socket fails
    pub fn listen(&mut self) {
        let mut buf = [0u8; MAX_DATAGRAM + 1];

        loop {
            let (amt, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) => {
                    log::error!("Failed to receive datagram: {}", e);
                    continue;
                }
            };

            match decode_datagram(&buf[..amt]) {
                Ok(packet) => self.dispatch(packet, from),
                Err(e) => log::warn!("Dropping datagram from {}: {}", from, e),
            }
        }
    }

    /// Route one decoded packet to its session, or start a new one
    fn dispatch(&mut self, packet: Packet, from: SocketAddr) {
        self.sessions.retain(|_, session| !session.handle.is_finished());

        if let Some(session) = self.sessions.get(&from) {
            if matches!(packet, Packet::Rrq { .. } | Packet::Wrq { .. }) {
                log::debug!("Ignoring repeated request from {}", from);
                return;
            }
            let closed = match &session.sender {
                Some(sender) => sender.send(packet).is_err(),
                None => {
                    log::debug!("Ignoring {} from {} on listening port", packet.name(), from);
                    false
                }
            };
            if closed {
                log::debug!("Session with {} already closed", from);
                self.sessions.remove(&from);
            }
            return;
        }

        let Some(request) = Request::from_packet(&packet) else {
            log::debug!("Dropping {} from {} without a session", packet.name(), from);
            return;
        };
        log::info!("{} from {}", request, from);

        match self.start_session(request, from) {
            Ok(session) => {
                self.sessions.insert(from, session);
            }
            Err(e) => log::error!("Failed to start transfer for {}: {}", from, e),
        }
    }

    fn start_session(&self, request: Request, peer: SocketAddr) -> io::Result<Session> {
        let options = self.config.opt_local;
        let storage = self.storage.clone();

        if self.config.single_port {
            let (sender, receiver) = mpsc::channel();
            let socket = ServerSocket::new(self.socket.clone(), peer, receiver);
            let handle = Worker::new(socket, storage, options, request).spawn()?;
            Ok(Session {
                sender: Some(sender),
                handle,
            })
        } else {
            let socket = PeerSocket::bind(self.config.ip_address, peer)?;
            log::debug!("Transfer with {} on {}", peer, socket.local_addr()?);
            let handle = Worker::new(socket, storage, options, request).spawn()?;
            Ok(Session {
                sender: None,
                handle,
            })
        }
    }
}
