use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::tftp::core::{
    Driver, Options, Packet, Socket, Storage, TransferError, TransferMode, TransferSession,
    TransferSummary,
};

/// An accepted read or write request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Read { filename: Vec<u8>, mode: TransferMode },
    Write { filename: Vec<u8>, mode: TransferMode },
}

impl Request {
    /// Request carried by an RRQ/WRQ packet
    pub fn from_packet(packet: &Packet) -> Option<Self> {
        match packet {
            Packet::Rrq { filename, mode } => Some(Request::Read {
                filename: filename.clone(),
                mode: TransferMode::parse(mode),
            }),
            Packet::Wrq { filename, mode } => Some(Request::Write {
                filename: filename.clone(),
                mode: TransferMode::parse(mode),
            }),
            _ => None,
        }
    }

    /// Requested filename as received
    pub fn filename(&self) -> &[u8] {
        match self {
            Request::Read { filename, .. } | Request::Write { filename, .. } => filename,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Read { filename, mode } => {
                write!(f, "RRQ {} ({})", String::from_utf8_lossy(filename), mode)
            }
            Request::Write { filename, mode } => {
                write!(f, "WRQ {} ({})", String::from_utf8_lossy(filename), mode)
            }
        }
    }
}

/// Serves one request on its own thread
///
/// The worker owns the transfer's socket, file handle and session; nothing
/// is shared with other workers except the storage configuration.
pub struct Worker<S: Socket> {
    socket: S,
    storage: Arc<dyn Storage>,
    options: Options,
    request: Request,
}

impl<S: Socket + 'static> Worker<S> {
    pub fn new(socket: S, storage: Arc<dyn Storage>, options: Options, request: Request) -> Self {
        Self {
            socket,
            storage,
            options,
            request,
        }
    }

    /// Run the transfer on a new thread
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        let peer = self.socket.peer();
        thread::Builder::new()
            .name(format!("tftp-{}", peer))
            .spawn(move || {
                let request = self.request.clone();
                match self.run() {
                    Ok(summary) => log::info!(
                        "{} from {} complete: {} bytes in {:.2?}",
                        request,
                        peer,
                        summary.bytes,
                        summary.elapsed
                    ),
                    Err(e) => log::error!("{} from {} failed: {}", request, peer, e),
                }
            })
    }

    /// Open the requested file and drive the transfer to completion
    pub fn run(self) -> Result<TransferSummary, TransferError> {
        let peer = self.socket.peer();

        let opened = match &self.request {
            Request::Read { filename, .. } => self
                .storage
                .open_read(filename)
                .map(|source| TransferSession::sender(peer, source, self.options.retries)),
            Request::Write { filename, .. } => self
                .storage
                .open_write(filename)
                .map(|sink| TransferSession::receiver(peer, sink, self.options.retries, true)),
        };

        let mut session = match opened {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Rejecting {} from {}: {}", self.request, peer, e);
                if let Err(send_err) = self.socket.send(&e.to_packet()) {
                    log::debug!("Failed to send error to {}: {}", peer, send_err);
                }
                return Err(e.into());
            }
        };

        Driver::new(&self.socket, self.options).run(&mut session, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tftp::core::{DirectoryStorage, ErrorCode, PeerSocket, StorageError};
    use std::net::UdpSocket;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn request_from_packet() {
        let rrq = Packet::Rrq {
            filename: "a".into(),
            mode: "NETASCII".into(),
        };
        assert_eq!(
            Request::from_packet(&rrq),
            Some(Request::Read {
                filename: "a".into(),
                mode: TransferMode::NetAscii
            })
        );
        assert_eq!(Request::from_packet(&Packet::Ack(0)), None);
    }

    #[test]
    fn missing_file_is_reported_to_peer() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(DirectoryStorage::new(dir.path().into(), dir.path().into()));
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let socket =
            PeerSocket::bind("127.0.0.1".parse().unwrap(), client.local_addr().unwrap()).unwrap();

        let worker = Worker::new(
            socket,
            storage,
            Options::default(),
            Request::Read {
                filename: "missing".into(),
                mode: TransferMode::Octet,
            },
        );
        let err = worker.run().unwrap_err();
        assert!(matches!(
            err,
            TransferError::Storage(StorageError::NotFound)
        ));

        let mut buf = [0u8; 128];
        let (amt, _) = client.recv_from(&mut buf).unwrap();
        assert!(matches!(
            Packet::deserialize(&buf[..amt]),
            Ok(Packet::Error {
                code: ErrorCode::FileNotFound,
                ..
            })
        ));
    }
}
