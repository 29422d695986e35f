use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;

use super::config::ClientConfig;
use crate::tftp::core::{
    Driver, ErrorCode, MAX_DATAGRAM, Packet, PeerSocket, Socket, TransferError, TransferSession,
    TransferSummary, deadline_after, decode_datagram, recv_until,
};

/// Direction of a client transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Download (RRQ)
    Get,
    /// Upload (WRQ)
    Put,
}

/// TFTP client
///
/// Supports file upload (PUT) and download (GET) operations
///
/// # Example
///
/// ```rust,no_run
/// use xtftp::tftp::client::{Client, ClientConfig};
/// use std::path::Path;
///
/// let config = ClientConfig::new("192.168.1.100".parse().unwrap(), 69);
/// let client = Client::new(config);
///
/// // Download file
/// client.get("remote.txt", Path::new("local.txt")).unwrap();
///
/// // Upload file
/// client.put(Path::new("local.txt"), "remote.txt").unwrap();
/// ```
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// Create a new TFTP client
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one transfer in either direction
    pub fn transfer(
        &self,
        operation: Operation,
        remote_file: &str,
        local_file: &Path,
    ) -> Result<TransferSummary, TransferError> {
        match operation {
            Operation::Get => self.get(remote_file, local_file),
            Operation::Put => self.put(local_file, remote_file),
        }
    }

    /// Download a file from the server (RRQ - Read Request)
    ///
    /// # Arguments
    ///
    /// * `remote_file` - File name on the server
    /// * `local_file` - Local save path
    pub fn get(&self, remote_file: &str, local_file: &Path) -> Result<TransferSummary, TransferError> {
        log::info!("Downloading {} to {}", remote_file, local_file.display());

        let rrq = Packet::rrq(remote_file, self.config.mode.as_str())?;
        let socket = self.bind()?;

        // The first DATA block tells us the server's transfer port
        let (response, peer) = self.request(&socket, &rrq)?;
        let socket = PeerSocket::new(socket, peer);

        let first = match response {
            packet @ Packet::Data { .. } => packet,
            Packet::Error { code, msg } => return Err(TransferError::from_peer(code, &msg)),
            other => return Err(Self::unexpected(&socket, "DATA", &other)),
        };

        // Receive file
        let file = match File::create(local_file) {
            Ok(file) => file,
            Err(e) => {
                let error = Packet::error(ErrorCode::AccessViolation, e.to_string());
                if let Err(send_err) = socket.send(&error) {
                    log::debug!("Failed to send error to {}: {}", peer, send_err);
                }
                return Err(TransferError::Io(e));
            }
        };

        let mut session = TransferSession::receiver(
            peer,
            Box::new(BufWriter::new(file)),
            self.config.options.retries,
            false,
        );
        let summary = Driver::new(&socket, self.config.options).run(&mut session, Some(first))?;

        log::info!(
            "Download complete: {} ({} bytes in {:.2?})",
            local_file.display(),
            summary.bytes,
            summary.elapsed
        );
        Ok(summary)
    }

    /// Upload a file to the server (WRQ - Write Request)
    ///
    /// # Arguments
    ///
    /// * `local_file` - Local file path
    /// * `remote_file` - File name on the server
    pub fn put(&self, local_file: &Path, remote_file: &str) -> Result<TransferSummary, TransferError> {
        log::info!("Uploading {} to {}", local_file.display(), remote_file);

        let file = File::open(local_file).map_err(TransferError::Io)?;

        let wrq = Packet::wrq(remote_file, self.config.mode.as_str())?;
        let socket = self.bind()?;

        // Wait for ACK 0 from the server's transfer port
        let (response, peer) = self.request(&socket, &wrq)?;
        let socket = PeerSocket::new(socket, peer);

        match response {
            Packet::Ack(0) => {}
            Packet::Error { code, msg } => return Err(TransferError::from_peer(code, &msg)),
            other => return Err(Self::unexpected(&socket, "ACK 0", &other)),
        }

        // Send file
        let mut session = TransferSession::sender(
            peer,
            Box::new(BufReader::new(file)),
            self.config.options.retries,
        );
        let summary = Driver::new(&socket, self.config.options).run(&mut session, None)?;

        log::info!(
            "Upload complete: {} ({} bytes in {:.2?})",
            remote_file,
            summary.bytes,
            summary.elapsed
        );
        Ok(summary)
    }

    /// Create local socket
    fn bind(&self) -> Result<UdpSocket, TransferError> {
        let local: SocketAddr = if self.config.server_ip.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        UdpSocket::bind(local).map_err(TransferError::Transport)
    }

    /// Send a request and wait for the first reply, retransmitting on timeout.
    ///
    /// Any port on the server's address may answer: the server usually moves
    /// the transfer to a new port.
    fn request(
        &self,
        socket: &UdpSocket,
        request: &Packet,
    ) -> Result<(Packet, SocketAddr), TransferError> {
        let server = self.config.server_addr();
        let options = self.config.options;
        let bytes = request.serialize();
        let mut buf = [0u8; MAX_DATAGRAM + 1];

        for attempt in 0..=options.retries {
            if attempt > 0 {
                log::debug!(
                    "Retransmitting {} to {} ({}/{})",
                    request.name(),
                    server,
                    attempt,
                    options.retries
                );
            }
            socket
                .send_to(&bytes, server)
                .map_err(TransferError::Transport)?;

            let deadline = deadline_after(options.timeout);
            while let Some((amt, from)) =
                recv_until(socket, &mut buf, deadline).map_err(TransferError::Transport)?
            {
                if from.ip() != server.ip() {
                    log::warn!("Ignoring datagram from {}", from);
                    continue;
                }
                match decode_datagram(&buf[..amt]) {
                    Ok(packet) => return Ok((packet, from)),
                    Err(e) => log::warn!("Dropping datagram from {}: {}", from, e),
                }
            }
        }

        Err(TransferError::Timeout {
            retries: options.retries,
        })
    }

    fn unexpected(socket: &PeerSocket, expected: &'static str, received: &Packet) -> TransferError {
        let error = TransferError::UnexpectedPacket {
            expected,
            received: received.name(),
        };
        let sent = error.error_packet().map(|packet| socket.send(&packet));
        if let Some(Err(e)) = sent {
            log::debug!("Failed to send error to {}: {}", socket.peer(), e);
        }
        error
    }
}
