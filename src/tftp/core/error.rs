//! Error kinds of the TFTP engine
//!
//! - [`DecodeError`]: a datagram could not be parsed; the driver drops it and keeps listening
//! - [`EncodeError`]: a request field cannot be put on the wire
//! - [`StorageError`]: the byte source/sink could not be opened
//! - [`TransferError`]: why a transfer session ended in `Failed`

use std::io;
use std::time::Duration;

use thiserror::Error;

use super::packet::{ErrorCode, Packet};

/// Malformed datagram
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),

    #[error("unable to get filename")]
    MissingFilename,

    #[error("filename is empty")]
    EmptyFilename,

    #[error("unable to get mode")]
    MissingMode,

    #[error("mode is empty")]
    EmptyMode,

    #[error("unable to get error message")]
    MissingErrorMessage,

    #[error("datagram too large: maximum {max} bytes, got {actual}")]
    Oversized { max: usize, actual: usize },
}

/// Request field that cannot be encoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} is empty")]
    Empty { field: &'static str },

    #[error("{field} contains a zero byte")]
    InteriorNul { field: &'static str },
}

/// Failure to open a file through a [`Storage`](super::storage::Storage)
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("file not found")]
    NotFound,

    #[error("access violation")]
    AccessViolation,

    #[error("server is read-only")]
    ReadOnly,

    #[error("file already exists")]
    AlreadyExists,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StorageError {
    /// TFTP error code reported to the peer
    pub fn error_code(&self) -> ErrorCode {
        match self {
            StorageError::NotFound => ErrorCode::FileNotFound,
            StorageError::AccessViolation | StorageError::ReadOnly => ErrorCode::AccessViolation,
            StorageError::AlreadyExists => ErrorCode::FileExists,
            StorageError::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => ErrorCode::FileNotFound,
                io::ErrorKind::PermissionDenied => ErrorCode::AccessViolation,
                io::ErrorKind::AlreadyExists => ErrorCode::FileExists,
                io::ErrorKind::StorageFull => ErrorCode::DiskFull,
                _ => ErrorCode::NotDefined,
            },
        }
    }

    /// Error packet announcing this failure
    pub fn to_packet(&self) -> Packet {
        Packet::error(self.error_code(), self.to_string())
    }
}

/// Reason a transfer session failed
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("local file error: {0}")]
    Io(#[source] io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid request: {0}")]
    Request(#[from] EncodeError),

    /// Error packet from the peer; `message` is decoded lossily for display
    #[error("peer error {code}: {message}")]
    Peer { code: ErrorCode, message: String },

    #[error("unexpected {received} packet, expected {expected}")]
    UnexpectedPacket {
        expected: &'static str,
        received: &'static str,
    },

    #[error("data block of {0} bytes exceeds the block size")]
    OversizedData(usize),

    #[error("no response after {retries} retransmissions")]
    Timeout { retries: u32 },

    #[error("peer idle for {0:?}")]
    Idle(Duration),

    #[error("socket error: {0}")]
    Transport(#[source] io::Error),

    #[error("transfer aborted")]
    Aborted,

    #[error("transfer already failed")]
    Closed,
}

impl TransferError {
    /// Failure announced by the peer in an Error packet
    pub fn from_peer(code: ErrorCode, msg: &[u8]) -> Self {
        TransferError::Peer {
            code,
            message: String::from_utf8_lossy(msg).into_owned(),
        }
    }

    /// Error packet to send to the peer when a session fails with this error.
    ///
    /// Failures the peer caused or can no longer hear about return `None`.
    pub fn error_packet(&self) -> Option<Packet> {
        let (code, msg) = match self {
            TransferError::Io(e) => {
                let code = match e.kind() {
                    io::ErrorKind::StorageFull => ErrorCode::DiskFull,
                    io::ErrorKind::PermissionDenied => ErrorCode::AccessViolation,
                    _ => ErrorCode::NotDefined,
                };
                (code, e.to_string())
            }
            TransferError::Storage(e) => return Some(e.to_packet()),
            TransferError::UnexpectedPacket { .. } | TransferError::OversizedData(_) => {
                (ErrorCode::IllegalOperation, self.to_string())
            }
            TransferError::Aborted => (ErrorCode::NotDefined, self.to_string()),
            TransferError::Peer { .. }
            | TransferError::Timeout { .. }
            | TransferError::Idle(_)
            | TransferError::Transport(_)
            | TransferError::Request(_)
            | TransferError::Closed => return None,
        };
        Some(Packet::error(code, msg))
    }
}
