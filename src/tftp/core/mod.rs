//! TFTP core protocol implementation
//!
//! This module contains the core components of the TFTP protocol:
//! - `packet`: Packet serialization and deserialization
//! - `transfer`: Per-transfer state machine
//! - `driver`: Drives a transfer over a socket with retransmission
//! - `socket`: Socket abstraction layer
//! - `storage`: File source/sink behind a transfer
//! - `options`: Timeouts and retries
//! - `convert`: Byte conversion utilities

mod convert;
mod driver;
mod error;
pub mod options;
mod packet;
mod socket;
pub mod storage;
mod transfer;

// Public core types
pub use convert::Convert;
pub use driver::Driver;
pub use error::{DecodeError, EncodeError, StorageError, TransferError};
pub use options::{InvalidTimeout, Options, deadline_after};
pub use packet::{BLOCK_SIZE, ErrorCode, MAX_DATAGRAM, Opcode, Packet, TransferMode};
pub use socket::{PeerSocket, ServerSocket, Socket, decode_datagram, recv_until};
pub use storage::{DirectoryStorage, Storage};
pub use transfer::{Event, Outcome, Role, State, Step, TransferSession, TransferSummary};
