//! TFTP client implementation
//!
//! - `client`: GET/PUT against one server
//! - `config`: Client configuration

#[allow(clippy::module_inception)]
mod client;
mod config;

use std::net::SocketAddr;
use std::path::Path;

use crate::tftp::core::{TransferError, TransferMode, TransferSummary};

// Public client types
pub use client::{Client, Operation};
pub use config::ClientConfig;

/// Run a single transfer against `server` with default retransmission settings
pub fn run_transfer(
    server: SocketAddr,
    operation: Operation,
    mode: TransferMode,
    remote_file: &str,
    local_file: &Path,
) -> Result<TransferSummary, TransferError> {
    let config = ClientConfig::new(server.ip(), server.port()).with_mode(mode);
    Client::new(config).transfer(operation, remote_file, local_file)
}
