//! TFTP (Trivial File Transfer Protocol) implementation
//!
//! This module implements [RFC 1350](https://www.rfc-editor.org/rfc/rfc1350),
//! TFTP Protocol version 2: lock-step transfers of 512-byte blocks over UDP.
//!
//! ## Module Structure
//!
//! ```text
//! tftp/
//! ├── core/           # Core protocol implementation
//! │   ├── packet      # Packet serialization/deserialization
//! │   ├── transfer    # Per-transfer state machine
//! │   ├── driver      # Runs a transfer over a socket
//! │   ├── socket      # Socket abstraction layer
//! │   ├── storage     # File source/sink
//! │   ├── options     # Timeouts and retries
//! │   └── convert     # Data conversion utilities
//! │
//! ├── server/         # TFTP server
//! │   ├── server      # Main server logic
//! │   ├── worker      # Transfer worker threads
//! │   └── config      # Server configuration
//! │
//! └── client/         # TFTP client
//!     ├── client      # GET/PUT
//!     └── config      # Client configuration
//! ```
//!
//! ## Usage Examples
//!
//! ### Start TFTP Server
//!
//! ```rust,no_run
//! use xtftp::tftp::{server::Config, server::Server};
//! use std::path::PathBuf;
//!
//! let config = Config::default().merge_cli(
//!     Some("0.0.0.0".parse().unwrap()),
//!     Some(69),
//!     Some(PathBuf::from("/var/tftp")),
//!     false,
//!     false,
//! );
//!
//! let mut server = Server::new(&config).unwrap();
//! server.listen();
//! ```
//!
//! ### Download a file
//!
//! ```rust,no_run
//! use xtftp::tftp::client::{Operation, run_transfer};
//! use xtftp::tftp::core::TransferMode;
//! use std::path::Path;
//!
//! run_transfer(
//!     "192.168.1.100:69".parse().unwrap(),
//!     Operation::Get,
//!     TransferMode::Octet,
//!     "f.bin",
//!     Path::new("f.bin"),
//! )
//! .unwrap();
//! ```

// Submodules
pub mod client;
pub mod core;
pub mod server;
