//! TFTP client and server
//!
//! - [`tftp`]: protocol engine, server and client
//! - [`config`]: optional TOML configuration file
//! - [`shell`]: interactive client shell

pub mod config;
pub mod shell;
pub mod tftp;
