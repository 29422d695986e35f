//! TFTP server implementation
//!
//! This module provides complete TFTP server functionality:
//! - `server`: Main server logic, handles client requests
//! - `worker`: Worker threads, handles file transfers
//! - `config`: Server configuration

mod config;
#[allow(clippy::module_inception)]
mod server;
mod worker;

use anyhow::{Context, Result};

// Public server types
pub use config::Config;
pub use server::Server;
pub use worker::{Request, Worker};

/// Run the TFTP server; blocks for the lifetime of the process
pub fn run(config: Config) -> Result<()> {
    log::info!("Starting TFTP server on {}:{}", config.ip_address, config.port);
    log::info!("Send directory: {}", config.send_directory.display());
    log::info!("Receive directory: {}", config.receive_directory.display());
    log::info!("Read-only mode: {}", config.read_only);
    log::info!("Single port mode: {}", config.single_port);

    // Ensure directories exist
    for dir in [&config.send_directory, &config.receive_directory] {
        if !dir.is_dir() {
            log::error!("Directory does not exist: {}", dir.display());
            anyhow::bail!("Directory does not exist: {}", dir.display());
        }
    }

    let mut server = Server::new(&config).with_context(|| {
        format!(
            "Failed to bind TFTP server to {}:{}",
            config.ip_address, config.port
        )
    })?;

    log::info!("TFTP server listening, press Ctrl+C to stop");
    server.listen();

    Ok(())
}

/// Run a server on `port` serving the current directory
pub fn run_on_port(port: u16) -> Result<()> {
    let config = Config {
        port,
        ..Config::default()
    };
    run(config)
}
