use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::tftp::core::{Options, TransferMode};

/// TFTP client configuration
///
/// # Example
///
/// ```rust
/// use xtftp::tftp::client::ClientConfig;
///
/// let config = ClientConfig::new("192.168.1.100".parse().unwrap(), 69);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server IP address
    pub server_ip: IpAddr,
    /// Server port number
    pub server_port: u16,
    /// Transfer mode named in requests
    pub mode: TransferMode,
    /// Retransmission settings
    pub options: Options,
}

impl ClientConfig {
    /// Create new client configuration
    ///
    /// # Arguments
    ///
    /// * `server_ip` - Server IP address
    /// * `server_port` - Server port number (usually 69)
    pub fn new(server_ip: IpAddr, server_port: u16) -> Self {
        Self {
            server_ip,
            server_port,
            mode: TransferMode::Octet,
            options: Options::default(),
        }
    }

    /// Resolve a host name or address
    pub fn resolve(host: &str, server_port: u16) -> io::Result<Self> {
        let addr = (host, server_port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address found for {}", host),
                )
            })?;
        Ok(Self::new(addr.ip(), server_port))
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.server_port)
    }

    /// Set transfer mode
    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set timeout duration
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options = Options::new(timeout, self.options.retries);
        self
    }

    /// Set how often a packet is retransmitted
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.options = Options::new(self.options.timeout, retries);
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(IpAddr::from([127, 0, 0, 1]), 69)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_keep_idle_timeout_in_step() {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(1))
            .with_retries(3);
        assert_eq!(config.options.timeout, Duration::from_secs(1));
        assert_eq!(config.options.retries, 3);
        assert_eq!(config.options.idle_timeout, Duration::from_secs(4));
    }

    #[test]
    fn resolves_literal_address() {
        let config = ClientConfig::resolve("127.0.0.1", 6969).unwrap();
        assert_eq!(config.server_addr(), "127.0.0.1:6969".parse().unwrap());
        assert_eq!(config.mode, TransferMode::Octet);
    }
}
