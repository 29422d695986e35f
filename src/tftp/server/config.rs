use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::tftp::core::{DirectoryStorage, Options};

/// Well-known TFTP port
pub const DEFAULT_PORT: u16 = 69;

/// TFTP server configuration
///
/// ```rust
/// use std::path::PathBuf;
/// use std::time::Duration;
/// use xtftp::tftp::core::Options;
/// use xtftp::tftp::server::Config;
///
/// let config = Config::new("127.0.0.1".parse().unwrap(), 6969, PathBuf::from("/srv/tftp"), true)
///     .with_single_port(true)
///     .with_options(Options::new(Duration::from_secs(2), 3));
/// assert!(config.read_only && config.single_port);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address to listen on
    pub ip_address: IpAddr,
    /// Port number to listen on
    pub port: u16,
    /// Where uploads land
    pub receive_directory: PathBuf,
    /// Files served to readers
    pub send_directory: PathBuf,
    /// Serve every transfer from the listening socket (for NAT environments)
    pub single_port: bool,
    /// Reject every write request
    pub read_only: bool,
    /// Let uploads replace existing files
    pub overwrite: bool,
    /// Retransmission settings
    pub opt_local: Options,
}

impl Config {
    /// Serve `directory` in both directions on `ip_address:port`.
    ///
    /// Uploads replace existing files unless `overwrite` is cleared, and the
    /// retransmission settings start at [`Options::default`].
    pub fn new(ip_address: IpAddr, port: u16, directory: PathBuf, read_only: bool) -> Self {
        Self {
            ip_address,
            port,
            receive_directory: directory.clone(),
            send_directory: directory,
            single_port: false,
            read_only,
            overwrite: true,
            opt_local: Options::default(),
        }
    }

    pub fn with_single_port(mut self, single_port: bool) -> Self {
        self.single_port = single_port;
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.opt_local = options;
        self
    }

    /// Apply command-line values on top of this configuration.
    ///
    /// `None` keeps the current value; the flags can only switch a mode on.
    pub fn merge_cli(
        mut self,
        ip_address: Option<IpAddr>,
        port: Option<u16>,
        directory: Option<PathBuf>,
        read_only: bool,
        single_port: bool,
    ) -> Self {
        if let Some(ip_address) = ip_address {
            self.ip_address = ip_address;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(directory) = directory {
            self.receive_directory = directory.clone();
            self.send_directory = directory;
        }
        self.read_only |= read_only;
        self.single_port |= single_port;
        self
    }

    /// File storage described by this configuration
    pub fn storage(&self) -> DirectoryStorage {
        DirectoryStorage::new(self.send_directory.clone(), self.receive_directory.clone())
            .with_read_only(self.read_only)
            .with_overwrite(self.overwrite)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            DEFAULT_PORT,
            std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()),
            false,
        )
    }
}
