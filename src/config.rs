//! Configuration file
//!
//! Every key is optional; missing keys fall back to the built-in defaults and
//! command-line flags override whatever the file sets.
//!
//! ```toml
//! [server]
//! ip = "0.0.0.0"
//! port = 69
//! directory = "/srv/tftp"
//! read_only = true
//! timeout = "3s"
//! retries = 5
//!
//! [client]
//! port = 69
//! mode = "octet"
//! timeout = "2s"
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::tftp::client::ClientConfig;
use crate::tftp::core::{Options, TransferMode};
use crate::tftp::server::Config;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "XTFTP_CONFIG";
/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "xtftp.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub client: ClientSection,
}

/// Options with the given overrides applied
fn apply_timing(
    base: Options,
    timeout: Option<Duration>,
    retries: Option<u32>,
    idle_timeout: Option<Duration>,
) -> Result<Options> {
    let timeout = match timeout {
        Some(timeout) => Options::check_timeout(timeout)?,
        None => base.timeout,
    };
    let options = Options::new(timeout, retries.unwrap_or(base.retries));
    Ok(match idle_timeout {
        Some(idle_timeout) => options.with_idle_timeout(idle_timeout),
        None => options,
    })
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub ip: Option<IpAddr>,
    pub port: Option<u16>,
    /// Root for both directions unless overridden below
    pub directory: Option<PathBuf>,
    pub send_directory: Option<PathBuf>,
    pub receive_directory: Option<PathBuf>,
    pub read_only: Option<bool>,
    pub single_port: Option<bool>,
    pub overwrite: Option<bool>,
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSection {
    pub port: Option<u16>,
    pub mode: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Option<Duration>,
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Locate and load the configuration.
    ///
    /// An explicit path (argument, then `$XTFTP_CONFIG`) must exist; the
    /// default `./xtftp.toml` is optional.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(PathBuf::from(path));
        }
        let default = Path::new(DEFAULT_CONFIG_FILE);
        if default.is_file() {
            log::debug!("Using {}", default.display());
            return Self::load(default);
        }
        Ok(Self::default())
    }

    /// Server configuration with file values applied over the defaults
    pub fn server_config(&self) -> Result<Config> {
        let section = &self.server;
        let mut config = Config::default();

        if let Some(ip) = section.ip {
            config.ip_address = ip;
        }
        if let Some(port) = section.port {
            config.port = port;
        }
        if let Some(directory) = &section.directory {
            config.send_directory = directory.clone();
            config.receive_directory = directory.clone();
        }
        if let Some(directory) = &section.send_directory {
            config.send_directory = directory.clone();
        }
        if let Some(directory) = &section.receive_directory {
            config.receive_directory = directory.clone();
        }
        config.read_only = section.read_only.unwrap_or(config.read_only);
        config.single_port = section.single_port.unwrap_or(config.single_port);
        config.overwrite = section.overwrite.unwrap_or(config.overwrite);
        config.opt_local = apply_timing(
            config.opt_local,
            section.timeout,
            section.retries,
            section.idle_timeout,
        )
        .context("Invalid [server] timing")?;
        Ok(config)
    }

    /// Client configuration for `host` with file values applied over the defaults
    pub fn client_config(&self, host: &str, port: Option<u16>) -> Result<ClientConfig> {
        let section = &self.client;
        let port = port.or(section.port).unwrap_or(69);
        let mut config = ClientConfig::resolve(host, port)
            .with_context(|| format!("Failed to resolve {}", host))?;

        if let Some(mode) = &section.mode {
            config.mode = TransferMode::parse(mode.as_bytes());
        }
        config.options = apply_timing(
            config.options,
            section.timeout,
            section.retries,
            section.idle_timeout,
        )
        .context("Invalid [client] timing")?;
        Ok(config)
    }
}
