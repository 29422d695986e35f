use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use xtftp::config::FileConfig;
use xtftp::tftp::client::{Client, ClientConfig, Operation};
use xtftp::tftp::core::TransferMode;
use xtftp::tftp::core::options::MAX_TIMEOUT;
use xtftp::{shell, tftp};

#[derive(Parser, Debug)]
#[command(version, about = "Trivial File Transfer Protocol client and server", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $XTFTP_CONFIG, then ./xtftp.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a TFTP server
    Server {
        /// IP address to listen on
        #[arg(long)]
        ip: Option<IpAddr>,
        /// UDP port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory to serve
        #[arg(short = 'd', long)]
        path: Option<PathBuf>,
        /// Reject all write requests
        #[arg(long)]
        read_only: bool,
        /// Serve every transfer from the listening port
        #[arg(long)]
        single_port: bool,
    },
    /// Download a file
    Get {
        #[command(flatten)]
        target: Target,
        /// File name on the server
        remote: String,
        /// Local path (defaults to the remote file name)
        local: Option<PathBuf>,
    },
    /// Upload a file
    Put {
        #[command(flatten)]
        target: Target,
        /// Local file to send
        local: PathBuf,
        /// File name on the server (defaults to the local file name)
        remote: Option<String>,
    },
    /// Interactive client shell
    Shell {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args, Debug)]
struct Target {
    /// Server host name or address
    server: String,
    /// Server port
    #[arg(short, long)]
    port: Option<u16>,
    /// Transfer mode
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,
    /// Retransmission timeout in seconds
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT.as_secs()))]
    timeout: Option<u64>,
    /// Retransmissions per packet before giving up
    #[arg(short, long)]
    retries: Option<u32>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Netascii,
    Octet,
}

impl From<Mode> for TransferMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Netascii => TransferMode::NetAscii,
            Mode::Octet => TransferMode::Octet,
        }
    }
}

impl Target {
    fn client_config(&self, file: &FileConfig) -> Result<ClientConfig> {
        let mut config = file.client_config(&self.server, self.port)?;
        if let Some(mode) = self.mode {
            config = config.with_mode(mode.into());
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(Duration::from_secs(timeout));
        }
        if let Some(retries) = self.retries {
            config = config.with_retries(retries);
        }
        Ok(config)
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive a file name from {}", path.display()))
}

async fn transfer(config: ClientConfig, operation: Operation, remote: String, local: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || {
        Client::new(config)
            .transfer(operation, &remote, &local)
            .with_context(|| format!("Transfer of {} failed", remote))
    })
    .await??;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let file = FileConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Command::Server {
            ip,
            port,
            path,
            read_only,
            single_port,
        } => {
            let config = file
                .server_config()?
                .merge_cli(ip, port, path, read_only, single_port);

            let server = tokio::task::spawn_blocking(move || tftp::server::run(config));
            tokio::select! {
                result = server => result??,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                    // the listener thread never returns on its own
                    std::process::exit(0);
                }
            }
        }
        Command::Get {
            target,
            remote,
            local,
        } => {
            let config = target.client_config(&file)?;
            let local = match local {
                Some(local) => local,
                None => PathBuf::from(file_name(Path::new(&remote))?),
            };
            transfer(config, Operation::Get, remote, local).await?;
        }
        Command::Put {
            target,
            local,
            remote,
        } => {
            let config = target.client_config(&file)?;
            let remote = match remote {
                Some(remote) => remote,
                None => file_name(&local)?,
            };
            transfer(config, Operation::Put, remote, local).await?;
        }
        Command::Shell { target } => {
            let config = target.client_config(&file)?;
            tokio::task::spawn_blocking(move || shell::run(config)).await??;
        }
    }

    Ok(())
}
