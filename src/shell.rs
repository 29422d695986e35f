//! Interactive client shell
//!
//! A line-mode prompt in the style of the classic `tftp` client:
//!
//! ```text
//! tftp> mode octet
//! tftp> get boot.img
//! tftp> put notes.txt remote.txt
//! tftp> quit
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use dialoguer::Input;
use dialoguer::theme::SimpleTheme;

use crate::tftp::client::{Client, ClientConfig, Operation};
use crate::tftp::core::{Options, TransferMode};

const HELP: &str = "\
Commands:
  connect <host> [port]   set the server
  get <remote> [local]    download a file
  put <local> [remote]    upload a file
  mode [netascii|octet]   show or set the transfer mode
  timeout <seconds>       set the retransmission timeout
  status                  show current settings
  help                    show this text
  quit                    leave the shell";

/// One parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { host: String, port: Option<u16> },
    Transfer {
        operation: Operation,
        remote: String,
        local: PathBuf,
    },
    Mode(Option<TransferMode>),
    Timeout(Duration),
    Status,
    Help,
    Quit,
}

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<Command>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match (name, args) {
        ("connect", [host]) => Command::Connect {
            host: host.to_string(),
            port: None,
        },
        ("connect", [host, port]) => Command::Connect {
            host: host.to_string(),
            port: Some(port.parse()?),
        },
        ("get", [remote]) => Command::Transfer {
            operation: Operation::Get,
            remote: remote.to_string(),
            local: PathBuf::from(file_name(remote)),
        },
        ("get", [remote, local]) => Command::Transfer {
            operation: Operation::Get,
            remote: remote.to_string(),
            local: PathBuf::from(local),
        },
        ("put", [local]) => Command::Transfer {
            operation: Operation::Put,
            remote: file_name(local).to_string(),
            local: PathBuf::from(local),
        },
        ("put", [local, remote]) => Command::Transfer {
            operation: Operation::Put,
            remote: remote.to_string(),
            local: PathBuf::from(local),
        },
        ("mode", []) => Command::Mode(None),
        ("mode", [mode]) => match mode.to_ascii_lowercase().as_str() {
            "netascii" | "ascii" => Command::Mode(Some(TransferMode::NetAscii)),
            "octet" | "binary" => Command::Mode(Some(TransferMode::Octet)),
            other => bail!("unknown mode '{}'", other),
        },
        ("timeout", [secs]) => {
            Command::Timeout(Options::check_timeout(Duration::from_secs(secs.parse()?))?)
        }
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        (name, _) => bail!("invalid command '{}', try 'help'", name),
    };

    Ok(Some(command))
}

/// Last path component, used when only one side of a transfer is named
fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// Run the shell until `quit` or end of input
pub fn run(mut config: ClientConfig) -> Result<()> {
    println!("Connected to {}. Type 'help' for commands.", config.server_addr());

    loop {
        let line: String = match Input::with_theme(&SimpleTheme)
            .with_prompt("tftp")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            // stdin closed
            Err(_) => return Ok(()),
        };

        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Connect { host, port } => {
                let port = port.unwrap_or(config.server_port);
                match ClientConfig::resolve(&host, port) {
                    Ok(resolved) => {
                        config.server_ip = resolved.server_ip;
                        config.server_port = resolved.server_port;
                        println!("Connected to {}", config.server_addr());
                    }
                    Err(e) => println!("Cannot resolve {}: {}", host, e),
                }
            }
            Command::Transfer {
                operation,
                remote,
                local,
            } => {
                let client = Client::new(config.clone());
                match client.transfer(operation, &remote, &local) {
                    Ok(summary) => println!(
                        "Transferred {} bytes in {:.2?}",
                        summary.bytes, summary.elapsed
                    ),
                    Err(e) => println!("Transfer failed: {}", e),
                }
            }
            Command::Mode(Some(mode)) => config.mode = mode,
            Command::Mode(None) => println!("Using {} mode", config.mode),
            Command::Timeout(timeout) => config = config.with_timeout(timeout),
            Command::Status => println!(
                "Server: {}\nMode: {}\nTimeout: {:?}\nRetries: {}",
                config.server_addr(),
                config.mode,
                config.options.timeout,
                config.options.retries
            ),
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(()),
        }
    }
}
