//! Command Line and Logging
//!
//! Command-line interface of the `cosmic-remote` front end and logging
//! initialisation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cosmic_remote_protocol::{QualityPreset, SortOrder};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// COSMIC Remote command-line interface
#[derive(Parser, Debug)]
#[command(name = "cosmic-remote")]
#[command(about = "Remote session companion for COSMIC Desktop", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(short, long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Enable JSON structured logging
    #[arg(long)]
    pub json_logs: bool,

    /// Show timestamps in logs
    #[arg(long, default_value = "true")]
    pub timestamps: bool,

    /// Use this configuration file instead of the default one
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a device
    Connect {
        #[command(subcommand)]
        via: ConnectCommand,
    },

    /// Show or clear recent connections
    History {
        /// Forget every recent connection
        #[arg(long)]
        clear: bool,
    },

    /// List a directory on the device
    Browse {
        /// Directory names to enter from the root, in order
        path: Vec<String>,

        /// Only show entries whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Sort order (name, name-desc, date, date-desc, size, size-desc)
        #[arg(short, long, default_value = "name")]
        sort: SortOrder,

        /// List directories before files
        #[arg(long)]
        dirs_first: bool,
    },

    /// Move files to or from the device
    Transfer {
        #[command(subcommand)]
        action: TransferCommand,
    },

    /// Run a screen-streaming session
    Stream {
        /// Quality preset (low, medium, high, ultra)
        #[arg(short, long)]
        quality: Option<QualityPreset>,

        /// How long to stream
        #[arg(short, long, default_value = "10")]
        seconds: u64,

        /// Reset the stream after this many seconds
        #[arg(long)]
        reset_after: Option<u64>,
    },

    /// Send input to the device
    Input {
        #[command(subcommand)]
        action: InputCommand,
    },

    /// Show current configuration
    DumpConfig,
}

/// Transport selection for `connect`
#[derive(Subcommand, Debug)]
pub enum ConnectCommand {
    /// Connect over WiFi
    Network {
        /// Address of the device
        address: String,

        /// Port of the companion app
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Connect over USB
    Wired,

    /// Connect over Bluetooth
    ShortRange {
        /// Device name; the first scanned device is used when omitted
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Connect using a scanned connect code
    Uri {
        /// Code of the form icondesk://connect/<address>:<port>
        uri: String,
    },
}

/// Transfer commands
#[derive(Subcommand, Debug)]
pub enum TransferCommand {
    /// Upload a local file
    Upload {
        /// Local file
        file: PathBuf,

        /// Remote directory to upload into
        #[arg(long, default_value = "/")]
        to: String,
    },

    /// Download remote files
    Download {
        /// Remote paths
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Compress remote files into an archive next to them
    Compress {
        /// Remote paths, all in the same directory
        #[arg(required = true)]
        paths: Vec<String>,

        /// Archive name
        #[arg(short, long)]
        name: Option<String>,
    },
}

/// Input commands
#[derive(Subcommand, Debug)]
pub enum InputCommand {
    /// Type text
    Text {
        text: String,
    },

    /// Press a key (a-z, return, space, tab, escape, up_arrow, ...)
    Key {
        name: String,
    },

    /// Press a function key
    Function {
        /// 1 - 12
        number: u8,
    },
}

/// Initialize logging based on CLI configuration
pub fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli.log_level.parse::<Level>().with_context(|| {
        format!(
            "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
            cli.log_level
        )
    })?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.as_str()))
        .context("Failed to create log filter")?;

    // Build base formatter configuration
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    // Apply format and timestamp options
    match (cli.json_logs, cli.timestamps) {
        (true, true) => subscriber.json().init(),
        (true, false) => subscriber.without_time().json().init(),
        (false, true) => subscriber.init(),
        (false, false) => subscriber.without_time().init(),
    }

    info!(
        "Logging initialized: level={}, json={}, timestamps={}",
        log_level, cli.json_logs, cli.timestamps
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_browse() {
        let cli = Cli::try_parse_from([
            "cosmic-remote",
            "browse",
            "Documents",
            "Work",
            "--sort",
            "size-desc",
            "--dirs-first",
        ])
        .unwrap();

        match cli.command {
            Command::Browse {
                path,
                sort,
                dirs_first,
                filter,
            } => {
                assert_eq!(path, ["Documents", "Work"]);
                assert_eq!(sort, SortOrder::SizeDescending);
                assert!(dirs_first);
                assert!(filter.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_connect_network() {
        let cli = Cli::try_parse_from([
            "cosmic-remote",
            "--log-level",
            "debug",
            "connect",
            "network",
            "10.0.0.5",
            "--port",
            "9000",
        ])
        .unwrap();

        assert_eq!(cli.log_level, "debug");
        assert!(matches!(
            cli.command,
            Command::Connect {
                via: ConnectCommand::Network { ref address, port: Some(9000) }
            } if address == "10.0.0.5"
        ));
    }

    #[test]
    fn test_parse_stream_quality() {
        let cli =
            Cli::try_parse_from(["cosmic-remote", "stream", "-q", "ultra", "-s", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Stream {
                quality: Some(QualityPreset::Ultra),
                seconds: 3,
                reset_after: None
            }
        ));
    }

    #[test]
    fn test_download_requires_paths() {
        assert!(Cli::try_parse_from(["cosmic-remote", "transfer", "download"]).is_err());
    }
}
