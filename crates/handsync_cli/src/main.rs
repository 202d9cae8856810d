//! handsync CLI
//!
//! Command-line client for handheld PIM devices.
//!
//! # Commands
//!
//! - `info` - Show device model, language and storage path
//! - `pull` - Fetch changed items of one category and mark it synced
//! - `time` - Read or set the device clock
//! - `reset` - Force a slow sync for a category

mod commands;

use clap::{Parser, Subcommand};
use commands::Connection;
use handsync_engine::{DESKTOP_PORT, DEVICE_PORT};
use handsync_protocol::ItemKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sync client for handheld PIM devices.
#[derive(Parser)]
#[command(name = "handsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Device address
    #[arg(global = true, short, long, default_value = "192.168.129.201")]
    device: String,

    /// Device port
    #[arg(global = true, long, default_value_t = DEVICE_PORT)]
    port: u16,

    /// Port the desktop listens on for the device's callback
    #[arg(global = true, long, default_value_t = DESKTOP_PORT)]
    listen_port: u16,

    /// Device password
    #[arg(global = true, long)]
    password: Option<String>,

    /// Message log file (defaults to ~/.handsync/handsync.log)
    #[arg(global = true, long)]
    log: Option<PathBuf>,

    /// Do not write a message log
    #[arg(global = true, long)]
    no_log: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show device model, language and storage path
    Info {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Fetch changed items of one category and mark it synced
    Pull {
        /// Category (todo, calendar, address)
        #[arg(short, long, default_value = "todo")]
        kind: ItemKind,

        /// Leave the category flagged as out of sync
        #[arg(long)]
        keep_flag: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Read or set the device clock
    Time {
        /// New clock value as YYYYMMDDhhmmss
        #[arg(long)]
        set: Option<String>,
    },

    /// Force a slow sync for a category and every category after it
    Reset {
        /// Category (todo, calendar, address)
        #[arg(short, long)]
        kind: ItemKind,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let log = if cli.no_log {
        None
    } else {
        cli.log.or_else(commands::default_log_path)
    };
    let connection = Connection {
        device: cli.device,
        port: cli.port,
        listen_port: cli.listen_port,
        password: cli.password,
        log,
    };

    match cli.command {
        Commands::Info { format } => commands::info::run(&connection, &format)?,
        Commands::Pull {
            kind,
            keep_flag,
            format,
        } => commands::pull::run(&connection, kind, !keep_flag, &format)?,
        Commands::Time { set } => commands::time::run(&connection, set.as_deref())?,
        Commands::Reset { kind } => commands::reset::run(&connection, kind)?,
    }

    Ok(())
}
