//! Operator CLI for NFC access credentials

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nfc_access_pcsc::PcscDeviceManager;
use tracing::debug;

mod commands;
mod config;
mod utils;

use commands::*;
use utils::reader;

#[derive(Parser)]
#[command(version, about = "Issue, upgrade and check signed NFC access credentials")]
struct Cli {
    /// Reader to use (any reader when not specified)
    #[arg(short, long)]
    reader: Option<String>,

    /// Configuration file (default: ~/.nfc-access/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the key material
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seconds to wait for a tag
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    Readers,

    /// Manage the signing key pair
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Write a new signed credential to the next tag
    Write {
        /// Holder's full name
        #[arg(long)]
        name: String,

        /// Holder's phone number
        #[arg(long)]
        phone: String,

        /// Local part of the holder's email address
        #[arg(long)]
        email: String,

        /// Leave the anti-clone counter untouched
        #[arg(long)]
        no_counter: bool,
    },

    /// Re-sign the credential on the next tag
    Upgrade {
        /// Rewrite even when the signature is already valid
        #[arg(long)]
        force: bool,
    },

    /// Read the next tag
    Read,

    /// Read every tag presented until interrupted
    Watch,

    /// Print the legacy door code for a UID
    DoorCode {
        /// Tag UID in hex
        uid: String,
    },

    /// Check a credential against a UID without a reader
    Verify {
        /// Tag UID in hex
        #[arg(long)]
        uid: String,

        /// Note or credential text
        #[arg(long, group = "source")]
        note: Option<String>,

        /// File holding the note or credential
        #[arg(long, group = "source")]
        file: Option<PathBuf>,

        /// Base64 public key (default: the configured key)
        #[arg(long)]
        public_key: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a new key pair
    Generate {
        /// Replace an existing key pair
        #[arg(long)]
        force: bool,
    },

    /// Import a key pair exported from another device
    Import {
        /// Base64 public key
        #[arg(long)]
        public: String,

        /// Base64 private key
        #[arg(long)]
        private: String,
    },

    /// Show the configured public key
    Show {
        /// Also print the private key
        #[arg(long)]
        private: bool,
    },

    /// Erase the key pair
    Clear,
}

fn main() -> eyre::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    let mut config = config::load_config(cli.config)?;
    if cli.reader.is_some() {
        config.reader = cli.reader;
    }
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    debug!(?config, "Loaded configuration");

    match &cli.command {
        Commands::DoorCode { uid } => return door_code_command(uid),
        Commands::Readers => {
            let manager = PcscDeviceManager::new()?;
            return reader::list_readers(&manager);
        }
        _ => {}
    }

    let keys = Arc::new(open_keys(&config.data_dir()?)?);

    match cli.command {
        Commands::Readers | Commands::DoorCode { .. } => unreachable!(), // Already handled above
        Commands::Keys { command } => match command {
            KeyCommands::Generate { force } => generate_keys_command(&keys, force),
            KeyCommands::Import { public, private } => {
                import_keys_command(&keys, &public, &private)
            }
            KeyCommands::Show { private } => show_keys_command(&keys, private),
            KeyCommands::Clear => clear_keys_command(&keys),
        },
        Commands::Verify {
            uid,
            note,
            file,
            public_key,
        } => verify_command(
            &keys,
            &uid,
            note.as_deref(),
            file.as_deref(),
            public_key.as_deref(),
        ),
        command => {
            let manager = PcscDeviceManager::new()?;
            let ctx = TagContext {
                manager: &manager,
                config: &config,
                keys,
            };
            match command {
                Commands::Write {
                    name,
                    phone,
                    email,
                    no_counter,
                } => write_command(
                    &ctx,
                    &name,
                    &phone,
                    &email,
                    config.enable_counter && !no_counter,
                ),
                Commands::Upgrade { force } => upgrade_command(&ctx, force),
                Commands::Read => read_command(&ctx),
                Commands::Watch => watch_command(&ctx),
                _ => unreachable!(),
            }
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}
