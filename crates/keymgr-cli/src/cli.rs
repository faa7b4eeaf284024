use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "keymgr",
    about = "Pluggable store for asymmetric key pairs",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store a new key pair; fails if either half already exists.
    Save {
        key_type: String,
        key_name: String,
        /// File holding the public key.
        #[arg(long)]
        public: PathBuf,
        /// File holding the private key.
        #[arg(long)]
        private: Option<PathBuf>,
    },
    /// Print a stored key pair.
    Get {
        key_type: String,
        key_name: String,
        /// Also print the private key.
        #[arg(long)]
        show_private: bool,
        /// Return the private key exactly as stored, without decrypting.
        #[arg(long)]
        raw: bool,
        /// Emit JSON with base64-encoded key material.
        #[arg(long)]
        json: bool,
    },
    /// Remove a key pair (no error if it does not exist).
    Remove { key_type: String, key_name: String },
    /// Round-trip a throwaway key pair through the configured backend.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
