mod cli;
mod config;
mod storage;

use std::{
    fs,
    io::{self, Write},
    path::Path,
    process,
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::Parser;
use color_eyre::{Report, Result};
use keymgr_core::{KeyManager, KeyManagerConfig, KeyManagerError, KeyPair};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Command, ConfigCommand};

/// Exit status for duplicate or missing keys, distinct from fatal failures.
const EXIT_RECOVERABLE: i32 = 2;

/// Entry point wiring the CLI to the configured key manager backend.
fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        if let Some(code) = recoverable_exit_code(&err) {
            eprintln!("keymgr: {err}");
            process::exit(code);
        }
        return Err(err);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => config::load_from_path(path)?,
        None => config::load()?,
    };

    match cli.command {
        Command::Save {
            key_type,
            key_name,
            public,
            private,
        } => {
            let manager = storage::manager_from_config(&config)?;
            let public_material = fs::read(&public)?;
            let private_material = private.as_deref().map(fs::read).transpose()?;
            save_pair(
                manager.as_ref(),
                &key_type,
                &key_name,
                &public_material,
                private_material.as_deref(),
            )?;
            println!("Saved {key_type}/{key_name}");
        }
        Command::Get {
            key_type,
            key_name,
            show_private,
            raw,
            json,
        } => {
            let manager = storage::manager_from_config(&config)?;
            let pair = manager.get(&key_type, &key_name, !raw)?;
            let mut stdout = io::stdout().lock();
            if json {
                let body = render_json(&key_type, &key_name, &pair, show_private)?;
                writeln!(stdout, "{body}")?;
            } else {
                write_pair(&mut stdout, &pair, show_private)?;
            }
        }
        Command::Remove { key_type, key_name } => {
            let manager = storage::manager_from_config(&config)?;
            manager.remove(&key_type, &key_name)?;
            println!("Removed {key_type}/{key_name}");
        }
        Command::Health => run_health_check(&config)?,
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(cli.config.as_deref(), &config)?,
    }

    Ok(())
}

/// Key manager errors the caller can act on get their own exit status.
fn recoverable_exit_code(err: &Report) -> Option<i32> {
    err.downcast_ref::<KeyManagerError>()
        .filter(|err| err.is_recoverable())
        .map(|_| EXIT_RECOVERABLE)
}

fn init_tracing() {
    // Respect user-provided filters, default to info; logs go to stderr so key output stays clean.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("keymgr {}", env!("CARGO_PKG_VERSION"));
}

fn save_pair(
    manager: &dyn KeyManager,
    key_type: &str,
    key_name: &str,
    public_material: &[u8],
    private_material: Option<&[u8]>,
) -> Result<()> {
    manager.save(key_type, key_name, public_material, private_material)?;
    info!(key_type, key_name, "key pair saved");
    Ok(())
}

#[derive(Debug, Serialize)]
struct KeyPairView<'a> {
    key_type: &'a str,
    key_name: &'a str,
    public: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    private: Option<String>,
    has_private: bool,
}

fn render_json(
    key_type: &str,
    key_name: &str,
    pair: &KeyPair,
    show_private: bool,
) -> Result<String> {
    let view = KeyPairView {
        key_type,
        key_name,
        public: BASE64.encode(&pair.public_material),
        private: pair
            .private_material
            .as_ref()
            .filter(|_| show_private)
            .map(|p| BASE64.encode(p)),
        has_private: pair.private_material.is_some(),
    };
    Ok(serde_json::to_string_pretty(&view)?)
}

fn write_pair(out: &mut impl Write, pair: &KeyPair, show_private: bool) -> Result<()> {
    out.write_all(&pair.public_material)?;
    if show_private {
        if let Some(private) = &pair.private_material {
            if !pair.public_material.ends_with(b"\n") {
                out.write_all(b"\n")?;
            }
            out.write_all(private)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Round-trips a throwaway key pair through the configured backend.
fn run_health_check(config: &KeyManagerConfig) -> Result<()> {
    let manager = storage::manager_from_config(config)?;
    run_store_health(manager.as_ref())?;
    println!("Key store: ok");
    Ok(())
}

fn run_store_health(manager: &dyn KeyManager) -> Result<()> {
    let health_type = "health";
    let health_name = format!("check-{}", process::id());
    let public = b"health-public";
    let private = b"health-private";

    manager.remove(health_type, &health_name)?;
    manager.save(health_type, &health_name, public, Some(private))?;
    let round_trip = manager.get(health_type, &health_name, true);
    manager.remove(health_type, &health_name)?;
    let round_trip = round_trip?;

    if round_trip.public_material != public
        || round_trip.private_material.as_deref() != Some(&private[..])
    {
        color_eyre::eyre::bail!("key store round-trip failed");
    }
    Ok(())
}

fn init_config(explicit: Option<&Path>, config: &KeyManagerConfig) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config::default_path()?,
    };
    let mut defaults = storage::with_defaults(config.clone())?;
    // Secrets from the environment stay out of the file.
    defaults.keystore_secret = None;
    let path = config::write_default_if_missing(&defaults, &path)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
