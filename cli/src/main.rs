mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use chordring_core::config::{Config, Mode};
use chordring_core::storage::{MemoryStorage, SledStorage, Storage};
use chordring_core::tls;
use tracing_subscriber::prelude::*;

/// Chord ring node: joins or creates a ring and drops into an interactive
/// shell once the node is up.
#[derive(Parser)]
#[command(name = "chordring")]
#[command(about = "A distributed, replicated Chord key-value ring", long_about = None)]
#[command(version)]
struct Cli {
    /// This node's advertised IP address
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    /// This node's listen port
    #[arg(long)]
    port: u16,

    /// Seed node IP to join an existing ring; omit to create a new ring
    #[arg(long, requires = "seed_port")]
    seed_ip: Option<String>,

    /// Seed node port to join an existing ring
    #[arg(long, requires = "seed_ip")]
    seed_port: Option<u16>,

    /// Identifier space width in bits
    #[arg(long, default_value_t = 10)]
    m: u32,

    /// Successor/backup list length
    #[arg(long, default_value_t = 3)]
    r: usize,

    /// Stabilize interval, milliseconds
    #[arg(long, default_value_t = 1000)]
    stabilize_ms: u64,

    /// Fix-fingers interval, milliseconds
    #[arg(long, default_value_t = 1000)]
    fix_fingers_ms: u64,

    /// Check-predecessor interval, milliseconds
    #[arg(long, default_value_t = 1000)]
    check_predecessor_ms: u64,

    /// Override this node's identifier with a 40-hex-character value instead
    /// of hashing ip:port
    #[arg(long)]
    identifier: Option<String>,

    /// Storage root directory (one `sled` tree per local/backup slot)
    #[arg(long, default_value = "./chordring-data")]
    storage_root: PathBuf,

    /// Use in-memory storage instead of `sled` (lost on exit)
    #[arg(long, default_value_t = false)]
    memory_storage: bool,

    /// Enable AES-256-GCM encryption for storefile/getfile
    #[arg(long, default_value_t = false)]
    aes: bool,

    /// Path to the hex-encoded AES key (required when --aes is set)
    #[arg(long)]
    aes_key: Option<PathBuf>,

    /// Enable TLS for the RPC transport
    #[arg(long, default_value_t = false)]
    tls: bool,

    /// CA certificate (required when --tls is set)
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// This node's certificate (required when --tls is set)
    #[arg(long)]
    server_cert: Option<PathBuf>,

    /// This node's private key (required when --tls is set)
    #[arg(long)]
    server_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let file_appender = tracing_appender::rolling::daily("./chordring-logs", "chordring.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter()))
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false).with_filter(env_filter()))
        .init();

    let cli = Cli::parse();

    let mode = match (cli.seed_ip.clone(), cli.seed_port) {
        (Some(seed_ip), Some(seed_port)) => Mode::Join { seed_ip, seed_port },
        _ => Mode::Create,
    };

    let identifier_override = cli
        .identifier
        .as_deref()
        .map(|s| chordring_core::config::parse_identifier_override(s, cli.m))
        .transpose()?;

    let aes_enabled = cli.aes;
    let aes_key_path = cli.aes_key.clone();

    let config = Config {
        ip: cli.ip,
        port: cli.port,
        mode,
        m: cli.m,
        r: cli.r,
        stabilize_ms: cli.stabilize_ms,
        fix_fingers_ms: cli.fix_fingers_ms,
        check_predecessor_ms: cli.check_predecessor_ms,
        identifier_override,
        aes_enabled: cli.aes,
        aes_key_path: cli.aes_key,
        tls_enabled: cli.tls,
        ca_cert: cli.ca_cert,
        server_cert: cli.server_cert,
        server_key: cli.server_key,
        storage_root: cli.storage_root.clone(),
    };
    config.validate().context("invalid configuration")?;

    let aes_key = match (aes_enabled, aes_key_path) {
        (true, Some(path)) => Some(chordring_core::crypto::load_key(path).context("failed to load AES key")?),
        _ => None,
    };

    let (local_storage, backup_storages): (Arc<dyn Storage>, Vec<Arc<dyn Storage>>) = if cli.memory_storage {
        (
            Arc::new(MemoryStorage::new()),
            (0..config.r).map(|_| Arc::new(MemoryStorage::new()) as Arc<dyn Storage>).collect(),
        )
    } else {
        std::fs::create_dir_all(&config.storage_root).context("failed to create storage root")?;
        let local = Arc::new(SledStorage::open(config.storage_root.join("local"))?);
        let mut backups = Vec::with_capacity(config.r);
        for i in 0..config.r {
            backups.push(Arc::new(SledStorage::open(config.storage_root.join(format!("backup-{i}")))?) as Arc<dyn Storage>);
        }
        (local, backups)
    };

    let (client_tls, server_tls) = if config.tls_enabled {
        let material = tls::setup_tls(
            config.ca_cert.as_ref().unwrap(),
            config.server_cert.as_ref().unwrap(),
            config.server_key.as_ref().unwrap(),
        )?;
        (Some(material.client_config), Some(material.server_config))
    } else {
        (None, None)
    };

    let node = chordring_core::membership::start(config, local_storage, backup_storages, client_tls, server_tls)
        .await
        .context("failed to start node")?;

    println!("{}", "Chord ring node started.".bold());
    println!("  id:   {}", node.info.id.to_string().bright_cyan());
    println!("  addr: {}", node.info.addr().bright_cyan());
    println!();

    shell::run(node, aes_key).await
}
