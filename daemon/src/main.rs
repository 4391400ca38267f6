//! LMNode operator tool.
//!
//! The service itself runs inside a host node through `lmnode-node`; this
//! binary covers what operators do around it: generating service keys,
//! checking `lmnode.conf` and inspecting the caches the service left behind.

use anyhow::Context as _;
use clap::Parser;
use lmnode_node::persistence;
use lmnode_node::{MasternodeConf, NodeConfig};
use lmnode_payments::PaymentLedger;
use lmnode_registry::Registry;
use lmnode_types::{NetworkId, Timestamp};
use lmnode_utils::format_age;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lmnoded", about = "LMNode masternode operator tool")]
struct Cli {
    /// Network: "main", "test" or "regtest".
    /// When a config file is provided, defaults to the file's network value.
    #[arg(long, env = "LMNODE_NETWORK")]
    network: Option<NetworkId>,

    /// Data directory holding the caches and lmnode.conf.
    #[arg(long, env = "LMNODE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "LMNODE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "LMNODE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Generate a masternode service private key.
    Genkey,
    /// Print the effective configuration as TOML.
    Config,
    /// Check lmnode.conf and show the cached status of every entry.
    ListConf,
    /// Summarise the registry and payment caches.
    Cache {
        /// Also list every cached masternode.
        #[arg(long)]
        full: bool,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let base = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NodeConfig::default(),
    };
    let config = NodeConfig {
        network: cli.network.unwrap_or(base.network),
        data_dir: cli.data_dir.clone().unwrap_or(base.data_dir.clone()),
        log_level: cli.log_level.clone().unwrap_or(base.log_level.clone()),
        ..base
    };
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    lmnode_utils::init_tracing(&config.log_level);
    tracing::debug!(network = config.network.as_str(), data_dir = %config.data_dir.display(), "configuration loaded");

    match cli.command {
        Command::Genkey => {
            let keys = lmnode_crypto::generate_keypair();
            println!("{}", hex::encode(keys.private.0));
        }
        Command::Config => {
            print!("{}", config.to_toml_string());
        }
        Command::ListConf => {
            let path = config.masternode_conf_path();
            let conf = MasternodeConf::load(&path, config.network)?;
            let registry: Registry = persistence::load(&config.data_dir);
            if conf.is_empty() {
                println!("no masternodes configured in {}", path.display());
            }
            for entry in conf.entries() {
                entry
                    .service_keypair()
                    .with_context(|| format!("service key of {}", entry.alias))?;
                let status = registry
                    .get_info(&entry.outpoint)
                    .map_or("MISSING", |info| info.state.as_str());
                println!("{} {} {} {}", entry.alias, entry.addr, entry.outpoint, status);
            }
        }
        Command::Cache { full } => {
            let registry: Registry = persistence::load(&config.data_dir);
            let payments: PaymentLedger = persistence::load(&config.data_dir);
            println!("masternodes:    {}", registry.size());
            println!("payment blocks: {}", payments.block_count());
            println!("payment votes:  {}", payments.vote_count());
            if full {
                let now = Timestamp::now();
                for info in registry.get_full_list() {
                    println!(
                        "{} {} {} proto={} last_ping={} last_paid={} pose={}",
                        info.outpoint,
                        info.addr,
                        info.state.as_str(),
                        info.protocol_version,
                        format_age(info.last_ping_time.unwrap_or(Timestamp::EPOCH), now),
                        info.last_paid_height,
                        info.pose_ban_score
                    );
                }
            }
        }
    }

    Ok(())
}
