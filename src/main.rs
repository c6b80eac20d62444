//! Binary entrypoint for the tradeworld CLI.
//!
//! Commands:
//! - `start [--bind <addr>]` - run the world server until Ctrl-C
//! - `init` - write a starter `config.toml` and create the data directory
//! - `status` - print stored characters and configured limits
//! - `grant <name> <item> <amount>` - give items to an offline character
//! - `money <name> <delta>` - change an offline character's money
//!
//! See the library crate docs for module-level details: `tradeworld::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

use tradeworld::config::Config;
use tradeworld::inventory::ItemId;
use tradeworld::server::{load_catalog, WorldServer};
use tradeworld::storage::CharacterStore;

#[derive(Parser)]
#[command(name = "tradeworld")]
#[command(about = "Persistent-world trade server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the world server
    Start {
        /// Listen address, overrides `server.bind`
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Show stored characters and limits
    Status,
    /// Give an offline character items
    Grant {
        name: String,
        item: u32,
        amount: u32,
    },
    /// Change an offline character's money (negative to take)
    Money {
        name: String,
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start { bind } => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting tradeworld v{}", env!("CARGO_PKG_VERSION"));
            let server = WorldServer::new(config)?;
            server.run(bind).await?;
        }
        Commands::Init => {
            info!("Initializing new configuration");
            if tokio::fs::metadata(&cli.config).await.is_ok() {
                return Err(anyhow!("{} already exists", cli.config));
            }
            Config::create_default(&cli.config).await?;
            let cfg = Config::default();
            tokio::fs::create_dir_all(&cfg.storage.data_dir).await?;
            info!("Configuration file created at {}", cli.config);
            info!("Data directory {}", cfg.storage.data_dir);
        }
        Commands::Status => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            let store = CharacterStore::open(&config.storage.data_dir)?;
            let catalog = load_catalog(&config.storage)?;
            println!("=== tradeworld status ===");
            println!("Server: {} on {}", config.server.name, config.server.bind);
            println!("Item classes: {}", catalog.len());
            println!(
                "Inventory: {} slots, trade offers up to {} entries",
                config.inventory.capacity, config.trade.max_offer_entries
            );
            println!("Characters stored: {}", store.character_count());
            for name in store.list_character_names()? {
                println!("  {}", name);
            }
        }
        Commands::Grant { name, item, amount } => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            let store = CharacterStore::open(&config.storage.data_dir)?;
            let catalog = load_catalog(&config.storage)?;
            let item = ItemId(item);
            if !catalog.contains(item) {
                return Err(anyhow!("unknown item {}", item));
            }
            let (left, record) =
                store.update_inventory(&name, config.inventory.capacity, &catalog, |txn| {
                    txn.insert(item, amount)
                })?;
            info!(target: "trade", "cli granted {} x {} to {}", amount - left, item, record.name);
            println!("{} received {} of item {} ({} did not fit)", record.name, amount - left, item, left);
        }
        Commands::Money { name, delta } => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            let store = CharacterStore::open(&config.storage.data_dir)?;
            let catalog = load_catalog(&config.storage)?;
            let (changed, record) =
                store.update_inventory(&name, config.inventory.capacity, &catalog, |txn| {
                    txn.change_money(delta)
                })?;
            if !changed {
                return Err(anyhow!("{} holds only {} money", record.name, record.money));
            }
            info!(target: "trade", "cli changed money of {} by {}", record.name, delta);
            println!("{} now holds {} money", record.name, record.money);
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    let cli_level = match verbosity {
        0 => None,
        1 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    };
    let config_level = config
        .as_ref()
        .and_then(|cfg| cfg.logging.level.parse::<log::LevelFilter>().ok());
    builder.filter_level(cli_level.or(config_level).unwrap_or(log::LevelFilter::Info));
    // sled is chatty at debug
    builder.filter_module("sled", log::LevelFilter::Warn);

    let log_file = config.as_ref().and_then(|cfg| cfg.logging.file.as_ref()).and_then(|file| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .ok()
    });
    let audit_path = config.as_ref().and_then(|cfg| cfg.logging.audit_file.clone());
    let log_file = log_file.map(|f| std::sync::Arc::new(std::sync::Mutex::new(f)));
    let is_tty = atty::is(atty::Stream::Stdout);

    builder.format(move |fmt, record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!("{} [{}] {}", ts, record.level(), record.args());

        if record.target() == "trade" {
            if let Some(ref path) = audit_path {
                if let Ok(mut audit) = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                {
                    let _ = writeln!(audit, "{}", line);
                }
            }
        }

        match log_file {
            Some(ref file) => {
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                // console only in the foreground, otherwise stdout is the log file
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            }
            None => writeln!(fmt, "{}", line),
        }
    });
    let _ = builder.try_init();
}
