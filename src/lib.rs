//! # tradeworld - player trading for a persistent-world game server
//!
//! Two characters negotiate a trade over several round-trips and the exchange is
//! applied to both inventories at once, or not at all.
//!
//! ## Features
//!
//! - **Transactional inventories**: every change goes through an [`inventory::InventoryTransaction`]
//!   that can be cancelled back to the state it was opened with.
//! - **Trade sessions**: a small state machine ([`trade::TradeSession`]) owned by a
//!   [`trade::SessionRegistry`] that keeps each character in at most one trade.
//! - **Late validation**: offers are proposals; they are checked against the live
//!   inventories only when both sides have accepted.
//! - **Text protocol server**: newline-delimited commands over TCP, one world task.
//! - **Persistence**: characters stored in sled, written through after every change.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tradeworld::config::Config;
//! use tradeworld::server::WorldServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let server = WorldServer::new(config)?;
//!     server.run(None).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`inventory`] - item catalog, ledgers and staged transactions
//! - [`trade`] - trade sessions, settlement and the session registry
//! - [`world`] - online characters, GM commands and the world composition root
//! - [`protocol`] - client command parsing and server message rendering
//! - [`server`] - TCP listener and connection tasks
//! - [`storage`] - sled-backed character records
//! - [`config`] - TOML configuration

pub mod config;
pub mod errors;
pub mod inventory;
pub mod logutil;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod trade;
pub mod world;
