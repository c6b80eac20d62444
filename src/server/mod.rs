//! TCP front end for the world.
//!
//! Each client gets a [`connection`] task that only moves lines. All game state lives in
//! one [`World`] owned by the task running [`WorldServer::serve`], which handles inputs
//! one at a time, delivers the messages they produce and writes changed characters
//! through to the [`CharacterStore`].

pub mod connection;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{debug, error, info, trace, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::{Config, StorageConfig};
use crate::errors::WorldError;
use crate::inventory::ItemCatalog;
use crate::logutil::escape_log;
use crate::metrics::{self, TradeMetrics};
use crate::protocol::{ClientCommand, ServerMessage};
use crate::storage::CharacterStore;
use crate::world::{CharacterId, World, WorldRules};

use connection::{serve_connection, ConnectionId, WorldInput, MAX_LINE_LEN};

/// Item catalog named by `[storage] item_seed`, or the built-in one.
pub fn load_catalog(storage: &StorageConfig) -> Result<ItemCatalog, WorldError> {
    match &storage.item_seed {
        Some(path) => ItemCatalog::load_json(path),
        None => Ok(ItemCatalog::builtin()),
    }
}

struct ConnectionState {
    outbound: mpsc::UnboundedSender<String>,
    character: Option<CharacterId>,
}

pub struct WorldServer {
    config: Config,
    world: World,
    store: CharacterStore,
    connections: HashMap<ConnectionId, ConnectionState>,
    by_character: HashMap<CharacterId, ConnectionId>,
    last_metrics: TradeMetrics,
}

impl WorldServer {
    /// Open the store and load the item catalog named by `config`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let catalog = load_catalog(&config.storage)?;
        let store = CharacterStore::open(&config.storage.data_dir)
            .map_err(|e| anyhow!("Failed to open data dir {}: {}", config.storage.data_dir, e))?;
        Ok(Self::with_parts(config, catalog, store))
    }

    pub fn with_parts(config: Config, catalog: ItemCatalog, store: CharacterStore) -> Self {
        let world = World::new(WorldRules::from_config(&config), catalog);
        Self {
            config,
            world,
            store,
            connections: HashMap::new(),
            by_character: HashMap::new(),
            last_metrics: TradeMetrics::default(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Bind the configured address (or `bind_override`) and serve until Ctrl-C.
    pub async fn run(self, bind_override: Option<String>) -> Result<()> {
        let addr = bind_override.unwrap_or_else(|| self.config.server.bind.clone());
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow!("Failed to bind {}: {}", addr, e))?;
        info!("'{}' listening on {}", self.config.server.name, addr);
        self.serve(listener, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await
    }

    /// Serve `listener` until `shutdown` resolves, then persist everyone still online.
    pub async fn serve<F>(mut self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tick =
            tokio::time::interval(Duration::from_millis(self.config.server.tick_ms.max(1)));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((mut stream, peer)) => {
                        if self.connections.len() >= self.config.server.max_connections {
                            warn!("refusing {}: {} connections open", peer, self.connections.len());
                            tokio::spawn(async move {
                                let _ = stream.write_all(b"ERROR server full\n").await;
                            });
                        } else {
                            tokio::spawn(serve_connection(stream, tx.clone()));
                        }
                    }
                    Err(e) => warn!("accept failed: {}", e),
                },
                Some(input) = rx.recv() => self.handle_input(input),
                _ = tick.tick() => self.housekeeping(),
                _ = &mut shutdown => break,
            }
            self.flush();
        }

        self.shutdown();
        Ok(())
    }

    fn handle_input(&mut self, input: WorldInput) {
        match input {
            WorldInput::Connected { conn, outbound } => {
                self.connections.insert(
                    conn,
                    ConnectionState {
                        outbound,
                        character: None,
                    },
                );
            }
            WorldInput::Line { conn, line } => self.handle_line(conn, &line),
            WorldInput::Oversized { conn } => self.reply(
                conn,
                ServerMessage::Error(format!("line longer than {} bytes", MAX_LINE_LEN)),
            ),
            WorldInput::Disconnected { conn } => self.disconnect(conn),
        }
    }

    fn reply(&self, conn: ConnectionId, message: ServerMessage) {
        if let Some(state) = self.connections.get(&conn) {
            let _ = state.outbound.send(message.to_string());
        }
    }

    fn handle_line(&mut self, conn: ConnectionId, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let Some(character) = self.connections.get(&conn).map(|s| s.character) else {
            return;
        };
        let command = match line.parse::<ClientCommand>() {
            Ok(command) => command,
            Err(e) => {
                trace!("{} sent malformed line {}", conn, escape_log(line));
                self.reply(conn, ServerMessage::Error(e.to_string()));
                return;
            }
        };

        match (character, command) {
            (None, ClientCommand::Login { name }) => self.login(conn, &name),
            (_, ClientCommand::Quit) => self.disconnect(conn),
            (None, _) => self.reply(conn, ServerMessage::Error("LOGIN first".to_string())),
            (Some(id), command) => self.world.handle(id, command),
        }
    }

    fn login(&mut self, conn: ConnectionId, name: &str) {
        if self.world.roster().by_name(name).is_some() {
            self.reply(conn, ServerMessage::Error(format!("{} is already online", name)));
            return;
        }
        let rules = self.world.rules();
        let record =
            match self
                .store
                .load_or_create(name, rules.inventory_capacity, rules.starting_money)
            {
                Ok(record) => record,
                Err(e) => {
                    error!("loading {} failed: {}", escape_log(name), e);
                    self.reply(conn, ServerMessage::Error("character unavailable".to_string()));
                    return;
                }
            };
        let Some(id) = self.world.login(record) else {
            self.reply(conn, ServerMessage::Error(format!("{} is already online", name)));
            return;
        };
        if let Some(state) = self.connections.get_mut(&conn) {
            state.character = Some(id);
        }
        self.by_character.insert(id, conn);
    }

    /// Drop the connection; a logged-in character goes offline and is saved.
    fn disconnect(&mut self, conn: ConnectionId) {
        let Some(state) = self.connections.remove(&conn) else {
            return;
        };
        let Some(id) = state.character else {
            return;
        };
        self.by_character.remove(&id);
        if let Some(record) = self.world.logout(id) {
            if let Err(e) = self.store.put_character(record) {
                error!("saving {} on logout failed: {}", id, e);
            }
        }
    }

    /// Deliver queued messages and write through changed characters.
    fn flush(&mut self) {
        for (to, message) in self.world.take_messages() {
            match self.by_character.get(&to).and_then(|c| self.connections.get(c)) {
                Some(state) => {
                    let _ = state.outbound.send(message.to_string());
                }
                None => debug!("dropping message for offline {}", to),
            }
        }
        // one batch, so both sides of a settled trade are stored together
        let dirty = self.world.take_dirty();
        let count = dirty.len();
        if let Err(e) = self.store.put_characters(dirty) {
            error!("saving {} changed character(s) failed: {}", count, e);
        }
    }

    fn housekeeping(&mut self) {
        let expired = self.world.expire_idle(Utc::now());
        if expired > 0 {
            info!(target: "trade", "{} idle trade(s) expired", expired);
        }
        let current = metrics::snapshot();
        if current != self.last_metrics {
            debug!("trade metrics: {}", current);
            self.last_metrics = current;
        }
    }

    fn shutdown(&mut self) {
        info!("Shutting down, saving {} online character(s)", self.world.roster().len());
        if let Err(e) = self.store.put_characters(self.world.snapshot_all()) {
            error!("saving online characters failed: {}", e);
        }
        if let Err(e) = self.store.flush() {
            error!("store flush failed: {}", e);
        }
    }
}
