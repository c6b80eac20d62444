//! Two TCP clients negotiate a trade against a live server.

use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;

use tradeworld::config::Config;
use tradeworld::inventory::ItemCatalog;
use tradeworld::server::WorldServer;
use tradeworld::storage::CharacterStore;

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("write");
    }

    async fn recv(&mut self) -> String {
        timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("reply in time")
            .expect("read")
            .expect("open connection")
    }

    /// Log in and return the public id from the welcome line.
    async fn login(&mut self, name: &str) -> String {
        self.send(&format!("LOGIN {}", name)).await;
        let welcome = self.recv().await;
        let mut parts = welcome.split_whitespace();
        assert_eq!(parts.next(), Some("WELCOME"));
        let public_id = parts.next().expect("public id").to_string();
        assert_eq!(parts.next(), Some(name));
        public_id
    }
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_string_lossy().into_owned();
    config.inventory.starting_money = 100;
    config.server.tick_ms = 50;
    config.logging.file = None;
    config
}

#[tokio::test]
async fn test_money_trade_over_tcp() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let store = CharacterStore::open(&config.storage.data_dir).expect("store");
    let server = WorldServer::with_parts(config.clone(), ItemCatalog::builtin(), store);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve(listener, async {
        let _ = stopped.await;
    }));

    let mut ada = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    let ada_pub = ada.login("Ada").await;
    let bob_pub = bob.login("Bob").await;

    ada.send(&format!("TRADE {}", bob_pub)).await;
    assert_eq!(bob.recv().await, format!("TRADE_REQUEST {}", ada_pub));
    bob.send(&format!("ack {}", ada_pub)).await;
    assert_eq!(ada.recv().await, "TRADE_START");
    assert_eq!(bob.recv().await, "TRADE_START");

    ada.send("MONEY 30").await;
    assert_eq!(bob.recv().await, "TRADE_SET_MONEY 30");
    ada.send("ACCEPT").await;
    assert_eq!(bob.recv().await, "TRADE_ACCEPT");
    bob.send("ACCEPT").await;
    assert_eq!(ada.recv().await, "TRADE_COMPLETE");
    assert_eq!(bob.recv().await, "TRADE_COMPLETE");

    ada.send("INV").await;
    assert_eq!(ada.recv().await, "INVENTORY 70");
    bob.send("ADD nine 1").await;
    assert!(bob.recv().await.starts_with("ERROR "));

    stop.send(()).expect("server running");
    handle.await.expect("join").expect("serve");

    let store = CharacterStore::open(&config.storage.data_dir).expect("reopen");
    assert_eq!(store.get_character("ada").expect("ada").money, 70);
    assert_eq!(store.get_character("bob").expect("bob").money, 130);
}

#[tokio::test]
async fn test_commands_before_login_are_refused() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let store = CharacterStore::open(&config.storage.data_dir).expect("store");
    let server = WorldServer::with_parts(config, ItemCatalog::builtin(), store);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve(listener, async {
        let _ = stopped.await;
    }));

    let mut client = Client::connect(addr).await;
    client.send("ACCEPT").await;
    assert_eq!(client.recv().await, "ERROR LOGIN first");
    client.send("LOGIN not-a-name").await;
    assert!(client.recv().await.starts_with("ERROR "));
    client.login("Eve").await;
    client.send("LOGIN Eve").await;
    assert_eq!(client.recv().await, "ERROR already logged in");

    stop.send(()).expect("server running");
    handle.await.expect("join").expect("serve");
}
