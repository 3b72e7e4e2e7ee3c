//! Shared helpers for pipe client integration tests

#![allow(dead_code)]

use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use libpipelink::{ClientConfig, Connector, Handlers, PipeStatus, ReconnectPolicy};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// How long a test waits for an expected event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a handler can observe, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Status(PipeStatus, u64),
    Message(String),
    Terminate,
}

/// Handlers that forward every event into a channel
pub fn recording_handlers() -> (Handlers, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let status_tx = tx.clone();
    let message_tx = tx.clone();
    let terminate_tx = tx;

    let handlers = Handlers::new()
        .on_status(move |status, count| {
            let _ = status_tx.send(Event::Status(status, count));
        })
        .on_message(move |text| {
            let _ = message_tx.send(Event::Message(text.to_string()));
        })
        .on_terminate(move || {
            let _ = terminate_tx.send(Event::Terminate);
        });

    (handlers, rx)
}

/// Wait for the next event, failing the test on timeout
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Assert that no event arrives within `wait`
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Event>, wait: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(wait, rx.recv()).await {
        panic!("unexpected event: {:?}", event);
    }
}

/// Config with tiny reconnect delays so tests stay fast
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        reconnect: ReconnectPolicy::with_delays([5, 10, 20]),
        ..ClientConfig::default()
    }
}

#[derive(Default)]
struct MockState {
    refuse_next: usize,
    endpoints: Vec<String>,
    peers: Option<mpsc::UnboundedSender<Peer>>,
}

/// In-memory connector: each successful connect hands the far end of a
/// duplex stream to the test as a `Peer`
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Peer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = MockState {
            peers: Some(tx),
            ..MockState::default()
        };
        (
            Self {
                state: Arc::new(Mutex::new(state)),
            },
            rx,
        )
    }

    /// Refuse the next `n` connect attempts
    pub fn refuse_next(&self, n: usize) {
        self.state.lock().unwrap().refuse_next = n;
    }

    /// Endpoints passed to every connect attempt so far
    pub fn endpoints(&self) -> Vec<String> {
        self.state.lock().unwrap().endpoints.clone()
    }

    fn accept(&self, endpoint: &str) -> io::Result<DuplexStream> {
        let mut state = self.state.lock().unwrap();
        state.endpoints.push(endpoint.to_string());

        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "peer not listening",
            ));
        }

        let (client, server) = tokio::io::duplex(64 * 1024);
        if let Some(ref peers) = state.peers {
            let _ = peers.send(Peer { stream: server });
        }
        Ok(client)
    }
}

impl Connector for MockConnector {
    type Stream = DuplexStream;

    fn connect(&self, endpoint: &str) -> impl Future<Output = io::Result<DuplexStream>> + Send {
        std::future::ready(self.accept(endpoint))
    }
}

/// The listening side of one mock transport
pub struct Peer {
    pub stream: DuplexStream,
}

impl Peer {
    pub async fn send(&mut self, text: &str) {
        self.stream.write_all(text.as_bytes()).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Read whatever the client has written so far (at least one byte)
    pub async fn recv(&mut self) -> String {
        let mut buf = vec![0u8; 4096];
        let n = tokio::time::timeout(EVENT_TIMEOUT, self.stream.read(&mut buf))
            .await
            .expect("timed out waiting for client write")
            .unwrap();
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }
}

/// Wait for the next transport the client opens
pub async fn next_peer(rx: &mut mpsc::UnboundedReceiver<Peer>) -> Peer {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for connect")
        .expect("connector dropped")
}
