//! Self-healing pipe client
//!
//! Each `start` spawns one session task. The session owns the read half of
//! the current transport and the reconnect loop, so there is never more than
//! one outstanding read. The write half lives in the shared state; senders
//! clone it under the state lock and write outside the lock.
//!
//! Every `start` and `stop` bumps a generation counter. Completions that
//! belong to an older generation are dropped without emitting events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::codec::MessageCodec;
use crate::config::ClientConfig;
use crate::error::{PipeError, Result};
use crate::events::{Handlers, PipeStatus};
use crate::transport::{Connector, LocalSocketConnector};

/// Lifecycle phase of a pipe client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Never started
    Idle,
    /// Connect attempt in flight
    Connecting,
    /// Transport owned; the read loop runs unless the peer sent the exit
    /// sentinel or a read failed
    Connected,
    /// Peer went away or the connect failed; no transport owned
    Disconnected,
    /// Torn down by `stop`
    Stopped,
}

/// How a read loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadOutcome {
    /// Zero-length read: the peer closed the channel
    PeerClosed,
    /// Exit sentinel received; reads are not re-armed
    ExitRequested,
    /// Read or decode failure; reads are not re-armed
    Failed,
    /// A newer start/stop took over
    Superseded,
}

/// Write side of the current transport
struct Link<S> {
    id: u64,
    writer: Arc<Mutex<WriteHalf<S>>>,
}

impl<S> Clone for Link<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            writer: self.writer.clone(),
        }
    }
}

struct ClientState<S> {
    endpoint: Option<String>,
    phase: ConnectionState,
    link: Option<Link<S>>,
    session: Option<JoinHandle<()>>,
    next_link_id: u64,
}

struct Shared<C: Connector> {
    client_id: Uuid,
    connector: C,
    config: ClientConfig,
    codec: MessageCodec,
    handlers: Handlers,
    received: AtomicU64,
    generation: AtomicU64,
    state: Mutex<ClientState<C::Stream>>,
    /// Abort handle of the latest session, reachable from `Drop` without the
    /// async state lock
    session_abort: std::sync::Mutex<Option<AbortHandle>>,
}

/// Client for a single named endpoint that reconnects when the peer drops
///
/// ```no_run
/// use libpipelink::{ClientConfig, Handlers, PipeClient};
///
/// # async fn example() -> libpipelink::Result<()> {
/// let handlers = Handlers::new().on_message(|text| println!("{text}"));
/// let client = PipeClient::new(ClientConfig::default(), handlers)?;
/// client.start("pipelink-demo").await?;
/// client.send_message("hello").await;
/// client.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct PipeClient<C: Connector = LocalSocketConnector> {
    shared: Arc<Shared<C>>,
}

impl PipeClient<LocalSocketConnector> {
    /// Create a client for OS local sockets
    pub fn new(config: ClientConfig, handlers: Handlers) -> Result<Self> {
        Self::with_connector(LocalSocketConnector, config, handlers)
    }
}

impl<C: Connector> PipeClient<C> {
    /// Create a client that opens transports through `connector`
    pub fn with_connector(connector: C, config: ClientConfig, handlers: Handlers) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                client_id: Uuid::new_v4(),
                connector,
                codec: config.codec(),
                config,
                handlers,
                received: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                state: Mutex::new(ClientState {
                    endpoint: None,
                    phase: ConnectionState::Idle,
                    link: None,
                    session: None,
                    next_link_id: 0,
                }),
                session_abort: std::sync::Mutex::new(None),
            }),
        })
    }

    /// Identifier carried in this client's log records
    pub fn client_id(&self) -> Uuid {
        self.shared.client_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Current lifecycle phase
    pub async fn state(&self) -> ConnectionState {
        self.shared.state.lock().await.phase
    }

    /// Endpoint used for the current session and its reconnects
    pub async fn endpoint(&self) -> Option<String> {
        self.shared.state.lock().await.endpoint.clone()
    }

    /// Connect to `endpoint` and start receiving
    ///
    /// Tears down any existing session first. A failed initial connect is
    /// reported through an `Error` status and the returned error; it is not
    /// retried. Once connected, peer disconnects are recovered automatically.
    ///
    /// Returns `Cancelled` if a concurrent `start` or `stop` took over while
    /// the connect was in flight; the late transport is closed unused.
    pub async fn start(&self, endpoint: &str) -> Result<()> {
        let active = {
            let st = self.shared.state.lock().await;
            st.link.is_some() || st.session.is_some()
        };
        if active {
            self.stop().await;
        }

        let generation = {
            let mut st = self.shared.state.lock().await;
            let (generation, stale_link, stale_session) = self.shared.retire(&mut st);
            if let Some(session) = stale_session {
                session.abort();
            }
            drop(stale_link);
            st.endpoint = Some(endpoint.to_string());
            st.phase = ConnectionState::Connecting;
            generation
        };

        info!(
            client_id = %self.shared.client_id,
            endpoint = %endpoint,
            "Connecting"
        );

        let stream = match self.shared.open(endpoint).await {
            Ok(stream) => stream,
            Err(e) => {
                let mut st = self.shared.state.lock().await;
                if self.shared.is_current(generation) {
                    st.phase = ConnectionState::Disconnected;
                    self.shared.report(generation, &e);
                }
                return Err(e);
            }
        };

        let mut st = self.shared.state.lock().await;
        let Some(reader) = self.shared.install(&mut st, generation, stream) else {
            debug!(
                client_id = %self.shared.client_id,
                "Connect completed after a newer start/stop, discarding"
            );
            return Err(PipeError::Cancelled(endpoint.to_string()));
        };

        let shared = self.shared.clone();
        let owned_endpoint = endpoint.to_string();
        let session = tokio::spawn(async move {
            shared.run_session(owned_endpoint, generation, reader).await;
        });
        *self
            .shared
            .session_abort
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(session.abort_handle());
        st.session = Some(session);
        Ok(())
    }

    /// Release the transport and cancel the session
    ///
    /// Always emits `Disconnected`; safe to call repeatedly. An in-flight
    /// read or reconnect attempt is abandoned without further events.
    pub async fn stop(&self) {
        let (link, session) = {
            let mut st = self.shared.state.lock().await;
            let (_, link, session) = self.shared.retire(&mut st);
            st.phase = ConnectionState::Stopped;
            (link, session)
        };

        if let Some(session) = session {
            session.abort();
            if let Err(e) = session.await {
                if e.is_panic() {
                    error!(client_id = %self.shared.client_id, "Session task panicked: {}", e);
                }
            }
        }

        if let Some(link) = link {
            debug!(client_id = %self.shared.client_id, link = link.id, "Releasing transport");
        }

        info!(client_id = %self.shared.client_id, "Stopped");
        self.shared.handlers.status(PipeStatus::Disconnected, 0);
    }

    /// Send a message to the peer
    ///
    /// Without a transport this only logs and returns; no status is emitted.
    /// A write failure emits `Error` and leaves the read loop alone.
    pub async fn send_message(&self, text: &str) {
        match self.try_send_message(text).await {
            Ok(()) => {}
            Err(PipeError::NotConnected) => {
                debug!(client_id = %self.shared.client_id, "Pipe client is not connected, message dropped");
            }
            Err(_) => {}
        }
    }

    /// Send a message, returning `NotConnected` or `WriteFailed` explicitly
    ///
    /// Status side effects are the same as `send_message`.
    pub async fn try_send_message(&self, text: &str) -> Result<()> {
        let link = {
            let st = self.shared.state.lock().await;
            st.link.clone()
        };
        let link = link.ok_or(PipeError::NotConnected)?;

        let bytes = self.shared.codec.encode(text);
        let mut writer = link.writer.lock().await;
        let written = match writer.write_all(bytes).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            let err = PipeError::WriteFailed(e);
            warn!(
                client_id = %self.shared.client_id,
                link = link.id,
                code = err.error_code(),
                "Failed to send message: {}",
                err
            );
            self.shared.handlers.status(PipeStatus::Error, 0);
            return Err(err);
        }

        debug!(
            client_id = %self.shared.client_id,
            link = link.id,
            bytes = bytes.len(),
            "Message sent"
        );
        Ok(())
    }
}

impl<C: Connector> Drop for PipeClient<C> {
    fn drop(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);

        let abort = self
            .shared
            .session_abort
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(abort) = abort {
            abort.abort();
        }

        // If the state is locked elsewhere, the link goes away with the last
        // reference to the shared state once the aborted session unwinds
        if let Ok(mut st) = self.shared.state.try_lock() {
            st.session = None;
            st.link = None;
        }
    }
}

impl<C: Connector> Shared<C> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Start a new generation, handing back whatever the old one owned
    fn retire(
        &self,
        st: &mut ClientState<C::Stream>,
    ) -> (u64, Option<Link<C::Stream>>, Option<JoinHandle<()>>) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        (generation, st.link.take(), st.session.take())
    }

    /// Open a transport, applying the configured connect timeout
    async fn open(&self, endpoint: &str) -> Result<C::Stream> {
        let attempt = self.connector.connect(endpoint);
        let result = match self.config.connect_timeout() {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(PipeError::ConnectTimeout {
                        endpoint: endpoint.to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
            None => attempt.await,
        };

        result.map_err(|source| {
            if source.kind() == std::io::ErrorKind::InvalidInput {
                PipeError::InvalidEndpoint(endpoint.to_string())
            } else {
                PipeError::ConnectFailed {
                    endpoint: endpoint.to_string(),
                    source,
                }
            }
        })
    }

    /// Make `stream` the current transport and emit `Connected`
    ///
    /// Returns the read half, or None if `generation` has been superseded (the
    /// stream is dropped).
    fn install(
        &self,
        st: &mut ClientState<C::Stream>,
        generation: u64,
        stream: C::Stream,
    ) -> Option<ReadHalf<C::Stream>> {
        if !self.is_current(generation) {
            return None;
        }

        let (reader, writer) = tokio::io::split(stream);
        st.next_link_id += 1;
        st.link = Some(Link {
            id: st.next_link_id,
            writer: Arc::new(Mutex::new(writer)),
        });
        st.phase = ConnectionState::Connected;

        info!(
            client_id = %self.client_id,
            link = st.next_link_id,
            endpoint = st.endpoint.as_deref().unwrap_or_default(),
            "Connected"
        );
        self.handlers.status(PipeStatus::Connected, 0);
        Some(reader)
    }

    /// Log a failure and emit `Error` unless the generation is stale
    fn report(&self, generation: u64, err: &PipeError) {
        if !self.is_current(generation) {
            return;
        }
        warn!(
            client_id = %self.client_id,
            code = err.error_code(),
            "{}",
            err
        );
        self.handlers.status(PipeStatus::Error, 0);
    }

    async fn run_session(
        self: Arc<Self>,
        endpoint: String,
        generation: u64,
        reader: ReadHalf<C::Stream>,
    ) {
        let mut reader = reader;
        loop {
            match self.read_loop(&mut reader, generation).await {
                ReadOutcome::PeerClosed => {}
                ReadOutcome::ExitRequested | ReadOutcome::Failed | ReadOutcome::Superseded => {
                    return
                }
            }

            drop(reader);
            if !self.release_after_disconnect(generation).await {
                return;
            }

            reader = match self.reconnect(&endpoint, generation).await {
                Some(next) => next,
                None => return,
            };
        }
    }

    /// Receive until the peer closes, sends the sentinel, or a read fails
    async fn read_loop(&self, reader: &mut ReadHalf<C::Stream>, generation: u64) -> ReadOutcome {
        let mut buf = vec![0u8; self.config.buffer_size];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => return ReadOutcome::PeerClosed,
                Ok(n) => n,
                // Windows reports a closed pipe as a broken pipe rather than EOF
                Err(e) if is_peer_gone(&e) => {
                    debug!(client_id = %self.client_id, "Read ended with {}", e);
                    return ReadOutcome::PeerClosed;
                }
                Err(e) => {
                    self.report(generation, &PipeError::ReadFailed(e));
                    return ReadOutcome::Failed;
                }
            };

            let text = match self.codec.decode(&buf[..n]) {
                Ok(text) => text,
                Err(e) => {
                    self.report(generation, &e);
                    return ReadOutcome::Failed;
                }
            };

            if !self.is_current(generation) {
                return ReadOutcome::Superseded;
            }

            if text == self.config.exit_sentinel {
                info!(client_id = %self.client_id, "Exit sentinel received");
                self.handlers.terminate();
                let count = self.received.fetch_add(1, Ordering::AcqRel) + 1;
                self.handlers.status(PipeStatus::MessageCount, count);
                return ReadOutcome::ExitRequested;
            }

            self.handlers.message(&text);
            let count = self.received.fetch_add(1, Ordering::AcqRel) + 1;
            debug!(client_id = %self.client_id, bytes = n, count, "Message received");
            self.handlers.status(PipeStatus::MessageCount, count);
        }
    }

    /// Drop the dead transport and emit `Disconnected`
    ///
    /// Returns false if a newer start/stop already owns the state.
    async fn release_after_disconnect(&self, generation: u64) -> bool {
        let mut st = self.state.lock().await;
        if !self.is_current(generation) {
            return false;
        }

        let link = st.link.take();
        st.phase = ConnectionState::Disconnected;
        drop(link);

        info!(
            client_id = %self.client_id,
            endpoint = st.endpoint.as_deref().unwrap_or_default(),
            "Peer disconnected"
        );
        self.handlers.status(PipeStatus::Disconnected, 0);
        true
    }

    /// Reconnect to the same endpoint, backing off between attempts
    async fn reconnect(&self, endpoint: &str, generation: u64) -> Option<ReadHalf<C::Stream>> {
        let policy = &self.config.reconnect;
        let mut failures = 0u32;

        while policy.allows(failures) {
            let delay = policy.delay_for(failures);
            debug!(
                client_id = %self.client_id,
                attempt = failures + 1,
                delay_ms = delay.as_millis() as u64,
                "Waiting before reconnect"
            );
            tokio::time::sleep(delay).await;

            {
                let mut st = self.state.lock().await;
                if !self.is_current(generation) {
                    return None;
                }
                st.phase = ConnectionState::Connecting;
            }

            match self.open(endpoint).await {
                Ok(stream) => {
                    let mut st = self.state.lock().await;
                    return self.install(&mut st, generation, stream);
                }
                Err(e) => {
                    self.report(generation, &e);
                    failures += 1;
                    let mut st = self.state.lock().await;
                    if self.is_current(generation) {
                        st.phase = ConnectionState::Disconnected;
                    }
                }
            }
        }

        if self.is_current(generation) {
            warn!(
                client_id = %self.client_id,
                endpoint = %endpoint,
                attempts = failures,
                "Giving up on reconnect"
            );
        }
        None
    }
}

fn is_peer_gone(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::UnexpectedEof
    )
}
