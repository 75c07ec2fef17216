//! Single-connection WebSocket client.
//!
//! At most one connection exists per client; connect/disconnect are
//! serialized by a single-flight guard so concurrent calls cannot leak a
//! socket. The handler registry lives outside the connection task and
//! survives reconnect cycles. The socket is receive-only apart from pong
//! replies and the closing frame; sending chat messages stays on REST.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use nestmate_core::retry::backoff_with_jitter;
use nestmate_core::TokenStore;

use crate::error::{RealtimeError, Result};
use crate::events::parse_frame;
use crate::registry::{HandlerGuard, HandlerRegistry};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Reconnection and channel behavior.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Reconnect attempts before giving up after a dropped connection.
    pub reconnect_attempts: u32,
    /// Base delay for exponential backoff (ms).
    pub base_delay_ms: u64,
    /// Maximum backoff delay (ms).
    pub max_delay_ms: u64,
    /// Whether to reconnect automatically when the connection drops.
    pub auto_reconnect: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            auto_reconnect: true,
        }
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Build the connection URL from the REST base address.
fn build_ws_url(base_url: &str, user_id: i64, token: &str) -> String {
    let base = base_url.trim_end_matches('/').replacen("http", "ws", 1);
    format!("{}/ws/user/{}/?token={}", base, user_id, urlencoding::encode(token))
}

struct ConnectionSlot {
    task: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

/// Realtime messaging client for the Nestmate backend.
pub struct RealtimeClient {
    base_url: String,
    config: RealtimeConfig,
    tokens: TokenStore,
    registry: Arc<HandlerRegistry>,
    slot: Mutex<ConnectionSlot>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl RealtimeClient {
    pub fn new(base_url: &str, tokens: TokenStore) -> Self {
        Self::with_config(base_url, tokens, RealtimeConfig::default())
    }

    pub fn with_config(base_url: &str, tokens: TokenStore, config: RealtimeConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
            tokens,
            registry: Arc::new(HandlerRegistry::new()),
            slot: Mutex::new(ConnectionSlot {
                task: None,
                shutdown: None,
            }),
            state_tx,
            state_rx,
        }
    }

    /// Register a handler for an inbound event kind. Registrations are
    /// independent of the connection and survive reconnects; see
    /// [`HandlerRegistry::register`].
    #[must_use = "dropping the guard unregisters the handler"]
    pub fn register_handler<F>(&self, kind: &str, handler: F) -> HandlerGuard
    where
        F: Fn(&crate::events::InboundEvent) + Send + Sync + 'static,
    {
        self.registry.register(kind, handler)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Observable connection state for UI layers.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// True iff the connection is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the connection for a user.
    ///
    /// Preconditions are typed errors and no dial is attempted for them: an
    /// access token must be retrievable and no other connection may be
    /// open. The guard also excludes a concurrent `disconnect`.
    pub async fn connect(&self, user_id: i64) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if let Some(task) = &slot.task {
            if !task.is_finished() {
                return Err(RealtimeError::AlreadyConnected);
            }
            slot.task = None;
            slot.shutdown = None;
        }

        let token = self
            .tokens
            .access_token()?
            .ok_or_else(|| RealtimeError::precondition("no access token available"))?;

        self.set_state(ConnectionState::Connecting);
        let url = build_ws_url(&self.base_url, user_id, &token);
        debug!("Opening realtime connection for user {}", user_id);

        let (stream, _) = match connect_async(&url).await {
            Ok(value) => value,
            Err(err) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(RealtimeError::Handshake(err));
            }
        };

        self.set_state(ConnectionState::Connected);
        info!("Realtime connection established for user {}", user_id);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_connection(
            stream,
            user_id,
            self.base_url.clone(),
            self.config.clone(),
            self.tokens.clone(),
            Arc::clone(&self.registry),
            self.state_tx.clone(),
            shutdown_rx,
        ));

        slot.task = Some(task);
        slot.shutdown = Some(shutdown_tx);
        Ok(())
    }

    /// Close the connection with a normal-closure frame. Idempotent; a
    /// no-op when already disconnected.
    pub async fn disconnect(&self) {
        let mut slot = self.slot.lock().await;
        let Some(task) = slot.task.take() else {
            return;
        };
        if let Some(shutdown) = slot.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Err(err) = task.await {
            warn!("Realtime connection task ended abnormally: {}", err);
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }
}

#[async_trait::async_trait]
impl nestmate_core::RealtimeHandle for RealtimeClient {
    async fn connect(&self, user_id: i64) -> std::result::Result<(), String> {
        RealtimeClient::connect(self, user_id)
            .await
            .map_err(|err| err.to_string())
    }

    async fn disconnect(&self) {
        RealtimeClient::disconnect(self).await;
    }
}

fn dispatch_text(registry: &HandlerRegistry, text: &str) {
    match parse_frame(text) {
        Ok(event) => registry.dispatch(&event),
        Err(err) => warn!("Dropping malformed realtime frame: {}", err),
    }
}

/// Connection task: read frames in FIFO order, dispatch them, and on a
/// dropped connection run the backoff reconnect loop. The access token is
/// re-read from the store on every reconnect attempt.
#[allow(clippy::too_many_arguments)]
async fn run_connection(
    mut stream: WsStream,
    user_id: i64,
    base_url: String,
    config: RealtimeConfig,
    tokens: TokenStore,
    registry: Arc<HandlerRegistry>,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    'connection: loop {
        let (mut sink, mut source) = stream.split();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = state_tx.send(ConnectionState::Disconnected);
                    return;
                }
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => dispatch_text(&registry, &text),
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(reason))) => {
                        debug!("Realtime connection closed by server: {:?}", reason);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("Realtime read error: {}", err);
                        break;
                    }
                    None => break,
                },
            }
        }

        if !config.auto_reconnect {
            break;
        }

        let _ = state_tx.send(ConnectionState::Reconnecting);
        let mut attempt = 0_u32;
        let reconnected = loop {
            attempt += 1;
            if attempt > config.reconnect_attempts {
                warn!(
                    "Realtime reconnect gave up after {} attempts",
                    config.reconnect_attempts
                );
                break None;
            }

            let delay = backoff_with_jitter(attempt, config.base_delay_ms, config.max_delay_ms);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.changed() => {
                    let _ = state_tx.send(ConnectionState::Disconnected);
                    return;
                }
            }

            let token = match tokens.access_token() {
                Ok(Some(token)) => token,
                Ok(None) => {
                    warn!("Realtime reconnect aborted: access token is gone");
                    break None;
                }
                Err(err) => {
                    warn!("Realtime reconnect aborted: token read failed: {}", err);
                    break None;
                }
            };

            let url = build_ws_url(&base_url, user_id, &token);
            // the dial itself can stall on an unreachable host, so a
            // deliberate disconnect must be able to interrupt it too
            let dialed = tokio::select! {
                result = connect_async(&url) => result,
                _ = shutdown_rx.changed() => {
                    let _ = state_tx.send(ConnectionState::Disconnected);
                    return;
                }
            };
            match dialed {
                Ok((next_stream, _)) => {
                    info!("Realtime reconnected on attempt {}", attempt);
                    break Some(next_stream);
                }
                Err(err) => {
                    debug!("Realtime reconnect attempt {} failed: {}", attempt, err);
                }
            }
        };

        match reconnected {
            Some(next_stream) => {
                let _ = state_tx.send(ConnectionState::Connected);
                stream = next_stream;
                continue 'connection;
            }
            None => break,
        }
    }

    let _ = state_tx.send(ConnectionState::Disconnected);
}
