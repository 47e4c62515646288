//! Reconnecting streaming session
//!
//! # State machine
//!
//! ```text
//! Disconnected --connect()--> Connecting --handshake--> Connected
//!      ^                          |                         |
//!      |                        close                     close
//!      |                          v                         v
//!      +------ budget spent --- Disconnected <--------- Disconnected
//!                                 |  (had handshaken, reconnect enabled)
//!                                 v
//!                            Reconnecting --timer--> Connecting
//! ```
//!
//! The session only counts as connected once the server sends its `connected`
//! handshake; a raw transport open is not enough.
//!
//! Each connection attempt gets a fresh epoch number. Every callback from a
//! transport or timer carries the epoch it was created under and is ignored if
//! the session has moved on, so a stale link can never emit events.
//!
//! Locking: the shared state is only touched under a short `parking_lot` lock
//! that is never held across an `.await` or while listeners run.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tickr_types::{ApiKey, ClientMessage, SdkError, SdkResult, ServerMessage, TickerUpdate};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, trace, warn};

use crate::events::{
    EventKind, EventRegistry, ListenerId, ServerInfo, SessionError, SessionEvent,
};
use crate::reconnect::ReconnectConfig;
use crate::subscription::SubscriptionTracker;
use crate::transport::{
    Connector, TransportEvent, TransportHandle, TungsteniteConnector, CLOSE_ABNORMAL,
    CLOSE_NORMAL,
};

/// Production streaming endpoint
pub const DEFAULT_STREAM_URL: &str = "wss://stream.tickr.io/v1";

/// Environment variable overriding the streaming URL
pub const STREAM_URL_ENV: &str = "TICKR_WS_URL";

/// Reason sent with a caller-initiated close
pub const CLIENT_DISCONNECT_REASON: &str = "client disconnect";

/// Streaming session configuration
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Streaming endpoint
    pub url: String,
    /// Sent as `Authorization: Bearer <key>` on the upgrade request
    pub api_key: Option<ApiKey>,
    pub reconnect: ReconnectConfig,
    /// Ping period while connected (zero disables the heartbeat)
    pub heartbeat_interval: Duration,
    /// Deadline for opening the transport
    pub connect_timeout: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            api_key: None,
            reconnect: ReconnectConfig::default(),
            heartbeat_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl StreamingConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key: Some(api_key),
            ..Default::default()
        }
    }

    /// Build a config from `TICKR_API_KEY` and `TICKR_WS_URL`
    pub fn from_env() -> Self {
        let mut config = Self {
            api_key: ApiKey::from_env(),
            ..Default::default()
        };
        if let Ok(url) = std::env::var(STREAM_URL_ENV) {
            if !url.trim().is_empty() {
                config.url = url;
            }
        }
        config
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: ApiKey) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn upgrade_headers(&self) -> Vec<(String, String)> {
        self.api_key
            .as_ref()
            .map(|key| vec![("Authorization".to_string(), key.bearer())])
            .unwrap_or_default()
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    /// Transport opening or awaiting the handshake
    Connecting,
    Connected,
    /// Waiting for the reconnect timer
    Reconnecting,
}

enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

struct Shared {
    state: SessionState,
    epoch: u64,
    subscriptions: SubscriptionTracker,
    reconnect_attempts: u32,
    /// Set by `disconnect()`; auto-reconnect stays off for this session
    closed_by_user: bool,
    /// A handshake has completed and the link should be kept alive
    maintain: bool,
    server_info: Option<ServerInfo>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    driver: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            epoch: 0,
            subscriptions: SubscriptionTracker::new(),
            reconnect_attempts: 0,
            closed_by_user: false,
            maintain: false,
            server_info: None,
            outbound: None,
            driver: None,
            reconnect_timer: None,
            heartbeat: None,
        }
    }

    fn send(&self, message: &ClientMessage) {
        let Some(tx) = &self.outbound else {
            return;
        };
        match message.to_json() {
            Ok(text) => {
                let _ = tx.send(Outbound::Text(text));
            }
            Err(e) => warn!(error = %e, "Failed to encode client message"),
        }
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }
}

struct SessionInner {
    config: StreamingConfig,
    connector: Arc<dyn Connector>,
    shared: Mutex<Shared>,
    events: EventRegistry,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let shared = self.shared.get_mut();
        if let Some(timer) = shared.reconnect_timer.take() {
            timer.abort();
        }
        shared.stop_heartbeat();
        // Dropping the outbound sender makes the driver close the link
        shared.outbound = None;
    }
}

/// Streaming session for live ticker channels
///
/// Cloning yields another handle to the same session. Dropping the last
/// handle closes the link.
///
/// # Example
///
/// ```no_run
/// use tickr_types::{ticker_channel, ApiKey};
/// use tickr_ws::{StreamingConfig, StreamingSession};
///
/// #[tokio::main]
/// async fn main() -> Result<(), tickr_types::SdkError> {
///     let session = StreamingSession::new(StreamingConfig::new(ApiKey::new("sk_live_...")));
///     session.on_ticker(|t| println!("{} {} last={:?}", t.exchange, t.symbol, t.data.last));
///     session.subscribe([ticker_channel("binance", "BTC/USDT")]);
///     session.connect()?;
///
///     tokio::signal::ctrl_c().await.ok();
///     session.disconnect();
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct StreamingSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for StreamingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("StreamingSession")
            .field("url", &self.inner.config.url)
            .field("state", &shared.state)
            .field("pending", &shared.subscriptions.pending())
            .field("active", &shared.subscriptions.active())
            .field("reconnect_attempts", &shared.reconnect_attempts)
            .finish()
    }
}

impl StreamingSession {
    /// Create a session backed by `tokio-tungstenite`
    pub fn new(config: StreamingConfig) -> Self {
        Self::with_connector(config, Arc::new(TungsteniteConnector::new()))
    }

    /// Create a session over a caller-supplied connector
    pub fn with_connector(config: StreamingConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                connector,
                shared: Mutex::new(Shared::new()),
                events: EventRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.inner.config
    }

    /// Open the link
    ///
    /// No-op while connecting or connected. From `Reconnecting`, the pending
    /// timer is cancelled and the attempt starts immediately. Must be called
    /// from within a Tokio runtime.
    pub fn connect(&self) -> SdkResult<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SdkError::new(
                "StreamingSession::connect must be called from within a Tokio runtime",
            ));
        }
        self.inner.start_connection(None);
        Ok(())
    }

    /// Close the link and stop for good
    ///
    /// Cancels the reconnect and heartbeat timers, closes any live transport,
    /// clears all subscriptions and disables automatic reconnection for this
    /// session. Emits one `Disconnected` event unless already disconnected.
    /// Safe to call repeatedly.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Request channels
    ///
    /// Channels are tracked as pending until the server confirms them. When
    /// connected, a subscribe request for exactly these channels is sent now;
    /// otherwise they go out with the next handshake.
    pub fn subscribe<I, S>(&self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels: Vec<String> = channels.into_iter().map(Into::into).collect();
        if channels.is_empty() {
            return;
        }
        let mut shared = self.inner.shared.lock();
        shared.subscriptions.request(channels.iter().cloned());
        if shared.state == SessionState::Connected {
            debug!(?channels, "Subscribing");
            shared.send(&ClientMessage::Subscribe { channels });
        }
    }

    /// Drop channels
    ///
    /// Removed from the pending and active sets immediately. When connected,
    /// an unsubscribe request is sent.
    pub fn unsubscribe<I, S>(&self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels: Vec<String> = channels.into_iter().map(Into::into).collect();
        if channels.is_empty() {
            return;
        }
        let mut shared = self.inner.shared.lock();
        shared
            .subscriptions
            .remove(channels.iter().map(String::as_str));
        if shared.state == SessionState::Connected {
            debug!(?channels, "Unsubscribing");
            shared.send(&ClientMessage::Unsubscribe { channels });
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Channels requested but not yet confirmed
    pub fn pending_channels(&self) -> Vec<String> {
        self.inner.shared.lock().subscriptions.pending()
    }

    /// Channels confirmed by the server
    pub fn active_channels(&self) -> Vec<String> {
        self.inner.shared.lock().subscriptions.active()
    }

    /// Consecutive reconnect attempts since the last handshake
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.lock().reconnect_attempts
    }

    /// Handshake details of the current connection
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.inner.shared.lock().server_info.clone()
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Register a listener for one kind of event
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener)
    }

    /// Register a listener for every event
    pub fn on_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.on_any(listener)
    }

    /// Remove a listener
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    /// Receive every event on a channel
    pub fn events(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.inner.events.subscribe_channel()
    }

    pub fn on_connected<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&ServerInfo) + Send + Sync + 'static,
    {
        self.inner.events.on_connected(f)
    }

    pub fn on_disconnected<F>(&self, f: F) -> ListenerId
    where
        F: Fn(u16, &str) + Send + Sync + 'static,
    {
        self.inner.events.on_disconnected(f)
    }

    pub fn on_reconnecting<F>(&self, f: F) -> ListenerId
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.inner.events.on_reconnecting(f)
    }

    pub fn on_subscribed<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.events.on_subscribed(f)
    }

    pub fn on_unsubscribed<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.events.on_unsubscribed(f)
    }

    pub fn on_ticker<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&TickerUpdate) + Send + Sync + 'static,
    {
        self.inner.events.on_ticker(f)
    }

    pub fn on_error<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&SessionError) + Send + Sync + 'static,
    {
        self.inner.events.on_error(f)
    }
}

impl SessionInner {
    fn emit(&self, event: SessionEvent) {
        self.events.emit(&event);
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.shared.lock().epoch == epoch
    }

    /// Begin a connection attempt
    ///
    /// `from_timer` carries the epoch a reconnect timer was scheduled under.
    fn start_connection(self: &Arc<Self>, from_timer: Option<u64>) {
        let mut shared = self.shared.lock();

        if let Some(epoch) = from_timer {
            if shared.epoch != epoch || shared.state != SessionState::Reconnecting {
                return;
            }
            // The timer task is the caller; just forget its handle
            shared.reconnect_timer = None;
        }

        match shared.state {
            SessionState::Connecting | SessionState::Connected => return,
            SessionState::Reconnecting => {
                if let Some(timer) = shared.reconnect_timer.take() {
                    timer.abort();
                }
            }
            SessionState::Disconnected => {}
        }

        shared.epoch += 1;
        let epoch = shared.epoch;
        shared.state = SessionState::Connecting;

        let (tx, rx) = mpsc::unbounded_channel();
        shared.outbound = Some(tx);

        info!(url = %self.config.url, epoch, "Connecting to streaming endpoint");
        shared.driver = Some(tokio::spawn(drive_connection(
            Arc::downgrade(self),
            self.connector.clone(),
            self.config.url.clone(),
            self.config.upgrade_headers(),
            self.config.connect_timeout,
            epoch,
            rx,
        )));
    }

    fn disconnect(&self) {
        let was_live = {
            let mut shared = self.shared.lock();
            shared.epoch += 1;
            shared.closed_by_user = true;
            shared.maintain = false;

            if let Some(timer) = shared.reconnect_timer.take() {
                timer.abort();
            }
            shared.stop_heartbeat();

            if let Some(tx) = shared.outbound.take() {
                let _ = tx.send(Outbound::Close {
                    code: CLOSE_NORMAL,
                    reason: CLIENT_DISCONNECT_REASON.to_string(),
                });
            }
            // The driver exits on the close request or on its epoch check
            shared.driver = None;

            shared.subscriptions.clear();
            shared.reconnect_attempts = 0;
            shared.server_info = None;

            let was_live = shared.state != SessionState::Disconnected;
            shared.state = SessionState::Disconnected;
            was_live
        };

        if was_live {
            info!("Streaming session disconnected by client");
            self.emit(SessionEvent::Disconnected {
                code: CLOSE_NORMAL,
                reason: CLIENT_DISCONNECT_REASON.to_string(),
            });
        }
    }

    fn handle_message(self: &Arc<Self>, epoch: u64, text: &str) {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Dropping malformed frame");
                return;
            }
        };

        match message {
            ServerMessage::Connected { tier, limits } => self.handle_handshake(
                epoch,
                ServerInfo {
                    tier,
                    max_subscriptions: limits.max_subscriptions,
                },
            ),
            ServerMessage::Subscribed { channel } => {
                let confirmed = {
                    let mut shared = self.shared.lock();
                    if shared.epoch != epoch || shared.state != SessionState::Connected {
                        return;
                    }
                    shared.subscriptions.confirm(&channel)
                };
                if confirmed {
                    debug!(%channel, "Subscription confirmed");
                    self.emit(SessionEvent::Subscribed(channel));
                } else {
                    warn!(%channel, "Ignoring confirmation for a channel that was not requested");
                }
            }
            ServerMessage::Unsubscribed { channel } => {
                {
                    let mut shared = self.shared.lock();
                    if shared.epoch != epoch || shared.state != SessionState::Connected {
                        return;
                    }
                    shared.subscriptions.remove([channel.as_str()]);
                }
                self.emit(SessionEvent::Unsubscribed(channel));
            }
            ServerMessage::Ticker(update) => {
                {
                    let shared = self.shared.lock();
                    if shared.epoch != epoch || shared.state != SessionState::Connected {
                        return;
                    }
                }
                self.emit(SessionEvent::Ticker(update));
            }
            ServerMessage::Error { code, message } => {
                if !self.is_current(epoch) {
                    return;
                }
                warn!(%code, %message, "Server error");
                self.emit(SessionEvent::Error(SessionError::Server { code, message }));
            }
            ServerMessage::Pong { .. } => trace!("Pong"),
        }
    }

    fn handle_handshake(self: &Arc<Self>, epoch: u64, info: ServerInfo) {
        {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch || shared.state != SessionState::Connecting {
                return;
            }
            shared.state = SessionState::Connected;
            shared.reconnect_attempts = 0;
            shared.maintain = true;
            shared.server_info = Some(info.clone());

            let period = self.config.heartbeat_interval;
            if !period.is_zero() {
                if let Some(tx) = shared.outbound.clone() {
                    shared.heartbeat = Some(tokio::spawn(heartbeat(tx, period)));
                }
            }

            // Restored in one frame before listeners can add channels
            let pending = shared.subscriptions.pending();
            if !pending.is_empty() {
                debug!(count = pending.len(), "Sending subscriptions");
                shared.send(&ClientMessage::Subscribe { channels: pending });
            }
        }

        info!(tier = %info.tier, "Streaming session connected");
        self.emit(SessionEvent::Connected(info));
    }

    fn handle_transport_error(&self, epoch: u64, message: String) {
        if !self.is_current(epoch) {
            return;
        }
        warn!(error = %message, "Transport error");
        self.emit(SessionEvent::Error(SessionError::Transport(message)));
    }

    fn handle_close(self: &Arc<Self>, epoch: u64, code: u16, reason: String) {
        let reconnect = {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch {
                return;
            }
            shared.state = SessionState::Disconnected;
            shared.stop_heartbeat();
            shared.outbound = None;
            shared.driver = None;
            shared.server_info = None;
            shared.subscriptions.requeue_active();
            shared.maintain && self.config.reconnect.enabled && !shared.closed_by_user
        };

        info!(code, %reason, "Streaming connection closed");
        self.emit(SessionEvent::Disconnected { code, reason });

        if reconnect {
            self.schedule_reconnect(epoch);
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, epoch: u64) {
        let scheduled = {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch
                || shared.closed_by_user
                || shared.state != SessionState::Disconnected
            {
                return;
            }

            if !self.config.reconnect.should_reconnect(shared.reconnect_attempts) {
                shared.maintain = false;
                Err(shared.reconnect_attempts)
            } else {
                shared.reconnect_attempts += 1;
                let attempt = shared.reconnect_attempts;
                let delay = self.config.reconnect.delay_with_jitter(attempt);
                shared.state = SessionState::Reconnecting;

                let weak = Arc::downgrade(self);
                shared.reconnect_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.start_connection(Some(epoch));
                    }
                }));
                Ok((attempt, delay))
            }
        };

        match scheduled {
            Ok((attempt, delay)) => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
                self.emit(SessionEvent::Reconnecting { attempt, delay });
            }
            Err(attempts) => {
                warn!(attempts, "Giving up on reconnection");
                self.emit(SessionEvent::Error(
                    SessionError::MaxReconnectAttemptsExceeded { attempts },
                ));
            }
        }
    }
}

/// Own one transport for its lifetime: open it, pump outbound frames and
/// feed inbound events back to the session under `epoch`
async fn drive_connection(
    session: Weak<SessionInner>,
    connector: Arc<dyn Connector>,
    url: String,
    headers: Vec<(String, String)>,
    connect_timeout: Duration,
    epoch: u64,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let opened = tokio::time::timeout(connect_timeout, connector.connect(&url, &headers)).await;
    let failure = match opened {
        Ok(Ok(handle)) => {
            run_link(&session, handle, epoch, &mut outbound).await;
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("connect timed out after {}ms", connect_timeout.as_millis()),
    };

    if let Some(inner) = session.upgrade() {
        if inner.is_current(epoch) {
            warn!(error = %failure, "Failed to open streaming connection");
            inner.handle_transport_error(epoch, failure.clone());
            inner.handle_close(epoch, CLOSE_ABNORMAL, failure);
        }
    }
}

async fn run_link(
    session: &Weak<SessionInner>,
    handle: TransportHandle,
    epoch: u64,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
) {
    let TransportHandle {
        mut sender,
        mut events,
    } = handle;

    // disconnect() may have run while the transport was opening
    let still_wanted = session
        .upgrade()
        .map_or(false, |inner| inner.is_current(epoch));
    if !still_wanted {
        let _ = sender
            .close(CLOSE_NORMAL, CLIENT_DISCONNECT_REASON.to_string())
            .await;
        return;
    }
    debug!(epoch, "Transport open, awaiting handshake");

    loop {
        tokio::select! {
            request = outbound.recv() => match request {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sender.send_text(text).await {
                        if let Some(inner) = session.upgrade() {
                            inner.handle_transport_error(epoch, e.to_string());
                        }
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    let _ = sender.close(code, reason).await;
                    return;
                }
                None => {
                    let _ = sender.close(CLOSE_NORMAL, "session dropped".to_string()).await;
                    return;
                }
            },
            event = events.next() => {
                let Some(inner) = session.upgrade() else {
                    return;
                };
                match event {
                    Some(TransportEvent::Message(text)) => inner.handle_message(epoch, &text),
                    Some(TransportEvent::Error(message)) => inner.handle_transport_error(epoch, message),
                    Some(TransportEvent::Close { code, reason }) => {
                        inner.handle_close(epoch, code, reason);
                        return;
                    }
                    None => {
                        inner.handle_close(epoch, CLOSE_ABNORMAL, "connection lost".to_string());
                        return;
                    }
                }
            }
        }
    }
}

async fn heartbeat(tx: mpsc::UnboundedSender<Outbound>, period: Duration) {
    let Ok(ping) = ClientMessage::Ping.to_json() else {
        return;
    };
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        if tx.send(Outbound::Text(ping.clone())).is_err() {
            return;
        }
        trace!("Ping");
    }
}
