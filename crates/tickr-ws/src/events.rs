//! Session events and listener registry
//!
//! Events form a closed set ([`EventKind`]) with a typed payload each.
//! Listeners are kept per kind in registration order. Dispatch runs over a
//! snapshot of the listener list, so a listener may register or remove
//! listeners while being called. A listener that panics is logged and skipped;
//! later listeners still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tickr_types::{ErrorCode, SdkError, TickerUpdate};
use tokio::sync::mpsc;
use tracing::warn;

/// Server-provided handshake details
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// Plan tier of the credential
    pub tier: String,
    /// Maximum concurrent channel subscriptions, if announced
    pub max_subscriptions: Option<u32>,
}

/// Errors surfaced through [`SessionEvent::Error`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Application-level error sent by the server; the session stays open
    #[error("server error {code}: {message}")]
    Server { code: String, message: String },

    /// The transport reported a failure; a close event follows if the link is gone
    #[error("transport error: {0}")]
    Transport(String),

    /// Reconnection gave up
    #[error("maximum reconnect attempts exceeded ({attempts})")]
    MaxReconnectAttemptsExceeded { attempts: u32 },
}

impl From<SessionError> for SdkError {
    fn from(err: SessionError) -> Self {
        let code = match &err {
            SessionError::Server { code, .. } => code.parse().unwrap_or(ErrorCode::Unknown),
            SessionError::Transport(_) | SessionError::MaxReconnectAttemptsExceeded { .. } => {
                ErrorCode::Network
            }
        };
        SdkError::new(err.to_string()).with_code(code).with_cause(err)
    }
}

/// Discriminant of [`SessionEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Reconnecting,
    Subscribed,
    Unsubscribed,
    Ticker,
    Error,
}

/// Event emitted by a streaming session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Handshake completed
    Connected(ServerInfo),
    /// Connection closed
    Disconnected { code: u16, reason: String },
    /// A reconnect attempt is scheduled after `delay`
    Reconnecting { attempt: u32, delay: Duration },
    /// Server confirmed a channel
    Subscribed(String),
    /// Server confirmed removal of a channel
    Unsubscribed(String),
    /// Live ticker update, verbatim from the server
    Ticker(TickerUpdate),
    Error(SessionError),
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected(_) => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::Subscribed(_) => EventKind::Subscribed,
            Self::Unsubscribed(_) => EventKind::Unsubscribed,
            Self::Ticker(_) => EventKind::Ticker,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// Handle returned on registration, used to remove the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    any: Vec<(ListenerId, Listener)>,
    channels: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl RegistryState {
    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

/// Listener registry for one session
#[derive(Default)]
pub struct EventRegistry {
    state: Mutex<RegistryState>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one kind of event
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = state.next_id();
        state
            .by_kind
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Register a listener for every event
    pub fn on_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.any.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn off(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock();
        let before = state.any.len() + state.by_kind.values().map(Vec::len).sum::<usize>();
        state.any.retain(|(lid, _)| *lid != id);
        for listeners in state.by_kind.values_mut() {
            listeners.retain(|(lid, _)| *lid != id);
        }
        let after = state.any.len() + state.by_kind.values().map(Vec::len).sum::<usize>();
        after < before
    }

    /// Receive every event on a channel
    ///
    /// Dropping the receiver unregisters it on the next emission.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().channels.push(tx);
        rx
    }

    /// Number of callbacks that would see an event of `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        let state = self.state.lock();
        state.any.len() + state.by_kind.get(&kind).map_or(0, Vec::len)
    }

    /// Remove every listener and channel
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.by_kind.clear();
        state.any.clear();
        state.channels.clear();
    }

    /// Deliver `event` to every matching listener
    pub fn emit(&self, event: &SessionEvent) {
        let snapshot: Vec<Listener> = {
            let mut state = self.state.lock();
            state.channels.retain(|tx| tx.send(event.clone()).is_ok());
            state
                .by_kind
                .get(&event.kind())
                .into_iter()
                .flatten()
                .chain(state.any.iter())
                .map(|(_, listener)| listener.clone())
                .collect()
        };

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(kind = ?event.kind(), "Event listener panicked");
            }
        }
    }

    // ========================================================================
    // Typed registration helpers
    // ========================================================================

    pub fn on_connected<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&ServerInfo) + Send + Sync + 'static,
    {
        self.on(EventKind::Connected, move |event| {
            if let SessionEvent::Connected(info) = event {
                f(info);
            }
        })
    }

    pub fn on_disconnected<F>(&self, f: F) -> ListenerId
    where
        F: Fn(u16, &str) + Send + Sync + 'static,
    {
        self.on(EventKind::Disconnected, move |event| {
            if let SessionEvent::Disconnected { code, reason } = event {
                f(*code, reason);
            }
        })
    }

    pub fn on_reconnecting<F>(&self, f: F) -> ListenerId
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.on(EventKind::Reconnecting, move |event| {
            if let SessionEvent::Reconnecting { attempt, delay } = event {
                f(*attempt, *delay);
            }
        })
    }

    pub fn on_subscribed<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::Subscribed, move |event| {
            if let SessionEvent::Subscribed(channel) = event {
                f(channel);
            }
        })
    }

    pub fn on_unsubscribed<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::Unsubscribed, move |event| {
            if let SessionEvent::Unsubscribed(channel) = event {
                f(channel);
            }
        })
    }

    pub fn on_ticker<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&TickerUpdate) + Send + Sync + 'static,
    {
        self.on(EventKind::Ticker, move |event| {
            if let SessionEvent::Ticker(update) = event {
                f(update);
            }
        })
    }

    pub fn on_error<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&SessionError) + Send + Sync + 'static,
    {
        self.on(EventKind::Error, move |event| {
            if let SessionEvent::Error(err) = event {
                f(err);
            }
        })
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventRegistry")
            .field("kinds", &state.by_kind.len())
            .field("catch_all", &state.any.len())
            .field("channels", &state.channels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (c.clone(), c)
    }

    #[test]
    fn test_dispatch_by_kind() {
        let registry = EventRegistry::new();
        let (subs, subs_in) = counter();
        let (all, all_in) = counter();

        registry.on_subscribed(move |channel| {
            assert_eq!(channel, "ticker:kraken");
            subs_in.fetch_add(1, Ordering::SeqCst);
        });
        registry.on_any(move |_| {
            all_in.fetch_add(1, Ordering::SeqCst);
        });

        registry.emit(&SessionEvent::Subscribed("ticker:kraken".into()));
        registry.emit(&SessionEvent::Unsubscribed("ticker:kraken".into()));

        assert_eq!(subs.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let registry = EventRegistry::new();
        let (hits, hits_in) = counter();

        registry.on(EventKind::Error, |_| panic!("listener bug"));
        registry.on_error(move |_| {
            hits_in.fetch_add(1, Ordering::SeqCst);
        });

        registry.emit(&SessionEvent::Error(SessionError::Transport("reset".into())));
        registry.emit(&SessionEvent::Error(SessionError::Transport("reset".into())));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_off_removes_listener() {
        let registry = EventRegistry::new();
        let (hits, hits_in) = counter();
        let id = registry.on_any(move |_| {
            hits_in.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.listener_count(EventKind::Ticker), 1);
        assert!(registry.off(id));
        assert!(!registry.off(id));
        registry.emit(&SessionEvent::Subscribed("x".into()));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_can_mutate_registry_during_dispatch() {
        let registry = Arc::new(EventRegistry::new());
        let inner = registry.clone();
        registry.on(EventKind::Connected, move |_| {
            inner.on(EventKind::Connected, |_| {});
        });

        registry.emit(&SessionEvent::Connected(ServerInfo::default()));
        assert_eq!(registry.listener_count(EventKind::Connected), 2);
    }

    #[tokio::test]
    async fn test_channel_receives_events() {
        let registry = EventRegistry::new();
        let mut rx = registry.subscribe_channel();
        registry.emit(&SessionEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_secs(2),
        });
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(2)
            })
        );

        drop(rx);
        registry.emit(&SessionEvent::Subscribed("x".into()));
        assert!(format!("{:?}", registry).contains("channels: 0"));
    }

    #[test]
    fn test_session_error_into_sdk_error() {
        let err: SdkError = SessionError::Server {
            code: "rate_limit".into(),
            message: "too many subscriptions".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::RateLimit);

        let err: SdkError = SessionError::MaxReconnectAttemptsExceeded { attempts: 10 }.into();
        assert_eq!(err.code(), ErrorCode::Network);
        assert!(SdkError::find_in_chain(&err).is_some());
    }
}
