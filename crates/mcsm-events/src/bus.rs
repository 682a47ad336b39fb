use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

/// Notifications raised to the hosting application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// The listener is bound and accepting.
    Listen { addr: SocketAddr },
    /// The listener has been shut down.
    Close,
    /// The listener itself failed (bind or accept).
    Error { error: String },
    /// A client attempted to log in and is being disconnected with the message.
    ClientConnected { peer: SocketAddr, username: String },
    /// A modern client requested the server status.
    ClientPing { peer: SocketAddr },
    /// Unknown packet id or malformed data; the connection is dropped.
    ClientError { peer: SocketAddr, error: String },
    /// Socket-level failure while talking to a client.
    TransportError { peer: SocketAddr, error: String },
}

/// Discriminant of [`ServerEvent`], used to subscribe to one kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Listen,
    Close,
    Error,
    ClientConnected,
    ClientPing,
    ClientError,
    TransportError,
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Listen { .. } => EventKind::Listen,
            ServerEvent::Close => EventKind::Close,
            ServerEvent::Error { .. } => EventKind::Error,
            ServerEvent::ClientConnected { .. } => EventKind::ClientConnected,
            ServerEvent::ClientPing { .. } => EventKind::ClientPing,
            ServerEvent::ClientError { .. } => EventKind::ClientError,
            ServerEvent::TransportError { .. } => EventKind::TransportError,
        }
    }
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Listen => "listen",
            EventKind::Close => "close",
            EventKind::Error => "error",
            EventKind::ClientConnected => "client_connected",
            EventKind::ClientPing => "client_ping",
            EventKind::ClientError => "client_error",
            EventKind::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerEvent::Listen { addr } => write!(f, "listening on {}", addr),
            ServerEvent::Close => write!(f, "closed"),
            ServerEvent::Error { error } => write!(f, "server error: {}", error),
            ServerEvent::ClientConnected { peer, username } => {
                write!(f, "{} tried to log in as {}", peer, username)
            }
            ServerEvent::ClientPing { peer } => write!(f, "{} requested status", peer),
            ServerEvent::ClientError { peer, error } => {
                write!(f, "protocol error from {}: {}", peer, error)
            }
            ServerEvent::TransportError { peer, error } => {
                write!(f, "transport error with {}: {}", peer, error)
            }
        }
    }
}

/// Listener priority levels (executed in order: Lowest first, Monitor last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Lowest = 0,
    Low = 1,
    Normal = 2,
    High = 3,
    Highest = 4,
    Monitor = 5,
}

/// Result of handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    /// Skip the remaining listeners, except `Monitor` ones, which always run.
    Cancel,
}

pub type Callback = Arc<dyn Fn(&ServerEvent) -> EventResult + Send + Sync>;

#[derive(Clone)]
struct ListenerEntry {
    listener_id: u64,
    /// `None` listens to every kind.
    kind: Option<EventKind>,
    priority: Priority,
    callback: Callback,
}

struct Listeners {
    entries: Vec<ListenerEntry>,
    next_listener_id: u64,
}

/// The event bus: listeners sorted by priority, shared between the accept loop
/// and every connection task.
pub struct EventBus {
    inner: RwLock<Listeners>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Listeners {
                entries: Vec::new(),
                next_listener_id: 1,
            }),
        }
    }

    /// Register a listener for one kind of event. Returns the listener_id.
    pub fn on<F>(&self, kind: EventKind, priority: Priority, callback: F) -> u64
    where
        F: Fn(&ServerEvent) -> EventResult + Send + Sync + 'static,
    {
        self.register(Some(kind), priority, Arc::new(callback))
    }

    /// Register a listener for every event. Returns the listener_id.
    pub fn on_any<F>(&self, priority: Priority, callback: F) -> u64
    where
        F: Fn(&ServerEvent) -> EventResult + Send + Sync + 'static,
    {
        self.register(None, priority, Arc::new(callback))
    }

    fn register(&self, kind: Option<EventKind>, priority: Priority, callback: Callback) -> u64 {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let listener_id = inner.next_listener_id;
        inner.next_listener_id += 1;

        inner.entries.push(ListenerEntry {
            listener_id,
            kind,
            priority,
            callback,
        });
        // stable sort keeps registration order within a priority
        inner.entries.sort_by_key(|e| e.priority);

        listener_id
    }

    /// Remove a listener. Returns false if the id was not registered.
    pub fn unregister(&self, listener_id: u64) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.entries.len();
        inner.entries.retain(|e| e.listener_id != listener_id);
        inner.entries.len() != before
    }

    /// Deliver an event to its listeners in priority order.
    pub fn emit(&self, event: &ServerEvent) {
        let kind = event.kind();
        // Callbacks run without the lock held so they may (un)register listeners.
        let listeners: Vec<ListenerEntry> = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            inner
                .entries
                .iter()
                .filter(|e| e.kind.map_or(true, |k| k == kind))
                .cloned()
                .collect()
        };

        let mut cancelled = false;
        for listener in listeners {
            if cancelled && listener.priority != Priority::Monitor {
                continue;
            }
            if (listener.callback)(event) == EventResult::Cancel {
                tracing::trace!(
                    "Event '{}' cancelled by listener {}",
                    kind.name(),
                    listener.listener_id
                );
                cancelled = true;
            }
        }
    }

    /// Get total listener count across all events.
    pub fn listener_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}
