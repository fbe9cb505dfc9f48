//! # Event Bus System
//!
//! Typed events published by the delivery engines, delivered two ways:
//!
//! - **Listeners** registered with [`EventBus::on`] run synchronously inside
//!   [`EventBus::emit`], in registration order. A listener registered before
//!   an event is emitted is guaranteed to see it before `emit` returns.
//! - **Subscribers** created with [`EventBus::subscribe`] receive a clone of
//!   every event through a `tokio::sync::broadcast` channel and can lag.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  emit   ┌───────────┐  sync, in order   ┌────────────┐
//! │ Cache Engine ├────────>│           ├──────────────────>│ Listeners  │
//! └──────────────┘         │           │                   └────────────┘
//! ┌──────────────┐  emit   │ EventBus  │
//! │ Strategist   ├────────>│           │  broadcast        ┌────────────┐
//! └──────────────┘         │           ├──────────────────>│ Subscriber │
//! ┌──────────────┐  emit   │           │                   └────────────┘
//! │ Recovery     ├────────>│           │
//! └──────────────┘         └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let bus = EventBus::new(100);
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! let id = bus.on(move |_event| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! bus.emit(CoreEvent::Cache(CacheEvent::Evicted {
//!     track_id: "track-1".to_string(),
//!     bytes: 1024,
//! }));
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! assert!(bus.off(id));
//! ```
//!
//! ## Error Handling
//!
//! Broadcast subscribers can observe two errors:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every bus handle was dropped.
//!
//! A panicking listener is not caught; listeners should be cheap and
//! infallible (record, forward, return).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::RecvError;
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the broadcast side of the bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Asset cache engine events
    Cache(CacheEvent),
    /// Buffer strategist events
    Buffer(BufferEvent),
    /// Error recovery engine events
    Recovery(RecoveryEvent),
    /// Playback driver events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Buffer(e) => e.description(),
            CoreEvent::Recovery(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Cache(CacheEvent::PreloadFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Recovery(RecoveryEvent::AttemptFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Recovery(RecoveryEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Buffer(BufferEvent::StrategyChanged { .. }) => EventSeverity::Info,
            CoreEvent::Recovery(RecoveryEvent::Succeeded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Track the event refers to, if any.
    pub fn track_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Cache(e) => Some(e.track_id()),
            CoreEvent::Buffer(BufferEvent::HealthUpdated { track_id, .. }) => Some(track_id),
            CoreEvent::Buffer(BufferEvent::StrategyChanged { .. })
            | CoreEvent::Buffer(BufferEvent::NetworkSampled { .. }) => None,
            CoreEvent::Recovery(e) => Some(e.track_id()),
            CoreEvent::Playback(e) => e.track_id(),
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events published by the asset cache engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A network fetch for the track started.
    PreloadStarted { track_id: String, url: String },
    /// Download progress changed (0-100).
    PreloadProgress { track_id: String, percent: u8 },
    /// The payload was downloaded and cached.
    Preloaded {
        track_id: String,
        bytes: u64,
        load_time_ms: u64,
    },
    /// The preload failed.
    PreloadFailed { track_id: String, message: String },
    /// A cached payload was evicted to respect the size ceiling.
    Evicted { track_id: String, bytes: u64 },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::PreloadStarted { .. } => "Preload started",
            CacheEvent::PreloadProgress { .. } => "Preload in progress",
            CacheEvent::Preloaded { .. } => "Track preloaded",
            CacheEvent::PreloadFailed { .. } => "Preload failed",
            CacheEvent::Evicted { .. } => "Cache entry evicted",
        }
    }

    fn track_id(&self) -> &str {
        match self {
            CacheEvent::PreloadStarted { track_id, .. }
            | CacheEvent::PreloadProgress { track_id, .. }
            | CacheEvent::Preloaded { track_id, .. }
            | CacheEvent::PreloadFailed { track_id, .. }
            | CacheEvent::Evicted { track_id, .. } => track_id,
        }
    }
}

// ============================================================================
// Buffer Events
// ============================================================================

/// Events published by the buffer strategist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum BufferEvent {
    /// The active strategy changed.
    StrategyChanged { from: String, to: String },
    /// A network sample was recorded, whether or not the strategy changed.
    NetworkSampled {
        network_type: Option<String>,
        effective_type: Option<String>,
    },
    /// Buffer health was recomputed for a track.
    HealthUpdated {
        track_id: String,
        /// Health percentage (0-100).
        health: u8,
        /// Buffered share of the total duration (0-100).
        buffered_percent: u8,
        starved: bool,
    },
}

impl BufferEvent {
    fn description(&self) -> &str {
        match self {
            BufferEvent::StrategyChanged { .. } => "Buffer strategy changed",
            BufferEvent::NetworkSampled { .. } => "Network sample recorded",
            BufferEvent::HealthUpdated { .. } => "Buffer health updated",
        }
    }
}

// ============================================================================
// Recovery Events
// ============================================================================

/// Events published by the error recovery engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RecoveryEvent {
    /// A playback failure was classified.
    ErrorClassified {
        track_id: String,
        kind: String,
        recoverable: bool,
        message: String,
    },
    /// A recovery attempt is about to run (after its backoff delay).
    AttemptStarted {
        track_id: String,
        attempt: u32,
        strategy: String,
        delay_ms: u64,
    },
    /// A recovery attempt failed.
    AttemptFailed {
        track_id: String,
        attempt: u32,
        strategy: String,
        message: String,
    },
    /// Playback was restored.
    Succeeded {
        track_id: String,
        attempts: u32,
        fallback_url: Option<String>,
    },
    /// Recovery gave up.
    Failed {
        track_id: String,
        attempts: u32,
        message: String,
    },
    /// Recovery stopped because the track was switched away from.
    Abandoned { track_id: String, attempts: u32 },
}

impl RecoveryEvent {
    fn description(&self) -> &str {
        match self {
            RecoveryEvent::ErrorClassified { .. } => "Playback error classified",
            RecoveryEvent::AttemptStarted { .. } => "Recovery attempt started",
            RecoveryEvent::AttemptFailed { .. } => "Recovery attempt failed",
            RecoveryEvent::Succeeded { .. } => "Playback recovered",
            RecoveryEvent::Failed { .. } => "Recovery failed",
            RecoveryEvent::Abandoned { .. } => "Recovery abandoned",
        }
    }

    fn track_id(&self) -> &str {
        match self {
            RecoveryEvent::ErrorClassified { track_id, .. }
            | RecoveryEvent::AttemptStarted { track_id, .. }
            | RecoveryEvent::AttemptFailed { track_id, .. }
            | RecoveryEvent::Succeeded { track_id, .. }
            | RecoveryEvent::Failed { track_id, .. }
            | RecoveryEvent::Abandoned { track_id, .. } => track_id,
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to the playback driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A track became the current track.
    TrackLoaded {
        track_id: String,
        title: String,
        from_cache: bool,
    },
    /// Playback started or resumed.
    Played { track_id: String, position_ms: u64 },
    /// Playback paused.
    Paused { track_id: String, position_ms: u64 },
    /// The user seeked.
    Seeked {
        track_id: String,
        from_ms: u64,
        to_ms: u64,
    },
    /// Volume changed (0-100).
    VolumeChanged { volume_percent: u8 },
    /// A terminal playback error surfaced to the UI.
    Error {
        track_id: Option<String>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackLoaded { .. } => "Track loaded",
            PlaybackEvent::Played { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Seeked { .. } => "Playback position changed",
            PlaybackEvent::VolumeChanged { .. } => "Volume changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }

    fn track_id(&self) -> Option<&str> {
        match self {
            PlaybackEvent::TrackLoaded { track_id, .. }
            | PlaybackEvent::Played { track_id, .. }
            | PlaybackEvent::Paused { track_id, .. }
            | PlaybackEvent::Seeked { track_id, .. } => Some(track_id),
            PlaybackEvent::VolumeChanged { .. } => None,
            PlaybackEvent::Error { track_id, .. } => track_id.as_deref(),
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Handle returned by [`EventBus::on`], used to unregister a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&CoreEvent) + Send + Sync>;

/// Central event bus for publishing and observing events.
///
/// Cloning the bus is cheap; clones share listeners and the broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
    listeners: Arc<RwLock<Vec<(ListenerId, Listener)>>>,
    next_listener_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a new event bus with the specified broadcast buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_listener_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Registers a synchronous listener. Listeners run in registration order.
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CoreEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Publishes an event.
    ///
    /// Listeners are invoked before this returns. Returns the number of
    /// listeners plus broadcast subscribers that received the event.
    pub fn emit(&self, event: CoreEvent) -> usize {
        // Snapshot so listeners may call `on`/`off` without deadlocking.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(&event);
        }

        let subscribers = self.sender.send(event).unwrap_or(0);
        listeners.len() + subscribers
    }

    /// Creates a new broadcast subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active broadcast subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
