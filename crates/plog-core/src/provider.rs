//! Location provider seam.
//!
//! The tracker only talks to [`LocationProvider`]. Position fixes are pushed
//! through a [`Subscription`], a channel whose receiving end is owned by the
//! tracker for the lifetime of one session. Cancelling (or dropping) the
//! subscription makes every later push a no-op, so late fixes can never
//! reach a stopped session.
//!
//! Two implementations are provided:
//! - [`FeedProvider`]: fixes are injected through a cloneable [`FeedHandle`],
//!   from any thread (a device reader, a replayed log, a test).
//! - [`FixedProvider`]: a stationary device that reports a single fix.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sample::PositionSample;

/// Result of asking the user for location access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
}

/// Faults reported by a location provider.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderError {
    /// The user refused location access.
    #[error("location permission denied")]
    PermissionDenied,
    /// Location services are disabled or no signal is available.
    #[error("location unavailable")]
    Unavailable,
    /// The provider did not produce a fix in time.
    #[error("location request timed out")]
    Timeout,
}

/// Hints passed to the provider when subscribing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    /// Desired minimum time between fixes.
    pub interval_hint_ms: u64,
    /// Desired minimum movement between fixes.
    pub min_distance_hint_m: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval_hint_ms: 2000,
            min_distance_hint_m: 5.0,
        }
    }
}

/// Something a subscription can deliver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProviderEvent {
    Sample(PositionSample),
    Fault(ProviderError),
}

/// A source of position fixes.
pub trait LocationProvider {
    /// Asks for location access.
    fn request_permission(&mut self) -> Permission;

    /// Returns a single fix, if one can be obtained right now.
    fn current_position(&mut self) -> Result<PositionSample, ProviderError>;

    /// Starts a push stream of fixes.
    fn subscribe(&mut self, options: WatchOptions) -> Result<Subscription, ProviderError>;
}

/// Sending half of a subscription, held by the provider.
#[derive(Debug, Clone)]
pub struct SubscriptionSink {
    tx: Sender<ProviderEvent>,
    active: Arc<AtomicBool>,
}

impl SubscriptionSink {
    /// Delivers an event. Returns `false` once the subscription was cancelled
    /// or dropped.
    pub fn send(&self, event: ProviderEvent) -> bool {
        if !self.is_active() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Whether the receiving side still wants events.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Receiving half of a position stream.
///
/// Dropping the subscription cancels it.
#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<ProviderEvent>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Creates a connected sink/subscription pair.
    pub fn channel() -> (SubscriptionSink, Self) {
        let (tx, rx) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(true));
        (
            SubscriptionSink {
                tx,
                active: Arc::clone(&active),
            },
            Self { rx, active },
        )
    }

    /// Returns the next pending event without blocking.
    pub fn try_next(&self) -> Option<ProviderEvent> {
        if !self.is_active() {
            return None;
        }
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Stops delivery. Pending events are discarded.
    pub fn cancel(&self) {
        self.active.store(false, Ordering::Release);
        while self.rx.try_recv().is_ok() {}
    }

    /// Whether the subscription still accepts events.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
struct FeedState {
    permission: Permission,
    last_fix: Option<PositionSample>,
    sink: Option<SubscriptionSink>,
}

/// Provider fed from the outside through a [`FeedHandle`].
#[derive(Debug)]
pub struct FeedProvider {
    shared: Arc<Mutex<FeedState>>,
}

/// Injects fixes and faults into a [`FeedProvider`].
#[derive(Debug, Clone)]
pub struct FeedHandle {
    shared: Arc<Mutex<FeedState>>,
}

fn lock(shared: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FeedProvider {
    /// Creates a provider that answers permission requests with `permission`.
    pub fn new(permission: Permission) -> Self {
        Self {
            shared: Arc::new(Mutex::new(FeedState {
                permission,
                last_fix: None,
                sink: None,
            })),
        }
    }

    /// Returns a handle for pushing fixes into this provider.
    pub fn handle(&self) -> FeedHandle {
        FeedHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl LocationProvider for FeedProvider {
    fn request_permission(&mut self) -> Permission {
        lock(&self.shared).permission
    }

    fn current_position(&mut self) -> Result<PositionSample, ProviderError> {
        let state = lock(&self.shared);
        if state.permission == Permission::Denied {
            return Err(ProviderError::PermissionDenied);
        }
        state.last_fix.ok_or(ProviderError::Unavailable)
    }

    fn subscribe(&mut self, options: WatchOptions) -> Result<Subscription, ProviderError> {
        let mut state = lock(&self.shared);
        if state.permission == Permission::Denied {
            return Err(ProviderError::PermissionDenied);
        }
        tracing::debug!(
            interval_hint_ms = options.interval_hint_ms,
            min_distance_hint_m = options.min_distance_hint_m,
            "feed subscription opened"
        );
        let (sink, subscription) = Subscription::channel();
        state.sink = Some(sink);
        Ok(subscription)
    }
}

impl FeedHandle {
    /// Records a fix and forwards it to the active subscription.
    ///
    /// Returns whether a subscriber received it.
    pub fn push(&self, sample: PositionSample) -> bool {
        let mut state = lock(&self.shared);
        state.last_fix = Some(sample);
        Self::forward(&mut state, ProviderEvent::Sample(sample))
    }

    /// Reports a provider fault to the active subscription.
    pub fn fault(&self, error: ProviderError) -> bool {
        let mut state = lock(&self.shared);
        Self::forward(&mut state, ProviderEvent::Fault(error))
    }

    /// Changes the answer to future permission requests.
    pub fn set_permission(&self, permission: Permission) {
        lock(&self.shared).permission = permission;
    }

    /// Whether a live subscription is attached.
    pub fn is_subscribed(&self) -> bool {
        lock(&self.shared)
            .sink
            .as_ref()
            .is_some_and(SubscriptionSink::is_active)
    }

    fn forward(state: &mut FeedState, event: ProviderEvent) -> bool {
        let delivered = state.sink.as_ref().is_some_and(|sink| sink.send(event));
        if !delivered {
            state.sink = None;
        }
        delivered
    }
}

/// A device that never moves.
///
/// Reports its fix for one-off requests and delivers it once to each new
/// subscription.
#[derive(Debug, Clone)]
pub struct FixedProvider {
    permission: Permission,
    fix: Option<PositionSample>,
}

impl FixedProvider {
    /// A granted provider sitting at `fix`.
    pub const fn new(fix: PositionSample) -> Self {
        Self {
            permission: Permission::Granted,
            fix: Some(fix),
        }
    }

    /// A provider whose permission request is refused.
    pub const fn denied() -> Self {
        Self {
            permission: Permission::Denied,
            fix: None,
        }
    }

    /// A granted provider with no signal.
    pub const fn without_signal() -> Self {
        Self {
            permission: Permission::Granted,
            fix: None,
        }
    }
}

impl LocationProvider for FixedProvider {
    fn request_permission(&mut self) -> Permission {
        self.permission
    }

    fn current_position(&mut self) -> Result<PositionSample, ProviderError> {
        if self.permission == Permission::Denied {
            return Err(ProviderError::PermissionDenied);
        }
        self.fix.ok_or(ProviderError::Unavailable)
    }

    fn subscribe(&mut self, _options: WatchOptions) -> Result<Subscription, ProviderError> {
        if self.permission == Permission::Denied {
            return Err(ProviderError::PermissionDenied);
        }
        let (sink, subscription) = Subscription::channel();
        let event = self
            .fix
            .map_or(ProviderEvent::Fault(ProviderError::Unavailable), ProviderEvent::Sample);
        sink.send(event);
        Ok(subscription)
    }
}
