//! Synchronous event bus for registry lifecycle notifications.
//!
//! Listeners are invoked in-line with the triggering call, in registration
//! order. A listener that returns an error or panics is logged and skipped;
//! the failure never reaches the caller that triggered the event.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{trace, warn};

/// Event payload: a JSON object such as `{"field_name": ..., "new_version": ...}`.
pub type EventPayload = Map<String, Value>;

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Lifecycle events emitted by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryEvent {
    FieldRegistered,
    FieldUnregistered,
    CollectionCreated,
}

impl RegistryEvent {
    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FieldRegistered => "field_registered",
            Self::FieldUnregistered => "field_unregistered",
            Self::CollectionCreated => "collection_created",
        }
    }
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscriber to registry events.
///
/// Errors returned from `handle` (and panics raised inside it) are caught and
/// logged by the bus. They are never propagated to the registry caller.
pub trait RegistryListener: Send + Sync {
    fn handle(&self, event: RegistryEvent, payload: &EventPayload) -> Result<(), ListenerError>;
}

impl<F> RegistryListener for F
where
    F: Fn(RegistryEvent, &EventPayload) -> Result<(), ListenerError> + Send + Sync,
{
    fn handle(&self, event: RegistryEvent, payload: &EventPayload) -> Result<(), ListenerError> {
        self(event, payload)
    }
}

/// Per-event ordered listener lists.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<RegistryEvent, Vec<Arc<dyn RegistryListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to `event`.
    pub fn on(&mut self, event: RegistryEvent, listener: Arc<dyn RegistryListener>) {
        self.listeners.entry(event).or_default().push(listener);
    }

    /// Unsubscribe a listener previously passed to [`on`](Self::on), matched by
    /// pointer identity. Returns false if it was not subscribed.
    pub fn off(&mut self, event: RegistryEvent, listener: &Arc<dyn RegistryListener>) -> bool {
        let Some(list) = self.listeners.get_mut(&event) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| !Arc::ptr_eq(l, listener));
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(&event);
        }
        removed
    }

    pub fn listener_count(&self, event: RegistryEvent) -> usize {
        self.listeners.get(&event).map_or(0, Vec::len)
    }

    /// Deliver `payload` to every listener of `event`, in subscription order.
    pub fn emit(&self, event: RegistryEvent, payload: &EventPayload) {
        let Some(list) = self.listeners.get(&event) else {
            return;
        };
        trace!(%event, listeners = list.len(), "emitting registry event");
        for listener in list {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.handle(event, payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(%event, %e, "event listener failed"),
                Err(_) => warn!(%event, "event listener panicked"),
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<_, _> = self
            .listeners
            .iter()
            .map(|(event, list)| (event.as_str(), list.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}
