//! In-process event bus and the transport bound to it.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::TransportResult;
use crate::message::Envelope;
use crate::subscription::Subscription;
use crate::transport::listeners::{Listener, ListenerId, ListenerList};
use crate::transport::{EnvelopeHandler, Transport, TransportStats};

/// Event name the transport publishes and subscribes on.
pub const MESSAGE_EVENT: &str = "message";

/// Event carrying an envelope as its detail.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
    pub event_type: String,
    pub detail: Envelope,
}

impl CustomEvent {
    pub fn new(event_type: impl Into<String>, detail: Envelope) -> Self {
        Self {
            event_type: event_type.into(),
            detail,
        }
    }
}

/// Synchronous publish/subscribe object keyed by event type.
///
/// `dispatch_event` runs every listener for the event type on the calling
/// thread before it returns.
#[derive(Default)]
pub struct EventTarget {
    listeners: RwLock<HashMap<String, Arc<ListenerList<CustomEvent>>>>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event_listener(
        &self,
        event_type: &str,
        listener: Listener<CustomEvent>,
    ) -> ListenerId {
        let list = self
            .listeners
            .write()
            .entry(event_type.to_string())
            .or_default()
            .clone();
        list.add(listener)
    }

    pub fn remove_event_listener(&self, event_type: &str, id: ListenerId) -> bool {
        let list = self.listeners.read().get(event_type).cloned();
        list.is_some_and(|list| list.remove(id))
    }

    /// Returns how many listeners ran
    pub fn dispatch_event(&self, event: &CustomEvent) -> usize {
        let list = self.listeners.read().get(&event.event_type).cloned();
        list.map_or(0, |list| list.emit(event))
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .read()
            .get(event_type)
            .map_or(0, |list| list.len())
    }
}

impl std::fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("EventTarget")
            .field("event_types", &listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Transport over an [`EventTarget`].
///
/// Envelopes travel as the detail of a `"message"` event. Delivery is
/// synchronous: `send` returns after every receiver has run.
pub struct EventTargetTransport {
    target: Arc<EventTarget>,
    stats: Arc<Mutex<TransportStats>>,
    name: String,
}

impl EventTargetTransport {
    /// Transport over a fresh private target
    pub fn new() -> Self {
        Self::with_target(Arc::new(EventTarget::new()))
    }

    /// Transport over a shared target
    pub fn with_target(target: Arc<EventTarget>) -> Self {
        Self {
            target,
            stats: Arc::new(Mutex::new(TransportStats::default())),
            name: "event-target".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn target(&self) -> &Arc<EventTarget> {
        &self.target
    }
}

impl Default for EventTargetTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for EventTargetTransport {
    fn receive(&self, handler: EnvelopeHandler) -> TransportResult<Subscription> {
        let stats = self.stats.clone();
        let id = self.target.add_event_listener(
            MESSAGE_EVENT,
            Arc::new(move |event: &CustomEvent| {
                stats.lock().messages_received += 1;
                handler(event.detail.clone());
            }),
        );

        let target = Arc::downgrade(&self.target);
        Ok(Subscription::new(move || {
            if let Some(target) = target.upgrade() {
                target.remove_event_listener(MESSAGE_EVENT, id);
            }
        }))
    }

    fn send(&self, envelope: &Envelope) -> TransportResult<()> {
        self.stats.lock().messages_sent += 1;
        let event = CustomEvent::new(MESSAGE_EVENT, envelope.clone());
        self.target.dispatch_event(&event);
        Ok(())
    }

    fn stats(&self) -> Option<TransportStats> {
        Some(self.stats.lock().clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for EventTargetTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTargetTransport")
            .field("name", &self.name)
            .field("target", &self.target)
            .finish()
    }
}
