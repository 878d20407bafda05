//! Broadcast hub: every port hears every other port of the same hub.

use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::{TransportError, TransportResult};
use crate::transport::listeners::{ListenerId, ListenerList};
use crate::transport::post_message::{MessageEvent, MessageListener, PostMessageTarget};
use crate::transport::utils::spawn_weak_task;

pub const DEFAULT_HUB_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Frame {
    origin: u64,
    data: Bytes,
}

/// Named broadcast medium. Cloning shares the same medium.
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<Frame>,
    next_port: Arc<AtomicU64>,
    name: Arc<str>,
}

impl BroadcastHub {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            next_port: Arc::new(AtomicU64::new(1)),
            name: Arc::from(name.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Open a port on this hub. Must be called inside a tokio runtime.
    pub fn port(&self) -> TransportResult<BroadcastPort> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::NoRuntime(e.to_string()))?;

        let id = self.next_port.fetch_add(1, Ordering::Relaxed);
        let listeners = Arc::new(ListenerList::new());
        let hub = self.name.clone();

        let delivery = spawn_weak_task(
            &handle,
            Arc::downgrade(&listeners),
            self.sender.subscribe(),
            move |listeners: &ListenerList<MessageEvent>, frame: Frame| {
                if frame.origin != id {
                    listeners.emit(&MessageEvent { data: frame.data });
                }
            },
            move |skipped| {
                tracing::warn!(hub = %hub, port = id, skipped, "broadcast port lagged");
            },
        );

        tracing::debug!(hub = %self.name, port = id, "broadcast port opened");
        Ok(BroadcastPort {
            id,
            delivery,
            sender: self.sender.clone(),
            listeners,
            hub: self.name.clone(),
        })
    }

    /// Ports currently subscribed
    pub fn port_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new("broadcast", DEFAULT_HUB_CAPACITY)
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("name", &self.name)
            .field("ports", &self.port_count())
            .finish()
    }
}

/// One participant on a [`BroadcastHub`]. Never receives its own posts.
///
/// Dropping the port stops its delivery task and unsubscribes it from the hub.
pub struct BroadcastPort {
    id: u64,
    delivery: JoinHandle<()>,
    sender: broadcast::Sender<Frame>,
    listeners: Arc<ListenerList<MessageEvent>>,
    hub: Arc<str>,
}

impl BroadcastPort {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for BroadcastPort {
    fn drop(&mut self) {
        self.delivery.abort();
    }
}

impl PostMessageTarget for BroadcastPort {
    fn post_message(&self, data: Bytes) -> TransportResult<()> {
        let frame = Frame {
            origin: self.id,
            data,
        };
        // No subscribers means nobody is listening, which is not an error.
        if self.sender.send(frame).is_err() {
            tracing::trace!(hub = %self.hub, port = self.id, "broadcast without receivers");
        }
        Ok(())
    }

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl std::fmt::Debug for BroadcastPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastPort")
            .field("hub", &self.hub)
            .field("id", &self.id)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
