use bytes::Bytes;
use crossbeam::channel::{SendTimeoutError, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{TransportError, TransportResult};
use crate::transport::listeners::{ListenerId, ListenerList};
use crate::transport::post_message::{MessageEvent, MessageListener, PostMessageTarget};
use crate::transport::utils::spawn_weak_thread;

pub const DEFAULT_CAPACITY: usize = 1024;

/// Configuration for a worker link.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    /// Frames queued towards the peer before `post_message` waits
    pub capacity: usize,
    /// How long `post_message` waits on a full queue; `None` fails immediately
    pub send_timeout: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            send_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl LinkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    pub fn without_send_timeout(mut self) -> Self {
        self.send_timeout = None;
        self
    }
}

/// One endpoint of a bidirectional worker link.
///
/// Frames posted on one endpoint arrive at the listeners of the other, in
/// order, on the receiving endpoint's delivery thread. Frames that arrive
/// while no listener is registered are dropped.
///
/// A dropped endpoint's delivery thread exits only once its peer posts one
/// more frame or is dropped as well.
pub struct WorkerLink {
    sender: Sender<Bytes>,
    listeners: Arc<ListenerList<MessageEvent>>,
    config: LinkConfig,
    posted: AtomicU64,
    name: String,
}

impl WorkerLink {
    /// Create a pair of connected endpoints: `(main side, worker side)`.
    pub fn pair(name: impl Into<String>, config: LinkConfig) -> TransportResult<(Self, Self)> {
        let name = name.into();
        let capacity = config.capacity.max(1);

        let (tx1, rx1) = bounded(capacity);
        let (tx2, rx2) = bounded(capacity);

        let main = Self {
            sender: tx1,
            listeners: Arc::new(ListenerList::new()),
            config: config.clone(),
            posted: AtomicU64::new(0),
            name: format!("{}-main", name),
        };

        let worker = Self {
            sender: tx2,
            listeners: Arc::new(ListenerList::new()),
            config,
            posted: AtomicU64::new(0),
            name: format!("{}-worker", name),
        };

        spawn_weak_thread(
            format!("{}-delivery", main.name),
            Arc::downgrade(&main.listeners),
            rx2,
            |listeners, data| {
                listeners.emit(&MessageEvent { data });
            },
        )?;

        spawn_weak_thread(
            format!("{}-delivery", worker.name),
            Arc::downgrade(&worker.listeners),
            rx1,
            |listeners, data| {
                listeners.emit(&MessageEvent { data });
            },
        )?;

        tracing::debug!(link = %name, capacity, "worker link opened");
        Ok((main, worker))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frames successfully posted from this endpoint
    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn closed(&self) -> TransportError {
        TransportError::Closed(format!("{} peer dropped", self.name))
    }
}

impl PostMessageTarget for WorkerLink {
    fn post_message(&self, data: Bytes) -> TransportResult<()> {
        match self.config.send_timeout {
            Some(timeout) => self.sender.send_timeout(data, timeout).map_err(|e| match e {
                SendTimeoutError::Timeout(_) => TransportError::Timeout {
                    duration_ms: timeout.as_millis() as u64,
                    operation: "post_message".into(),
                },
                SendTimeoutError::Disconnected(_) => self.closed(),
            })?,
            None => self.sender.try_send(data).map_err(|e| match e {
                TrySendError::Full(_) => TransportError::SendFailed {
                    reason: format!("{} queue full", self.name),
                },
                TrySendError::Disconnected(_) => self.closed(),
            })?,
        }

        self.posted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl std::fmt::Debug for WorkerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLink")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;

    fn forward_to(link: &WorkerLink) -> crossbeam::channel::Receiver<Bytes> {
        let (tx, rx) = unbounded();
        link.add_message_listener(Arc::new(move |event: &MessageEvent| {
            let _ = tx.send(event.data.clone());
        }));
        rx
    }

    #[test]
    fn test_link_bidirectional() {
        let (main, worker) = WorkerLink::pair("test", LinkConfig::default()).unwrap();
        let at_worker = forward_to(&worker);
        let at_main = forward_to(&main);

        main.post_message(Bytes::from_static(b"Hello from main")).unwrap();
        let received = at_worker.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(received.as_ref(), b"Hello from main");

        worker.post_message(Bytes::from_static(b"Hello from worker")).unwrap();
        let received = at_main.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(received.as_ref(), b"Hello from worker");
    }

    #[test]
    fn test_link_preserves_order() {
        let (main, worker) = WorkerLink::pair("order", LinkConfig::default()).unwrap();
        let at_worker = forward_to(&worker);

        for i in 0..50u8 {
            main.post_message(Bytes::from(vec![i])).unwrap();
        }

        for i in 0..50u8 {
            let frame = at_worker.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(frame.as_ref(), &[i]);
        }
        assert_eq!(main.posted(), 50);
    }

    #[test]
    fn test_post_to_dropped_peer() {
        let (main, worker) = WorkerLink::pair("closed", LinkConfig::default()).unwrap();
        drop(worker);

        // The worker's delivery thread owns the receiving side and exits once it notices.
        let mut result = Ok(());
        for _ in 0..100 {
            result = main.post_message(Bytes::from_static(b"ping"));
            if result.is_err() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(matches!(result, Err(TransportError::Closed(_))));
    }

    #[test]
    fn test_removed_listener_not_called() {
        let (main, worker) = WorkerLink::pair("remove", LinkConfig::default()).unwrap();
        let (tx, rx) = unbounded();
        let id = worker.add_message_listener(Arc::new(move |event: &MessageEvent| {
            let _ = tx.send(event.data.clone());
        }));
        assert!(worker.remove_message_listener(id));
        assert_eq!(worker.listener_count(), 0);

        main.post_message(Bytes::from_static(b"ignored")).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
