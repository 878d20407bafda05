//! Recording transport used by the crate's unit tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{TransportError, TransportResult};
use crate::message::Envelope;
use crate::subscription::Subscription;
use crate::transport::{EnvelopeHandler, Transport};

#[derive(Default)]
pub(crate) struct MockTransport {
    name: String,
    handlers: Arc<Mutex<Vec<(usize, EnvelopeHandler)>>>,
    receive_calls: AtomicUsize,
    releases: Arc<AtomicUsize>,
    sent: Mutex<Vec<Envelope>>,
    journal: Option<Arc<Mutex<Vec<String>>>>,
    replay: Mutex<Option<Envelope>>,
    fail_send: bool,
    fail_receive: bool,
}

impl MockTransport {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            ..Default::default()
        })
    }

    pub(crate) fn failing_send(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_send: true,
            ..Default::default()
        })
    }

    pub(crate) fn failing_receive(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_receive: true,
            ..Default::default()
        })
    }

    /// Mock that appends `receive:<name>`, `send:<name>` and `release:<name>` to a shared journal.
    pub(crate) fn journaled(name: &str, journal: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            journal: Some(journal.clone()),
            ..Default::default()
        })
    }

    /// Deliver `envelope` from inside the next `receive` call, before it returns.
    pub(crate) fn replay_on_receive(&self, envelope: Envelope) {
        *self.replay.lock() = Some(envelope);
    }

    fn record(&self, action: &str) {
        if let Some(journal) = &self.journal {
            journal.lock().push(format!("{}:{}", action, self.name));
        }
    }

    /// Push an envelope to every handler currently registered.
    pub(crate) fn simulate(&self, envelope: Envelope) {
        let handlers: Vec<EnvelopeHandler> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(envelope.clone());
        }
    }

    /// Hand out the handler registered at `index` without going through `simulate`.
    pub(crate) fn handler(&self, index: usize) -> Option<EnvelopeHandler> {
        self.handlers
            .lock()
            .get(index)
            .map(|(_, handler)| handler.clone())
    }

    pub(crate) fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub(crate) fn active_handlers(&self) -> usize {
        self.handlers.lock().len()
    }

    pub(crate) fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }
}

impl Transport for MockTransport {
    fn receive(&self, handler: EnvelopeHandler) -> TransportResult<Subscription> {
        if self.fail_receive {
            return Err(TransportError::Protocol("receive refused".into()));
        }

        self.record("receive");
        let key = self.receive_calls.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().push((key, handler.clone()));

        let replay = self.replay.lock().take();
        if let Some(envelope) = replay {
            handler(envelope);
        }

        let handlers = self.handlers.clone();
        let releases = self.releases.clone();
        let journal = self.journal.clone();
        let release = format!("release:{}", self.name);
        Ok(Subscription::new(move || {
            releases.fetch_add(1, Ordering::SeqCst);
            handlers.lock().retain(|(k, _)| *k != key);
            if let Some(journal) = journal {
                journal.lock().push(release);
            }
        }))
    }

    fn send(&self, envelope: &Envelope) -> TransportResult<()> {
        if self.fail_send {
            return Err(TransportError::SendFailed {
                reason: format!("{} refused", self.name),
            });
        }
        self.record("send");
        self.sent.lock().push(envelope.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("name", &self.name)
            .finish()
    }
}
