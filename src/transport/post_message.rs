//! Transport over any post-message style object (worker links, broadcast ports).

use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;

use crate::codec::{Codec, JsonCodec};
use crate::error::{TransportError, TransportResult};
use crate::message::Envelope;
use crate::subscription::Subscription;
use crate::transport::listeners::{Listener, ListenerId};
use crate::transport::{EnvelopeHandler, Transport, TransportStats};

pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Event delivered to message listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub data: Bytes,
}

pub type MessageListener = Listener<MessageEvent>;

/// Object that can post frames and notify listeners of arriving frames.
pub trait PostMessageTarget: Send + Sync + Debug {
    fn post_message(&self, data: Bytes) -> TransportResult<()>;

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId;

    /// Returns false when `id` is not registered
    fn remove_message_listener(&self, id: ListenerId) -> bool;
}

impl<P: PostMessageTarget + ?Sized> PostMessageTarget for Arc<P> {
    fn post_message(&self, data: Bytes) -> TransportResult<()> {
        (**self).post_message(data)
    }

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
        (**self).add_message_listener(listener)
    }

    fn remove_message_listener(&self, id: ListenerId) -> bool {
        (**self).remove_message_listener(id)
    }
}

/// Transport that posts encoded envelopes and decodes arriving frames.
pub struct PostMessageTransport<P: PostMessageTarget, C: Codec = JsonCodec> {
    target: Arc<P>,
    codec: C,
    max_message_size: usize,
    stats: Arc<Mutex<TransportStats>>,
    name: String,
}

impl<P: PostMessageTarget + 'static> PostMessageTransport<P, JsonCodec> {
    /// Create a transport with the default JSON codec
    pub fn new(target: P) -> Self {
        Self::with_codec(Arc::new(target), JsonCodec)
    }

    /// Create a transport over a target that is shared with other code
    pub fn shared(target: Arc<P>) -> Self {
        Self::with_codec(target, JsonCodec)
    }
}

impl<P: PostMessageTarget + 'static, C: Codec + Clone + 'static> PostMessageTransport<P, C> {
    /// Create a transport with a specific codec
    pub fn with_codec(target: Arc<P>, codec: C) -> Self {
        Self {
            target,
            codec,
            max_message_size: MAX_MESSAGE_SIZE,
            stats: Arc::new(Mutex::new(TransportStats::default())),
            name: "post-message".to_string(),
        }
    }

    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn target(&self) -> &Arc<P> {
        &self.target
    }
}

impl<P: PostMessageTarget + 'static, C: Codec + Clone + 'static> Transport
    for PostMessageTransport<P, C>
{
    fn receive(&self, handler: EnvelopeHandler) -> TransportResult<Subscription> {
        let codec = self.codec.clone();
        let stats = self.stats.clone();
        let name = self.name.clone();

        let id = self
            .target
            .add_message_listener(Arc::new(move |event: &MessageEvent| {
                let decoded = codec
                    .decode::<Envelope>(&event.data)
                    .and_then(|envelope| envelope.validate().map(|_| envelope));

                match decoded {
                    Ok(envelope) => {
                        {
                            let mut stats = stats.lock();
                            stats.messages_received += 1;
                            stats.bytes_received += event.data.len() as u64;
                        }
                        handler(envelope);
                    }
                    Err(err) => {
                        stats.lock().recv_errors += 1;
                        tracing::warn!(
                            transport = %name,
                            bytes = event.data.len(),
                            error = %err,
                            "dropping undecodable frame"
                        );
                    }
                }
            }));

        let target = Arc::downgrade(&self.target);
        Ok(Subscription::new(move || {
            if let Some(target) = target.upgrade() {
                target.remove_message_listener(id);
            }
        }))
    }

    fn send(&self, envelope: &Envelope) -> TransportResult<()> {
        let encoded = self.codec.encode(envelope).inspect_err(|_| {
            self.stats.lock().send_errors += 1;
        })?;

        if encoded.len() > self.max_message_size {
            self.stats.lock().send_errors += 1;
            return Err(TransportError::MessageTooLarge {
                size: encoded.len(),
                max: self.max_message_size,
            });
        }

        let size = encoded.len() as u64;
        match self.target.post_message(Bytes::from(encoded)) {
            Ok(()) => {
                let mut stats = self.stats.lock();
                stats.messages_sent += 1;
                stats.bytes_sent += size;
                Ok(())
            }
            Err(err) => {
                self.stats.lock().send_errors += 1;
                Err(err)
            }
        }
    }

    fn stats(&self) -> Option<TransportStats> {
        Some(self.stats.lock().clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<P: PostMessageTarget, C: Codec> std::fmt::Debug for PostMessageTransport<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostMessageTransport")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("codec", &self.codec)
            .finish()
    }
}
