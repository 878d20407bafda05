use std::fmt::Debug;
use std::sync::Arc;

use crate::error::TransportResult;
use crate::message::Envelope;
use crate::subscription::Subscription;

pub mod broadcast;
pub mod event_target;
pub mod listeners;
pub mod post_message;
pub mod utils;
pub mod worker;

pub use utils::{spawn_weak_task, spawn_weak_thread};

/// Callback a transport invokes once per inbound envelope.
pub type EnvelopeHandler = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Transport trait for abstracting one raw carrier.
///
/// A transport moves opaque envelopes; which kinds flow in which direction
/// is decided by the channel that owns it.
pub trait Transport: Send + Sync + Debug {
    /// Start delivering inbound envelopes to `handler`, in carrier order.
    /// Releasing the returned subscription removes exactly this handler.
    ///
    /// The handler may be called before `receive` returns (for example to
    /// flush buffered envelopes); the channel holds no lock during this call.
    fn receive(&self, handler: EnvelopeHandler) -> TransportResult<Subscription>;

    /// Hand an envelope to the carrier. No delivery confirmation.
    fn send(&self, envelope: &Envelope) -> TransportResult<()>;

    /// Get transport statistics
    fn stats(&self) -> Option<TransportStats> {
        None
    }

    /// Get transport name/identifier
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Statistics collected by transport implementations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
    pub recv_errors: u64,
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &TransportStats) {
        self.messages_sent += other.messages_sent;
        self.messages_received += other.messages_received;
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
        self.send_errors += other.send_errors;
        self.recv_errors += other.recv_errors;
    }
}

impl std::fmt::Display for TransportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Transport Statistics:")?;
        writeln!(f, "  Messages sent:     {}", self.messages_sent)?;
        writeln!(f, "  Messages received: {}", self.messages_received)?;
        writeln!(f, "  Bytes sent:        {}", self.bytes_sent)?;
        writeln!(f, "  Bytes received:    {}", self.bytes_received)?;
        writeln!(f, "  Send errors:       {}", self.send_errors)?;
        writeln!(f, "  Receive errors:    {}", self.recv_errors)?;
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn receive(&self, handler: EnvelopeHandler) -> TransportResult<Subscription> {
        (**self).receive(handler)
    }

    fn send(&self, envelope: &Envelope) -> TransportResult<()> {
        (**self).send(envelope)
    }

    fn stats(&self) -> Option<TransportStats> {
        (**self).stats()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn receive(&self, handler: EnvelopeHandler) -> TransportResult<Subscription> {
        (**self).receive(handler)
    }

    fn send(&self, envelope: &Envelope) -> TransportResult<()> {
        (**self).send(envelope)
    }

    fn stats(&self) -> Option<TransportStats> {
        (**self).stats()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_merge() {
        let mut total = TransportStats::new();
        total.merge(&TransportStats {
            messages_sent: 2,
            bytes_sent: 10,
            ..Default::default()
        });
        total.merge(&TransportStats {
            messages_sent: 1,
            messages_received: 4,
            recv_errors: 1,
            ..Default::default()
        });

        assert_eq!(total.messages_sent, 3);
        assert_eq!(total.messages_received, 4);
        assert_eq!(total.bytes_sent, 10);
        assert_eq!(total.recv_errors, 1);
    }

    #[test]
    fn test_stats_display() {
        let stats = TransportStats {
            messages_sent: 7,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("Messages sent:     7"));
    }
}
