//! A user-defined transport: an in-memory loopback that records what it sends.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use typed_channel::{
    Envelope, EnvelopeHandler, Subscription, Transport, TransportResult, TypedChannel,
};

/// Delivers every sent envelope straight back to its receivers.
#[derive(Debug, Default)]
struct Loopback {
    receivers: Arc<Mutex<Vec<(u64, HandlerSlot)>>>,
    next_id: Mutex<u64>,
    log: Mutex<Vec<String>>,
}

struct HandlerSlot(EnvelopeHandler);

impl std::fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HandlerSlot")
    }
}

impl Transport for Loopback {
    fn receive(&self, handler: EnvelopeHandler) -> TransportResult<Subscription> {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };
        self.receivers.lock().push((id, HandlerSlot(handler)));

        let receivers = self.receivers.clone();
        Ok(Subscription::new(move || {
            receivers.lock().retain(|(slot, _)| *slot != id);
        }))
    }

    fn send(&self, envelope: &Envelope) -> TransportResult<()> {
        self.log.lock().push(envelope.kind.clone());
        let handlers: Vec<EnvelopeHandler> = self
            .receivers
            .lock()
            .iter()
            .map(|(_, slot)| slot.0.clone())
            .collect();
        for handler in handlers {
            handler(envelope.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Resize {
    width: u32,
    height: u32,
}

typed_channel::message_kind! {
    WindowResize = "window:resize": Resize;
    CtaClick = "ctaButton:click";
}

typed_channel::message_set! {
    UiEvents { WindowResize, CtaClick }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let loopback = Arc::new(Loopback::default());
    let channel: TypedChannel<UiEvents> = TypedChannel::new(loopback.clone())?;

    channel.on(WindowResize, |size: Resize| {
        println!("Resized to {}x{}", size.width, size.height)
    });
    channel.on(CtaClick, |()| println!("Button clicked"));

    channel.emit(
        WindowResize,
        Resize {
            width: 800,
            height: 600,
        },
    )?;
    channel.emit(CtaClick, ())?;

    channel.unlisten();
    channel.emit(CtaClick, ())?;
    println!("Listening: {}", channel.is_listening());
    println!("Sent through loopback: {:?}", loopback.log.lock());
    Ok(())
}
