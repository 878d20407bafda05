//! In-process event bus: a channel hears its own emits synchronously.

use serde::{Deserialize, Serialize};
use typed_channel::{EventTargetTransport, TypedChannel};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Notice {
    message: String,
}

typed_channel::message_kind! {
    Ready = "ready";
    Notify = "notify": Notice;
    Reset = "reset";
}

typed_channel::message_set! {
    Events { Ready, Notify, Reset }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let channel: TypedChannel<Events> = TypedChannel::new(EventTargetTransport::new())?;

    channel.on(Ready, |()| println!("Ready event received"));
    channel.on(Notify, |notice: Notice| {
        println!("Notify event received: {}", notice.message)
    });
    let reset = channel.on(Reset, |()| println!("Log cleared"));

    channel.emit(Ready, ())?;
    channel.emit(
        Notify,
        Notice {
            message: "Hello, world!".to_string(),
        },
    )?;
    channel.emit(Reset, ())?;

    reset.release();
    channel.emit(Reset, ())?;
    println!("Reset handlers left: {}", channel.handler_count("reset"));

    println!();
    println!("{}", channel.stats());
    Ok(())
}
