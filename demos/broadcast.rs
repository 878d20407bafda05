//! Several "tabs" sharing a broadcast hub.
//!
//! A broadcast port never hears its own posts, so each tab pairs it with a
//! local event target to also receive what it emits itself.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use typed_channel::{
    BroadcastHub, EventTargetTransport, PostMessageTransport, Transport, TypedChannel,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Leader {
    id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Notice {
    message: String,
}

typed_channel::message_kind! {
    NewLeaderElected = "new-leader-elected": Leader;
    Broadcast = "message": Notice;
}

typed_channel::message_set! {
    Events { NewLeaderElected, Broadcast }
}

fn open_tab(hub: &BroadcastHub, id: &str) -> Result<TypedChannel<Events>, Box<dyn std::error::Error>> {
    let port = hub.port()?;
    let transports: Vec<Arc<dyn Transport>> = vec![
        Arc::new(EventTargetTransport::new().with_name(format!("{}-local", id))),
        Arc::new(PostMessageTransport::new(port).with_name(format!("{}-broadcast", id))),
    ];
    let channel: TypedChannel<Events> = TypedChannel::with_config(
        transports,
        typed_channel::ChannelConfig::new().with_name(id),
    )?;

    let me = id.to_string();
    channel.on(NewLeaderElected, move |leader: Leader| {
        println!("[{}] New leader elected: {}", me, leader.id);
        if leader.id == me {
            println!("[{}] I am the leader!", me);
        }
    });
    let me = id.to_string();
    channel.on(Broadcast, move |notice: Notice| {
        println!("[{}] Broadcast message: {}", me, notice.message)
    });

    Ok(channel)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let hub = BroadcastHub::new("example-channel", 64);
    let first = open_tab(&hub, "tab-1")?;
    let second = open_tab(&hub, "tab-2")?;
    let _third = open_tab(&hub, "tab-3")?;

    first.emit(
        NewLeaderElected,
        Leader {
            id: first.name().to_string(),
        },
    )?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    second.emit(
        Broadcast,
        Notice {
            message: format!("Hello from tab: {}", second.name()),
        },
    )?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!();
    println!("{}", first.stats());
    Ok(())
}
