//! Main side and a timer worker talking over a worker link.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use typed_channel::{LinkConfig, PostMessageTransport, TypedChannel, WorkerLink};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Notice {
    message: String,
}

typed_channel::message_kind! {
    StartTimer = "startTimer";
    StopTimer = "stopTimer";
    Notify = "notify": Notice;
}

typed_channel::message_set! {
    ClientMessages { StartTimer, StopTimer }
}

typed_channel::message_set! {
    WorkerMessages { Notify }
}

type WorkerChannel = TypedChannel<ClientMessages, WorkerMessages>;

/// Ticks every `interval` until stopped.
struct Timer {
    running: Mutex<Option<Arc<Mutex<bool>>>>,
}

fn spawn_worker(end: WorkerLink) -> Result<Arc<WorkerChannel>, typed_channel::ChannelError> {
    let channel: Arc<WorkerChannel> =
        Arc::new(TypedChannel::new(PostMessageTransport::new(end))?);
    let timer = Arc::new(Timer {
        running: Mutex::new(None),
    });

    let weak = Arc::downgrade(&channel);
    let start_timer = timer.clone();
    channel.on(StartTimer, move |()| {
        let mut running = start_timer.running.lock();
        if running.is_some() {
            return;
        }
        let flag = Arc::new(Mutex::new(true));
        *running = Some(flag.clone());

        let channel = weak.clone();
        thread::spawn(move || {
            while *flag.lock() {
                thread::sleep(Duration::from_millis(200));
                let Some(channel) = channel.upgrade() else {
                    break;
                };
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis())
                    .unwrap_or_default();
                let notice = Notice {
                    message: format!("Timer tick: {}", now),
                };
                if let Err(err) = channel.emit(Notify, notice) {
                    eprintln!("worker emit failed: {}", err);
                    break;
                }
            }
        });
    });

    channel.on(StopTimer, move |()| {
        if let Some(flag) = timer.running.lock().take() {
            *flag.lock() = false;
        }
    });

    Ok(channel)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (main_end, worker_end) = WorkerLink::pair("timer", LinkConfig::default())?;
    let _worker = spawn_worker(worker_end)?;

    let channel: TypedChannel<WorkerMessages, ClientMessages> =
        TypedChannel::new(PostMessageTransport::new(main_end))?;
    channel.on(Notify, |notice: Notice| {
        println!("Notification received: {}", notice.message)
    });

    channel.emit(StartTimer, ())?;
    thread::sleep(Duration::from_millis(1100));
    channel.emit(StopTimer, ())?;
    thread::sleep(Duration::from_millis(300));

    println!();
    println!("{}", channel.stats());
    Ok(())
}
