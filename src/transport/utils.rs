use crossbeam::channel::Receiver;
use std::sync::Weak;
use std::thread;
use tokio::sync::broadcast;

/// Spawns a thread that feeds every received item to `action` while the owner exists.
///
/// The loop ends when all senders are gone or the owner has been dropped.
pub fn spawn_weak_thread<T, M>(
    name: String,
    owner: Weak<T>,
    receiver: Receiver<M>,
    mut action: impl FnMut(&T, M) + Send + 'static,
) -> std::io::Result<thread::JoinHandle<()>>
where
    T: Send + Sync + 'static,
    M: Send + 'static,
{
    thread::Builder::new().name(name).spawn(move || {
        for item in receiver.iter() {
            match owner.upgrade() {
                Some(strong) => action(&strong, item),
                // Owner dropped, stop the loop
                None => break,
            }
        }
    })
}

/// Spawns a task on `handle` that feeds broadcast items to `action` while the owner exists.
///
/// Lagged receivers report the number of skipped items through `on_lag` and keep going.
pub fn spawn_weak_task<T, M>(
    handle: &tokio::runtime::Handle,
    owner: Weak<T>,
    mut receiver: broadcast::Receiver<M>,
    mut action: impl FnMut(&T, M) + Send + 'static,
    on_lag: impl Fn(u64) + Send + 'static,
) -> tokio::task::JoinHandle<()>
where
    T: Send + Sync + 'static,
    M: Clone + Send + 'static,
{
    handle.spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(item) => match owner.upgrade() {
                    Some(strong) => action(&strong, item),
                    None => break,
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => on_lag(skipped),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
