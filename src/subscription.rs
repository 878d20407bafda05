use parking_lot::Mutex;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Handle that undoes one registration.
///
/// `release` runs the undo action at most once; later calls are no-ops.
/// Dropping the handle leaves the registration in place.
pub struct Subscription {
    release: Mutex<Option<ReleaseFn>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    /// A handle with nothing to undo
    pub fn noop() -> Self {
        Self {
            release: Mutex::new(None),
        }
    }

    pub fn release(&self) {
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.release.lock().is_none()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_release_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!subscription.is_released());
        subscription.release();
        subscription.release();

        assert!(subscription.is_released());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_does_not_release() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        drop(Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_noop() {
        let subscription = Subscription::noop();
        assert!(subscription.is_released());
        subscription.release();
    }
}
