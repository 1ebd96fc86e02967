//! The reload path: what happens when a credential can no longer be used.
//!
//! An expired credential cannot be fixed from inside the connection core;
//! only a fresh login can. The embedding application supplies a
//! [`Reloader`] that restarts that flow, and the registry decides when to
//! call it: after a short delay when the credential is found expired while
//! acquiring a view, immediately when it expires mid-session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Restarts the application's authentication flow.
pub trait Reloader: Send + Sync + 'static {
    /// Performs the reload.
    fn reload(&self);
}

impl<F> Reloader for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn reload(&self) {
        self()
    }
}

/// Runs a [`Reloader`] now or after a delay, with at most one deferred
/// reload outstanding.
#[derive(Clone)]
pub(crate) struct ReloadScheduler {
    reloader: Arc<dyn Reloader>,
    delay: Duration,
    pending: Arc<AtomicBool>,
}

impl ReloadScheduler {
    pub(crate) fn new(reloader: Arc<dyn Reloader>, delay: Duration) -> Self {
        Self {
            reloader,
            delay,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedules a one-shot reload after the configured delay.
    ///
    /// Further calls while one is pending are ignored. Runs on the current
    /// Tokio runtime when there is one, otherwise on a helper thread.
    pub(crate) fn schedule(&self) {
        if self.pending.swap(true, Ordering::SeqCst) {
            tracing::debug!("reload already scheduled");
            return;
        }
        tracing::warn!(delay = ?self.delay, "credential expired, reload scheduled");

        let reloader = Arc::clone(&self.reloader);
        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        let fire = move || {
            pending.store(false, Ordering::SeqCst);
            reloader.reload();
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    fire();
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    fire();
                });
            }
        }
    }

    /// Reloads immediately.
    pub(crate) fn reload_now(&self) {
        tracing::warn!("credential expired mid-session, reloading");
        self.reloader.reload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting() -> (ReloadScheduler, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let scheduler = ReloadScheduler::new(
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_secs(1),
        );
        (scheduler, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fires_after_delay() {
        let (scheduler, count) = counting();

        scheduler.schedule();
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_twice_fires_once() {
        let (scheduler, count) = counting();

        scheduler.schedule();
        scheduler.schedule();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_again_after_firing() {
        let (scheduler, count) = counting();

        scheduler.schedule();
        tokio::time::sleep(Duration::from_secs(2)).await;
        scheduler.schedule();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reload_now_is_synchronous() {
        let (scheduler, count) = counting();
        scheduler.reload_now();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
