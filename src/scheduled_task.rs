use std::future::Future;
use std::sync::Arc;

use rocket::tokio::{
    self,
    sync::Notify,
    task::JoinHandle,
    time::{Duration, MissedTickBehavior},
};

/// A task that runs repeatedly at a fixed period until stopped.
/// The first run happens immediately.
pub struct PeriodicTask {
    task_handle: JoinHandle<()>,
    signal: Arc<Notify>,
}

impl PeriodicTask {
    /// Spawn `task` to run every `period`. A run that overruns the period
    /// delays the following runs rather than triggering a burst.
    pub fn spawn<F, Fut>(period: Duration, mut task: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let signal = Arc::new(Notify::new());
        let task_signal = signal.clone();
        let task_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => task().await,
                    _ = task_signal.notified() => break,
                }
            }
        });
        Self {
            task_handle,
            signal,
        }
    }

    /// Stop the task, letting any run in progress finish first.
    /// Returns true iff the task ended cleanly rather than panicking.
    pub async fn stop(self) -> bool {
        // `notify_one` stores a permit, so a stop requested mid-run is seen
        // at the next loop iteration.
        self.signal.notify_one();
        self.task_handle.await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[rocket::async_test]
    async fn runs_immediately_then_periodically() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = PeriodicTask::spawn(Duration::from_millis(20), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(110)).await;
        assert!(task.stop().await);
        let stopped_at = runs.load(Ordering::SeqCst);
        assert!(stopped_at >= 2, "only ran {stopped_at} times");

        // Nothing runs after stopping.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), stopped_at);
    }
}
