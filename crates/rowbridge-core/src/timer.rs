//! Cancel-and-rearm broadcast timer
//!
//! One task per timer. A rearm restarts the current period; cancelling or dropping the
//! timer aborts the task, so a profile never holds more than one pending tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Periodic callback with a restartable period
#[derive(Debug)]
pub struct BroadcastTimer {
    period: Duration,
    rearm: Arc<Notify>,
    task: JoinHandle<()>,
}

impl BroadcastTimer {
    /// Start calling `on_tick` every `period`
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let rearm = Arc::new(Notify::new());
        let signal = Arc::clone(&rearm);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(period) => on_tick().await,
                    _ = signal.notified() => {}
                }
            }
        });
        Self {
            period,
            rearm,
            task,
        }
    }

    /// Restart the period from now
    pub fn rearm(&self) {
        self.rearm.notify_one();
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.is_finished()
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for BroadcastTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_timer(period: Duration) -> (BroadcastTimer, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let timer = BroadcastTimer::spawn(period, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (timer, ticks)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period() {
        let (_timer, ticks) = counting_timer(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_restarts_period() {
        let (timer, ticks) = counting_timer(Duration::from_secs(1));
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(600)).await;
            timer.rearm();
        }
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (timer, ticks) = counting_timer(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert!(timer.is_cancelled());
    }
}
