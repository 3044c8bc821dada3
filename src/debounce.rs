//! Single-shot debounced tasks.
//!
//! Rescheduling aborts the pending timer and bumps a generation counter. A task
//! that outlived its generation (it was already past the timer when a newer
//! one was scheduled) sees `is_current() == false` and must drop its result.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Generation {
    id: u64,
    latest: Arc<AtomicU64>,
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.id
    }
}

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    latest: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            latest: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    /// Run `task` once `delay` passes without another call to `schedule` or
    /// `cancel`. Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&mut self, task: F) -> Generation
    where
        F: FnOnce(Generation) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        let generation = Generation {
            id: self.latest.fetch_add(1, Ordering::SeqCst) + 1,
            latest: self.latest.clone(),
        };
        let delay = self.delay;
        let ticket = generation.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if ticket.is_current() {
                task(ticket).await;
            }
        }));
        generation
    }

    /// Drop the pending task, if any, and invalidate anything in flight.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> Arc<Mutex<Vec<u32>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = recorder();
        let mut debouncer = Debouncer::new(Duration::from_millis(800));
        let f = fired.clone();
        debouncer.schedule(move |_| async move {
            f.lock().unwrap().push(1);
        });

        tokio::time::sleep(Duration::from_millis(799)).await;
        assert!(fired.lock().unwrap().is_empty());
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_cancels_previous() {
        let fired = recorder();
        let mut debouncer = Debouncer::new(Duration::from_millis(800));
        for n in 0..5u32 {
            let f = fired.clone();
            debouncer.schedule(move |_| async move {
                f.lock().unwrap().push(n);
            });
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(*fired.lock().unwrap(), vec![4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let fired = recorder();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let f = fired.clone();
        debouncer.schedule(move |_| async move {
            f.lock().unwrap().push(1);
        });
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fired.lock().unwrap().is_empty());
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_goes_stale_on_reschedule() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        let first = debouncer.schedule(|_| async {});
        assert!(first.is_current());
        let second = debouncer.schedule(|_| async {});
        assert!(!first.is_current());
        assert!(second.is_current());
        assert!(second.id() > first.id());
        debouncer.cancel();
        assert!(!second.is_current());
    }
}
