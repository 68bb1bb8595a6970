//! Keyed, cancellable background tasks.
//!
//! Every delayed transition (intro steps, heart expiry, bounce reset, copied
//! reset) and the realtime comment stream runs as a tokio task registered
//! here under a [`TimerKey`]. Scheduling under a key that already has a
//! pending task aborts the older one. [`TaskRegistry::cancel_all`] closes the
//! registry: nothing scheduled afterwards runs.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::engagement::HeartId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    IntroSequence,
    Autoplay,
    LikeBounce,
    HeartExpiry(HeartId),
    CopiedReset,
    CommentStream,
}

#[derive(Default)]
struct Registry {
    tasks: HashMap<TimerKey, JoinHandle<()>>,
    closed: bool,
}

#[derive(Default)]
pub struct TaskRegistry {
    inner: Mutex<Registry>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns `task` under `key`, replacing any pending task with that key.
    /// Returns `false` once the registry has been closed.
    pub fn spawn<F>(&self, key: TimerKey, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.lock();
        if guard.closed {
            debug!(?key, "timers: registry closed, dropping task");
            return false;
        }
        guard.tasks.retain(|_, handle| !handle.is_finished());
        let handle = tokio::spawn(task);
        if let Some(previous) = guard.tasks.insert(key, handle) {
            previous.abort();
        }
        true
    }

    /// Runs `task` after `delay` unless cancelled first.
    pub fn schedule<F>(&self, key: TimerKey, delay: Duration, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(key, async move {
            tokio::time::sleep(delay).await;
            task.await;
        })
    }

    pub fn cancel(&self, key: TimerKey) -> bool {
        match self.lock().tasks.remove(&key) {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.lock()
            .tasks
            .get(&key)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn pending(&self) -> usize {
        self.lock()
            .tasks
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn cancel_all(&self) {
        let mut guard = self.lock();
        guard.closed = true;
        let cancelled = guard.tasks.len();
        for (_, handle) in guard.tasks.drain() {
            handle.abort();
        }
        debug!(cancelled, "timers: registry closed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rescheduling_a_key_replaces_the_pending_task() {
        let registry = TaskRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let first = Arc::clone(&fired);
        registry.schedule(TimerKey::LikeBounce, Duration::from_millis(600), async move {
            first.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(400)).await;

        let second = Arc::clone(&fired);
        registry.schedule(TimerKey::LikeBounce, Duration::from_millis(600), async move {
            second.fetch_add(10, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
        assert!(!registry.is_pending(TimerKey::LikeBounce));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_pending_and_future_tasks() {
        let registry = TaskRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let pending = Arc::clone(&fired);
        registry.schedule(
            TimerKey::HeartExpiry(HeartId(1)),
            Duration::from_millis(1000),
            async move {
                pending.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(registry.pending(), 1);

        registry.cancel_all();
        let late = Arc::clone(&fired);
        assert!(!registry.spawn(TimerKey::CopiedReset, async move {
            late.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(registry.is_closed());
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_reports_whether_task_was_pending() {
        let registry = TaskRegistry::new();
        registry.schedule(TimerKey::CopiedReset, Duration::from_secs(2), async {});
        assert!(registry.cancel(TimerKey::CopiedReset));
        assert!(!registry.cancel(TimerKey::CopiedReset));
    }
}
