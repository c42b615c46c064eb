// src/sync/scheduler.rs

//! One cancellable periodic timer per session id.
//!
//! All registration and cancellation goes through here so no exit path can
//! leak a timer. The tick body runs to completion even if the timer is
//! cancelled meanwhile; cancellation only prevents the next tick.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::SchedulerError;

struct TimerEntry {
    generation: u64,
    cancel: watch::Sender<bool>,
    // Detached on drop, never aborted: a running tick must finish
    _task: JoinHandle<()>,
}

/// Identifies one registration of a timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerHandle {
    id: String,
    generation: u64,
}

impl TimerHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Default)]
pub struct TimerScheduler {
    timers: Arc<Mutex<HashMap<String, TimerEntry>>>,
    next_generation: AtomicU64,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking `on_tick` for `id`: once immediately, then every
    /// `period`. Returning `ControlFlow::Break` stops and deregisters the
    /// timer. Must be called inside a tokio runtime.
    pub fn register<F>(
        &self,
        id: &str,
        period: Duration,
        mut on_tick: F,
    ) -> Result<TimerHandle, SchedulerError>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let mut timers = self.timers.lock();
        if timers.contains_key(id) {
            return Err(SchedulerError::AlreadyRegistered(id.to_string()));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let registry = Arc::clone(&self.timers);
        let key = id.to_string();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel_rx.changed() => return,
                    _ = interval.tick() => {
                        if *cancel_rx.borrow() {
                            return;
                        }
                        if on_tick().is_break() {
                            break;
                        }
                    }
                }
            }
            // Finished on its own: deregister unless replaced meanwhile
            let mut timers = registry.lock();
            if timers.get(&key).map(|entry| entry.generation) == Some(generation) {
                timers.remove(&key);
                log::debug!("Sync: timer for {} finished", key);
            }
        });

        timers.insert(
            id.to_string(),
            TimerEntry {
                generation,
                cancel: cancel_tx,
                _task: task,
            },
        );
        log::debug!("Sync: timer registered for {}", id);
        Ok(TimerHandle {
            id: id.to_string(),
            generation,
        })
    }

    /// Stop the timer for `id`. Unknown ids are ignored.
    pub fn cancel(&self, id: &str) {
        if let Some(entry) = self.timers.lock().remove(id) {
            let _ = entry.cancel.send(true);
            log::debug!("Sync: timer cancelled for {}", id);
        }
    }

    /// Stop every timer. Safe to call repeatedly.
    pub fn cancel_all(&self) {
        let drained: Vec<(String, TimerEntry)> = self.timers.lock().drain().collect();
        for (id, entry) in drained {
            let _ = entry.cancel.send(true);
            log::debug!("Sync: timer cancelled for {}", id);
        }
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.timers.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.timers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>, stop_after: usize) -> impl FnMut() -> ControlFlow<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= stop_after {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate_then_periodic() {
        let scheduler = TimerScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("a", Duration::from_secs(1), counting(&counter, usize::MAX))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        scheduler.cancel_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_registration_is_rejected() {
        let scheduler = TimerScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("a", Duration::from_secs(1), counting(&counter, usize::MAX))
            .unwrap();
        let err = scheduler
            .register("a", Duration::from_secs(1), counting(&counter, usize::MAX))
            .unwrap_err();
        assert_eq!(err, SchedulerError::AlreadyRegistered("a".to_string()));

        scheduler.cancel("a");
        assert!(!scheduler.is_registered("a"));
        assert!(scheduler
            .register("a", Duration::from_secs(1), counting(&counter, usize::MAX))
            .is_ok());
        scheduler.cancel_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_further_ticks() {
        let scheduler = TimerScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("a", Duration::from_secs(1), counting(&counter, usize::MAX))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let seen = counter.load(Ordering::SeqCst);
        assert_eq!(seen, 2);

        scheduler.cancel("a");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_deregisters() {
        let scheduler = TimerScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("a", Duration::from_secs(1), counting(&counter, 3))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(!scheduler.is_registered("a"));
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unknown_and_cancel_all_are_noops() {
        let scheduler = TimerScheduler::new();
        scheduler.cancel("missing");
        scheduler.cancel_all();
        scheduler.cancel_all();
        assert!(scheduler.is_empty());
    }
}
