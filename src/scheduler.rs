//! Per-room countdown timers and one-shot delayed actions.
//!
//! Each room holds at most one countdown. A countdown ticks once per
//! wall-clock second carrying the post-decrement remaining value
//! (`d-1, d-2, …, 0`) and then runs its completion callback exactly once.
//! Cancellation wins any race with the final tick: an aborted task never
//! reaches its completion callback.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::{task::JoinHandle, time};
use tracing::debug;

/// Invoked on every tick with the remaining seconds.
pub type TickFn = Box<dyn Fn(u64) -> BoxFuture<'static, ()> + Send + Sync>;
/// Invoked once when the countdown reaches zero.
pub type CompleteFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;
/// Invoked by a one-shot delayed action.
pub type DelayedFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct Countdown {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    countdowns: DashMap<String, Countdown>,
    delayed: DashMap<String, Vec<JoinHandle<()>>>,
    generations: AtomicU64,
}

/// Shared handle to the per-room scheduling facility.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a countdown on the room, preempting any countdown already
    /// running there. A zero duration arms nothing and fires no callback.
    pub fn start_countdown(
        &self,
        room_id: &str,
        duration_secs: u64,
        on_tick: TickFn,
        on_complete: CompleteFn,
    ) {
        self.cancel_countdown(room_id);
        if duration_secs == 0 {
            return;
        }

        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let inner = self.inner.clone();
        let room = room_id.to_string();
        let task_room = room.clone();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(time::Duration::from_secs(1));
            interval.tick().await; // completes immediately
            let mut remaining = duration_secs;
            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;
                on_tick(remaining).await;
            }
            // Deregister before completing so a completion handler arming the
            // next phase's countdown is not clobbered by our own bookkeeping.
            inner
                .countdowns
                .remove_if(&task_room, |_, countdown| countdown.generation == generation);
            on_complete().await;
        });

        self.inner
            .countdowns
            .insert(room, Countdown { generation, handle });
    }

    /// Idempotently cancel the room's countdown. Remaining ticks and the
    /// completion callback are suppressed.
    pub fn cancel_countdown(&self, room_id: &str) {
        if let Some((_, countdown)) = self.inner.countdowns.remove(room_id) {
            countdown.handle.abort();
            debug!(%room_id, "countdown cancelled");
        }
    }

    /// Run an action after a delay, independently of any countdown on the
    /// room.
    pub fn schedule_delayed(&self, room_id: &str, delay: time::Duration, action: DelayedFn) {
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            action().await;
        });
        let mut pending = self.inner.delayed.entry(room_id.to_string()).or_default();
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    /// Cancel everything scheduled for the room and release its slots.
    pub fn cleanup(&self, room_id: &str) {
        self.cancel_countdown(room_id);
        if let Some((_, pending)) = self.inner.delayed.remove(room_id) {
            for handle in pending {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, Arc<Mutex<bool>>) {
        (
            Arc::new(Mutex::new(Vec::new())),
            Arc::new(Mutex::new(false)),
        )
    }

    fn tick_into(ticks: Arc<Mutex<Vec<u64>>>) -> TickFn {
        Box::new(move |remaining| {
            let ticks = ticks.clone();
            Box::pin(async move {
                ticks.lock().unwrap().push(remaining);
            })
        })
    }

    fn complete_into(done: Arc<Mutex<bool>>) -> CompleteFn {
        Box::new(move || {
            Box::pin(async move {
                *done.lock().unwrap() = true;
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_are_post_decrement_then_complete_once() {
        let scheduler = Scheduler::new();
        let (ticks, done) = recorder();

        scheduler.start_countdown("R1", 3, tick_into(ticks.clone()), complete_into(done.clone()));
        time::sleep(time::Duration::from_secs(5)).await;

        assert_eq!(*ticks.lock().unwrap(), vec![2, 1, 0]);
        assert!(*done.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_remaining_ticks_and_completion() {
        let scheduler = Scheduler::new();
        let (ticks, done) = recorder();

        scheduler.start_countdown("R1", 5, tick_into(ticks.clone()), complete_into(done.clone()));
        time::sleep(time::Duration::from_millis(2_500)).await;
        scheduler.cancel_countdown("R1");
        time::sleep(time::Duration::from_secs(10)).await;

        assert_eq!(*ticks.lock().unwrap(), vec![4, 3]);
        assert!(!*done.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_preempts_previous_countdown() {
        let scheduler = Scheduler::new();
        let (first_ticks, first_done) = recorder();
        let (second_ticks, second_done) = recorder();

        scheduler.start_countdown(
            "R1",
            10,
            tick_into(first_ticks.clone()),
            complete_into(first_done.clone()),
        );
        time::sleep(time::Duration::from_millis(1_500)).await;
        scheduler.start_countdown(
            "R1",
            2,
            tick_into(second_ticks.clone()),
            complete_into(second_done.clone()),
        );
        time::sleep(time::Duration::from_secs(5)).await;

        assert_eq!(*first_ticks.lock().unwrap(), vec![9]);
        assert!(!*first_done.lock().unwrap());
        assert_eq!(*second_ticks.lock().unwrap(), vec![1, 0]);
        assert!(*second_done.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_fires_nothing() {
        let scheduler = Scheduler::new();
        let (ticks, done) = recorder();

        scheduler.start_countdown("R1", 0, tick_into(ticks.clone()), complete_into(done.clone()));
        time::sleep(time::Duration::from_secs(3)).await;

        assert!(ticks.lock().unwrap().is_empty());
        assert!(!*done.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_action_runs_independently_of_countdown() {
        let scheduler = Scheduler::new();
        let (ticks, done) = recorder();
        let fired = Arc::new(Mutex::new(false));
        let fired_clone = fired.clone();

        scheduler.start_countdown("R1", 5, tick_into(ticks.clone()), complete_into(done.clone()));
        scheduler.schedule_delayed(
            "R1",
            time::Duration::from_secs(2),
            Box::new(move || {
                Box::pin(async move {
                    *fired_clone.lock().unwrap() = true;
                })
            }),
        );
        time::sleep(time::Duration::from_secs(3)).await;

        assert!(*fired.lock().unwrap());
        assert!(!*done.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_aborts_delayed_actions() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(Mutex::new(false));
        let fired_clone = fired.clone();

        scheduler.schedule_delayed(
            "R1",
            time::Duration::from_secs(2),
            Box::new(move || {
                Box::pin(async move {
                    *fired_clone.lock().unwrap() = true;
                })
            }),
        );
        scheduler.cleanup("R1");
        time::sleep(time::Duration::from_secs(5)).await;

        assert!(!*fired.lock().unwrap());
    }
}
