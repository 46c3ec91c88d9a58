//! TimeoutGuard: a single disarmable deadline timer.
//!
//! The guard runs one Tokio task per `arm` call.  The task sleeps until the
//! deadline and then invokes the `on_timeout` callback, unless the guard was
//! disarmed (or re-armed) in the meantime.
//!
//! # Why an epoch counter?
//!
//! `JoinHandle::abort` only takes effect at the task's next `.await`.  A timer
//! task that has already woken up may therefore still run after `disarm`
//! returned.  Each arm gets a fresh epoch number and the task checks, under
//! the lock, that its epoch is still the armed one before firing.  This makes
//! "disarm happened before fire" and "fire happened before disarm" mutually
//! exclusive, so `on_timeout` runs at most once and never after a successful
//! disarm.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

#[derive(Debug)]
struct Armed {
    epoch: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct GuardState {
    armed: Option<Armed>,
    epoch: u64,
}

/// Deadline timer used by the session controller.
///
/// Disarming is idempotent: disarming a guard that is not armed (never armed,
/// already disarmed, or already fired) is a no-op.
#[derive(Debug, Default)]
pub struct TimeoutGuard {
    state: Arc<Mutex<GuardState>>,
}

impl TimeoutGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the timer.  `on_timeout` runs once after `after` elapses unless
    /// [`disarm`](Self::disarm) is called first.
    ///
    /// Arming an already armed guard replaces the previous timer; the old
    /// callback is dropped without running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(&self, after: Duration, on_timeout: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.state);
        if let Some(previous) = state.armed.take() {
            previous.handle.abort();
        }
        state.epoch = state.epoch.wrapping_add(1);

        let epoch = state.epoch;
        let deadline = Instant::now() + after;
        let shared = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            time::sleep_until(deadline).await;
            let owns_timer = {
                let mut state = lock(&shared);
                match state.armed.as_ref() {
                    Some(armed) if armed.epoch == epoch => {
                        state.armed = None;
                        true
                    }
                    _ => false,
                }
            };
            if owns_timer {
                debug!(?after, "deadline elapsed");
                on_timeout();
            }
        });

        state.armed = Some(Armed {
            epoch,
            deadline,
            handle,
        });
    }

    /// Stops the timer.  Returns `true` if this call prevented a pending fire.
    pub fn disarm(&self) -> bool {
        match lock(&self.state).armed.take() {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn is_armed(&self) -> bool {
        lock(&self.state).armed.is_some()
    }

    /// Time left until the deadline, for countdown display.  `None` when not
    /// armed.
    pub fn remaining(&self) -> Option<Duration> {
        lock(&self.state)
            .armed
            .as_ref()
            .map(|armed| armed.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}

// A panic inside `on_timeout` runs outside the lock, so poisoning can only come
// from a panic in this module's own short critical sections; recover the data.
fn lock(state: &Mutex<GuardState>) -> MutexGuard<'_, GuardState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_deadline() {
        // Arrange
        let guard = TimeoutGuard::new();
        let (count, on_timeout) = counter();

        // Act
        guard.arm(Duration::from_secs(30), on_timeout);
        time::sleep(Duration::from_secs(29)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_secs(2)).await;

        // Assert
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!guard.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_before_deadline_prevents_fire() {
        let guard = TimeoutGuard::new();
        let (count, on_timeout) = counter();

        guard.arm(Duration::from_secs(30), on_timeout);
        time::sleep(Duration::from_secs(10)).await;
        assert!(guard.disarm());
        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!guard.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_disarm_is_a_no_op() {
        let guard = TimeoutGuard::new();
        let (_count, on_timeout) = counter();
        guard.arm(Duration::from_secs(30), on_timeout);

        assert!(guard.disarm());
        assert!(!guard.disarm());
        assert!(!guard.disarm());
    }

    #[test]
    fn test_disarm_on_never_armed_guard_is_a_no_op() {
        let guard = TimeoutGuard::new();
        assert!(!guard.disarm());
        assert_eq!(guard.remaining(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_after_fire_is_a_no_op() {
        let guard = TimeoutGuard::new();
        let (count, on_timeout) = counter();
        guard.arm(Duration::from_millis(100), on_timeout);
        time::sleep(Duration::from_millis(200)).await;

        assert!(!guard.disarm());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let guard = TimeoutGuard::new();
        let (_count, on_timeout) = counter();
        guard.arm(Duration::from_secs(30), on_timeout);

        assert_eq!(guard.remaining(), Some(Duration::from_secs(30)));
        time::sleep(Duration::from_secs(12)).await;
        assert_eq!(guard.remaining(), Some(Duration::from_secs(18)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let guard = TimeoutGuard::new();
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();

        guard.arm(Duration::from_secs(5), first_cb);
        guard.arm(Duration::from_secs(10), second_cb);
        time::sleep(Duration::from_secs(11)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_guard_cancels_timer() {
        let (count, on_timeout) = counter();
        {
            let guard = TimeoutGuard::new();
            guard.arm(Duration::from_secs(1), on_timeout);
        }
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
