//! A4: cooperative timers with the four verbs named in the concurrency
//! model (§5) — START, STOP, RESET, IMMEDIATE.
//!
//! Rather than spawning a dedicated `tokio` task per timer, expiry is
//! observed by polling a stored deadline from the owning module's own
//! poll tick (the same pattern the reference crate uses for dial
//! backoff: `next_redial_at` is a plain `Instant` checked against `now`
//! on every wake, not a spawned sleep). That keeps cancellation trivial
//! (drop the deadline, no task to abort) and matches the single
//! cooperative task model: nothing here ever runs concurrently with the
//! poll loop that checks it.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Timer { deadline: None }
    }

    /// START: arms the timer `delay` from now.
    pub fn start(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    /// RESET: re-arms with a new delay, discarding any previous deadline.
    pub fn reset(&mut self, delay: Duration) {
        self.start(delay);
    }

    /// STOP: disarms. Idempotent.
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` at most once per arm: if `now` has passed the
    /// deadline, disarms and reports expiry. Callers that need a
    /// periodic timer re-`start` it from inside their own callback.
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// IMMEDIATE: callers that want synchronous invocation skip arming
/// entirely and call their handler directly; this helper documents that
/// intent at call sites instead of threading a fake "already expired"
/// deadline through `Timer`.
pub fn fire_immediate<F: FnOnce()>(timer: &mut Timer, handler: F) {
    timer.stop();
    handler();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_armed_never_expires() {
        let mut t = Timer::new();
        assert!(!t.is_armed());
        assert!(!t.poll_expired(Instant::now()));
    }

    #[test]
    fn expires_once_past_deadline() {
        let mut t = Timer::new();
        t.start(Duration::from_millis(0));
        let later = Instant::now() + Duration::from_millis(1);
        assert!(t.poll_expired(later));
        assert!(!t.is_armed());
        assert!(!t.poll_expired(later));
    }

    #[test]
    fn stop_disarms() {
        let mut t = Timer::new();
        t.start(Duration::from_secs(10));
        t.stop();
        assert!(!t.is_armed());
    }

    #[test]
    fn reset_replaces_deadline() {
        let mut t = Timer::new();
        t.start(Duration::from_millis(0));
        let past = Instant::now();
        t.reset(Duration::from_secs(10));
        assert!(!t.poll_expired(past));
        assert!(t.is_armed());
    }
}
