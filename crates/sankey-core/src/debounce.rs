use std::time::{Duration, Instant};

/// Trailing-edge debouncer driven by explicit timestamps.
///
/// A pushed value becomes available once `window` has passed without another
/// push; each push replaces the pending value and restarts the window.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<T>,
    last_push: Option<Instant>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            last_push: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.last_push = Some(now);
    }

    /// Takes the pending value if its window has elapsed by `now`.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let last = self.last_push?;
        if now.duration_since(last) < self.window {
            return None;
        }
        self.last_push = None;
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value will be released, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_push.map(|last| last + self.window)
    }
}
