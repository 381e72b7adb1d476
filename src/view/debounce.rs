// src/view/debounce.rs
use std::time::Duration;
use tokio::time::Instant;

/// Trailing-edge debounce over a value. Time is supplied by the caller.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    settled: T,
    pending: Option<(T, Instant)>,
}

impl<T: Clone + PartialEq> Debouncer<T> {
    pub fn new(initial: T, delay: Duration) -> Self {
        Self {
            delay,
            settled: initial,
            pending: None,
        }
    }

    /// Records a new input and restarts the quiet period.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// Settles the pending value once its quiet period has elapsed.
    /// Returns the new value only when it differs from the previous one.
    pub fn poll(&mut self, now: Instant) -> Option<&T> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => {}
            _ => return None,
        }
        let (value, _) = self.pending.take()?;
        if value == self.settled {
            return None;
        }
        self.settled = value;
        Some(&self.settled)
    }

    /// Settles `value` immediately, bypassing the delay.
    pub fn settle_now(&mut self, value: T) -> bool {
        self.pending = None;
        if value == self.settled {
            return false;
        }
        self.settled = value;
        true
    }

    pub fn value(&self) -> &T {
        &self.settled
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }
}
