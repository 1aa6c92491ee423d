//! Debounced operations
//!
//! A debounce site owns at most one pending operation. Triggering it again
//! replaces the pending payload and pushes the deadline out; nothing is ever
//! queued. The owner polls with the current time and runs whatever comes out.

use std::time::Duration;

#[derive(Debug, Clone)]
struct Pending<T> {
    payload: T,
    deadline: Duration,
}

/// Single pending operation plus its deadline
///
/// # Example
///
/// ```
/// use pdf_annotator_scheduler::Debounce;
/// use std::time::Duration;
///
/// let mut nudge = Debounce::new(Duration::from_millis(1000));
/// nudge.accumulate(Duration::ZERO, |total: Option<i32>| total.unwrap_or(0) + 1);
/// nudge.accumulate(Duration::from_millis(900), |total| total.unwrap_or(0) + 1);
///
/// // The second trigger moved the deadline to 1900ms.
/// assert_eq!(nudge.poll(Duration::from_millis(1500)), None);
/// assert_eq!(nudge.poll(Duration::from_millis(1900)), Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct Debounce<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
}

impl<T> Debounce<T> {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Change the delay. An operation already pending keeps its deadline.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Start the timer with `payload`, replacing any pending operation.
    ///
    /// Returns the payload that was replaced, if any.
    pub fn schedule(&mut self, now: Duration, payload: T) -> Option<T> {
        let previous = self.pending.take().map(|pending| pending.payload);
        self.pending = Some(Pending { payload, deadline: now + self.delay });
        previous
    }

    /// Fold a new trigger into the pending payload and restart the timer.
    pub fn accumulate(&mut self, now: Duration, fold: impl FnOnce(Option<T>) -> T) {
        let previous = self.pending.take().map(|pending| pending.payload);
        self.pending = Some(Pending { payload: fold(previous), deadline: now + self.delay });
    }

    /// Take the payload if its deadline has passed.
    pub fn poll(&mut self, now: Duration) -> Option<T> {
        match &self.pending {
            Some(pending) if now >= pending.deadline => {
                self.pending.take().map(|pending| pending.payload)
            }
            _ => None,
        }
    }

    /// Take the payload now, whatever its deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.payload)
    }

    /// Drop the pending operation without running it.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|pending| &pending.payload)
    }
}
