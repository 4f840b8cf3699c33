//! One-shot signals used as cross-stream barriers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::super::error::{Error, ErrorKind, Result};

/// A one-shot barrier.
///
/// An event moves from *pending* to *signaled* exactly once per recording; once signaled, waits
/// return immediately and idempotently. Recording an already-signaled event on a stream is legal
/// and resets it to pending before the signal closure is enqueued.
///
/// An event recorded on a stream that is (or becomes) poisoned is *failed* instead of signaled,
/// so waiting on it surfaces the original stream failure rather than hanging.
#[derive(Clone)]
pub struct Event {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    signal: Condvar,
}

enum State {
    Pending,
    Signaled(Instant),
    Failed(ErrorKind),
}

impl Event {

    pub fn new() -> Event {
        Event {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending),
                signal: Condvar::new(),
            })
        }
    }

    /// Returns `true` once the event has signaled.
    pub fn occurred(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Signaled(..))
    }

    /// The instant the event signaled, if it has.
    pub fn signaled_at(&self) -> Option<Instant> {
        match *self.inner.state.lock() {
            State::Signaled(at) => Some(at),
            _ => None,
        }
    }

    /// Blocks until the event signals, failing with `TimedOut` when the deadline passes first.
    ///
    /// Waiting on an event that is never recorded blocks until it is recorded or the deadline
    /// passes. `None` means wait forever by policy.
    pub fn wait(&self, timeout: Option<Duration>) -> Result {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.inner.state.lock();

        loop {
            match *state {
                State::Signaled(..) => return Ok(()),
                State::Failed(kind) =>
                    return Err(Error::new(kind, "the recording stream was poisoned")),
                State::Pending => { }
            }

            match deadline {
                Some(at) => {
                    if self.inner.signal.wait_until(&mut state, at).timed_out() {
                        return match *state {
                            State::Signaled(..) => Ok(()),
                            State::Failed(kind) =>
                                Err(Error::new(kind, "the recording stream was poisoned")),
                            State::Pending => Err(ErrorKind::TimedOut.into()),
                        };
                    }
                }
                _ => self.inner.signal.wait(&mut state),
            }
        }
    }

    /// The interval between `earlier` signaling and `self` signaling.
    ///
    /// Fails unless both events have signaled.
    pub fn elapsed_since(&self, earlier: &Event) -> Result<Duration> {
        match (self.signaled_at(), earlier.signaled_at()) {
            (Some(this), Some(that)) => Ok(this.saturating_duration_since(that)),
            _ => Err(Error::new(ErrorKind::Other, "both events must have signaled")),
        }
    }

    pub(crate) fn reset(&self) {
        *self.inner.state.lock() = State::Pending;
    }

    pub(crate) fn complete(&self) {
        let mut state = self.inner.state.lock();
        *state = State::Signaled(Instant::now());
        self.inner.signal.notify_all();
    }

    pub(crate) fn fail(&self, kind: ErrorKind) {
        let mut state = self.inner.state.lock();
        *state = State::Failed(kind);
        self.inner.signal.notify_all();
    }
}

impl Default for Event {

    fn default() -> Event {
        Event::new()
    }
}

impl std::fmt::Debug for Event {

    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let state = match *self.inner.state.lock() {
            State::Pending => "pending",
            State::Signaled(..) => "signaled",
            State::Failed(..) => "failed",
        };
        write!(f, "Event({})", state)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;
    use super::super::super::error::ErrorKind;
    use super::Event;

    #[test]
    fn it_returns_immediately_once_signaled() {
        let event = Event::new();
        event.complete();
        assert!(event.occurred());
        assert!(event.wait(None).is_ok());
        assert!(event.wait(Some(Duration::from_millis(1))).is_ok());
    }

    #[test]
    fn it_times_out_when_never_recorded() {
        let event = Event::new();
        let result = event.wait(Some(Duration::from_millis(10)));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn it_measures_the_interval_between_signals() {
        let earlier = Event::new();
        let later = Event::new();
        earlier.complete();
        later.complete();
        assert!(later.elapsed_since(&earlier).is_ok());
        assert!(Event::new().elapsed_since(&earlier).is_err());
    }
}
