//! Completion signal used to park the submitting thread.
//!
//! The flag lives inside the session state and is only touched under the
//! session mutex; the condvar is paired with that same mutex. A completion
//! fired before the waiter parks stays recorded until the next `reinit`.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, MutexGuard};

/// Result of waiting on a completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WaitResult {
    /// The completion fired.
    Ok,
    /// The deadline passed before the completion fired.
    TimedOut,
}

/// Fired/unfired state guarded by the session mutex.
#[derive(Debug, Default)]
pub(crate) struct CompletionFlag {
    done: bool,
}

impl CompletionFlag {
    pub(crate) fn reinit(&mut self) {
        self.done = false;
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }
}

/// Single-waiter wake primitive.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    cv: Condvar,
}

impl Completion {
    pub(crate) fn complete(&self, flag: &mut CompletionFlag) {
        flag.done = true;
        self.cv.notify_one();
    }

    /// Parks until `is_done` reports true or `timeout` elapses.
    ///
    /// The guard is released while parked and held again on return, so the
    /// caller observes the final state without a gap.
    pub(crate) fn wait_timeout<T>(
        &self,
        guard: &mut MutexGuard<'_, T>,
        timeout: Duration,
        is_done: impl Fn(&T) -> bool,
    ) -> WaitResult {
        let deadline = Instant::now().checked_add(timeout);
        while !is_done(&**guard) {
            match deadline {
                Some(deadline) => {
                    if self.cv.wait_until(guard, deadline).timed_out() {
                        return if is_done(&**guard) {
                            WaitResult::Ok
                        } else {
                            WaitResult::TimedOut
                        };
                    }
                }
                None => self.cv.wait(guard),
            }
        }
        WaitResult::Ok
    }
}
