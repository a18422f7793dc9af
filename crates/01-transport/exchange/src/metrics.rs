use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{ExchangeError, ExchangeResult};

/// Per-session submission counters.
#[derive(Default)]
pub(crate) struct ExchangeMetrics {
    completed: AtomicU32,
    nacked: AtomicU32,
    timed_out: AtomicU32,
    no_consumer: AtomicU32,
    busy: AtomicU32,
}

impl ExchangeMetrics {
    pub(crate) fn record(&self, outcome: &ExchangeResult<()>) {
        let counter = match outcome {
            Ok(()) => &self.completed,
            Err(ExchangeError::Nack { .. }) => &self.nacked,
            Err(ExchangeError::TimedOut { .. }) => &self.timed_out,
            Err(ExchangeError::NoConsumer) => &self.no_consumer,
            Err(ExchangeError::Busy) => &self.busy,
            Err(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ExchangeMetricsSnapshot {
        ExchangeMetricsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            no_consumer: self.no_consumer.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExchangeMetricsSnapshot {
    pub completed: u32,
    pub nacked: u32,
    pub timed_out: u32,
    pub no_consumer: u32,
    pub busy: u32,
}

impl ExchangeMetricsSnapshot {
    /// Total recorded outcomes. Widened so the sum cannot overflow.
    pub fn submitted(&self) -> u64 {
        [
            self.completed,
            self.nacked,
            self.timed_out,
            self.no_consumer,
            self.busy,
        ]
        .into_iter()
        .map(u64::from)
        .sum()
    }
}
