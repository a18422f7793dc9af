//! The exchange session.
//!
//! One mutex guards the slot, the consumer gate and the source registration.
//! Only [`ExchangeSession::submit`] parks; every consumer-side call takes the
//! lock for its read-modify-write and returns immediately.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, ExchangeResult};
use crate::gate::{ConsumerGate, GateToken};
use crate::message::{Message, MessageHeader};
use crate::metrics::{ExchangeMetrics, ExchangeMetricsSnapshot};
use crate::signal::{Completion, WaitResult};
use crate::slot::{ExchangeSlot, Transfer};

#[derive(Debug, Default)]
struct SessionState {
    slot: ExchangeSlot,
    gate: ConsumerGate,
    source_attached: bool,
}

/// Shared state between one transaction source and one consumer.
pub struct ExchangeSession {
    state: Mutex<SessionState>,
    completion: Completion,
    config: ExchangeConfig,
    metrics: ExchangeMetrics,
}

impl ExchangeSession {
    pub fn new(config: ExchangeConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SessionState::default()),
            completion: Completion::default(),
            config,
            metrics: ExchangeMetrics::default(),
        })
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn metrics(&self) -> ExchangeMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Claims the consumer side. Fails with [`ExchangeError::Busy`] if already held.
    pub fn open(&self) -> ExchangeResult<()> {
        self.open_token().map(|_| ())
    }

    /// Releases the consumer side unconditionally.
    pub fn close(&self) {
        self.state.lock().gate.close();
        debug!("consumer gate closed");
    }

    pub fn is_consumer_open(&self) -> bool {
        self.state.lock().gate.is_open()
    }

    pub(crate) fn open_token(&self) -> ExchangeResult<GateToken> {
        let token = self.state.lock().gate.open()?;
        debug!("consumer gate opened");
        Ok(token)
    }

    pub(crate) fn release(&self, token: GateToken) {
        if self.state.lock().gate.release(token) {
            debug!("consumer gate released");
        }
    }

    pub(crate) fn is_held_by(&self, token: GateToken) -> bool {
        self.state.lock().gate.is_held_by(token)
    }

    /// Marks the producer-side transaction source as present.
    pub fn attach_source(&self) -> ExchangeResult<()> {
        let mut state = self.state.lock();
        if state.source_attached {
            return Err(ExchangeError::SourceAlreadyRegistered);
        }
        state.source_attached = true;
        Ok(())
    }

    pub fn detach_source(&self) {
        self.state.lock().source_attached = false;
    }

    pub fn is_source_attached(&self) -> bool {
        self.state.lock().source_attached
    }

    /// Hands `msg` to the consumer and parks until it commits or `timeout` elapses.
    ///
    /// The payload buffer is owned by the slot during the exchange and is back
    /// in `msg` when this returns, whatever the outcome. For read messages it
    /// then holds whatever the consumer wrote.
    pub fn submit(&self, msg: &mut Message, timeout: Duration) -> ExchangeResult<()> {
        let outcome = self.exchange(msg, timeout);
        self.metrics.record(&outcome);
        outcome
    }

    fn exchange(&self, msg: &mut Message, timeout: Duration) -> ExchangeResult<()> {
        let mut state = self.state.lock();
        if !state.gate.is_open() {
            return Err(ExchangeError::NoConsumer);
        }
        if state.slot.is_occupied() {
            warn!("submit raced an outstanding message");
            return Err(ExchangeError::Busy);
        }

        let header = msg.header();
        state.slot.publish(header, msg.take_payload());
        trace!(%header, "message published");

        let waited = self
            .completion
            .wait_timeout(&mut state, timeout, |state| state.slot.is_completed());

        let status = state.slot.status();
        if let Some(payload) = state.slot.reclaim() {
            msg.restore_payload(payload);
        }
        drop(state);

        match waited {
            WaitResult::TimedOut => {
                debug!(%header, ?timeout, "transaction timed out");
                Err(ExchangeError::TimedOut { timeout })
            }
            WaitResult::Ok if status == 0 => Ok(()),
            WaitResult::Ok => Err(ExchangeError::Nack { status }),
        }
    }

    /// Returns the header of the message waiting for the consumer. Never blocks.
    pub fn fetch_pending(&self) -> ExchangeResult<MessageHeader> {
        let state = self.state.lock();
        if !state.source_attached {
            return Err(ExchangeError::SourceNotRegistered);
        }
        state.slot.header().ok_or(ExchangeError::NoMessage)
    }

    /// Moves one chunk of payload and returns how many bytes moved.
    ///
    /// Returns `Ok(0)` when nothing is pending. A burst started in one
    /// direction must finish before the other direction is accepted.
    pub fn transfer_chunk(&self, transfer: Transfer<'_>) -> ExchangeResult<usize> {
        let direction = transfer.direction();
        let moved = self.state.lock().slot.transfer(transfer)?;
        trace!(?direction, moved, "chunk transferred");
        Ok(moved)
    }

    /// Acknowledges the pending message and wakes its submitter.
    pub fn commit(&self) -> ExchangeResult<()> {
        self.finish(0)
    }

    /// Finishes the pending message with a consumer-defined status.
    ///
    /// A zero status is an ordinary commit.
    pub fn nack(&self, status: u16) -> ExchangeResult<()> {
        self.finish(status)
    }

    fn finish(&self, status: u16) -> ExchangeResult<()> {
        let mut state = self.state.lock();
        let flag = state.slot.finish(status)?;
        self.completion.complete(flag);
        Ok(())
    }
}

impl std::fmt::Debug for ExchangeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeSession")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}
