//! Producer-side entry point that drives whole bus transactions.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::error::{ExchangeError, ExchangeResult};
use crate::message::Message;
use crate::session::ExchangeSession;

/// First failing message of a batch.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("message {index} failed: {error}")]
pub struct BatchError {
    pub index: usize,
    #[source]
    pub error: ExchangeError,
}

impl ExchangeSession {
    /// Registers the transaction source. Dropping the runner unregisters it.
    pub fn register_source(self: &Arc<Self>) -> ExchangeResult<TransactionRunner> {
        self.attach_source()?;
        debug!("transaction source registered");
        Ok(TransactionRunner {
            session: Arc::clone(self),
            bus: Mutex::new(()),
        })
    }
}

/// The registered transaction source.
///
/// Batches from different threads are serialized on an internal bus lock, so
/// at most one submission is ever outstanding. A submission borrows the
/// runner, so the source cannot be unregistered while one is parked.
pub struct TransactionRunner {
    session: Arc<ExchangeSession>,
    bus: Mutex<()>,
}

impl TransactionRunner {
    pub fn session(&self) -> &Arc<ExchangeSession> {
        &self.session
    }

    /// Exchanges one message with the configured timeout.
    pub fn submit(&self, msg: &mut Message) -> ExchangeResult<()> {
        self.submit_with_timeout(msg, self.session.config().timeout())
    }

    pub fn submit_with_timeout(&self, msg: &mut Message, timeout: Duration) -> ExchangeResult<()> {
        let _bus = self.bus.lock();
        self.session.submit(msg, timeout)
    }

    /// Exchanges `messages` in order, stopping at the first failure.
    ///
    /// Returns the number of messages exchanged. Messages after the failing
    /// one are never submitted and earlier ones are not rolled back.
    pub fn run_batch(&self, messages: &mut [Message]) -> Result<usize, BatchError> {
        self.run_batch_with_timeout(messages, self.session.config().timeout())
    }

    pub fn run_batch_with_timeout(
        &self,
        messages: &mut [Message],
        timeout: Duration,
    ) -> Result<usize, BatchError> {
        let _bus = self.bus.lock();
        for (index, msg) in messages.iter_mut().enumerate() {
            if let Err(error) = self.session.submit(msg, timeout) {
                debug!(index, %error, "batch abandoned");
                return Err(BatchError { index, error });
            }
        }
        Ok(messages.len())
    }
}

impl Drop for TransactionRunner {
    fn drop(&mut self) {
        self.session.detach_source();
        debug!("transaction source unregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExchangeConfig;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn drop_unregisters_source() {
        let session = ExchangeSession::new(ExchangeConfig::default());
        let runner = session.register_source().unwrap();
        assert!(session.register_source().is_err());
        drop(runner);
        assert!(!session.is_source_attached());
        session.register_source().unwrap();
    }

    #[test]
    fn empty_batch_succeeds_without_consumer() {
        let session = ExchangeSession::new(ExchangeConfig::default());
        let runner = session.register_source().unwrap();
        assert_eq!(runner.run_batch(&mut []), Ok(0));
    }

    #[test]
    fn batch_stops_at_first_failure() {
        let session = ExchangeSession::new(ExchangeConfig::default());
        let runner = session.register_source().unwrap();
        let consumer = session.open_consumer().unwrap();

        let worker = thread::spawn(move || {
            let mut served = 0;
            let deadline = Instant::now() + Duration::from_secs(5);
            while served < 1 && Instant::now() < deadline {
                if consumer.fetch().is_ok() {
                    consumer.commit().unwrap();
                    served += 1;
                }
            }
            // Keep the gate held, answer nothing else.
            thread::sleep(Duration::from_millis(200));
            served
        });

        let mut batch = vec![
            Message::write(0x50, vec![1]).unwrap(),
            Message::write(0x50, vec![2]).unwrap(),
            Message::write(0x50, vec![3]).unwrap(),
        ];
        let err = runner
            .run_batch_with_timeout(&mut batch, Duration::from_millis(50))
            .unwrap_err();
        assert_eq!(err.index, 1);
        assert!(matches!(err.error, ExchangeError::TimedOut { .. }));
        assert_eq!(worker.join().unwrap(), 1);

        let metrics = session.metrics();
        assert_eq!(metrics.completed, 1);
        assert_eq!(metrics.timed_out, 1);
        assert_eq!(metrics.submitted(), 2, "third message never submitted");
    }
}
