//! Error surface for the exchange session.
//!
//! Every failure is returned to the immediate caller as a discriminated
//! result. None of them are fatal: a timeout or a missing consumer simply
//! fails the current submission and the session stays usable.

use std::time::Duration;

use thiserror::Error;

use crate::slot::Direction;

/// Convenience result alias for exchange operations.
pub type ExchangeResult<T, E = ExchangeError> = Result<T, E>;

/// Errors surfaced by the exchange session and its handles.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExchangeError {
    /// The consumer gate is already held, or the slot already carries a message.
    #[error("exchange busy")]
    Busy,

    /// No consumer is connected, so nobody could answer a submission.
    #[error("no consumer connected")]
    NoConsumer,

    /// The producer-side transaction source has not been registered.
    #[error("no transaction source registered")]
    SourceNotRegistered,

    /// A transaction source is already registered with this session.
    #[error("transaction source already registered")]
    SourceAlreadyRegistered,

    /// The operation targeted an empty slot.
    #[error("no message pending")]
    NoMessage,

    /// The consumer never committed within the deadline.
    #[error("consumer did not commit within {timeout:?}")]
    TimedOut { timeout: Duration },

    /// The consumer finished the message with a non-zero status.
    #[error("consumer rejected message with status {status}")]
    Nack { status: u16 },

    /// A transfer burst in the other direction is still in flight.
    #[error("transfer burst already running as {active:?}")]
    DirectionMismatch { active: Direction },

    /// Message payloads are limited by the 16-bit length field.
    #[error("payload of {len} bytes exceeds the 16-bit message length")]
    PayloadTooLarge { len: usize },
}

impl ExchangeError {
    /// Returns true when retrying later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExchangeError::Busy
                | ExchangeError::NoConsumer
                | ExchangeError::SourceNotRegistered
                | ExchangeError::TimedOut { .. }
        )
    }
}
