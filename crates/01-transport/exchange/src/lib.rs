//! Single-slot message exchange between a bus master and one consumer.
//!
//! A transaction source hands one [`Message`] at a time to the session and
//! parks until the consumer commits it or the timeout passes. The consumer
//! side polls for the pending message, moves its payload through chunked
//! transfers and commits.
//!
//! * [`ExchangeSession`] – the shared state: slot, consumer gate and source registration.
//! * [`TransactionRunner`] – the registered source; runs fail-fast batches.
//! * [`ConsumerHandle`] – the single open consumer; closes the gate on drop.
//! * [`ExchangeError`] – every failure is a value, none of them fatal.

mod config;
mod error;
mod gate;
mod handle;
mod message;
mod metrics;
mod runner;
mod session;
mod signal;
mod slot;

pub use config::{ExchangeConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
pub use error::{ExchangeError, ExchangeResult};
pub use handle::ConsumerHandle;
pub use message::{Message, MessageFlags, MessageHeader};
pub use metrics::ExchangeMetricsSnapshot;
pub use runner::{BatchError, TransactionRunner};
pub use session::ExchangeSession;
pub use slot::{Direction, Transfer};
