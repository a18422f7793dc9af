//! Consumer-side servicing for an exchange session.
//!
//! A [`ConsumerLoop`] polls a [`ConsumerPort`] (an in-process
//! [`exchange::ConsumerHandle`] or a remote [`exchange_control::ControlClient`])
//! and lets a [`Responder`] decide each message. [`RegisterFile`] is the
//! bundled device model.

mod consumer_loop;
mod error;
mod port;
mod register_file;

pub use consumer_loop::{ConsumerLoop, LoopConfig, LoopStats, Reply, Responder, Step, DEFAULT_CHUNK_LEN};
pub use error::{ResponderError, ResponderResult};
pub use port::ConsumerPort;
pub use register_file::{RegisterFile, ADDRESS_NAK_STATUS, REGISTER_COUNT};
