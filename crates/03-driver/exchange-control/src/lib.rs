//! Control surface for an [`exchange::ExchangeSession`].
//!
//! Consumers reach the session through [`ControlOp`] requests, either in
//! process via [`ControlEndpoint`] or over any byte stream using the framed
//! codec in [`codec`].

pub mod codec;
mod endpoint;
mod error;
mod op;
mod stream;

pub use endpoint::ControlEndpoint;
pub use error::{ControlError, ControlResult};
pub use op::{ControlOp, ControlReply, ResultCode};
pub use stream::{serve_stream, ControlClient};
