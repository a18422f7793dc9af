//! Consumer-side operations and their replies.

use exchange::{Direction, MessageHeader};

/// Numeric status codes shared with existing loopback tooling.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultCode {
    Success = 0,
    /// No transaction source behind the device.
    NoConsumer = 1,
    NoMessage = 2,
    /// Malformed request.
    Fail = 3,
}

impl ResultCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ResultCode::Success),
            1 => Some(ResultCode::NoConsumer),
            2 => Some(ResultCode::NoMessage),
            3 => Some(ResultCode::Fail),
            _ => None,
        }
    }
}

/// Requests a consumer connection can issue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlOp {
    /// Claim the consumer gate for this connection.
    Open,
    /// Release the gate held by this connection.
    Close,
    /// Fetch the pending message header.
    Fetch,
    /// Read up to `len` payload bytes.
    Read { len: u16 },
    /// Write bytes into the pending payload.
    Write(Vec<u8>),
    /// Acknowledge the pending message.
    Commit,
    /// Finish the pending message with a non-zero status.
    Nack { status: u16 },
}

impl ControlOp {
    pub fn name(&self) -> &'static str {
        match self {
            ControlOp::Open => "open",
            ControlOp::Close => "close",
            ControlOp::Fetch => "fetch",
            ControlOp::Read { .. } => "read",
            ControlOp::Write(_) => "write",
            ControlOp::Commit => "commit",
            ControlOp::Nack { .. } => "nack",
        }
    }
}

/// Replies sent back for each [`ControlOp`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlReply {
    Status(ResultCode),
    Header(MessageHeader),
    /// Bytes read; empty when nothing is pending.
    Data(Vec<u8>),
    /// Number of bytes accepted by a write.
    Written(u16),
    /// Another connection already holds the gate.
    Busy,
    /// The connection has not opened the gate, or lost it.
    NotOpen,
    /// A burst in the given direction is still in flight.
    Mismatch(Direction),
}
