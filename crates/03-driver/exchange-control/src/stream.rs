//! Byte-stream transport for the control protocol.
//!
//! [`serve_stream`] drives one [`ControlEndpoint`] from a connected stream
//! until the peer hangs up. [`ControlClient`] is the matching consumer side.

use std::io::{Read, Write};
use std::sync::Arc;

use exchange::{ExchangeError, ExchangeSession, MessageHeader};
use tracing::{debug, trace, warn};

use crate::codec::{decode_op, decode_reply, encode_op, encode_reply, read_frame, write_frame};
use crate::endpoint::ControlEndpoint;
use crate::error::{ControlError, ControlResult};
use crate::op::{ControlOp, ControlReply, ResultCode};

/// Serves one consumer connection.
///
/// A malformed request is answered with `Status(Fail)` and the connection
/// stays up. Returns once the peer closes the stream; the gate held by the
/// connection is released on the way out.
pub fn serve_stream<S: Read + Write>(session: Arc<ExchangeSession>, mut stream: S) -> ControlResult<()> {
    let mut endpoint = ControlEndpoint::new(session);
    while let Some(frame) = read_frame(&mut stream)? {
        let reply = match decode_op(&frame) {
            Ok(op) => {
                trace!(op = op.name(), "control request");
                endpoint.handle(op)
            }
            Err(err) => {
                warn!(tag = frame.tag, %err, "rejecting control request");
                ControlReply::Status(ResultCode::Fail)
            }
        };
        write_frame(&mut stream, &encode_reply(&reply)?)?;
    }
    debug!(open = endpoint.is_open(), "control peer hung up");
    Ok(())
}

/// Consumer side of a control connection.
#[derive(Debug)]
pub struct ControlClient<S> {
    stream: S,
}

impl<S: Read + Write> ControlClient<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub fn open(&mut self) -> ControlResult<()> {
        let reply = self.call(&ControlOp::Open)?;
        expect_success("open", reply)
    }

    pub fn close(&mut self) -> ControlResult<()> {
        let reply = self.call(&ControlOp::Close)?;
        expect_success("close", reply)
    }

    pub fn fetch(&mut self) -> ControlResult<MessageHeader> {
        match self.call(&ControlOp::Fetch)? {
            ControlReply::Header(header) => Ok(header),
            other => Err(reply_error("fetch", other)),
        }
    }

    /// Reads up to `buf.len()` bytes, clamped to what the frame can carry.
    pub fn read(&mut self, buf: &mut [u8]) -> ControlResult<usize> {
        let len = u16::try_from(buf.len()).unwrap_or(u16::MAX);
        match self.call(&ControlOp::Read { len })? {
            ControlReply::Data(bytes) if bytes.len() <= buf.len() => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
            other => Err(reply_error("read", other)),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> ControlResult<usize> {
        let len = bytes.len().min(usize::from(u16::MAX));
        match self.call(&ControlOp::Write(bytes[..len].to_vec()))? {
            ControlReply::Written(n) => Ok(usize::from(n)),
            other => Err(reply_error("write", other)),
        }
    }

    pub fn commit(&mut self) -> ControlResult<()> {
        let reply = self.call(&ControlOp::Commit)?;
        expect_success("commit", reply)
    }

    pub fn nack(&mut self, status: u16) -> ControlResult<()> {
        let reply = self.call(&ControlOp::Nack { status })?;
        expect_success("nack", reply)
    }

    fn call(&mut self, op: &ControlOp) -> ControlResult<ControlReply> {
        write_frame(&mut self.stream, &encode_op(op)?)?;
        let frame = read_frame(&mut self.stream)?.ok_or_else(|| {
            ControlError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "control server closed the connection",
            ))
        })?;
        decode_reply(&frame)
    }
}

fn expect_success(request: &'static str, reply: ControlReply) -> ControlResult<()> {
    match reply {
        ControlReply::Status(ResultCode::Success) => Ok(()),
        other => Err(reply_error(request, other)),
    }
}

fn reply_error(request: &'static str, reply: ControlReply) -> ControlError {
    match reply {
        ControlReply::Status(ResultCode::NoConsumer) => ExchangeError::SourceNotRegistered.into(),
        ControlReply::Status(ResultCode::NoMessage) => ExchangeError::NoMessage.into(),
        ControlReply::Status(ResultCode::Fail) => ControlError::Rejected,
        ControlReply::Busy => ExchangeError::Busy.into(),
        ControlReply::NotOpen => ExchangeError::NoConsumer.into(),
        ControlReply::Mismatch(active) => ExchangeError::DirectionMismatch { active }.into(),
        other => ControlError::UnexpectedReply {
            request,
            reply: format!("{other:?}"),
        },
    }
}
