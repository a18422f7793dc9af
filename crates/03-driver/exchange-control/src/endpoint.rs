//! Per-connection dispatcher from [`ControlOp`] to the exchange session.

use std::sync::Arc;

use exchange::{ConsumerHandle, ExchangeError, ExchangeSession};
use tracing::debug;

use crate::op::{ControlOp, ControlReply, ResultCode};

/// Dispatches requests for one consumer connection.
///
/// The connection holds the gate from `Open` until `Close` or until the
/// endpoint is dropped.
pub struct ControlEndpoint {
    session: Arc<ExchangeSession>,
    consumer: Option<ConsumerHandle>,
}

impl ControlEndpoint {
    pub fn new(session: Arc<ExchangeSession>) -> Self {
        Self {
            session,
            consumer: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.consumer.as_ref().is_some_and(ConsumerHandle::is_open)
    }

    pub fn handle(&mut self, op: ControlOp) -> ControlReply {
        match op {
            ControlOp::Open => self.open(),
            ControlOp::Close => {
                if self.consumer.take().is_some() {
                    debug!("control connection closed the gate");
                }
                ControlReply::Status(ResultCode::Success)
            }
            ControlOp::Fetch => self.with_consumer(|consumer| match consumer.fetch() {
                Ok(header) => ControlReply::Header(header),
                Err(err) => reply_for(err),
            }),
            ControlOp::Read { len } => self.with_consumer(|consumer| {
                let mut buf = vec![0u8; usize::from(len)];
                match consumer.read(&mut buf) {
                    Ok(n) => {
                        buf.truncate(n);
                        ControlReply::Data(buf)
                    }
                    Err(err) => reply_for(err),
                }
            }),
            ControlOp::Write(bytes) => self.with_consumer(|consumer| match consumer.write(&bytes) {
                // Request bodies are capped at u16::MAX by the frame header.
                Ok(n) => ControlReply::Written(u16::try_from(n).unwrap_or(u16::MAX)),
                Err(err) => reply_for(err),
            }),
            ControlOp::Commit => self.with_consumer(|consumer| match consumer.commit() {
                Ok(()) => ControlReply::Status(ResultCode::Success),
                Err(err) => reply_for(err),
            }),
            ControlOp::Nack { status } => {
                self.with_consumer(|consumer| match consumer.nack(status) {
                    Ok(()) => ControlReply::Status(ResultCode::Success),
                    Err(err) => reply_for(err),
                })
            }
        }
    }

    fn open(&mut self) -> ControlReply {
        if self.is_open() {
            return ControlReply::Busy;
        }
        match self.session.open_consumer() {
            Ok(consumer) => {
                self.consumer = Some(consumer);
                ControlReply::Status(ResultCode::Success)
            }
            Err(err) => reply_for(err),
        }
    }

    fn with_consumer(&self, f: impl FnOnce(&ConsumerHandle) -> ControlReply) -> ControlReply {
        match &self.consumer {
            Some(consumer) => f(consumer),
            None => ControlReply::NotOpen,
        }
    }
}

fn reply_for(err: ExchangeError) -> ControlReply {
    match err {
        ExchangeError::Busy => ControlReply::Busy,
        ExchangeError::NoConsumer => ControlReply::NotOpen,
        ExchangeError::SourceNotRegistered => ControlReply::Status(ResultCode::NoConsumer),
        ExchangeError::NoMessage => ControlReply::Status(ResultCode::NoMessage),
        ExchangeError::DirectionMismatch { active } => ControlReply::Mismatch(active),
        ExchangeError::SourceAlreadyRegistered
        | ExchangeError::TimedOut { .. }
        | ExchangeError::Nack { .. }
        | ExchangeError::PayloadTooLarge { .. } => ControlReply::Status(ResultCode::Fail),
    }
}
