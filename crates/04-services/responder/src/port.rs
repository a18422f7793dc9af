//! Consumer-side access to an exchange, local or over a control stream.

use std::io::{Read, Write};

use exchange::{ConsumerHandle, MessageHeader};
use exchange_control::ControlClient;

use crate::error::ResponderResult;

/// The operations a consumer needs to service messages.
pub trait ConsumerPort {
    fn fetch(&mut self) -> ResponderResult<MessageHeader>;
    fn read(&mut self, buf: &mut [u8]) -> ResponderResult<usize>;
    fn write(&mut self, buf: &[u8]) -> ResponderResult<usize>;
    fn commit(&mut self) -> ResponderResult<()>;
    fn nack(&mut self, status: u16) -> ResponderResult<()>;
}

impl ConsumerPort for ConsumerHandle {
    fn fetch(&mut self) -> ResponderResult<MessageHeader> {
        Ok(ConsumerHandle::fetch(self)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> ResponderResult<usize> {
        Ok(ConsumerHandle::read(self, buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> ResponderResult<usize> {
        Ok(ConsumerHandle::write(self, buf)?)
    }

    fn commit(&mut self) -> ResponderResult<()> {
        Ok(ConsumerHandle::commit(self)?)
    }

    fn nack(&mut self, status: u16) -> ResponderResult<()> {
        Ok(ConsumerHandle::nack(self, status)?)
    }
}

impl<S: Read + Write> ConsumerPort for ControlClient<S> {
    fn fetch(&mut self) -> ResponderResult<MessageHeader> {
        Ok(ControlClient::fetch(self)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> ResponderResult<usize> {
        Ok(ControlClient::read(self, buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> ResponderResult<usize> {
        Ok(ControlClient::write(self, buf)?)
    }

    fn commit(&mut self) -> ResponderResult<()> {
        Ok(ControlClient::commit(self)?)
    }

    fn nack(&mut self, status: u16) -> ResponderResult<()> {
        Ok(ControlClient::nack(self, status)?)
    }
}
