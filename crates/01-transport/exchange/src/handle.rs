use std::sync::Arc;

use crate::error::{ExchangeError, ExchangeResult};
use crate::gate::GateToken;
use crate::message::MessageHeader;
use crate::session::ExchangeSession;
use crate::slot::Transfer;

impl ExchangeSession {
    /// Opens the consumer gate and returns a handle that closes it on drop.
    pub fn open_consumer(self: &Arc<Self>) -> ExchangeResult<ConsumerHandle> {
        let token = self.open_token()?;
        Ok(ConsumerHandle {
            session: Arc::clone(self),
            token,
        })
    }
}

/// The single connected consumer.
///
/// Calls fail with [`ExchangeError::NoConsumer`] once the gate has been
/// closed underneath the handle, e.g. by [`ExchangeSession::close`].
pub struct ConsumerHandle {
    session: Arc<ExchangeSession>,
    token: GateToken,
}

impl ConsumerHandle {
    pub fn session(&self) -> &Arc<ExchangeSession> {
        &self.session
    }

    pub fn is_open(&self) -> bool {
        self.session.is_held_by(self.token)
    }

    pub fn fetch(&self) -> ExchangeResult<MessageHeader> {
        self.ensure_open()?;
        self.session.fetch_pending()
    }

    /// Reads the next chunk of a write message.
    pub fn read(&self, buf: &mut [u8]) -> ExchangeResult<usize> {
        self.ensure_open()?;
        self.session.transfer_chunk(Transfer::Read(buf))
    }

    /// Writes the next chunk of a read message.
    pub fn write(&self, buf: &[u8]) -> ExchangeResult<usize> {
        self.ensure_open()?;
        self.session.transfer_chunk(Transfer::Write(buf))
    }

    pub fn commit(&self) -> ExchangeResult<()> {
        self.ensure_open()?;
        self.session.commit()
    }

    pub fn nack(&self, status: u16) -> ExchangeResult<()> {
        self.ensure_open()?;
        self.session.nack(status)
    }

    /// Releases the gate. Equivalent to dropping the handle.
    pub fn close(self) {}

    fn ensure_open(&self) -> ExchangeResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ExchangeError::NoConsumer)
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.session.release(self.token);
    }
}

impl std::fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("token", &self.token)
            .finish()
    }
}
