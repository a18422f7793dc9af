//! Single-message slot shared by the bus master and the consumer.
//!
//! The slot holds at most one pending message plus the cursor of the burst
//! currently moving its payload. Once the consumer commits, the message is
//! hidden from further consumer calls until the submitter reclaims it, so a
//! fast consumer can never service the same message twice.

use crate::error::{ExchangeError, ExchangeResult};
use crate::message::MessageHeader;
use crate::signal::CompletionFlag;

/// Which way bytes move, seen from the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Consumer reads bytes the master supplied.
    Read,
    /// Consumer writes bytes into the message buffer.
    Write,
}

/// One chunked transfer request against the pending message.
#[derive(Debug)]
pub enum Transfer<'a> {
    /// Copy payload bytes out into the buffer.
    Read(&'a mut [u8]),
    /// Copy the buffer into the payload.
    Write(&'a [u8]),
}

impl Transfer<'_> {
    pub fn direction(&self) -> Direction {
        match self {
            Transfer::Read(_) => Direction::Read,
            Transfer::Write(_) => Direction::Write,
        }
    }

    fn len(&self) -> usize {
        match self {
            Transfer::Read(buf) => buf.len(),
            Transfer::Write(buf) => buf.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cursor {
    offset: usize,
    remaining: usize,
    direction: Direction,
}

#[derive(Debug)]
struct Pending {
    header: MessageHeader,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct ExchangeSlot {
    pending: Option<Pending>,
    cursor: Option<Cursor>,
    status: u16,
    completion: CompletionFlag,
}

impl ExchangeSlot {
    pub(crate) fn is_occupied(&self) -> bool {
        self.pending.is_some()
    }

    /// Installs a message and re-arms the completion.
    pub(crate) fn publish(&mut self, header: MessageHeader, payload: Vec<u8>) {
        debug_assert!(self.pending.is_none(), "slot already occupied");
        debug_assert_eq!(usize::from(header.len), payload.len());
        self.completion.reinit();
        self.pending = Some(Pending { header, payload });
        self.cursor = None;
        self.status = 0;
    }

    /// Message visible to the consumer: pending and not yet committed.
    fn serviceable(&mut self) -> Option<&mut Pending> {
        if self.completion.is_done() {
            return None;
        }
        self.pending.as_mut()
    }

    pub(crate) fn header(&self) -> Option<MessageHeader> {
        if self.completion.is_done() {
            return None;
        }
        self.pending.as_ref().map(|pending| pending.header)
    }

    /// Moves up to one chunk between the caller and the payload.
    pub(crate) fn transfer(&mut self, transfer: Transfer<'_>) -> ExchangeResult<usize> {
        let direction = transfer.direction();
        let current = self.cursor;
        let Some(pending) = self.serviceable() else {
            return Ok(0);
        };

        let mut cursor = match current {
            Some(cursor) if cursor.direction != direction => {
                return Err(ExchangeError::DirectionMismatch {
                    active: cursor.direction,
                });
            }
            Some(cursor) => cursor,
            None => Cursor {
                offset: 0,
                remaining: pending.payload.len(),
                direction,
            },
        };

        let n = transfer.len().min(cursor.remaining);
        let window = cursor.offset..cursor.offset + n;
        match transfer {
            Transfer::Read(buf) => buf[..n].copy_from_slice(&pending.payload[window]),
            Transfer::Write(buf) => pending.payload[window].copy_from_slice(&buf[..n]),
        }
        cursor.offset += n;
        cursor.remaining -= n;
        debug_assert_eq!(cursor.remaining, pending.payload.len() - cursor.offset);

        self.cursor = (cursor.remaining > 0).then_some(cursor);
        Ok(n)
    }

    /// Records the consumer's verdict. The caller fires the completion.
    pub(crate) fn finish(&mut self, status: u16) -> ExchangeResult<&mut CompletionFlag> {
        if self.serviceable().is_none() {
            return Err(ExchangeError::NoMessage);
        }
        self.status = status;
        Ok(&mut self.completion)
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completion.is_done()
    }

    pub(crate) fn status(&self) -> u16 {
        self.status
    }

    /// Empties the slot and hands the payload back to the submitter.
    pub(crate) fn reclaim(&mut self) -> Option<Vec<u8>> {
        self.cursor = None;
        self.pending.take().map(|pending| pending.payload)
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }
}
