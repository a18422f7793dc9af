//! First-opener-wins gate over the consumer side.

use crate::error::{ExchangeError, ExchangeResult};

/// Identifies one successful `open`, so a stale handle cannot close a later holder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct GateToken(u64);

#[derive(Debug, Default)]
pub(crate) struct ConsumerGate {
    holder: Option<GateToken>,
    next: u64,
}

impl ConsumerGate {
    pub(crate) fn is_open(&self) -> bool {
        self.holder.is_some()
    }

    pub(crate) fn open(&mut self) -> ExchangeResult<GateToken> {
        if self.holder.is_some() {
            return Err(ExchangeError::Busy);
        }
        self.next = self.next.wrapping_add(1);
        let token = GateToken(self.next);
        self.holder = Some(token);
        Ok(token)
    }

    /// Unconditional close.
    pub(crate) fn close(&mut self) {
        self.holder = None;
    }

    /// Closes only if `token` still holds the gate.
    pub(crate) fn release(&mut self, token: GateToken) -> bool {
        if self.holder == Some(token) {
            self.holder = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_held_by(&self, token: GateToken) -> bool {
        self.holder == Some(token)
    }
}
