use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use exchange::{ExchangeConfig, ExchangeError, MessageHeader};
use log::{debug, trace, warn};
use smallvec::SmallVec;

use crate::error::{ResponderError, ResponderResult};
use crate::port::ConsumerPort;

/// Default number of bytes moved per read or write call.
pub const DEFAULT_CHUNK_LEN: usize = 32;

/// Verdict a [`Responder`] returns for one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Nack(u16),
}

/// Device model behind a consumer loop.
pub trait Responder {
    /// Called with the full payload of a message the source wrote.
    fn on_write(&mut self, header: &MessageHeader, data: &[u8]) -> Reply;

    /// Fills `buf` for a message the source reads. `buf.len()` equals `header.len`.
    fn on_read(&mut self, header: &MessageHeader, buf: &mut [u8]) -> Reply;
}

#[derive(Clone, Copy, Debug)]
pub struct LoopConfig {
    pub poll_interval: Duration,
    pub chunk_len: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from(&ExchangeConfig::default())
    }
}

impl From<&ExchangeConfig> for LoopConfig {
    fn from(config: &ExchangeConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            chunk_len: DEFAULT_CHUNK_LEN,
        }
    }
}

/// Counters reported when a loop stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub acked: u64,
    pub nacked: u64,
    /// Messages the source gave up on before the verdict landed.
    pub abandoned: u64,
    pub idle_polls: u64,
}

impl LoopStats {
    pub fn handled(&self) -> u64 {
        self.acked + self.nacked
    }
}

/// Outcome of a single [`ConsumerLoop::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Idle,
    Acked,
    Nacked(u16),
    Abandoned,
}

/// Polls a [`ConsumerPort`] and answers each message through a [`Responder`].
///
/// Runs until a message arrives on `stop` or its sender is dropped.
pub struct ConsumerLoop<P, R> {
    port: P,
    responder: R,
    stop: Receiver<()>,
    config: LoopConfig,
    stats: LoopStats,
}

impl<P: ConsumerPort, R: Responder> ConsumerLoop<P, R> {
    pub fn new(port: P, responder: R, stop: Receiver<()>) -> Self {
        Self::with_config(port, responder, stop, LoopConfig::default())
    }

    pub fn with_config(port: P, responder: R, stop: Receiver<()>, config: LoopConfig) -> Self {
        Self {
            port,
            responder,
            stop,
            config: LoopConfig {
                chunk_len: config.chunk_len.max(1),
                ..config
            },
            stats: LoopStats::default(),
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    /// Runs until stopped and hands back the responder with the final counters.
    ///
    /// Losing the consumer gate ends the loop with an error.
    pub fn run(mut self) -> ResponderResult<(R, LoopStats)> {
        loop {
            match self.stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
            if self.step()? == Step::Idle {
                match self.stop.recv_timeout(self.config.poll_interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }
        }
        debug!("consumer loop stopped: {:?}", self.stats);
        Ok((self.responder, self.stats))
    }

    /// Services at most one message without waiting.
    pub fn step(&mut self) -> ResponderResult<Step> {
        let header = match self.port.fetch() {
            Ok(header) => header,
            // No source yet is the same as no traffic.
            Err(ResponderError::Exchange(
                ExchangeError::NoMessage | ExchangeError::SourceNotRegistered,
            )) => {
                self.stats.idle_polls += 1;
                return Ok(Step::Idle);
            }
            Err(err) => return Err(err),
        };
        trace!("servicing {header}");

        let step = match self.service(&header) {
            Ok(step) => step,
            Err(err) if is_abandoned(&err) => {
                warn!("source abandoned {header}: {err}");
                Step::Abandoned
            }
            Err(err) => return Err(err),
        };
        match step {
            Step::Acked => self.stats.acked += 1,
            Step::Nacked(_) => self.stats.nacked += 1,
            Step::Abandoned => self.stats.abandoned += 1,
            Step::Idle => {}
        }
        Ok(step)
    }

    fn service(&mut self, header: &MessageHeader) -> ResponderResult<Step> {
        let len = usize::from(header.len);
        let reply = if header.is_read() {
            let mut buf: SmallVec<[u8; 64]> = SmallVec::from_elem(0, len);
            let reply = self.responder.on_read(header, &mut buf);
            if reply == Reply::Ack {
                self.push(&buf)?;
            }
            reply
        } else {
            let data = self.pull(len)?;
            self.responder.on_write(header, &data)
        };

        match reply {
            Reply::Ack => {
                self.port.commit()?;
                Ok(Step::Acked)
            }
            Reply::Nack(status) => {
                self.port.nack(status)?;
                Ok(Step::Nacked(status))
            }
        }
    }

    fn pull(&mut self, len: usize) -> ResponderResult<SmallVec<[u8; 64]>> {
        let mut data = SmallVec::with_capacity(len);
        let mut chunk = vec![0u8; self.config.chunk_len];
        while data.len() < len {
            let want = (len - data.len()).min(chunk.len());
            let n = self.port.read(&mut chunk[..want])?;
            if n == 0 {
                return Err(ResponderError::ShortTransfer {
                    expected: len,
                    moved: data.len(),
                });
            }
            data.extend_from_slice(&chunk[..n]);
        }
        Ok(data)
    }

    fn push(&mut self, buf: &[u8]) -> ResponderResult<()> {
        let mut offset = 0;
        while offset < buf.len() {
            let end = (offset + self.config.chunk_len).min(buf.len());
            let n = self.port.write(&buf[offset..end])?;
            if n == 0 {
                return Err(ResponderError::ShortTransfer {
                    expected: buf.len(),
                    moved: offset,
                });
            }
            offset += n;
        }
        Ok(())
    }
}

/// The message vanished mid-service because its submitter timed out.
fn is_abandoned(err: &ResponderError) -> bool {
    matches!(
        err,
        ResponderError::ShortTransfer { .. } | ResponderError::Exchange(ExchangeError::NoMessage)
    )
}
