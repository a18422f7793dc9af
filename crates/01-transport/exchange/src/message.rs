//! Bus messages handed from the transaction source to the consumer.

use std::fmt;
use std::ops::BitOr;

use crate::error::{ExchangeError, ExchangeResult};

/// Flag word carried by every message.
///
/// Values follow the Linux `i2c_msg` flag layout. Only [`MessageFlags::READ`]
/// changes how the exchange behaves; the rest travel through untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MessageFlags(u16);

impl MessageFlags {
    /// Read data, from slave to master. The consumer supplies the payload.
    pub const READ: Self = Self(0x0001);
    /// Ten-bit chip address.
    pub const TEN_BIT: Self = Self(0x0010);
    /// Length will be the first received byte.
    pub const RECV_LEN: Self = Self(0x0400);
    pub const NO_READ_ACK: Self = Self(0x0800);
    pub const IGNORE_NAK: Self = Self(0x1000);
    pub const REV_DIR_ADDR: Self = Self(0x2000);
    pub const NO_START: Self = Self(0x4000);
    pub const STOP: Self = Self(0x8000);

    /// Flags for a plain master write.
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when the master expects the consumer to produce the bytes.
    pub const fn is_read(self) -> bool {
        self.contains(Self::READ)
    }
}

impl BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Metadata a consumer sees when it fetches the pending message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub address: u16,
    pub flags: MessageFlags,
    pub len: u16,
}

impl MessageHeader {
    pub fn is_read(&self) -> bool {
        self.flags.is_read()
    }
}

impl fmt::Display for MessageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ addr: {:04x}, flags: {:04x}, len: {} }}",
            self.address,
            self.flags.bits(),
            self.len
        )
    }
}

/// A single bus message and the buffer that backs it.
///
/// For write messages the buffer holds the bytes the master sends. For read
/// messages it starts zeroed and the consumer fills it during the exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    address: u16,
    flags: MessageFlags,
    payload: Vec<u8>,
}

impl Message {
    pub fn new(address: u16, flags: MessageFlags, payload: Vec<u8>) -> ExchangeResult<Self> {
        if payload.len() > usize::from(u16::MAX) {
            return Err(ExchangeError::PayloadTooLarge { len: payload.len() });
        }
        Ok(Self {
            address,
            flags,
            payload,
        })
    }

    /// Builds a master write carrying `bytes`.
    pub fn write(address: u16, bytes: impl Into<Vec<u8>>) -> ExchangeResult<Self> {
        Self::new(address, MessageFlags::empty(), bytes.into())
    }

    /// Builds a master read of `len` bytes with a zeroed buffer.
    pub fn read(address: u16, len: u16) -> Self {
        Self {
            address,
            flags: MessageFlags::READ,
            payload: vec![0; usize::from(len)],
        }
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn flags(&self) -> MessageFlags {
        self.flags
    }

    pub fn len(&self) -> u16 {
        // Constructors cap the payload at u16::MAX.
        self.payload.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn header(&self) -> MessageHeader {
        MessageHeader {
            address: self.address,
            flags: self.flags,
            len: self.len(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Moves the buffer out while the slot owns it.
    pub(crate) fn take_payload(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.payload)
    }

    pub(crate) fn restore_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }
}
