//! 256-byte register file behind a single bus address, EEPROM style.
//!
//! A write sets the register pointer from its first byte and stores the rest
//! starting there. A read returns bytes from the pointer. Both auto-increment
//! and wrap at the end of the file.

use exchange::MessageHeader;
use log::debug;

use crate::consumer_loop::{Reply, Responder};

/// Status returned for messages addressed to someone else.
pub const ADDRESS_NAK_STATUS: u16 = 6;

pub const REGISTER_COUNT: usize = 256;

#[derive(Clone, Debug)]
pub struct RegisterFile {
    address: u16,
    registers: [u8; REGISTER_COUNT],
    pointer: u8,
}

impl RegisterFile {
    pub fn new(address: u16) -> Self {
        Self {
            address,
            registers: [0; REGISTER_COUNT],
            pointer: 0,
        }
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn pointer(&self) -> u8 {
        self.pointer
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    /// Preloads registers from `start`, wrapping. Leaves the pointer alone.
    pub fn load(&mut self, start: u8, bytes: &[u8]) {
        let mut at = start;
        for byte in bytes {
            self.registers[usize::from(at)] = *byte;
            at = at.wrapping_add(1);
        }
    }
}

impl Responder for RegisterFile {
    fn on_write(&mut self, header: &MessageHeader, data: &[u8]) -> Reply {
        if header.address != self.address {
            return Reply::Nack(ADDRESS_NAK_STATUS);
        }
        let Some((pointer, values)) = data.split_first() else {
            // Zero-length write: address probe.
            return Reply::Ack;
        };
        self.pointer = *pointer;
        for value in values {
            self.registers[usize::from(self.pointer)] = *value;
            self.pointer = self.pointer.wrapping_add(1);
        }
        debug!(
            "{:#04x}: stored {} bytes, pointer now {:#04x}",
            self.address,
            values.len(),
            self.pointer
        );
        Reply::Ack
    }

    fn on_read(&mut self, header: &MessageHeader, buf: &mut [u8]) -> Reply {
        if header.address != self.address {
            return Reply::Nack(ADDRESS_NAK_STATUS);
        }
        for out in buf.iter_mut() {
            *out = self.registers[usize::from(self.pointer)];
            self.pointer = self.pointer.wrapping_add(1);
        }
        Reply::Ack
    }
}
