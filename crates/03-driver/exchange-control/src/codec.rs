//! Binary framing for control requests and replies.
//!
//! Every frame is `[tag:u8][len:u16 LE][body]`. Request tags keep the high
//! bit clear, reply tags set it. Headers travel as the 6-byte
//! `{addr, flags, len}` record, little-endian, as the character device
//! returned it.

use std::io::{self, Read, Write};

use exchange::{Direction, MessageFlags, MessageHeader};
use smallvec::SmallVec;

use crate::error::{ControlError, ControlResult};
use crate::op::{ControlOp, ControlReply, ResultCode};

pub const FRAME_HEADER_LEN: usize = 3;
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

const OP_OPEN: u8 = 0x01;
const OP_CLOSE: u8 = 0x02;
const OP_FETCH: u8 = 0x10;
const OP_COMMIT: u8 = 0x20;
const OP_NACK: u8 = 0x21;
const OP_READ: u8 = 0x30;
const OP_WRITE: u8 = 0x31;

const REP_STATUS: u8 = 0x80;
const REP_HEADER: u8 = 0x81;
const REP_DATA: u8 = 0x82;
const REP_WRITTEN: u8 = 0x83;
const REP_BUSY: u8 = 0x84;
const REP_NOT_OPEN: u8 = 0x85;
const REP_MISMATCH: u8 = 0x86;

const HEADER_RECORD_LEN: usize = 6;

/// One decoded frame. Small bodies stay inline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub tag: u8,
    pub body: SmallVec<[u8; 16]>,
}

impl Frame {
    fn new(tag: u8) -> Self {
        Self {
            tag,
            body: SmallVec::new(),
        }
    }

    fn with_body(tag: u8, body: &[u8]) -> ControlResult<Self> {
        if body.len() > MAX_BODY_LEN {
            return Err(ControlError::malformed(format!(
                "body of {} bytes exceeds frame limit",
                body.len()
            )));
        }
        Ok(Self {
            tag,
            body: SmallVec::from_slice(body),
        })
    }
}

pub fn encode_op(op: &ControlOp) -> ControlResult<Frame> {
    match op {
        ControlOp::Open => Ok(Frame::new(OP_OPEN)),
        ControlOp::Close => Ok(Frame::new(OP_CLOSE)),
        ControlOp::Fetch => Ok(Frame::new(OP_FETCH)),
        ControlOp::Commit => Ok(Frame::new(OP_COMMIT)),
        ControlOp::Nack { status } => Frame::with_body(OP_NACK, &status.to_le_bytes()),
        ControlOp::Read { len } => Frame::with_body(OP_READ, &len.to_le_bytes()),
        ControlOp::Write(bytes) => Frame::with_body(OP_WRITE, bytes),
    }
}

pub fn decode_op(frame: &Frame) -> ControlResult<ControlOp> {
    let body = frame.body.as_slice();
    match frame.tag {
        OP_OPEN => expect_empty(body, "open").map(|_| ControlOp::Open),
        OP_CLOSE => expect_empty(body, "close").map(|_| ControlOp::Close),
        OP_FETCH => expect_empty(body, "fetch").map(|_| ControlOp::Fetch),
        OP_COMMIT => expect_empty(body, "commit").map(|_| ControlOp::Commit),
        OP_NACK => read_u16(body, "nack").map(|status| ControlOp::Nack { status }),
        OP_READ => read_u16(body, "read").map(|len| ControlOp::Read { len }),
        OP_WRITE => Ok(ControlOp::Write(body.to_vec())),
        tag => Err(ControlError::malformed(format!(
            "unknown request tag {tag:#04x}"
        ))),
    }
}

pub fn encode_reply(reply: &ControlReply) -> ControlResult<Frame> {
    match reply {
        ControlReply::Status(code) => Frame::with_body(REP_STATUS, &[*code as u8]),
        ControlReply::Header(header) => Frame::with_body(REP_HEADER, &encode_header(header)),
        ControlReply::Data(bytes) => Frame::with_body(REP_DATA, bytes),
        ControlReply::Written(n) => Frame::with_body(REP_WRITTEN, &n.to_le_bytes()),
        ControlReply::Busy => Ok(Frame::new(REP_BUSY)),
        ControlReply::NotOpen => Ok(Frame::new(REP_NOT_OPEN)),
        ControlReply::Mismatch(direction) => {
            let bit = match direction {
                Direction::Read => 0,
                Direction::Write => 1,
            };
            Frame::with_body(REP_MISMATCH, &[bit])
        }
    }
}

pub fn decode_reply(frame: &Frame) -> ControlResult<ControlReply> {
    let body = frame.body.as_slice();
    match frame.tag {
        REP_STATUS => {
            let [code] = body else {
                return Err(ControlError::malformed("status body must be one byte"));
            };
            ResultCode::from_u8(*code)
                .map(ControlReply::Status)
                .ok_or_else(|| ControlError::malformed(format!("unknown result code {code}")))
        }
        REP_HEADER => decode_header(body).map(ControlReply::Header),
        REP_DATA => Ok(ControlReply::Data(body.to_vec())),
        REP_WRITTEN => read_u16(body, "written").map(ControlReply::Written),
        REP_BUSY => expect_empty(body, "busy").map(|_| ControlReply::Busy),
        REP_NOT_OPEN => expect_empty(body, "not-open").map(|_| ControlReply::NotOpen),
        REP_MISMATCH => match body {
            [0] => Ok(ControlReply::Mismatch(Direction::Read)),
            [1] => Ok(ControlReply::Mismatch(Direction::Write)),
            _ => Err(ControlError::malformed("mismatch body must be 0 or 1")),
        },
        tag => Err(ControlError::malformed(format!("unknown reply tag {tag:#04x}"))),
    }
}

/// Reads one frame. Returns `Ok(None)` when the peer closed between frames.
pub fn read_frame<R: Read>(reader: &mut R) -> ControlResult<Option<Frame>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let len = usize::from(u16::from_le_bytes([header[1], header[2]]));
    let mut body = SmallVec::from_elem(0u8, len);
    reader.read_exact(&mut body)?;
    Ok(Some(Frame {
        tag: header[0],
        body,
    }))
}

pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> ControlResult<()> {
    let len = u16::try_from(frame.body.len())
        .map_err(|_| ControlError::malformed("frame body too large"))?;
    let mut out: SmallVec<[u8; 64]> = SmallVec::with_capacity(FRAME_HEADER_LEN + frame.body.len());
    out.push(frame.tag);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&frame.body);
    writer.write_all(&out)?;
    writer.flush()?;
    Ok(())
}

fn encode_header(header: &MessageHeader) -> [u8; HEADER_RECORD_LEN] {
    let mut out = [0u8; HEADER_RECORD_LEN];
    out[0..2].copy_from_slice(&header.address.to_le_bytes());
    out[2..4].copy_from_slice(&header.flags.bits().to_le_bytes());
    out[4..6].copy_from_slice(&header.len.to_le_bytes());
    out
}

fn decode_header(body: &[u8]) -> ControlResult<MessageHeader> {
    if body.len() != HEADER_RECORD_LEN {
        return Err(ControlError::malformed(format!(
            "header record must be {HEADER_RECORD_LEN} bytes, got {}",
            body.len()
        )));
    }
    Ok(MessageHeader {
        address: u16::from_le_bytes([body[0], body[1]]),
        flags: MessageFlags::from_bits(u16::from_le_bytes([body[2], body[3]])),
        len: u16::from_le_bytes([body[4], body[5]]),
    })
}

fn expect_empty(body: &[u8], what: &str) -> ControlResult<()> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(ControlError::malformed(format!(
            "{what} carries no body, got {} bytes",
            body.len()
        )))
    }
}

fn read_u16(body: &[u8], what: &str) -> ControlResult<u16> {
    match body {
        [lo, hi] => Ok(u16::from_le_bytes([*lo, *hi])),
        _ => Err(ControlError::malformed(format!(
            "{what} body must be 2 bytes, got {}",
            body.len()
        ))),
    }
}
