//! One-line batch scripts for the `serve` command.
//!
//! A line is a whitespace-separated list of messages, run as one batch:
//! `w50:00112233` writes four bytes to 0x50, `r50:4` reads four bytes from
//! it. Addresses are hex, write payloads are hex byte pairs, read lengths
//! are decimal. `#` starts a comment.

use anyhow::{bail, Context, Result};
use exchange::Message;

pub fn parse_line(line: &str) -> Result<Vec<Message>> {
    let line = match line.split_once('#') {
        Some((code, _)) => code,
        None => line,
    };
    line.split_whitespace()
        .map(|token| parse_message(token).with_context(|| format!("bad message '{token}'")))
        .collect()
}

fn parse_message(token: &str) -> Result<Message> {
    let (head, body) = token
        .split_once(':')
        .context("expected <r|w><addr>:<data>")?;
    let mut chars = head.chars();
    let kind = chars.next().context("empty message")?;
    let address = u16::from_str_radix(chars.as_str(), 16)
        .with_context(|| format!("invalid address '{}'", chars.as_str()))?;

    match kind {
        'w' | 'W' => Ok(Message::write(address, parse_hex(body)?)?),
        'r' | 'R' => {
            let len = body
                .parse::<u16>()
                .with_context(|| format!("invalid read length '{body}'"))?;
            Ok(Message::read(address, len))
        }
        other => bail!("unknown message kind '{other}'"),
    }
}

fn parse_hex(digits: &str) -> Result<Vec<u8>> {
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|at| {
            let pair = digits.get(at..at + 2).context("non-ascii hex")?;
            u8::from_str_radix(pair, 16).with_context(|| format!("invalid hex byte '{pair}'"))
        })
        .collect()
}
