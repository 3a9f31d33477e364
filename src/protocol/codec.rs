//! Wire framings.
//!
//! The connection loop only talks to a [`Codec`]: it hands over buffered
//! bytes and gets back request arguments, and it hands over replies and gets
//! back bytes. Which framing sits behind the trait is picked once at startup.
//!
//! - [`RespCodec`]: RESP arrays of bulk strings in, RESP replies out.
//! - [`InlineCodec`]: one whitespace-separated command per line in, a
//!   human-readable text block per reply out. Handy with `nc` or `telnet`.

use crate::protocol::parser::{parse_request, FrameError};
use crate::protocol::types::{RespValue, CRLF};
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

/// Decodes requests from, and encodes replies to, a byte stream.
pub trait Codec: Send {
    /// Attempts to decode one request from the front of `buf`.
    ///
    /// Returns the arguments (command name first) and the number of bytes
    /// consumed, or `None` when more data is needed.
    fn decode(&mut self, buf: &[u8]) -> Result<Option<(Vec<Bytes>, usize)>, FrameError>;

    /// Appends the wire form of `reply` to `out`.
    fn encode(&self, reply: &RespValue, out: &mut Vec<u8>);
}

/// RESP framing, the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct RespCodec;

impl Codec for RespCodec {
    fn decode(&mut self, buf: &[u8]) -> Result<Option<(Vec<Bytes>, usize)>, FrameError> {
        parse_request(buf)
    }

    fn encode(&self, reply: &RespValue, out: &mut Vec<u8>) {
        reply.serialize_into(out);
    }
}

/// Line-oriented text framing.
///
/// Requests end with `\n` (an optional `\r` before it is dropped). Blank
/// lines are skipped. Arguments cannot contain whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineCodec;

impl Codec for InlineCodec {
    fn decode(&mut self, buf: &[u8]) -> Result<Option<(Vec<Bytes>, usize)>, FrameError> {
        let mut start = 0;
        loop {
            let rest = &buf[start..];
            let newline = match rest.iter().position(|&b| b == b'\n') {
                Some(pos) => pos,
                None => return Ok(None),
            };
            let consumed = start + newline + 1;
            let line = rest[..newline].strip_suffix(b"\r").unwrap_or(&rest[..newline]);

            let args: Vec<Bytes> = line
                .split(|b| b.is_ascii_whitespace())
                .filter(|part| !part.is_empty())
                .map(Bytes::copy_from_slice)
                .collect();

            if args.is_empty() {
                start = consumed;
                continue;
            }
            return Ok(Some((args, consumed)));
        }
    }

    fn encode(&self, reply: &RespValue, out: &mut Vec<u8>) {
        out.extend_from_slice(reply.to_string().as_bytes());
        out.extend_from_slice(CRLF);
    }
}

/// Selects the wire framing at startup.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    #[default]
    Resp,
    Inline,
}

impl Framing {
    /// Creates a fresh codec for one connection.
    pub fn codec(self) -> Box<dyn Codec> {
        match self {
            Framing::Resp => Box::new(RespCodec),
            Framing::Inline => Box::new(InlineCodec),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resp" => Ok(Framing::Resp),
            "inline" | "text" => Ok(Framing::Inline),
            other => Err(format!("unknown protocol '{}'", other)),
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Resp => f.write_str("resp"),
            Framing::Inline => f.write_str("inline"),
        }
    }
}
