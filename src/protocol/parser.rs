//! RESP Protocol Parser
//!
//! Two entry points live here:
//!
//! - [`parse_request`] decodes what a client sends: always an array of bulk
//!   strings. It is strict, and on malformed input it reports how many bytes
//!   to throw away so the connection can carry on with the next frame.
//! - [`RespParser`] decodes any RESP value. The client uses it to read
//!   replies.
//!
//! Both follow the same contract:
//! - `Ok(Some((value, consumed)))` - a complete value, `consumed` bytes used
//! - `Ok(None)` - the message is incomplete, wait for more data
//! - `Err(..)` - invalid protocol data

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// Invalid integer format
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a simple string or error message
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Protocol violation (missing CRLF, wrong frame type, etc.)
    #[error("{0}")]
    ProtocolError(String),

    /// The message exceeds maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A request frame that could not be decoded.
///
/// `skip` is the number of buffered bytes that belong to the bad frame, up
/// to and including the line where the problem was found.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{error}")]
pub struct FrameError {
    pub error: ParseError,
    pub skip: usize,
}

impl FrameError {
    pub fn new(error: ParseError, skip: usize) -> Self {
        Self { error, skip }
    }
}

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// Decodes one client request: `*<N>\r\n` followed by `N` bulk strings.
///
/// ```
/// use tallykv::protocol::parse_request;
///
/// let (args, consumed) = parse_request(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
///     .unwrap()
///     .unwrap();
/// assert_eq!(args, vec!["GET", "name"]);
/// assert_eq!(consumed, 23);
/// ```
pub fn parse_request(buf: &[u8]) -> Result<Option<(Vec<Bytes>, usize)>, FrameError> {
    let header_end = match find_crlf(buf) {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let mut consumed = header_end + 2;

    if buf[0] != prefix::ARRAY {
        return Err(FrameError::new(
            ParseError::ProtocolError(format!(
                "expected '*', got '{}'",
                (buf[0] as char).escape_default()
            )),
            consumed,
        ));
    }

    let count = parse_length(&buf[1..header_end]).map_err(|e| FrameError::new(e, consumed))?;
    if count < 0 {
        return Err(FrameError::new(
            ParseError::InvalidArrayLength(count),
            consumed,
        ));
    }

    // The count is untrusted, so don't let it size the allocation on its own
    let mut args = Vec::with_capacity((count as usize).min(64));

    for _ in 0..count {
        let rest = &buf[consumed..];
        let line_end = match find_crlf(rest) {
            Some(pos) => pos,
            None => return Ok(None),
        };
        let line_len = line_end + 2;

        if rest[0] != prefix::BULK_STRING {
            return Err(FrameError::new(
                ParseError::ProtocolError(format!(
                    "expected '$', got '{}'",
                    (rest[0] as char).escape_default()
                )),
                consumed + line_len,
            ));
        }

        let length = parse_length(&rest[1..line_end])
            .map_err(|e| FrameError::new(e, consumed + line_len))?;
        if length < 0 {
            return Err(FrameError::new(
                ParseError::InvalidBulkLength(length),
                consumed + line_len,
            ));
        }
        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(FrameError::new(
                ParseError::MessageTooLarge {
                    size: length,
                    max: MAX_BULK_SIZE,
                },
                consumed + line_len,
            ));
        }

        let data_start = consumed + line_len;
        let needed = data_start + length + 2;
        if buf.len() < needed {
            return Ok(None);
        }

        if &buf[data_start + length..needed] != CRLF {
            return Err(FrameError::new(
                ParseError::ProtocolError("bulk string missing trailing CRLF".to_string()),
                needed,
            ));
        }

        args.push(Bytes::copy_from_slice(&buf[data_start..data_start + length]));
        consumed = needed;
    }

    Ok(Some((args, consumed)))
}

/// A general RESP value parser.
///
/// # Example
///
/// ```
/// use tallykv::protocol::{RespParser, RespValue};
///
/// let mut parser = RespParser::new();
/// let (value, consumed) = parser.parse(b":42\r\n").unwrap().unwrap();
/// assert_eq!(value, RespValue::Integer(42));
/// assert_eq!(consumed, 5);
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    /// Current nesting depth (for array parsing)
    depth: usize,
}

impl RespParser {
    /// Creates a new parser instance.
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Attempts to parse a RESP value from the buffer.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.depth = 0;
        self.parse_value(buf)
    }

    fn parse_value(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::ProtocolError(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match buf[0] {
            prefix::SIMPLE_STRING => Self::parse_line(buf, RespValue::SimpleString),
            prefix::ERROR => Self::parse_line(buf, RespValue::Error),
            prefix::INTEGER => self.parse_integer(buf),
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// Parses `+<string>\r\n` or `-<message>\r\n`.
    fn parse_line(
        buf: &[u8],
        wrap: fn(String) -> RespValue,
    ) -> ParseResult<Option<(RespValue, usize)>> {
        match find_crlf(&buf[1..]) {
            Some(pos) => {
                let s = std::str::from_utf8(&buf[1..1 + pos])
                    .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
                // +1 for prefix, +2 for CRLF
                Ok(Some((wrap(s.to_string()), 1 + pos + 2)))
            }
            None => Ok(None),
        }
    }

    /// Parses an integer: `:<integer>\r\n`
    fn parse_integer(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        match find_crlf(&buf[1..]) {
            Some(pos) => {
                let n = parse_length(&buf[1..1 + pos])?;
                Ok(Some((RespValue::Integer(n), 1 + pos + 2)))
            }
            None => Ok(None),
        }
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let length_end = match find_crlf(&buf[1..]) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let length = parse_length(&buf[1..1 + length_end])?;

        if length == -1 {
            return Ok(Some((RespValue::Null, 1 + length_end + 2)));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let data_start = 1 + length_end + 2;
        let total_needed = data_start + length + 2;
        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[data_start + length..total_needed] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
        Ok(Some((RespValue::BulkString(data), total_needed)))
    }

    /// Parses an array: `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let count_end = match find_crlf(&buf[1..]) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let count = parse_length(&buf[1..1 + count_end])?;

        if count == -1 {
            return Ok(Some((RespValue::Null, 1 + count_end + 2)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        let mut elements = Vec::with_capacity(count.min(64));
        let mut consumed = 1 + count_end + 2;

        self.depth += 1;
        for _ in 0..count {
            match self.parse_value(&buf[consumed..])? {
                Some((value, element_consumed)) => {
                    elements.push(value);
                    consumed += element_consumed;
                }
                None => return Ok(None),
            }
        }
        self.depth -= 1;

        Ok(Some((RespValue::Array(elements), consumed)))
    }
}

/// Parses the decimal number on a header line.
fn parse_length(digits: &[u8]) -> ParseResult<i64> {
    let s = std::str::from_utf8(digits).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    s.parse()
        .map_err(|e: ParseIntError| ParseError::InvalidInteger(format!("'{}': {}", s, e)))
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Helper function to parse a single RESP message from bytes.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}
