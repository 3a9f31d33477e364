//! RESP Protocol Implementation
//!
//! This module turns bytes into requests and replies into bytes.
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` enum and serialization
//! - `parser`: Strict request decoder plus a general RESP value parser
//! - `codec`: The `Codec` trait and the two framings behind it
//!
//! ## Example
//!
//! ```
//! use tallykv::protocol::{parse_request, RespValue};
//! use bytes::Bytes;
//!
//! // Decoding a request
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (args, consumed) = parse_request(data).unwrap().unwrap();
//! assert_eq!(args.len(), 2);
//! assert_eq!(consumed, data.len());
//!
//! // Creating responses
//! let response = RespValue::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(response.serialize(), b"$4\r\nAriz\r\n");
//! ```

pub mod codec;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use codec::{Codec, Framing, InlineCodec, RespCodec};
pub use parser::{parse_message, parse_request, FrameError, ParseError, ParseResult, RespParser};
pub use types::RespValue;
