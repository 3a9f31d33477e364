//! Command Handler Module
//!
//! This module implements the command processing layer for TallyKV.
//! It receives decoded requests, executes them against the storage engine,
//! and returns one reply per request.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Codec          │  (protocol module)
//! └────────┬────────┘
//!          │ Vec<Bytes>
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Lookup       │
//! │  - Arity check  │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - Scalars: `SET key value [ttl]`, `GET`, `DEL key [key ...]`
//! - Lists: `LPUSH`, `RPUSH`, `LPOP`, `RPOP`
//! - Hashes: `HSET`, `HGET`
//! - Sets: `SADD`, `SREM`, `SMEMBERS`

pub mod handler;
pub mod table;

pub use handler::CommandHandler;
pub use table::{lookup, Arity, CommandSpec, COMMAND_TABLE};
