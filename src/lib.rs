//! # TallyKV - An In-Memory Multi-Type Key-Value Store
//!
//! TallyKV keeps scalars, lists, hashes and sets in memory and serves them
//! over TCP using the RESP protocol (or a plain text line protocol). Scalars
//! can carry a time to live, and the whole store is snapshotted to a JSON
//! file periodically and on shutdown.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              TallyKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                     ┌──────┴──────┐           ▼                         │
//! │                     │   Codec     │    ┌──────────────────────────────┐ │
//! │                     │ RESP/inline │    │        StorageEngine         │ │
//! │                     └─────────────┘    │  RwLock<entries + expiry>    │ │
//! │                                        └──────────────────────────────┘ │
//! │                                           ▲                  ▲          │
//! │                            ┌──────────────┴──┐    ┌──────────┴───────┐  │
//! │                            │  ExpirySweeper  │    │  SnapshotSaver   │  │
//! │                            └─────────────────┘    └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tallykv::commands::CommandHandler;
//! use tallykv::storage::{start_expiry_sweeper, StorageEngine};
//! use tallykv::{accept_loop, ConnectionStats, Framing};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&storage));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!     accept_loop(listener, storage, Framing::Resp, stats).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `SET key value [ttl-seconds]`, `GET key`, `DEL key [key ...]`
//! - `LPUSH key value [value ...]`, `RPUSH key value [value ...]`,
//!   `LPOP key`, `RPOP key`
//! - `HSET key field value`, `HGET key field`
//! - `SADD key member [member ...]`, `SREM key member [member ...]`,
//!   `SMEMBERS key`
//!
//! A key holds one family of value at a time. Using it through another
//! family's command fails with a `WRONGTYPE` error.
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP types, request decoding, wire framings
//! - [`storage`]: The value store and expiry
//! - [`commands`]: Command table and handlers
//! - [`connection`]: Client connection management
//! - [`persistence`]: Snapshot files
//! - [`client`]: Async client
//! - [`config`]: Command-line configuration

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod persistence;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{Client, ClientError};
pub use commands::CommandHandler;
pub use config::{CliAction, Config, ConfigError};
pub use connection::{handle_connection, ConnectionStats};
pub use persistence::{PersistError, Snapshot, SnapshotConfig, SnapshotSaver};
pub use protocol::{Framing, ParseError, RespParser, RespValue};
pub use server::accept_loop;
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, StorageEngine, StoreError};

/// The default port TallyKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host TallyKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of TallyKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
