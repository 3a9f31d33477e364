//! Storage Engine Module
//!
//! This module holds the value store for TallyKV: one keyspace of tagged
//! values (scalars, lists, hashes, sets) with TTL support on scalars and a
//! background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │          RwLock<{ entries, expiry index }>                  │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ cleanup_expired()
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use tallykv::storage::{StorageEngine, StoreError};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//!
//! engine.set(Bytes::from("name"), Bytes::from("Ariz")).unwrap();
//! assert_eq!(engine.get(b"name"), Ok(Some(Bytes::from("Ariz"))));
//!
//! engine.set_with_ttl(
//!     Bytes::from("session"),
//!     Bytes::from("token123"),
//!     Duration::from_secs(3600),
//! ).unwrap();
//!
//! // A key holds exactly one family of value
//! assert_eq!(
//!     engine.sadd(Bytes::from("name"), vec![Bytes::from("x")]),
//!     Err(StoreError::WrongType)
//! );
//! ```

pub mod engine;
pub mod expiry;
pub mod value;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageStats};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpiryIndex, ExpirySweeper};
pub use value::{StoreError, StoreResult, Value};
