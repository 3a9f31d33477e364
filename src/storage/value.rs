//! Value types held by the storage engine.

use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Errors returned by storage operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The key exists but holds a different family of value
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The deadline lies beyond what the clock (or a snapshot) can hold
    #[error("ERR invalid TTL value")]
    InvalidTtl,
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A stored value. Every key holds exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A single binary-safe string. The only family that can expire.
    Scalar(Bytes),
    /// Ordered sequence, addressable at both ends
    List(VecDeque<Bytes>),
    /// Field to value mapping
    Hash(HashMap<Bytes, Bytes>),
    /// Unordered unique members
    Set(HashSet<Bytes>),
}

impl Value {
    pub fn empty_list() -> Self {
        Value::List(VecDeque::new())
    }

    pub fn empty_hash() -> Self {
        Value::Hash(HashMap::new())
    }

    pub fn empty_set() -> Self {
        Value::Set(HashSet::new())
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
        }
    }

    pub fn as_scalar(&self) -> StoreResult<&Bytes> {
        match self {
            Value::Scalar(v) => Ok(v),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_list_mut(&mut self) -> StoreResult<&mut VecDeque<Bytes>> {
        match self {
            Value::List(list) => Ok(list),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_hash(&self) -> StoreResult<&HashMap<Bytes, Bytes>> {
        match self {
            Value::Hash(hash) => Ok(hash),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_hash_mut(&mut self) -> StoreResult<&mut HashMap<Bytes, Bytes>> {
        match self {
            Value::Hash(hash) => Ok(hash),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_set(&self) -> StoreResult<&HashSet<Bytes>> {
        match self {
            Value::Set(set) => Ok(set),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_set_mut(&mut self) -> StoreResult<&mut HashSet<Bytes>> {
        match self {
            Value::Set(set) => Ok(set),
            _ => Err(StoreError::WrongType),
        }
    }
}
