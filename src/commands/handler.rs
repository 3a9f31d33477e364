//! Command handlers.
//!
//! `execute` resolves the command through the table, checks its arity and
//! calls one of the `cmd_*` methods below. Each handler turns the store's
//! result into exactly one reply.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │  lookup()   │───>│  arity ok?  │───>│   cmd_*()   │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::commands::table;
use crate::protocol::RespValue;
use crate::storage::{StorageEngine, StoreResult};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Runs commands against a shared storage engine.
///
/// Cheap to clone; every connection gets its own handle.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Executes one request and returns its reply.
    ///
    /// `args` holds the command name followed by its arguments. Command names
    /// are case-insensitive.
    pub fn execute(&self, args: Vec<Bytes>) -> RespValue {
        let Some((name, rest)) = args.split_first() else {
            return RespValue::error("ERR empty command");
        };

        let name = String::from_utf8_lossy(name).to_ascii_uppercase();
        let Some(spec) = table::lookup(&name) else {
            return RespValue::error(format!("ERR unknown command '{}'", name));
        };

        if !spec.arity.accepts(rest.len()) {
            return RespValue::error(format!(
                "ERR wrong number of arguments for '{}' command",
                spec.name
            ));
        }

        (spec.run)(self, rest)
    }

    // ========================================================================
    // Scalar Commands
    // ========================================================================

    /// SET key value [ttl-seconds]
    ///
    /// A TTL of 0 means no expiry.
    pub(super) fn cmd_set(&self, args: &[Bytes]) -> RespValue {
        let key = args[0].clone();
        let value = args[1].clone();

        let ttl = match args.get(2).map(|raw| parse_ttl(raw)) {
            None => None,
            Some(Some(secs)) => Some(secs),
            Some(None) => return RespValue::error("ERR invalid TTL value"),
        };

        let result = match ttl {
            Some(secs) if secs > 0 => {
                self.storage
                    .set_with_ttl(key, value, Duration::from_secs(secs))
            }
            _ => self.storage.set(key, value),
        };
        reply(result, |()| RespValue::ok())
    }

    /// GET key
    pub(super) fn cmd_get(&self, args: &[Bytes]) -> RespValue {
        reply(self.storage.get(&args[0]), RespValue::bulk_or_null)
    }

    /// DEL key [key ...]
    pub(super) fn cmd_del(&self, args: &[Bytes]) -> RespValue {
        RespValue::integer(self.storage.delete_many(args) as i64)
    }

    // ========================================================================
    // List Commands
    // ========================================================================

    /// LPUSH key value [value ...]
    pub(super) fn cmd_lpush(&self, args: &[Bytes]) -> RespValue {
        let result = self.storage.lpush(args[0].clone(), args[1..].to_vec());
        reply(result, |len| RespValue::integer(len as i64))
    }

    /// RPUSH key value [value ...]
    pub(super) fn cmd_rpush(&self, args: &[Bytes]) -> RespValue {
        let result = self.storage.rpush(args[0].clone(), args[1..].to_vec());
        reply(result, |len| RespValue::integer(len as i64))
    }

    /// LPOP key
    pub(super) fn cmd_lpop(&self, args: &[Bytes]) -> RespValue {
        reply(self.storage.lpop(&args[0]), RespValue::bulk_or_null)
    }

    /// RPOP key
    pub(super) fn cmd_rpop(&self, args: &[Bytes]) -> RespValue {
        reply(self.storage.rpop(&args[0]), RespValue::bulk_or_null)
    }

    // ========================================================================
    // Hash Commands
    // ========================================================================

    /// HSET key field value
    pub(super) fn cmd_hset(&self, args: &[Bytes]) -> RespValue {
        let result = self
            .storage
            .hset(args[0].clone(), args[1].clone(), args[2].clone());
        reply(result, |created| RespValue::integer(created as i64))
    }

    /// HGET key field
    pub(super) fn cmd_hget(&self, args: &[Bytes]) -> RespValue {
        reply(
            self.storage.hget(&args[0], &args[1]),
            RespValue::bulk_or_null,
        )
    }

    // ========================================================================
    // Set Commands
    // ========================================================================

    /// SADD key member [member ...]
    pub(super) fn cmd_sadd(&self, args: &[Bytes]) -> RespValue {
        let result = self.storage.sadd(args[0].clone(), args[1..].to_vec());
        reply(result, |added| RespValue::integer(added as i64))
    }

    /// SREM key member [member ...]
    pub(super) fn cmd_srem(&self, args: &[Bytes]) -> RespValue {
        let result = self.storage.srem(&args[0], &args[1..]);
        reply(result, |removed| RespValue::integer(removed as i64))
    }

    /// SMEMBERS key
    ///
    /// Null for a missing key, an empty array for an empty set.
    pub(super) fn cmd_smembers(&self, args: &[Bytes]) -> RespValue {
        reply(self.storage.smembers(&args[0]), |members| match members {
            Some(members) => RespValue::bulk_array(members),
            None => RespValue::null(),
        })
    }
}

/// Converts a store result into a reply, mapping errors to error replies.
fn reply<T>(result: StoreResult<T>, ok: impl FnOnce(T) -> RespValue) -> RespValue {
    match result {
        Ok(value) => ok(value),
        Err(e) => RespValue::error(e.to_string()),
    }
}

/// Parses a non-negative TTL in seconds.
fn parse_ttl(raw: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(raw).ok()?;
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_handler() -> CommandHandler {
        let storage = Arc::new(StorageEngine::new());
        CommandHandler::new(storage)
    }

    fn make_command(args: &[&str]) -> Vec<Bytes> {
        args.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    fn sorted_members(reply: RespValue) -> Vec<Bytes> {
        let mut members: Vec<Bytes> = reply
            .into_array()
            .unwrap()
            .into_iter()
            .map(|v| v.into_bytes().unwrap())
            .collect();
        members.sort();
        members
    }

    #[test]
    fn test_set_get() {
        let handler = create_handler();

        let response = handler.execute(make_command(&["SET", "key", "value"]));
        assert_eq!(response, RespValue::ok());

        let response = handler.execute(make_command(&["get", "key"]));
        assert_eq!(response, RespValue::bulk_string(Bytes::from("value")));
    }

    #[test]
    fn test_get_nonexistent() {
        let handler = create_handler();

        let response = handler.execute(make_command(&["GET", "nonexistent"]));
        assert_eq!(response, RespValue::null());
    }

    #[test]
    fn test_set_with_ttl() {
        let handler = create_handler();

        assert_eq!(
            handler.execute(make_command(&["SET", "k", "v", "100"])),
            RespValue::ok()
        );
        let ttl = handler.storage().ttl(b"k").unwrap();
        assert!(ttl > Duration::from_secs(99));

        // Zero clears the deadline
        handler.execute(make_command(&["SET", "k", "v", "0"]));
        assert_eq!(handler.storage().ttl(b"k"), None);
    }

    #[test]
    fn test_set_invalid_ttl() {
        let handler = create_handler();

        for bad in ["abc", "-5", "1.5", ""] {
            let response = handler.execute(make_command(&["SET", "k", "v", bad]));
            assert_eq!(response, RespValue::error("ERR invalid TTL value"));
        }
        assert_eq!(handler.execute(make_command(&["GET", "k"])), RespValue::null());
    }

    #[test]
    fn test_set_ttl_too_large() {
        let handler = create_handler();

        for huge in ["10000000000000000000", "100000000000000000", "99999999999999999999"] {
            let response = handler.execute(make_command(&["SET", "k", "v", huge]));
            assert_eq!(response, RespValue::error("ERR invalid TTL value"));
        }
        assert_eq!(handler.execute(make_command(&["GET", "k"])), RespValue::null());

        // Still serving afterwards
        handler.execute(make_command(&["SET", "k", "v", "10"]));
        assert_eq!(
            handler.execute(make_command(&["GET", "k"])),
            RespValue::bulk_string(Bytes::from("v"))
        );
    }

    #[test]
    fn test_del() {
        let handler = create_handler();

        handler.execute(make_command(&["SET", "key1", "value1"]));
        handler.execute(make_command(&["RPUSH", "key2", "a"]));

        let response = handler.execute(make_command(&["DEL", "key1", "key2", "key3"]));
        assert_eq!(response, RespValue::integer(2));

        let response = handler.execute(make_command(&["DEL", "key1"]));
        assert_eq!(response, RespValue::integer(0));
    }

    #[test]
    fn test_list_commands() {
        let handler = create_handler();

        assert_eq!(
            handler.execute(make_command(&["RPUSH", "l", "x"])),
            RespValue::integer(1)
        );
        assert_eq!(
            handler.execute(make_command(&["LPUSH", "l", "a", "b"])),
            RespValue::integer(3)
        );
        assert_eq!(
            handler.execute(make_command(&["LPOP", "l"])),
            RespValue::bulk_string(Bytes::from("a"))
        );
        assert_eq!(
            handler.execute(make_command(&["RPOP", "l"])),
            RespValue::bulk_string(Bytes::from("x"))
        );
        assert_eq!(
            handler.execute(make_command(&["LPOP", "l"])),
            RespValue::bulk_string(Bytes::from("b"))
        );
        assert_eq!(handler.execute(make_command(&["LPOP", "l"])), RespValue::null());
        assert_eq!(handler.execute(make_command(&["RPOP", "nope"])), RespValue::null());
    }

    #[test]
    fn test_hash_commands() {
        let handler = create_handler();

        assert_eq!(
            handler.execute(make_command(&["HSET", "h", "f", "1"])),
            RespValue::integer(1)
        );
        assert_eq!(
            handler.execute(make_command(&["HSET", "h", "f", "2"])),
            RespValue::integer(0)
        );
        assert_eq!(
            handler.execute(make_command(&["HGET", "h", "f"])),
            RespValue::bulk_string(Bytes::from("2"))
        );
        assert_eq!(
            handler.execute(make_command(&["HGET", "h", "missing"])),
            RespValue::null()
        );
    }

    #[test]
    fn test_set_commands() {
        let handler = create_handler();

        assert_eq!(
            handler.execute(make_command(&["SADD", "s", "x", "x", "y"])),
            RespValue::integer(2)
        );
        assert_eq!(
            handler.execute(make_command(&["SADD", "s", "x"])),
            RespValue::integer(0)
        );
        assert_eq!(
            sorted_members(handler.execute(make_command(&["SMEMBERS", "s"]))),
            make_command(&["x", "y"])
        );
        assert_eq!(
            handler.execute(make_command(&["SREM", "s", "x", "y", "z"])),
            RespValue::integer(2)
        );
        assert_eq!(
            handler.execute(make_command(&["SMEMBERS", "s"])),
            RespValue::array(vec![])
        );
        assert_eq!(
            handler.execute(make_command(&["SMEMBERS", "missing"])),
            RespValue::null()
        );
    }

    #[test]
    fn test_wrong_type() {
        let handler = create_handler();

        handler.execute(make_command(&["SADD", "s", "m"]));
        let response = handler.execute(make_command(&["GET", "s"]));
        assert_eq!(
            response,
            RespValue::error("WRONGTYPE Operation against a key holding the wrong kind of value")
        );
        assert!(handler.execute(make_command(&["LPUSH", "s", "a"])).is_error());
        assert!(handler.execute(make_command(&["HGET", "s", "f"])).is_error());
    }

    #[test]
    fn test_wrong_arity() {
        let handler = create_handler();

        assert_eq!(
            handler.execute(make_command(&["set", "only-key"])),
            RespValue::error("ERR wrong number of arguments for 'SET' command")
        );
        assert_eq!(
            handler.execute(make_command(&["HSET", "h", "f"])),
            RespValue::error("ERR wrong number of arguments for 'HSET' command")
        );
        assert!(handler.execute(make_command(&["SET", "k", "v", "1", "x"])).is_error());
        assert!(handler.execute(make_command(&["DEL"])).is_error());
    }

    #[test]
    fn test_unknown_command() {
        let handler = create_handler();

        let response = handler.execute(make_command(&["flushall"]));
        assert_eq!(response, RespValue::error("ERR unknown command 'FLUSHALL'"));
    }

    #[test]
    fn test_unknown_command_with_line_breaks_is_one_reply() {
        let handler = create_handler();

        let response = handler.execute(make_command(&["FOO\r\n+OK\r\n:1"]));
        let wire = response.serialize();

        let (parsed, consumed) = crate::protocol::RespParser::new()
            .parse(&wire)
            .unwrap()
            .unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(
            parsed,
            RespValue::error("ERR unknown command 'FOO  +OK  :1'")
        );
    }

    #[test]
    fn test_empty_command() {
        let handler = create_handler();
        assert_eq!(
            handler.execute(vec![]),
            RespValue::error("ERR empty command")
        );
    }

    #[test]
    fn test_binary_values() {
        let handler = create_handler();
        let value = Bytes::from_static(b"\x00\xff\r\n");

        handler.execute(vec![Bytes::from("SET"), Bytes::from("bin"), value.clone()]);
        assert_eq!(
            handler.execute(make_command(&["GET", "bin"])),
            RespValue::bulk_string(value)
        );
    }
}
