//! Async client for TallyKV.
//!
//! Speaks RESP framing: every request goes out as an array of bulk strings
//! and replies are read back with [`RespParser`].
//!
//! ```ignore
//! use tallykv::client::Client;
//!
//! let mut client = Client::connect("127.0.0.1:6379").await?;
//! client.set("name", "Ariz").await?;
//! assert_eq!(client.get("name").await?.as_deref(), Some(&b"Ariz"[..]));
//! ```

use crate::protocol::{ParseError, RespParser, RespValue};
use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Errors returned by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid reply: {0}")]
    Protocol(#[from] ParseError),

    /// The server answered with an error reply
    #[error("server error: {0}")]
    Server(String),

    #[error("unexpected reply: {0:?}")]
    UnexpectedReply(RespValue),

    #[error("connection closed by server")]
    Disconnected,
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A single connection to a server.
///
/// Requests are sent one at a time; each call waits for its reply.
pub struct Client {
    stream: TcpStream,
    buffer: BytesMut,
    parser: RespParser,
}

impl Client {
    /// Connects to a server.
    pub async fn connect(addr: impl ToSocketAddrs) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            parser: RespParser::new(),
        })
    }

    /// Sends one command and returns the raw reply.
    ///
    /// Error replies are returned as [`RespValue::Error`], not as `Err`.
    pub async fn command<I, A>(&mut self, args: I) -> ClientResult<RespValue>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let request =
            RespValue::bulk_array(args.into_iter().map(|a| Bytes::copy_from_slice(a.as_ref())));
        self.stream.write_all(&request.serialize()).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> ClientResult<RespValue> {
        loop {
            if let Some((value, consumed)) = self.parser.parse(&self.buffer)? {
                self.buffer.advance(consumed);
                return Ok(value);
            }

            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                return Err(ClientError::Disconnected);
            }
        }
    }

    /// Sends a command, turning error replies into `ClientError::Server`.
    async fn call<I, A>(&mut self, args: I) -> ClientResult<RespValue>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        match self.command(args).await? {
            RespValue::Error(message) => Err(ClientError::Server(message)),
            reply => Ok(reply),
        }
    }

    async fn call_integer(&mut self, args: Vec<&[u8]>) -> ClientResult<i64> {
        match self.call(args).await? {
            RespValue::Integer(n) => Ok(n),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    async fn call_bulk(&mut self, args: Vec<&[u8]>) -> ClientResult<Option<Bytes>> {
        match self.call(args).await? {
            RespValue::BulkString(data) => Ok(Some(data)),
            RespValue::Null => Ok(None),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    async fn call_ok(&mut self, args: Vec<&[u8]>) -> ClientResult<()> {
        match self.call(args).await? {
            RespValue::SimpleString(s) if s == "OK" => Ok(()),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    pub async fn set(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> ClientResult<()> {
        self.call_ok(vec![&b"SET"[..], key.as_ref(), value.as_ref()]).await
    }

    /// SET with a TTL in seconds. Zero means no expiry.
    pub async fn set_ex(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        ttl_secs: u64,
    ) -> ClientResult<()> {
        let ttl = ttl_secs.to_string();
        self.call_ok(vec![&b"SET"[..], key.as_ref(), value.as_ref(), ttl.as_bytes()])
            .await
    }

    pub async fn get(&mut self, key: impl AsRef<[u8]>) -> ClientResult<Option<Bytes>> {
        self.call_bulk(vec![&b"GET"[..], key.as_ref()]).await
    }

    /// Returns the number of keys that existed.
    pub async fn del<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![&b"DEL"[..]];
        args.extend(keys.iter().map(|k| k.as_ref()));
        self.call_integer(args).await
    }

    /// Returns the new length of the list.
    pub async fn lpush<V: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        values: &[V],
    ) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![&b"LPUSH"[..], key.as_ref()];
        args.extend(values.iter().map(|v| v.as_ref()));
        self.call_integer(args).await
    }

    /// Returns the new length of the list.
    pub async fn rpush<V: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        values: &[V],
    ) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![&b"RPUSH"[..], key.as_ref()];
        args.extend(values.iter().map(|v| v.as_ref()));
        self.call_integer(args).await
    }

    pub async fn lpop(&mut self, key: impl AsRef<[u8]>) -> ClientResult<Option<Bytes>> {
        self.call_bulk(vec![&b"LPOP"[..], key.as_ref()]).await
    }

    pub async fn rpop(&mut self, key: impl AsRef<[u8]>) -> ClientResult<Option<Bytes>> {
        self.call_bulk(vec![&b"RPOP"[..], key.as_ref()]).await
    }

    /// Returns true if the field was created.
    pub async fn hset(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> ClientResult<bool> {
        let created = self
            .call_integer(vec![&b"HSET"[..], key.as_ref(), field.as_ref(), value.as_ref()])
            .await?;
        Ok(created == 1)
    }

    pub async fn hget(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
    ) -> ClientResult<Option<Bytes>> {
        self.call_bulk(vec![&b"HGET"[..], key.as_ref(), field.as_ref()])
            .await
    }

    /// Returns how many members were added.
    pub async fn sadd<M: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        members: &[M],
    ) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![&b"SADD"[..], key.as_ref()];
        args.extend(members.iter().map(|m| m.as_ref()));
        self.call_integer(args).await
    }

    /// Returns how many members were removed.
    pub async fn srem<M: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        members: &[M],
    ) -> ClientResult<i64> {
        let mut args: Vec<&[u8]> = vec![&b"SREM"[..], key.as_ref()];
        args.extend(members.iter().map(|m| m.as_ref()));
        self.call_integer(args).await
    }

    /// `None` when the key doesn't exist.
    pub async fn smembers(&mut self, key: impl AsRef<[u8]>) -> ClientResult<Option<Vec<Bytes>>> {
        match self.call(vec![&b"SMEMBERS"[..], key.as_ref()]).await? {
            RespValue::Null => Ok(None),
            RespValue::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::BulkString(data) => Ok(data),
                    other => Err(ClientError::UnexpectedReply(other)),
                })
                .collect::<ClientResult<Vec<_>>>()
                .map(Some),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }
}
