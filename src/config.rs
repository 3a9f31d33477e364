//! Server configuration from command-line arguments.

use crate::protocol::Framing;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Snapshot file used when none is given.
pub const DEFAULT_SNAPSHOT_PATH: &str = "snapshot.json";

/// Errors from parsing the command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value '{value}' for {flag}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Snapshot file; `None` disables loading and saving
    pub snapshot: Option<PathBuf>,
    /// Time between periodic snapshot saves
    pub snapshot_interval: Duration,
    /// Time between active expiry sweeps
    pub sweep_interval: Duration,
    /// Wire framing
    pub framing: Framing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            snapshot: Some(PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
            snapshot_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_millis(100),
            framing: Framing::Resp,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Run(Config),
    Help,
    Version,
}

impl Config {
    /// Parses arguments, not including the program name.
    pub fn from_args<I>(args: I) -> Result<CliAction, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => config.host = required(&arg, args.next())?,
                "--port" | "-p" => config.port = parse_value(&arg, args.next())?,
                "--snapshot" => {
                    config.snapshot = Some(PathBuf::from(required(&arg, args.next())?))
                }
                "--no-snapshot" => config.snapshot = None,
                "--snapshot-interval" => {
                    let secs: u64 = parse_value(&arg, args.next())?;
                    config.snapshot_interval = positive(&arg, Duration::from_secs(secs))?;
                }
                "--sweep-interval" => {
                    let ms: u64 = parse_value(&arg, args.next())?;
                    config.sweep_interval = positive(&arg, Duration::from_millis(ms))?;
                }
                "--protocol" => config.framing = parse_value(&arg, args.next())?,
                "--help" => return Ok(CliAction::Help),
                "--version" | "-v" => return Ok(CliAction::Version),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(CliAction::Run(config))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(flag: &str, value: Option<String>) -> Result<String, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, ConfigError> {
    let value = required(flag, value)?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value,
    })
}

fn positive(flag: &str, interval: Duration) -> Result<Duration, ConfigError> {
    if interval.is_zero() {
        return Err(ConfigError::InvalidValue {
            flag: flag.to_string(),
            value: "0".to_string(),
        });
    }
    Ok(interval)
}

/// Text printed for `--help`.
pub fn help_text() -> String {
    format!(
        r#"
TallyKV - An In-Memory Multi-Type Key-Value Store

USAGE:
    tallykv [OPTIONS]

OPTIONS:
    -h, --host <HOST>               Host to bind to (default: {host})
    -p, --port <PORT>               Port to listen on (default: {port})
        --snapshot <PATH>           Snapshot file (default: {snapshot})
        --no-snapshot               Don't load or save snapshots
        --snapshot-interval <SECS>  Seconds between snapshot saves (default: 30)
        --sweep-interval <MS>       Milliseconds between expiry sweeps (default: 100)
        --protocol <resp|inline>    Wire framing (default: resp)
    -v, --version                   Print version information
        --help                      Print this help message

EXAMPLES:
    tallykv                         # Start on {host}:{port}
    tallykv --port 6380             # Start on port 6380
    tallykv --protocol inline       # Plain text lines, try it with nc

CONNECTING:
    $ redis-cli -p {port}
    127.0.0.1:{port}> SET name "Ariz"
    OK
    127.0.0.1:{port}> LPUSH queue a b
    (integer) 2
"#,
        host = DEFAULT_HOST,
        port = DEFAULT_PORT,
        snapshot = DEFAULT_SNAPSHOT_PATH,
    )
}
