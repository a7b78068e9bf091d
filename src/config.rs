//! Environment-driven configuration.
//!
//! Every option has a sensible default; variables use the `CLUBHOUSE_`
//! prefix.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context as _;

#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem path of the event journal.
    pub event_journal_path: PathBuf,

    /// SQL connection string of the read model.
    pub read_model_url: String,

    /// How long the projection worker sleeps when the log is drained.
    pub worker_poll_interval: Duration,

    /// Maximum retries for a command failing with a version conflict.
    pub command_retry_limit: u32,

    /// Base retry backoff, doubled per attempt (plus jitter).
    pub command_retry_backoff: Duration,

    /// Maximum number of events fetched from the log per projection read.
    pub projection_batch_size: usize,

    /// Wipe the read model on boot and re-project from position 0.
    pub reset_read_model: bool,

    /// Address the WebSocket server binds to.
    pub bind_addr: SocketAddr,
}

fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid value for {name}: {value:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            event_journal_path: var_or(
                "CLUBHOUSE_EVENT_JOURNAL_PATH",
                PathBuf::from("./clubhouse-journal.json"),
            )?,
            read_model_url: var_or(
                "CLUBHOUSE_READ_MODEL_URL",
                "sqlite://clubhouse-read-model.db".to_owned(),
            )?,
            worker_poll_interval: Duration::from_millis(var_or(
                "CLUBHOUSE_WORKER_POLL_INTERVAL_MS",
                1_000,
            )?),
            command_retry_limit: var_or("CLUBHOUSE_COMMAND_RETRY_LIMIT", 3)?,
            command_retry_backoff: Duration::from_millis(var_or(
                "CLUBHOUSE_COMMAND_RETRY_BACKOFF_MS",
                1,
            )?),
            projection_batch_size: var_or("CLUBHOUSE_PROJECTION_BATCH_SIZE", 64)?,
            reset_read_model: var_or("CLUBHOUSE_RESET_READ_MODEL", false)?,
            bind_addr: var_or("CLUBHOUSE_BIND_ADDR", "0.0.0.0:8000".parse()?)?,
        })
    }
}
