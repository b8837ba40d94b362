//! Job queue metrics for BullMQ queues stored in Redis.
//!
//! BullMQ keeps each queue under `bull:<queue>:*`. The queue size is the sum
//! of the waiting list, the active list, and the delayed jobs whose time has
//! come. BullMQ may park a marker entry (an id starting with `0:`) at the
//! tail of the waiting list; it is not a job and is not counted.

use std::time::{SystemTime, UNIX_EPOCH};

use redis::Value;
use tracing::debug;

use hirefire_core::{EnvSource, ProcessEnv};

use crate::error::MacroError;

/// Variables consulted, in order, when no connection URL is given.
pub const REDIS_URL_VARS: [&str; 5] = [
    "REDIS_TLS_URL",
    "REDIS_URL",
    "REDISTOGO_URL",
    "REDISCLOUD_URL",
    "OPENREDIS_URL",
];

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// BullMQ encodes delayed job scores as `timestamp_ms * 0x1000`.
const DELAYED_SCORE_FACTOR: u64 = 0x1000;

const MARKER_PREFIX: &str = "0:";

#[derive(Debug, Clone, Default)]
pub struct BullMqOptions {
    /// Redis URL; overrides the environment.
    pub connection: Option<String>,
}

impl BullMqOptions {
    pub fn connection(url: impl Into<String>) -> Self {
        Self {
            connection: Some(url.into()),
        }
    }
}

/// Counts read for one queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub last_waiting: Option<String>,
    pub waiting: u64,
    pub active: u64,
    pub delayed: u64,
}

impl QueueCounts {
    fn total(&self) -> u64 {
        let total = self.waiting + self.active + self.delayed;
        match &self.last_waiting {
            Some(id) if id.starts_with(MARKER_PREFIX) => total.saturating_sub(1),
            _ => total,
        }
    }
}

/// Total job queue size across `queues`, reading the Redis URL from the
/// process environment unless `options` names one.
pub async fn job_queue_size<S: AsRef<str>>(
    queues: &[S],
    options: BullMqOptions,
) -> Result<u64, MacroError> {
    job_queue_size_with_env(queues, options, &ProcessEnv).await
}

/// Same as [`job_queue_size`] with an explicit variable source.
pub async fn job_queue_size_with_env<S: AsRef<str>>(
    queues: &[S],
    options: BullMqOptions,
    env: &dyn EnvSource,
) -> Result<u64, MacroError> {
    if queues.is_empty() {
        return Err(MacroError::MissingQueue);
    }

    let url = resolve_redis_url(&options, env);
    let client = redis::Client::open(url.as_str())?;
    let mut conn = client.get_multiplexed_async_connection().await?;

    let pipe = queue_size_pipeline(queues, now_millis());
    let values: Vec<Value> = pipe.query_async(&mut conn).await?;
    let counts = parse_counts(&values)?;

    let total = tally(&counts);
    debug!(queues = queues.len(), total, "measured bullmq job queue size");
    Ok(total)
}

/// BullMQ does not record enqueue times in a form usable for latency.
pub async fn job_queue_latency<S: AsRef<str>>(
    _queues: &[S],
    _options: BullMqOptions,
) -> Result<u64, MacroError> {
    Err(MacroError::JobQueueLatencyUnsupported("BullMQ".to_string()))
}

/// First non-empty of: the explicit connection, the Redis URL variables,
/// the local default.
pub fn resolve_redis_url(options: &BullMqOptions, env: &dyn EnvSource) -> String {
    if let Some(url) = options.connection.as_deref().filter(|u| !u.is_empty()) {
        return url.to_string();
    }

    REDIS_URL_VARS
        .iter()
        .filter_map(|key| env.var(key))
        .find(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string())
}

/// Four commands per queue, in order: tail of the waiting list, waiting
/// length, active length, due delayed jobs.
pub fn queue_size_pipeline<S: AsRef<str>>(queues: &[S], now_ms: u64) -> redis::Pipeline {
    let max_score = now_ms.saturating_mul(DELAYED_SCORE_FACTOR);
    let mut pipe = redis::pipe();

    for queue in queues {
        let queue = queue.as_ref();
        let wait = format!("bull:{queue}:wait");

        pipe.cmd("LINDEX").arg(&wait).arg(-1);
        pipe.cmd("LLEN").arg(&wait);
        pipe.cmd("LLEN").arg(format!("bull:{queue}:active"));
        pipe.cmd("ZCOUNT")
            .arg(format!("bull:{queue}:delayed"))
            .arg("-inf")
            .arg(max_score);
    }
    pipe
}

fn parse_counts(values: &[Value]) -> Result<Vec<QueueCounts>, MacroError> {
    values
        .chunks_exact(4)
        .map(|chunk| {
            Ok(QueueCounts {
                last_waiting: redis::from_redis_value(&chunk[0])?,
                waiting: redis::from_redis_value::<Option<u64>>(&chunk[1])?.unwrap_or(0),
                active: redis::from_redis_value::<Option<u64>>(&chunk[2])?.unwrap_or(0),
                delayed: redis::from_redis_value::<Option<u64>>(&chunk[3])?.unwrap_or(0),
            })
        })
        .collect()
}

pub fn tally(counts: &[QueueCounts]) -> u64 {
    counts.iter().map(QueueCounts::total).sum()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
