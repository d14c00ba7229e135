//! Short-lived cache for queue statistics.
//!
//! Stats are counted straight from the queue store, so the monitor caches the
//! snapshot briefly. Redis is used when available (`SET key value EX ttl`);
//! the in-process cache serves single-process setups and tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;

use crate::monitor::QueueStats;

const STATS_KEY: &str = "queue:stats";

#[async_trait]
pub trait StatsCache: Send + Sync {
    async fn get(&self) -> anyhow::Result<Option<QueueStats>>;

    async fn put(&self, stats: &QueueStats, ttl: Duration) -> anyhow::Result<()>;
}

/// Redis-backed stats cache; expiry is left to Redis.
pub struct RedisStatsCache {
    redis: ConnectionManager,
}

impl RedisStatsCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl StatsCache for RedisStatsCache {
    async fn get(&self) -> anyhow::Result<Option<QueueStats>> {
        let mut redis = self.redis.clone();
        let raw: Option<String> = redis.get(STATS_KEY).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, stats: &QueueStats, ttl: Duration) -> anyhow::Result<()> {
        let mut redis = self.redis.clone();
        let raw = serde_json::to_string(stats)?;
        redis
            .set_ex::<_, _, ()>(STATS_KEY, raw, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }
}

/// In-process stats cache holding a single entry.
#[derive(Default)]
pub struct LocalStatsCache {
    entry: Mutex<Option<(Instant, QueueStats)>>,
}

impl LocalStatsCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsCache for LocalStatsCache {
    async fn get(&self) -> anyhow::Result<Option<QueueStats>> {
        let entry = self.entry.lock().await;
        Ok(entry
            .as_ref()
            .filter(|(expires_at, _)| Instant::now() < *expires_at)
            .map(|(_, stats)| stats.clone()))
    }

    async fn put(&self, stats: &QueueStats, ttl: Duration) -> anyhow::Result<()> {
        *self.entry.lock().await = Some((Instant::now() + ttl, stats.clone()));
        Ok(())
    }
}
