//! Redis-backed job store.
//!
//! Layout under a configurable prefix:
//!
//! ```text
//! {prefix}:job:{id}            JSON document
//! {prefix}:jobs:by_created     ZSET id -> created_at (ms)
//! {prefix}:jobs:owner:{owner}  ZSET id -> created_at (ms)
//! ```
//!
//! Updates are read-modify-write with a Lua compare-and-set on the whole
//! document, retried a bounded number of times under contention.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::Script;
use tracing::{debug, info, warn};
use vgen_models::{Job, JobId, JobQuery, JobUpdate, NewJob};

use crate::error::{StoreError, StoreResult};
use crate::store::{is_in_flight, is_unsubmitted, page, sort_newest_first, JobStore};

const CAS_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  redis.call('SET', KEYS[1], ARGV[2])
  return 1
end
return 0
"#;

/// Redis store configuration.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key prefix
    pub prefix: String,
    /// Compare-and-set attempts per update
    pub cas_retries: u32,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            prefix: "vgen".to_string(),
            cas_retries: 8,
        }
    }
}

impl RedisStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            prefix: std::env::var("JOB_STORE_PREFIX").unwrap_or_else(|_| "vgen".to_string()),
            cas_retries: std::env::var("JOB_STORE_CAS_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(8),
        }
    }
}

/// Inclusive `ZREVRANGE` ranks for a page, or `None` when the page is past
/// the end. Ranks must never go negative: Redis reads those from the tail.
fn rank_range(offset: usize, limit: usize, total: usize) -> Option<(isize, isize)> {
    if limit == 0 || offset >= total {
        return None;
    }
    let last = offset.saturating_add(limit).min(total) - 1;
    Some((isize::try_from(offset).ok()?, isize::try_from(last).ok()?))
}

/// Job store persisted in Redis.
pub struct RedisJobStore {
    client: redis::Client,
    config: RedisStoreConfig,
    cas: Script,
}

impl RedisJobStore {
    pub fn new(config: RedisStoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            config,
            cas: Script::new(CAS_SCRIPT),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(RedisStoreConfig::from_env())
    }

    /// Check connectivity.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        info!(prefix = %self.config.prefix, "Connected to Redis job store");
        Ok(())
    }

    async fn conn(&self) -> StoreResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn job_key(&self, id: &str) -> String {
        format!("{}:job:{}", self.config.prefix, id)
    }

    fn created_index(&self) -> String {
        format!("{}:jobs:by_created", self.config.prefix)
    }

    fn owner_index(&self, owner_id: &str) -> String {
        format!("{}:jobs:owner:{}", self.config.prefix, owner_id)
    }

    async fn load_raw(
        &self,
        conn: &mut MultiplexedConnection,
        id: &JobId,
    ) -> StoreResult<Option<String>> {
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.job_key(id.as_str()))
            .query_async(conn)
            .await?;
        Ok(raw)
    }

    /// Fetch documents for a list of IDs, skipping any that vanished.
    async fn load_many(
        &self,
        conn: &mut MultiplexedConnection,
        ids: &[String],
    ) -> StoreResult<Vec<Job>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.job_key(id)).collect();
        let docs: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(conn).await?;

        let mut jobs = Vec::with_capacity(docs.len());
        for doc in docs.into_iter().flatten() {
            jobs.push(serde_json::from_str::<Job>(&doc)?);
        }
        Ok(jobs)
    }

    async fn index_ids(
        &self,
        conn: &mut MultiplexedConnection,
        index: &str,
        start: isize,
        stop: isize,
    ) -> StoreResult<Vec<String>> {
        let ids: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(index)
            .arg(start)
            .arg(stop)
            .query_async(conn)
            .await?;
        Ok(ids)
    }

    /// Every job in the creation index that passes `keep`, newest first.
    async fn scan_where(&self, keep: fn(&Job) -> bool) -> StoreResult<Vec<Job>> {
        let mut conn = self.conn().await?;
        let ids = self
            .index_ids(&mut conn, &self.created_index(), 0, -1)
            .await?;
        let mut jobs: Vec<Job> = self
            .load_many(&mut conn, &ids)
            .await?
            .into_iter()
            .filter(|job| keep(job))
            .collect();
        sort_newest_first(&mut jobs);
        Ok(jobs)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn create(&self, new: NewJob) -> StoreResult<Job> {
        let mut conn = self.conn().await?;
        let owner_index = self.owner_index(&new.owner_id);

        let id = JobId::new();
        let job = Job::create(id.clone(), new, Utc::now())
            .map_err(|e| StoreError::from_transition(&id, e))?;
        let doc = serde_json::to_string(&job)?;

        let created: bool = redis::cmd("SET")
            .arg(self.job_key(id.as_str()))
            .arg(&doc)
            .arg("NX")
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();
        if !created {
            return Err(StoreError::Contention(id.to_string()));
        }

        let score = job.created_at.timestamp_millis();
        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(self.created_index())
            .arg(score)
            .arg(id.as_str())
            .ignore()
            .cmd("ZADD")
            .arg(owner_index)
            .arg(score)
            .arg(id.as_str())
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(job_id = %job.id, status = %job.status, "Created job");
        Ok(job)
    }

    async fn get(&self, id: &JobId) -> StoreResult<Job> {
        let mut conn = self.conn().await?;
        let raw = self
            .load_raw(&mut conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found(id))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn list(&self, query: &JobQuery) -> StoreResult<(Vec<Job>, usize)> {
        let query = query.clamped();
        let mut conn = self.conn().await?;
        let index = match &query.owner_id {
            Some(owner) => self.owner_index(owner),
            None => self.created_index(),
        };

        if query.status.is_none() {
            let total: usize = redis::cmd("ZCARD")
                .arg(&index)
                .query_async(&mut conn)
                .await?;
            let Some((start, stop)) = rank_range(query.offset, query.limit, total) else {
                return Ok((Vec::new(), total));
            };
            let ids = self.index_ids(&mut conn, &index, start, stop).await?;
            let mut jobs = self.load_many(&mut conn, &ids).await?;
            sort_newest_first(&mut jobs);
            return Ok((jobs, total));
        }

        // Status is not indexed, so filter the full index.
        let ids = self.index_ids(&mut conn, &index, 0, -1).await?;
        let mut matching: Vec<Job> = self
            .load_many(&mut conn, &ids)
            .await?
            .into_iter()
            .filter(|job| query.matches(job))
            .collect();
        sort_newest_first(&mut matching);
        Ok(page(matching, &query))
    }

    async fn update(&self, id: &JobId, update: JobUpdate) -> StoreResult<Job> {
        let mut conn = self.conn().await?;
        let key = self.job_key(id.as_str());

        for attempt in 1..=self.config.cas_retries {
            let current = self
                .load_raw(&mut conn, id)
                .await?
                .ok_or_else(|| StoreError::not_found(id))?;

            let mut job: Job = serde_json::from_str(&current)?;
            job.apply(update.clone(), Utc::now())
                .map_err(|e| StoreError::from_transition(id, e))?;
            let next = serde_json::to_string(&job)?;

            let swapped: i64 = self
                .cas
                .key(&key)
                .arg(&current)
                .arg(&next)
                .invoke_async(&mut conn)
                .await?;
            if swapped == 1 {
                debug!(job_id = %id, status = %job.status, "Updated job");
                return Ok(job);
            }

            debug!(job_id = %id, attempt, "Job changed concurrently, retrying update");
        }

        warn!(
            job_id = %id,
            retries = self.config.cas_retries,
            "Giving up on contended job update"
        );
        Err(StoreError::Contention(id.to_string()))
    }

    async fn delete(&self, id: &JobId) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let Some(raw) = self.load_raw(&mut conn, id).await? else {
            return Ok(false);
        };
        let job: Job = serde_json::from_str(&raw)?;

        let (removed,): (i64,) = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(self.job_key(id.as_str()))
            .cmd("ZREM")
            .arg(self.created_index())
            .arg(id.as_str())
            .ignore()
            .cmd("ZREM")
            .arg(self.owner_index(&job.owner_id))
            .arg(id.as_str())
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(removed > 0)
    }

    async fn list_in_flight(&self) -> StoreResult<Vec<Job>> {
        self.scan_where(is_in_flight).await
    }

    async fn list_unsubmitted(&self) -> StoreResult<Vec<Job>> {
        self.scan_where(is_unsubmitted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RedisStoreConfig::default();
        assert_eq!(config.prefix, "vgen");
        assert_eq!(config.cas_retries, 8);
    }

    #[test]
    fn test_key_layout() {
        let store = RedisJobStore::new(RedisStoreConfig {
            prefix: "test".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(store.job_key("abc"), "test:job:abc");
        assert_eq!(store.created_index(), "test:jobs:by_created");
        assert_eq!(store.owner_index("u1"), "test:jobs:owner:u1");
    }

    #[test]
    fn test_rank_range_pages() {
        assert_eq!(rank_range(0, 10, 25), Some((0, 9)));
        assert_eq!(rank_range(20, 10, 25), Some((20, 24)));
        assert_eq!(rank_range(24, 10, 25), Some((24, 24)));
    }

    #[test]
    fn test_rank_range_past_end_is_empty() {
        assert_eq!(rank_range(25, 10, 25), None);
        assert_eq!(rank_range(0, 10, 0), None);
        assert_eq!(rank_range(usize::MAX, 100, 25), None);
        assert_eq!(rank_range(isize::MAX as usize + 1, 10, 25), None);
    }

    #[test]
    fn test_rank_range_never_overflows() {
        assert_eq!(rank_range(5, usize::MAX, 1_000), Some((5, 999)));
        // Ranks beyond isize are unrepresentable.
        assert_eq!(rank_range(5, usize::MAX, usize::MAX), None);
    }
}
