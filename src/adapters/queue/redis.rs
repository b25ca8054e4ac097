//! Redis-backed job queue.
//!
//! Layout under `payhook:jobs`:
//!
//! | Key | Type | Contents |
//! |---|---|---|
//! | `payhook:jobs:{id}` | string | job record as JSON |
//! | `payhook:jobs:ready` | list | ids claimable now (LPUSH / RPOP) |
//! | `payhook:jobs:delayed` | sorted set | pending ids scored by due unix millis |
//! | `payhook:jobs:processing` | sorted set | leased ids scored by claim unix millis |
//!
//! Every state change goes through one compare-and-set script that swaps the
//! record only if it still matches what the caller read, then moves the id
//! into the structure matching the new status. Claims pop with `RPOP`, so a
//! ready id reaches at most one worker.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::MultiplexedConnection;
use redis::Script;
use std::time::Duration;

use crate::domain::foundation::{JobId, Timestamp, ValidationError, WebhookEventId};
use crate::domain::job::{EnqueueOptions, JobStatus, WebhookJob};
use crate::ports::{JobQueue, QueueError, QueueStats};

const KEY_PREFIX: &str = "payhook:jobs";

/// Attempts at a compare-and-set before reporting contention.
const CAS_RETRIES: usize = 5;

/// Upper bound on ids moved per promotion run.
const PROMOTE_BATCH: usize = 500;

static SWAP_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local current = redis.call('GET', KEYS[1])
if ARGV[1] == '' then
  if current then return 0 end
elseif current ~= ARGV[1] then
  return 0
end
local ttl = tonumber(ARGV[6])
if ttl > 0 then
  redis.call('SET', KEYS[1], ARGV[2], 'EX', ttl)
else
  redis.call('SET', KEYS[1], ARGV[2])
end
redis.call('LREM', KEYS[2], 0, ARGV[4])
redis.call('ZREM', KEYS[3], ARGV[4])
redis.call('ZREM', KEYS[4], ARGV[4])
if ARGV[3] == 'ready' then
  redis.call('LPUSH', KEYS[2], ARGV[4])
elseif ARGV[3] == 'delayed' then
  redis.call('ZADD', KEYS[3], ARGV[5], ARGV[4])
elseif ARGV[3] == 'processing' then
  redis.call('ZADD', KEYS[4], ARGV[5], ARGV[4])
end
return 1
"#,
    )
});

static PROMOTE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, id in ipairs(ids) do
  redis.call('ZREM', KEYS[1], id)
  redis.call('LPUSH', KEYS[2], id)
end
return #ids
"#,
    )
});

/// Where a job id lives after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Ready,
    Delayed(i64),
    Processing(i64),
    Nowhere,
}

impl Placement {
    fn for_job(job: &WebhookJob, now: Timestamp) -> Self {
        match job.status {
            JobStatus::Pending if job.scheduled_at.is_after(&now) => {
                Placement::Delayed(job.scheduled_at.as_unix_millis())
            }
            JobStatus::Pending => Placement::Ready,
            JobStatus::Processing => Placement::Processing(
                job.claimed_at.unwrap_or(now).as_unix_millis(),
            ),
            JobStatus::Completed | JobStatus::Failed => Placement::Nowhere,
        }
    }

    fn action(&self) -> &'static str {
        match self {
            Placement::Ready => "ready",
            Placement::Delayed(_) => "delayed",
            Placement::Processing(_) => "processing",
            Placement::Nowhere => "none",
        }
    }

    fn score(&self) -> i64 {
        match self {
            Placement::Delayed(score) | Placement::Processing(score) => *score,
            Placement::Ready | Placement::Nowhere => 0,
        }
    }
}

fn job_key(id: &JobId) -> String {
    format!("{}:{}", KEY_PREFIX, id)
}

fn ready_key() -> String {
    format!("{}:ready", KEY_PREFIX)
}

fn delayed_key() -> String {
    format!("{}:delayed", KEY_PREFIX)
}

fn processing_key() -> String {
    format!("{}:processing", KEY_PREFIX)
}

fn unavailable(e: redis::RedisError) -> QueueError {
    QueueError::Unavailable(e.to_string())
}

fn invalid(e: ValidationError) -> QueueError {
    QueueError::InvalidState(e.to_string())
}

fn decode(raw: &str) -> Result<WebhookJob, QueueError> {
    serde_json::from_str(raw).map_err(|e| QueueError::Corrupt(e.to_string()))
}

fn encode(job: &WebhookJob) -> Result<String, QueueError> {
    serde_json::to_string(job).map_err(|e| QueueError::Corrupt(e.to_string()))
}

#[derive(Clone)]
pub struct RedisJobQueue {
    conn: MultiplexedConnection,
    completed_ttl: Option<Duration>,
}

impl RedisJobQueue {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            completed_ttl: None,
        }
    }

    /// Expire completed job records after `ttl` instead of keeping them forever.
    pub fn with_completed_ttl(mut self, ttl: Duration) -> Self {
        self.completed_ttl = Some(ttl).filter(|ttl| !ttl.is_zero());
        self
    }

    async fn load(&self, id: &JobId) -> Result<Option<(String, WebhookJob)>, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(job_key(id))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        match raw {
            Some(raw) => {
                let job = decode(&raw)?;
                Ok(Some((raw, job)))
            }
            None => Ok(None),
        }
    }

    /// Writes `job` if the stored record still equals `expected` (or is
    /// absent when `expected` is empty). Returns whether the swap happened.
    async fn swap(&self, expected: &str, job: &WebhookJob, now: Timestamp) -> Result<bool, QueueError> {
        let placement = Placement::for_job(job, now);
        let ttl = match (job.status, self.completed_ttl) {
            (JobStatus::Completed, Some(ttl)) => ttl.as_secs().max(1),
            _ => 0,
        };

        let mut conn = self.conn.clone();
        let mut invocation = SWAP_SCRIPT.prepare_invoke();
        invocation
            .key(job_key(&job.id))
            .key(ready_key())
            .key(delayed_key())
            .key(processing_key())
            .arg(expected)
            .arg(encode(job)?)
            .arg(placement.action())
            .arg(job.id.to_string())
            .arg(placement.score())
            .arg(ttl);
        let swapped: i64 = invocation.invoke_async(&mut conn).await.map_err(unavailable)?;
        Ok(swapped == 1)
    }

    /// Read-modify-write with optimistic retry.
    async fn update<F>(&self, id: &JobId, mutate: F) -> Result<WebhookJob, QueueError>
    where
        F: Fn(&mut WebhookJob, Timestamp) -> Result<(), ValidationError> + Send + Sync,
    {
        for _ in 0..CAS_RETRIES {
            let (raw, mut job) = self.load(id).await?.ok_or(QueueError::NotFound(*id))?;
            let now = Timestamp::now();
            mutate(&mut job, now).map_err(invalid)?;
            if self.swap(&raw, &job, now).await? {
                return Ok(job);
            }
        }
        Err(QueueError::InvalidState(format!(
            "job {} changed concurrently",
            id
        )))
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn enqueue(
        &self,
        event_id: WebhookEventId,
        options: EnqueueOptions,
    ) -> Result<JobId, QueueError> {
        let now = Timestamp::now();
        let job = WebhookJob::new(event_id, options, now);
        if !self.swap("", &job, now).await? {
            return Err(QueueError::InvalidState(format!("job {} already exists", job.id)));
        }
        Ok(job.id)
    }

    async fn claim_next(&self) -> Result<Option<WebhookJob>, QueueError> {
        let mut conn = self.conn.clone();
        loop {
            let popped: Option<String> = redis::cmd("RPOP")
                .arg(ready_key())
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;
            let Some(raw_id) = popped else {
                return Ok(None);
            };
            let Ok(id) = raw_id.parse::<JobId>() else {
                tracing::warn!(entry = %raw_id, "Dropping malformed id from ready list");
                continue;
            };
            let Some((raw, mut job)) = self.load(&id).await? else {
                continue;
            };
            if job.status != JobStatus::Pending {
                continue;
            }
            let now = Timestamp::now();
            job.claim(now).map_err(invalid)?;
            if self.swap(&raw, &job, now).await? {
                return Ok(Some(job));
            }
            // Record changed between GET and swap (e.g. cancelled); move on.
        }
    }

    async fn complete(&self, id: &JobId) -> Result<(), QueueError> {
        self.update(id, |job, now| job.complete(now)).await.map(|_| ())
    }

    async fn reschedule(&self, id: &JobId, delay: Duration, error: &str) -> Result<(), QueueError> {
        self.update(id, |job, now| job.reschedule(delay, error, now))
            .await
            .map(|_| ())
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<(), QueueError> {
        self.update(id, |job, now| job.fail(error, now)).await.map(|_| ())
    }

    async fn find(&self, id: &JobId) -> Result<Option<WebhookJob>, QueueError> {
        Ok(self.load(id).await?.map(|(_, job)| job))
    }

    async fn requeue(&self, id: &JobId) -> Result<WebhookJob, QueueError> {
        self.update(id, |job, now| job.requeue(now)).await
    }

    async fn cancel(&self, id: &JobId) -> Result<WebhookJob, QueueError> {
        self.update(id, |job, now| job.cancel(now)).await
    }

    async fn promote_due(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let mut invocation = PROMOTE_SCRIPT.prepare_invoke();
        invocation
            .key(delayed_key())
            .key(ready_key())
            .arg(Timestamp::now().as_unix_millis())
            .arg(PROMOTE_BATCH);
        let moved: i64 = invocation.invoke_async(&mut conn).await.map_err(unavailable)?;
        Ok(moved.max(0) as usize)
    }

    async fn reclaim_stalled(&self, lease_ttl: Duration) -> Result<usize, QueueError> {
        let cutoff = Timestamp::now().minus(lease_ttl).as_unix_millis();
        let mut conn = self.conn.clone();
        let ids: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(processing_key())
            .arg("-inf")
            .arg(cutoff)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        let mut reclaimed = 0;
        for raw_id in ids {
            let Ok(id) = raw_id.parse::<JobId>() else {
                continue;
            };
            let result = self
                .update(&id, |job, now| {
                    if !job.lease_expired(lease_ttl, now) {
                        return Err(ValidationError::invalid_format("lease", "still held"));
                    }
                    job.release_stalled(now)
                })
                .await;
            match result {
                Ok(job) => {
                    reclaimed += 1;
                    tracing::warn!(job_id = %id, status = %job.status, "Reclaimed stalled job");
                }
                Err(QueueError::NotFound(_)) | Err(QueueError::InvalidState(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(reclaimed)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", KEY_PREFIX);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;
            keys.extend(batch.into_iter().filter(|key| {
                key.rsplit(':')
                    .next()
                    .map(|suffix| suffix.parse::<JobId>().is_ok())
                    .unwrap_or(false)
            }));
            if next == 0 {
                break;
            }
            cursor = next;
        }

        let now = Timestamp::now();
        let mut stats = QueueStats::default();
        for chunk in keys.chunks(200) {
            let records: Vec<Option<String>> = redis::cmd("MGET")
                .arg(chunk.to_vec())
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;
            for raw in records.into_iter().flatten() {
                let job = decode(&raw)?;
                match job.status {
                    JobStatus::Pending => {
                        stats.pending += 1;
                        if job.scheduled_at.is_after(&now) {
                            stats.delayed += 1;
                        }
                    }
                    JobStatus::Processing => stats.processing += 1,
                    JobStatus::Completed => stats.completed += 1,
                    JobStatus::Failed => stats.failed += 1,
                }
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000)
    }

    fn job() -> WebhookJob {
        WebhookJob::new(WebhookEventId::new(), EnqueueOptions::default(), t0())
    }

    #[test]
    fn keys_share_the_jobs_prefix() {
        let id = JobId::new();
        assert_eq!(job_key(&id), format!("payhook:jobs:{}", id));
        assert_eq!(ready_key(), "payhook:jobs:ready");
        assert_eq!(delayed_key(), "payhook:jobs:delayed");
        assert_eq!(processing_key(), "payhook:jobs:processing");
    }

    #[test]
    fn due_pending_job_goes_to_ready_list() {
        assert_eq!(Placement::for_job(&job(), t0()), Placement::Ready);
    }

    #[test]
    fn future_pending_job_is_scored_by_due_time() {
        let mut job = job();
        job.claim(t0()).unwrap();
        job.reschedule(Duration::from_secs(15), "boom", t0()).unwrap();

        let placement = Placement::for_job(&job, t0());
        assert_eq!(placement.action(), "delayed");
        assert_eq!(placement.score(), t0().as_unix_millis() + 15_000);
    }

    #[test]
    fn leased_job_is_scored_by_claim_time() {
        let mut job = job();
        job.claim(t0()).unwrap();

        let placement = Placement::for_job(&job, t0().plus(Duration::from_secs(9)));
        assert_eq!(placement, Placement::Processing(t0().as_unix_millis()));
    }

    #[test]
    fn terminal_jobs_leave_every_structure() {
        let mut job = job();
        job.cancel(t0()).unwrap();
        assert_eq!(Placement::for_job(&job, t0()).action(), "none");
    }

    #[test]
    fn records_survive_json_encoding() {
        let mut job = job();
        job.claim(t0()).unwrap();
        let decoded = decode(&encode(&job).unwrap()).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn garbage_record_is_reported_as_corrupt() {
        assert!(matches!(decode("not json"), Err(QueueError::Corrupt(_))));
    }

    // Live Redis tests. They clear the shared queue structures, so use a
    // scratch instance: REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored

    static SERIAL: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

    async fn live_queue() -> RedisJobQueue {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
        let client = redis::Client::open(url.as_str()).unwrap();
        let mut conn = client.get_multiplexed_tokio_connection().await.unwrap();
        let _: () = redis::cmd("DEL")
            .arg(ready_key())
            .arg(delayed_key())
            .arg(processing_key())
            .query_async(&mut conn)
            .await
            .unwrap();
        RedisJobQueue::new(conn)
    }

    #[tokio::test]
    #[ignore = "Requires REDIS_URL"]
    async fn concurrent_claims_hand_out_a_job_once() {
        let _serial = SERIAL.lock().await;
        let queue = live_queue().await;
        let id = queue
            .enqueue(WebhookEventId::new(), EnqueueOptions::default())
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.claim_next().await })
            })
            .collect();
        let mut claimed = Vec::new();
        for handle in handles {
            if let Some(job) = handle.await.unwrap().unwrap() {
                claimed.push(job.id);
            }
        }

        assert_eq!(claimed, vec![id]);
    }

    #[tokio::test]
    #[ignore = "Requires REDIS_URL"]
    async fn rescheduled_job_waits_for_its_delay() {
        let _serial = SERIAL.lock().await;
        let queue = live_queue().await;
        let id = queue
            .enqueue(WebhookEventId::new(), EnqueueOptions::default())
            .await
            .unwrap();
        assert_eq!(queue.claim_next().await.unwrap().map(|job| job.id), Some(id));

        queue
            .reschedule(&id, Duration::from_secs(60), "User not found")
            .await
            .unwrap();

        assert_eq!(queue.promote_due().await.unwrap(), 0);
        assert!(queue.claim_next().await.unwrap().is_none());
        let job = queue.find(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.scheduled_at.is_after(&Timestamp::now()));
    }

    #[tokio::test]
    #[ignore = "Requires REDIS_URL"]
    async fn expired_lease_returns_to_pending() {
        let _serial = SERIAL.lock().await;
        let queue = live_queue().await;
        let id = queue
            .enqueue(WebhookEventId::new(), EnqueueOptions::default())
            .await
            .unwrap();
        queue.claim_next().await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(queue.reclaim_stalled(Duration::ZERO).await.unwrap(), 1);

        let job = queue.find(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.claimed_at.is_none());
        let reclaimed = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);
        assert_eq!(reclaimed.attempts, 2);
    }
}
