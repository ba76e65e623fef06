use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use uuid::Uuid;

use super::MockBackendConfig;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// An accepted extraction batch.
#[derive(Debug, Clone)]
pub(super) struct Batch {
    pub id: String,
    pub owner: String,
    pub files: Vec<String>,
    pub created: Instant,
}

/// Shared state behind every connection of a [`super::MockBackend`].
#[derive(Debug)]
pub(super) struct BackendState {
    pub config: MockBackendConfig,
    buckets: DashMap<String, TokenBucket>,
    batches: DashMap<String, Batch>,
    requests: AtomicU64,
}

impl BackendState {
    pub fn new(config: MockBackendConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
            batches: DashMap::new(),
            requests: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn refill_rate(&self) -> f64 {
        let window = self.config.rate_limit_window.as_secs_f64();
        if window > 0.0 {
            self.config.rate_limit as f64 / window
        } else {
            f64::INFINITY
        }
    }

    /// Consumes one token for `key`. Returns `Some(retry_after_secs)` when empty.
    pub fn check_rate_limit(&self, key: &str) -> Option<u64> {
        let burst = self.config.rate_limit as f64;
        let rate = self.refill_rate();
        let now = Instant::now();

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket {
                tokens: burst,
                last_refill: now,
            });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else {
            let seconds_until_ready = (1.0 - bucket.tokens) / rate;
            Some(seconds_until_ready.ceil().max(1.0) as u64)
        }
    }

    pub fn create_batch(&self, owner: &str, files: Vec<String>) -> Batch {
        let batch = Batch {
            id: format!("batch_{}", Uuid::new_v4().simple()),
            owner: owner.to_string(),
            files,
            created: Instant::now(),
        };
        self.batches.insert(batch.id.clone(), batch.clone());
        batch
    }

    pub fn batch(&self, id: &str) -> Option<Batch> {
        self.batches.get(id).map(|entry| entry.value().clone())
    }

    pub fn is_complete(&self, batch: &Batch) -> bool {
        batch.created.elapsed() >= self.config.processing_delay
    }

    /// Unix seconds at which a batch created now is expected to finish.
    pub fn estimated_completion(&self) -> u64 {
        let done = SystemTime::now() + self.config.processing_delay + Duration::from_secs(1);
        done.duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(limit: u32) -> BackendState {
        BackendState::new(MockBackendConfig::default().with_rate_limit(limit, Duration::from_secs(3600)))
    }

    #[test]
    fn test_bucket_allows_burst_then_limits() {
        let state = state(3);
        assert!(state.check_rate_limit("a").is_none());
        assert!(state.check_rate_limit("a").is_none());
        assert!(state.check_rate_limit("a").is_none());
        let retry = state.check_rate_limit("a").unwrap();
        assert!(retry >= 1);
    }

    #[test]
    fn test_buckets_are_per_key() {
        let state = state(1);
        assert!(state.check_rate_limit("a").is_none());
        assert!(state.check_rate_limit("a").is_some());
        assert!(state.check_rate_limit("b").is_none());
    }

    #[test]
    fn test_batches() {
        let state = BackendState::new(MockBackendConfig::default().with_processing_delay(Duration::ZERO));
        let batch = state.create_batch("user", vec!["a.pdf".to_string()]);
        assert!(batch.id.starts_with("batch_"));

        let found = state.batch(&batch.id).unwrap();
        assert_eq!(found.owner, "user");
        assert!(state.is_complete(&found));
        assert!(state.batch("batch_missing").is_none());
    }
}
