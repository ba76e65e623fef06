//! Response-time checks.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use crate::assertions::assert_response_time_within;
use crate::client::ApiResponse;
use crate::error::{Error, Result};

/// Expected speed class of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Under 500 ms.
    Fast,
    /// Under 2 s.
    Normal,
    /// Under 10 s, for file processing.
    Slow,
}

impl Tier {
    pub fn threshold(&self) -> Duration {
        match self {
            Tier::Fast => Duration::from_millis(500),
            Tier::Normal => Duration::from_secs(2),
            Tier::Slow => Duration::from_secs(10),
        }
    }
}

/// Calls `request` `iterations` times, asserting each response beats the tier.
pub async fn benchmark<F, Fut>(iterations: usize, tier: Tier, mut request: F) -> Result<Vec<ApiResponse>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResponse>,
{
    let mut responses = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let response = request().await;
        assert_response_time_within(&response, tier.threshold())?;
        responses.push(response);
    }
    Ok(responses)
}

/// Duration statistics over a set of responses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceStats {
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
    /// Upper median: element `len / 2` of the sorted durations.
    pub median: Duration,
}

impl PerformanceStats {
    /// Returns `None` for an empty slice.
    pub fn from_durations(durations: &[Duration]) -> Option<Self> {
        if durations.is_empty() {
            return None;
        }
        let mut sorted = durations.to_vec();
        sorted.sort();
        let total: Duration = sorted.iter().sum();
        Some(Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            avg: total / sorted.len() as u32,
            median: sorted[sorted.len() / 2],
        })
    }

    pub fn from_responses(responses: &[ApiResponse]) -> Option<Self> {
        let durations: Vec<Duration> = responses.iter().map(ApiResponse::duration).collect();
        Self::from_durations(&durations)
    }
}

/// A named timing recorded by [`PerformanceMonitor`].
#[derive(Debug, Clone)]
pub struct Measurement {
    pub name: String,
    pub duration: Duration,
    pub started_at: SystemTime,
}

/// Records named timings and fails any that reach the limit.
#[derive(Debug)]
pub struct PerformanceMonitor {
    limit: Duration,
    measurements: Mutex<Vec<Measurement>>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl PerformanceMonitor {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            measurements: Mutex::new(Vec::new()),
        }
    }

    /// Awaits `fut`, records how long it took, and fails if it took `limit` or longer.
    ///
    /// The measurement is recorded even when the check fails.
    pub async fn measure<F: Future>(&self, name: &str, fut: F) -> Result<F::Output> {
        let started_at = SystemTime::now();
        let start = Instant::now();
        let output = fut.await;
        let duration = start.elapsed();

        self.measurements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Measurement {
                name: name.to_string(),
                duration,
                started_at,
            });
        tracing::debug!(name, duration_ms = duration.as_millis() as u64, "measured");

        if duration >= self.limit {
            return Err(Error::assertion(format!(
                "Request {} took {:.2}s (> {:.0}s limit)",
                name,
                duration.as_secs_f64(),
                self.limit.as_secs_f64()
            )));
        }
        Ok(output)
    }

    /// A copy of everything recorded so far.
    pub fn measurements(&self) -> Vec<Measurement> {
        self.measurements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tiers() {
        assert_eq!(Tier::Fast.threshold(), Duration::from_millis(500));
        assert_eq!(Tier::Normal.threshold(), Duration::from_secs(2));
        assert_eq!(Tier::Slow.threshold(), Duration::from_secs(10));
    }

    #[test]
    fn test_stats() {
        let durations = [
            Duration::from_millis(300),
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
        ];
        let stats = PerformanceStats::from_durations(&durations).unwrap();
        assert_eq!(stats.min, Duration::from_millis(100));
        assert_eq!(stats.max, Duration::from_millis(400));
        assert_eq!(stats.avg, Duration::from_millis(250));
        assert_eq!(stats.median, Duration::from_millis(300));
    }

    #[test]
    fn test_stats_empty() {
        assert!(PerformanceStats::from_durations(&[]).is_none());
    }

    #[tokio::test]
    async fn test_benchmark_runs_each_iteration() {
        let mut calls = 0;
        let responses = benchmark(3, Tier::Fast, || {
            calls += 1;
            async { ApiResponse::json(200, json!({})) }
        })
        .await
        .unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_monitor_records() {
        let monitor = PerformanceMonitor::default();
        let value = monitor.measure("quick", async { 42 }).await.unwrap();
        assert_eq!(value, 42);

        let measurements = monitor.measurements();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].name, "quick");
    }

    #[tokio::test]
    async fn test_monitor_fails_over_limit() {
        let monitor = PerformanceMonitor::new(Duration::from_millis(10));
        let err = monitor
            .measure("sleepy", tokio::time::sleep(Duration::from_millis(30)))
            .await
            .unwrap_err();
        assert!(err.message.contains("sleepy"));
        assert_eq!(monitor.measurements().len(), 1);
    }
}
