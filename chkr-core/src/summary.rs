use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyPercentiles {
    pub p50: Duration,
    pub p75: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

/// Latency over successful requests only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub percentiles: LatencyPercentiles,
}

/// Response body sizes in bytes, over every response received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeStats {
    pub min: u64,
    pub max: u64,
    pub avg: u64,
}

#[derive(Debug, Clone)]
pub struct EndpointSummary {
    pub name: String,
    pub method: String,
    pub url: String,

    pub concurrent: bool,
    pub concurrent_users: u64,
    pub requests_per_user: u64,

    pub started_at: SystemTime,
    pub ended_at: SystemTime,
    pub duration: Duration,

    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Slots cut short by cancellation: never started, or still in flight when the
    /// drain grace ran out and the worker was aborted.
    pub cancelled_count: u64,
    /// Requests actually sent, retries included.
    pub attempts_total: u64,
    pub timeout_count: u64,

    pub latency: Option<LatencyStats>,
    pub status_codes: BTreeMap<u16, u64>,
    pub validation_failures: BTreeMap<String, u64>,
    /// Transport error message -> occurrences.
    pub transport_errors: BTreeMap<String, u64>,

    pub bytes_transferred: u64,
    pub response_sizes: Option<SizeStats>,

    pub requests_per_second: f64,
    pub error_rate: f64,

    pub cancelled: bool,
}

impl EndpointSummary {
    /// Percentage of requests that passed validation; `0` when nothing ran.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        percent(self.success_count, self.total_requests)
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub endpoints: Vec<EndpointSummary>,
    pub started_at: SystemTime,
    pub ended_at: SystemTime,
    pub duration: Duration,

    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub total_timeouts: u64,
    pub total_bytes: u64,

    pub latency_min: Option<Duration>,
    pub latency_max: Option<Duration>,
    /// Mean of the per-endpoint means, weighted by successful requests.
    pub latency_mean: Option<Duration>,

    pub requests_per_second: f64,

    /// The run stopped early; later endpoints were not executed.
    pub cancelled: bool,
}

impl RunSummary {
    pub(crate) fn seal(
        endpoints: Vec<EndpointSummary>,
        started_at: SystemTime,
        duration: Duration,
        cancelled: bool,
    ) -> Self {
        let mut total_requests = 0u64;
        let mut success_count = 0u64;
        let mut failure_count = 0u64;
        let mut total_timeouts = 0u64;
        let mut total_bytes = 0u64;
        let mut latency_min: Option<Duration> = None;
        let mut latency_max: Option<Duration> = None;
        let mut weighted_nanos = 0u128;
        let mut weight = 0u128;

        for e in &endpoints {
            total_requests = total_requests.saturating_add(e.total_requests);
            success_count = success_count.saturating_add(e.success_count);
            failure_count = failure_count.saturating_add(e.failure_count);
            total_timeouts = total_timeouts.saturating_add(e.timeout_count);
            total_bytes = total_bytes.saturating_add(e.bytes_transferred);

            if let Some(l) = &e.latency {
                latency_min = Some(latency_min.map_or(l.min, |m| m.min(l.min)));
                latency_max = Some(latency_max.map_or(l.max, |m| m.max(l.max)));
                weighted_nanos += l.mean.as_nanos() * u128::from(l.count);
                weight += u128::from(l.count);
            }
        }

        let latency_mean = (weight > 0).then(|| nanos_to_duration(weighted_nanos / weight));

        Self {
            endpoints,
            started_at,
            ended_at: started_at + duration,
            duration,
            total_requests,
            success_count,
            failure_count,
            success_rate: percent(success_count, total_requests),
            total_timeouts,
            total_bytes,
            latency_min,
            latency_max,
            latency_mean,
            requests_per_second: per_second(total_requests, duration),
            cancelled,
        }
    }

    #[must_use]
    pub fn total_endpoints(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }
}

pub(crate) fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64) / (total as f64) * 100.0
    }
}

pub(crate) fn per_second(count: u64, window: Duration) -> f64 {
    let secs = window.as_secs_f64();
    if count == 0 || secs <= 0.0 {
        0.0
    } else {
        (count as f64) / secs
    }
}

pub(crate) fn nanos_to_duration(nanos: u128) -> Duration {
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
