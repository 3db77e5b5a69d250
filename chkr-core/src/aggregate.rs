use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};

use crate::endpoint::EndpointSpec;
use crate::outcome::AttemptOutcome;
use crate::schedule::SchedulePlan;
use crate::summary::{
    EndpointSummary, LatencyPercentiles, LatencyStats, SizeStats, nanos_to_duration, per_second,
    percent,
};

/// Status recorded for outcomes that never got a response.
const NO_STATUS: u16 = 0;

/// Nearest-rank index into a sorted list of `count` values: `floor(pct / 100 * count)`.
///
/// `count` must be non-zero and `pct` below 100.
#[must_use]
pub fn percentile_index(count: usize, pct: usize) -> usize {
    (count * pct / 100).min(count.saturating_sub(1))
}

/// Folds request outcomes for one endpoint into an [`EndpointSummary`].
///
/// Everything except percentiles is updated as outcomes arrive, so arrival order does not
/// matter. Percentiles need the full latency set and are computed in
/// [`summarize`](Self::summarize).
#[derive(Debug)]
pub struct EndpointAggregator {
    name: String,
    method: String,
    url: String,
    concurrent: bool,
    concurrent_users: u64,
    requests_per_user: u64,

    started_at: SystemTime,
    started: Instant,

    total_requests: u64,
    success_count: u64,
    failure_count: u64,
    cancelled_count: u64,
    attempts_total: u64,
    timeout_count: u64,

    latencies: Vec<Duration>,
    latency_min: Option<Duration>,
    latency_max: Option<Duration>,
    latency_sum: u128,

    status_codes: BTreeMap<u16, u64>,
    validation_failures: BTreeMap<String, u64>,
    transport_errors: BTreeMap<String, u64>,

    size_min: Option<u64>,
    size_max: u64,
    size_sum: u64,
    size_count: u64,

    cancelled: bool,
}

impl EndpointAggregator {
    pub fn new(spec: &EndpointSpec) -> Self {
        let plan = SchedulePlan::new(&spec.concurrency);
        Self {
            name: spec.name.clone(),
            method: spec.method.to_string(),
            url: spec.url.clone(),
            concurrent: spec.concurrency.is_concurrent(),
            concurrent_users: plan.users,
            requests_per_user: plan.per_user,
            started_at: SystemTime::now(),
            started: Instant::now(),
            total_requests: 0,
            success_count: 0,
            failure_count: 0,
            cancelled_count: 0,
            attempts_total: 0,
            timeout_count: 0,
            latencies: Vec::with_capacity(plan.slots().min(4096) as usize),
            latency_min: None,
            latency_max: None,
            latency_sum: 0,
            status_codes: BTreeMap::new(),
            validation_failures: BTreeMap::new(),
            transport_errors: BTreeMap::new(),
            size_min: None,
            size_max: 0,
            size_sum: 0,
            size_count: 0,
            cancelled: false,
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Records one request slot. `attempts` is how many requests were sent for it.
    pub fn record(&mut self, outcome: &AttemptOutcome, attempts: u32) {
        self.total_requests += 1;
        self.attempts_total = self.attempts_total.saturating_add(u64::from(attempts));

        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }

        *self
            .status_codes
            .entry(outcome.status().unwrap_or(NO_STATUS))
            .or_insert(0) += 1;

        match outcome {
            AttemptOutcome::Validated(v) => {
                self.record_size(v.response_size);

                if v.is_valid {
                    self.record_latency(v.duration);
                }

                let reasons: Vec<String> = v.reasons().collect();
                for (idx, reason) in reasons.iter().enumerate() {
                    if reasons[..idx].contains(reason) {
                        continue;
                    }
                    *self.validation_failures.entry(reason.clone()).or_insert(0) += 1;
                }
            }
            AttemptOutcome::Transport(failure) => {
                if failure.error.is_timeout() {
                    self.timeout_count += 1;
                }
                *self
                    .transport_errors
                    .entry(failure.error.to_string())
                    .or_insert(0) += 1;
            }
            AttemptOutcome::Cancelled => {
                self.cancelled_count += 1;
            }
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    fn record_latency(&mut self, d: Duration) {
        self.latencies.push(d);
        self.latency_min = Some(self.latency_min.map_or(d, |m| m.min(d)));
        self.latency_max = Some(self.latency_max.map_or(d, |m| m.max(d)));
        self.latency_sum += d.as_nanos();
    }

    fn record_size(&mut self, size: u64) {
        self.size_min = Some(self.size_min.map_or(size, |m| m.min(size)));
        self.size_max = self.size_max.max(size);
        self.size_sum = self.size_sum.saturating_add(size);
        self.size_count += 1;
    }

    /// Seals the summary using the time elapsed since the aggregator was created.
    pub fn finish(self) -> EndpointSummary {
        let elapsed = self.started.elapsed();
        self.summarize(elapsed)
    }

    /// Seals the summary for an execution window of `elapsed`.
    pub fn summarize(mut self, elapsed: Duration) -> EndpointSummary {
        let latency = match (self.latency_min, self.latency_max) {
            (Some(min), Some(max)) => {
                self.latencies.sort_unstable();
                let sorted = &self.latencies;
                let count = sorted.len();
                let at = |pct: usize| sorted[percentile_index(count, pct)];
                Some(LatencyStats {
                    count: count as u64,
                    min,
                    max,
                    mean: nanos_to_duration(self.latency_sum / count as u128),
                    percentiles: LatencyPercentiles {
                        p50: at(50),
                        p75: at(75),
                        p90: at(90),
                        p95: at(95),
                        p99: at(99),
                    },
                })
            }
            _ => None,
        };

        let response_sizes = self.size_min.map(|min| SizeStats {
            min,
            max: self.size_max,
            avg: self.size_sum / self.size_count.max(1),
        });

        EndpointSummary {
            name: self.name,
            method: self.method,
            url: self.url,
            concurrent: self.concurrent,
            concurrent_users: self.concurrent_users,
            requests_per_user: self.requests_per_user,
            started_at: self.started_at,
            ended_at: self.started_at + elapsed,
            duration: elapsed,
            total_requests: self.total_requests,
            success_count: self.success_count,
            failure_count: self.failure_count,
            cancelled_count: self.cancelled_count,
            attempts_total: self.attempts_total,
            timeout_count: self.timeout_count,
            latency,
            status_codes: self.status_codes,
            validation_failures: self.validation_failures,
            transport_errors: self.transport_errors,
            bytes_transferred: self.size_sum,
            response_sizes,
            requests_per_second: per_second(self.total_requests, elapsed),
            error_rate: percent(self.failure_count, self.total_requests),
            cancelled: self.cancelled,
        }
    }
}
