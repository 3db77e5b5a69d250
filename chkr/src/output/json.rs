use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::time::{Duration, SystemTime};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(
        &self,
        _config_path: &std::path::Path,
        _endpoints: &[chkr_core::EndpointSpec],
    ) {
    }

    fn print_summary(&self, summary: &chkr_core::RunSummary) -> anyhow::Result<()> {
        let line = build_summary_line(summary);
        emit_json_line(&line)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: f64,
    pub cancelled: bool,
    pub endpoints: Vec<JsonEndpointSummary>,
    pub totals: JsonTotals,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonEndpointSummary {
    pub name: String,
    pub method: String,
    pub url: String,

    pub concurrent: bool,
    pub concurrent_users: u64,
    pub requests_per_user: u64,

    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: f64,

    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub cancelled_count: u64,
    pub attempts_total: u64,
    pub timeout_count: u64,

    pub success_rate: f64,
    pub error_rate: f64,
    pub requests_per_second: f64,

    pub bytes_transferred: u64,
    pub response_sizes: Option<JsonSizeSummary>,
    pub latency: Option<JsonLatencySummary>,

    pub status_codes: BTreeMap<u16, u64>,
    pub validation_failures: BTreeMap<String, u64>,
    pub transport_errors: BTreeMap<String, u64>,

    pub cancelled: bool,
}

/// Milliseconds, fractional.
#[derive(Debug, Serialize)]
pub(crate) struct JsonLatencySummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSizeSummary {
    pub min: u64,
    pub max: u64,
    pub avg: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonTotals {
    pub endpoints: usize,
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub total_timeouts: u64,
    pub total_bytes: u64,
    pub latency_min_ms: Option<f64>,
    pub latency_max_ms: Option<f64>,
    pub latency_mean_ms: Option<f64>,
    pub requests_per_second: f64,
}

fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1e6
}

fn timestamp(t: SystemTime) -> String {
    humantime::format_rfc3339_millis(t).to_string()
}

fn build_endpoint(e: &chkr_core::EndpointSummary) -> JsonEndpointSummary {
    let latency = e.latency.as_ref().map(|l| JsonLatencySummary {
        count: l.count,
        min: millis(l.min),
        max: millis(l.max),
        mean: millis(l.mean),
        p50: millis(l.percentiles.p50),
        p75: millis(l.percentiles.p75),
        p90: millis(l.percentiles.p90),
        p95: millis(l.percentiles.p95),
        p99: millis(l.percentiles.p99),
    });

    let response_sizes = e.response_sizes.map(|s| JsonSizeSummary {
        min: s.min,
        max: s.max,
        avg: s.avg,
    });

    JsonEndpointSummary {
        name: e.name.clone(),
        method: e.method.clone(),
        url: e.url.clone(),
        concurrent: e.concurrent,
        concurrent_users: e.concurrent_users,
        requests_per_user: e.requests_per_user,
        started_at: timestamp(e.started_at),
        ended_at: timestamp(e.ended_at),
        duration_ms: millis(e.duration),
        total_requests: e.total_requests,
        success_count: e.success_count,
        failure_count: e.failure_count,
        cancelled_count: e.cancelled_count,
        attempts_total: e.attempts_total,
        timeout_count: e.timeout_count,
        success_rate: e.success_rate(),
        error_rate: e.error_rate,
        requests_per_second: e.requests_per_second,
        bytes_transferred: e.bytes_transferred,
        response_sizes,
        latency,
        status_codes: e.status_codes.clone(),
        validation_failures: e.validation_failures.clone(),
        transport_errors: e.transport_errors.clone(),
        cancelled: e.cancelled,
    }
}

pub(crate) fn build_summary_line(summary: &chkr_core::RunSummary) -> JsonSummaryLine {
    JsonSummaryLine {
        kind: "summary",
        started_at: timestamp(summary.started_at),
        ended_at: timestamp(summary.ended_at),
        duration_ms: millis(summary.duration),
        cancelled: summary.cancelled,
        endpoints: summary.endpoints.iter().map(build_endpoint).collect(),
        totals: JsonTotals {
            endpoints: summary.total_endpoints(),
            total_requests: summary.total_requests,
            success_count: summary.success_count,
            failure_count: summary.failure_count,
            success_rate: summary.success_rate,
            total_timeouts: summary.total_timeouts,
            total_bytes: summary.total_bytes,
            latency_min_ms: summary.latency_min.map(millis),
            latency_max_ms: summary.latency_max.map(millis),
            latency_mean_ms: summary.latency_mean.map(millis),
            requests_per_second: summary.requests_per_second,
        },
    }
}

/// The summary as one line of JSON, newline included.
pub(crate) fn render_json(summary: &chkr_core::RunSummary) -> anyhow::Result<String> {
    let mut s = serde_json::to_string(&build_summary_line(summary))?;
    s.push('\n');
    Ok(s)
}

fn emit_json_line<T: Serialize>(line: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, line)?;
    writeln!(out)?;
    Ok(())
}
