use std::fmt::Write as _;

use super::format::*;

pub(crate) fn render(summary: &chkr_core::RunSummary) -> String {
    let mut out = String::new();

    if summary.endpoints.is_empty() {
        out.push_str("summary: no endpoints ran\n");
        if summary.cancelled {
            out.push_str("run cancelled\n");
        }
        return out;
    }

    out.push_str("summary\n");

    for e in &summary.endpoints {
        render_endpoint(e, &mut out);
        out.push('\n');
    }

    out.push_str("totals\n");
    writeln!(&mut out, "  endpoints: {}", summary.total_endpoints()).ok();
    writeln!(
        &mut out,
        "  requests: {} (ok {}, failed {}, success {})",
        summary.total_requests,
        summary.success_count,
        summary.failure_count,
        format_percent(summary.success_rate)
    )
    .ok();
    if summary.total_timeouts > 0 {
        writeln!(&mut out, "  timeouts: {}", summary.total_timeouts).ok();
    }
    writeln!(&mut out, "  bytes: {}", format_bytes(summary.total_bytes)).ok();
    writeln!(
        &mut out,
        "  latency: min={} mean={} max={}",
        format_latency_opt(summary.latency_min),
        format_latency_opt(summary.latency_mean),
        format_latency_opt(summary.latency_max)
    )
    .ok();
    writeln!(
        &mut out,
        "  duration: {} rps={}",
        format_latency(summary.duration),
        format_rate(summary.requests_per_second)
    )
    .ok();
    if summary.cancelled {
        out.push_str("  run cancelled\n");
    }

    out
}

fn render_endpoint(e: &chkr_core::EndpointSummary, out: &mut String) {
    writeln!(out, "endpoint: {} ({} {})", e.name, e.method, e.url).ok();
    if e.concurrent {
        writeln!(
            out,
            "  users: {} x {} requests",
            e.concurrent_users, e.requests_per_user
        )
        .ok();
    }
    writeln!(
        out,
        "  requests: {} (ok {}, failed {}, error rate {})",
        e.total_requests,
        e.success_count,
        e.failure_count,
        format_percent(e.error_rate)
    )
    .ok();
    if e.attempts_total != e.total_requests {
        writeln!(out, "  attempts: {}", e.attempts_total).ok();
    }
    if e.cancelled_count > 0 {
        writeln!(out, "  cancelled: {}", e.cancelled_count).ok();
    }

    if let Some(l) = &e.latency {
        let p = &l.percentiles;
        writeln!(
            out,
            "  latency: min={} mean={} max={} (n={})",
            format_latency(l.min),
            format_latency(l.mean),
            format_latency(l.max),
            l.count
        )
        .ok();
        writeln!(
            out,
            "  percentiles: p50={} p75={} p90={} p95={} p99={}",
            format_latency(p.p50),
            format_latency(p.p75),
            format_latency(p.p90),
            format_latency(p.p95),
            format_latency(p.p99)
        )
        .ok();
    } else {
        out.push_str("  latency: n/a\n");
    }

    writeln!(
        out,
        "  throughput: {} req/s, {}",
        format_rate(e.requests_per_second),
        format_bytes(e.bytes_transferred)
    )
    .ok();
    if let Some(s) = &e.response_sizes {
        writeln!(
            out,
            "  response size: min={} avg={} max={}",
            format_bytes(s.min),
            format_bytes(s.avg),
            format_bytes(s.max)
        )
        .ok();
    }

    if !e.status_codes.is_empty() {
        let codes = e
            .status_codes
            .iter()
            .map(|(code, n)| format!("{code}={n}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "  status: {codes}").ok();
    }

    render_counts("validation failures", &e.validation_failures, out);
    render_counts("transport errors", &e.transport_errors, out);
}

fn render_counts(title: &str, counts: &std::collections::BTreeMap<String, u64>, out: &mut String) {
    if counts.is_empty() {
        return;
    }

    writeln!(out, "  {title}:").ok();
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|(a_name, a_count), (b_name, b_count)| {
        b_count.cmp(a_count).then_with(|| a_name.cmp(b_name))
    });
    for (reason, count) in sorted {
        writeln!(out, "    {reason}: {count}").ok();
    }
}
