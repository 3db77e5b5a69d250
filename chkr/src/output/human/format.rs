use std::time::Duration;

pub(crate) fn format_bytes(b: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;

    if b >= GIB {
        return format!("{:.2}GiB", (b as f64) / (GIB as f64));
    }
    if b >= MIB {
        return format!("{:.2}MiB", (b as f64) / (MIB as f64));
    }
    if b >= KIB {
        return format!("{:.2}KiB", (b as f64) / (KIB as f64));
    }

    format!("{b}B")
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}")
    } else {
        "0".to_string()
    }
}

pub(crate) fn format_percent(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}%")
    } else {
        "0%".to_string()
    }
}

/// Latency with two decimals in the largest unit that keeps it above 1 (us, ms, s).
pub(crate) fn format_latency(d: Duration) -> String {
    let nanos = d.as_nanos() as f64;

    if nanos >= 1e9 {
        return format!("{:.2}s", nanos / 1e9);
    }
    if nanos >= 1e6 {
        return format!("{:.2}ms", nanos / 1e6);
    }
    format!("{:.2}us", nanos / 1e3)
}

pub(crate) fn format_latency_opt(d: Option<Duration>) -> String {
    d.map_or_else(|| "-".to_string(), format_latency)
}
