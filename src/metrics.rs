//! Metrics instrumentation for homestead-dns.
//!
//! All metrics are prefixed with `homestead_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a handled DNS query.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Local => "local",
        QueryResult::Miss => "miss",
        QueryResult::Forwarded => "forwarded",
        QueryResult::Refused => "refused",
        QueryResult::Error => "error",
    };

    counter!("homestead_dns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("homestead_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// How a query was answered.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Answered from a local snapshot.
    Local,
    /// Owned zone but no matching record; answered empty.
    Miss,
    /// Answered by an upstream nameserver.
    Forwarded,
    /// Outside owned zones with no upstreams configured.
    Refused,
    /// Answered with a failure code.
    Error,
}

/// Record one source refresh attempt.
pub fn record_refresh(source: &str, result: RefreshResult, duration: std::time::Duration) {
    let result_str = match result {
        RefreshResult::Success => "success",
        RefreshResult::Error => "error",
    };

    counter!("homestead_dns.refresh.count", "source" => source.to_string(), "result" => result_str)
        .increment(1);
    histogram!("homestead_dns.refresh.duration.seconds", "source" => source.to_string())
        .record(duration.as_secs_f64());
}

/// Refresh outcome.
#[derive(Debug, Clone, Copy)]
pub enum RefreshResult {
    /// Fetch and publish succeeded.
    Success,
    /// Fetch failed; the previous snapshot was kept.
    Error,
}

/// Record the size of a store's published snapshot.
pub fn record_store_records(source: &str, domain: &str, count: usize) {
    gauge!("homestead_dns.store.records", "source" => source.to_string(), "domain" => domain.to_string())
        .set(count as f64);
}

/// Record one upstream exchange attempt.
pub fn record_forward(upstream: &str, success: bool) {
    let result_str = if success { "success" } else { "error" };
    counter!("homestead_dns.forward.count", "upstream" => upstream.to_string(), "result" => result_str)
        .increment(1);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
