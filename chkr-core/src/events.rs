use std::time::Duration;

/// Structured progress notifications emitted by the engine.
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    TestStarted {
        endpoint: &'a str,
        method: &'a str,
        url: &'a str,
    },
    /// A response came back (valid or not).
    RequestCompleted {
        endpoint: &'a str,
        request_id: u64,
        user: Option<u64>,
        attempt: u32,
        status: u16,
        duration: Duration,
        valid: bool,
    },
    /// No response came back.
    RequestFailed {
        endpoint: &'a str,
        request_id: u64,
        user: Option<u64>,
        attempt: u32,
        error: &'a str,
    },
    TestCompleted {
        endpoint: &'a str,
        total_requests: u64,
        success_count: u64,
        failure_count: u64,
    },
}

/// Receiver for [`RunEvent`]s. Called inline on worker tasks, so it must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RunEvent<'_>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &RunEvent<'_>) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &RunEvent<'_>) {
        match *event {
            RunEvent::TestStarted {
                endpoint,
                method,
                url,
            } => tracing::info!(endpoint, method, url, "test started"),
            RunEvent::RequestCompleted {
                endpoint,
                request_id,
                user,
                attempt,
                status,
                duration,
                valid: true,
            } => tracing::debug!(
                endpoint,
                request_id,
                user,
                attempt,
                status,
                ?duration,
                "request completed"
            ),
            RunEvent::RequestCompleted {
                endpoint,
                request_id,
                user,
                attempt,
                status,
                duration,
                valid: false,
            } => tracing::warn!(
                endpoint,
                request_id,
                user,
                attempt,
                status,
                ?duration,
                "request failed validation"
            ),
            RunEvent::RequestFailed {
                endpoint,
                request_id,
                user,
                attempt,
                error,
            } => tracing::warn!(endpoint, request_id, user, attempt, error, "request failed"),
            RunEvent::TestCompleted {
                endpoint,
                total_requests,
                success_count,
                failure_count,
            } => tracing::info!(
                endpoint,
                total_requests,
                success_count,
                failure_count,
                "test completed"
            ),
        }
    }
}
