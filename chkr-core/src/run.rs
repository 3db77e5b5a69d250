use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::aggregate::EndpointAggregator;
use crate::endpoint::EndpointSpec;
use crate::error::{Error, Result};
use crate::events::{EventSink, RunEvent, TracingSink};
use crate::retry::RetryController;
use crate::schedule::run_concurrent;
use crate::summary::{EndpointSummary, RunSummary};
use crate::transport::Transport;

/// Runs endpoints one after another and seals their summaries into a [`RunSummary`].
pub struct Runner<T> {
    transport: Arc<T>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl<T: Transport> Runner<T> {
    /// A runner reporting through [`TracingSink`].
    pub fn new(transport: T) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    pub fn from_shared(transport: Arc<T>) -> Self {
        Self {
            transport,
            sink: Arc::new(TracingSink),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Uses an externally owned token, e.g. one tied to Ctrl-C.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs every endpoint in order.
    ///
    /// All specs are checked before the first request goes out. Cancellation stops the run
    /// after the current endpoint settles; the summary then has `cancelled` set and holds
    /// only the endpoints that were started.
    pub async fn run(&self, endpoints: &[EndpointSpec]) -> Result<RunSummary> {
        if endpoints.is_empty() {
            return Err(Error::NoEndpoints);
        }
        for spec in endpoints {
            spec.validate().map_err(|source| Error::InvalidEndpoint {
                endpoint: spec.name.clone(),
                source,
            })?;
        }

        let started_at = SystemTime::now();
        let started = Instant::now();
        let mut summaries = Vec::with_capacity(endpoints.len());

        for spec in endpoints {
            if self.cancel.is_cancelled() {
                tracing::info!(endpoint = %spec.name, "run cancelled; skipping endpoint");
                break;
            }
            summaries.push(self.run_endpoint(spec).await?);
        }

        let cancelled = self.cancel.is_cancelled();
        Ok(RunSummary::seal(
            summaries,
            started_at,
            started.elapsed(),
            cancelled,
        ))
    }

    /// Runs one endpoint on the single or concurrent path and returns its summary.
    pub async fn run_endpoint(&self, spec: &EndpointSpec) -> Result<EndpointSummary> {
        let method = spec.method.to_string();
        self.sink.emit(&RunEvent::TestStarted {
            endpoint: &spec.name,
            method: &method,
            url: &spec.url,
        });

        let mut agg = EndpointAggregator::new(spec);

        if spec.concurrency.is_concurrent() {
            run_concurrent(
                Arc::clone(&self.transport),
                Arc::clone(&self.sink),
                self.cancel.clone(),
                Arc::new(spec.clone()),
                &mut agg,
            )
            .await?;
        } else {
            let controller = RetryController::new(&*self.transport, &*self.sink, &self.cancel);
            let attempt = controller.run(spec, 1).await;
            agg.record(&attempt.outcome, attempt.attempts);
            if self.cancel.is_cancelled() {
                agg.mark_cancelled();
            }
        }

        let summary = agg.finish();
        self.sink.emit(&RunEvent::TestCompleted {
            endpoint: &summary.name,
            total_requests: summary.total_requests,
            success_count: summary.success_count,
            failure_count: summary.failure_count,
        });

        Ok(summary)
    }
}
