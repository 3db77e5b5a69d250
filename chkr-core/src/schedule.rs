use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::aggregate::EndpointAggregator;
use crate::endpoint::{ConcurrencyProfile, EndpointSpec};
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::executor::REQUEST_TIMEOUT;
use crate::outcome::AttemptOutcome;
use crate::retry::{RetryController, RetryDecision, RetrySequence, pause};
use crate::transport::Transport;

/// How long the collector keeps draining after cancellation before aborting workers.
pub const DRAIN_GRACE: Duration = REQUEST_TIMEOUT.saturating_add(Duration::from_secs(1));

const MAX_QUEUE_CAPACITY: u64 = 1024;

/// How an endpoint's request volume is split across virtual users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePlan {
    pub users: u64,
    pub per_user: u64,
    /// Remainder of `total / users`; never issued.
    pub dropped: u64,
}

impl SchedulePlan {
    #[must_use]
    pub fn new(profile: &ConcurrencyProfile) -> Self {
        if profile.users == 0 {
            return Self {
                users: 0,
                per_user: 0,
                dropped: 0,
            };
        }

        Self {
            users: profile.users,
            per_user: profile.total / profile.users,
            dropped: profile.total % profile.users,
        }
    }

    /// Request slots that will be issued.
    #[must_use]
    pub fn slots(&self) -> u64 {
        self.users.saturating_mul(self.per_user)
    }

    fn queue_capacity(&self) -> usize {
        self.slots().clamp(1, MAX_QUEUE_CAPACITY) as usize
    }
}

/// One slot's worth of result sent from a worker to the collector.
#[derive(Debug)]
struct SlotOutcome {
    outcome: AttemptOutcome,
    attempts: u32,
}

struct WorkerCtx<T> {
    transport: Arc<T>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    spec: Arc<EndpointSpec>,
    per_user: u64,
}

/// Runs an endpoint's concurrency profile and folds every slot into `agg`.
///
/// Returns once every slot is accounted for: either reported by its worker or, after
/// cancellation and the drain grace, recorded as cancelled.
pub(crate) async fn run_concurrent<T: Transport>(
    transport: Arc<T>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    spec: Arc<EndpointSpec>,
    agg: &mut EndpointAggregator,
) -> Result<()> {
    let plan = SchedulePlan::new(&spec.concurrency);
    if plan.dropped > 0 {
        tracing::warn!(
            endpoint = %spec.name,
            users = plan.users,
            total = spec.concurrency.total,
            dropped = plan.dropped,
            "total requests not divisible by users; remainder will not be issued"
        );
    }

    let (tx, mut rx) = mpsc::channel::<SlotOutcome>(plan.queue_capacity());
    let ctx = Arc::new(WorkerCtx {
        transport,
        sink,
        cancel: cancel.clone(),
        spec: Arc::clone(&spec),
        per_user: plan.per_user,
    });

    let mut workers = JoinSet::new();
    for user in 0..plan.users {
        workers.spawn(worker(Arc::clone(&ctx), user, tx.clone()));
    }
    // Workers hold the only senders; the channel closes when the last one exits.
    drop(tx);
    drop(ctx);

    let mut received = 0u64;
    let mut drain_deadline: Option<Instant> = None;
    loop {
        let next = match drain_deadline {
            None => tokio::select! {
                slot = rx.recv() => slot,
                () = cancel.cancelled() => {
                    tracing::debug!(
                        endpoint = %spec.name,
                        "cancelled; draining in-flight requests"
                    );
                    drain_deadline = Some(Instant::now() + DRAIN_GRACE);
                    continue;
                }
            },
            Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(slot) => slot,
                Err(_) => {
                    tracing::warn!(endpoint = %spec.name, "drain grace elapsed; aborting workers");
                    break;
                }
            },
        };

        let Some(slot) = next else { break };
        agg.record(&slot.outcome, slot.attempts);
        received += 1;
    }

    workers.abort_all();
    while let Some(res) = workers.join_next().await {
        if let Err(err) = res
            && err.is_panic()
        {
            return Err(Error::Join(err));
        }
    }

    // Anything a worker sent before being aborted.
    while let Ok(slot) = rx.try_recv() {
        agg.record(&slot.outcome, slot.attempts);
        received += 1;
    }

    let missing = plan.slots().saturating_sub(received);
    for _ in 0..missing {
        agg.record(&AttemptOutcome::Cancelled, 0);
    }

    if cancel.is_cancelled() {
        agg.mark_cancelled();
    }

    Ok(())
}

/// One virtual user: issues `per_user` requests back to back.
///
/// A failed slot followed by a retry-eligible decision makes the next slot the retry.
async fn worker<T: Transport>(ctx: Arc<WorkerCtx<T>>, user: u64, tx: mpsc::Sender<SlotOutcome>) {
    let spec = &*ctx.spec;
    let controller = RetryController::new(&*ctx.transport, &*ctx.sink, &ctx.cancel).for_user(user);
    let mut seq = RetrySequence::new(spec.retry);
    let mut next_delay = Duration::ZERO;

    tracing::debug!(endpoint = %spec.name, user, requests = ctx.per_user, "worker started");

    for slot in 0..ctx.per_user {
        if slot > 0 && !pause(next_delay, &ctx.cancel).await {
            send_cancelled(&tx, ctx.per_user - slot).await;
            tracing::debug!(endpoint = %spec.name, user, slot, "worker cancelled");
            return;
        }
        if ctx.cancel.is_cancelled() {
            send_cancelled(&tx, ctx.per_user - slot).await;
            tracing::debug!(endpoint = %spec.name, user, slot, "worker cancelled");
            return;
        }

        if seq.is_finished() {
            seq = RetrySequence::new(spec.retry);
        }
        seq.resume();

        let request_id = user * ctx.per_user + slot + 1;
        let outcome = controller
            .attempt(spec, request_id, seq.attempts() + 1)
            .await;

        next_delay = match seq.observe(&outcome) {
            RetryDecision::Retry(delay) => delay,
            RetryDecision::Success | RetryDecision::Exhausted => spec.concurrency.delay,
        };

        if tx
            .send(SlotOutcome {
                outcome,
                attempts: 1,
            })
            .await
            .is_err()
        {
            // Collector is gone.
            return;
        }
    }

    tracing::debug!(endpoint = %spec.name, user, "worker finished");
}

async fn send_cancelled(tx: &mpsc::Sender<SlotOutcome>, remaining: u64) {
    for _ in 0..remaining {
        let slot = SlotOutcome {
            outcome: AttemptOutcome::Cancelled,
            attempts: 0,
        };
        if tx.send(slot).await.is_err() {
            return;
        }
    }
}
