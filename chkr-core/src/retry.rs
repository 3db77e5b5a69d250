use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::endpoint::{EndpointSpec, RetryPolicy};
use crate::events::{EventSink, RunEvent};
use crate::executor::execute;
use crate::outcome::AttemptOutcome;
use crate::transport::Transport;
use crate::validate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RetryState {
    Attempting,
    Retrying,
    Success,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Success,
    /// Try again after the given pause.
    Retry(Duration),
    Exhausted,
}

/// Bookkeeping for one logical attempt: the first try plus up to `count` retries.
#[derive(Debug, Clone)]
pub struct RetrySequence {
    policy: RetryPolicy,
    attempts: u32,
    state: RetryState,
}

impl RetrySequence {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            state: RetryState::Attempting,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Attempts observed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Feeds the outcome of the attempt just made.
    ///
    /// Transport errors and validation failures are retried alike; a cancelled slot is
    /// never retried.
    pub fn observe(&mut self, outcome: &AttemptOutcome) -> RetryDecision {
        debug_assert_eq!(self.state, RetryState::Attempting);
        self.attempts = self.attempts.saturating_add(1);

        let decision = if outcome.is_success() {
            RetryDecision::Success
        } else if outcome.is_cancelled() || self.attempts >= self.policy.max_attempts() {
            RetryDecision::Exhausted
        } else {
            RetryDecision::Retry(self.policy.delay)
        };

        self.state = match decision {
            RetryDecision::Success => RetryState::Success,
            RetryDecision::Retry(_) => RetryState::Retrying,
            RetryDecision::Exhausted => RetryState::Exhausted,
        };
        decision
    }

    /// Moves a `Retrying` sequence back to `Attempting` once the retry pause is over.
    pub fn resume(&mut self) {
        if self.state == RetryState::Retrying {
            self.state = RetryState::Attempting;
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, RetryState::Success | RetryState::Exhausted)
    }
}

/// Final outcome of a logical attempt plus the number of requests it took.
#[derive(Debug)]
pub struct LogicalAttempt {
    pub outcome: AttemptOutcome,
    pub attempts: u32,
}

/// Drives the executor and validator for one endpoint, honoring its retry policy.
pub struct RetryController<'a, T> {
    transport: &'a T,
    sink: &'a dyn EventSink,
    cancel: &'a CancellationToken,
    user: Option<u64>,
}

impl<'a, T: Transport> RetryController<'a, T> {
    pub fn new(transport: &'a T, sink: &'a dyn EventSink, cancel: &'a CancellationToken) -> Self {
        Self {
            transport,
            sink,
            cancel,
            user: None,
        }
    }

    /// Tags emitted events with the virtual user driving this controller.
    #[must_use]
    pub fn for_user(mut self, user: u64) -> Self {
        self.user = Some(user);
        self
    }

    /// One request: execute, then validate. Emits a completed/failed event.
    pub async fn attempt(
        &self,
        spec: &EndpointSpec,
        request_id: u64,
        attempt: u32,
    ) -> AttemptOutcome {
        match execute(self.transport, spec).await {
            Ok(raw) => {
                let validated = validate(&raw, &spec.expect);
                self.sink.emit(&RunEvent::RequestCompleted {
                    endpoint: &spec.name,
                    request_id,
                    user: self.user,
                    attempt,
                    status: validated.status,
                    duration: validated.duration,
                    valid: validated.is_valid,
                });
                AttemptOutcome::Validated(validated)
            }
            Err(failure) => {
                let error = failure.to_string();
                self.sink.emit(&RunEvent::RequestFailed {
                    endpoint: &spec.name,
                    request_id,
                    user: self.user,
                    attempt,
                    error: &error,
                });
                AttemptOutcome::Transport(failure)
            }
        }
    }

    /// Runs a full logical attempt and returns its last outcome.
    ///
    /// A retry pause interrupted by cancellation ends the sequence with the outcome
    /// already in hand.
    pub async fn run(&self, spec: &EndpointSpec, request_id: u64) -> LogicalAttempt {
        if self.cancel.is_cancelled() {
            return LogicalAttempt {
                outcome: AttemptOutcome::Cancelled,
                attempts: 0,
            };
        }

        let mut seq = RetrySequence::new(spec.retry);
        loop {
            let outcome = self.attempt(spec, request_id, seq.attempts() + 1).await;
            match seq.observe(&outcome) {
                RetryDecision::Success | RetryDecision::Exhausted => {
                    return LogicalAttempt {
                        outcome,
                        attempts: seq.attempts(),
                    };
                }
                RetryDecision::Retry(delay) => {
                    tracing::debug!(
                        endpoint = %spec.name,
                        attempt = seq.attempts(),
                        ?delay,
                        "retrying"
                    );
                    if !pause(delay, self.cancel).await {
                        return LogicalAttempt {
                            outcome,
                            attempts: seq.attempts(),
                        };
                    }
                    seq.resume();
                }
            }
        }
    }
}

/// Sleeps for `delay`. Returns `false` if cancellation was observed instead.
pub(crate) async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }

    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
