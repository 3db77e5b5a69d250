#![forbid(unsafe_code)]

mod aggregate;
mod endpoint;
mod error;
mod events;
mod executor;
mod outcome;
mod retry;
mod run;
mod schedule;
mod summary;
mod transport;
mod validate;
mod value;

pub use aggregate::{EndpointAggregator, percentile_index};
pub use endpoint::{
    ConcurrencyProfile, ConfigError, EndpointSpec, Expectation, RetryPolicy, ValueCheck,
};
pub use error::{Error, Result};
pub use events::{EventSink, NoopSink, RunEvent, TracingSink};
pub use executor::{REQUEST_TIMEOUT, RawOutcome, TransportFailure, build_request, execute};
pub use outcome::AttemptOutcome;
pub use retry::{LogicalAttempt, RetryController, RetryDecision, RetrySequence, RetryState};
pub use run::Runner;
pub use schedule::{DRAIN_GRACE, SchedulePlan};
pub use summary::{EndpointSummary, LatencyPercentiles, LatencyStats, RunSummary, SizeStats};
pub use transport::Transport;
pub use validate::{ValidationOutcome, Violation, validate};
pub use value::ExpectedValue;

pub use chkr_http::{HttpClient, HttpRequest, HttpResponse, HttpTransportErrorKind};
pub use http::Method;
pub use tokio_util::sync::CancellationToken;
