use std::time::Duration;

use chkr_http::HttpTransportErrorKind;

use crate::executor::TransportFailure;
use crate::validate::ValidationOutcome;

/// Result of one request slot as seen by the aggregator.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The server answered; the response may still have failed validation.
    Validated(ValidationOutcome),
    /// No response was received.
    Transport(TransportFailure),
    /// The run was cancelled before this slot was started.
    Cancelled,
}

impl AttemptOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Validated(v) if v.is_valid)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status, if a response came back.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validated(v) => Some(v.status),
            Self::Transport(_) | Self::Cancelled => None,
        }
    }

    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Validated(v) => Some(v.duration),
            Self::Transport(f) => Some(f.elapsed),
            Self::Cancelled => None,
        }
    }

    #[must_use]
    pub fn transport_error_kind(&self) -> Option<HttpTransportErrorKind> {
        match self {
            Self::Transport(f) => Some(f.error.transport_error_kind()),
            Self::Validated(_) | Self::Cancelled => None,
        }
    }
}
