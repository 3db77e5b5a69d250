#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more endpoints recorded failed requests.
    EndpointsFailed = 10,

    /// The run was interrupted before every endpoint finished.
    Cancelled = 20,

    /// Invalid CLI/config (bad flags, unreadable or malformed YAML, contradictory endpoints).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, worker panics).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Cancellation takes precedence over endpoint failures.
    #[must_use]
    pub fn from_run(cancelled: bool, failed: bool) -> Self {
        match (cancelled, failed) {
            (true, _) => Self::Cancelled,
            (false, true) => Self::EndpointsFailed,
            (false, false) => Self::Success,
        }
    }
}
