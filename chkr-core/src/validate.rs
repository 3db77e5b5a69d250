use std::fmt;
use std::time::Duration;

use crate::endpoint::Expectation;
use crate::executor::RawOutcome;
use crate::value::canonical_json;

/// One reason a response did not meet its expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Status { expected: u16, actual: u16 },
    TooSlow { max: Duration, actual: Duration },
    BodyNotJson(String),
    PathNotFound(String),
    ValueMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { expected, actual } => {
                write!(f, "expected status code {expected}, got {actual}")
            }
            Self::TooSlow { max, actual } => {
                write!(f, "expected response time less than {max:?}, got {actual:?}")
            }
            Self::BodyNotJson(err) => {
                write!(f, "failed to parse response body as a JSON object: {err}")
            }
            Self::PathNotFound(path) => write!(f, "path {path} not found in response"),
            Self::ValueMismatch {
                path,
                expected,
                actual,
            } => write!(f, "path {path} expected {expected}, got {actual}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub violations: Vec<Violation>,
    pub duration: Duration,
    pub status: u16,
    pub response_size: u64,
}

impl ValidationOutcome {
    /// Violation messages, in check order.
    pub fn reasons(&self) -> impl Iterator<Item = String> + '_ {
        self.violations.iter().map(ToString::to_string)
    }
}

/// Checks a response against an expectation.
///
/// Every check runs; the result lists all violations found, not just the first.
#[must_use]
pub fn validate(raw: &RawOutcome, expect: &Expectation) -> ValidationOutcome {
    let mut violations = Vec::new();

    if raw.status != expect.status {
        violations.push(Violation::Status {
            expected: expect.status,
            actual: raw.status,
        });
    }

    if let Some(max) = expect.max_duration
        && raw.elapsed > max
    {
        violations.push(Violation::TooSlow {
            max,
            actual: raw.elapsed,
        });
    }

    if !expect.values.is_empty() {
        match serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&raw.body) {
            Err(err) => violations.push(Violation::BodyNotJson(err.to_string())),
            Ok(object) => {
                for check in &expect.values {
                    match object.get(&check.path) {
                        None => violations.push(Violation::PathNotFound(check.path.clone())),
                        Some(actual) if !check.expected.matches(actual) => {
                            violations.push(Violation::ValueMismatch {
                                path: check.path.clone(),
                                expected: check.expected.canonical(),
                                actual: canonical_json(actual),
                            });
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }

    ValidationOutcome {
        is_valid: violations.is_empty(),
        violations,
        duration: raw.elapsed,
        status: raw.status,
        response_size: raw.response_size(),
    }
}
