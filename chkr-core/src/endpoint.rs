use std::time::Duration;

use bytes::Bytes;

use crate::value::ExpectedValue;

/// One configured HTTP target plus its expectation, retry, and concurrency policy.
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub name: String,
    pub url: String,
    pub method: http::Method,
    /// Sent in order; repeated names are sent repeatedly.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub expect: Expectation,
    pub retry: RetryPolicy,
    pub concurrency: ConcurrencyProfile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    pub status: u16,
    /// `None` means responses are never too slow.
    pub max_duration: Option<Duration>,
    pub values: Vec<ValueCheck>,
}

impl Default for Expectation {
    fn default() -> Self {
        Self {
            status: 200,
            max_duration: None,
            values: Vec::new(),
        }
    }
}

/// Compares a top-level key of a JSON object body against an expected value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCheck {
    pub path: String,
    pub expected: ExpectedValue,
}

impl ValueCheck {
    pub fn new(path: impl Into<String>, expected: impl Into<ExpectedValue>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub count: u32,
    /// Pause before each retry.
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.count.saturating_add(1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConcurrencyProfile {
    /// Virtual users. `0` selects the single-attempt path.
    pub users: u64,
    /// Pause between two requests of the same user.
    pub delay: Duration,
    /// Requests shared out across all users.
    pub total: u64,
}

impl ConcurrencyProfile {
    #[must_use]
    pub fn is_concurrent(&self) -> bool {
        self.users > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing URL")]
    MissingUrl,

    #[error("concurrent users set but total requests not specified")]
    MissingTotal,

    #[error("{users} concurrent users cannot share {total} total requests")]
    TooFewRequests { users: u64, total: u64 },
}

impl EndpointSpec {
    /// A `GET` with a default expectation (status 200), no retries and no concurrency.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: http::Method::GET,
            headers: Vec::new(),
            body: Bytes::new(),
            expect: Expectation::default(),
            retry: RetryPolicy::default(),
            concurrency: ConcurrencyProfile::default(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: http::Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_expect(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, count: u32, delay: Duration) -> Self {
        self.retry = RetryPolicy { count, delay };
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, users: u64, total: u64, delay: Duration) -> Self {
        self.concurrency = ConcurrencyProfile {
            users,
            delay,
            total,
        };
        self
    }

    /// Rejects specs that cannot be executed as written.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }

        let c = &self.concurrency;
        if c.users > 0 {
            if c.total == 0 {
                return Err(ConfigError::MissingTotal);
            }
            if c.total < c.users {
                return Err(ConfigError::TooFewRequests {
                    users: c.users,
                    total: c.total,
                });
            }
        }

        Ok(())
    }
}
