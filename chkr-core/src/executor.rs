use std::time::{Duration, Instant};

use bytes::Bytes;
use chkr_http::HttpRequest;

use crate::endpoint::EndpointSpec;
use crate::transport::Transport;

/// Overall bound on one exchange. Not configurable per endpoint.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What came back from one exchange that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutcome {
    pub status: u16,
    pub body: Bytes,
    pub elapsed: Duration,
}

impl RawOutcome {
    #[must_use]
    pub fn response_size(&self) -> u64 {
        self.body.len() as u64
    }
}

/// An exchange that never produced a response.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct TransportFailure {
    #[source]
    pub error: chkr_http::Error,
    pub elapsed: Duration,
}

pub fn build_request(spec: &EndpointSpec) -> HttpRequest {
    HttpRequest {
        method: spec.method.clone(),
        url: spec.url.clone(),
        headers: spec.headers.clone(),
        body: spec.body.clone(),
        timeout: Some(REQUEST_TIMEOUT),
    }
}

/// Issues one request for `spec` and times it, body drain included.
pub async fn execute<T: Transport>(
    transport: &T,
    spec: &EndpointSpec,
) -> Result<RawOutcome, TransportFailure> {
    let req = build_request(spec);

    let started = Instant::now();
    let res = transport.send(req).await;
    let elapsed = started.elapsed();

    match res {
        Ok(res) => Ok(RawOutcome {
            status: res.status,
            body: res.body,
            elapsed,
        }),
        Err(error) => Err(TransportFailure { error, elapsed }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_headers_in_order_and_fixed_timeout() {
        let spec = EndpointSpec::new("multi", "http://localhost/h")
            .with_method(http::Method::PUT)
            .with_header("x-multi", "a")
            .with_header("accept", "application/json")
            .with_header("x-multi", "b")
            .with_body("payload");

        let req = build_request(&spec);
        assert_eq!(req.method, http::Method::PUT);
        assert_eq!(req.url, "http://localhost/h");
        assert_eq!(
            req.headers,
            vec![
                ("x-multi".to_string(), "a".to_string()),
                ("accept".to_string(), "application/json".to_string()),
                ("x-multi".to_string(), "b".to_string()),
            ]
        );
        assert_eq!(req.body, Bytes::from_static(b"payload"));
        assert_eq!(req.timeout, Some(REQUEST_TIMEOUT));
    }

    #[test]
    fn response_size_is_body_length() {
        let raw = RawOutcome {
            status: 200,
            body: Bytes::from_static(b"hello"),
            elapsed: Duration::from_millis(3),
        };
        assert_eq!(raw.response_size(), 5);
    }
}
