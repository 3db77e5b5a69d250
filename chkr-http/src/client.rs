use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use super::util::{has_header, host_header_value};
use super::{Error, HttpRequest, HttpResponse, Result};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

type Body = Full<Bytes>;

/// Pooled HTTP/1.1 client for `http://` and `https://` targets.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Body>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(Some(DEFAULT_CONNECT_TIMEOUT))
    }
}

impl HttpClient {
    /// `connect_timeout` bounds TCP connect only; `None` leaves it to the OS.
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self {
            inner: Client::builder(TokioExecutor::new()).build(connector(connect_timeout)),
        }
    }

    /// Sends `req` and drains the response body.
    ///
    /// `req.timeout` covers the whole exchange. Any status code is a successful
    /// exchange; only failures to get a complete response are errors.
    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let timeout = req.timeout;
        let hyper_req = to_hyper_request(req)?;

        let Some(timeout) = timeout else {
            return self.exchange(hyper_req).await;
        };
        tokio::time::timeout(timeout, self.exchange(hyper_req))
            .await
            .unwrap_or(Err(Error::Timeout(timeout)))
    }

    async fn exchange(&self, req: hyper::Request<Body>) -> Result<HttpResponse> {
        let res = self.inner.request(req).await?;
        read_response(res).await
    }
}

fn connector(connect_timeout: Option<Duration>) -> HttpsConnector<HttpConnector> {
    let mut tcp = HttpConnector::new();
    tcp.enforce_http(false);
    tcp.set_connect_timeout(connect_timeout);

    HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(tcp)
}

fn to_hyper_request(req: HttpRequest) -> Result<hyper::Request<Body>> {
    let HttpRequest {
        method,
        url,
        headers,
        body,
        timeout: _,
    } = req;

    let parsed = url::Url::parse(&url).map_err(|_| Error::InvalidUrl(url.clone()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::UnsupportedScheme(url));
    }
    let uri: hyper::Uri = url.parse().map_err(|_| Error::InvalidUrl(url.clone()))?;

    let mut builder = hyper::Request::builder().method(method).uri(uri);
    if !has_header(&headers, "host")
        && let Some(host) = host_header_value(&parsed)
    {
        builder = builder.header(http::header::HOST, host);
    }
    if !body.is_empty() && !has_header(&headers, "content-length") {
        builder = builder.header(http::header::CONTENT_LENGTH, body.len());
    }

    // `Builder::header` appends, so repeated names reach the wire in list order.
    for (name, value) in &headers {
        builder = builder.header(
            http::header::HeaderName::from_bytes(name.as_bytes())?,
            http::header::HeaderValue::from_str(value)?,
        );
    }

    Ok(builder.body(Full::new(body))?)
}

async fn read_response(res: hyper::Response<Incoming>) -> Result<HttpResponse> {
    let (parts, body) = res.into_parts();

    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    // Fully drained so the connection can go back to the pool.
    let body = body.collect().await?.to_bytes();

    Ok(HttpResponse {
        status: parts.status.as_u16(),
        headers,
        body,
    })
}
