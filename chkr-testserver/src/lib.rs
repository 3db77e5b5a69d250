//! Deterministic HTTP routes for exercising chkr end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

pub const PATH_HELLO: &str = "/hello";
pub const PATH_POST: &str = "/posts/1";
pub const PATH_ECHO: &str = "/echo";
pub const PATH_HEADERS: &str = "/headers";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_STATUS: &str = "/status/{code}";
pub const PATH_FLAKY: &str = "/flaky/{failures}";

/// Body served from [`PATH_POST`].
pub const POST_BODY: &str = r#"{"id":1,"title":"foo","views":42,"published":true,"author":null}"#;

const SLOW_DELAY: Duration = Duration::from_millis(50);

/// Counters shared by every handler. Cloning shares them.
#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    flaky_hits: AtomicU64,
    test_header: AtomicU64,
}

impl TestServerStats {
    /// Requests received on any path, including unknown ones.
    pub fn requests_total(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    /// `POST /echo` requests that carried `x-test: 1`.
    pub fn saw_test_header(&self) -> u64 {
        self.inner.test_header.load(Ordering::Relaxed)
    }
}

/// Absolute URLs for every route of a running server.
#[derive(Debug, Clone)]
pub struct TestServerUrls {
    pub base_url: String,
    pub hello: String,
    pub post: String,
    pub echo: String,
    pub headers: String,
    pub slow: String,
}

impl TestServerUrls {
    pub fn new(base_url: String) -> Self {
        let at = |path: &str| format!("{base_url}{path}");
        Self {
            hello: at(PATH_HELLO),
            post: at(PATH_POST),
            echo: at(PATH_ECHO),
            headers: at(PATH_HEADERS),
            slow: at(PATH_SLOW),
            base_url,
        }
    }

    /// Responds with `code` and an empty body.
    pub fn status(&self, code: u16) -> String {
        format!("{}/status/{code}", self.base_url)
    }

    /// Responds 500 to the first `failures` requests (server lifetime), then 200.
    pub fn flaky(&self, failures: u64) -> String {
        format!("{}/flaky/{failures}", self.base_url)
    }
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_HELLO, get(|| async { "Hello World!" }))
        .route(PATH_POST, get(posts_one))
        .route(PATH_ECHO, post(echo))
        .route(PATH_HEADERS, get(multi_headers))
        .route(PATH_SLOW, get(|| delayed(SLOW_DELAY, "slow")))
        .route(PATH_STATUS, get(status))
        .route(PATH_FLAKY, get(flaky))
        .layer(middleware::from_fn_with_state(stats.clone(), count_requests))
        .with_state(stats)
}

async fn count_requests(
    State(stats): State<TestServerStats>,
    req: Request,
    next: Next,
) -> Response {
    stats.inner.requests.fetch_add(1, Ordering::Relaxed);
    next.run(req).await
}

async fn posts_one() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], POST_BODY)
}

async fn echo(State(stats): State<TestServerStats>, headers: HeaderMap, body: Bytes) -> Bytes {
    if headers.get("x-test").is_some_and(|v| v.as_bytes() == b"1") {
        stats.inner.test_header.fetch_add(1, Ordering::Relaxed);
    }
    body
}

/// Reports every `x-multi` value in arrival order as `{"x-multi": "a,b,..."}`.
async fn multi_headers(headers: HeaderMap) -> impl IntoResponse {
    let values: Vec<&str> = headers
        .get_all("x-multi")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let body = serde_json::json!({ "x-multi": values.join(",") }).to_string();

    ([(header::CONTENT_TYPE, "application/json")], body)
}

async fn delayed(delay: Duration, body: &'static str) -> &'static str {
    sleep(delay).await;
    body
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn flaky(State(stats): State<TestServerStats>, Path(failures): Path<u64>) -> StatusCode {
    let hit = stats.inner.flaky_hits.fetch_add(1, Ordering::Relaxed);
    if hit < failures {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

/// A router bound to an ephemeral localhost port, served on a background task.
pub struct TestServer {
    urls: TestServerUrls,
    stats: TestServerStats,
    running: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let stats = TestServerStats::default();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let app = router(stats.clone());
        let task = tokio::spawn(async move {
            let stopped = async move {
                let _ = stop_rx.await;
            };
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(stopped)
                .await;
        });

        Ok(Self {
            urls: TestServerUrls::new(format!("http://{addr}")),
            stats,
            running: Some((stop_tx, task)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.urls.base_url
    }

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    /// Stops accepting connections and waits for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some((stop_tx, task)) = self.running.take() {
            let _ = stop_tx.send(());
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some((_, task)) = self.running.take() {
            task.abort();
        }
    }
}
