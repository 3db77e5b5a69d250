#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use chkr_core::{CancellationToken, EventSink, HttpRequest, HttpResponse, RunEvent, Transport};

/// A request-level event, owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub request_id: u64,
    pub user: Option<u64>,
    pub attempt: u32,
    pub ok: bool,
}

/// Keeps every request event; optionally cancels a token once enough requests have reported.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Recorded>>,
    started: AtomicU64,
    completed: AtomicU64,
    cancel: Option<(CancellationToken, u64)>,
}

impl CollectingSink {
    pub fn cancelling_after(token: CancellationToken, responses: u64) -> Self {
        Self {
            cancel: Some((token, responses)),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn tests_started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    pub fn tests_completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn push(&self, rec: Recorded) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push(rec);
        let responses = events.len() as u64;
        drop(events);

        if let Some((token, after)) = &self.cancel
            && responses >= *after
        {
            token.cancel();
        }
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &RunEvent<'_>) {
        match *event {
            RunEvent::TestStarted { .. } => {
                self.started.fetch_add(1, Ordering::SeqCst);
            }
            RunEvent::TestCompleted { .. } => {
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
            RunEvent::RequestCompleted {
                request_id,
                user,
                attempt,
                valid,
                ..
            } => self.push(Recorded {
                request_id,
                user,
                attempt,
                ok: valid,
            }),
            RunEvent::RequestFailed {
                request_id,
                user,
                attempt,
                ..
            } => self.push(Recorded {
                request_id,
                user,
                attempt,
                ok: false,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Status(u16, &'static str),
    Timeout,
}

/// Answers every request with the same reply after `latency`; counts calls.
#[derive(Debug)]
pub struct ScriptedTransport {
    reply: Reply,
    latency: Duration,
    calls: AtomicU64,
}

impl ScriptedTransport {
    pub fn new(reply: Reply, latency: Duration) -> Self {
        Self {
            reply,
            latency,
            calls: AtomicU64::new(0),
        }
    }

    pub fn ok(body: &'static str) -> Self {
        Self::new(Reply::Status(200, body), Duration::ZERO)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        _req: HttpRequest,
    ) -> impl Future<Output = chkr_http::Result<HttpResponse>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply;
        let latency = self.latency;

        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            match reply {
                Reply::Status(status, body) => Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: Bytes::from_static(body.as_bytes()),
                }),
                Reply::Timeout => Err(chkr_http::Error::Timeout(latency)),
            }
        }
    }
}
