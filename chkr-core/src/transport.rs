use std::future::Future;
use std::sync::Arc;

use chkr_http::{HttpClient, HttpRequest, HttpResponse};

/// One request/response exchange.
///
/// Implementations must drain the response body before resolving and must never report
/// a received response (whatever its status) as an error.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        req: HttpRequest,
    ) -> impl Future<Output = chkr_http::Result<HttpResponse>> + Send;
}

impl Transport for HttpClient {
    fn send(
        &self,
        req: HttpRequest,
    ) -> impl Future<Output = chkr_http::Result<HttpResponse>> + Send {
        self.request(req)
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        req: HttpRequest,
    ) -> impl Future<Output = chkr_http::Result<HttpResponse>> + Send {
        (**self).send(req)
    }
}
