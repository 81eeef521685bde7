//! Request logging and the last-resort fault boundary.

use crate::gate::GateClosed;
use crate::runtime::handler::{error_response, InvokeHandler};
use bytes::Bytes;
use futures::FutureExt;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use std::any::Any;
use std::fmt::Display;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Records the first status code written for a request.
///
/// Later writes do not change the recorded value; a request that never
/// writes a status reports the implicit 200.
#[derive(Debug)]
pub struct StatusCapture {
    status: StatusCode,
    written: bool,
}

impl StatusCapture {
    /// Start with the implicit 200.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            written: false,
        }
    }

    /// Record a status write; only the first one sticks.
    pub fn record(&mut self, status: StatusCode) {
        if !self.written {
            self.status = status;
            self.written = true;
        }
    }

    /// The captured status.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl Default for StatusCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the handler for one request with logging and panic recovery.
///
/// Measures latency, captures the final status, and converts a panic into
/// a 502 "Panic" response instead of tearing down the connection task. The
/// method, final status, URI, and elapsed time are logged on every outcome
/// except a gate-closed abandonment, which is logged at debug and
/// propagated so no response is written.
pub async fn log_request<B>(
    handler: Arc<InvokeHandler>,
    req: Request<B>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, GateClosed>
where
    B: Body,
    B::Error: Display,
{
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let mut capture = StatusCapture::new();

    let outcome = AssertUnwindSafe(handler.handle(req, remote_addr))
        .catch_unwind()
        .await;

    let response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(closed)) => {
            debug!(%method, %uri, "request abandoned, gate closed");
            return Err(closed);
        }
        Err(panic) => {
            error!("Panic: {}", panic_message(panic.as_ref()));
            error_response("Panic", None)
        }
    };

    capture.record(response.status());
    info!(
        "[{}] {} {} {:?}",
        method,
        capture.status().as_u16(),
        uri,
        start.elapsed()
    );
    Ok(response)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::ConcurrencyGate;
    use crate::invoke::{InvokeError, InvokeOutput, LambdaInvoker};
    use crate::payload::AlbPayloadBuilder;
    use async_trait::async_trait;
    use http_body_util::BodyExt;

    struct PanickingInvoker;

    #[async_trait]
    impl LambdaInvoker for PanickingInvoker {
        async fn invoke(
            &self,
            _function: &str,
            _payload: Bytes,
        ) -> Result<InvokeOutput, InvokeError> {
            panic!("invoker exploded");
        }
    }

    fn handler(invoker: Arc<dyn LambdaInvoker>) -> (Arc<InvokeHandler>, Arc<ConcurrencyGate>) {
        let gate = Arc::new(ConcurrencyGate::single());
        let handler = Arc::new(InvokeHandler::new(
            invoker,
            Arc::new(AlbPayloadBuilder::new(false)),
            Arc::clone(&gate),
            "test-function",
            8080,
        ));
        (handler, gate)
    }

    fn get(uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn remote() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn status_capture_keeps_the_first_write() {
        let mut capture = StatusCapture::new();
        assert_eq!(capture.status(), StatusCode::OK);

        capture.record(StatusCode::BAD_GATEWAY);
        capture.record(StatusCode::NOT_FOUND);
        assert_eq!(capture.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn panic_becomes_bad_gateway_response() {
        let (handler, gate) = handler(Arc::new(PanickingInvoker));

        let response = log_request(handler, get("/"), remote()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"502 Bad Gateway\nPanic");

        // The unwind must have released the permit.
        assert!(gate.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn gate_closed_is_propagated_without_response() {
        struct NeverInvoker;

        #[async_trait]
        impl LambdaInvoker for NeverInvoker {
            async fn invoke(
                &self,
                _function: &str,
                _payload: Bytes,
            ) -> Result<InvokeOutput, InvokeError> {
                unreachable!("gate is closed, invoke must not run")
            }
        }

        let (handler, gate) = handler(Arc::new(NeverInvoker));
        gate.close();

        let result = log_request(handler, get("/"), remote()).await;
        assert_eq!(result.map(|_| ()), Err(GateClosed));
    }
}
