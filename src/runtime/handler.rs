//! Invocation handler orchestrating one request end to end.

use crate::gate::{ConcurrencyGate, GateClosed};
use crate::invoke::LambdaInvoker;
use crate::payload::PayloadBuilder;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

/// Orchestrates header augmentation, event encoding, the remote invoke,
/// function-error detection, result decoding, and response emission.
///
/// Stateless per request; the only cross-request state is the gate permit.
pub struct InvokeHandler {
    invoker: Arc<dyn LambdaInvoker>,
    builder: Arc<dyn PayloadBuilder>,
    gate: Arc<ConcurrencyGate>,
    function: String,
    forwarded_port: u16,
}

impl InvokeHandler {
    /// Create a handler for the named function.
    pub fn new(
        invoker: Arc<dyn LambdaInvoker>,
        builder: Arc<dyn PayloadBuilder>,
        gate: Arc<ConcurrencyGate>,
        function: impl Into<String>,
        forwarded_port: u16,
    ) -> Self {
        Self {
            invoker,
            builder,
            gate,
            function: function.into(),
            forwarded_port,
        }
    }

    /// Handle one inbound request.
    ///
    /// Holds the gate permit for the full duration, releasing it on every
    /// exit path including panic unwind. The permit is released when the
    /// fully-buffered response is returned, just before hyper flushes it
    /// to the client socket; the next waiter still cannot reach the
    /// backend before this invocation has completed, since the result is
    /// already in hand. Returns [`GateClosed`] when the gate was closed
    /// for shutdown; the caller must then drop the connection without
    /// writing a response.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
        remote_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>, GateClosed>
    where
        B: Body,
        B::Error: Display,
    {
        let _permit = self.gate.acquire().await?;
        Ok(self.proxy(req, remote_addr).await)
    }

    async fn proxy<B>(&self, mut req: Request<B>, remote_addr: SocketAddr) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Display,
    {
        // Proxy headers, appended so caller-supplied values survive. The
        // forwarded-for value is the client address with the port stripped.
        let headers = req.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&remote_addr.ip().to_string()) {
            headers.append("x-forwarded-for", value);
        }
        headers.append("x-forwarded-proto", HeaderValue::from_static("http"));
        headers.append("x-forwarded-port", HeaderValue::from(self.forwarded_port));

        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                warn!("failed to read request body: {}", err);
                return error_response("Invalid request", Some(&err));
            }
        };

        let event = match self.builder.build_request(&parts, &body, remote_addr.ip()) {
            Ok(event) => event,
            Err(err) => {
                warn!("failed to encode invocation event: {}", err);
                return error_response("Invalid request", Some(&err));
            }
        };

        let output = match self.invoker.invoke(&self.function, event).await {
            Ok(output) => output,
            Err(err) => {
                warn!(function = %self.function, "invocation failed: {}", err);
                return error_response("Failed to invoke Lambda", Some(&err));
            }
        };

        // The function itself raised: surface only the signal text and
        // discard its payload, which holds an error document rather than a
        // response envelope.
        if let Some(signal) = output.function_error {
            warn!(function = %self.function, "function error: {}", signal);
            return error_response(&format!("Lambda function error: {signal}"), None);
        }

        let decoded = match self.builder.build_response(&output.payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("failed to decode invocation result: {}", err);
                return error_response("Invalid JSON response", Some(&err));
            }
        };

        let mut response = Response::new(Full::new(decoded.body));
        *response.status_mut() = decoded.status;
        for (name, value) in &decoded.headers {
            response.headers_mut().append(name, value.clone());
        }
        response
    }
}

/// Uniform error response: 502 with a plain-text cause, optionally
/// followed by the underlying error's message text. Internal error
/// structure never reaches the client.
pub(crate) fn error_response(cause: &str, err: Option<&dyn Display>) -> Response<Full<Bytes>> {
    let mut body = format!("502 Bad Gateway\n{cause}");
    if let Some(err) = err {
        body.push('\n');
        body.push_str(&err.to_string());
    }

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::{InvokeError, InvokeOutput};
    use crate::payload::AlbPayloadBuilder;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    struct MockInvoker {
        payload: Bytes,
        function_error: Option<String>,
        fail: bool,
        seen: Mutex<Vec<Bytes>>,
    }

    impl MockInvoker {
        fn returning(payload: &'static [u8]) -> Self {
            Self {
                payload: Bytes::from_static(payload),
                function_error: None,
                fail: false,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn function_error(payload: &'static [u8], signal: &str) -> Self {
            Self {
                function_error: Some(signal.to_string()),
                ..Self::returning(payload)
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::returning(b"")
            }
        }
    }

    #[async_trait]
    impl LambdaInvoker for MockInvoker {
        async fn invoke(
            &self,
            _function: &str,
            payload: Bytes,
        ) -> Result<InvokeOutput, InvokeError> {
            self.seen.lock().unwrap().push(payload);
            if self.fail {
                return Err(InvokeError::Api(500));
            }
            Ok(InvokeOutput {
                payload: self.payload.clone(),
                function_error: self.function_error.clone(),
            })
        }
    }

    fn handler_with(invoker: MockInvoker) -> (InvokeHandler, Arc<ConcurrencyGate>) {
        let gate = Arc::new(ConcurrencyGate::single());
        let handler = InvokeHandler::new(
            Arc::new(invoker),
            Arc::new(AlbPayloadBuilder::new(false)),
            Arc::clone(&gate),
            "test-function",
            8080,
        );
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
        "192.168.1.5:54321".parse().unwrap()
    }

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn success_path_maps_result_to_response() {
        let (handler, gate) = handler_with(MockInvoker::returning(
            br#"{"statusCode":200,"body":"hi","headers":{"Content-Type":"text/plain"}}"#,
        ));

        let response = handler.handle(get("/hello?x=1"), remote()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(body_text(response).await, "hi");
        assert!(gate.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn proxy_headers_are_appended_to_the_event() {
        let invoker = MockInvoker::returning(br#"{"statusCode":200}"#);
        let gate = Arc::new(ConcurrencyGate::single());
        let invoker = Arc::new(invoker);
        let handler = InvokeHandler::new(
            Arc::clone(&invoker) as Arc<dyn LambdaInvoker>,
            Arc::new(AlbPayloadBuilder::new(false)),
            gate,
            "test-function",
            8080,
        );

        handler.handle(get("/hello"), remote()).await.unwrap();

        let seen = invoker.seen.lock().unwrap();
        let event: Value = serde_json::from_slice(&seen[0]).unwrap();
        assert_eq!(event["headers"]["x-forwarded-for"], "192.168.1.5");
        assert_eq!(event["headers"]["x-forwarded-proto"], "http");
        assert_eq!(event["headers"]["x-forwarded-port"], "8080");
        assert_eq!(event["requestContext"]["identity"]["sourceIp"], "192.168.1.5");
    }

    #[tokio::test]
    async fn transport_failure_becomes_bad_gateway() {
        let (handler, gate) = handler_with(MockInvoker::failing());

        let response = handler.handle(get("/"), remote()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_text(response).await;
        assert!(body.starts_with("502 Bad Gateway\nFailed to invoke Lambda"));
        assert!(gate.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn function_error_surfaces_signal_but_not_payload() {
        let (handler, gate) = handler_with(MockInvoker::function_error(
            br#"{"errorMessage":"secret internal detail"}"#,
            "Unhandled",
        ));

        let response = handler.handle(get("/"), remote()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_text(response).await;
        assert!(body.starts_with("502 Bad Gateway\nLambda function error: Unhandled"));
        assert!(!body.contains("secret internal detail"));
        assert!(gate.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn malformed_result_becomes_bad_gateway() {
        let (handler, gate) = handler_with(MockInvoker::returning(b"not json"));

        let response = handler.handle(get("/"), remote()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_text(response).await;
        assert!(body.starts_with("502 Bad Gateway\nInvalid JSON response"));
        assert!(gate.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn closed_gate_abandons_the_request() {
        let (handler, gate) = handler_with(MockInvoker::returning(br#"{"statusCode":200}"#));
        gate.close();

        let result = handler.handle(get("/"), remote()).await;
        assert_eq!(result.map(|_| ()), Err(GateClosed));
    }

    #[tokio::test]
    async fn error_response_includes_underlying_message_only() {
        let err = InvokeError::Api(503);
        let response = error_response("Failed to invoke Lambda", Some(&err));

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_text(response).await,
            "502 Bad Gateway\nFailed to invoke Lambda\nLambda API returned status 503"
        );
    }
}
