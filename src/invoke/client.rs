//! HTTP client for the Lambda Invoke API.

use crate::invoke::{InvokeError, InvokeOutput, LambdaInvoker};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

/// Header carrying the function-error signal on an invoke response.
const FUNCTION_ERROR_HEADER: &str = "x-amz-function-error";

/// Client for the synchronous Invoke API of a Lambda endpoint.
///
/// Intended for local Lambda emulators (SAM, LocalStack and friends) via
/// the endpoint override; requests are not SigV4-signed. The client is
/// immutable and safe to share across concurrent requests.
#[derive(Debug, Clone)]
pub struct LambdaClient {
    http: Client<HttpConnector, Full<Bytes>>,
    endpoint: String,
}

impl LambdaClient {
    /// Create a client against the given endpoint base URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            http: Client::builder(TokioExecutor::new()).build_http(),
            endpoint,
        }
    }

    fn invoke_uri(&self, function: &str) -> String {
        format!(
            "{}/2015-03-31/functions/{}/invocations",
            self.endpoint, function
        )
    }
}

#[async_trait]
impl LambdaInvoker for LambdaClient {
    async fn invoke(&self, function: &str, payload: Bytes) -> Result<InvokeOutput, InvokeError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.invoke_uri(function))
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(payload))?;

        let response = self.http.request(request).await.map_err(InvokeError::Connect)?;

        let status = response.status();
        let function_error = response
            .headers()
            .get(FUNCTION_ERROR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let payload = response
            .into_body()
            .collect()
            .await
            .map_err(InvokeError::Body)?
            .to_bytes();

        if !status.is_success() {
            return Err(InvokeError::Api(status.as_u16()));
        }

        debug!(
            function,
            bytes = payload.len(),
            function_error = function_error.as_deref(),
            "invocation completed"
        );

        Ok(InvokeOutput {
            payload,
            function_error,
        })
    }
}
