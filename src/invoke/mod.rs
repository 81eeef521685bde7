//! Lambda invocation transport.
//!
//! The handler only sees the [`LambdaInvoker`] trait: an opaque synchronous
//! remote call taking an event payload and returning a result payload plus
//! an out-of-band function-error signal. [`LambdaClient`] is the production
//! implementation speaking the Lambda Invoke API over HTTP.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod client;

pub use client::LambdaClient;

/// Outcome of a completed invocation.
#[derive(Debug, Clone)]
pub struct InvokeOutput {
    /// Raw result payload returned by the function.
    pub payload: Bytes,
    /// Set when the function itself raised an unhandled error. The payload
    /// then holds the error document, not a response envelope.
    pub function_error: Option<String>,
}

/// Transport-level invocation failures.
///
/// Distinct from a function error: these mean the call never completed,
/// not that the function ran and failed.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The invoke request could not be constructed.
    #[error("invalid invoke request: {0}")]
    Request(#[from] hyper::http::Error),
    /// The connection to the Lambda endpoint failed.
    #[error("connection to Lambda endpoint failed: {0}")]
    Connect(#[source] hyper_util::client::legacy::Error),
    /// The result payload could not be read.
    #[error("failed to read invocation result: {0}")]
    Body(#[source] hyper::Error),
    /// The Invoke API answered with a non-success status.
    #[error("Lambda API returned status {0}")]
    Api(u16),
}

/// Synchronous invocation of one named function.
#[async_trait]
pub trait LambdaInvoker: Send + Sync {
    /// Invoke `function` with the encoded event and wait for its result.
    async fn invoke(&self, function: &str, payload: Bytes) -> Result<InvokeOutput, InvokeError>;
}
