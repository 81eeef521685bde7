//! HTTP ↔ invocation-event codec.
//!
//! A [`PayloadBuilder`] translates an inbound HTTP request into the JSON
//! event a Lambda function expects, and the function's result envelope back
//! into status, headers, and body. The handler only depends on this
//! contract, so further integration styles can attach without touching it;
//! the one implemented variant is the ALB target-group shape in
//! [`AlbPayloadBuilder`].

use bytes::Bytes;
use hyper::header::HeaderMap;
use hyper::http::request::Parts;
use hyper::StatusCode;
use std::net::IpAddr;
use thiserror::Error;

pub mod alb;

pub use alb::AlbPayloadBuilder;

/// Errors raised while encoding a request or decoding a result.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The invocation event could not be serialized.
    #[error("failed to serialize invocation event: {0}")]
    EncodeEvent(#[source] serde_json::Error),
    /// The invocation result was not a well-formed envelope.
    #[error("malformed invocation result: {0}")]
    DecodeResult(#[source] serde_json::Error),
    /// The result carried a status code outside the valid HTTP range.
    #[error("invalid status code {0} in invocation result")]
    InvalidStatus(u16),
    /// The result body was flagged base64 but did not decode.
    #[error("invalid base64 body in invocation result: {0}")]
    DecodeBody(#[source] base64::DecodeError),
    /// A result header had a name or value the HTTP layer rejects.
    #[error("invalid header {0:?} in invocation result")]
    InvalidHeader(String),
}

/// An invocation result decoded into the pieces the HTTP layer writes.
#[derive(Debug)]
pub struct DecodedResponse {
    /// Status code for the response line.
    pub status: StatusCode,
    /// Response headers, multi-valued entries preserved in order.
    pub headers: HeaderMap,
    /// Response body, base64-decoded when the result flagged it.
    pub body: Bytes,
}

/// Bidirectional codec between HTTP messages and invocation payloads.
///
/// Implementations are stateless per request; representation choices (such
/// as single- versus multi-value header maps) are fixed at construction and
/// applied uniformly to every request.
pub trait PayloadBuilder: Send + Sync {
    /// Encode a fully-read HTTP request into an invocation event payload.
    ///
    /// `source_ip` is the client address with the port already stripped; it
    /// lands in the event's request context.
    fn build_request(
        &self,
        parts: &Parts,
        body: &[u8],
        source_ip: IpAddr,
    ) -> Result<Bytes, PayloadError>;

    /// Decode an invocation result payload into an HTTP response.
    ///
    /// Absent bodies and absent header maps decode to empty ones; malformed
    /// structure or wrong field types fail.
    fn build_response(&self, payload: &[u8]) -> Result<DecodedResponse, PayloadError>;
}
