//! ALB target-group payload variant.
//!
//! Mirrors the event shape an Application Load Balancer sends to a Lambda
//! target and the result envelope it expects back. ALB integrations have
//! two header/query representations, single-valued maps or multi-valued
//! maps, toggled per target group; here the choice is made once at startup
//! and applied to every request.

use crate::payload::{DecodedResponse, PayloadBuilder, PayloadError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::http::request::Parts;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use url::form_urlencoded;

/// Request event sent to the function, camelCase on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlbRequestEvent {
    http_method: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_string_parameters: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    multi_value_query_string_parameters: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    multi_value_headers: Option<HashMap<String, Vec<String>>>,
    body: String,
    is_base64_encoded: bool,
    request_context: AlbRequestContext,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlbRequestContext {
    identity: AlbRequestIdentity,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlbRequestIdentity {
    source_ip: String,
}

/// Result envelope returned by the function.
///
/// `statusCode` is required; everything else may be absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbResponseEvent {
    status_code: u16,
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
    #[serde(default)]
    multi_value_headers: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    is_base64_encoded: bool,
}

/// ALB-style implementation of the [`PayloadBuilder`] contract.
#[derive(Debug, Clone, Copy)]
pub struct AlbPayloadBuilder {
    multi_value: bool,
}

impl AlbPayloadBuilder {
    /// Create a builder emitting multi-valued maps when `multi_value` is
    /// set, single-valued maps otherwise.
    pub fn new(multi_value: bool) -> Self {
        Self { multi_value }
    }

    fn single_value_query(&self, query: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            // Repeated keys collapse to the last value.
            params.insert(key.into_owned(), value.into_owned());
        }
        params
    }

    fn multi_value_query(&self, query: &str) -> HashMap<String, Vec<String>> {
        let mut params: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            params.entry(key.into_owned()).or_default().push(value.into_owned());
        }
        params
    }

    fn single_value_headers(&self, headers: &HeaderMap) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                map.insert(name.as_str().to_string(), value.to_string());
            }
        }
        map
    }

    fn multi_value_headers(&self, headers: &HeaderMap) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                map.entry(name.as_str().to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }
        map
    }
}

impl PayloadBuilder for AlbPayloadBuilder {
    fn build_request(
        &self,
        parts: &Parts,
        body: &[u8],
        source_ip: IpAddr,
    ) -> Result<Bytes, PayloadError> {
        let query = parts.uri.query().unwrap_or("");

        // Bodies that are not valid UTF-8 cannot ride in a JSON string
        // verbatim and get base64-encoded instead.
        let (body, is_base64_encoded) = match std::str::from_utf8(body) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (BASE64.encode(body), true),
        };

        let event = AlbRequestEvent {
            http_method: parts.method.as_str().to_string(),
            path: parts.uri.path().to_string(),
            query_string_parameters: (!self.multi_value).then(|| self.single_value_query(query)),
            multi_value_query_string_parameters: self
                .multi_value
                .then(|| self.multi_value_query(query)),
            headers: (!self.multi_value).then(|| self.single_value_headers(&parts.headers)),
            multi_value_headers: self.multi_value.then(|| self.multi_value_headers(&parts.headers)),
            body,
            is_base64_encoded,
            request_context: AlbRequestContext {
                identity: AlbRequestIdentity {
                    source_ip: source_ip.to_string(),
                },
            },
        };

        let encoded = serde_json::to_vec(&event).map_err(PayloadError::EncodeEvent)?;
        Ok(Bytes::from(encoded))
    }

    fn build_response(&self, payload: &[u8]) -> Result<DecodedResponse, PayloadError> {
        let event: AlbResponseEvent =
            serde_json::from_slice(payload).map_err(PayloadError::DecodeResult)?;

        let status = StatusCode::from_u16(event.status_code)
            .map_err(|_| PayloadError::InvalidStatus(event.status_code))?;

        // Both representations flatten into one multi-map; a function may
        // answer in either shape regardless of the configured request mode.
        let mut headers = HeaderMap::new();
        if let Some(map) = event.headers {
            for (name, value) in map {
                append_header(&mut headers, &name, &value)?;
            }
        }
        if let Some(map) = event.multi_value_headers {
            for (name, values) in map {
                for value in values {
                    append_header(&mut headers, &name, &value)?;
                }
            }
        }

        let body = match event.body {
            None => Bytes::new(),
            Some(text) if event.is_base64_encoded => {
                Bytes::from(BASE64.decode(text).map_err(PayloadError::DecodeBody)?)
            }
            Some(text) => Bytes::from(text),
        };

        Ok(DecodedResponse {
            status,
            headers,
            body,
        })
    }
}

fn append_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), PayloadError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| PayloadError::InvalidHeader(name.to_string()))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| PayloadError::InvalidHeader(name.as_str().to_string()))?;
    headers.append(name, value);
    Ok(())
}
