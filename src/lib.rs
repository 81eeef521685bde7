//! # lambda-proxy — HTTP bridge to a single Lambda function
//!
//! A local HTTP listener that translates every inbound request into an
//! ALB target-group invocation event, invokes one configured Lambda
//! function synchronously, and translates its result envelope back into
//! an HTTP response.
//!
//! ## Architecture
//!
//! ```text
//! client ──► logger ──► gate.acquire ──► codec.build_request
//!                                              │
//!                                              ▼
//!            write ◄── codec.build_response ◄── invoke(bytes)
//! ```
//!
//! The backend function is assumed to run with a reserved concurrency of
//! one, so the [`gate::ConcurrencyGate`] admits a single in-flight
//! invocation and queues everything else at the proxy edge. The
//! [`payload::PayloadBuilder`] contract keeps the handler
//! integration-agnostic; [`payload::AlbPayloadBuilder`] is the one
//! implemented variant. The invocation transport behind
//! [`invoke::LambdaInvoker`] targets local Lambda emulators through the
//! endpoint override.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lambda_proxy::runtime::{Options, ProxyServer};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let options = Options::parse();
//!     ProxyServer::new(options).run().await
//! }
//! ```

pub mod gate;
pub mod invoke;
pub mod payload;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::gate::{ConcurrencyGate, GateClosed, GatePermit};
    pub use crate::invoke::{InvokeError, InvokeOutput, LambdaClient, LambdaInvoker};
    pub use crate::payload::{AlbPayloadBuilder, DecodedResponse, PayloadBuilder, PayloadError};
    pub use crate::runtime::{ApiType, InvokeHandler, Options, ProxyServer};
}

pub use gate::{ConcurrencyGate, GateClosed};
pub use invoke::{LambdaClient, LambdaInvoker};
pub use payload::{AlbPayloadBuilder, PayloadBuilder};
pub use runtime::{Options, ProxyServer};
