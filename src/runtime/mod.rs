//! Proxy runtime: configuration, request handling, logging, and the server.

pub mod config;
pub mod handler;
pub mod logger;
pub mod server;

pub use config::{ApiType, Options};
pub use handler::InvokeHandler;
pub use logger::{log_request, StatusCapture};
pub use server::ProxyServer;
