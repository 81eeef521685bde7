//! Proxy configuration resolved from CLI flags and environment variables.

use crate::payload::{AlbPayloadBuilder, PayloadBuilder};
use clap::{Parser, ValueEnum};
use std::sync::Arc;

/// Supported backend integration styles.
///
/// Only the ALB target-group shape exists today; an unsupported value on
/// the command line fails option parsing, so the process exits before any
/// socket is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ApiType {
    /// ALB target-group events, optionally with multi-value headers.
    Alb,
}

impl ApiType {
    /// Construct the payload codec for this integration style.
    pub fn payload_builder(self, multi_value: bool) -> Arc<dyn PayloadBuilder> {
        match self {
            ApiType::Alb => Arc::new(AlbPayloadBuilder::new(multi_value)),
        }
    }
}

/// Command-line options, immutable once the process starts.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lambda-proxy",
    about = "Local HTTP bridge in front of a single Lambda function"
)]
pub struct Options {
    /// Lambda function name.
    #[arg(short = 'f', long = "function", env = "FUNCTION", default_value = "function")]
    pub function: String,

    /// HTTP listen address.
    #[arg(short = 'l', long = "listen", env = "BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// HTTP listen port.
    #[arg(short = 'p', long = "port", env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Lambda API endpoint.
    #[arg(
        short = 'e',
        long = "endpoint",
        env = "ENDPOINT",
        default_value = "http://127.0.0.1:3001"
    )]
    pub endpoint: String,

    /// HTTP gateway integration type ("alb" is the only supported value).
    #[arg(short = 't', long = "type", env = "API_TYPE", value_enum, default_value = "alb")]
    pub api_type: ApiType,

    /// Enable multi-value headers and query parameters in events.
    #[arg(short = 'm', long = "multi-value", env = "ALB_MULTI_VALUE")]
    pub multi_value: bool,
}

impl Options {
    /// Address the HTTP listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let options = Options::try_parse_from(["lambda-proxy"]).unwrap();

        assert_eq!(options.function, "function");
        assert_eq!(options.port, 8080);
        assert_eq!(options.api_type, ApiType::Alb);
        assert!(!options.multi_value);
        assert_eq!(options.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn short_flags_are_accepted() {
        let options = Options::try_parse_from([
            "lambda-proxy",
            "-f",
            "my-fn",
            "-p",
            "9090",
            "-e",
            "http://localhost:9001",
            "-m",
        ])
        .unwrap();

        assert_eq!(options.function, "my-fn");
        assert_eq!(options.port, 9090);
        assert_eq!(options.endpoint, "http://localhost:9001");
        assert!(options.multi_value);
    }

    #[test]
    fn unsupported_gateway_type_is_rejected() {
        let result = Options::try_parse_from(["lambda-proxy", "-t", "rest"]);
        assert!(result.is_err());
    }
}
