//! HTTP listener front of the proxy.

use crate::gate::ConcurrencyGate;
use crate::invoke::{LambdaClient, LambdaInvoker};
use crate::runtime::logger::log_request;
use crate::runtime::{InvokeHandler, Options};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// The proxy server: one catch-all route for every method and path.
///
/// Each accepted connection is served on its own task; the concurrency
/// gate inside the handler is the sole serialization point.
pub struct ProxyServer {
    options: Options,
    handler: Arc<InvokeHandler>,
    gate: Arc<ConcurrencyGate>,
}

impl ProxyServer {
    /// Wire up the codec, invocation client, gate, and handler from the
    /// resolved options.
    pub fn new(options: Options) -> Self {
        let invoker: Arc<dyn LambdaInvoker> = Arc::new(LambdaClient::new(&options.endpoint));
        Self::with_invoker(options, invoker)
    }

    /// Same as [`new`](Self::new) with a caller-supplied transport.
    pub fn with_invoker(options: Options, invoker: Arc<dyn LambdaInvoker>) -> Self {
        let gate = Arc::new(ConcurrencyGate::single());
        let builder = options.api_type.payload_builder(options.multi_value);
        let handler = Arc::new(InvokeHandler::new(
            invoker,
            builder,
            Arc::clone(&gate),
            options.function.clone(),
            options.port,
        ));
        Self {
            options,
            handler,
            gate,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = self.options.bind_addr().parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = accepted?;
                    let io = TokioIo::new(stream);
                    let handler = Arc::clone(&self.handler);

                    tokio::task::spawn(async move {
                        let service = service_fn(move |req| {
                            let handler = Arc::clone(&handler);
                            async move { log_request(handler, req, remote_addr).await }
                        });

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            // Abandoned requests (gate closed) end up here
                            // as well, dropped without a response.
                            debug!("connection ended with error: {:?}", err);
                        }
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, closing gate");
                    self.gate.close();
                    return Ok(());
                }
            }
        }
    }
}
