//! The HTTP server: accept loop, per-connection tasks, gateway dispatch

use crate::cache::{CachedForwarder, MemoryCache};
use crate::dispatch::{BoxError, HttpDispatcher, ProxyBody};
use crate::forwarder::EdgeForwarder;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Entry point selection. The plain forwarder is the default; the cached
/// variant is opt-in via `cache.enabled`.
pub enum Gateway {
    Direct(EdgeForwarder<HttpDispatcher>),
    Cached(CachedForwarder<HttpDispatcher, MemoryCache>),
}

impl Gateway {
    pub async fn handle(&self, req: Request<ProxyBody>) -> Response<ProxyBody> {
        match self {
            Gateway::Direct(forwarder) => forwarder.handle(req).await,
            Gateway::Cached(forwarder) => forwarder.handle_cached(req).await,
        }
    }
}

/// The edge proxy server
pub struct ProxyServer {
    bind_addr: SocketAddr,
    gateway: Arc<Gateway>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ProxyServer {
    pub fn new(
        bind_addr: SocketAddr,
        gateway: Arc<Gateway>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bind_addr,
            gateway,
            shutdown_rx,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "Edge proxy listening (HTTP/1.1 and HTTP/2)");

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let gateway = Arc::clone(&self.gateway);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, addr, gateway).await {
                                    debug!(addr = %addr, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Edge proxy shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    gateway: Arc<Gateway>,
) -> anyhow::Result<()> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let gateway = Arc::clone(&gateway);
        async move {
            let req = req.map(|body| body.map_err(BoxError::from).boxed_unsync());
            let response = gateway.handle(req).await;
            debug!(addr = %addr, status = %response.status(), "Response sent");
            Ok::<_, std::convert::Infallible>(response)
        }
    });

    // Use auto::Builder to support both HTTP/1.1 and HTTP/2 on the same port
    AutoBuilder::new(TokioExecutor::new())
        .http1()
        .preserve_header_case(true)
        .http2()
        .max_concurrent_streams(250)
        .serve_connection(io, service)
        .await
        .map_err(|e| anyhow::anyhow!("Connection error: {}", e))?;

    Ok(())
}
