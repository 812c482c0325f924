//! # HTTP Server
//!
//! HTTP/1 transport for the [`RequestRouter`], built on Hyper and Tokio.
//!
//! ## Key Features
//!
//! - One task per connection, keep-alive handled by hyper
//! - Body size limit enforced before the router sees the request (413)
//! - Graceful shutdown on Ctrl-C, draining open connections up to a timeout

use crate::error::{Error, Result};
use crate::request::IncomingRequest;
use crate::response::{encode, ResponseEnvelope};
use crate::router::RequestRouter;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, error, info, warn};

/// HTTP Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// How long to wait for open connections on shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// HTTP server driving a [`RequestRouter`]
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    router: RequestRouter,
}

impl Server {
    /// Create a new server
    #[must_use]
    pub fn new(router: RequestRouter, config: ServerConfig) -> Self {
        Self { config, router }
    }

    /// Server configuration
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the socket cannot be bound
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.address;
        let bind_error = |source: std::io::Error| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        socket.listen(1024).map_err(bind_error)
    }

    /// Bind and serve until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if binding fails, `Error::Io` if accepting
    /// a connection fails
    pub async fn serve(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if accepting a connection fails
    pub async fn serve_with_shutdown(
        &self,
        listener: TcpListener,
        shutdown: impl std::future::Future<Output = ()>,
    ) -> Result<()> {
        info!(address = %listener.local_addr()?, "Server listening");

        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);
                    let router = self.router.clone();
                    let active = Arc::clone(&active);

                    active.fetch_add(1, Ordering::AcqRel);
                    tokio::task::spawn(async move {
                        let service = service_fn(move |req| {
                            let router = router.clone();
                            async move { handle_request(req, &router, max_body_size).await }
                        });

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            debug!(remote = %remote_addr, error = %err, "Connection closed with error");
                        }
                        active.fetch_sub(1, Ordering::AcqRel);
                    });
                }
                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Acquire) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain).await.is_err() {
            warn!(
                open_connections = active.load(Ordering::Acquire),
                "Shutdown timeout elapsed with connections still open"
            );
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    router: &RequestRouter,
    max_body_size: usize,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let envelope = match IncomingRequest::from_hyper_with_limit(req, max_body_size).await {
        Ok(request) => router.route(request).await,
        Err(err) => encode(Err(err)),
    };
    Ok(into_hyper(&envelope))
}

/// Convert an envelope into a hyper response
pub(crate) fn into_hyper(envelope: &ResponseEnvelope) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(envelope.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Full::new(Bytes::from(envelope.to_json())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(envelope.content_type()));
    response
}
