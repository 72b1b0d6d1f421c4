//! Hyper accept loop
//!
//! One tokio task per connection, HTTP/1.1 via `hyper_util`. Bodies are
//! capped at `max_body_size` and each request is bounded by
//! `request_timeout`.

use super::{AppResponse, HttpError, RequestContext};
use crate::config::ServerConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// Application entry point invoked for every parsed request
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, request: RequestContext) -> AppResponse;
}

pub struct HttpServer<H: Handler> {
    handler: Arc<H>,
    config: ServerConfig,
}

impl<H: Handler> HttpServer<H> {
    pub fn new(handler: Arc<H>, config: ServerConfig) -> Self {
        Self { handler, config }
    }

    /// Bind the listener; port 0 picks a free port (see [`BoundServer::local_addr`])
    pub async fn bind(self) -> Result<BoundServer<H>> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        Ok(BoundServer { listener, handler: self.handler, config: self.config })
    }
}

pub struct BoundServer<H: Handler> {
    listener: TcpListener,
    handler: Arc<H>,
    config: ServerConfig,
}

impl<H: Handler> BoundServer<H> {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("Listener has no local address")
    }

    /// Serve until the process ends
    pub async fn serve(self) -> Result<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves; in-flight connections finish on their own
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        log::info!("Marquee listening on http://{}", addr);

        let max_body = self.config.max_body_size;
        let timeout = Duration::from_secs(self.config.request_timeout);
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, remote_addr) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    log::warn!("Accept failed: {}", e);
                    continue;
                }
            };
            let handler = self.handler.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = hyper::service::service_fn(move |req| {
                    let handler = handler.clone();
                    async move {
                        Ok::<_, Infallible>(dispatch(handler.as_ref(), req, max_body, timeout).await)
                    }
                });

                if let Err(err) =
                    hyper::server::conn::http1::Builder::new().serve_connection(io, service).await
                {
                    log::debug!("Connection error from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

async fn dispatch<H: Handler>(
    handler: &H,
    req: Request<Incoming>,
    max_body: usize,
    timeout: Duration,
) -> Response<Full<Bytes>> {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match read_request(req, max_body).await {
        Ok(ctx) => match tokio::time::timeout(timeout, handler.handle(ctx)).await {
            Ok(response) => response,
            Err(_) => {
                log::warn!("{} {} timed out after {:?}", method, path, timeout);
                AppResponse::error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "request_timeout",
                    "Request timed out",
                )
            }
        },
        Err(err @ HttpError::BodyTooLarge { .. }) => {
            AppResponse::error(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", &err.to_string())
        }
        Err(err) => AppResponse::error(StatusCode::BAD_REQUEST, "bad_request", &err.to_string()),
    };

    log::info!("{} {} {} {:?}", method, path, response.status.as_u16(), start.elapsed());
    response.into_response()
}

async fn read_request(req: Request<Incoming>, max_body: usize) -> Result<RequestContext, HttpError> {
    let (parts, body) = req.into_parts();
    let collected = Limited::new(body, max_body).collect().await.map_err(|e| {
        if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
            HttpError::BodyTooLarge { limit: max_body }
        } else {
            HttpError::Read(e.to_string())
        }
    })?;

    RequestContext::from_parts(&parts, collected.to_bytes())
}
