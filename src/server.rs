//! Metrics HTTP Endpoint
//!
//! Serves `GET /metrics` from a [`MetricsRegistry`]. Every request runs a full
//! collection; concurrent scrapes each get their own task and their own
//! database round-trip.
//!
//! What happens when a scrape fails is decided here, not in the collector:
//! under [`ScrapeErrorPolicy::Exit`] the error is handed to the process wiring
//! through the fatal channel and the exporter shuts down.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::metrics::MetricsRegistry;

/// Path of the only served route.
pub const METRICS_PATH: &str = "/metrics";

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8888";

/// What to do when a scrape fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ScrapeErrorPolicy {
    /// Answer 500 and stop the exporter
    #[default]
    Exit,
    /// Answer 500 and keep serving
    Respond,
}

/// Shared state of the request handler.
#[derive(Debug)]
pub struct MetricsState {
    registry: MetricsRegistry,
    policy: ScrapeErrorPolicy,
    fatal_tx: mpsc::Sender<Error>,
}

impl MetricsState {
    /// Build the handler state and the receiving end of the fatal channel.
    pub fn new(
        registry: MetricsRegistry,
        policy: ScrapeErrorPolicy,
    ) -> (Arc<Self>, mpsc::Receiver<Error>) {
        let (fatal_tx, fatal_rx) = mpsc::channel(1);
        let state = Arc::new(Self {
            registry,
            policy,
            fatal_tx,
        });
        (state, fatal_rx)
    }

    fn report(&self, e: Error) {
        match self.policy {
            ScrapeErrorPolicy::Exit if e.is_fatal() => {
                error!(error = %e, "Scrape failed, stopping exporter");
                // A full channel means a fatal error is already pending.
                let _ = self.fatal_tx.try_send(e);
            }
            _ => warn!(error = %e, "Scrape failed"),
        }
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

async fn handle(
    state: Arc<MetricsState>,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    if req.uri().path() != METRICS_PATH {
        return Ok(text_response(StatusCode::NOT_FOUND, "not found"));
    }
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return Ok(text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed",
        ));
    }

    debug!("Scrape started");
    let response = match state.registry.render().await {
        Ok((body, content_type)) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            if let Ok(value) = content_type.parse() {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
        Err(e) => {
            state.report(e);
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "error collecting metrics",
            )
        }
    };
    Ok(response)
}

/// Pause before accepting again after a failed `accept`.
///
/// Errors that only concern the one peer are retried immediately; anything
/// else (e.g. running out of file descriptors) backs off for a second.
fn accept_backoff(e: &io::Error) -> Duration {
    match e.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset => Duration::ZERO,
        _ => Duration::from_secs(1),
    }
}

/// HTTP server exposing the metrics route.
#[derive(Debug)]
pub struct MetricsServer {
    listener: TcpListener,
    state: Arc<MetricsState>,
}

impl MetricsServer {
    /// Bind the listener. Failure here is fatal at startup.
    pub async fn bind(addr: &str, state: Arc<MetricsState>) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address '{}': {}", addr, e)))?;

        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;

        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!("Metrics server listening on {}", self.local_addr()?);

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        let backoff = accept_backoff(&e);
                        warn!(error = %e, ?backoff, "Metrics server accept error");
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(backoff) => continue,
                        }
                    }
                },
            };

            let io = TokioIo::new(stream);
            let state = self.state.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| handle(state.clone(), req));
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(%peer, "Metrics connection error: {}", e);
                }
            });
        }

        info!("Metrics server stopped");
        Ok(())
    }
}
