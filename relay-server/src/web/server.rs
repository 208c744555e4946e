//! Connection handling for the webhook listener.
//!
//! Connections are served over HTTP/1 by hyper directly rather than through
//! `axum::serve`, so every connection gets a header read timeout, a bounded
//! read buffer and an overall deadline.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::ConnectInfo, Router};
use hyper::{body::Incoming, server::conn::http1, service::service_fn, Request};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use tower::ServiceExt;
use tracing::{debug, info, warn};

/// Smallest read buffer hyper accepts. The header block itself is checked
/// against `MAX_HEADER_LENGTH` during validation.
pub const MAX_READ_BUFFER: usize = 8192;

/// Per-connection bounds.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// Time allowed for a client to send its complete request headers
    pub header_read_timeout: Duration,

    /// Upper bound for the lifetime of one connection
    pub connection_timeout: Duration,
}

/// Accept connections until `shutdown` resolves, then wait for the open ones
/// to finish. Each connection is bounded by `limits.connection_timeout`, so
/// draining always ends.
pub async fn serve<F>(listener: TcpListener, app: Router, limits: ConnectionLimits, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut connections = JoinSet::new();
    let mut shutdown = std::pin::pin!(shutdown);

    loop {
        let (stream, remote) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept_failed");
                    continue;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
        };

        connections.spawn(serve_connection(stream, remote, app.clone(), limits));
    }

    info!(open_connections = connections.len(), "listener_draining");
    while connections.join_next().await.is_some() {}
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    app: Router,
    limits: ConnectionLimits,
) {
    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(remote));
        app.clone().oneshot(request)
    });

    let connection = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(limits.header_read_timeout)
        .max_buf_size(MAX_READ_BUFFER)
        .serve_connection(TokioIo::new(stream), service);

    match tokio::time::timeout(limits.connection_timeout, connection).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(remote = %remote, error = %e, "connection_error"),
        Err(_) => debug!(remote = %remote, "connection_timed_out"),
    }
}
