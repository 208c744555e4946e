//! Test helpers: signed requests, a relay on a real socket, a throwaway
//! downstream target and captured logs.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use tokio::net::TcpListener;
use tracing_subscriber::fmt::MakeWriter;
use url::Url;

use crate::forward::{DeliveryProcessor, Forwarder, RetryPolicy};
use crate::web::envelope::{Delivery, DeliveryEnvelope, EVENT_HEADER, SIGNATURE_HEADER};
use crate::web::handlers::{router, AppState};
use crate::web::registry::SecretRegistry;
use crate::web::server::{serve, ConnectionLimits};
use crate::web::signature::{compute_signature, format_signature_header, SignatureVerifier};

/// Build a POST request to `path` signed with `secret`.
pub(crate) fn signed_request(path: &str, secret: &[u8], body: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(SIGNATURE_HEADER, format_signature_header(&compute_signature(secret, body)))
        .header(CONTENT_TYPE, "application/json")
        .header("content-length", body.len())
        .header(EVENT_HEADER, "push")
        .body(Body::from(body.to_vec()))
        .unwrap()
}

/// Run a signed request through the full validation pipeline.
pub(crate) async fn signed_delivery(secret: &[u8], body: &[u8]) -> Delivery {
    let (parts, _) = signed_request("/testa/", secret, body).into_parts();
    let remote: SocketAddr = "192.0.2.1:40000".parse().unwrap();

    let chunk = Bytes::copy_from_slice(body);
    DeliveryEnvelope::validate_header(&parts, remote)
        .unwrap()
        .read_body(futures::stream::iter([Ok::<_, Infallible>(chunk)]))
        .await
        .unwrap()
        .authenticate(&SignatureVerifier::new(secret))
        .unwrap()
}

/// A URL on localhost that nothing listens on.
pub(crate) async fn unused_local_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/")).unwrap()
}

/// The relay listening on a local port, with `/testa/` signed by `A` and
/// `/testb/` signed by `B`.
pub(crate) struct RelayServer {
    addr: SocketAddr,
}

impl RelayServer {
    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{path}", self.addr)).unwrap()
    }
}

/// Start the relay on `127.0.0.1:0`, forwarding to `target` when given.
pub(crate) async fn start_relay(target: Option<Url>, limits: ConnectionLimits) -> RelayServer {
    let registry = SecretRegistry::from_secrets([("testa", "A"), ("testb", "B")]).unwrap();
    let processor = match target {
        Some(url) => DeliveryProcessor::Forward(
            Forwarder::new(
                url,
                Duration::from_secs(2),
                RetryPolicy::new(3, Duration::from_millis(10)),
            )
            .unwrap(),
        ),
        None => DeliveryProcessor::LogOnly,
    };
    let app = router(AppState::new(registry, processor, Duration::from_secs(5)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, app, limits, std::future::pending()));

    RelayServer { addr }
}

/// JSON log lines written while the guard from [`capture_logs`] is alive.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route this thread's events into a buffer, formatted like production logs.
/// Only reliable on the current-thread runtime `#[tokio::test]` uses.
pub(crate) fn capture_logs() -> (tracing::subscriber::DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_writer(logs.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), logs)
}

#[derive(Debug, Clone)]
pub(crate) struct Received {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub event: Option<String>,
}

struct TargetState {
    failures: u32,
    hits: AtomicU32,
    received: Mutex<Vec<Received>>,
}

/// Downstream target that answers 500 to its first `failures` requests and
/// 200 afterwards.
pub(crate) struct TargetServer {
    addr: SocketAddr,
    state: Arc<TargetState>,
}

impl TargetServer {
    pub(crate) async fn start(failures: u32) -> Self {
        let state = Arc::new(TargetState {
            failures,
            hits: AtomicU32::new(0),
            received: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .fallback(record)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub(crate) fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    pub(crate) fn hits(&self) -> u32 {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub(crate) fn received(&self) -> Vec<Received> {
        self.state.received.lock().unwrap().clone()
    }

    /// Poll for up to a second until at least `n` requests arrived.
    pub(crate) async fn wait_for_hits(&self, n: u32) -> bool {
        for _ in 0..100 {
            if self.hits() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.hits() >= n
    }
}

async fn record(
    State(state): State<Arc<TargetState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };

    state.received.lock().unwrap().push(Received {
        body,
        content_type: header(CONTENT_TYPE.as_str()),
        event: header(EVENT_HEADER),
    });

    let hit = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    if hit <= state.failures {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}
