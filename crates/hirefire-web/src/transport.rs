//! Transport seam between the submitter and the network.
//!
//! [`HttpsTransport`] is the production client. [`MemoryCollector`] is a
//! scripted in-process collector for tests and local embedding: it records
//! every request and answers with queued [`Reply`] values.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport-level failure, before any HTTP status was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection or request timed out at the socket level.
    #[error("timed out: {0}")]
    TimedOut(String),

    /// Connection refused, unreachable host, TLS failure, and the like.
    #[error("{0}")]
    Failed(String),
}

/// Sends one request to the collector and returns the response head.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<Response<()>, TransportError>>;
}

/// HTTPS client backed by hyper and rustls with the webpki root store.
pub struct HttpsTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl Default for HttpsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpsTransport {
    pub fn new() -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_only()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);
        Self { client }
    }
}

impl Transport for HttpsTransport {
    fn send(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<Response<()>, TransportError>> {
        Box::pin(async move {
            let uri = request.uri().clone();
            let response = self
                .client
                .request(request.map(Full::new))
                .await
                .map_err(classify)?;

            let (parts, body) = response.into_parts();
            // Drain the body so the connection can return to the pool.
            if let Err(e) = body.collect().await {
                debug!(error = %e, %uri, "failed to drain collector response body");
            }
            Ok(Response::from_parts(parts, ()))
        })
    }
}

/// Map a client error to a transport error, spotting socket timeouts
/// anywhere in the source chain.
fn classify(err: hyper_util::client::legacy::Error) -> TransportError {
    let mut message = err.to_string();
    let mut timed_out = false;

    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                timed_out = true;
            }
        }
        source = cause.source();
    }

    if timed_out {
        TransportError::TimedOut(message)
    } else {
        TransportError::Failed(message)
    }
}

/// A scripted collector answer.
#[derive(Debug, Clone)]
pub struct Reply {
    outcome: Result<(StatusCode, Vec<(HeaderName, HeaderValue)>), TransportError>,
    delay: Duration,
}

impl Reply {
    /// Answer with a bare status code.
    pub fn status(code: u16) -> Self {
        Self {
            outcome: Ok((
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Vec::new(),
            )),
            delay: Duration::ZERO,
        }
    }

    /// Fail at the transport level.
    pub fn error(err: TransportError) -> Self {
        Self {
            outcome: Err(err),
            delay: Duration::ZERO,
        }
    }

    /// Builder method: add a response header. Invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok((_, headers)), Ok(name), Ok(value)) = (
            self.outcome.as_mut(),
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            headers.push((name, value));
        }
        self
    }

    /// Builder method: wait before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// In-process collector. Answers 200 once its reply queue is empty.
#[derive(Debug, Default)]
pub struct MemoryCollector {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Request<Bytes>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for a future request.
    pub fn push_reply(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Take every recorded request, oldest first.
    pub fn take_requests(&self) -> Vec<Request<Bytes>> {
        std::mem::take(&mut *self.requests.lock())
    }

    /// Highest number of requests observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Counts one request in flight until dropped, including when the caller
/// cancels the send.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(current, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for MemoryCollector {
    fn send(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<Response<()>, TransportError>> {
        Box::pin(async move {
            let in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);
            self.requests.lock().push(request);

            let reply = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Reply::status(200));

            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            drop(in_flight);

            let (status, headers) = reply.outcome?;
            let mut response = Response::new(());
            *response.status_mut() = status;
            response.headers_mut().extend(headers);
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request<Bytes> {
        Request::post("https://collector.test:443/")
            .body(Bytes::from_static(b"{}"))
            .unwrap()
    }

    #[tokio::test]
    async fn memory_collector_defaults_to_ok() {
        let collector = MemoryCollector::new();
        let response = collector.send(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(collector.request_count(), 1);
    }

    #[tokio::test]
    async fn memory_collector_replays_in_order() {
        let collector = MemoryCollector::new();
        collector.push_reply(Reply::status(500));
        collector.push_reply(
            Reply::status(200).with_header("hirefire-resource-buffer-ttl", "30"),
        );
        collector.push_reply(Reply::error(TransportError::Failed("refused".into())));

        assert_eq!(
            collector.send(request()).await.unwrap().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let ok = collector.send(request()).await.unwrap();
        assert_eq!(ok.headers()["hirefire-resource-buffer-ttl"], "30");
        assert_eq!(
            collector.send(request()).await.unwrap_err(),
            TransportError::Failed("refused".into())
        );
        assert_eq!(collector.take_requests().len(), 3);
        assert_eq!(collector.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_collector_tracks_concurrency() {
        let collector = std::sync::Arc::new(MemoryCollector::new());
        collector.push_reply(Reply::status(200).delayed(Duration::from_secs(1)));
        collector.push_reply(Reply::status(200).delayed(Duration::from_secs(1)));

        let a = collector.send(request());
        let b = collector.send(request());
        let (ra, rb) = tokio::join!(a, b);
        assert!(ra.is_ok() && rb.is_ok());
        assert_eq!(collector.max_in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_send_leaves_flight() {
        let collector = MemoryCollector::new();
        collector.push_reply(Reply::status(200).delayed(Duration::from_secs(5)));

        let cancelled = tokio::time::timeout(Duration::from_secs(1), collector.send(request())).await;
        assert!(cancelled.is_err());

        collector.send(request()).await.unwrap();
        assert_eq!(collector.max_in_flight(), 1);
        assert_eq!(collector.request_count(), 2);
    }

    #[tokio::test]
    async fn https_transport_reports_refused_connection() {
        let transport = HttpsTransport::new();
        let request = Request::post("https://127.0.0.1:1/")
            .body(Bytes::from_static(b"{}"))
            .unwrap();

        match transport.send(request).await {
            Err(TransportError::Failed(message)) => assert!(!message.is_empty()),
            other => panic!("expected a connection failure, got {other:?}"),
        }
    }
}
