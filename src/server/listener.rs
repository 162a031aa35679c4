use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tower::ServiceExt;
use tracing::{debug, warn};

use crate::config::ServerTimeouts;

/// Back-off after a failed `accept`, e.g. when file descriptors run out.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Marker for "no request head is being read".
const NO_HEAD: u64 = u64::MAX;

/// Tracks when a connection last did something.
///
/// A connection is in one of three phases: reading a request head (bounded by
/// the read deadline), serving a request (bounded by the write deadline), or
/// idle between requests (bounded by the idle deadline). A fresh connection
/// starts out reading its first head.
#[derive(Debug)]
struct Activity {
    origin: Instant,
    last_ms: AtomicU64,
    head_started_ms: AtomicU64,
    in_flight: AtomicUsize,
}

impl Activity {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
            head_started_ms: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        })
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn since(&self, ms: u64) -> Duration {
        self.origin
            .elapsed()
            .saturating_sub(Duration::from_millis(ms))
    }

    fn touch(&self) {
        self.last_ms.store(self.now_ms(), Ordering::Relaxed);
    }

    /// Bytes arrived. Between requests this starts the read deadline.
    fn bytes_received(&self) {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            return;
        }
        let _ = self.head_started_ms.compare_exchange(
            NO_HEAD,
            self.now_ms(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// A complete request head was parsed and handed to the service.
    fn begin(self: &Arc<Self>) -> ActivityGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.head_started_ms.store(NO_HEAD, Ordering::Release);
        self.touch();
        ActivityGuard(Arc::clone(self))
    }

    /// How long the current request head has been arriving, if one is.
    fn reading_for(&self) -> Option<Duration> {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            return None;
        }
        match self.head_started_ms.load(Ordering::Acquire) {
            NO_HEAD => None,
            started => Some(self.since(started)),
        }
    }

    /// How long the connection has been idle, or `None` while a request is
    /// being read or served.
    fn idle_for(&self) -> Option<Duration> {
        if self.in_flight.load(Ordering::Acquire) > 0
            || self.head_started_ms.load(Ordering::Acquire) != NO_HEAD
        {
            return None;
        }
        Some(self.since(self.last_ms.load(Ordering::Relaxed)))
    }

    /// Resolves once a request head has taken longer than `read` to arrive.
    async fn read_expired(&self, read: Duration) {
        loop {
            let wait = match self.reading_for() {
                Some(elapsed) if elapsed >= read => return,
                Some(elapsed) => read - elapsed,
                None => read,
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Resolves once the connection has been idle for `idle`.
    async fn idle_expired(&self, idle: Duration) {
        loop {
            let wait = match self.idle_for() {
                Some(elapsed) if elapsed >= idle => return,
                Some(elapsed) => idle - elapsed,
                None => idle,
            };
            tokio::time::sleep(wait).await;
        }
    }
}

struct ActivityGuard(Arc<Activity>);

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.0.touch();
        self.0.head_started_ms.store(NO_HEAD, Ordering::Release);
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A socket that reports incoming bytes to its connection's [`Activity`].
struct TrackedStream {
    inner: TcpStream,
    activity: Arc<Activity>,
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            this.activity.bytes_received();
        }
        poll
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Accept connections until `shutdown` flips to `true`.
///
/// Returns the still-running connection tasks so the caller can drain or
/// abort them. The listening socket is closed on return.
pub(crate) async fn accept_loop(
    listener: TcpListener,
    app: Router,
    timeouts: ServerTimeouts,
    mut shutdown: watch::Receiver<bool>,
) -> JoinSet<()> {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if *shutdown.borrow() {
                        break;
                    }
                    debug!(%peer, "accepted connection");
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        app.clone(),
                        timeouts,
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    warn!("failed to accept connection: {e}");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown.changed() => break,
        }
    }

    drop(listener);
    debug!(open = connections.len(), "listener closed");
    connections
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    timeouts: ServerTimeouts,
    mut shutdown: watch::Receiver<bool>,
) {
    let activity = Activity::new();
    let tracker = Arc::clone(&activity);
    let write_timeout = timeouts.write;

    let service = service_fn(move |request: Request<Incoming>| {
        let app = app.clone();
        let guard = tracker.begin();
        async move {
            let _guard = guard;
            let response = match tokio::time::timeout(write_timeout, app.oneshot(request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(never)) => match never {},
                Err(_) => {
                    warn!(%peer, "response not produced within {write_timeout:?}");
                    (StatusCode::SERVICE_UNAVAILABLE, "response deadline exceeded").into_response()
                }
            };
            Ok::<_, Infallible>(response)
        }
    });

    // hyper's own header timer also runs while a keep-alive connection waits
    // for its next request, so the read deadline is enforced here instead.
    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(None)
        .keep_alive(true);
    let stream = TrackedStream {
        inner: stream,
        activity: Arc::clone(&activity),
    };
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    debug!(%peer, "connection closed with error: {e}");
                }
                break;
            }
            _ = shutdown.changed(), if !draining => {
                conn.as_mut().graceful_shutdown();
                draining = true;
            }
            _ = activity.read_expired(timeouts.read) => {
                debug!(%peer, "request head not received within {:?}", timeouts.read);
                break;
            }
            _ = activity.idle_expired(timeouts.idle), if !draining => {
                debug!(%peer, "closing idle connection");
                conn.as_mut().graceful_shutdown();
                draining = true;
            }
        }
    }
}
