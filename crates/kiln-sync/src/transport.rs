use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use kiln_protocol::{KilnCodec, KilnMessage};

use crate::error::{SyncError, SyncResult};

/// Default time a single request may take before it is abandoned.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Carries one request to a remote scope and returns its response.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn request(&self, msg: KilnMessage) -> SyncResult<KilnMessage>;
}

/// Serving side of the protocol: answers one request.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, msg: KilnMessage) -> KilnMessage;
}

/// Counters kept by a transport.
#[derive(Debug, Default)]
pub struct TransportStats {
    requests: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl TransportStats {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Counted before the request leaves, whether or not it is answered.
    fn record_sent(&self, sent: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
    }

    fn record_received(&self, received: usize) {
        self.bytes_received.fetch_add(received as u64, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// LoopbackTransport
// ---------------------------------------------------------------------------

/// In-process transport: frames each message through [`KilnCodec`] and
/// hands it to a local [`RequestHandler`].
///
/// Exercises the same encoding as a network stream, and its
/// [`TransportStats`] show exactly how much traffic an operation produced.
pub struct LoopbackTransport {
    handler: Arc<dyn RequestHandler>,
    timeout: Duration,
    stats: TransportStats,
}

impl LoopbackTransport {
    pub fn new(handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            handler,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            stats: TransportStats::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

#[async_trait]
impl RemoteTransport for LoopbackTransport {
    async fn request(&self, msg: KilnMessage) -> SyncResult<KilnMessage> {
        let frame = KilnCodec::encode(&msg)?;
        let (request, _) = KilnCodec::decode(&frame)?;
        debug!(message = request.type_name(), bytes = frame.len(), "loopback request");
        self.stats.record_sent(frame.len());

        let response = tokio::time::timeout(self.timeout, self.handler.handle(request))
            .await
            .map_err(|_| SyncError::Timeout(self.timeout))?;

        let reply = KilnCodec::encode(&response)?;
        let (response, _) = KilnCodec::decode(&reply)?;
        self.stats.record_received(reply.len());
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// StreamTransport
// ---------------------------------------------------------------------------

/// Transport over an established byte stream (SSH channel, socket, pipe).
///
/// Requests on one stream are serialized: the stream is held from writing
/// the request until the response frame is read.
///
/// Frames carry no request id, so a request abandoned mid-exchange (timeout,
/// I/O error) leaves the stream out of step with its peer. The transport is
/// then broken and every later request fails with [`SyncError::Transport`];
/// callers reconnect with a new stream.
pub struct StreamTransport<S> {
    stream: Mutex<S>,
    timeout: Duration,
    stats: TransportStats,
    broken: AtomicBool,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: Mutex::new(stream),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            stats: TransportStats::default(),
            broken: AtomicBool::new(false),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    async fn exchange(&self, msg: &KilnMessage) -> SyncResult<(KilnMessage, usize)> {
        let mut stream = self.stream.lock().await;
        KilnCodec::write_message(&mut *stream, msg).await?;
        let response = KilnCodec::read_message(&mut *stream)
            .await?
            .ok_or_else(|| SyncError::Transport("connection closed by remote".into()))?;
        let received = KilnCodec::encode(&response).map(|f| f.len()).unwrap_or(0);
        Ok((response, received))
    }
}

#[async_trait]
impl<S> RemoteTransport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn request(&self, msg: KilnMessage) -> SyncResult<KilnMessage> {
        if self.is_broken() {
            return Err(SyncError::Transport(
                "stream is out of step after an abandoned request".into(),
            ));
        }
        let sent = KilnCodec::encode(&msg)?.len();
        self.stats.record_sent(sent);
        let outcome = tokio::time::timeout(self.timeout, self.exchange(&msg))
            .await
            .map_err(|_| SyncError::Timeout(self.timeout))
            .and_then(|r| r);
        match outcome {
            Ok((response, received)) => {
                self.stats.record_received(received);
                Ok(response)
            }
            Err(e) => {
                self.broken.store(true, Ordering::SeqCst);
                warn!(error = %e, "stream transport broken");
                Err(e)
            }
        }
    }
}

/// Answer requests read from `stream` until the peer closes it.
pub async fn serve_stream<S>(handler: Arc<dyn RequestHandler>, mut stream: S) -> SyncResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    while let Some(request) = KilnCodec::read_message(&mut stream).await? {
        debug!(message = request.type_name(), "serving request");
        let response = handler.handle(request).await;
        KilnCodec::write_message(&mut stream, &response).await?;
    }
    Ok(())
}
