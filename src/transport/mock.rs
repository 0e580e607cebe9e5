//! In-memory transport for tests
//!
//! Hands out channel-backed socket halves and keeps a server-side view
//! of each connection so tests can inject inbound frames, inspect what
//! the client sent, and force closures or transport errors.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Notify;

use super::{SocketSink, SocketStream, Transport};
use crate::error::SessionError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Transport whose sockets are in-process channel pairs.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    connects: AtomicUsize,
    reject_connects: AtomicUsize,
    connect_delay: Mutex<Duration>,
    current: Mutex<Option<MockConnection>>,
    notify: Notify,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `connect` has been called, successful or not.
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Make the next `n` connect attempts fail with `SocketError`.
    pub fn reject_next_connects(&self, n: usize) {
        self.inner.reject_connects.store(n, Ordering::SeqCst);
    }

    /// Make every connect attempt take this long before resolving,
    /// simulating a slow handshake.
    pub fn set_connect_delay(&self, delay: Duration) {
        *lock(&self.inner.connect_delay) = delay;
    }

    /// Server-side view of the most recent connection, if any.
    pub fn latest_connection(&self) -> Option<MockConnection> {
        lock(&self.inner.current).clone()
    }

    /// Wait until at least `n` connect attempts have happened and return
    /// the most recent connection.
    pub async fn wait_for_connects(&self, n: usize) -> MockConnection {
        loop {
            let notified = self.inner.notify.notified();
            if self.connect_count() >= n {
                if let Some(conn) = self.latest_connection() {
                    return conn;
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SocketSink>, Box<dyn SocketStream>), SessionError> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.inner.connect_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.inner.reject_connects.load(Ordering::SeqCst);
        if remaining > 0 {
            self.inner.reject_connects.store(remaining - 1, Ordering::SeqCst);
            self.inner.notify.notify_waiters();
            return Err(SessionError::SocketError);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let conn = MockConnection {
            url: url.to_string(),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        *lock(&self.inner.current) = Some(conn);
        self.inner.notify.notify_waiters();

        Ok((Box::new(MockSink { sent, closed }), Box::new(MockStream { rx })))
    }
}

/// Server-side handle to one mock connection.
#[derive(Clone)]
pub struct MockConnection {
    url: String,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<Result<String, SessionError>>>>>,
}

impl MockConnection {
    /// URL the client connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Frames the client has sent on this connection.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    /// Deliver an inbound text frame to the client.
    pub fn push_text(&self, text: impl Into<String>) {
        if let Some(tx) = lock(&self.tx).as_ref() {
            let _ = tx.send(Ok(text.into()));
        }
    }

    /// Surface a transport error on the client's read half.
    pub fn push_error(&self) {
        if let Some(tx) = lock(&self.tx).as_ref() {
            let _ = tx.send(Err(SessionError::SocketError));
        }
    }

    /// Close the connection from the server side; the client's read
    /// half ends as if the peer had closed, and further sends fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.tx).take();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.tx).is_none()
    }

    /// True once either side closed the socket, including a client that
    /// discarded the handle via `SocketSink::close`.
    pub fn sink_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockSink {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl SocketSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::SocketError);
        }
        lock(&self.sent).push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<Result<String, SessionError>>,
}

#[async_trait]
impl SocketStream for MockStream {
    async fn next_text(&mut self) -> Option<Result<String, SessionError>> {
        self.rx.recv().await
    }
}
