//! Seam between the session controller and whatever carries the agent's
//! messages (a WebSocket in production, an in-memory channel in tests).

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: Option<String> },
    Error(String),
    /// One inbound text frame, still in envelope form.
    Message(String),
}

/// Handle to a live transport session.
///
/// `close` must be idempotent and must not block. Dropping the handle
/// releases the session the same way.
pub trait TransportSession: Send + Sync {
    fn close(&self);
    fn is_closed(&self) -> bool;
}

/// What a successful `open` hands back: the session handle and the ordered
/// stream of everything the transport observes from then on.
pub struct OpenedSession {
    pub handle: Box<dyn TransportSession>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn open(&self, endpoint: &Url) -> anyhow::Result<OpenedSession>;
}

/// One-shot close latch shared between a session handle and the task that
/// owns the underlying socket.
#[derive(Debug, Default)]
pub struct ClosedFlag {
    closed: AtomicBool,
    notify: Notify,
}

impl ClosedFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that performed the close.
    pub fn set(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_waiters();
            self.notify.notify_one();
        }
        first
    }

    pub fn get(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        while !self.get() {
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    #[test]
    fn closed_flag_reports_first_close_only() {
        let flag = ClosedFlag::new();
        assert!(!flag.get());
        assert!(flag.set());
        assert!(!flag.set());
        assert!(flag.get());
    }

    #[tokio::test]
    async fn closed_flag_wakes_waiter() {
        let flag = Arc::new(ClosedFlag::new());
        let waiter = {
            let flag = Arc::clone(&flag);
            tokio::spawn(async move { flag.wait().await })
        };
        tokio::task::yield_now().await;
        flag.set();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter timeout")
            .expect("join");
    }
}
