//! In-memory transport for driving `SessionController` without a socket.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Notify};
use url::Url;
use voice_transport::{OpenedSession, TransportEvent, TransportSession, VoiceTransport};

use crate::SessionEvent;

#[derive(Clone)]
pub(crate) struct MockSession {
    pub(crate) tx: mpsc::UnboundedSender<TransportEvent>,
    pub(crate) close_calls: Arc<AtomicUsize>,
}

impl MockSession {
    pub(crate) fn push(&self, text: &str) {
        self.tx
            .send(TransportEvent::Message(text.to_string()))
            .expect("event task alive");
    }

    pub(crate) fn closes(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

struct MockHandle {
    close_calls: Arc<AtomicUsize>,
}

impl TransportSession for MockHandle {
    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.close_calls.load(Ordering::SeqCst) > 0
    }
}

#[derive(Default)]
pub(crate) struct MockTransport {
    failures_remaining: AtomicUsize,
    gate: Option<Arc<Notify>>,
    hang: AtomicBool,
    opens: AtomicUsize,
    endpoints: std::sync::Mutex<Vec<Url>>,
    sessions: std::sync::Mutex<Vec<MockSession>>,
}

impl MockTransport {
    pub(crate) fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Refuses the first `times` opens, then succeeds.
    pub(crate) fn failing(times: usize) -> Arc<Self> {
        Arc::new(Self {
            failures_remaining: AtomicUsize::new(times),
            ..Self::default()
        })
    }

    /// Every open waits for one `notify_one` on `gate`.
    pub(crate) fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            gate: Some(gate),
            ..Self::default()
        })
    }

    pub(crate) fn hanging() -> Arc<Self> {
        Arc::new(Self {
            hang: AtomicBool::new(true),
            ..Self::default()
        })
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn endpoints(&self) -> Vec<Url> {
        self.endpoints.lock().expect("endpoints").clone()
    }

    pub(crate) fn session(&self, index: usize) -> MockSession {
        self.sessions.lock().expect("sessions")[index].clone()
    }

    pub(crate) fn last_session(&self) -> Option<MockSession> {
        self.sessions.lock().expect("sessions").last().cloned()
    }

    /// Drops the transport's own sender clones so a session's event stream
    /// ends once the test lets go of its handles too.
    pub(crate) fn forget_sessions(&self) {
        self.sessions.lock().expect("sessions").clear();
    }
}

#[async_trait]
impl VoiceTransport for MockTransport {
    async fn open(&self, endpoint: &Url) -> anyhow::Result<OpenedSession> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.endpoints
            .lock()
            .expect("endpoints")
            .push(endpoint.clone());

        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(anyhow!("connection refused"));
        }

        let (tx, events) = mpsc::unbounded_channel();
        let close_calls = Arc::new(AtomicUsize::new(0));
        self.sessions.lock().expect("sessions").push(MockSession {
            tx,
            close_calls: Arc::clone(&close_calls),
        });
        Ok(OpenedSession {
            handle: Box::new(MockHandle { close_calls }),
            events,
        })
    }
}

pub(crate) async fn wait_for<F>(
    rx: &mut broadcast::Receiver<SessionEvent>,
    mut predicate: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("session event");
            if predicate(&event) {
                break event;
            }
        }
    })
    .await
    .expect("session event timeout")
}

pub(crate) fn open_form_text(fields: &[(&str, &str, &str)]) -> String {
    let fields: Vec<_> = fields
        .iter()
        .map(|(name, label, kind)| {
            serde_json::json!({ "name": name, "label": label, "type": kind })
        })
        .collect();
    serde_json::json!({ "type": "open_form", "payload": { "fields": fields } }).to_string()
}

pub(crate) fn update_field_text(name: &str, value: &str) -> String {
    serde_json::json!({
        "type": "update_field",
        "payload": { "field_name": name, "field_value": value },
    })
    .to_string()
}

pub(crate) const SUBMIT_FORM_TEXT: &str = r#"{"type":"submit_form","payload":{}}"#;
