use std::{
    fmt,
    ops::ControlFlow,
    sync::{Arc, Weak},
};

use chrono::{DateTime, Utc};
use shared::protocol::{parse_inbound, InboundEvent};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use voice_transport::{OpenedSession, TransportEvent, TransportSession, VoiceTransport};

pub mod config;
pub mod error;
pub mod form;
pub mod transport;

pub use config::{normalize_endpoint, resolve_endpoint, SessionOptions, DEFAULT_ENDPOINT};
pub use form::{
    Applied, FieldValues, FormDefinition, FormState, FormStateReducer, UnknownFieldPolicy,
};
pub use transport::WebSocketTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// An attempt is in flight or established; `connect` is ignored here.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection status and the form it carries, always changed together so a
/// form can never outlive its connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    connection: ConnectionState,
    form: FormState,
    last_error: Option<String>,
    connected_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    /// Moves to `next`. Anything other than `Connected` drops the form;
    /// returns whether that removed something.
    fn transition(&mut self, next: ConnectionState, error: Option<String>) -> bool {
        self.connection = next;
        self.last_error = error;
        self.connected_at = match next {
            ConnectionState::Connected => Some(Utc::now()),
            _ => None,
        };
        if next == ConnectionState::Connected {
            false
        } else {
            self.form.clear()
        }
    }

    fn apply_inbound(&mut self, reducer: &FormStateReducer, event: &InboundEvent) -> Applied {
        if self.connection != ConnectionState::Connected {
            return Applied::Unchanged;
        }
        reducer.apply(&mut self.form, event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        state: ConnectionState,
        error: Option<String>,
    },
    Inbound(InboundEvent),
    FormChanged(FormState),
    UpdateRejected {
        field_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// The controller was already connecting or connected; nothing changed.
    AlreadyActive(ConnectionState),
    /// The attempt failed and the controller is now in `Error`.
    Failed(String),
    /// `disconnect` ran while this attempt was pending; its result was
    /// discarded.
    Superseded,
}

struct ActiveSession {
    handle: Box<dyn TransportSession>,
    event_task: JoinHandle<()>,
}

impl ActiveSession {
    fn shutdown(self) {
        self.handle.close();
        self.event_task.abort();
    }
}

/// Armed while `connect` is between its two critical sections.
struct PendingConnect {
    controller: Arc<SessionController>,
    generation: u64,
    settled: bool,
}

impl Drop for PendingConnect {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let generation = self.generation;
        if let Ok(mut inner) = self.controller.inner.try_lock() {
            self.controller.abandon_attempt(&mut inner, generation);
            return;
        }
        let controller = Arc::clone(&self.controller);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let mut inner = controller.inner.lock().await;
                controller.abandon_attempt(&mut inner, generation);
            });
        }
    }
}

struct ControllerInner {
    state: SessionState,
    /// Bumped by every `connect` and `disconnect`; stale attempts and event
    /// tasks compare against it and back off.
    generation: u64,
    active: Option<ActiveSession>,
}

pub struct SessionController {
    transport: Arc<dyn VoiceTransport>,
    options: SessionOptions,
    reducer: FormStateReducer,
    inner: Mutex<ControllerInner>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(transport: Arc<dyn VoiceTransport>) -> Arc<Self> {
        Self::with_options(transport, SessionOptions::default())
    }

    pub fn websocket(options: SessionOptions) -> Arc<Self> {
        Self::with_options(Arc::new(WebSocketTransport), options)
    }

    pub fn with_options(transport: Arc<dyn VoiceTransport>, options: SessionOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Arc::new(Self {
            transport,
            reducer: FormStateReducer::new(options.unknown_field_policy),
            options,
            inner: Mutex::new(ControllerInner {
                state: SessionState::default(),
                generation: 0,
                active: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.lock().await.state.connection()
    }

    pub async fn connect(self: &Arc<Self>, endpoint: &str) -> ConnectOutcome {
        let generation = {
            let mut inner = self.inner.lock().await;
            let current = inner.state.connection();
            if current.is_active() {
                debug!(state = %current, "session: connect ignored while session is active");
                return ConnectOutcome::AlreadyActive(current);
            }
            inner.generation += 1;
            self.set_connection(&mut inner, ConnectionState::Connecting, None);
            inner.generation
        };
        let mut attempt = PendingConnect {
            controller: Arc::clone(self),
            generation,
            settled: false,
        };

        let opened = self.open_transport(endpoint).await;

        let mut inner = self.inner.lock().await;
        attempt.settled = true;
        if inner.generation != generation {
            drop(inner);
            if let Ok(opened) = opened {
                opened.handle.close();
            }
            debug!(generation, "session: connect attempt superseded");
            return ConnectOutcome::Superseded;
        }

        match opened {
            Ok(OpenedSession { handle, events }) => {
                let event_task = self.spawn_event_task(generation, events);
                inner.active = Some(ActiveSession { handle, event_task });
                self.set_connection(&mut inner, ConnectionState::Connected, None);
                ConnectOutcome::Connected
            }
            Err(reason) => {
                warn!(%reason, "session: connect failed");
                self.set_connection(&mut inner, ConnectionState::Error, Some(reason.clone()));
                ConnectOutcome::Failed(reason)
            }
        }
    }

    /// Ends the session, if any, and returns to `Idle` with no form. Safe to
    /// call repeatedly and while a `connect` is still pending.
    pub async fn disconnect(&self) {
        let active = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            if inner.state.connection() != ConnectionState::Idle {
                self.set_connection(&mut inner, ConnectionState::Idle, None);
            }
            inner.active.take()
        };

        if let Some(active) = active {
            info!("session: closing transport");
            active.shutdown();
        }
    }

    /// Rolls an attempt whose `connect` future was dropped back to `Idle`.
    fn abandon_attempt(&self, inner: &mut ControllerInner, generation: u64) {
        if inner.generation != generation
            || inner.state.connection() != ConnectionState::Connecting
        {
            return;
        }
        inner.generation += 1;
        debug!(generation, "session: connect attempt abandoned");
        self.set_connection(inner, ConnectionState::Idle, None);
    }

    async fn open_transport(&self, endpoint: &str) -> Result<OpenedSession, String> {
        let url = normalize_endpoint(endpoint).map_err(|err| err.to_string())?;
        info!(endpoint = %url, "session: opening transport");

        match tokio::time::timeout(self.options.connect_timeout, self.transport.open(&url)).await {
            Ok(Ok(opened)) => Ok(opened),
            Ok(Err(err)) => Err(format!("failed to connect {url}: {err:#}")),
            Err(_) => Err(format!(
                "timed out after {}ms connecting {url}",
                self.options.connect_timeout.as_millis()
            )),
        }
    }

    fn set_connection(
        &self,
        inner: &mut ControllerInner,
        next: ConnectionState,
        error: Option<String>,
    ) {
        let previous = inner.state.connection();
        let form_cleared = inner.state.transition(next, error.clone());
        info!(from = %previous, to = %next, "session: connection state changed");

        let _ = self
            .events
            .send(SessionEvent::StateChanged { state: next, error });
        if form_cleared {
            let _ = self
                .events
                .send(SessionEvent::FormChanged(inner.state.form().clone()));
        }
    }

    fn spawn_event_task(
        self: &Arc<Self>,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> JoinHandle<()> {
        let controller: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = events
                    .recv()
                    .await
                    .unwrap_or_else(|| TransportEvent::Disconnected {
                        reason: Some("transport event stream ended".to_string()),
                    });
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                if controller
                    .handle_transport_event(generation, event)
                    .await
                    .is_break()
                {
                    break;
                }
            }
        })
    }

    async fn handle_transport_event(
        &self,
        generation: u64,
        event: TransportEvent,
    ) -> ControlFlow<()> {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation || inner.state.connection() != ConnectionState::Connected
        {
            return ControlFlow::Break(());
        }

        match event {
            TransportEvent::Connected => {
                debug!("session: transport reported connected");
                ControlFlow::Continue(())
            }
            TransportEvent::Message(text) => {
                self.route_message(&mut inner, &text);
                ControlFlow::Continue(())
            }
            TransportEvent::Disconnected { reason } => {
                info!(
                    reason = reason.as_deref().unwrap_or("closed"),
                    "session: transport disconnected"
                );
                if let Some(active) = inner.active.take() {
                    active.handle.close();
                }
                self.set_connection(&mut inner, ConnectionState::Idle, None);
                ControlFlow::Break(())
            }
            TransportEvent::Error(message) => {
                warn!(%message, "session: transport error");
                if let Some(active) = inner.active.take() {
                    active.handle.close();
                }
                self.set_connection(&mut inner, ConnectionState::Error, Some(message));
                ControlFlow::Break(())
            }
        }
    }

    fn route_message(&self, inner: &mut ControllerInner, text: &str) {
        let event = match parse_inbound(text) {
            Ok(event) => event,
            Err(err) if err.is_forward_compatible() => {
                warn!(error = %err, "session: dropping unrecognized agent message");
                return;
            }
            Err(err) => {
                warn!(error = %err, "session: dropping malformed agent message");
                return;
            }
        };

        let applied = inner.state.apply_inbound(&self.reducer, &event);
        debug!(kind = event.kind(), ?applied, "session: applied agent message");
        let _ = self.events.send(SessionEvent::Inbound(event));

        match applied {
            Applied::Changed => {
                let _ = self
                    .events
                    .send(SessionEvent::FormChanged(inner.state.form().clone()));
            }
            Applied::Unchanged => {}
            Applied::Rejected { field_name } => {
                warn!(%field_name, "session: rejected update for undeclared field");
                let _ = self.events.send(SessionEvent::UpdateRejected { field_name });
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = self.inner.get_mut().active.take() {
            active.shutdown();
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/session_proptests.rs"]
mod proptests;
