use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{domain::SessionId, error::ApiException, protocol::InboundEvent};
use tokio::sync::{mpsc, RwLock};

use crate::{
    config::Settings,
    prompt::SYSTEM_PROMPT,
    tools::{declarations, FunctionDeclaration},
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) sessions: SessionRegistry,
    pub(crate) agent: AgentProfile,
}

impl AppState {
    pub(crate) fn new(settings: &Settings) -> Self {
        Self {
            sessions: SessionRegistry::new(settings.event_capacity),
            agent: AgentProfile {
                system_instruction: SYSTEM_PROMPT,
                tools: declarations(),
                temperature: settings.temperature,
                llm_configured: settings.google_api_key.is_some(),
            },
        }
    }
}

/// What the agent tells the model; served read-only on `/agent`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AgentProfile {
    pub(crate) system_instruction: &'static str,
    pub(crate) tools: Vec<FunctionDeclaration>,
    pub(crate) temperature: f32,
    pub(crate) llm_configured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SessionSummary {
    pub(crate) session_id: SessionId,
    pub(crate) connected_at: DateTime<Utc>,
}

struct SessionEntry {
    relay: mpsc::Sender<InboundEvent>,
    connected_at: DateTime<Utc>,
}

/// Open `/voice` sockets, each fed through its own ordered queue.
#[derive(Clone)]
pub(crate) struct SessionRegistry {
    capacity: usize,
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
}

impl SessionRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sessions: Arc::default(),
        }
    }

    pub(crate) async fn register(&self) -> (SessionId, mpsc::Receiver<InboundEvent>) {
        let (relay, rx) = mpsc::channel(self.capacity);
        let session_id = SessionId::new();
        self.sessions.write().await.insert(
            session_id,
            SessionEntry {
                relay,
                connected_at: Utc::now(),
            },
        );
        (session_id, rx)
    }

    pub(crate) async fn remove(&self, session_id: SessionId) -> bool {
        self.sessions.write().await.remove(&session_id).is_some()
    }

    pub(crate) async fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&session_id)
    }

    /// Oldest session first.
    pub(crate) async fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<_> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(session_id, entry)| SessionSummary {
                session_id: *session_id,
                connected_at: entry.connected_at,
            })
            .collect();
        summaries.sort_by_key(|s| s.connected_at);
        summaries
    }

    /// Queues `event` behind everything already sent to the session.
    pub(crate) async fn relay(
        &self,
        session_id: SessionId,
        event: InboundEvent,
    ) -> Result<(), ApiException> {
        let relay = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .map(|entry| entry.relay.clone())
            .ok_or_else(|| ApiException::session_not_found(session_id))?;

        relay
            .send(event)
            .await
            .map_err(|_| ApiException::session_not_found(session_id))
    }
}
