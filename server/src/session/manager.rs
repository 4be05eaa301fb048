use crate::session::handler::Session;
use crate::session::state::now_millis;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Observability snapshot of a live session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub state: &'static str,
    pub connected_at: u64,
    pub last_activity: u64,
    pub frames: u64,
    pub refinements: u32,
}

/// Registry of live sessions
///
/// Holds only summaries for health and metrics reporting; each session's
/// image and mask stay inside its own connection task.
#[derive(Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<Uuid, SessionSummary>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a session from connection open
    pub async fn register(&self, session: &Session) {
        let now = now_millis();
        let summary = SessionSummary {
            id: session.id(),
            state: session.state().name(),
            connected_at: now,
            last_activity: now,
            frames: 0,
            refinements: 0,
        };
        self.sessions.write().await.insert(session.id(), summary);
        debug!("Registered session {}", session.id());
    }

    /// Record that a frame was handled
    pub async fn record_frame(&self, session: &Session) {
        let mut sessions = self.sessions.write().await;
        if let Some(summary) = sessions.get_mut(&session.id()) {
            summary.state = session.state().name();
            summary.refinements = session.state().refinements();
            summary.frames += 1;
            summary.last_activity = now_millis();
        }
    }

    /// Forget a session on connection close
    pub async fn remove(&self, id: Uuid) -> Option<SessionSummary> {
        let removed = self.sessions.write().await.remove(&id);
        if removed.is_some() {
            debug!("Removed session {}", id);
        }
        removed
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionSummary> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Live sessions grouped by state name
    pub async fn counts_by_state(&self) -> BTreeMap<&'static str, usize> {
        let sessions = self.sessions.read().await;
        let mut counts = BTreeMap::new();
        for summary in sessions.values() {
            *counts.entry(summary.state).or_insert(0) += 1;
        }
        counts
    }
}
