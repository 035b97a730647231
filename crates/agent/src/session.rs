//! Many sessions, one controller each.
//!
//! The map lock is only held to find or create a session; turns run under
//! the session's own mutex, so independent sessions never wait on each other
//! while one of them is suspended on the network.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use toolrelay_core::event::EventBus;
use toolrelay_core::message::SessionId;
use toolrelay_core::provider::Provider;
use toolrelay_core::tool::ToolCatalog;
use tracing::debug;

use crate::controller::{
    ControllerConfig, ConversationController, SessionSnapshot, TurnError, TurnOutcome,
};

/// Builds the controller for a new session.
pub type ControllerFactory = Arc<dyn Fn(SessionId) -> ConversationController + Send + Sync>;

pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<ConversationController>>>>,
    factory: ControllerFactory,
}

impl SessionManager {
    pub fn new(factory: ControllerFactory) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Sessions sharing one provider, catalog and event bus.
    pub fn with_components(
        provider: Arc<dyn Provider>,
        catalog: Arc<dyn ToolCatalog>,
        config: ControllerConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self::new(Arc::new(move |session_id: SessionId| {
            ConversationController::new(session_id, provider.clone(), catalog.clone(), config.clone())
                .with_event_bus(event_bus.clone())
        }))
    }

    /// The session's controller, created on first use.
    pub async fn session(&self, session_id: &SessionId) -> Arc<Mutex<ConversationController>> {
        let existing = self.sessions.read().await.get(session_id).cloned();
        if let Some(existing) = existing {
            return existing;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                debug!(session_id = %session_id, "Creating session");
                Arc::new(Mutex::new((self.factory)(session_id.clone())))
            })
            .clone()
    }

    pub async fn submit_turn(&self, session_id: &SessionId, user_text: &str) -> Result<TurnOutcome, TurnError> {
        let session = self.session(session_id).await;
        let mut controller = session.lock().await;
        controller.submit_turn(user_text).await
    }

    pub async fn submit_turn_cancellable(
        &self,
        session_id: &SessionId,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let session = self.session(session_id).await;
        let mut controller = session.lock().await;
        controller.submit_turn_cancellable(user_text, cancel).await
    }

    /// `None` if the session does not exist.
    pub async fn snapshot(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        let session = self.sessions.read().await.get(session_id).cloned()?;
        let controller = session.lock().await;
        Some(controller.snapshot())
    }

    /// Load a snapshot into the session it names, creating it if needed.
    pub async fn restore(&self, snapshot: SessionSnapshot) {
        let session = self.session(&snapshot.session_id).await;
        session.lock().await.restore(snapshot);
    }

    /// Drop a session. Returns whether it existed.
    pub async fn remove(&self, session_id: &SessionId) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.read().await.keys().cloned().collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        ids
    }
}
