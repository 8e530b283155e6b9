//! TurnRunner – loads a session's conversation, runs exactly **one** turn,
//! and persists the conversation with the new turn appended.
//!
//! Turns of the same session are serialized behind a per-session lock, so two
//! concurrent requests for one session never interleave their appends.
//! Different sessions run independently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
    conversation::{Conversation, ConversationStorage},
    error::{FlowError, Result},
    orchestrator::TurnOrchestrator,
    turn::TurnResult,
};

/// High-level helper for the load → process → append → save pattern
#[derive(Clone)]
pub struct TurnRunner {
    orchestrator: Arc<TurnOrchestrator>,
    storage: Arc<dyn ConversationStorage>,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TurnRunner {
    pub fn new(orchestrator: Arc<TurnOrchestrator>, storage: Arc<dyn ConversationStorage>) -> Self {
        Self {
            orchestrator,
            storage,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Creates and stores an empty conversation
    pub async fn start_session(&self) -> Result<Uuid> {
        let conversation = Conversation::new();
        let id = conversation.id;
        self.storage.save(conversation).await?;
        info!(session_id = %id, "Session started");
        Ok(id)
    }

    /// Runs one turn for `session_id` and appends it to the conversation.
    ///
    /// Only session lookup or storage can fail here; the turn itself always
    /// produces a [`TurnResult`].
    pub async fn run(&self, session_id: Uuid, user_text: &str) -> Result<TurnResult> {
        let lock = self
            .locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock().await;
            self.run_locked(session_id, user_text).await
        };
        drop(lock);
        self.release_lock(session_id);
        result
    }

    async fn run_locked(&self, session_id: Uuid, user_text: &str) -> Result<TurnResult> {
        let mut conversation = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

        let span = info_span!("turn", session_id = %session_id, turn = conversation.len() + 1);
        let turn = self
            .orchestrator
            .process_turn_in(&mut conversation, user_text)
            .instrument(span)
            .await;

        self.storage.save(conversation).await?;
        Ok(turn)
    }

    /// Drops the session's lock entry once no other turn holds or awaits it
    fn release_lock(&self, session_id: Uuid) {
        self.locks
            .remove_if(&session_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Deletes the session's conversation. Waits for a running turn of the
    /// same session to finish first.
    pub async fn end_session(&self, session_id: Uuid) -> Result<()> {
        let lock = self
            .locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock().await;
            match self.storage.get(session_id).await? {
                Some(_) => self.storage.delete(session_id).await,
                None => Err(FlowError::SessionNotFound(session_id.to_string())),
            }
        };
        drop(lock);
        self.release_lock(session_id);
        if result.is_ok() {
            info!(session_id = %session_id, "Session ended");
        }
        result
    }

    pub async fn conversation(&self, session_id: Uuid) -> Result<Conversation> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))
    }
}
