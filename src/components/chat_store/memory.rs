use super::models::{ChatSession, ConversationMessage};
use super::{MessageStore, SessionStore};
use crate::error::{not_found_error, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of the chat store (for testing and as a
/// fallback when Redis is unavailable)
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, ChatSession>>,
    messages: RwLock<HashMap<String, Vec<ConversationMessage>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn find_messages_by_session(&self, session_id: &str) -> AppResult<Vec<ConversationMessage>> {
        let messages = self.messages.read().await;
        let mut found = messages.get(session_id).cloned().unwrap_or_default();
        found.sort_by_key(|m| m.timestamp);
        Ok(found)
    }

    async fn append_message(&self, session_id: &str, message: &ConversationMessage) -> AppResult<()> {
        let mut messages = self.messages.write().await;
        messages
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create_session(&self, user_id: &str, title: Option<&str>) -> AppResult<ChatSession> {
        let session = ChatSession::new(user_id, title);
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, session_id: &str) -> AppResult<Option<ChatSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn find_sessions_by_user(&self, user_id: &str) -> AppResult<Vec<ChatSession>> {
        let sessions = self.sessions.read().await;
        let mut found: Vec<ChatSession> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(found)
    }

    async fn update_last_message(&self, session_id: &str, last_message: &str) -> AppResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found_error(&format!("Session {} not found", session_id)))?;
        session.last_message = Some(last_message.to_string());
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn update_title(&self, session_id: &str, title: &str) -> AppResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found_error(&format!("Session {} not found", session_id)))?;
        session.title = title.to_string();
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> AppResult<bool> {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        self.messages.write().await.remove(session_id);
        Ok(removed)
    }
}
