mod actor;
mod memory;
pub mod models;

pub use actor::{RedisActor, RedisActorHandle};
pub use memory::InMemoryStore;
pub use models::{ChatSession, ConversationMessage, DEFAULT_SESSION_TITLE};

use crate::error::AppResult;
use async_trait::async_trait;

/// Conversation history, the single source of truth for the agent
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// All messages of a session, oldest first
    async fn find_messages_by_session(&self, session_id: &str) -> AppResult<Vec<ConversationMessage>>;

    async fn append_message(&self, session_id: &str, message: &ConversationMessage) -> AppResult<()>;
}

/// Chat session bookkeeping used by the web layer
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, user_id: &str, title: Option<&str>) -> AppResult<ChatSession>;

    async fn find_session(&self, session_id: &str) -> AppResult<Option<ChatSession>>;

    /// Sessions of a user, most recently updated first
    async fn find_sessions_by_user(&self, user_id: &str) -> AppResult<Vec<ChatSession>>;

    async fn update_last_message(&self, session_id: &str, last_message: &str) -> AppResult<()>;

    async fn update_title(&self, session_id: &str, title: &str) -> AppResult<()>;

    /// Delete a session and its messages; returns whether it existed
    async fn delete_session(&self, session_id: &str) -> AppResult<bool>;
}
