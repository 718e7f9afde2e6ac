use super::models::{ChatSession, ConversationMessage};
use super::{MessageStore, SessionStore};
use crate::error::{not_found_error, store_error, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client as RedisClient};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// Redis key constants
pub mod keys {
    pub const SESSION_PREFIX: &str = "chat:session:";
    pub const USER_SESSIONS_PREFIX: &str = "chat:user_sessions:";
    pub const MESSAGES_PREFIX: &str = "chat:messages:";

    pub fn session(session_id: &str) -> String {
        format!("{}{}", SESSION_PREFIX, session_id)
    }

    pub fn user_sessions(user_id: &str) -> String {
        format!("{}{}", USER_SESSIONS_PREFIX, user_id)
    }

    pub fn messages(session_id: &str) -> String {
        format!("{}{}", MESSAGES_PREFIX, session_id)
    }
}

/// The Redis actor that owns the connection and processes store commands
pub struct RedisActor {
    client: RedisClient,
    connection: Option<MultiplexedConnection>,
    command_rx: mpsc::Receiver<StoreCommand>,
}

/// Commands that can be sent to the Redis actor
pub enum StoreCommand {
    LoadMessages(String, mpsc::Sender<AppResult<Vec<ConversationMessage>>>),
    AppendMessage(String, ConversationMessage, mpsc::Sender<AppResult<()>>),
    SaveSession(ChatSession, mpsc::Sender<AppResult<()>>),
    GetSession(String, mpsc::Sender<AppResult<Option<ChatSession>>>),
    ListSessions(String, mpsc::Sender<AppResult<Vec<ChatSession>>>),
    DeleteSession(String, mpsc::Sender<AppResult<bool>>),
    Shutdown,
}

/// Handle for communicating with the Redis actor
#[derive(Clone)]
pub struct RedisActorHandle {
    command_tx: mpsc::Sender<StoreCommand>,
}

impl RedisActorHandle {
    /// Send a command and wait for the actor's reply
    async fn request<T>(
        &self,
        command: impl FnOnce(mpsc::Sender<AppResult<T>>) -> StoreCommand,
    ) -> AppResult<T> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(command(response_tx))
            .await
            .map_err(|e| store_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| store_error("Response channel closed"))?
    }

    async fn require_session(&self, session_id: &str) -> AppResult<ChatSession> {
        let id = session_id.to_string();
        self.request(|tx| StoreCommand::GetSession(id, tx))
            .await?
            .ok_or_else(|| not_found_error(&format!("Session {} not found", session_id)))
    }

    async fn save_session(&self, session: ChatSession) -> AppResult<()> {
        self.request(|tx| StoreCommand::SaveSession(session, tx)).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> AppResult<()> {
        let _ = self.command_tx.send(StoreCommand::Shutdown).await;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for RedisActorHandle {
    async fn find_messages_by_session(&self, session_id: &str) -> AppResult<Vec<ConversationMessage>> {
        let id = session_id.to_string();
        self.request(|tx| StoreCommand::LoadMessages(id, tx)).await
    }

    async fn append_message(&self, session_id: &str, message: &ConversationMessage) -> AppResult<()> {
        let id = session_id.to_string();
        let message = message.clone();
        self.request(|tx| StoreCommand::AppendMessage(id, message, tx)).await
    }
}

#[async_trait]
impl SessionStore for RedisActorHandle {
    async fn create_session(&self, user_id: &str, title: Option<&str>) -> AppResult<ChatSession> {
        let session = ChatSession::new(user_id, title);
        self.save_session(session.clone()).await?;
        Ok(session)
    }

    async fn find_session(&self, session_id: &str) -> AppResult<Option<ChatSession>> {
        let id = session_id.to_string();
        self.request(|tx| StoreCommand::GetSession(id, tx)).await
    }

    async fn find_sessions_by_user(&self, user_id: &str) -> AppResult<Vec<ChatSession>> {
        let id = user_id.to_string();
        self.request(|tx| StoreCommand::ListSessions(id, tx)).await
    }

    async fn update_last_message(&self, session_id: &str, last_message: &str) -> AppResult<()> {
        let mut session = self.require_session(session_id).await?;
        session.last_message = Some(last_message.to_string());
        session.updated_at = Utc::now();
        self.save_session(session).await
    }

    async fn update_title(&self, session_id: &str, title: &str) -> AppResult<()> {
        let mut session = self.require_session(session_id).await?;
        session.title = title.to_string();
        session.updated_at = Utc::now();
        self.save_session(session).await
    }

    async fn delete_session(&self, session_id: &str) -> AppResult<bool> {
        let id = session_id.to_string();
        self.request(|tx| StoreCommand::DeleteSession(id, tx)).await
    }
}

impl RedisActor {
    /// Create a new actor and return its handle
    pub fn new(redis_url: &str) -> AppResult<(Self, RedisActorHandle)> {
        let (command_tx, command_rx) = mpsc::channel(32);

        let client = RedisClient::open(redis_url)
            .map_err(|e| store_error(&format!("Failed to create Redis client: {}", e)))?;

        let actor = Self {
            client,
            connection: None,
            command_rx,
        };

        let handle = RedisActorHandle { command_tx };

        Ok((actor, handle))
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Redis actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                StoreCommand::LoadMessages(session_id, response_tx) => {
                    let result = self.load_messages(&session_id).await;
                    let _ = response_tx.send(result).await;
                }
                StoreCommand::AppendMessage(session_id, message, response_tx) => {
                    let result = self.append_message(&session_id, &message).await;
                    let _ = response_tx.send(result).await;
                }
                StoreCommand::SaveSession(session, response_tx) => {
                    let result = self.save_session(&session).await;
                    let _ = response_tx.send(result).await;
                }
                StoreCommand::GetSession(session_id, response_tx) => {
                    let result = self.get_session(&session_id).await;
                    let _ = response_tx.send(result).await;
                }
                StoreCommand::ListSessions(user_id, response_tx) => {
                    let result = self.list_sessions(&user_id).await;
                    let _ = response_tx.send(result).await;
                }
                StoreCommand::DeleteSession(session_id, response_tx) => {
                    let result = self.delete_session(&session_id).await;
                    let _ = response_tx.send(result).await;
                }
                StoreCommand::Shutdown => {
                    info!("Redis actor shutting down");
                    break;
                }
            }
        }

        info!("Redis actor shut down");
    }

    /// Get a redis connection, connecting on first use
    async fn connection(&mut self) -> AppResult<MultiplexedConnection> {
        if let Some(connection) = &self.connection {
            return Ok(connection.clone());
        }

        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| store_error(&format!("Failed to connect to Redis: {}", e)))?;
        self.connection = Some(connection.clone());
        Ok(connection)
    }

    async fn load_messages(&mut self, session_id: &str) -> AppResult<Vec<ConversationMessage>> {
        let mut conn = self.connection().await?;

        let raw: Vec<String> = conn
            .lrange(keys::messages(session_id), 0, -1)
            .await
            .map_err(|e| store_error(&format!("Failed to read messages from Redis: {}", e)))?;

        let mut messages: Vec<ConversationMessage> = raw
            .iter()
            .filter_map(|json| match serde_json::from_str(json) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Skipping unreadable message in session {}: {}", session_id, e);
                    None
                }
            })
            .collect();
        messages.sort_by_key(|m| m.timestamp);

        debug!("Loaded {} messages for session {}", messages.len(), session_id);
        Ok(messages)
    }

    async fn append_message(&mut self, session_id: &str, message: &ConversationMessage) -> AppResult<()> {
        let mut conn = self.connection().await?;

        let message_json = serde_json::to_string(message)
            .map_err(|e| store_error(&format!("Failed to serialize message: {}", e)))?;

        let _: () = conn
            .rpush(keys::messages(session_id), message_json)
            .await
            .map_err(|e| store_error(&format!("Failed to save message to Redis: {}", e)))?;

        Ok(())
    }

    async fn save_session(&mut self, session: &ChatSession) -> AppResult<()> {
        let mut conn = self.connection().await?;

        let session_json = serde_json::to_string(session)
            .map_err(|e| store_error(&format!("Failed to serialize session: {}", e)))?;

        let _: () = conn
            .set(keys::session(&session.id), session_json)
            .await
            .map_err(|e| store_error(&format!("Failed to save session to Redis: {}", e)))?;

        let _: () = conn
            .sadd(keys::user_sessions(&session.user_id), &session.id)
            .await
            .map_err(|e| store_error(&format!("Failed to index session in Redis: {}", e)))?;

        Ok(())
    }

    async fn get_session(&mut self, session_id: &str) -> AppResult<Option<ChatSession>> {
        let mut conn = self.connection().await?;

        let raw: Option<String> = conn
            .get(keys::session(session_id))
            .await
            .map_err(|e| store_error(&format!("Failed to read session from Redis: {}", e)))?;

        raw.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| store_error(&format!("Failed to deserialize session: {}", e)))
        })
        .transpose()
    }

    async fn list_sessions(&mut self, user_id: &str) -> AppResult<Vec<ChatSession>> {
        let mut conn = self.connection().await?;

        let ids: Vec<String> = conn
            .smembers(keys::user_sessions(user_id))
            .await
            .map_err(|e| store_error(&format!("Failed to read user sessions from Redis: {}", e)))?;

        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_session(&id).await? {
                Some(session) => sessions.push(session),
                None => warn!("Session {} indexed for user {} but missing", id, user_id),
            }
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(sessions)
    }

    async fn delete_session(&mut self, session_id: &str) -> AppResult<bool> {
        let Some(session) = self.get_session(session_id).await? else {
            return Ok(false);
        };

        let mut conn = self.connection().await?;

        let _: () = conn
            .del(vec![keys::session(session_id), keys::messages(session_id)])
            .await
            .map_err(|e| store_error(&format!("Failed to delete session from Redis: {}", e)))?;

        let _: () = conn
            .srem(keys::user_sessions(&session.user_id), session_id)
            .await
            .map_err(|e| store_error(&format!("Failed to unindex session in Redis: {}", e)))?;

        info!("Deleted session {}", session_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(keys::session("abc"), "chat:session:abc");
        assert_eq!(keys::user_sessions("u1"), "chat:user_sessions:u1");
        assert_eq!(keys::messages("abc"), "chat:messages:abc");
    }

    #[tokio::test]
    async fn handle_reports_stopped_actor() {
        let (actor, handle) = RedisActor::new("redis://127.0.0.1:6379").unwrap();
        drop(actor);

        let result = handle.find_messages_by_session("abc").await;
        assert!(result.is_err());
        assert!(handle.shutdown().await.is_ok());
    }
}
