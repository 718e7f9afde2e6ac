use crate::components::language_model::{ChatMessage, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to sessions created without one
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// One message of a conversation as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    /// Function name, present iff `role` is `Function`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    fn with_role(role: Role, content: &str, name: Option<String>) -> Self {
        Self {
            role,
            content: content.to_string(),
            name,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self::with_role(Role::User, content, None)
    }

    pub fn assistant(content: &str) -> Self {
        Self::with_role(Role::Assistant, content, None)
    }

    pub fn function(name: &str, content: &str) -> Self {
        Self::with_role(Role::Function, content, Some(name.to_string()))
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl From<&ConversationMessage> for ChatMessage {
    fn from(message: &ConversationMessage) -> Self {
        ChatMessage {
            role: message.role,
            content: message.content.clone(),
            name: match message.role {
                Role::Function => message.name.clone(),
                _ => None,
            },
        }
    }
}

/// A chat session owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

impl ChatSession {
    pub fn new(user_id: &str, title: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(DEFAULT_SESSION_TITLE)
                .to_string(),
            created_at: now,
            updated_at: now,
            last_message: None,
        }
    }
}
