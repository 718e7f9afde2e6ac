mod batch;
mod client;
pub mod models;
pub mod notifications;
pub mod time;

pub use batch::{validate_event, BatchEventEngine, BATCH_CHUNK_SIZE};
pub use client::{GoogleCalendarClient, GoogleCalendarConnector};
pub use models::{
    Availability, BatchEventResult, BatchOptions, BatchResponse, BatchStatus, BatchSummary,
    CalendarEvent, EventPatch, EventSpec,
};
pub use notifications::{CalendarChange, CalendarNotifier};

use crate::error::AppResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Provider access credential: the user's OAuth access token, plus the
/// owning user so changes can be announced to that user's subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub user_id: Option<String>,
}

impl Credential {
    pub fn new(access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            user_id: None,
        }
    }

    pub fn for_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }
}

/// Single-event operations against a remote calendar
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Create an event and return it with its provider id
    async fn create_event(&self, spec: &EventSpec) -> AppResult<CalendarEvent>;

    /// Patch an existing event
    async fn update_event(&self, event_id: &str, patch: &EventPatch) -> AppResult<CalendarEvent>;

    async fn delete_event(&self, event_id: &str) -> AppResult<()>;

    /// Events starting in the range, expanded and ordered by start time
    async fn list_events(&self, time_min: &str, time_max: &str) -> AppResult<Vec<CalendarEvent>>;

    async fn check_availability(&self, time_min: &str, time_max: &str) -> AppResult<Availability>;
}

/// Creates provider clients bound to a credential
pub trait CalendarConnector: Send + Sync {
    fn connect(&self, credential: &Credential) -> Arc<dyn CalendarProvider>;
}
