use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Payload for creating a calendar event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventSpec {
    /// Title of the event
    pub summary: String,
    /// Start time of the event (ISO format)
    pub start_date_time: String,
    /// End time of the event (ISO format)
    pub end_date_time: String,
    /// Description of the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// List of attendee email addresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    /// Location of the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl EventSpec {
    pub fn new(summary: &str, start_date_time: &str, end_date_time: &str) -> Self {
        Self {
            summary: summary.to_string(),
            start_date_time: start_date_time.to_string(),
            end_date_time: end_date_time.to_string(),
            description: None,
            attendees: None,
            location: None,
        }
    }
}

/// Partial event used for updates; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    /// New title of the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// New start time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<String>,
    /// New end time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<String>,
    /// New description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New attendee email addresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    /// New location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Start or end of a provider event. Timed events carry `date_time`,
/// all-day events carry `date`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

/// Calendar event as the provider stores it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

/// A busy interval reported by the free/busy query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusySlot {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub is_available: bool,
    pub busy_slots: Vec<BusySlot>,
}

impl Availability {
    pub fn from_busy_slots(busy_slots: Vec<BusySlot>) -> Self {
        Self {
            is_available: busy_slots.is_empty(),
            busy_slots,
        }
    }
}

/// Options controlling a batch submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchOptions {
    /// Whether to stop processing if an error occurs
    pub stop_on_error: bool,
    /// Only validate the events without creating them
    pub validate_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Failed,
}

/// Outcome for one event of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEventResult {
    pub event: EventSpec,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchEventResult {
    pub fn created(event: EventSpec, event_id: String) -> Self {
        Self {
            event,
            status: BatchStatus::Success,
            event_id: Some(event_id),
            error: None,
            message: None,
        }
    }

    pub fn validated(event: EventSpec) -> Self {
        Self {
            event,
            status: BatchStatus::Success,
            event_id: None,
            error: None,
            message: Some("Event validation successful".to_string()),
        }
    }

    pub fn failed(event: EventSpec, error: String) -> Self {
        Self {
            event,
            status: BatchStatus::Failed,
            event_id: None,
            error: Some(error),
            message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Success
    }
}

/// Counts for a batch. `total` is always the number of requested events;
/// `skipped` counts events never attempted because `stop_on_error` ended the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    pub results: Vec<BatchEventResult>,
    pub summary: BatchSummary,
    pub message: String,
}
