use super::models::{Attendee, Availability, BusySlot, CalendarEvent, EventDateTime, EventPatch, EventSpec};
use super::notifications::{CalendarChange, CalendarNotifier};
use super::time::parse_event_time;
use super::{CalendarConnector, CalendarProvider, Credential};
use crate::config::Config;
use crate::error::{
    auth_error, not_found_error, provider_error, validation_error, AppResult,
};
use async_trait::async_trait;
use chrono_tz::Tz;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Builds Google Calendar clients for individual credentials
#[derive(Clone)]
pub struct GoogleCalendarConnector {
    client: Client,
    base_url: String,
    calendar_id: String,
    timezone: Tz,
    notifier: CalendarNotifier,
}

impl GoogleCalendarConnector {
    pub fn new(config: &Config, notifier: CalendarNotifier) -> AppResult<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: config.google_api_base_url.clone(),
            calendar_id: config.google_calendar_id.clone(),
            timezone: config.tz()?,
            notifier,
        })
    }
}

impl CalendarConnector for GoogleCalendarConnector {
    fn connect(&self, credential: &Credential) -> Arc<dyn CalendarProvider> {
        Arc::new(GoogleCalendarClient {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            calendar_id: self.calendar_id.clone(),
            access_token: credential.access_token.clone(),
            topic: credential.user_id.clone(),
            timezone: self.timezone,
            notifier: self.notifier.clone(),
        })
    }
}

/// Google Calendar v3 REST client bound to one access token
pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
    calendar_id: String,
    access_token: String,
    topic: Option<String>,
    timezone: Tz,
    notifier: CalendarNotifier,
}

impl GoogleCalendarClient {
    pub fn new(base_url: &str, calendar_id: &str, access_token: &str, timezone: Tz) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            calendar_id: calendar_id.to_string(),
            access_token: access_token.to_string(),
            topic: None,
            timezone,
            notifier: CalendarNotifier::default(),
        }
    }

    /// Publish changes made through this client to `topic`
    pub fn with_notifier(mut self, notifier: CalendarNotifier, topic: &str) -> Self {
        self.notifier = notifier;
        self.topic = Some(topic.to_string());
        self
    }

    /// Build an API URL from path segments, percent-encoding each one
    fn url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| provider_error(&format!("Failed to parse URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| provider_error("Calendar API base URL cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn events_url(&self, event_id: Option<&str>) -> AppResult<Url> {
        match event_id {
            Some(id) => self.url(&["calendars", &self.calendar_id, "events", id]),
            None => self.url(&["calendars", &self.calendar_id, "events"]),
        }
    }

    fn normalize_time(&self, value: &str, field: &str) -> AppResult<String> {
        parse_event_time(value, &self.timezone)
            .map(|dt| dt.to_rfc3339())
            .ok_or_else(|| validation_error(&format!("Invalid {} format", field)))
    }

    /// Event boundary as an RFC 3339 `dateTime`, local values resolved in our zone
    fn event_time(&self, value: &str, field: &str) -> AppResult<EventDateTime> {
        Ok(EventDateTime {
            date_time: Some(self.normalize_time(value, field)?),
            date: None,
            time_zone: Some(self.timezone.name().to_string()),
        })
    }

    fn attendees(emails: &[String]) -> Vec<Attendee> {
        emails
            .iter()
            .map(|email| Attendee {
                email: email.clone(),
                response_status: None,
            })
            .collect()
    }

    /// Map a provider response to our error taxonomy
    async fn check_status(response: Response, action: &str) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());

        Err(match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                not_found_error(&format!("Failed to {}: event not found", action))
            }
            StatusCode::UNAUTHORIZED => auth_error(&format!(
                "Failed to {}: credential rejected by calendar provider",
                action
            )),
            _ => provider_error(&format!(
                "Failed to {}: HTTP {} - {}",
                action, status, error_body
            )),
        })
    }

    async fn notify(&self, change: CalendarChange) {
        if let Some(topic) = &self.topic {
            self.notifier.publish(topic, change).await;
        }
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn create_event(&self, spec: &EventSpec) -> AppResult<CalendarEvent> {
        let body = CalendarEvent {
            summary: Some(spec.summary.clone()),
            description: spec.description.clone(),
            location: spec.location.clone(),
            start: Some(self.event_time(&spec.start_date_time, "startDateTime")?),
            end: Some(self.event_time(&spec.end_date_time, "endDateTime")?),
            attendees: spec.attendees.as_deref().map(Self::attendees),
            ..Default::default()
        };

        let response = self
            .client
            .post(self.events_url(None)?)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_error(&format!("Failed to create event: {}", e)))?;

        let created: CalendarEvent = Self::check_status(response, "create event")
            .await?
            .json()
            .await
            .map_err(|e| provider_error(&format!("Failed to parse created event: {}", e)))?;

        info!("Created calendar event {}", created.id);
        self.notify(CalendarChange::Created {
            event_id: created.id.clone(),
            summary: created.summary.clone(),
        })
        .await;

        Ok(created)
    }

    async fn update_event(&self, event_id: &str, patch: &EventPatch) -> AppResult<CalendarEvent> {
        let body = CalendarEvent {
            summary: patch.summary.clone(),
            description: patch.description.clone(),
            location: patch.location.clone(),
            start: patch
                .start_date_time
                .as_deref()
                .map(|t| self.event_time(t, "startDateTime"))
                .transpose()?,
            end: patch
                .end_date_time
                .as_deref()
                .map(|t| self.event_time(t, "endDateTime"))
                .transpose()?,
            attendees: patch.attendees.as_deref().map(Self::attendees),
            ..Default::default()
        };

        let response = self
            .client
            .patch(self.events_url(Some(event_id))?)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_error(&format!("Failed to update event: {}", e)))?;

        let updated: CalendarEvent = Self::check_status(response, "update event")
            .await?
            .json()
            .await
            .map_err(|e| provider_error(&format!("Failed to parse updated event: {}", e)))?;

        info!("Updated calendar event {}", event_id);
        self.notify(CalendarChange::Updated {
            event_id: event_id.to_string(),
            summary: updated.summary.clone(),
        })
        .await;

        Ok(updated)
    }

    async fn delete_event(&self, event_id: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(self.events_url(Some(event_id))?)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| provider_error(&format!("Failed to delete event: {}", e)))?;

        Self::check_status(response, "delete event").await?;

        info!("Deleted calendar event {}", event_id);
        self.notify(CalendarChange::Deleted {
            event_id: event_id.to_string(),
        })
        .await;

        Ok(())
    }

    async fn list_events(&self, time_min: &str, time_max: &str) -> AppResult<Vec<CalendarEvent>> {
        let time_min = self.normalize_time(time_min, "timeMin")?;
        let time_max = self.normalize_time(time_max, "timeMax")?;

        let mut url = self.events_url(None)?;
        url.query_pairs_mut()
            .append_pair("timeMin", &time_min)
            .append_pair("timeMax", &time_max)
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| provider_error(&format!("Failed to fetch events: {}", e)))?;

        let response_data: Value = Self::check_status(response, "fetch events")
            .await?
            .json()
            .await
            .map_err(|e| provider_error(&format!("Failed to parse events response: {}", e)))?;

        let events: Vec<CalendarEvent> = match response_data.get("items") {
            Some(items) => serde_json::from_value(items.clone())
                .map_err(|e| provider_error(&format!("Failed to parse events: {}", e)))?,
            None => Vec::new(),
        };

        debug!("Fetched {} events between {} and {}", events.len(), time_min, time_max);
        Ok(events)
    }

    async fn check_availability(&self, time_min: &str, time_max: &str) -> AppResult<Availability> {
        let time_min = self.normalize_time(time_min, "timeMin")?;
        let time_max = self.normalize_time(time_max, "timeMax")?;

        let body = json!({
            "timeMin": time_min,
            "timeMax": time_max,
            "items": [{ "id": self.calendar_id }],
        });

        let response = self
            .client
            .post(self.url(&["freeBusy"])?)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_error(&format!("Failed to check availability: {}", e)))?;

        let response_data: Value = Self::check_status(response, "check availability")
            .await?
            .json()
            .await
            .map_err(|e| {
                provider_error(&format!("Failed to parse availability response: {}", e))
            })?;

        let busy_slots: Vec<BusySlot> = match response_data
            .get("calendars")
            .and_then(|c| c.get(&self.calendar_id))
            .and_then(|c| c.get("busy"))
        {
            Some(busy) => serde_json::from_value(busy.clone())
                .map_err(|e| provider_error(&format!("Failed to parse busy slots: {}", e)))?,
            None => Vec::new(),
        };

        Ok(Availability::from_busy_slots(busy_slots))
    }
}
