#![allow(dead_code)]

use async_trait::async_trait;
use calendar_assistant::components::chat_store::{ConversationMessage, MessageStore};
use calendar_assistant::components::google_calendar::{
    Availability, CalendarConnector, CalendarEvent, CalendarProvider, Credential, EventPatch,
    EventSpec,
};
use calendar_assistant::components::language_model::{
    ChatMessage, Completion, FunctionDefinition, LanguageModel,
};
use calendar_assistant::error::{model_error, provider_error, store_error, AppResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Event spec used throughout the tests
pub fn event(summary: &str, start: &str, end: &str) -> EventSpec {
    EventSpec::new(summary, start, end)
}

/// `count` valid one-hour events named `Event 0`, `Event 1`, ...
pub fn valid_events(count: usize) -> Vec<EventSpec> {
    (0..count)
        .map(|i| {
            let hour = i % 20;
            let day = 1 + i / 20;
            event(
                &format!("Event {}", i),
                &format!("2024-01-{:02}T{:02}:00:00Z", day, hour),
                &format!("2024-01-{:02}T{:02}:00:00Z", day, hour + 1),
            )
        })
        .collect()
}

/// Mock implementation of the calendar provider with call-count spies
#[derive(Default)]
pub struct MockCalendarProvider {
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub availability_calls: AtomicUsize,
    created: Mutex<Vec<EventSpec>>,
    failing: HashSet<String>,
    delays: HashMap<String, u64>,
    unreachable: bool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    events: Vec<CalendarEvent>,
}

impl MockCalendarProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creating an event with this summary fails
    pub fn failing_on(mut self, summary: &str) -> Self {
        self.failing.insert(summary.to_string());
        self
    }

    /// Creating an event with this summary takes `millis`
    pub fn delayed(mut self, summary: &str, millis: u64) -> Self {
        self.delays.insert(summary.to_string(), millis);
        self
    }

    /// Every call fails as if the provider could not be reached
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn with_events(mut self, events: Vec<CalendarEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn create_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
            + self.update_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
            + self.list_calls.load(Ordering::SeqCst)
            + self.availability_calls.load(Ordering::SeqCst)
    }

    pub fn created_summaries(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.summary.clone())
            .collect()
    }

    fn check_reachable(&self) -> AppResult<()> {
        if self.unreachable {
            Err(provider_error("Failed to create event: connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CalendarProvider for MockCalendarProvider {
    async fn create_event(&self, spec: &EventSpec) -> AppResult<CalendarEvent> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let millis = self.delays.get(&spec.summary).copied().unwrap_or(1);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check_reachable()?;
        if self.failing.contains(&spec.summary) {
            return Err(provider_error(&format!(
                "Failed to create event: HTTP 400 Bad Request - rejected {}",
                spec.summary
            )));
        }

        self.created.lock().unwrap().push(spec.clone());
        Ok(CalendarEvent {
            id: format!("evt-{}", call),
            summary: Some(spec.summary.clone()),
            ..Default::default()
        })
    }

    async fn update_event(&self, event_id: &str, patch: &EventPatch) -> AppResult<CalendarEvent> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(CalendarEvent {
            id: event_id.to_string(),
            summary: patch.summary.clone(),
            ..Default::default()
        })
    }

    async fn delete_event(&self, _event_id: &str) -> AppResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()
    }

    async fn list_events(&self, _time_min: &str, _time_max: &str) -> AppResult<Vec<CalendarEvent>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.events.clone())
    }

    async fn check_availability(&self, _time_min: &str, _time_max: &str) -> AppResult<Availability> {
        self.availability_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(Availability::from_busy_slots(Vec::new()))
    }
}

/// Connector handing out one shared mock provider
pub struct MockConnector {
    pub provider: Arc<MockCalendarProvider>,
    pub credentials: Mutex<Vec<Credential>>,
}

impl MockConnector {
    pub fn new(provider: MockCalendarProvider) -> Self {
        Self {
            provider: Arc::new(provider),
            credentials: Mutex::new(Vec::new()),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.credentials.lock().unwrap().len()
    }
}

impl CalendarConnector for MockConnector {
    fn connect(&self, credential: &Credential) -> Arc<dyn CalendarProvider> {
        self.credentials.lock().unwrap().push(credential.clone());
        self.provider.clone()
    }
}

/// One recorded model invocation
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub messages: Vec<ChatMessage>,
    pub functions: Option<Vec<FunctionDefinition>>,
}

/// Language model replaying queued completions
#[derive(Default)]
pub struct MockLanguageModel {
    responses: Mutex<VecDeque<AppResult<Completion>>>,
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, completion: Completion) -> Self {
        self.responses.lock().unwrap().push_back(Ok(completion));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(model_error(message)));
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> ModelRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        functions: Option<&[FunctionDefinition]>,
    ) -> AppResult<Completion> {
        self.requests.lock().unwrap().push(ModelRequest {
            messages: messages.to_vec(),
            functions: functions.map(|f| f.to_vec()),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(model_error("no scripted response")))
    }
}

/// Message store that is always down
#[derive(Default)]
pub struct FailingMessageStore {
    pub append_attempts: AtomicUsize,
}

#[async_trait]
impl MessageStore for FailingMessageStore {
    async fn find_messages_by_session(&self, _session_id: &str) -> AppResult<Vec<ConversationMessage>> {
        Err(store_error("connection refused"))
    }

    async fn append_message(&self, _session_id: &str, _message: &ConversationMessage) -> AppResult<()> {
        self.append_attempts.fetch_add(1, Ordering::SeqCst);
        Err(store_error("connection refused"))
    }
}
