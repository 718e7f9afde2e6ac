pub mod functions;
pub mod prompt;

pub use functions::{function_definitions, CalendarFunction, CalendarResponse, DecodeError};

use crate::components::chat_store::{ConversationMessage, MessageStore};
use crate::components::google_calendar::{
    BatchEventEngine, CalendarConnector, CalendarProvider, Credential, BATCH_CHUNK_SIZE,
};
use crate::components::language_model::{
    ChatMessage, FunctionCall, FunctionDefinition, LanguageModel, Role,
};
use crate::config::{Config, DEFAULT_HISTORY_LIMIT};
use crate::error::AppResult;
use chrono::Utc;
use chrono_tz::Tz;
use prompt::{
    system_prompt, EMPTY_MESSAGE_REPLY, ERROR_REPLY, MAX_MESSAGE_LENGTH,
    NO_FUNCTION_RESPONSE_REPLY, NO_RESPONSE_REPLY, TOO_LONG_REPLY,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Conversational calendar agent.
///
/// Every accepted message costs one model call, or two when the model asks
/// for a calendar function: the function result is appended to the history
/// and the model is asked again, without functions, for the final reply.
pub struct CalendarAgent {
    model: Arc<dyn LanguageModel>,
    messages: Arc<dyn MessageStore>,
    connector: Arc<dyn CalendarConnector>,
    functions: Vec<FunctionDefinition>,
    timezone: Tz,
    history_limit: usize,
    batch_chunk_size: usize,
}

impl CalendarAgent {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        messages: Arc<dyn MessageStore>,
        connector: Arc<dyn CalendarConnector>,
    ) -> AppResult<Self> {
        Ok(Self {
            model,
            messages,
            connector,
            functions: function_definitions()?,
            timezone: Tz::UTC,
            history_limit: DEFAULT_HISTORY_LIMIT,
            batch_chunk_size: BATCH_CHUNK_SIZE,
        })
    }

    /// Apply timezone, history window and chunk size from the configuration
    pub fn configured(self, config: &Config) -> AppResult<Self> {
        Ok(self
            .with_timezone(config.tz()?)
            .with_history_limit(config.history_limit)
            .with_batch_chunk_size(config.batch_chunk_size))
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Number of stored messages replayed to the model
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit.max(1);
        self
    }

    pub fn with_batch_chunk_size(mut self, chunk_size: usize) -> Self {
        self.batch_chunk_size = chunk_size.max(1);
        self
    }

    /// Handle one user message and return the assistant's reply.
    ///
    /// Without a credential the model still answers, but every calendar
    /// function it calls reports that the user is not authenticated.
    pub async fn process_message(
        &self,
        text: &str,
        credential: Option<&Credential>,
        session_id: &str,
    ) -> String {
        if text.trim().is_empty() {
            return EMPTY_MESSAGE_REPLY.to_string();
        }
        if text.chars().count() > MAX_MESSAGE_LENGTH {
            return TOO_LONG_REPLY.to_string();
        }

        let mut history = self.load_history(session_id).await;

        let user_message = ConversationMessage::user(text);
        self.persist(session_id, &user_message).await;
        history.push(user_message);

        match self.respond(&mut history, credential, session_id).await {
            Ok(reply) => {
                let assistant_message = ConversationMessage::assistant(&reply);
                self.persist(session_id, &assistant_message).await;
                reply
            }
            Err(e) => {
                error!("Error processing message for session {}: {}", session_id, e);
                ERROR_REPLY.to_string()
            }
        }
    }

    async fn respond(
        &self,
        history: &mut Vec<ConversationMessage>,
        credential: Option<&Credential>,
        session_id: &str,
    ) -> AppResult<String> {
        let system = ChatMessage::system(&system_prompt(Utc::now().with_timezone(&self.timezone)));

        let completion = self
            .model
            .complete(&Self::prompt(&system, history), Some(self.functions.as_slice()))
            .await?;

        let Some(call) = completion.function_call else {
            return Ok(non_empty(completion.content).unwrap_or_else(|| NO_RESPONSE_REPLY.to_string()));
        };

        info!("Model requested function {} in session {}", call.name, session_id);
        let result = self.execute(&call, credential).await;
        let content = serde_json::to_string(&result)?;

        let function_message = ConversationMessage::function(&call.name, &content);
        self.persist(session_id, &function_message).await;
        history.push(function_message);

        let final_completion = self
            .model
            .complete(&Self::prompt(&system, history), None)
            .await?;

        Ok(non_empty(final_completion.content)
            .unwrap_or_else(|| NO_FUNCTION_RESPONSE_REPLY.to_string()))
    }

    fn prompt(system: &ChatMessage, history: &[ConversationMessage]) -> Vec<ChatMessage> {
        std::iter::once(system.clone())
            .chain(history.iter().map(ChatMessage::from))
            .collect()
    }

    /// Stored conversation, oldest first, cut to the history window
    async fn load_history(&self, session_id: &str) -> Vec<ConversationMessage> {
        let mut history = match self.messages.find_messages_by_session(session_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Error loading conversation history for {}: {}", session_id, e);
                Vec::new()
            }
        };
        history.sort_by_key(|m| m.timestamp);

        if history.len() > self.history_limit {
            history.drain(..history.len() - self.history_limit);
        }
        // a function result is meaningless without the call that produced it
        let orphans = history
            .iter()
            .take_while(|m| m.role == Role::Function)
            .count();
        history.drain(..orphans);

        debug!("Loaded {} history messages for {}", history.len(), session_id);
        history
    }

    async fn persist(&self, session_id: &str, message: &ConversationMessage) {
        if let Err(e) = self.messages.append_message(session_id, message).await {
            warn!("Failed to store {:?} message for {}: {}", message.role, session_id, e);
        }
    }

    async fn execute(&self, call: &FunctionCall, credential: Option<&Credential>) -> CalendarResponse {
        let Some(credential) = credential else {
            return CalendarResponse::not_authenticated();
        };

        let function = match CalendarFunction::decode(&call.name, &call.arguments) {
            Ok(function) => function,
            Err(e) => {
                warn!("Rejected function call {}: {:?}", call.name, e);
                return CalendarResponse::from_decode_error(&e);
            }
        };

        debug!("Dispatching {}", function.name());
        let provider = self.connector.connect(credential);
        match self.dispatch(function, provider).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error executing function {}: {}", call.name, e);
                CalendarResponse::failed(&e.detail(), "Failed to execute calendar operation")
            }
        }
    }

    async fn dispatch(
        &self,
        function: CalendarFunction,
        provider: Arc<dyn CalendarProvider>,
    ) -> AppResult<CalendarResponse> {
        let response = match function {
            CalendarFunction::CreateEvent(spec) => {
                let event = provider.create_event(&spec).await?;
                CalendarResponse::ok(Some(to_data(&event)?), "Event created successfully")
            }
            CalendarFunction::UpdateEvent(args) => {
                let event = provider.update_event(&args.event_id, &args.patch).await?;
                CalendarResponse::ok(Some(to_data(&event)?), "Event updated successfully")
            }
            CalendarFunction::DeleteEvent(args) => {
                provider.delete_event(&args.event_id).await?;
                CalendarResponse::ok(None, "Event deleted successfully")
            }
            CalendarFunction::CheckAvailability(range) => {
                let availability = provider
                    .check_availability(&range.time_min, &range.time_max)
                    .await?;
                CalendarResponse::ok(
                    Some(to_data(&availability)?),
                    "Availability checked successfully",
                )
            }
            CalendarFunction::ListEvents(range) => {
                let events = provider.list_events(&range.time_min, &range.time_max).await?;
                CalendarResponse::ok(Some(to_data(&events)?), "Events retrieved successfully")
            }
            CalendarFunction::CreateMultipleEvents(args) => {
                let batch = BatchEventEngine::new(provider)
                    .with_chunk_size(self.batch_chunk_size)
                    .with_timezone(self.timezone)
                    .submit_batch(args.events, args.options)
                    .await;
                CalendarResponse {
                    success: batch.success,
                    error: (!batch.success).then(|| {
                        format!(
                            "{} of {} events failed",
                            batch.summary.failed, batch.summary.total
                        )
                    }),
                    message: batch.message.clone(),
                    data: Some(to_data(&batch)?),
                }
            }
        };

        Ok(response)
    }
}

fn to_data<T: Serialize>(value: &T) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn non_empty(content: Option<String>) -> Option<String> {
    content.filter(|c| !c.trim().is_empty())
}
