use super::auth::{AuthError, AuthUser};
use super::AppState;
use crate::components::chat_store::{ChatSession, ConversationMessage};
use crate::components::google_calendar::{
    BatchEventEngine, BatchOptions, BatchResponse, CalendarChange, CalendarEvent,
    CalendarNotifier, CalendarProvider, EventPatch, EventSpec,
};
use crate::error::{not_found_error, validation_error, Error};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Error returned by API handlers, rendered as `{"error": ...}`
#[derive(Debug)]
pub enum ApiError {
    App(Error),
    Auth(AuthError),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::App(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Auth(err) => return err.into_response(),
            ApiError::App(err) => err,
        };

        let status = match &err {
            Error::Validation(_) | Error::Serialization(_) => StatusCode::BAD_REQUEST,
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Provider(_) | Error::Model(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", err);
            "Internal server error".to_string()
        } else {
            err.detail()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub async fn health() -> &'static str {
    "OK"
}

/// A session of the caller; someone else's session is reported as missing
async fn owned_session(state: &AppState, user: &AuthUser, session_id: &str) -> ApiResult<ChatSession> {
    match state.sessions.find_session(session_id).await? {
        Some(session) if session.user_id == user.user_id() => Ok(session),
        _ => Err(not_found_error("Session not found").into()),
    }
}

fn calendar_for(state: &AppState, user: &AuthUser) -> ApiResult<Arc<dyn CalendarProvider>> {
    let credential = user.credential().ok_or(AuthError::NotAuthenticated)?;
    Ok(state.connector.connect(&credential))
}

// Sessions

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<ChatSession>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub title: String,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<SessionsResponse>> {
    let sessions = state.sessions.find_sessions_by_user(user.user_id()).await?;
    Ok(Json(SessionsResponse { sessions }))
}

pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<ChatSession>)> {
    let session = state
        .sessions
        .create_session(user.user_id(), request.title.as_deref())
        .await?;
    info!("Created chat session {} for {}", session.id, user.user_id());
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn rename_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
    Json(request): Json<RenameSessionRequest>,
) -> ApiResult<Json<ChatSession>> {
    owned_session(&state, &user, &session_id).await?;

    let title = request.title.trim();
    if title.is_empty() {
        return Err(validation_error("Title is required").into());
    }
    state.sessions.update_title(&session_id, title).await?;

    Ok(Json(owned_session(&state, &user, &session_id).await?))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> ApiResult<StatusCode> {
    owned_session(&state, &user, &session_id).await?;
    if state.sessions.delete_session(&session_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found_error("Session not found").into())
    }
}

// Messages

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ConversationMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub response: String,
    pub messages: Vec<ConversationMessage>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<MessagesResponse>> {
    owned_session(&state, &user, &query.session_id).await?;
    let messages = state.messages.find_messages_by_session(&query.session_id).await?;
    Ok(Json(MessagesResponse { messages }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Json<SendMessageResponse>> {
    owned_session(&state, &user, &request.session_id).await?;

    let credential = user.credential();
    let response = state
        .agent
        .process_message(&request.message, credential.as_ref(), &request.session_id)
        .await;

    if let Err(e) = state
        .sessions
        .update_last_message(&request.session_id, &request.message)
        .await
    {
        warn!("Failed to update session {}: {}", request.session_id, e);
    }

    let messages = state
        .messages
        .find_messages_by_session(&request.session_id)
        .await
        .unwrap_or_else(|e| {
            warn!("Failed to reload messages for {}: {}", request.session_id, e);
            Vec::new()
        });

    Ok(Json(SendMessageResponse { response, messages }))
}

// Calendar

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRangeQuery {
    pub time_min: String,
    pub time_max: String,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<CalendarEvent>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventsRequest {
    pub events: Vec<EventSpec>,
    #[serde(default)]
    pub options: BatchOptions,
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(range): Query<TimeRangeQuery>,
) -> ApiResult<impl IntoResponse> {
    let calendar = calendar_for(&state, &user)?;
    let events = calendar.list_events(&range.time_min, &range.time_max).await?;
    Ok(Json(EventsResponse { events }))
}

pub async fn create_events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateEventsRequest>,
) -> ApiResult<Json<BatchResponse>> {
    let calendar = calendar_for(&state, &user)?;
    let response = BatchEventEngine::new(calendar)
        .with_chunk_size(state.batch_chunk_size)
        .with_timezone(state.timezone)
        .submit_batch(request.events, request.options)
        .await;
    Ok(Json(response))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
    Json(patch): Json<EventPatch>,
) -> ApiResult<Json<CalendarEvent>> {
    let calendar = calendar_for(&state, &user)?;
    Ok(Json(calendar.update_event(&event_id, &patch).await?))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> ApiResult<StatusCode> {
    let calendar = calendar_for(&state, &user)?;
    calendar.delete_event(&event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn check_availability(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(range): Query<TimeRangeQuery>,
) -> ApiResult<impl IntoResponse> {
    let calendar = calendar_for(&state, &user)?;
    let availability = calendar
        .check_availability(&range.time_min, &range.time_max)
        .await?;
    Ok(Json(availability))
}

/// Unsubscribes the SSE client once its stream is dropped
struct Subscription {
    notifier: CalendarNotifier,
    subscriber_id: String,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let notifier = self.notifier.clone();
        let subscriber_id = std::mem::take(&mut self.subscriber_id);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                notifier.unsubscribe(&subscriber_id).await;
            });
        }
    }
}

fn change_event(change: &CalendarChange) -> Event {
    Event::default()
        .event("calendar-change")
        .json_data(change)
        .unwrap_or_else(|e| Event::default().comment(format!("unserializable change: {}", e)))
}

pub async fn calendar_stream(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscriber_id = Uuid::new_v4().to_string();
    let receiver = state.notifier.subscribe(&subscriber_id, user.user_id()).await;
    info!("Calendar stream {} opened for {}", subscriber_id, user.user_id());

    let subscription = Subscription {
        notifier: state.notifier.clone(),
        subscriber_id,
    };

    let changes = stream::unfold((receiver, subscription), |(mut receiver, subscription)| async move {
        let change = receiver.recv().await?;
        Some((Ok(change_event(&change)), (receiver, subscription)))
    });

    Sse::new(changes).keep_alive(KeepAlive::default())
}
