//! HTTP API: chat sessions, chat messages and direct calendar access.

pub mod auth;
pub mod handlers;

use crate::components::agent::CalendarAgent;
use crate::components::chat_store::{MessageStore, SessionStore};
use crate::components::google_calendar::{CalendarConnector, CalendarNotifier};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, put};
use axum::Router;
use chrono_tz::Tz;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use auth::{AuthService, AuthUser, Claims};

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<CalendarAgent>,
    pub sessions: Arc<dyn SessionStore>,
    pub messages: Arc<dyn MessageStore>,
    pub connector: Arc<dyn CalendarConnector>,
    pub notifier: CalendarNotifier,
    /// Auth service for JWT operations
    pub auth: Arc<AuthService>,
    pub batch_chunk_size: usize,
    pub timezone: Tz,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/chat/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/api/chat/sessions/{id}",
            patch(handlers::rename_session).delete(handlers::delete_session),
        )
        .route(
            "/api/chat/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route(
            "/api/calendar/events",
            get(handlers::list_events).post(handlers::create_events),
        )
        .route(
            "/api/calendar/event/{id}",
            put(handlers::update_event).delete(handlers::delete_event),
        )
        .route("/api/calendar/availability", get(handlers::check_availability))
        .route("/api/calendar/stream", get(handlers::calendar_stream))
        .route_layer(from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
