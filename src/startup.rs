use crate::shutdown;
use calendar_assistant::components::agent::CalendarAgent;
use calendar_assistant::components::chat_store::{MessageStore, RedisActor, SessionStore};
use calendar_assistant::components::google_calendar::{
    CalendarConnector, CalendarNotifier, GoogleCalendarConnector,
};
use calendar_assistant::components::language_model::{LanguageModel, OpenAiClient};
use calendar_assistant::config::Config;
use calendar_assistant::error::{other_error, Error};
use calendar_assistant::web::{self, AppState, AuthService};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Wire up services and serve the HTTP API until a shutdown signal arrives
pub async fn start_server(config: Config) -> miette::Result<()> {
    // Initialize the Redis-backed chat store
    let (mut redis_actor, redis_handle) = RedisActor::new(&config.redis_url)?;
    tokio::spawn(async move {
        redis_actor.run().await;
    });

    let store = Arc::new(redis_handle.clone());
    let sessions: Arc<dyn SessionStore> = store.clone();
    let messages: Arc<dyn MessageStore> = store;

    let notifier = CalendarNotifier::new();
    let connector: Arc<dyn CalendarConnector> =
        Arc::new(GoogleCalendarConnector::new(&config, notifier.clone())?);
    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::from_config(&config));

    let agent = CalendarAgent::new(model, Arc::clone(&messages), Arc::clone(&connector))?
        .configured(&config)?;
    info!(
        "Agent ready (model={}, timezone={}, history_limit={})",
        config.openai_model, config.timezone, config.history_limit
    );

    let state = AppState {
        agent: Arc::new(agent),
        sessions,
        messages,
        connector,
        notifier,
        auth: Arc::new(AuthService::new(&config.jwt_secret)),
        batch_chunk_size: config.batch_chunk_size,
        timezone: config.tz()?,
    };

    let app = web::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(Error::from)?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await
        .map_err(|e| other_error(&format!("Server error: {}", e)))?;

    shutdown::stop_services(&redis_handle).await;
    Ok(())
}
