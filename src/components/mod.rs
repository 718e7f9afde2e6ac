pub mod agent;
pub mod chat_store;
pub mod google_calendar;
pub mod language_model;

pub use agent::CalendarAgent;
pub use chat_store::{InMemoryStore, MessageStore, RedisActor, RedisActorHandle, SessionStore};
pub use google_calendar::{
    BatchEventEngine, CalendarConnector, CalendarNotifier, CalendarProvider, Credential,
    GoogleCalendarConnector,
};
pub use language_model::{LanguageModel, OpenAiClient};
