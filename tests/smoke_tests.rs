use calendar_assistant::components::chat_store::{
    ConversationMessage, InMemoryStore, MessageStore, SessionStore, DEFAULT_SESSION_TITLE,
};
use calendar_assistant::components::google_calendar::{CalendarChange, CalendarNotifier};
use calendar_assistant::components::language_model::Role;
use calendar_assistant::config::{Config, DEFAULT_BATCH_CHUNK_SIZE, DEFAULT_HISTORY_LIMIT};
use calendar_assistant::error::Error;
use chrono::{Duration, Utc};

fn test_config() -> Config {
    Config {
        openai_api_key: "sk-test".to_string(),
        openai_model: "gpt-4-0125-preview".to_string(),
        openai_base_url: "https://api.openai.com/v1".to_string(),
        google_calendar_id: "primary".to_string(),
        google_api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        timezone: "UTC".to_string(),
        jwt_secret: "secret".to_string(),
        port: 3000,
        batch_chunk_size: DEFAULT_BATCH_CHUNK_SIZE,
        history_limit: DEFAULT_HISTORY_LIMIT,
    }
}

/// Smoke test to verify that a config can be built and validated
#[tokio::test]
async fn test_config_validates() {
    let mut config = test_config();
    assert!(config.validate().is_ok());
    assert_eq!(config.tz().unwrap(), chrono_tz::Tz::UTC);

    config.apply_overrides("port = 8080\nhistory_limit = 50\n").unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.history_limit, 50);

    assert!(matches!(
        config.apply_overrides("port = \"eighty\""),
        Err(Error::Serialization(_))
    ));
}

#[tokio::test]
async fn test_session_lifecycle() {
    let store = InMemoryStore::new();

    let untitled = store.create_session("user-1", None).await.unwrap();
    assert_eq!(untitled.title, DEFAULT_SESSION_TITLE);
    let named = store.create_session("user-1", Some("Planning")).await.unwrap();
    store.create_session("user-2", None).await.unwrap();

    store.update_last_message(&untitled.id, "See you then").await.unwrap();

    let sessions = store.find_sessions_by_user("user-1").await.unwrap();
    assert_eq!(sessions.len(), 2);
    // most recently updated first
    assert_eq!(sessions[0].id, untitled.id);
    assert_eq!(sessions[0].last_message.as_deref(), Some("See you then"));
    assert_eq!(sessions[1].id, named.id);

    store.update_title(&named.id, "Q3 planning").await.unwrap();
    let renamed = store.find_session(&named.id).await.unwrap().unwrap();
    assert_eq!(renamed.title, "Q3 planning");

    assert!(matches!(
        store.update_title("missing", "x").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_messages_are_returned_oldest_first() {
    let store = InMemoryStore::new();
    let base = Utc::now();

    store
        .append_message("s1", &ConversationMessage::assistant("second").at(base + Duration::seconds(1)))
        .await
        .unwrap();
    store
        .append_message("s1", &ConversationMessage::user("first").at(base))
        .await
        .unwrap();
    store
        .append_message("s1", &ConversationMessage::function("listEvents", "{}").at(base + Duration::seconds(2)))
        .await
        .unwrap();

    let messages = store.find_messages_by_session("s1").await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "{}"]);
    assert_eq!(messages[2].role, Role::Function);
    assert_eq!(messages[2].name.as_deref(), Some("listEvents"));

    assert!(store.find_messages_by_session("other").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_session_removes_messages() {
    let store = InMemoryStore::new();
    let session = store.create_session("user-1", None).await.unwrap();
    store
        .append_message(&session.id, &ConversationMessage::user("hello"))
        .await
        .unwrap();

    assert!(store.delete_session(&session.id).await.unwrap());
    assert!(!store.delete_session(&session.id).await.unwrap());
    assert!(store.find_session(&session.id).await.unwrap().is_none());
    assert!(store.find_messages_by_session(&session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_notifier_routes_changes_by_topic() {
    let notifier = CalendarNotifier::new();
    let mut alice = notifier.subscribe("tab-a", "alice").await;
    let mut bob = notifier.subscribe("tab-b", "bob").await;
    assert_eq!(notifier.subscriber_count().await, 2);

    let delivered = notifier
        .publish(
            "alice",
            CalendarChange::Deleted {
                event_id: "e1".to_string(),
            },
        )
        .await;

    assert_eq!(delivered, 1);
    assert_eq!(
        alice.recv().await,
        Some(CalendarChange::Deleted {
            event_id: "e1".to_string()
        })
    );
    assert!(bob.try_recv().is_err());

    assert!(notifier.unsubscribe("tab-a").await);
    assert!(!notifier.unsubscribe("tab-a").await);
    assert_eq!(notifier.subscriber_count().await, 1);
}

#[tokio::test]
async fn test_notifier_drops_closed_subscribers() {
    let notifier = CalendarNotifier::new();
    let receiver = notifier.subscribe("tab-a", "alice").await;
    drop(receiver);

    let delivered = notifier
        .publish(
            "alice",
            CalendarChange::Updated {
                event_id: "e1".to_string(),
                summary: None,
            },
        )
        .await;

    assert_eq!(delivered, 0);
    assert_eq!(notifier.subscriber_count().await, 0);
}

#[test]
fn test_change_wire_format() {
    let change = CalendarChange::Created {
        event_id: "e1".to_string(),
        summary: Some("Lunch".to_string()),
    };
    assert_eq!(
        serde_json::to_value(&change).unwrap(),
        serde_json::json!({ "type": "created", "eventId": "e1", "summary": "Lunch" })
    );
}
