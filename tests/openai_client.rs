use calendar_assistant::components::agent::function_definitions;
use calendar_assistant::components::language_model::{ChatMessage, LanguageModel, OpenAiClient};
use calendar_assistant::error::Error;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(&format!("{}/v1", server.uri()), "sk-test", "gpt-4-0125-preview")
}

#[tokio::test]
async fn test_text_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4-0125-preview",
            "temperature": 0.7,
            "messages": [{ "role": "user", "content": "hi" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hello!" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let completion = client(&server)
        .complete(&[ChatMessage::user("hi")], None)
        .await
        .unwrap();

    assert_eq!(completion.content.as_deref(), Some("Hello!"));
    assert!(completion.function_call.is_none());
}

#[tokio::test]
async fn test_function_call_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": { "name": "deleteEvent", "arguments": "{\"eventId\":\"e1\"}" }
                }
            }]
        })))
        .mount(&server)
        .await;

    let functions = function_definitions().unwrap();
    let completion = client(&server)
        .complete(&[ChatMessage::user("delete e1")], Some(functions.as_slice()))
        .await
        .unwrap();

    let call = completion.function_call.unwrap();
    assert_eq!(call.name, "deleteEvent");
    assert_eq!(call.arguments, r#"{"eventId":"e1"}"#);

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["functions"].as_array().map(Vec::len), Some(6));
}

#[tokio::test]
async fn test_functions_omitted_when_not_offered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "ok" } }]
        })))
        .mount(&server)
        .await;

    client(&server)
        .complete(&[ChatMessage::user("hi")], None)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("functions").is_none());
}

#[tokio::test]
async fn test_http_error_is_model_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete(&[ChatMessage::user("hi")], None)
        .await
        .unwrap_err();

    match err {
        Error::Model(message) => assert!(message.contains("rate limited"), "{}", message),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_choices_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = client(&server)
        .complete(&[ChatMessage::user("hi")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Model(ref m) if m == "No response from assistant"));
}
