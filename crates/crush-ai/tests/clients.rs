//! Integration tests for the AI backend clients using wiremock HTTP mocks.

use std::sync::Arc;
use std::time::Duration;

use crush_ai::{
    AiCompleter, AiError, AsyncChatClient, ChatCompletionsClient, CompletionBackend, JobPoller,
    Prompt, Submission,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn prompt() -> Prompt {
    Prompt {
        system: "You are a relationship analyst.".to_owned(),
        text: "Name: Lin".to_owned(),
        images: vec!["data:image/jpeg;base64,/9j/AA==".to_owned()],
    }
}

fn fast_poller(max_attempts: u32) -> JobPoller {
    JobPoller::new(Duration::from_millis(10), max_attempts)
}

// ---------------------------------------------------------------------------
// chat/completions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_completions_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "test/model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "[{\"title\":\"1\",\"content\":\"ok\"}]" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::with_base_url(
        "sk-test",
        "test/model",
        30,
        &format!("{}/v1", server.uri()),
    )
    .unwrap();

    let submission = client.submit(&prompt()).await.unwrap();
    assert_eq!(
        submission,
        Submission::Completed("[{\"title\":\"1\",\"content\":\"ok\"}]".to_owned())
    );
}

#[tokio::test]
async fn chat_completions_non_2xx_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;

    let client =
        ChatCompletionsClient::with_base_url("sk-bad", "test/model", 30, &server.uri()).unwrap();

    let err = client.submit(&prompt()).await.unwrap_err();
    assert!(
        matches!(&err, AiError::Api { status: 401, body } if body == "invalid key"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn chat_completions_malformed_payload_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let backend =
        ChatCompletionsClient::with_base_url("sk-test", "test/model", 30, &server.uri()).unwrap();
    let completer = AiCompleter::new(Arc::new(backend), fast_poller(1)).with_retries(2, 0);

    let err = completer.complete(&prompt()).await.unwrap_err();
    assert!(matches!(err, AiError::Deserialize { .. }));
}

#[tokio::test]
async fn chat_completions_5xx_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let backend =
        ChatCompletionsClient::with_base_url("sk-test", "test/model", 30, &server.uri()).unwrap();
    let completer = AiCompleter::new(Arc::new(backend), fast_poller(1)).with_retries(2, 0);

    let err = completer.complete(&prompt()).await.unwrap_err();
    assert!(matches!(err, AiError::Api { status: 503, .. }), "{err}");
}

#[tokio::test]
async fn unreachable_backend_is_retried_then_fails() {
    let backend =
        ChatCompletionsClient::with_base_url("sk-test", "test/model", 30, "http://127.0.0.1:1")
            .unwrap();
    let completer = AiCompleter::new(Arc::new(backend), fast_poller(1)).with_retries(1, 0);

    let err = completer.complete(&prompt()).await.unwrap_err();
    assert!(matches!(err, AiError::Http(ref e) if e.is_connect()), "{err}");
}

// ---------------------------------------------------------------------------
// async chat jobs
// ---------------------------------------------------------------------------

async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v3/chat"))
        .and(header("authorization", "Bearer pat-test"))
        .and(body_partial_json(json!({ "bot_id": "bot-1", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "",
            "data": { "id": "chat-1", "conversation_id": "conv-1", "status": "created" }
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn retrieve_body(status: &str) -> serde_json::Value {
    json!({
        "code": 0,
        "msg": "",
        "data": { "id": "chat-1", "conversation_id": "conv-1", "status": status }
    })
}

fn async_completer(server: &MockServer, max_attempts: u32) -> AiCompleter {
    let backend = AsyncChatClient::with_base_url("pat-test", "bot-1", 30, &server.uri()).unwrap();
    AiCompleter::new(Arc::new(backend), fast_poller(max_attempts)).with_retries(0, 0)
}

#[tokio::test]
async fn async_job_polls_until_completed_then_fetches_answer() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/v3/chat/retrieve"))
        .and(query_param("chat_id", "chat-1"))
        .and(query_param("conversation_id", "conv-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(retrieve_body("in_progress")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/chat/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(retrieve_body("completed")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/chat/message/list"))
        .and(query_param("chat_id", "chat-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "",
            "data": [
                { "role": "assistant", "type": "verbose", "content_type": "text",
                  "content": "{\"msg_type\":\"generate_answer_finish\"}" },
                { "role": "assistant", "type": "answer", "content_type": "text",
                  "content": "[{\"title\":\"1. Core\",\"content\":\"Warm.\"}]" },
                { "role": "assistant", "type": "follow_up", "content_type": "text",
                  "content": "Anything else?" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = async_completer(&server, 10)
        .complete(&prompt())
        .await
        .unwrap();
    assert_eq!(text, "[{\"title\":\"1. Core\",\"content\":\"Warm.\"}]");

    let retrieves = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/v3/chat/retrieve")
        .count();
    assert_eq!(retrieves, 3);
}

#[tokio::test]
async fn async_job_failed_status_surfaces_reason_immediately() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/v3/chat/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "",
            "data": {
                "id": "chat-1",
                "conversation_id": "conv-1",
                "status": "failed",
                "last_error": { "code": 4011, "msg": "bot quota exhausted" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/chat/message/list"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = async_completer(&server, 20)
        .complete(&prompt())
        .await
        .unwrap_err();
    assert!(
        matches!(&err, AiError::ExternalServiceFailed(reason) if reason == "bot quota exhausted"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn async_job_that_never_finishes_times_out() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/v3/chat/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(retrieve_body("in_progress")))
        .expect(3)
        .mount(&server)
        .await;

    let err = async_completer(&server, 3)
        .complete(&prompt())
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::Timeout { attempts: 3 }));
}

#[tokio::test]
async fn async_job_transport_errors_while_polling_are_retried() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/v3/chat/retrieve"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/chat/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(retrieve_body("completed")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/chat/message/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": [{ "type": "answer", "content_type": "text", "content": "done" }]
        })))
        .mount(&server)
        .await;

    let text = async_completer(&server, 5)
        .complete(&prompt())
        .await
        .unwrap();
    assert_eq!(text, "done");
}

#[tokio::test]
async fn async_job_with_no_answer_message_is_no_answer_found() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/v3/chat/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(retrieve_body("completed")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/chat/message/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": [{ "type": "follow_up", "content_type": "text", "content": "More?" }]
        })))
        .mount(&server)
        .await;

    let err = async_completer(&server, 5)
        .complete(&prompt())
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::NoAnswerFound));
}

#[tokio::test]
async fn async_submit_business_error_is_service_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 4100,
            "msg": "authentication is invalid"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = async_completer(&server, 5)
        .complete(&prompt())
        .await
        .unwrap_err();
    assert!(
        matches!(&err, AiError::ExternalServiceFailed(msg) if msg.contains("authentication is invalid")),
        "unexpected error: {err}"
    );
}
