//! Integration tests for the chat client using wiremock.

use std::time::Duration;

use futures::StreamExt;
use quill_client::{ChatClient, ChatError, ChatRequest, ChatTransport, PayloadFormat, StreamEvent};
use quill_types::{ChatStream, ConversationId};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str = "/api/ai/chat";

fn request(conversation: &str) -> ChatRequest {
    ChatRequest::new("Hello", ConversationId::new(conversation))
}

async fn collect(stream: ChatStream) -> Vec<StreamEvent> {
    stream.receiver.collect().await
}

fn text_of(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

async fn mount_chat(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn open_stream_sends_headers_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", "Bearer secret"))
        .and(header("accept", "text/event-stream"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "message": "Hello",
            "conversationId": "c1",
            "articleId": 7
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw("data: ok\n\n", "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(server.uri()).auth_token("secret");
    let req = request("c1").with_extra("articleId", serde_json::json!(7));
    let stream = client
        .open_stream(req, CancellationToken::new())
        .await
        .unwrap();
    let events = collect(stream).await;
    assert_eq!(text_of(&events), "ok");
}

#[tokio::test]
async fn event_stream_body_yields_deltas_then_done() {
    let server = MockServer::start().await;
    let sse = "data: Hello\n\n: keep-alive\n\ndata: {\"content\":\" World\"}\n\ndata: [DONE]\n\n";
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"),
    )
    .await;

    let client = ChatClient::new(server.uri());
    let stream = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap();
    let events = collect(stream).await;

    assert_eq!(text_of(&events), "Hello World");
    assert_eq!(events.last(), Some(&StreamEvent::Done));
}

#[tokio::test]
async fn plain_text_body_is_read_raw() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_raw("Just plain text", "text/plain"),
    )
    .await;

    let client = ChatClient::new(server.uri());
    let stream = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap();
    let events = collect(stream).await;

    assert_eq!(text_of(&events), "Just plain text");
    assert_eq!(events.last(), Some(&StreamEvent::Done));
}

#[tokio::test]
async fn json_envelope_is_replayed_as_one_delta() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "data": "Whole answer",
            "message": "success"
        })),
    )
    .await;

    let client = ChatClient::new(server.uri());
    let stream = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap();
    let events = collect(stream).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::TextDelta("Whole answer".into()),
            StreamEvent::Done
        ]
    );
}

#[tokio::test]
async fn failing_envelope_is_an_error_event() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 500,
            "message": "model offline"
        })),
    )
    .await;

    let client = ChatClient::new(server.uri());
    let stream = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap();
    let events = collect(stream).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error(e) => assert!(e.message.contains("model offline"), "{e}"),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn lenient_format_reads_choices_delta() {
    let server = MockServer::start().await;
    let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: {\"text\":\"!\"}\n\n";
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"),
    )
    .await;

    let client = ChatClient::new(server.uri()).payload_format(PayloadFormat::Lenient);
    let stream = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text_of(&collect(stream).await), "Hi!");
}

#[tokio::test]
async fn strict_format_rejects_unknown_shape() {
    let server = MockServer::start().await;
    let sse = "data: first\n\ndata: {\"delta\":\"x\"}\n\ndata: never\n\n";
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"),
    )
    .await;

    let client = ChatClient::new(server.uri());
    let stream = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap();
    let events = collect(stream).await;

    assert_eq!(events[0], StreamEvent::TextDelta("first".into()));
    assert!(matches!(events[1], StreamEvent::Error(ref e) if !e.is_retryable));
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn server_error_maps_to_status() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(500).set_body_string("boom"),
    )
    .await;

    let client = ChatClient::new(server.uri());
    let err = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        ChatError::Status { status, message } => {
            assert_eq!(*status, 500);
            assert!(message.contains("boom"));
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert!(err.is_retryable());
    assert!(!client.is_streaming(&ConversationId::new("c1")));
}

#[tokio::test]
async fn unauthorized_is_not_retryable() {
    let server = MockServer::start().await;
    mount_chat(&server, ResponseTemplate::new(401)).await;

    let client = ChatClient::new(server.uri());
    let err = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Status { status: 401, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn empty_body_is_missing_body() {
    let server = MockServer::start().await;
    mount_chat(&server, ResponseTemplate::new(200)).await;

    let client = ChatClient::new(server.uri());
    let err = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::MissingBody), "got {err:?}");
}

#[tokio::test]
async fn blank_message_is_rejected_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = ChatClient::new(server.uri());
    let err = client
        .open_stream(
            ChatRequest::new("  \n", ConversationId::new("c1")),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::InvalidRequest(_)));
}

#[tokio::test]
async fn second_stream_for_same_conversation_is_rejected() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_raw("data: a\n\n", "text/event-stream"),
    )
    .await;

    let client = ChatClient::new(server.uri());
    let first = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap();
    assert!(client.is_streaming(&ConversationId::new("c1")));

    let err = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::StreamInFlight(ref id) if id.as_str() == "c1"));

    // Another conversation is unaffected.
    let other = client
        .open_stream(request("c2"), CancellationToken::new())
        .await
        .unwrap();

    let _ = collect(first).await;
    assert!(!client.is_streaming(&ConversationId::new("c1")));
    assert!(client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .is_ok());
    drop(other);
}

#[tokio::test]
async fn cancel_before_response_yields_empty_stream() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200)
            .set_body_raw("data: late\n\n", "text/event-stream")
            .set_delay(Duration::from_secs(5)),
    )
    .await;

    let client = ChatClient::new(server.uri());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let stream = tokio::time::timeout(
        Duration::from_secs(2),
        client.open_stream(request("c1"), cancel),
    )
    .await
    .expect("open_stream should return once cancelled")
    .unwrap();

    assert!(collect(stream).await.is_empty());
    assert!(!client.is_streaming(&ConversationId::new("c1")));
}

#[tokio::test]
async fn client_cancel_stops_an_open_stream() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_raw("data: a\n\ndata: b\n\n", "text/event-stream"),
    )
    .await;

    let client = ChatClient::new(server.uri());
    let id = ConversationId::new("c1");
    let stream = client
        .open_stream(request("c1"), CancellationToken::new())
        .await
        .unwrap();

    assert!(client.cancel(&id));
    assert!(stream.cancel.is_cancelled());
    let events = collect(stream).await;
    assert!(events.is_empty(), "got {events:?}");
    assert!(!client.is_streaming(&id));
}

#[tokio::test]
async fn create_conversation_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/conversations"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(serde_json::json!({ "title": "Drafts" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "data": {
                "id": "srv-42",
                "title": "Drafts",
                "createdAt": "2026-01-02T03:04:05Z",
                "updatedAt": "2026-01-02T03:04:05Z"
            },
            "message": "success"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(server.uri()).auth_token("secret");
    let conv = client.create_conversation("Drafts").await.unwrap();
    assert_eq!(conv.id.as_str(), "srv-42");
    assert_eq!(conv.title, "Drafts");
}

#[tokio::test]
async fn create_conversation_surfaces_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 401,
            "message": "login required"
        })))
        .mount(&server)
        .await;

    let client = ChatClient::new(server.uri());
    let err = client.create_conversation("x").await.unwrap_err();
    assert!(matches!(err, ChatError::Api { code: 401, ref message } if message == "login required"));
}

#[tokio::test]
async fn fetch_site_settings_parses_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "data": { "siteName": "Field Notes", "chatEnabled": false, "footer": "hi" }
        })))
        .mount(&server)
        .await;

    let client = ChatClient::new(server.uri());
    let settings = client.fetch_site_settings().await.unwrap();
    assert_eq!(settings.site_name.as_deref(), Some("Field Notes"));
    assert!(!settings.chat_enabled);
    assert_eq!(settings.extra["footer"], "hi");
}

#[tokio::test]
async fn json_calls_honour_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/settings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "code": 200, "data": {} }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = ChatClient::new(server.uri()).request_timeout(Duration::from_millis(100));
    let err = client.fetch_site_settings().await.unwrap_err();
    assert!(matches!(err, ChatError::Timeout(d) if d == Duration::from_millis(100)));
}

#[tokio::test]
async fn invalid_json_response_is_invalid_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = ChatClient::new(server.uri());
    let err = client.fetch_site_settings().await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidPayload(_)));
}
