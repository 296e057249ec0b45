use actix_web::{http::header, web, HttpResponse};
use futures_util::Stream;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::anthropic_client::AnthropicClient;
use crate::error::{AppError, AppResult};
use crate::models::stream_event::StreamEvent;
use crate::streaming::relay::{frame, RelayStream};
use crate::validation::validate_chat_request;

fn event_stream_response<S>(stream: S) -> HttpResponse
where
    S: Stream<Item = Result<web::Bytes, AppError>> + 'static,
{
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(stream)
}

/// POST /api/chat. Validates the body, opens one upstream streaming call
/// and relays it as SSE frames.
pub async fn chat(
    client: web::Data<AnthropicClient>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Request body must be valid JSON".to_string()))?;

    let request = validate_chat_request(&payload).map_err(AppError::Validation)?;

    let request_id = Uuid::new_v4().to_string();
    info!(
        request_id = %request_id,
        model = %request.model,
        turns = request.messages.len(),
        "chat request accepted"
    );

    // Once streaming starts the status line is committed, so upstream
    // failures from here on are surfaced as in-band error frames, not as
    // HTTP error statuses. A call that fails before producing any bytes
    // gets the same treatment: a 200 stream holding a single error frame.
    match client.stream_messages(&request).await {
        Ok(stream) => Ok(event_stream_response(RelayStream::new(stream, request_id))),
        Err(e) => {
            warn!(request_id = %request_id, "upstream call failed before streaming: {}", e);
            let event = StreamEvent::Error {
                error: e.to_string(),
            };
            let single = futures_util::stream::once(async move { Ok::<_, AppError>(frame(&event)) });
            Ok(event_stream_response(single))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{AnthropicConfig, AppSettings, ServerConfig};
    use crate::routes::configure_routes;
    use actix_web::{http::StatusCode, test, App};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const UPSTREAM_SSE_BODY: &str = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":7,\"output_tokens\":1,\"cache_read_input_tokens\":4}}}\n",
        "\n",
        "event: content_block_start\n",
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n",
        "\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n",
        "\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" world\"}}\n",
        "\n",
        "event: content_block_stop\n",
        "data: {\"type\":\"content_block_stop\",\"index\":0}\n",
        "\n",
        "event: message_delta\n",
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":9}}\n",
        "\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n",
        "\n",
    );

    fn settings_for(base_url: &str) -> AppSettings {
        AppSettings {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                static_dir: "static".to_string(),
            },
            anthropic: AnthropicConfig {
                api_key: "test-key".to_string(),
                base_url: base_url.to_string(),
            },
        }
    }

    fn parse_frames(body: &[u8]) -> Vec<StreamEvent> {
        let text = std::str::from_utf8(body).unwrap();
        text.split("\n\n")
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| {
                assert!(chunk.starts_with("data: "), "bad frame: {:?}", chunk);
                serde_json::from_str(&chunk[6..]).unwrap()
            })
            .collect()
    }

    #[actix_rt::test]
    async fn streams_deltas_and_done_from_upstream() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", "2023-06-01")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(UPSTREAM_SSE_BODY)
            .create_async()
            .await;

        let base_url = format!("{}/v1", server.url());
        let settings = settings_for(&base_url);
        let client = AnthropicClient::new(&settings).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(settings))
                .app_data(web::Data::new(client))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({
                "model": "claude-sonnet-4-5",
                "messages": [{"role": "user", "content": "Test"}]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
        assert_eq!(resp.headers().get("cache-control").unwrap(), "no-cache");

        let body = test::read_body(resp).await;
        let events = parse_frames(&body);

        let reply: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Delta { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(reply, "Hello world");

        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        match events.last().unwrap() {
            StreamEvent::Done { usage } => {
                assert_eq!(usage.input_tokens, 7);
                assert_eq!(usage.output_tokens, 9);
                assert_eq!(usage.cache_read_input_tokens, Some(4));
            }
            other => panic!("expected done terminal, got {:?}", other),
        }

        mock.assert_async().await;
    }

    #[actix_rt::test]
    async fn rejects_unsupported_model_without_upstream_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .expect(0)
            .create_async()
            .await;

        let base_url = format!("{}/v1", server.url());
        let settings = settings_for(&base_url);
        let client = AnthropicClient::new(&settings).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(settings))
                .app_data(web::Data::new(client))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({"model": "gpt-extreme", "messages": []}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("unsupported model"));

        mock.assert_async().await;
    }

    #[actix_rt::test]
    async fn rejects_malformed_json_body() {
        let settings = settings_for("http://localhost/v1");
        let client = AnthropicClient::new(&settings).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(settings))
                .app_data(web::Data::new(client))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not valid json")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("valid JSON"));
    }

    #[actix_rt::test]
    async fn upstream_rejection_surfaces_as_in_band_error_frame() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_header("content-type", "application/json")
            .with_body(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .create_async()
            .await;

        let settings = settings_for("http://localhost/v1");
        let client = AnthropicClient::new(&settings)
            .unwrap()
            .with_base_url(format!("{}/v1", server.url()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(settings))
                .app_data(web::Data::new(client))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({
                "model": "claude-sonnet-4-5",
                "messages": [{"role": "user", "content": "Test"}]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        // Status is already committed to 200; the failure rides in-band.
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/event-stream"
        );

        let body = test::read_body(resp).await;
        let events = parse_frames(&body);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Error { error } => assert!(error.contains("Overloaded")),
            other => panic!("expected error terminal, got {:?}", other),
        }
    }
}
