use std::time::Duration;

use axum::{
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    handlers::{dispatch::dispatch, health::livez},
    state::AppState,
};

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    // The mobile client and web preview call from arbitrary origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", post(dispatch))
        .route("/livez", get(livez))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tutorcall_core::services::{ChatCompletionService, ChatTurn, Result as ServiceResult};
    use tutorcall_core::signing::{Credentials, SigningError};

    use crate::config::Config;
    use crate::credentials::CredentialSource;
    use crate::storage::inmemory::InMemoryStore;
    use crate::storage::StoreSessionRepository;

    fn state_with(vars: &[(&str, &str)]) -> AppState {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_lookup(|key| vars.get(key).cloned());
        let sessions = Arc::new(StoreSessionRepository::new(InMemoryStore::new()));
        AppState::new(sessions, &config)
    }

    async fn call(app: &Router, body: Value) -> (StatusCode, Value) {
        call_raw(app, body.to_string()).await
    }

    async fn call_raw(app: &Router, body: String) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_livez() {
        let app = create_app(state_with(&[]));

        let response = app
            .oneshot(Request::builder().uri("/livez").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let app = create_app(state_with(&[]));

        let (status, body) = call(
            &app,
            json!({
                "action": "startSession",
                "deviceId": "d1",
                "sessionId": "s1",
                "tutorName": "Emma",
                "settings": { "topic": "daily", "accent": "us", "level": "beginner" },
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["sessionId"], "s1");

        for (turn, role, content) in [(2, "user", "I am fine"), (1, "assistant", "How are you?")] {
            let (status, body) = call(
                &app,
                json!({
                    "action": "saveMessage",
                    "deviceId": "d1",
                    "sessionId": "s1",
                    "role": role,
                    "content": content,
                    "turnNumber": turn,
                }),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert!(body["messageId"].as_str().is_some());
        }

        let (status, body) = call(
            &app,
            json!({
                "action": "endSession",
                "deviceId": "d1",
                "sessionId": "s1",
                "duration": 95,
                "turnCount": 2,
                "wordCount": 6,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["endedAt"].as_str().is_some());

        let (status, body) = call(
            &app,
            json!({ "action": "getSessionDetail", "deviceId": "d1", "sessionId": "s1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["status"], "completed");
        assert_eq!(body["session"]["duration"], 95);
        assert_eq!(body["messages"][0]["content"], "How are you?");
        assert_eq!(body["messages"][1]["content"], "I am fine");

        let (status, body) = call(&app, json!({ "action": "getSessions", "deviceId": "d1" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessions"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["hasMore"], false);
        assert_eq!(body["nextCursor"], Value::Null);

        let (status, body) = call(
            &app,
            json!({ "action": "deleteSession", "deviceId": "d1", "sessionId": "s1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deletedCount"], 3);
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let app = create_app(state_with(&[]));

        let (_, body) = call(&app, json!({ "action": "getSettings", "deviceId": "d1" })).await;
        assert_eq!(body, json!({ "success": true, "settings": null }));

        let (status, _) = call(
            &app,
            json!({
                "action": "saveSettings",
                "deviceId": "d1",
                "settings": { "accent": "uk", "speed": 1.2 },
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, json!({ "action": "getSettings", "deviceId": "d1" })).await;
        assert_eq!(body["settings"]["accent"], "uk");
    }

    #[tokio::test]
    async fn test_other_device_is_forbidden() {
        let app = create_app(state_with(&[]));
        call(
            &app,
            json!({ "action": "startSession", "deviceId": "d1", "sessionId": "s1" }),
        )
        .await;

        let (status, body) = call(
            &app,
            json!({ "action": "getSessionDetail", "deviceId": "d2", "sessionId": "s1" }),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Access denied to ConversationSession: s1");
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let app = create_app(state_with(&[]));

        let (status, _) = call(
            &app,
            json!({ "action": "deleteSession", "deviceId": "d1", "sessionId": "nope" }),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let app = create_app(state_with(&[]));

        let (status, body) = call(&app, json!({ "action": "chat", "messages": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));

        let (status, _) = call_raw(&app, "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, json!({ "action": "getSessions" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Validation failed"));

        let (status, body) = call(&app, json!({ "action": "analyze", "messages": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No messages to analyze");
    }

    #[tokio::test]
    async fn test_analyze_without_model_falls_back_with_200() {
        let app = create_app(state_with(&[]));

        let (status, body) = call(
            &app,
            json!({
                "action": "analyze",
                "messages": [
                    { "role": "assistant", "content": "Tell me about your weekend." },
                    { "role": "user", "content": "Well I uh went hiking" },
                ],
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fallback"], true);
        assert!(body.get("success").is_none());
        assert_eq!(body["analysis"]["fillers"]["count"], 2);
    }

    struct FixedChat;

    #[async_trait::async_trait]
    impl ChatCompletionService for FixedChat {
        async fn complete(
            &self,
            _system_prompt: &str,
            _turns: &[ChatTurn],
        ) -> ServiceResult<String> {
            Ok(r#"{"cafp_scores":{"complexity":80,"accuracy":81,"fluency":82,"pronunciation":83}}"#
                .to_string())
        }
    }

    #[tokio::test]
    async fn test_analyze_with_model_uses_success_envelope() {
        let state = state_with(&[]).with_chat_service(Arc::new(FixedChat));
        let app = create_app(state);

        let (status, body) = call(
            &app,
            json!({
                "action": "analyze",
                "messages": [{ "role": "user", "content": "I like hiking" }],
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body.get("fallback").is_none());
        assert_eq!(body["analysis"]["cafp_scores"]["pronunciation"], 83);
    }

    /// Hands out a new access key on every call, like a rotating role.
    struct RotatingCredentials {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl CredentialSource for RotatingCredentials {
        async fn credentials(&self) -> Result<Credentials, SigningError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Credentials {
                access_key_id: format!("AKIDEXAMPLE{call}"),
                secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
                session_token: Some(format!("token-{call}")),
            })
        }
    }

    fn rotating_state(vars: &[(&str, &str)]) -> AppState {
        state_with(vars).with_credential_source(Arc::new(RotatingCredentials {
            calls: AtomicUsize::new(0),
        }))
    }

    #[tokio::test]
    async fn test_transcribe_url() {
        let app = create_app(rotating_state(&[("AWS_REGION", "ap-northeast-2")]));

        let (status, body) = call(
            &app,
            json!({ "action": "getTranscribeUrl", "language": "en-GB", "sampleRate": 8000 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["expiresIn"], 300);
        let url = body["url"].as_str().unwrap();
        assert!(url.starts_with(
            "wss://transcribestreaming.ap-northeast-2.amazonaws.com:8443/stream-transcription-websocket?"
        ));
        assert!(url.contains("language-code=en-GB"));
        assert!(url.contains("sample-rate=8000"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_transcribe_url_resolves_credentials_per_request() {
        let app = create_app(rotating_state(&[]));

        let (_, first) = call(&app, json!({ "action": "getTranscribeUrl" })).await;
        let (_, second) = call(&app, json!({ "action": "getTranscribeUrl" })).await;

        let first = first["url"].as_str().unwrap();
        let second = second["url"].as_str().unwrap();
        assert!(first.contains("X-Amz-Credential=AKIDEXAMPLE1%2F"));
        assert!(first.contains("X-Amz-Security-Token=token-1"));
        assert!(second.contains("X-Amz-Credential=AKIDEXAMPLE2%2F"));
        assert!(second.contains("X-Amz-Security-Token=token-2"));
    }

    #[tokio::test]
    async fn test_transcribe_url_without_credentials_is_opaque_500() {
        let app = create_app(state_with(&[]));

        let (status, body) = call(&app, json!({ "action": "getTranscribeUrl" })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
