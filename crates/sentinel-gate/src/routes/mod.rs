//! HTTP route handlers for the gate.

use axum::{Router, http::StatusCode, routing::get};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod health;
mod verify;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Verification links from challenge emails
        .route("/verify", get(verify::verify))

        .fallback(not_found)
        .layer(TraceLayer::new_for_http())

        // Add shared state
        .with_state(state)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::mail::{InboundMail, RecordingTransport};
    use crate::store::{KvStore, MemoryStore};
    use crate::telemetry::RecordingSink;
    use sentinel_common::ChallengeRecord;

    struct Harness {
        state: AppState,
        challenges: Arc<MemoryStore>,
        whitelist: Arc<MemoryStore>,
        events: Arc<RecordingSink>,
    }

    fn harness() -> Harness {
        let config = AppConfig {
            relay_address: "relay@sentinel.example".to_string(),
            target_address: "owner@example.org".to_string(),
            public_url: "https://gate.sentinel.example".to_string(),
            ..Default::default()
        };
        let challenges = Arc::new(MemoryStore::new());
        let whitelist = Arc::new(MemoryStore::new());
        let events = Arc::new(RecordingSink::default());
        let state = AppState::from_parts(
            &config,
            challenges.clone(),
            whitelist.clone(),
            Arc::new(RecordingTransport::default()),
            events.clone(),
        );
        Harness {
            state,
            challenges,
            whitelist,
            events,
        }
    }

    async fn issue(harness: &Harness) -> (String, String) {
        let raw = b"From: Alan <alan@example.com>\r\nSubject: hello\r\n\r\nhi\r\n".to_vec();
        let inbound = InboundMail::new("alan@example.com", "relay@sentinel.example", raw);
        harness.state.gate.on_inbound(&inbound).await.unwrap();

        let key = harness.challenges.keys().await.pop().unwrap();
        let token = key.trim_start_matches("challenge:").to_string();
        let stored = harness.challenges.get(&key).await.unwrap().unwrap();
        let answer = ChallengeRecord::from_stored(&token, &stored).unwrap().answer;
        (token, answer)
    }

    async fn get_uri(state: AppState, uri: &str) -> (StatusCode, String) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_verify_success_page() {
        let harness = harness();
        let (token, answer) = issue(&harness).await;

        let (status, body) = get_uri(
            harness.state.clone(),
            &format!("/verify?token={token}&answer={answer}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Verification Successful!"));
        assert!(harness.whitelist.get("alan@example.com").await.unwrap().is_some());
        assert!(harness.challenges.get(&format!("challenge:{token}")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_wrong_answer_page() {
        let harness = harness();
        let (token, answer) = issue(&harness).await;
        let wrong = answer.parse::<i64>().unwrap() - 1;

        let (status, body) = get_uri(
            harness.state.clone(),
            &format!("/verify?token={token}&answer={wrong}"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Incorrect Answer"));
        assert!(harness.challenges.get(&format!("challenge:{token}")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_verify_plain_text_errors() {
        let harness = harness();

        let (status, body) = get_uri(harness.state.clone(), "/verify?token=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid verification link");

        let (status, body) = get_uri(harness.state.clone(), "/verify?token=unknown&answer=7").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Challenge expired or invalid");
        assert!(harness.challenges.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_attempts_are_recorded() {
        let harness = harness();
        let request = Request::builder()
            .uri("/verify?token=t&answer=1")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        create_router(harness.state.clone()).oneshot(request).await.unwrap();

        assert!(harness.events.events().iter().any(|e| matches!(
            e,
            crate::telemetry::GateEvent::VerificationAttempt { client: Some(ip), .. } if ip == "203.0.113.9"
        )));
    }

    #[tokio::test]
    async fn test_health_and_unknown_route() {
        let harness = harness();

        let (status, body) = get_uri(harness.state.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"status\":\"ok\""));

        let (status, _) = get_uri(harness.state.clone(), "/ready").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_uri(harness.state.clone(), "/elsewhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Not found");
    }
}
