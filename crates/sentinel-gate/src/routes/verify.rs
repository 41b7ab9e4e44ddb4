//! Verification endpoint opened from challenge emails.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use sentinel_common::SentinelError;
use crate::mail::templates::{INCORRECT_ANSWER_PAGE, SUCCESS_PAGE};
use crate::state::AppState;
use crate::telemetry::GateEvent;

#[derive(Deserialize)]
pub struct VerifyQuery {
    token: Option<String>,
    answer: Option<String>,
}

/// Check the answer behind a verification link
///
/// Returns:
/// - 200: Sender verified, success page
/// - 400: Wrong answer (retry page), or a plain-text reason
/// - 503: Store or transport unavailable
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<VerifyQuery>,
) -> Response {
    let client = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string());

    state.gate.events().emit(GateEvent::VerificationAttempt {
        token: params.token.clone(),
        answer: params.answer.clone(),
        client,
    });

    match state
        .gate
        .verify(params.token.as_deref(), params.answer.as_deref())
        .await
    {
        Ok(verified) => {
            tracing::info!(sender = %verified.sender, "Verification link accepted");
            (StatusCode::OK, Html(SUCCESS_PAGE)).into_response()
        }
        Err(SentinelError::IncorrectAnswer) => {
            (StatusCode::BAD_REQUEST, Html(INCORRECT_ANSWER_PAGE)).into_response()
        }
        Err(err) => {
            let status =
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if err.is_client_error() {
                (status, err.to_string()).into_response()
            } else {
                tracing::error!(error = %err, "Verification failed");
                (status, "Verification is temporarily unavailable").into_response()
            }
        }
    }
}
