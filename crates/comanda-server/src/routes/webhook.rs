use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use subtle::ConstantTimeEq;

use comanda_core::AppError;
use comanda_core::chatbot::IncomingMessage;

use crate::dto::{WebhookAck, WebhookEvent, WebhookMessage, WebhookStatus};
use crate::error::ApiError;
use crate::state::AppState;

pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

fn token_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())))
}

/// Returns whether the event changed anything.
async fn dispatch(state: &AppState, event: WebhookEvent) -> Result<bool, AppError> {
    match event.event.as_str() {
        "session.status" => {
            let payload: WebhookStatus = serde_json::from_value(event.payload)?;
            let updated = state
                .bots
                .apply_status(&event.session, &payload.status)
                .await?;
            Ok(updated.is_some())
        }
        "message" => {
            let payload: WebhookMessage = serde_json::from_value(event.payload)?;
            let incoming = IncomingMessage {
                session: event.session,
                contact_name: payload.contact_name(),
                chat_id: payload.from,
                body: payload.body.unwrap_or_default(),
                from_me: payload.from_me,
            };
            let handled = state.chatbot.handle_incoming(&incoming).await?;
            Ok(handled.is_some())
        }
        other => {
            tracing::debug!(event = %other, "Webhook event ignored");
            Ok(false)
        }
    }
}

/// Receive session and message events from the WhatsApp gateway.
///
/// Processing failures are logged and acknowledged with `failed` so the
/// gateway does not redeliver a message that may already have been answered.
#[utoipa::path(
    post,
    path = "/webhooks/whatsapp",
    request_body = WebhookEvent,
    params(("x-webhook-token" = String, Header, description = "Shared webhook secret")),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 401, description = "Missing or wrong token", body = crate::dto::ErrorResponse),
    ),
    tag = "webhooks"
)]
pub async fn whatsapp_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // Authenticate before looking at the body.
    if !token_matches(&headers, &state.webhook_token) {
        tracing::warn!("Webhook rejected: bad token");
        return Err(AppError::Unauthorized("Invalid webhook token".into()).into());
    }
    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Invalid webhook payload: {e}")))?;

    let session = event.session.clone();
    let kind = event.event.clone();
    let status = match dispatch(&state, event).await {
        Ok(true) => "processed",
        Ok(false) => "ignored",
        Err(e) => {
            tracing::error!(session = %session, event = %kind, error = %e, "Webhook processing failed");
            "failed"
        }
    };

    Ok(axum::Json(WebhookAck { status }))
}
