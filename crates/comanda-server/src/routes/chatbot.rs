use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use comanda_core::bot::{
    AutomationRule, AutomationRuleInput, BotMessage, BotSettings, Conversation, UserBot,
};

use crate::auth::CurrentUser;
use crate::dto::{BotConfigResponse, LimitQuery, ManualReplyRequest, QrResponse};
use crate::error::{ApiError, AppJson, AppPath, AppQuery};
use crate::state::AppState;

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

fn page_size(query: &LimitQuery) -> i64 {
    query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
}

// ---------------------------------------------------------------------------
// Bot session
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/chatbot/config",
    responses((status = 200, description = "Bot settings and connection status", body = BotConfigResponse)),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let bot = state.db.bot_repo().get_or_create(user.id).await?;
    Ok(axum::Json(BotConfigResponse {
        bot,
        ai_available: state.chatbot.ai_available(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/chatbot/config",
    request_body = BotSettings,
    responses((status = 200, description = "Settings saved", body = BotConfigResponse)),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<BotSettings>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = state.db.bot_repo();
    repo.get_or_create(user.id).await?;
    let bot = repo.update_settings(user.id, &body).await?;
    Ok(axum::Json(BotConfigResponse {
        bot,
        ai_available: state.chatbot.ai_available(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/chatbot/start",
    responses(
        (status = 200, description = "Session starting; QR stored when available", body = UserBot),
        (status = 409, description = "Already connected", body = crate::dto::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn start_bot(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let bot = state.db.bot_repo().get_or_create(user.id).await?;
    let bot = state.bots.start(&bot).await?;
    Ok(axum::Json(bot))
}

#[utoipa::path(
    post,
    path = "/api/chatbot/stop",
    responses(
        (status = 200, description = "Session stopped", body = UserBot),
        (status = 502, description = "Gateway unavailable", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn stop_bot(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let bot = state.db.bot_repo().get_or_create(user.id).await?;
    let bot = state.bots.stop(&bot).await?;
    Ok(axum::Json(bot))
}

#[utoipa::path(
    get,
    path = "/api/chatbot/qr",
    responses(
        (status = 200, description = "Current pairing QR code", body = QrResponse),
        (status = 404, description = "No QR code available", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn get_qr(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let bot = state.db.bot_repo().get_or_create(user.id).await?;
    let bot = state.bots.refresh_qr(&bot).await?;
    Ok(axum::Json(QrResponse {
        status: bot.status,
        qr_code: bot.qr_code,
    }))
}

// ---------------------------------------------------------------------------
// Automation rules
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/chatbot/rules",
    responses((status = 200, description = "Rules by priority", body = Vec<AutomationRule>)),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rules = state.db.bot_repo().list_rules(user.id).await?;
    Ok(axum::Json(rules))
}

#[utoipa::path(
    post,
    path = "/api/chatbot/rules",
    request_body = AutomationRuleInput,
    responses(
        (status = 201, description = "Rule created", body = AutomationRule),
        (status = 400, description = "Invalid rule", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<AutomationRuleInput>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = state.db.bot_repo().create_rule(user.id, &body).await?;
    Ok((StatusCode::CREATED, axum::Json(rule)))
}

#[utoipa::path(
    put,
    path = "/api/chatbot/rules/{id}",
    params(("id" = Uuid, Path, description = "Rule ID")),
    request_body = AutomationRuleInput,
    responses(
        (status = 200, description = "Rule updated", body = AutomationRule),
        (status = 404, description = "Rule not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<AutomationRuleInput>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = state.db.bot_repo().update_rule(user.id, id, &body).await?;
    Ok(axum::Json(rule))
}

#[utoipa::path(
    delete,
    path = "/api/chatbot/rules/{id}",
    params(("id" = Uuid, Path, description = "Rule ID")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "Rule not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.bot_repo().delete_rule(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/chatbot/conversations",
    params(LimitQuery),
    responses((status = 200, description = "Conversations, most recent first", body = Vec<Conversation>)),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppQuery(query): AppQuery<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = state
        .db
        .bot_repo()
        .list_conversations(user.id, page_size(&query))
        .await?;
    Ok(axum::Json(conversations))
}

#[utoipa::path(
    get,
    path = "/api/chatbot/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation ID"), LimitQuery),
    responses(
        (status = 200, description = "Latest messages, oldest first", body = Vec<BotMessage>),
        (status = 404, description = "Conversation not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppQuery(query): AppQuery<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = state.db.bot_repo();
    let conversation = repo.get_conversation(user.id, id).await?;
    let messages = repo
        .recent_messages(conversation.id, page_size(&query))
        .await?;
    Ok(axum::Json(messages))
}

#[utoipa::path(
    post,
    path = "/api/chatbot/conversations/{id}/reply",
    params(("id" = Uuid, Path, description = "Conversation ID")),
    request_body = ManualReplyRequest,
    responses(
        (status = 201, description = "Reply sent", body = BotMessage),
        (status = 400, description = "Empty message", body = crate::dto::ErrorResponse),
        (status = 404, description = "Conversation not found", body = crate::dto::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "chatbot"
)]
pub async fn reply(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<ManualReplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = state.db.bot_repo();
    let bot = repo.get_or_create(user.id).await?;
    let conversation = repo.get_conversation(user.id, id).await?;
    let message = state
        .chatbot
        .send_manual(&bot, &conversation, &body.text)
        .await?;
    Ok((StatusCode::CREATED, axum::Json(message)))
}
