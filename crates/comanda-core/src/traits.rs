use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bot::{AutomationRule, BotMessage, BotStatus, Conversation, NewBotMessage, UserBot};
use crate::catalog::Product;
use crate::customer::Customer;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Everything a generator needs to answer one incoming message.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub system_prompt: String,
    /// Earlier turns of the conversation, oldest first.
    pub history: Vec<ChatTurn>,
    pub message: String,
}

/// Produces a free-text chatbot reply using a generative model.
pub trait ReplyGenerator: Send + Sync + Clone {
    fn generate(
        &self,
        request: &ReplyRequest,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// A WhatsApp gateway hosting one session per tenant bot.
pub trait MessagingGateway: Send + Sync + Clone {
    fn start_session(&self, session: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn stop_session(&self, session: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Current pairing QR code, or `None` when the session is not waiting
    /// for a scan.
    fn fetch_qr(
        &self,
        session: &str,
    ) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    fn send_text(
        &self,
        session: &str,
        chat_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Persistence the chatbot pipeline and bot manager rely on.
pub trait BotStore: Send + Sync + Clone {
    fn find_bot_by_session(
        &self,
        session_name: &str,
    ) -> impl Future<Output = Result<Option<UserBot>, AppError>> + Send;

    /// Update status and QR code together; `qr_code = None` clears it.
    fn set_bot_status(
        &self,
        bot_id: Uuid,
        status: BotStatus,
        qr_code: Option<&str>,
    ) -> impl Future<Output = Result<UserBot, AppError>> + Send;

    /// Find or create the conversation with `contact_phone`. The flag is
    /// true when the conversation was created by this call.
    fn upsert_conversation(
        &self,
        bot: &UserBot,
        contact_phone: &str,
        contact_name: Option<&str>,
    ) -> impl Future<Output = Result<(Conversation, bool), AppError>> + Send;

    fn save_message(
        &self,
        message: &NewBotMessage,
    ) -> impl Future<Output = Result<BotMessage, AppError>> + Send;

    /// Last `limit` messages of a conversation, oldest first.
    fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<BotMessage>, AppError>> + Send;

    fn active_rules(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, AppError>> + Send;

    fn record_execution(
        &self,
        rule_id: Uuid,
        conversation_id: Uuid,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Active products, used as menu context for AI replies.
    fn menu(&self, user_id: Uuid) -> impl Future<Output = Result<Vec<Product>, AppError>> + Send;

    fn customer(
        &self,
        user_id: Uuid,
        customer_id: Uuid,
    ) -> impl Future<Output = Result<Option<Customer>, AppError>> + Send;
}
