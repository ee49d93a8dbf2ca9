//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};

use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use crate::bot::{
    AutomationRule, BotMessage, BotStatus, Conversation, MatchKind, NewBotMessage, RuleTrigger,
    UserBot,
};
use crate::catalog::Product;
use crate::customer::Customer;
use crate::error::AppError;
use crate::traits::{BotStore, MessagingGateway, ReplyGenerator, ReplyRequest};

pub const TEST_SESSION: &str = "user-test";

/// A bot on [`TEST_SESSION`] owned by a fresh user.
pub fn make_test_bot(status: BotStatus, ai_enabled: bool) -> UserBot {
    UserBot {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        session_name: TEST_SESSION.to_string(),
        status,
        qr_code: None,
        phone_number: None,
        ai_enabled,
        ai_prompt: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// MockGateway
// ---------------------------------------------------------------------------

/// Recorded send: (session, chat_id, text).
pub type SentMessage = (String, String, String);

#[derive(Clone)]
pub struct MockGateway {
    qr: Arc<Mutex<Option<String>>>,
    send_error: Arc<Mutex<Option<AppError>>>,
    pub started: Arc<Mutex<Vec<String>>>,
    pub stopped: Arc<Mutex<Vec<String>>>,
    pub sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl MockGateway {
    /// Gateway that accepts everything and has no QR code to offer.
    pub fn new() -> Self {
        Self {
            qr: Arc::new(Mutex::new(None)),
            send_error: Arc::new(Mutex::new(None)),
            started: Arc::new(Mutex::new(Vec::new())),
            stopped: Arc::new(Mutex::new(Vec::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_qr(self, qr: &str) -> Self {
        *self.qr.lock().unwrap() = Some(qr.to_string());
        self
    }

    /// Gateway whose next `send_text` fails.
    pub fn with_send_error(error: AppError) -> Self {
        let gateway = Self::new();
        *gateway.send_error.lock().unwrap() = Some(error);
        gateway
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagingGateway for MockGateway {
    async fn start_session(&self, session: &str) -> Result<(), AppError> {
        self.started.lock().unwrap().push(session.to_string());
        Ok(())
    }

    async fn stop_session(&self, session: &str) -> Result<(), AppError> {
        self.stopped.lock().unwrap().push(session.to_string());
        Ok(())
    }

    async fn fetch_qr(&self, _session: &str) -> Result<Option<String>, AppError> {
        Ok(self.qr.lock().unwrap().clone())
    }

    async fn send_text(&self, session: &str, chat_id: &str, text: &str) -> Result<(), AppError> {
        if let Some(e) = self.send_error.lock().unwrap().take() {
            return Err(e);
        }
        self.sent
            .lock()
            .unwrap()
            .push((session.to_string(), chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockResponder
// ---------------------------------------------------------------------------

/// Reply generator returning a fixed answer and recording every request.
#[derive(Clone)]
pub struct MockResponder {
    reply: Arc<Mutex<Result<String, AppError>>>,
    pub requests: Arc<Mutex<Vec<ReplyRequest>>>,
}

impl MockResponder {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Ok(reply.to_string()))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Err(error))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ReplyGenerator for MockResponder {
    async fn generate(&self, request: &ReplyRequest) -> Result<String, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        match &*self.reply.lock().unwrap() {
            Ok(text) => Ok(text.clone()),
            Err(e) => Err(AppError::Generic(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryBotStore
// ---------------------------------------------------------------------------

/// In-memory [`BotStore`] holding a single bot.
#[derive(Clone)]
pub struct MemoryBotStore {
    pub bot: Arc<Mutex<UserBot>>,
    pub conversations: Arc<Mutex<Vec<Conversation>>>,
    pub messages: Arc<Mutex<Vec<BotMessage>>>,
    pub rules: Arc<Mutex<Vec<AutomationRule>>>,
    /// Recorded rule executions: (rule_id, conversation_id).
    pub executions: Arc<Mutex<Vec<(Uuid, Uuid)>>>,
    pub products: Arc<Mutex<Vec<Product>>>,
    pub customers: Arc<Mutex<Vec<Customer>>>,
}

impl MemoryBotStore {
    pub fn with_bot(bot: UserBot) -> Self {
        Self {
            bot: Arc::new(Mutex::new(bot)),
            conversations: Arc::new(Mutex::new(Vec::new())),
            messages: Arc::new(Mutex::new(Vec::new())),
            rules: Arc::new(Mutex::new(Vec::new())),
            executions: Arc::new(Mutex::new(Vec::new())),
            products: Arc::new(Mutex::new(Vec::new())),
            customers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an active rule. Each rule is created one second after the previous one.
    pub fn add_rule(
        &self,
        name: &str,
        trigger: RuleTrigger,
        match_kind: MatchKind,
        pattern: &str,
        response: &str,
    ) -> AutomationRule {
        let mut rules = self.rules.lock().unwrap();
        let rule = AutomationRule {
            id: Uuid::new_v4(),
            name: name.to_string(),
            trigger,
            match_kind,
            pattern: pattern.to_string(),
            response: response.to_string(),
            priority: 0,
            active: true,
            created_at: Utc::now() + TimeDelta::seconds(rules.len() as i64),
        };
        rules.push(rule.clone());
        rule
    }

    pub fn add_product(&self, name: &str, price_cents: i64) -> Product {
        let product = Product {
            id: Uuid::new_v4(),
            category_id: None,
            name: name.to_string(),
            description: None,
            price_cents,
            cost_cents: 0,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.products.lock().unwrap().push(product.clone());
        product
    }

    pub fn add_customer(&self, name: &str, phone: &str, points: i64) -> Customer {
        let customer = Customer {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: Some(phone.to_string()),
            email: None,
            points,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.customers.lock().unwrap().push(customer.clone());
        customer
    }
}

impl BotStore for MemoryBotStore {
    async fn find_bot_by_session(&self, session_name: &str) -> Result<Option<UserBot>, AppError> {
        let bot = self.bot.lock().unwrap();
        Ok((bot.session_name == session_name).then(|| bot.clone()))
    }

    async fn set_bot_status(
        &self,
        bot_id: Uuid,
        status: BotStatus,
        qr_code: Option<&str>,
    ) -> Result<UserBot, AppError> {
        let mut bot = self.bot.lock().unwrap();
        if bot.id != bot_id {
            return Err(AppError::NotFound(format!("Bot not found: {}", bot_id)));
        }
        bot.status = status;
        bot.qr_code = qr_code.map(str::to_string);
        bot.updated_at = Utc::now();
        Ok(bot.clone())
    }

    async fn upsert_conversation(
        &self,
        bot: &UserBot,
        contact_phone: &str,
        contact_name: Option<&str>,
    ) -> Result<(Conversation, bool), AppError> {
        let mut conversations = self.conversations.lock().unwrap();
        if let Some(existing) = conversations
            .iter_mut()
            .find(|c| c.bot_id == bot.id && c.contact_phone == contact_phone)
        {
            existing.last_message_at = Utc::now();
            if let Some(name) = contact_name {
                existing.contact_name = Some(name.to_string());
            }
            return Ok((existing.clone(), false));
        }

        let customer_id = self
            .customers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.phone.as_deref() == Some(contact_phone))
            .map(|c| c.id);

        let conversation = Conversation {
            id: Uuid::new_v4(),
            bot_id: bot.id,
            contact_phone: contact_phone.to_string(),
            contact_name: contact_name.map(str::to_string),
            customer_id,
            last_message_at: Utc::now(),
            created_at: Utc::now(),
        };
        conversations.push(conversation.clone());
        Ok((conversation, true))
    }

    async fn save_message(&self, message: &NewBotMessage) -> Result<BotMessage, AppError> {
        let saved = BotMessage {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id,
            direction: message.direction,
            source: message.source,
            body: message.body.clone(),
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(saved.clone());
        Ok(saved)
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> Result<Vec<BotMessage>, AppError> {
        let messages: Vec<BotMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).collect())
    }

    async fn active_rules(&self, _user_id: Uuid) -> Result<Vec<AutomationRule>, AppError> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.active)
            .cloned()
            .collect())
    }

    async fn record_execution(&self, rule_id: Uuid, conversation_id: Uuid) -> Result<(), AppError> {
        self.executions
            .lock()
            .unwrap()
            .push((rule_id, conversation_id));
        Ok(())
    }

    async fn menu(&self, _user_id: Uuid) -> Result<Vec<Product>, AppError> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.active)
            .cloned()
            .collect())
    }

    async fn customer(
        &self,
        _user_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, AppError> {
        Ok(self
            .customers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == customer_id)
            .cloned())
    }
}
