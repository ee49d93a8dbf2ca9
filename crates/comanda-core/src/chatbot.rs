use uuid::Uuid;

use crate::bot::{
    BotMessage, Conversation, MessageDirection, MessageSource, NewBotMessage, UserBot,
    find_matching_rule,
};
use crate::catalog::Product;
use crate::customer::Customer;
use crate::error::AppError;
use crate::traits::{BotStore, ChatRole, ChatTurn, MessagingGateway, ReplyGenerator, ReplyRequest};
use crate::util::{chat_id_for, format_cents, is_group_chat, normalize_phone};

/// Number of earlier messages passed to the model as context.
pub const HISTORY_LIMIT: usize = 10;

pub const DEFAULT_AI_PROMPT: &str = "You are the WhatsApp assistant of a restaurant. Answer customers briefly and politely, in the language they write in. Only talk about the restaurant, its menu, orders, and loyalty points. If you do not know something, say so and suggest calling the restaurant.";

/// A text message delivered to a bot by the gateway webhook.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub session: String,
    /// Sender chat id, e.g. `5511999990000@c.us`.
    pub chat_id: String,
    pub contact_name: Option<String>,
    pub body: String,
    /// Messages the bot's own number sent.
    pub from_me: bool,
}

/// What happened to an incoming message that reached a conversation.
#[derive(Debug, Clone)]
pub struct HandledMessage {
    pub conversation_id: Uuid,
    pub inbound: BotMessage,
    pub reply: Option<BotMessage>,
}

/// Answers incoming WhatsApp messages: store → rule match → AI fallback → send → store.
///
/// Generic over the gateway, the reply generator, and the store so the whole
/// pipeline runs against mocks in tests.
#[derive(Clone)]
pub struct ChatbotService<G, R, S>
where
    G: MessagingGateway,
    R: ReplyGenerator,
    S: BotStore,
{
    gateway: G,
    responder: Option<R>,
    store: S,
}

impl<G, R, S> ChatbotService<G, R, S>
where
    G: MessagingGateway,
    R: ReplyGenerator,
    S: BotStore,
{
    /// Create a service that only answers with automation rules.
    pub fn new(gateway: G, store: S) -> Self {
        Self {
            gateway,
            responder: None,
            store,
        }
    }

    /// Enable AI replies for bots that have `ai_enabled` set.
    pub fn with_responder(mut self, responder: R) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn ai_available(&self) -> bool {
        self.responder.is_some()
    }

    /// Process one incoming message.
    ///
    /// Returns `None` when the message is not for a conversation: own
    /// messages, group chats, empty bodies, or an unknown session.
    pub async fn handle_incoming(
        &self,
        message: &IncomingMessage,
    ) -> Result<Option<HandledMessage>, AppError> {
        if message.from_me || is_group_chat(&message.chat_id) || message.body.trim().is_empty() {
            tracing::debug!(chat_id = %message.chat_id, "Ignoring non-conversational message");
            return Ok(None);
        }

        let Some(bot) = self.store.find_bot_by_session(&message.session).await? else {
            tracing::info!(session = %message.session, "Message for unknown session ignored");
            return Ok(None);
        };

        let phone = normalize_phone(&message.chat_id);
        if phone.is_empty() {
            return Ok(None);
        }

        let (conversation, is_new) = self
            .store
            .upsert_conversation(&bot, &phone, message.contact_name.as_deref())
            .await?;

        let inbound = self
            .store
            .save_message(&NewBotMessage::inbound(conversation.id, message.body.trim()))
            .await?;

        let reply = match self.pick_reply(&bot, &conversation, &inbound, is_new).await? {
            Some((source, text)) => Some(self.deliver(&bot, &conversation, source, &text).await?),
            None => None,
        };

        Ok(Some(HandledMessage {
            conversation_id: conversation.id,
            inbound,
            reply,
        }))
    }

    /// Send a reply typed by staff from the dashboard.
    pub async fn send_manual(
        &self,
        bot: &UserBot,
        conversation: &Conversation,
        text: &str,
    ) -> Result<BotMessage, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Message text must not be empty".into(),
            ));
        }
        if conversation.bot_id != bot.id {
            return Err(AppError::NotFound(format!(
                "Conversation not found: {}",
                conversation.id
            )));
        }
        self.deliver(bot, conversation, MessageSource::Manual, text.trim())
            .await
    }

    async fn pick_reply(
        &self,
        bot: &UserBot,
        conversation: &Conversation,
        inbound: &BotMessage,
        is_new: bool,
    ) -> Result<Option<(MessageSource, String)>, AppError> {
        let rules = self.store.active_rules(bot.user_id).await?;
        if let Some(rule) = find_matching_rule(&rules, &inbound.body, is_new) {
            tracing::info!(rule = %rule.name, conversation = %conversation.id, "Automation rule matched");
            self.store.record_execution(rule.id, conversation.id).await?;
            return Ok(Some((MessageSource::Rule, rule.response.clone())));
        }

        let Some(responder) = self.responder.as_ref().filter(|_| bot.ai_enabled) else {
            return Ok(None);
        };

        let request = self.build_request(bot, conversation, inbound).await?;
        match responder.generate(&request).await {
            Ok(text) if !text.trim().is_empty() => Ok(Some((MessageSource::Ai, text.trim().to_string()))),
            Ok(_) => {
                tracing::warn!(conversation = %conversation.id, "AI returned an empty reply");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(conversation = %conversation.id, error = %e, "AI reply failed");
                Ok(None)
            }
        }
    }

    async fn build_request(
        &self,
        bot: &UserBot,
        conversation: &Conversation,
        inbound: &BotMessage,
    ) -> Result<ReplyRequest, AppError> {
        let menu = self.store.menu(bot.user_id).await?;
        let customer = match conversation.customer_id {
            Some(id) => self.store.customer(bot.user_id, id).await?,
            None => None,
        };

        let mut history: Vec<ChatTurn> = self
            .store
            .recent_messages(conversation.id, HISTORY_LIMIT + 1)
            .await?
            .into_iter()
            .filter(|m| m.id != inbound.id)
            .map(|m| ChatTurn {
                role: match m.direction {
                    MessageDirection::Inbound => ChatRole::User,
                    MessageDirection::Outbound => ChatRole::Assistant,
                },
                content: m.body,
            })
            .collect();
        if history.len() > HISTORY_LIMIT {
            history.drain(..history.len() - HISTORY_LIMIT);
        }

        Ok(ReplyRequest {
            system_prompt: build_system_prompt(
                bot.ai_prompt.as_deref(),
                &menu,
                customer.as_ref(),
                conversation.contact_name.as_deref(),
            ),
            history,
            message: inbound.body.clone(),
        })
    }

    async fn deliver(
        &self,
        bot: &UserBot,
        conversation: &Conversation,
        source: MessageSource,
        text: &str,
    ) -> Result<BotMessage, AppError> {
        self.gateway
            .send_text(&bot.session_name, &chat_id_for(&conversation.contact_phone), text)
            .await?;

        self.store
            .save_message(&NewBotMessage::outbound(conversation.id, source, text))
            .await
    }
}

/// System prompt: the tenant's instructions followed by menu and customer context.
pub fn build_system_prompt(
    ai_prompt: Option<&str>,
    menu: &[Product],
    customer: Option<&Customer>,
    contact_name: Option<&str>,
) -> String {
    let mut prompt = ai_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_AI_PROMPT)
        .to_string();

    if !menu.is_empty() {
        prompt.push_str("\n\nMenu:\n");
        for product in menu {
            prompt.push_str(&format!(
                "- {}: {}",
                product.name,
                format_cents(product.price_cents)
            ));
            if let Some(description) = product.description.as_deref().filter(|d| !d.is_empty()) {
                prompt.push_str(&format!(" ({description})"));
            }
            prompt.push('\n');
        }
    }

    match (customer, contact_name) {
        (Some(customer), _) => prompt.push_str(&format!(
            "\nYou are talking to {}, a registered customer with {} loyalty points.",
            customer.name, customer.points
        )),
        (None, Some(name)) => prompt.push_str(&format!("\nYou are talking to {name}.")),
        (None, None) => {}
    }

    prompt
}
