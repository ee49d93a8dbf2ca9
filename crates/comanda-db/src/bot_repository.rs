use chrono::{DateTime, Utc};
use comanda_core::bot::{
    AutomationRule, AutomationRuleInput, BotMessage, BotSettings, BotStatus, Conversation,
    MatchKind, MessageDirection, MessageSource, NewBotMessage, RuleTrigger, UserBot,
    session_name_for,
};
use comanda_core::catalog::Product;
use comanda_core::customer::Customer;
use comanda_core::error::AppError;
use comanda_core::traits::BotStore;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::catalog_repository::CatalogRepository;
use crate::customer_repository::CustomerRepository;
use crate::error::{db_err, not_found};

const BOT_COLUMNS: &str = "id, user_id, session_name, status, qr_code, phone_number, ai_enabled, ai_prompt, created_at, updated_at";
const RULE_COLUMNS: &str =
    "id, name, trigger, match_kind, pattern, response, priority, active, created_at";
const CONVERSATION_COLUMNS: &str =
    "id, bot_id, contact_phone, contact_name, customer_id, last_message_at, created_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, direction, source, body, created_at";

/// WhatsApp bots, their automation rules, conversations, and messages.
#[derive(Clone)]
pub struct BotRepository {
    pool: Pool<Postgres>,
}

impl BotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // -- Bot --

    /// The user's bot, created on first access in the `disconnected` state.
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<UserBot, AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_bots (user_id, session_name)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(session_name_for(user_id))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row = sqlx::query_as::<_, BotRow>(&format!(
            "SELECT {BOT_COLUMNS} FROM user_bots WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn update_settings(
        &self,
        user_id: Uuid,
        settings: &BotSettings,
    ) -> Result<UserBot, AppError> {
        let bot = self.get_or_create(user_id).await?;
        let prompt = settings
            .ai_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let row = sqlx::query_as::<_, BotRow>(&format!(
            r#"
            UPDATE user_bots
            SET ai_enabled = $2, ai_prompt = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {BOT_COLUMNS}
            "#
        ))
        .bind(bot.id)
        .bind(settings.ai_enabled)
        .bind(prompt)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn find_by_session(&self, session_name: &str) -> Result<Option<UserBot>, AppError> {
        let row = sqlx::query_as::<_, BotRow>(&format!(
            "SELECT {BOT_COLUMNS} FROM user_bots WHERE session_name = $1"
        ))
        .bind(session_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn set_status(
        &self,
        bot_id: Uuid,
        status: BotStatus,
        qr_code: Option<&str>,
    ) -> Result<UserBot, AppError> {
        let row = sqlx::query_as::<_, BotRow>(&format!(
            r#"
            UPDATE user_bots
            SET status = $2, qr_code = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {BOT_COLUMNS}
            "#
        ))
        .bind(bot_id)
        .bind(status.as_str())
        .bind(qr_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| not_found("Bot", bot_id))
    }

    // -- Automation rules --

    pub async fn list_rules(&self, user_id: Uuid) -> Result<Vec<AutomationRule>, AppError> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM automation_rules
            WHERE user_id = $1
            ORDER BY priority DESC, created_at
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn active_rules(&self, user_id: Uuid) -> Result<Vec<AutomationRule>, AppError> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM automation_rules
            WHERE user_id = $1 AND active
            ORDER BY priority DESC, created_at
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create_rule(
        &self,
        user_id: Uuid,
        input: &AutomationRuleInput,
    ) -> Result<AutomationRule, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            r#"
            INSERT INTO automation_rules (user_id, name, trigger, match_kind, pattern, response, priority, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(input.name.trim())
        .bind(input.trigger.as_str())
        .bind(input.match_kind.as_str())
        .bind(input.pattern.trim())
        .bind(&input.response)
        .bind(input.priority)
        .bind(input.active)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn update_rule(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: &AutomationRuleInput,
    ) -> Result<AutomationRule, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            r#"
            UPDATE automation_rules
            SET name = $3, trigger = $4, match_kind = $5, pattern = $6, response = $7,
                priority = $8, active = $9
            WHERE id = $1 AND user_id = $2
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.name.trim())
        .bind(input.trigger.as_str())
        .bind(input.match_kind.as_str())
        .bind(input.pattern.trim())
        .bind(&input.response)
        .bind(input.priority)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into)
            .ok_or_else(|| not_found("Automation rule", id))
    }

    pub async fn delete_rule(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM automation_rules WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Automation rule", id));
        }
        Ok(())
    }

    /// Number of times a rule has fired.
    pub async fn execution_count(&self, rule_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM automation_executions WHERE rule_id = $1")
                .bind(rule_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(count)
    }

    // -- Conversations --

    /// Conversations of the user's bot, most recent activity first.
    pub async fn list_conversations(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Conversation>, AppError> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT c.id, c.bot_id, c.contact_phone, c.contact_name, c.customer_id,
                   c.last_message_at, c.created_at
            FROM bot_conversations c
            JOIN user_bots b ON b.id = c.bot_id
            WHERE b.user_id = $1
            ORDER BY c.last_message_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_conversation(&self, user_id: Uuid, id: Uuid) -> Result<Conversation, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT c.id, c.bot_id, c.contact_phone, c.contact_name, c.customer_id,
                   c.last_message_at, c.created_at
            FROM bot_conversations c
            JOIN user_bots b ON b.id = c.bot_id
            WHERE c.id = $1 AND b.user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into)
            .ok_or_else(|| not_found("Conversation", id))
    }

    pub async fn upsert_conversation(
        &self,
        bot: &UserBot,
        contact_phone: &str,
        contact_name: Option<&str>,
    ) -> Result<(Conversation, bool), AppError> {
        let row = sqlx::query_as::<_, UpsertedConversationRow>(&format!(
            r#"
            INSERT INTO bot_conversations (bot_id, contact_phone, contact_name, customer_id)
            VALUES ($1, $2, $3,
                    (SELECT id FROM customers WHERE user_id = $4 AND phone = $2))
            ON CONFLICT (bot_id, contact_phone) DO UPDATE
            SET contact_name = COALESCE(EXCLUDED.contact_name, bot_conversations.contact_name),
                customer_id = COALESCE(bot_conversations.customer_id, EXCLUDED.customer_id),
                last_message_at = NOW()
            RETURNING {CONVERSATION_COLUMNS}, (xmax = 0) AS inserted
            "#
        ))
        .bind(bot.id)
        .bind(contact_phone)
        .bind(contact_name)
        .bind(bot.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let inserted = row.inserted;
        Ok((row.into(), inserted))
    }

    /// Messages of a conversation, oldest first, at most `limit` of the latest.
    pub async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<BotMessage>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT * FROM (
                SELECT {MESSAGE_COLUMNS}
                FROM bot_messages
                WHERE conversation_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            ) latest
            ORDER BY created_at ASC
            "#
        ))
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn save_message(&self, message: &NewBotMessage) -> Result<BotMessage, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            INSERT INTO bot_messages (conversation_id, direction, source, body)
            VALUES ($1, $2, $3, $4)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(message.conversation_id)
        .bind(message.direction.as_str())
        .bind(message.source.as_str())
        .bind(&message.body)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("UPDATE bot_conversations SET last_message_at = $2 WHERE id = $1")
            .bind(message.conversation_id)
            .bind(row.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn record_execution(&self, rule_id: Uuid, conversation_id: Uuid) -> Result<(), AppError> {
        sqlx::query("INSERT INTO automation_executions (rule_id, conversation_id) VALUES ($1, $2)")
            .bind(rule_id)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

// -- Trait implementation --

impl BotStore for BotRepository {
    async fn find_bot_by_session(&self, session_name: &str) -> Result<Option<UserBot>, AppError> {
        self.find_by_session(session_name).await
    }

    async fn set_bot_status(
        &self,
        bot_id: Uuid,
        status: BotStatus,
        qr_code: Option<&str>,
    ) -> Result<UserBot, AppError> {
        self.set_status(bot_id, status, qr_code).await
    }

    async fn upsert_conversation(
        &self,
        bot: &UserBot,
        contact_phone: &str,
        contact_name: Option<&str>,
    ) -> Result<(Conversation, bool), AppError> {
        BotRepository::upsert_conversation(self, bot, contact_phone, contact_name).await
    }

    async fn save_message(&self, message: &NewBotMessage) -> Result<BotMessage, AppError> {
        BotRepository::save_message(self, message).await
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> Result<Vec<BotMessage>, AppError> {
        BotRepository::recent_messages(self, conversation_id, limit as i64).await
    }

    async fn active_rules(&self, user_id: Uuid) -> Result<Vec<AutomationRule>, AppError> {
        BotRepository::active_rules(self, user_id).await
    }

    async fn record_execution(&self, rule_id: Uuid, conversation_id: Uuid) -> Result<(), AppError> {
        BotRepository::record_execution(self, rule_id, conversation_id).await
    }

    async fn menu(&self, user_id: Uuid) -> Result<Vec<Product>, AppError> {
        CatalogRepository::new(self.pool.clone()).menu(user_id).await
    }

    async fn customer(&self, user_id: Uuid, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
        CustomerRepository::new(self.pool.clone())
            .find(user_id, customer_id)
            .await
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct BotRow {
    id: Uuid,
    user_id: Uuid,
    session_name: String,
    status: String,
    qr_code: Option<String>,
    phone_number: Option<String>,
    ai_enabled: bool,
    ai_prompt: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BotRow> for UserBot {
    fn from(row: BotRow) -> Self {
        UserBot {
            id: row.id,
            user_id: row.user_id,
            session_name: row.session_name,
            status: row.status.parse().unwrap_or(BotStatus::Disconnected),
            qr_code: row.qr_code,
            phone_number: row.phone_number,
            ai_enabled: row.ai_enabled,
            ai_prompt: row.ai_prompt,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    name: String,
    trigger: String,
    match_kind: String,
    pattern: String,
    response: String,
    priority: i32,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<RuleRow> for AutomationRule {
    fn from(row: RuleRow) -> Self {
        AutomationRule {
            id: row.id,
            name: row.name,
            trigger: row.trigger.parse().unwrap_or(RuleTrigger::Keyword),
            match_kind: row.match_kind.parse().unwrap_or(MatchKind::Contains),
            pattern: row.pattern,
            response: row.response,
            priority: row.priority,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    bot_id: Uuid,
    contact_phone: String,
    contact_name: Option<String>,
    customer_id: Option<Uuid>,
    last_message_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            bot_id: row.bot_id,
            contact_phone: row.contact_phone,
            contact_name: row.contact_name,
            customer_id: row.customer_id,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UpsertedConversationRow {
    #[sqlx(flatten)]
    conversation: ConversationRow,
    inserted: bool,
}

impl From<UpsertedConversationRow> for Conversation {
    fn from(row: UpsertedConversationRow) -> Self {
        row.conversation.into()
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    direction: String,
    source: String,
    body: String,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for BotMessage {
    fn from(row: MessageRow) -> Self {
        BotMessage {
            id: row.id,
            conversation_id: row.conversation_id,
            direction: row.direction.parse().unwrap_or(MessageDirection::Inbound),
            source: row.source.parse().unwrap_or(MessageSource::Contact),
            body: row.body,
            created_at: row.created_at,
        }
    }
}
