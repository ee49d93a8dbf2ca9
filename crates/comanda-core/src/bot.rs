//! WhatsApp bot records: the per-tenant bot, its conversations, messages,
//! and the automation rules that answer them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Connection state of a tenant's WhatsApp session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Disconnected,
    Starting,
    /// Waiting for the owner to scan the pairing QR code.
    QrPending,
    Connected,
    Failed,
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotStatus::Disconnected => "disconnected",
            BotStatus::Starting => "starting",
            BotStatus::QrPending => "qr_pending",
            BotStatus::Connected => "connected",
            BotStatus::Failed => "failed",
        }
    }

    /// Map a gateway session status (`STARTING`, `SCAN_QR_CODE`, `WORKING`,
    /// `FAILED`, `STOPPED`) to a bot status.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status.to_uppercase().as_str() {
            "STARTING" => Some(BotStatus::Starting),
            "SCAN_QR_CODE" => Some(BotStatus::QrPending),
            "WORKING" => Some(BotStatus::Connected),
            "FAILED" => Some(BotStatus::Failed),
            "STOPPED" => Some(BotStatus::Disconnected),
            _ => None,
        }
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disconnected" => Ok(BotStatus::Disconnected),
            "starting" => Ok(BotStatus::Starting),
            "qr_pending" => Ok(BotStatus::QrPending),
            "connected" => Ok(BotStatus::Connected),
            "failed" => Ok(BotStatus::Failed),
            _ => Err(format!("Unknown bot status: {}", s)),
        }
    }
}

/// A tenant's WhatsApp bot. One per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserBot {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Session name on the WhatsApp gateway.
    pub session_name: String,
    pub status: BotStatus,
    pub qr_code: Option<String>,
    pub phone_number: Option<String>,
    pub ai_enabled: bool,
    pub ai_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Gateway session name for a user's bot.
pub fn session_name_for(user_id: Uuid) -> String {
    format!("user-{}", user_id.simple())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BotSettings {
    pub ai_enabled: bool,
    pub ai_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Conversation {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub contact_phone: String,
    pub contact_name: Option<String>,
    pub customer_id: Option<Uuid>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageDirection::Inbound => "inbound",
            MessageDirection::Outbound => "outbound",
        }
    }
}

impl FromStr for MessageDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(MessageDirection::Inbound),
            "outbound" => Ok(MessageDirection::Outbound),
            _ => Err(format!("Unknown message direction: {}", s)),
        }
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Contact,
    Rule,
    Ai,
    Manual,
}

impl MessageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSource::Contact => "contact",
            MessageSource::Rule => "rule",
            MessageSource::Ai => "ai",
            MessageSource::Manual => "manual",
        }
    }
}

impl FromStr for MessageSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contact" => Ok(MessageSource::Contact),
            "rule" => Ok(MessageSource::Rule),
            "ai" => Ok(MessageSource::Ai),
            "manual" => Ok(MessageSource::Manual),
            _ => Err(format!("Unknown message source: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BotMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub direction: MessageDirection,
    pub source: MessageSource,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBotMessage {
    pub conversation_id: Uuid,
    pub direction: MessageDirection,
    pub source: MessageSource,
    pub body: String,
}

impl NewBotMessage {
    pub fn inbound(conversation_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            conversation_id,
            direction: MessageDirection::Inbound,
            source: MessageSource::Contact,
            body: body.into(),
        }
    }

    pub fn outbound(conversation_id: Uuid, source: MessageSource, body: impl Into<String>) -> Self {
        Self {
            conversation_id,
            direction: MessageDirection::Outbound,
            source,
            body: body.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Automation rules
// ---------------------------------------------------------------------------

/// When a rule is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RuleTrigger {
    /// Incoming text matches `pattern`.
    Keyword,
    /// First message of a new conversation.
    Welcome,
}

impl RuleTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleTrigger::Keyword => "keyword",
            RuleTrigger::Welcome => "welcome",
        }
    }
}

impl FromStr for RuleTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyword" => Ok(RuleTrigger::Keyword),
            "welcome" => Ok(RuleTrigger::Welcome),
            _ => Err(format!("Unknown rule trigger: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Contains,
    StartsWith,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Contains => "contains",
            MatchKind::StartsWith => "starts_with",
        }
    }

    /// Case-insensitive comparison after trimming both sides.
    pub fn matches(&self, pattern: &str, text: &str) -> bool {
        let pattern = pattern.trim().to_lowercase();
        let text = text.trim().to_lowercase();
        if pattern.is_empty() {
            return false;
        }
        match self {
            MatchKind::Exact => text == pattern,
            MatchKind::Contains => text.contains(&pattern),
            MatchKind::StartsWith => text.starts_with(&pattern),
        }
    }
}

impl FromStr for MatchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(MatchKind::Exact),
            "contains" => Ok(MatchKind::Contains),
            "starts_with" => Ok(MatchKind::StartsWith),
            _ => Err(format!("Unknown match kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AutomationRule {
    pub id: Uuid,
    pub name: String,
    pub trigger: RuleTrigger,
    pub match_kind: MatchKind,
    pub pattern: String,
    pub response: String,
    pub priority: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AutomationRuleInput {
    pub name: String,
    pub trigger: RuleTrigger,
    #[serde(default = "default_match_kind")]
    pub match_kind: MatchKind,
    #[serde(default)]
    pub pattern: String,
    pub response: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_match_kind() -> MatchKind {
    MatchKind::Contains
}

fn default_active() -> bool {
    true
}

impl AutomationRuleInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Rule name must not be empty".into(),
            ));
        }
        if self.response.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Rule response must not be empty".into(),
            ));
        }
        if self.trigger == RuleTrigger::Keyword && self.pattern.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Keyword rules require a pattern".into(),
            ));
        }
        Ok(())
    }
}

/// Pick the rule that answers `text`.
///
/// Active rules are tried by descending priority, oldest first on ties.
/// Welcome rules only fire on the first message of a conversation.
pub fn find_matching_rule<'a>(
    rules: &'a [AutomationRule],
    text: &str,
    first_contact: bool,
) -> Option<&'a AutomationRule> {
    let mut candidates: Vec<&AutomationRule> = rules.iter().filter(|r| r.active).collect();
    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    candidates.into_iter().find(|rule| match rule.trigger {
        RuleTrigger::Welcome => first_contact,
        RuleTrigger::Keyword => rule.match_kind.matches(&rule.pattern, text),
    })
}
