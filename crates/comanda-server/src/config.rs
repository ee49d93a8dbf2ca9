use comanda_client::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use comanda_core::AppError;
use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SESSION_TTL_HOURS: i64 = 72;
/// One year.
const MAX_SESSION_TTL_HOURS: i64 = 8_760;
const DEFAULT_WHATSAPP_URL: &str = "http://localhost:3001";

/// Server settings read from `COMANDA_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cookie_secure: bool,
    pub session_ttl_hours: i64,
    /// Shared secret the gateway sends in `x-webhook-token`.
    pub webhook_token: String,
    /// Public URL of `/webhooks/whatsapp`, registered on every started session.
    pub webhook_url: Option<String>,
    pub whatsapp_url: String,
    pub whatsapp_api_key: Option<String>,
    /// AI replies are disabled without a key.
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_base_url: String,
}

impl ServerConfig {
    /// Defaults for everything but the webhook token.
    pub fn new(webhook_token: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            cookie_secure: true,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            webhook_token: webhook_token.into(),
            webhook_url: None,
            whatsapp_url: DEFAULT_WHATSAPP_URL.to_string(),
            whatsapp_api_key: None,
            llm_api_key: None,
            llm_model: DEFAULT_MODEL.to_string(),
            llm_base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let webhook_token = var("COMANDA_WEBHOOK_TOKEN").ok_or_else(|| {
            AppError::ConfigError("COMANDA_WEBHOOK_TOKEN must be set".into())
        })?;
        let mut config = Self::new(webhook_token);

        if let Some(raw) = var("COMANDA_PORT") {
            config.port = raw.parse().map_err(|_| {
                AppError::ConfigError(format!("Invalid COMANDA_PORT '{raw}'"))
            })?;
        }
        if let Some(raw) = var("COMANDA_COOKIE_SECURE") {
            config.cookie_secure = parse_bool("COMANDA_COOKIE_SECURE", &raw)?;
        }
        if let Some(raw) = var("COMANDA_SESSION_TTL_HOURS") {
            config.session_ttl_hours = match raw.parse::<i64>() {
                Ok(hours) if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) => hours,
                _ => {
                    return Err(AppError::ConfigError(format!(
                        "Invalid COMANDA_SESSION_TTL_HOURS '{raw}': must be between 1 and {MAX_SESSION_TTL_HOURS}"
                    )));
                }
            };
        }
        if let Some(url) = var("COMANDA_WEBHOOK_URL") {
            config.webhook_url = Some(validate_url("COMANDA_WEBHOOK_URL", url)?);
        }
        if let Some(url) = var("COMANDA_WHATSAPP_URL") {
            config.whatsapp_url = validate_url("COMANDA_WHATSAPP_URL", url)?;
        }
        config.whatsapp_api_key = var("COMANDA_WHATSAPP_API_KEY");
        config.llm_api_key = var("COMANDA_LLM_API_KEY");
        if let Some(model) = var("COMANDA_LLM_MODEL") {
            config.llm_model = model;
        }
        if let Some(url) = var("COMANDA_LLM_BASE_URL") {
            config.llm_base_url = validate_url("COMANDA_LLM_BASE_URL", url)?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, AppError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::ConfigError(format!("Invalid {key} '{raw}': expected true or false"))),
    }
}

fn validate_url(key: &str, raw: String) -> Result<String, AppError> {
    Url::parse(&raw).map_err(|e| AppError::ConfigError(format!("Invalid {key} '{raw}': {e}")))?;
    Ok(raw)
}
