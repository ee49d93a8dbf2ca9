use std::time::Duration;

use comanda_client::{HttpGateway, OpenAiResponder};
use comanda_core::{AppError, BotManager, ChatbotService};
use comanda_db::{BotRepository, Database};

use crate::auth::SessionCache;
use crate::config::ServerConfig;

const LLM_TIMEOUT: Duration = Duration::from_secs(30);

pub type Chatbot = ChatbotService<HttpGateway, OpenAiResponder, BotRepository>;
pub type Bots = BotManager<HttpGateway, BotRepository>;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Database,
    pub sessions: SessionCache,
    pub cookie_secure: bool,
    pub session_ttl_hours: i64,
    pub webhook_token: String,
    pub bots: Bots,
    pub chatbot: Chatbot,
}

impl AppState {
    /// Wire the gateway and reply clients from `config` around `db`.
    pub fn new(db: Database, config: &ServerConfig) -> Result<Self, AppError> {
        let mut gateway = HttpGateway::new(&config.whatsapp_url)?;
        if let Some(key) = &config.whatsapp_api_key {
            gateway = gateway.with_api_key(key);
        }
        if let Some(url) = &config.webhook_url {
            gateway = gateway.with_webhook(url, &config.webhook_token);
        }

        let store = db.bot_repo();
        let mut chatbot = ChatbotService::new(gateway.clone(), store.clone());
        match &config.llm_api_key {
            Some(key) => {
                let responder =
                    OpenAiResponder::with_base_url(key, &config.llm_model, &config.llm_base_url)?
                        .with_timeout(LLM_TIMEOUT)?;
                tracing::info!(model = %responder.model(), "AI replies enabled");
                chatbot = chatbot.with_responder(responder);
            }
            None => tracing::info!("COMANDA_LLM_API_KEY not set; AI replies disabled"),
        }

        Ok(Self {
            db,
            sessions: SessionCache::new(),
            cookie_secure: config.cookie_secure,
            session_ttl_hours: config.session_ttl_hours,
            webhook_token: config.webhook_token.clone(),
            bots: BotManager::new(gateway, store),
            chatbot,
        })
    }
}
