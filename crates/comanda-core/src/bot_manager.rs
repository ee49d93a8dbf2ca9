use crate::bot::{BotStatus, UserBot};
use crate::error::AppError;
use crate::traits::{BotStore, MessagingGateway};

/// Drives a bot's WhatsApp session on the gateway and mirrors its state in
/// the store.
#[derive(Clone)]
pub struct BotManager<G, S>
where
    G: MessagingGateway,
    S: BotStore,
{
    gateway: G,
    store: S,
}

impl<G, S> BotManager<G, S>
where
    G: MessagingGateway,
    S: BotStore,
{
    pub fn new(gateway: G, store: S) -> Self {
        Self { gateway, store }
    }

    /// Start the session and grab the pairing QR if one is already available.
    pub async fn start(&self, bot: &UserBot) -> Result<UserBot, AppError> {
        if bot.status == BotStatus::Connected {
            return Err(AppError::Conflict(format!(
                "Bot {} is already connected",
                bot.session_name
            )));
        }

        tracing::info!(session = %bot.session_name, "Starting WhatsApp session");
        self.gateway.start_session(&bot.session_name).await?;
        let bot = self
            .store
            .set_bot_status(bot.id, BotStatus::Starting, None)
            .await?;

        match self.gateway.fetch_qr(&bot.session_name).await {
            Ok(Some(qr)) => {
                self.store
                    .set_bot_status(bot.id, BotStatus::QrPending, Some(&qr))
                    .await
            }
            Ok(None) => Ok(bot),
            // The session is up; the QR arrives later through the webhook.
            Err(e) => {
                tracing::warn!(session = %bot.session_name, error = %e, "QR not available yet");
                Ok(bot)
            }
        }
    }

    pub async fn stop(&self, bot: &UserBot) -> Result<UserBot, AppError> {
        tracing::info!(session = %bot.session_name, "Stopping WhatsApp session");
        match self.gateway.stop_session(&bot.session_name).await {
            Ok(()) => {}
            // Already gone on the gateway side.
            Err(AppError::GatewayError { status_code: 404, .. }) => {
                tracing::debug!(session = %bot.session_name, "Session unknown to gateway");
            }
            Err(e) => return Err(e),
        }
        self.store
            .set_bot_status(bot.id, BotStatus::Disconnected, None)
            .await
    }

    /// Fetch the current QR code and store it.
    pub async fn refresh_qr(&self, bot: &UserBot) -> Result<UserBot, AppError> {
        let qr = self
            .gateway
            .fetch_qr(&bot.session_name)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No QR code available for {}", bot.session_name))
            })?;
        self.store
            .set_bot_status(bot.id, BotStatus::QrPending, Some(&qr))
            .await
    }

    /// Apply a session status pushed by the gateway.
    ///
    /// Returns `None` for unknown sessions and unrecognized statuses.
    pub async fn apply_status(
        &self,
        session_name: &str,
        provider_status: &str,
    ) -> Result<Option<UserBot>, AppError> {
        let Some(bot) = self.store.find_bot_by_session(session_name).await? else {
            tracing::info!(session = %session_name, "Status for unknown session ignored");
            return Ok(None);
        };
        let Some(status) = BotStatus::from_provider(provider_status) else {
            tracing::warn!(session = %session_name, status = %provider_status, "Unrecognized session status");
            return Ok(None);
        };

        tracing::info!(session = %session_name, from = %bot.status, to = %status, "Bot status changed");

        let updated = match status {
            BotStatus::QrPending => {
                let qr = match self.gateway.fetch_qr(session_name).await {
                    Ok(qr) => qr,
                    Err(e) => {
                        tracing::warn!(session = %session_name, error = %e, "Failed to fetch QR code");
                        None
                    }
                };
                // Keep a previously stored code if the gateway has none right now.
                let qr = qr.or(bot.qr_code.clone());
                self.store
                    .set_bot_status(bot.id, status, qr.as_deref())
                    .await?
            }
            BotStatus::Starting => {
                self.store
                    .set_bot_status(bot.id, status, bot.qr_code.as_deref())
                    .await?
            }
            BotStatus::Connected | BotStatus::Failed | BotStatus::Disconnected => {
                self.store.set_bot_status(bot.id, status, None).await?
            }
        };

        Ok(Some(updated))
    }
}
