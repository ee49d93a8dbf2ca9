use std::time::Duration;

use comanda_core::error::AppError;
use comanda_core::traits::MessagingGateway;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(20);
const WEBHOOK_EVENTS: [&str; 2] = ["message", "session.status"];

/// Client for a WAHA-style WhatsApp HTTP gateway.
///
/// One gateway instance hosts many sessions; each tenant bot owns one
/// session, named after its user.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    webhook: Option<WebhookTarget>,
    timeout_secs: u64,
}

/// Where the gateway should push events for sessions started by us.
#[derive(Clone, Debug)]
pub struct WebhookTarget {
    pub url: String,
    pub token: String,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid gateway URL '{}': {}", base_url, e))
        })?;
        let client = Client::builder()
            .timeout(DEFAULT_GATEWAY_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: None,
            webhook: None,
            timeout_secs: DEFAULT_GATEWAY_TIMEOUT.as_secs(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Register a webhook on every session this client starts.
    pub fn with_webhook(mut self, url: impl Into<String>, token: impl Into<String>) -> Self {
        self.webhook = Some(WebhookTarget {
            url: url.into(),
            token: token.into(),
        });
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::ConfigError(format!("Invalid gateway path '{}': {}", path, e)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("X-Api-Key", key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AppError> {
        self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Gateway unreachable: {}", e))
            } else {
                AppError::HttpError(e.to_string())
            }
        })
    }

    fn start_body(&self, session: &str) -> StartSession {
        StartSession {
            name: session.to_string(),
            config: self.webhook.as_ref().map(|hook| SessionConfig {
                webhooks: vec![WebhookConfig {
                    url: hook.url.clone(),
                    events: WEBHOOK_EVENTS.iter().map(|e| e.to_string()).collect(),
                    custom_headers: vec![CustomHeader {
                        name: "x-webhook-token".to_string(),
                        value: hook.token.clone(),
                    }],
                }],
            }),
        }
    }
}

// ---- Gateway API types ----

#[derive(Debug, Serialize)]
struct StartSession {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<SessionConfig>,
}

#[derive(Debug, Serialize)]
struct SessionConfig {
    webhooks: Vec<WebhookConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookConfig {
    url: String,
    events: Vec<String>,
    custom_headers: Vec<CustomHeader>,
}

#[derive(Debug, Serialize)]
struct CustomHeader {
    name: String,
    value: String,
}

#[derive(Serialize)]
struct SessionName<'a> {
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendText<'a> {
    session: &'a str,
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct QrValue {
    value: String,
}

async fn error_from(response: Response) -> AppError {
    let status_code = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or(body);
    AppError::GatewayError {
        message,
        status_code,
    }
}

impl MessagingGateway for HttpGateway {
    async fn start_session(&self, session: &str) -> Result<(), AppError> {
        let url = self.endpoint("api/sessions/start")?;
        let response = self
            .send(self.client.post(url).json(&self.start_body(session)))
            .await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            // Already running.
            StatusCode::UNPROCESSABLE_ENTITY => {
                tracing::debug!(session, "Gateway session already started");
                Ok(())
            }
            _ => Err(error_from(response).await),
        }
    }

    async fn stop_session(&self, session: &str) -> Result<(), AppError> {
        let url = self.endpoint("api/sessions/stop")?;
        let response = self
            .send(self.client.post(url).json(&SessionName { name: session }))
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }

    async fn fetch_qr(&self, session: &str) -> Result<Option<String>, AppError> {
        let mut url = self.endpoint(&format!("api/{}/auth/qr", session))?;
        url.query_pairs_mut().append_pair("format", "raw");
        let response = self.send(self.client.get(url)).await?;

        match response.status() {
            s if s.is_success() => {
                let qr: QrValue = response.json().await.map_err(|e| {
                    AppError::HttpError(format!("Failed to parse QR response: {}", e))
                })?;
                Ok(Some(qr.value).filter(|v| !v.is_empty()))
            }
            // Not waiting for a scan (not started yet, or already paired).
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => Ok(None),
            _ => Err(error_from(response).await),
        }
    }

    async fn send_text(&self, session: &str, chat_id: &str, text: &str) -> Result<(), AppError> {
        let url = self.endpoint("api/sendText")?;
        let response = self
            .send(self.client.post(url).json(&SendText {
                session,
                chat_id,
                text,
            }))
            .await?;

        if response.status().is_success() {
            tracing::debug!(session, chat_id, "Message sent");
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }
}
