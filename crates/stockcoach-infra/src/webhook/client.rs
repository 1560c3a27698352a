//! Chat webhook transport over reqwest.
//!
//! Only moves JSON: the deadline and the reply-shape policy live in
//! `stockcoach-core`'s exchange module. An optional bearer token is wrapped in
//! [`SecretString`] and only exposed while building the request header.

use secrecy::{ExposeSecret, SecretString};
use stockcoach_core::chat::exchange::WebhookTransport;
use stockcoach_types::config::CoachConfig;
use stockcoach_types::error::ExchangeError;
use stockcoach_types::webhook::WebhookRequest;
use tracing::debug;

/// POSTs chat turns to the configured webhook URL.
pub struct HttpWebhookTransport {
    client: reqwest::Client,
    url: String,
    token: Option<SecretString>,
}

impl HttpWebhookTransport {
    pub fn new(url: impl Into<String>, token: Option<SecretString>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("stockcoach/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
            token,
        }
    }

    /// A transport for the configured webhook, or `None` when no URL is set.
    pub fn from_config(config: &CoachConfig) -> Option<Self> {
        let url = config.webhook_url()?;
        let token = config
            .webhook_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.to_string()));
        Some(Self::new(url, token))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

// No Debug derive: the token must never reach logs.

impl WebhookTransport for HttpWebhookTransport {
    async fn post_json(
        &self,
        request: &WebhookRequest,
    ) -> Result<serde_json::Value, ExchangeError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;
        debug!(status = status.as_u16(), bytes = text.len(), "webhook replied");
        serde_json::from_str(&text).map_err(|e| ExchangeError::Decode(e.to_string()))
    }
}
