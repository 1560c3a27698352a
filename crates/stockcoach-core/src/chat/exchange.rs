//! AI exchange: one webhook round trip per user turn.
//!
//! The transport (HTTP in production) only moves JSON. This module owns the
//! policy around it: the deadline, validation of the reply shape, and the
//! soft fallback for 2xx replies without usable content. When no webhook is
//! configured at all, [`CannedResponder`] stands in.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use stockcoach_types::error::ExchangeError;
use stockcoach_types::session::ReplySource;
use stockcoach_types::webhook::{FALLBACK_REPLY, WebhookReply, WebhookRequest};
use tracing::{debug, warn};

/// Replies served when no webhook is configured (development/demo only).
pub const MOCK_RESPONSES: &[&str] = &[
    "Great question! Before any trade, define your entry, your exit, and how much you're willing to lose. What's your plan here?",
    "Remember that diversification is your friend. How concentrated is your portfolio right now?",
    "Volatility cuts both ways. Consider sizing positions so that a single bad day can't derail your account.",
    "Let's look at the fundamentals first: revenue growth, margins, and debt. Which company are you researching?",
    "Trends are easier to ride than to predict. Have you checked the 50-day and 200-day moving averages?",
    "It's worth keeping a trading journal. Writing down why you entered a position makes the lessons stick.",
];

/// Moves a webhook request to the configured endpoint and returns the JSON body.
///
/// Implementations map non-2xx statuses to [`ExchangeError::Http`] and
/// transport failures to [`ExchangeError::Network`].
pub trait WebhookTransport: Send + Sync {
    fn post_json(
        &self,
        request: &WebhookRequest,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, ExchangeError>> + Send;
}

impl<T: WebhookTransport> WebhookTransport for Arc<T> {
    fn post_json(
        &self,
        request: &WebhookRequest,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, ExchangeError>> + Send {
        (**self).post_json(request)
    }
}

/// Content of an AI turn plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReply {
    pub content: String,
    pub source: ReplySource,
}

/// Turn a 2xx body into reply content, substituting [`FALLBACK_REPLY`]
/// when the body has no recognized content field.
pub fn resolve_reply(body: serde_json::Value) -> ExchangeReply {
    match WebhookReply::from_value(body).and_then(WebhookReply::into_content) {
        Ok(content) => ExchangeReply {
            content,
            source: ReplySource::Webhook,
        },
        Err(e) => {
            warn!(error = %e, "webhook reply has no usable content, using fallback reply");
            ExchangeReply {
                content: FALLBACK_REPLY.to_string(),
                source: ReplySource::Fallback,
            }
        }
    }
}

/// Webhook client with a bounded deadline per call.
pub struct AiExchangeClient<T: WebhookTransport> {
    transport: T,
    timeout: Duration,
}

impl<T: WebhookTransport> AiExchangeClient<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Send one user message to the webhook.
    ///
    /// A malformed 2xx reply is not an error: it yields the fallback reply.
    /// HTTP errors, transport errors and the deadline are.
    pub async fn send_message(
        &self,
        request: &WebhookRequest,
    ) -> Result<ExchangeReply, ExchangeError> {
        debug!(user_id = %request.user_id, "sending message to webhook");
        let body = tokio::time::timeout(self.timeout, self.transport.post_json(request))
            .await
            .map_err(|_| ExchangeError::Timeout {
                secs: self.timeout.as_secs(),
            })??;
        Ok(resolve_reply(body))
    }
}

/// Canned replies picked uniformly at random after an artificial delay.
#[derive(Debug, Clone)]
pub struct CannedResponder {
    delay: Duration,
}

impl CannedResponder {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn reply(&self) -> ExchangeReply {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let content = MOCK_RESPONSES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(FALLBACK_REPLY);
        ExchangeReply {
            content: content.to_string(),
            source: ReplySource::Canned,
        }
    }
}

/// Which backend answers AI turns.
pub enum AiBackend<T: WebhookTransport> {
    Webhook(AiExchangeClient<T>),
    /// No webhook configured.
    Canned(CannedResponder),
}

impl<T: WebhookTransport> AiBackend<T> {
    /// Choose the webhook when a transport is available, canned replies otherwise.
    pub fn from_transport(transport: Option<T>, timeout: Duration, mock_delay: Duration) -> Self {
        match transport {
            Some(transport) => AiBackend::Webhook(AiExchangeClient::new(transport, timeout)),
            None => AiBackend::Canned(CannedResponder::new(mock_delay)),
        }
    }
}
