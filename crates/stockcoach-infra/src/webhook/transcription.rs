//! Audio transcription over a multipart webhook.
//!
//! The upload races a client-side deadline. On timeout the request is
//! abandoned and the caller must retry; nothing is sent to cancel it.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use stockcoach_types::config::CoachConfig;
use stockcoach_types::error::TranscriptionError;
use stockcoach_types::webhook::TranscriptionReply;
use tracing::{debug, warn};

/// One audio clip to transcribe.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

pub struct TranscriptionClient {
    client: reqwest::Client,
    url: Option<String>,
    token: Option<SecretString>,
    timeout: Duration,
}

impl TranscriptionClient {
    pub fn new(url: Option<String>, token: Option<SecretString>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("stockcoach/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
            token,
            timeout,
        }
    }

    pub fn from_config(config: &CoachConfig) -> Self {
        let token = config
            .webhook_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.to_string()));
        Self::new(
            config.transcription_url.clone(),
            token,
            Duration::from_secs(config.transcription_timeout_secs),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Upload `clip` as multipart field `file` and return the transcript.
    pub async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError> {
        let url = self.url.as_deref().ok_or(TranscriptionError::NotConfigured)?;
        let size = clip.bytes.len();

        match tokio::time::timeout(self.timeout, self.upload(url, clip)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    bytes = size,
                    timeout_secs = self.timeout.as_secs(),
                    "transcription timed out"
                );
                Err(TranscriptionError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }

    async fn upload(&self, url: &str, clip: AudioClip) -> Result<String, TranscriptionError> {
        let part = Part::bytes(clip.bytes)
            .file_name(clip.file_name)
            .mime_str(&clip.mime_type)
            .map_err(|_| TranscriptionError::InvalidAudio(clip.mime_type.clone()))?;
        let form = Form::new().part("file", part);

        let mut builder = self.client.post(url).multipart(form);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptionError::Http {
                status: status.as_u16(),
            });
        }

        let reply: TranscriptionReply = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Service(format!("unreadable reply: {e}")))?;

        match reply {
            TranscriptionReply::Text { text } => {
                debug!(chars = text.len(), "transcription received");
                Ok(text)
            }
            TranscriptionReply::Error { error } => Err(TranscriptionError::Service(error)),
        }
    }
}
