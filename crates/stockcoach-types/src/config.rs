//! Service configuration types for StockCoach.
//!
//! `CoachConfig` represents the `config.toml` in the data directory. Every
//! field has a default so an empty or missing file yields a working setup
//! (canned AI replies, local-clock dates).

use serde::{Deserialize, Serialize};

/// Top-level configuration of the chat service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachConfig {
    /// Chat webhook endpoint. `None` switches the service to canned replies.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Optional bearer token sent to the chat and transcription webhooks.
    #[serde(default)]
    pub webhook_token: Option<String>,

    /// Audio transcription endpoint (multipart upload).
    #[serde(default)]
    pub transcription_url: Option<String>,

    /// Deadline for one chat webhook round trip.
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    /// Deadline for one transcription round trip.
    #[serde(default = "default_transcription_timeout_secs")]
    pub transcription_timeout_secs: u64,

    /// Artificial delay before a canned reply is returned.
    #[serde(default = "default_mock_delay_ms")]
    pub mock_delay_ms: u64,

    /// Lifetime user-authored messages allowed for non-admin users.
    #[serde(default = "default_message_allowance")]
    pub message_allowance: u32,

    /// Emails that get admin rights (unlimited messages, session resets).
    #[serde(default)]
    pub admin_emails: Vec<String>,

    /// Base URL of the IP geolocation service.
    #[serde(default = "default_geo_lookup_url")]
    pub geo_lookup_url: String,

    /// How long a cached geo/timezone record stays valid.
    #[serde(default = "default_geo_cache_ttl_hours")]
    pub geo_cache_ttl_hours: u32,

    /// Seed a welcome message when a user has no history anywhere.
    #[serde(default = "default_seed_welcome_message")]
    pub seed_welcome_message: bool,
}

fn default_webhook_timeout_secs() -> u64 {
    30
}

fn default_transcription_timeout_secs() -> u64 {
    65
}

fn default_mock_delay_ms() -> u64 {
    1_000
}

fn default_message_allowance() -> u32 {
    100
}

fn default_geo_lookup_url() -> String {
    "https://ipapi.co".to_string()
}

fn default_geo_cache_ttl_hours() -> u32 {
    24
}

fn default_seed_welcome_message() -> bool {
    true
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_token: None,
            transcription_url: None,
            webhook_timeout_secs: default_webhook_timeout_secs(),
            transcription_timeout_secs: default_transcription_timeout_secs(),
            mock_delay_ms: default_mock_delay_ms(),
            message_allowance: default_message_allowance(),
            admin_emails: Vec::new(),
            geo_lookup_url: default_geo_lookup_url(),
            geo_cache_ttl_hours: default_geo_cache_ttl_hours(),
            seed_welcome_message: default_seed_welcome_message(),
        }
    }
}

impl CoachConfig {
    /// Whether `email` is listed in `admin_emails` (case-insensitive).
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email.trim()))
    }

    /// The configured chat webhook, ignoring blank values.
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
