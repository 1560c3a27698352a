//! Configuration loader for StockCoach.
//!
//! Reads `config.toml` from the data directory into [`CoachConfig`], then
//! applies environment overrides. A missing or malformed file yields the
//! defaults.

use std::path::Path;

use stockcoach_types::config::CoachConfig;

pub const CONFIG_FILE: &str = "config.toml";
pub const WEBHOOK_URL_ENV: &str = "STOCKCOACH_WEBHOOK_URL";
pub const WEBHOOK_TOKEN_ENV: &str = "STOCKCOACH_WEBHOOK_TOKEN";

/// Load `{data_dir}/config.toml` and apply environment overrides.
pub async fn load_config(data_dir: &Path) -> CoachConfig {
    let mut config = load_config_file(data_dir).await;
    apply_overrides(
        &mut config,
        std::env::var(WEBHOOK_URL_ENV).ok(),
        std::env::var(WEBHOOK_TOKEN_ENV).ok(),
    );
    config
}

async fn load_config_file(data_dir: &Path) -> CoachConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return CoachConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return CoachConfig::default();
        }
    };

    match toml::from_str::<CoachConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            CoachConfig::default()
        }
    }
}

/// Non-blank environment values win over the file.
fn apply_overrides(config: &mut CoachConfig, webhook_url: Option<String>, token: Option<String>) {
    if let Some(url) = webhook_url.filter(|v| !v.trim().is_empty()) {
        config.webhook_url = Some(url);
    }
    if let Some(token) = token.filter(|v| !v.trim().is_empty()) {
        config.webhook_token = Some(token);
    }
}

/// Render a config for display with the token masked.
pub fn redacted_toml(config: &CoachConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.webhook_token.is_some() {
        shown.webhook_token = Some("********".to_string());
    }
    toml::to_string_pretty(&shown)
}
