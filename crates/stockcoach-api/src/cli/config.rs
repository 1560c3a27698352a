//! `coach config`: the effective configuration.

use anyhow::Result;
use console::style;

use stockcoach_infra::config::{CONFIG_FILE, redacted_toml};

use crate::state::AppState;

pub fn show_config(state: &AppState, json: bool) -> Result<()> {
    let rendered = redacted_toml(&state.config)?;

    if json {
        let value: toml::Value = toml::from_str(&rendered)?;
        let out = serde_json::json!({
            "data_dir": state.data_dir.display().to_string(),
            "config": value,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Data directory:").bold(),
        style(state.data_dir.display()).cyan()
    );
    println!(
        "  {} {}",
        style("Config file:").bold(),
        style(state.data_dir.join(CONFIG_FILE).display()).cyan()
    );
    println!();
    for line in rendered.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}
