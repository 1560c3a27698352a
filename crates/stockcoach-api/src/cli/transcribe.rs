//! `coach transcribe <file>`: voice input from the terminal.

use std::path::Path;

use anyhow::{Context, Result};

use stockcoach_infra::webhook::transcription::AudioClip;

use crate::state::AppState;

pub async fn transcribe_file(state: &AppState, path: &Path, json: bool) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("recording.webm")
        .to_string();

    let clip = AudioClip {
        bytes,
        mime_type: audio_mime(&file_name).to_string(),
        file_name,
    };
    let text = state.transcription.transcribe(clip).await?;

    if json {
        println!("{}", serde_json::json!({ "text": text }));
    } else {
        println!("{text}");
    }
    Ok(())
}

fn audio_mime(file_name: &str) -> &'static str {
    let ext = file_name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        _ => "audio/webm",
    }
}
