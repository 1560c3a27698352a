//! Voice input: upload a recorded clip, get text back for the message box.
//!
//! POST /api/v1/transcribe (multipart, field `file`)

use std::time::Instant;

use axum::Json;
use axum::extract::{Multipart, State};
use serde::Serialize;
use uuid::Uuid;

use stockcoach_infra::webhook::transcription::AudioClip;

use crate::http::error::AppError;
use crate::http::extractors::identity::ChatUser;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Largest accepted audio upload.
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub text: String,
}

/// POST /api/v1/transcribe - Transcribe one audio clip.
pub async fn transcribe(
    State(state): State<AppState>,
    _user: ChatUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<TranscriptResponse>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let mut clip = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("recording.webm").to_string();
        let mime_type = audio_mime_type(field.content_type())?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read audio: {e}")))?;
        clip = Some(AudioClip {
            bytes: bytes.to_vec(),
            file_name,
            mime_type,
        });
        break;
    }

    let clip = clip.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    if clip.bytes.is_empty() {
        return Err(AppError::Validation("Audio file is empty".to_string()));
    }

    let text = state.transcription.transcribe(clip).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(TranscriptResponse { text }, request_id, elapsed)))
}

/// The clip's content type, defaulting to `audio/webm` when the part has none.
///
/// Browsers record into `audio/*`, or `video/webm` for some MediaRecorder
/// builds; parameters such as `;codecs=opus` are kept.
fn audio_mime_type(content_type: Option<&str>) -> Result<String, AppError> {
    let Some(raw) = content_type.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok("audio/webm".to_string());
    };

    let essence = raw.split(';').next().unwrap_or_default().trim();
    let accepted = match essence.split_once('/') {
        Some(("audio", subtype)) => is_token(subtype),
        Some(("video", "webm")) => true,
        _ => false,
    };
    if !accepted {
        return Err(AppError::Validation(format!(
            "Unsupported audio type '{raw}', expected an audio/* content type"
        )));
    }
    Ok(raw.to_string())
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$&-^_.+".contains(&b))
}
