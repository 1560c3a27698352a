//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use stockcoach_core::chat::attachment::AttachmentError;
use stockcoach_types::error::TranscriptionError;
use stockcoach_types::session::SendRejection;

use crate::http::response::ApiResponse;

/// Where clients are sent once the message allowance is used up.
pub const LIMIT_REACHED_PATH: &str = "/limit-reached";

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// A send was refused without touching the conversation.
    Rejected(SendRejection),
    /// A non-admin already has a session today.
    DailyLimitReached,
    Attachment(AttachmentError),
    Transcription(TranscriptionError),
    /// Missing or unusable identity headers.
    Unauthorized(String),
    NotFound(String),
    Validation(String),
}

impl From<SendRejection> for AppError {
    fn from(e: SendRejection) -> Self {
        AppError::Rejected(e)
    }
}

impl From<AttachmentError> for AppError {
    fn from(e: AttachmentError) -> Self {
        AppError::Attachment(e)
    }
}

impl From<TranscriptionError> for AppError {
    fn from(e: TranscriptionError) -> Self {
        AppError::Transcription(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
        match self {
            AppError::Rejected(reason) => {
                let (status, code) = match reason {
                    SendRejection::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                    SendRejection::ReadOnlySession => (StatusCode::CONFLICT, "READ_ONLY_SESSION"),
                    SendRejection::EmptyMessage => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                    SendRejection::AllowanceExhausted => {
                        (StatusCode::FORBIDDEN, "MESSAGE_LIMIT_REACHED")
                    }
                    SendRejection::SendInFlight => (StatusCode::CONFLICT, "SEND_IN_FLIGHT"),
                };
                let details = matches!(reason, SendRejection::AllowanceExhausted)
                    .then(|| json!({ "redirect": LIMIT_REACHED_PATH }));
                (status, code, reason.to_string(), details)
            }
            AppError::DailyLimitReached => (
                StatusCode::CONFLICT,
                "DAILY_LIMIT_REACHED",
                "You've already started today's session. Come back tomorrow for a new one."
                    .to_string(),
                None,
            ),
            AppError::Attachment(e) => {
                (StatusCode::BAD_REQUEST, "INVALID_ATTACHMENT", e.to_string(), None)
            }
            AppError::Transcription(e) => {
                let (status, code) = match e {
                    TranscriptionError::InvalidAudio(_) => {
                        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
                    }
                    TranscriptionError::NotConfigured => {
                        (StatusCode::SERVICE_UNAVAILABLE, "TRANSCRIPTION_UNAVAILABLE")
                    }
                    TranscriptionError::Timeout { .. } => {
                        (StatusCode::GATEWAY_TIMEOUT, "TRANSCRIPTION_TIMEOUT")
                    }
                    _ => (StatusCode::BAD_GATEWAY, "TRANSCRIPTION_FAILED"),
                };
                (status, code, e.to_string(), None)
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        } else {
            tracing::debug!(code, %message, "request rejected");
        }
        ApiResponse::error(code, &message, details).into_response_with(status)
    }
}
