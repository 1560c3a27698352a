//! Chat HTTP handlers.
//!
//! Endpoints:
//! - GET  /api/v1/chat              - Current view (loads history on first use)
//! - POST /api/v1/chat/messages     - Send one turn, returns both messages
//! - POST /api/v1/chat/select-date  - Switch the visible session
//! - POST /api/v1/chat/clear        - Start a fresh session for today
//! - GET  /api/v1/chat/history      - Session index, most recent first

use std::time::Instant;

use axum::Json;
use axum::extract::{Query, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockcoach_core::chat::attachment::ImageAttachment;
use stockcoach_types::message::{CHAT_DATE_FORMAT, HistoryEntry, Message};
use stockcoach_types::session::{
    ChatView, NewSessionOutcome, ReplySource, SendOutcome, SendRejection,
};

use crate::http::error::AppError;
use crate::http::extractors::identity::ChatUser;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ChatQuery {
    /// Re-read history from storage and reselect today.
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct ImageBody {
    pub mime_type: String,
    pub data_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: Option<ImageBody>,
}

#[derive(Debug, Deserialize)]
pub struct SelectDateBody {
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub user_message: Message,
    pub ai_message: Message,
    pub reply_source: ReplySource,
    pub view: ChatView,
}

/// GET /api/v1/chat - Current chat view.
pub async fn get_chat(
    State(state): State<AppState>,
    chat_user: ChatUser,
    Query(query): Query<ChatQuery>,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let chat = state.orchestrator_for(chat_user.user);
    let view = if query.refresh {
        chat.load(chat_user.ip).await
    } else {
        chat.ensure_loaded(chat_user.ip).await;
        chat.view().await
    };

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(view, request_id, elapsed)
        .with_link("self", "/api/v1/chat")
        .with_link("history", "/api/v1/chat/history");

    Ok(Json(resp))
}

/// POST /api/v1/chat/messages - Send a message to the coach.
pub async fn send_message(
    State(state): State<AppState>,
    chat_user: ChatUser,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<ApiResponse<SendMessageResponse>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let image = body
        .image
        .map(|img| ImageAttachment::from_base64(&img.mime_type, &img.data_base64))
        .transpose()?;

    let chat = state.orchestrator_for(chat_user.user);
    chat.ensure_loaded(chat_user.ip).await;

    let outcome = chat.send_message(&body.content, image).await;
    let (user_message, ai_message, reply_source) = match outcome {
        SendOutcome::Delivered {
            user_message,
            ai_message,
            reply_source,
        } => (user_message, ai_message, reply_source),
        SendOutcome::Rejected { reason } => return Err(reason.into()),
    };

    let view = chat.view().await;
    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        SendMessageResponse {
            user_message,
            ai_message,
            reply_source,
            view,
        },
        request_id,
        elapsed,
    )
    .with_link("chat", "/api/v1/chat");

    Ok(Json(resp))
}

/// POST /api/v1/chat/select-date - Switch to another day's session.
pub async fn select_date(
    State(state): State<AppState>,
    chat_user: ChatUser,
    Json(body): Json<SelectDateBody>,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let date = body.date.trim();
    NaiveDate::parse_from_str(date, CHAT_DATE_FORMAT)
        .map_err(|_| AppError::Validation(format!("Invalid date '{date}', expected YYYY-MM-DD")))?;

    let chat = state.orchestrator_for(chat_user.user);
    chat.ensure_loaded(chat_user.ip).await;
    if !chat.select_date(date).await {
        return Err(AppError::NotFound(format!("No chat session on {date}")));
    }

    let view = chat.view().await;
    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(view, request_id, elapsed)))
}

/// POST /api/v1/chat/clear - Start a new session for today.
pub async fn clear_chat(
    State(state): State<AppState>,
    chat_user: ChatUser,
) -> Result<Json<ApiResponse<ChatView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let chat = state.orchestrator_for(chat_user.user);
    chat.ensure_loaded(chat_user.ip).await;
    match chat.clear_messages().await {
        NewSessionOutcome::Started => {}
        NewSessionOutcome::DailyLimitReached => return Err(AppError::DailyLimitReached),
        NewSessionOutcome::Unauthenticated => return Err(SendRejection::Unauthenticated.into()),
    }

    let view = chat.view().await;
    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(view, request_id, elapsed)))
}

/// GET /api/v1/chat/history - List session dates.
pub async fn get_history(
    State(state): State<AppState>,
    chat_user: ChatUser,
) -> Result<Json<ApiResponse<Vec<HistoryEntry>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let chat = state.orchestrator_for(chat_user.user);
    chat.ensure_loaded(chat_user.ip).await;
    let history = chat.view().await.history;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(history, request_id, elapsed)
        .with_link("self", "/api/v1/chat/history");

    Ok(Json(resp))
}
