//! Chat message types for StockCoach.
//!
//! A `Message` is the only persisted entity of the chat core. Sessions are
//! never stored; they are derived from the calendar date of each message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sender id used for every AI-authored message (replies and welcomes).
pub const AI_SENDER_ID: &str = "ai";

/// Date format of a ChatDate (`yyyy-MM-dd`).
pub const CHAT_DATE_FORMAT: &str = "%Y-%m-%d";

/// A single chat message.
///
/// Immutable once created. Messages are ordered by `timestamp` ascending;
/// append order breaks ties. The JSON form (used by the local cache) keeps
/// the camelCase keys of the web client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    /// `"ai"` for AI-authored messages, otherwise the author's user id.
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "isAI")]
    pub is_ai: bool,
    /// Data URL or remote URL of an attached image.
    ///
    /// Only the local cache keeps this field; the remote store drops it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Message {
    /// Create a user-authored message stamped with `timestamp`.
    pub fn from_user(user_id: &str, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender_id: user_id.to_string(),
            content: content.into(),
            timestamp,
            is_ai: false,
            image_url: None,
        }
    }

    /// Create an AI-authored message stamped with `timestamp`.
    pub fn from_ai(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender_id: AI_SENDER_ID.to_string(),
            content: content.into(),
            timestamp,
            is_ai: true,
            image_url: None,
        }
    }

    /// Attach an image URL.
    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }
}

/// One entry of a user's chat history index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// ChatDate in `yyyy-MM-dd` form.
    pub date: String,
    pub message_count: usize,
    /// Content of the first user-authored message of that day, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}
