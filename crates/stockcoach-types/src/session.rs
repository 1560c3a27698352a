//! Daily chat session types.
//!
//! A session is every message sharing one ChatDate. These types describe
//! which session is selected and the outcomes of session-level operations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::message::{HistoryEntry, Message};

/// Where the selected session stands relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Today is selected but has no messages yet.
    NoSessionToday,
    /// Today is selected and has at least one message.
    TodaySessionOpen,
    /// A past date is selected; the session is read-only.
    ViewingPastSession,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::NoSessionToday => write!(f, "no_session_today"),
            SessionState::TodaySessionOpen => write!(f, "today_session_open"),
            SessionState::ViewingPastSession => write!(f, "viewing_past_session"),
        }
    }
}

/// Result of asking for a fresh daily session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewSessionOutcome {
    /// Today's messages were replaced by a fresh welcome message.
    Started,
    /// A non-admin user already has a session today.
    DailyLimitReached,
    /// No authenticated user.
    Unauthenticated,
}

impl NewSessionOutcome {
    /// Whether a new session was started.
    pub fn started(&self) -> bool {
        matches!(self, NewSessionOutcome::Started)
    }
}

/// Why a `send_message` call was rejected without touching the message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendRejection {
    Unauthenticated,
    /// The selected date is not today; past sessions are read-only.
    ReadOnlySession,
    EmptyMessage,
    /// The user has used up their lifetime message allowance.
    AllowanceExhausted,
    /// Another send for the same session has not completed yet.
    SendInFlight,
}

impl fmt::Display for SendRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendRejection::Unauthenticated => write!(f, "you must be signed in to chat"),
            SendRejection::ReadOnlySession => {
                write!(f, "past sessions are read-only; switch to today to chat")
            }
            SendRejection::EmptyMessage => write!(f, "message is empty"),
            SendRejection::AllowanceExhausted => write!(f, "message limit reached"),
            SendRejection::SendInFlight => {
                write!(f, "please wait for the current reply before sending again")
            }
        }
    }
}

/// How the AI half of a turn was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// The webhook answered with a recognized content field.
    Webhook,
    /// The webhook answered 2xx without a recognized content field.
    Fallback,
    /// The webhook failed or timed out.
    ConnectionLost,
    /// No webhook is configured; a canned response was used.
    Canned,
}

/// Result of a `send_message` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    Delivered {
        user_message: Message,
        ai_message: Message,
        reply_source: ReplySource,
    },
    Rejected {
        reason: SendRejection,
    },
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }
}

/// Snapshot of a user's chat published to the caller after each operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatView {
    pub selected_date: String,
    pub current_date: String,
    pub timezone: String,
    pub state: SessionState,
    /// Messages of the selected session, ascending by timestamp.
    pub messages: Vec<Message>,
    /// Distinct ChatDates, most recent first.
    pub history: Vec<HistoryEntry>,
    pub is_today_session: bool,
    pub has_today_messages: bool,
    pub can_create_new_chat: bool,
    /// `None` for admins (unlimited).
    pub remaining_messages: Option<u32>,
    /// Set when the remote history could not be read and the cache was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_warning: Option<String>,
}
