//! Daily sessions as a projection of the message list.
//!
//! Nothing here is stored: [`SessionIndex`] is rebuilt from the messages on
//! every read, so it cannot drift from them. [`SessionManager`] owns the
//! one-session-per-day rule.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use stockcoach_types::message::{HistoryEntry, Message};
use stockcoach_types::session::{NewSessionOutcome, SessionState};
use uuid::Uuid;

const PREVIEW_CHARS: usize = 80;

/// Messages grouped by ChatDate, each group ascending by timestamp.
#[derive(Debug, Clone, Default)]
pub struct SessionIndex {
    sessions: BTreeMap<String, Vec<Message>>,
}

impl SessionIndex {
    pub fn build<F>(messages: &[Message], date_of: F) -> Self
    where
        F: Fn(&DateTime<Utc>) -> String,
    {
        let mut sessions: BTreeMap<String, Vec<Message>> = BTreeMap::new();
        for message in messages {
            sessions
                .entry(date_of(&message.timestamp))
                .or_default()
                .push(message.clone());
        }
        for group in sessions.values_mut() {
            // Stable: equal timestamps keep append order.
            group.sort_by_key(|m| m.timestamp);
        }
        Self { sessions }
    }

    pub fn messages_on(&self, date: &str) -> &[Message] {
        self.sessions.get(date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, date: &str) -> bool {
        self.sessions.contains_key(date)
    }

    /// The history index shown next to the chat.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.sessions
            .iter()
            .rev()
            .map(|(date, messages)| HistoryEntry {
                date: date.clone(),
                message_count: messages.len(),
                preview: messages
                    .iter()
                    .find(|m| !m.is_ai && !m.content.trim().is_empty())
                    .map(|m| preview(&m.content)),
            })
            .collect()
    }
}

fn preview(content: &str) -> String {
    let content = content.trim();
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// The result of an accepted new-session request, ready to persist.
#[derive(Debug, Clone)]
pub struct NewSessionPlan {
    /// The full message list after the reset.
    pub messages: Vec<Message>,
    /// Ids of today's messages that were dropped.
    pub removed: Vec<Uuid>,
    pub welcome: Message,
}

/// Session gating for one user.
#[derive(Debug, Clone, Copy)]
pub struct SessionManager {
    is_admin: bool,
}

impl SessionManager {
    pub fn new(is_admin: bool) -> Self {
        Self { is_admin }
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn has_today_messages(&self, index: &SessionIndex, today: &str) -> bool {
        index.contains(today)
    }

    /// Admins may always reset; everyone else gets one session per day.
    pub fn can_create_new_chat(&self, index: &SessionIndex, today: &str) -> bool {
        self.is_admin || !self.has_today_messages(index, today)
    }

    pub fn is_today_session(&self, selected: &str, today: &str) -> bool {
        selected == today
    }

    pub fn state(&self, index: &SessionIndex, selected: &str, today: &str) -> SessionState {
        if !self.is_today_session(selected, today) {
            SessionState::ViewingPastSession
        } else if self.has_today_messages(index, today) {
            SessionState::TodaySessionOpen
        } else {
            SessionState::NoSessionToday
        }
    }

    /// A date may be selected if it has messages, or if it is today.
    pub fn is_selectable(&self, index: &SessionIndex, date: &str, today: &str) -> bool {
        date == today || index.contains(date)
    }

    /// Start a fresh session for today.
    ///
    /// Today's existing messages are dropped and `welcome` is appended.
    /// Earlier days are untouched. Rejected with
    /// [`NewSessionOutcome::DailyLimitReached`] when the user may not
    /// create another session today.
    pub fn begin_new_session<F>(
        &self,
        messages: &[Message],
        today: &str,
        date_of: F,
        welcome: Message,
    ) -> Result<NewSessionPlan, NewSessionOutcome>
    where
        F: Fn(&DateTime<Utc>) -> String,
    {
        let index = SessionIndex::build(messages, &date_of);
        if !self.can_create_new_chat(&index, today) {
            return Err(NewSessionOutcome::DailyLimitReached);
        }

        let (todays, mut kept): (Vec<Message>, Vec<Message>) = messages
            .iter()
            .cloned()
            .partition(|m| date_of(&m.timestamp) == today);
        kept.push(welcome.clone());

        Ok(NewSessionPlan {
            messages: kept,
            removed: todays.into_iter().map(|m| m.id).collect(),
            welcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    const TODAY: &str = "2024-03-10";

    fn date_of(ts: &DateTime<Utc>) -> String {
        ts.format("%Y-%m-%d").to_string()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn past_and_today() -> Vec<Message> {
        vec![
            Message::from_user("user-1", "What is a stop loss?", at(8, 9)),
            Message::from_ai("A stop loss is...", at(8, 9) + TimeDelta::seconds(3)),
            Message::from_ai("Good morning!", at(10, 8)),
        ]
    }

    #[test]
    fn test_index_groups_by_date_descending() {
        let index = SessionIndex::build(&past_and_today(), date_of);
        let dates: Vec<_> = index.history().into_iter().map(|e| e.date).collect();
        assert_eq!(dates, vec!["2024-03-10", "2024-03-08"]);
        assert_eq!(index.messages_on("2024-03-08").len(), 2);
        assert!(index.messages_on("2024-03-09").is_empty());
    }

    #[test]
    fn test_history_preview_uses_first_user_message() {
        let index = SessionIndex::build(&past_and_today(), date_of);
        let history = index.history();
        assert_eq!(history[0].date, TODAY);
        assert_eq!(history[0].preview, None);
        assert_eq!(history[1].message_count, 2);
        assert_eq!(history[1].preview.as_deref(), Some("What is a stop loss?"));
    }

    #[test]
    fn test_long_preview_is_truncated() {
        let long = "a".repeat(200);
        let index = SessionIndex::build(&[Message::from_user("u", long, at(8, 9))], date_of);
        let p = index.history()[0].preview.clone().unwrap();
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn test_state_transitions() {
        let mgr = SessionManager::new(false);
        let empty = SessionIndex::default();
        assert_eq!(mgr.state(&empty, TODAY, TODAY), SessionState::NoSessionToday);

        let index = SessionIndex::build(&past_and_today(), date_of);
        assert_eq!(mgr.state(&index, TODAY, TODAY), SessionState::TodaySessionOpen);
        assert_eq!(mgr.state(&index, "2024-03-08", TODAY), SessionState::ViewingPastSession);
    }

    #[test]
    fn test_selectable_dates() {
        let mgr = SessionManager::new(false);
        let index = SessionIndex::build(&past_and_today()[..2], date_of);
        assert!(mgr.is_selectable(&index, "2024-03-08", TODAY));
        assert!(mgr.is_selectable(&index, TODAY, TODAY));
        assert!(!mgr.is_selectable(&index, "2024-03-09", TODAY));
    }

    #[test]
    fn test_non_admin_gets_one_session_per_day() {
        let mgr = SessionManager::new(false);
        let history = past_and_today()[..2].to_vec();

        let plan = mgr
            .begin_new_session(&history, TODAY, date_of, Message::from_ai("Hi", at(10, 9)))
            .unwrap();
        assert!(plan.removed.is_empty());
        assert_eq!(plan.messages.len(), 3);

        let index = SessionIndex::build(&plan.messages, date_of);
        assert!(!mgr.can_create_new_chat(&index, TODAY));
        let err = mgr
            .begin_new_session(&plan.messages, TODAY, date_of, Message::from_ai("Hi", at(10, 10)))
            .unwrap_err();
        assert_eq!(err, NewSessionOutcome::DailyLimitReached);

        // Allowed again once the date advances.
        assert!(mgr.can_create_new_chat(&index, "2024-03-11"));
    }

    #[test]
    fn test_admin_reset_replaces_todays_messages() {
        let mgr = SessionManager::new(true);
        let mut messages = past_and_today();
        messages.push(Message::from_user("user-1", "buy?", at(10, 9)));
        let dropped: Vec<Uuid> = messages[2..].iter().map(|m| m.id).collect();

        let welcome = Message::from_ai("Fresh start", at(10, 11));
        let plan = mgr
            .begin_new_session(&messages, TODAY, date_of, welcome.clone())
            .unwrap();

        assert_eq!(plan.removed, dropped);
        let index = SessionIndex::build(&plan.messages, date_of);
        assert_eq!(index.messages_on(TODAY), std::slice::from_ref(&welcome));
        assert_eq!(index.messages_on("2024-03-08").len(), 2);
    }
}
