//! The per-user chat surface: load, select a date, start a session, send.
//!
//! `ChatOrchestrator` owns the in-memory message list. Every mutation is an
//! append (or the new-session reset) done under a short write lock that is
//! released before any I/O; persistence and the AI round trip happen outside
//! the lock. Concurrent sends for the same session are rejected by a
//! single-flight guard instead of racing.
//!
//! The profile can be refreshed in place with [`ChatOrchestrator::update_user`];
//! each operation works on a snapshot of the profile taken when it starts.

use std::net::IpAddr;

use dashmap::DashSet;
use stockcoach_types::config::CoachConfig;
use stockcoach_types::message::Message;
use stockcoach_types::session::{
    ChatView, NewSessionOutcome, ReplySource, SendOutcome, SendRejection,
};
use stockcoach_types::user::CurrentUser;
use stockcoach_types::webhook::{LOST_CONNECTION_REPLY, WebhookRequest};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::chat::attachment::ImageAttachment;
use crate::chat::exchange::{AiBackend, ExchangeReply, WebhookTransport};
use crate::chat::session::{SessionIndex, SessionManager};
use crate::chat::store::{LoadSource, MessageStore};
use crate::chat::welcome::welcome_message;
use crate::repository::message::RemoteMessageRepository;
use crate::storage::kv_store::KvStore;
use crate::timezone::{GeoLookup, TimezoneResolver};

/// Shown when the remote history could not be read.
pub const HISTORY_UNAVAILABLE_WARNING: &str =
    "We couldn't reach your saved chat history, so you're seeing the copy stored on this device.";

/// Per-user tunables derived from [`CoachConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    /// Lifetime user-authored messages allowed for non-admins.
    pub message_allowance: u32,
    /// Seed a welcome message for users with no history at all.
    pub seed_welcome: bool,
}

impl ChatSettings {
    pub fn from_config(config: &CoachConfig) -> Self {
        Self {
            message_allowance: config.message_allowance,
            seed_welcome: config.seed_welcome_message,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&CoachConfig::default())
    }
}

#[derive(Debug, Default)]
struct ChatState {
    messages: Vec<Message>,
    selected_date: String,
    loaded: bool,
    history_warning: Option<String>,
}

/// Removes a single-flight key when the send completes or is dropped.
struct InFlightGuard<'a> {
    set: &'a DashSet<String>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

pub struct ChatOrchestrator<R, K, G, T>
where
    R: RemoteMessageRepository,
    K: KvStore,
    G: GeoLookup,
    T: WebhookTransport,
{
    user: std::sync::RwLock<Option<CurrentUser>>,
    store: MessageStore<R, K>,
    timezone: TimezoneResolver<G, K>,
    ai: AiBackend<T>,
    settings: ChatSettings,
    state: RwLock<ChatState>,
    in_flight: DashSet<String>,
}

impl<R, K, G, T> ChatOrchestrator<R, K, G, T>
where
    R: RemoteMessageRepository,
    K: KvStore,
    G: GeoLookup,
    T: WebhookTransport,
{
    pub fn new(
        user: Option<CurrentUser>,
        store: MessageStore<R, K>,
        timezone: TimezoneResolver<G, K>,
        ai: AiBackend<T>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            user: std::sync::RwLock::new(user),
            store,
            timezone,
            ai,
            settings,
            state: RwLock::new(ChatState::default()),
            in_flight: DashSet::new(),
        }
    }

    /// A snapshot of the current profile.
    pub fn user(&self) -> Option<CurrentUser> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the profile (name, skill level, admin flag) without touching
    /// the loaded conversation or any send in progress.
    ///
    /// Returns `false` when the profile was already current.
    pub fn update_user(&self, user: CurrentUser) -> bool {
        let mut guard = self.user.write().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref() == Some(&user) {
            return false;
        }
        debug!(user_id = %user.id, is_admin = user.is_admin, "profile updated");
        *guard = Some(user);
        true
    }

    /// Resolve the timezone and (re)load the user's history.
    ///
    /// Always selects today, even when today has no messages yet.
    pub async fn load(&self, ip: Option<IpAddr>) -> ChatView {
        let source = self.timezone.resolve(ip).await;
        debug!(?source, timezone = %self.timezone.user_timezone(), "timezone resolved");

        let (messages, warning) = match self.user() {
            Some(user) => {
                let seed = self.settings.seed_welcome.then(|| {
                    welcome_message(Some(&user), self.timezone.local_hour(), self.timezone.now())
                });
                let loaded = self.store.load(&user.id, seed).await;
                let warning = match (&loaded.remote_error, loaded.source) {
                    (Some(_), LoadSource::Cache | LoadSource::Seeded | LoadSource::Empty) => {
                        Some(HISTORY_UNAVAILABLE_WARNING.to_string())
                    }
                    _ => None,
                };
                info!(
                    user_id = %user.id,
                    source = ?loaded.source,
                    count = loaded.messages.len(),
                    "chat history loaded"
                );
                (loaded.messages, warning)
            }
            None => (Vec::new(), None),
        };

        {
            let mut state = self.state.write().await;
            state.messages = messages;
            state.selected_date = self.timezone.current_date();
            state.history_warning = warning;
            state.loaded = true;
        }

        self.view().await
    }

    /// Load once; later calls reuse the in-memory list.
    pub async fn ensure_loaded(&self, ip: Option<IpAddr>) {
        if !self.state.read().await.loaded {
            self.load(ip).await;
        }
    }

    /// The current snapshot for the caller.
    pub async fn view(&self) -> ChatView {
        let user = self.user();
        let sessions = session_manager(user.as_ref());
        let today = self.timezone.current_date();
        let (messages, selected, history_warning) = {
            let state = self.state.read().await;
            (
                state.messages.clone(),
                state.selected_date.clone(),
                state.history_warning.clone(),
            )
        };

        let index = self.index(&messages);
        let selected = effective_selection(sessions, &index, selected, &today);
        let remaining_messages = self.remaining_messages(user.as_ref(), &messages).await;

        ChatView {
            state: sessions.state(&index, &selected, &today),
            messages: index.messages_on(&selected).to_vec(),
            history: index.history(),
            is_today_session: sessions.is_today_session(&selected, &today),
            has_today_messages: sessions.has_today_messages(&index, &today),
            can_create_new_chat: user.is_some() && sessions.can_create_new_chat(&index, &today),
            timezone: self.timezone.user_timezone(),
            selected_date: selected,
            current_date: today,
            remaining_messages,
            history_warning,
        }
    }

    /// Focus a date. Only dates with messages, or today, are accepted.
    pub async fn select_date(&self, date: &str) -> bool {
        self.ensure_loaded(None).await;
        let sessions = session_manager(self.user().as_ref());
        let today = self.timezone.current_date();
        let mut state = self.state.write().await;
        let index = self.index(&state.messages);
        if !sessions.is_selectable(&index, date, &today) {
            debug!(date = %date, "ignoring selection of a date without messages");
            return false;
        }
        state.selected_date = date.to_string();
        true
    }

    /// Start a fresh session for today.
    ///
    /// Today's messages are replaced by a single welcome message and today
    /// is selected. Earlier sessions are kept.
    pub async fn clear_messages(&self) -> NewSessionOutcome {
        let Some(user) = self.user() else {
            return NewSessionOutcome::Unauthenticated;
        };
        let sessions = session_manager(Some(&user));
        self.ensure_loaded(None).await;

        let today = self.timezone.current_date();
        let welcome = welcome_message(Some(&user), self.timezone.local_hour(), self.timezone.now());

        let (plan, snapshot) = {
            let mut state = self.state.write().await;
            let plan = match sessions.begin_new_session(
                &state.messages,
                &today,
                |ts| self.timezone.date_of(ts),
                welcome,
            ) {
                Ok(plan) => plan,
                Err(outcome) => {
                    info!(user_id = %user.id, date = %today, "daily session limit reached");
                    return outcome;
                }
            };
            state.messages = plan.messages.clone();
            state.selected_date = today.clone();
            (plan, state.messages.clone())
        };

        if !plan.removed.is_empty() {
            self.store.remove(&user.id, &plan.removed, &snapshot).await;
        }
        let report = self.store.save(&user.id, &plan.welcome, &snapshot).await;
        if !report.is_clean() {
            warn!(user_id = %user.id, ?report, "new session was not fully persisted");
        }

        info!(
            user_id = %user.id,
            date = %today,
            removed = plan.removed.len(),
            "new session started"
        );
        NewSessionOutcome::Started
    }

    /// Send one user turn and append the AI reply.
    ///
    /// An accepted send always appends exactly one user message followed by
    /// exactly one AI message, whatever the webhook does. A rejected send
    /// leaves the message list untouched.
    pub async fn send_message(
        &self,
        content: &str,
        image: Option<ImageAttachment>,
    ) -> SendOutcome {
        let Some(user) = self.user() else {
            return rejected(SendRejection::Unauthenticated);
        };
        let sessions = session_manager(Some(&user));
        let content = content.trim();
        if content.is_empty() && image.is_none() {
            return rejected(SendRejection::EmptyMessage);
        }
        self.ensure_loaded(None).await;

        let today = self.timezone.current_date();
        let (selected, local) = {
            let state = self.state.read().await;
            let index = self.index(&state.messages);
            let selected =
                effective_selection(sessions, &index, state.selected_date.clone(), &today);
            (selected, state.messages.clone())
        };
        if !sessions.is_today_session(&selected, &today) {
            return rejected(SendRejection::ReadOnlySession);
        }

        let key = format!("{}:{}", user.id, today);
        if !self.in_flight.insert(key.clone()) {
            debug!(user_id = %user.id, "send already in flight for this session");
            return rejected(SendRejection::SendInFlight);
        }
        let _guard = InFlightGuard {
            set: &self.in_flight,
            key,
        };

        if !sessions.is_admin() {
            let used = self.store.count_user_messages(&user.id, &local).await;
            if used >= self.settings.message_allowance {
                info!(user_id = %user.id, used, "message allowance exhausted");
                return rejected(SendRejection::AllowanceExhausted);
            }
        }

        let image_url = image.as_ref().map(ImageAttachment::to_data_url);
        let user_message =
            Message::from_user(&user.id, content, self.timezone.now()).with_image(image_url);
        self.append(&user.id, user_message.clone()).await;

        let reply = self.exchange(&user, &user_message).await;

        // Never earlier than the user turn it answers.
        let ai_timestamp = self.timezone.now().max(user_message.timestamp);
        let ai_message = Message::from_ai(reply.content, ai_timestamp);
        self.append(&user.id, ai_message.clone()).await;

        SendOutcome::Delivered {
            user_message,
            ai_message,
            reply_source: reply.source,
        }
    }

    async fn exchange(&self, user: &CurrentUser, message: &Message) -> ExchangeReply {
        match &self.ai {
            AiBackend::Webhook(client) => {
                let request = WebhookRequest {
                    message: message.content.clone(),
                    user_id: user.id.clone(),
                    user_name: user.name.clone(),
                    user_email: user.email.clone(),
                    timestamp: message.timestamp,
                };
                match client.send_message(&request).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!(user_id = %user.id, error = %e, "webhook exchange failed");
                        ExchangeReply {
                            content: LOST_CONNECTION_REPLY.to_string(),
                            source: ReplySource::ConnectionLost,
                        }
                    }
                }
            }
            AiBackend::Canned(responder) => responder.reply().await,
        }
    }

    /// Append under the lock, then persist the snapshot outside it.
    async fn append(&self, user_id: &str, message: Message) {
        let snapshot = {
            let mut state = self.state.write().await;
            state.messages.push(message.clone());
            state.messages.clone()
        };
        let report = self.store.save(user_id, &message, &snapshot).await;
        if !report.is_clean() {
            debug!(
                user_id = %user_id,
                message_id = %message.id,
                ?report,
                "message persisted partially"
            );
        }
    }

    async fn remaining_messages(
        &self,
        user: Option<&CurrentUser>,
        local: &[Message],
    ) -> Option<u32> {
        let Some(user) = user else {
            return Some(0);
        };
        if user.is_admin {
            return None;
        }
        let used = self.store.count_user_messages(&user.id, local).await;
        Some(self.settings.message_allowance.saturating_sub(used))
    }

    fn index(&self, messages: &[Message]) -> SessionIndex {
        SessionIndex::build(messages, |ts| self.timezone.date_of(ts))
    }
}

fn session_manager(user: Option<&CurrentUser>) -> SessionManager {
    SessionManager::new(user.is_some_and(|u| u.is_admin))
}

/// A selection that is no longer valid (e.g. an empty "today" after the
/// date rolled over) falls back to today.
fn effective_selection(
    sessions: SessionManager,
    index: &SessionIndex,
    selected: String,
    today: &str,
) -> String {
    if sessions.is_selectable(index, &selected, today) {
        selected
    } else {
        today.to_string()
    }
}

fn rejected(reason: SendRejection) -> SendOutcome {
    SendOutcome::Rejected { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use serde_json::json;
    use stockcoach_types::session::SessionState;
    use stockcoach_types::user::SkillLevel;

    use crate::chat::exchange::MOCK_RESPONSES;
    use crate::clock::FixedClock;
    use crate::testing::{
        MemoryKvStore, MemoryRemoteStore, Script, ScriptedTransport, StaticGeoLookup,
    };

    type TestOrchestrator =
        ChatOrchestrator<MemoryRemoteStore, MemoryKvStore, StaticGeoLookup, ScriptedTransport>;

    struct Harness {
        remote: MemoryRemoteStore,
        cache: MemoryKvStore,
        clock: Arc<FixedClock>,
    }

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    impl Harness {
        fn new() -> Self {
            Self {
                remote: MemoryRemoteStore::default(),
                cache: MemoryKvStore::default(),
                clock: Arc::new(FixedClock::new(noon(2024, 3, 10))),
            }
        }

        fn orchestrator(
            &self,
            user: Option<CurrentUser>,
            script: Option<Script>,
            settings: ChatSettings,
        ) -> TestOrchestrator {
            let cache = Arc::new(self.cache.clone());
            let store = MessageStore::new(Arc::new(self.remote.clone()), cache.clone());
            let timezone = TimezoneResolver::new(
                Arc::new(StaticGeoLookup::ok("Etc/UTC", "+0000")),
                cache,
                self.clock.clone(),
                "user-1",
                24,
            );
            let ai = AiBackend::from_transport(
                script.map(ScriptedTransport::new),
                Duration::from_secs(30),
                Duration::ZERO,
            );
            ChatOrchestrator::new(user, store, timezone, ai, settings)
        }
    }

    fn user(is_admin: bool) -> CurrentUser {
        CurrentUser {
            id: "user-1".to_string(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            skill_level: SkillLevel::Beginner,
            experience_level: None,
            is_admin,
        }
    }

    fn settings(seed_welcome: bool) -> ChatSettings {
        ChatSettings {
            message_allowance: 100,
            seed_welcome,
        }
    }

    fn delivered(outcome: SendOutcome) -> (Message, Message, ReplySource) {
        match outcome {
            SendOutcome::Delivered {
                user_message,
                ai_message,
                reply_source,
            } => (user_message, ai_message, reply_source),
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_webhook_uses_canned_reply() {
        let h = Harness::new();
        let o = h.orchestrator(Some(user(false)), None, settings(false));
        let before = o.load(None).await;
        assert!(before.messages.is_empty());

        let (u, ai, source) = delivered(o.send_message("hello", None).await);
        assert!(!u.is_ai);
        assert_eq!(u.content, "hello");
        assert!(ai.is_ai);
        assert!(MOCK_RESPONSES.contains(&ai.content.as_str()));
        assert_eq!(source, ReplySource::Canned);

        let view = o.view().await;
        assert_eq!(view.messages, vec![u, ai]);
        assert_eq!(view.state, SessionState::TodaySessionOpen);
    }

    #[tokio::test]
    async fn test_webhook_500_becomes_lost_connection_turn() {
        let h = Harness::new();
        let o = h.orchestrator(Some(user(false)), Some(Script::Status(500)), settings(false));
        o.load(None).await;

        let (u, ai, source) = delivered(o.send_message("Is NVDA overvalued?", None).await);
        assert_eq!(ai.content, LOST_CONNECTION_REPLY);
        assert_eq!(source, ReplySource::ConnectionLost);
        assert!(ai.timestamp >= u.timestamp);
        assert_eq!(o.view().await.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_webhook_success_and_malformed_reply() {
        let h = Harness::new();
        let o = h.orchestrator(
            Some(user(false)),
            Some(Script::Reply(json!({"response": "Check the earnings date."}))),
            settings(false),
        );
        let (_, ai, source) = delivered(o.send_message("hi", None).await);
        assert_eq!(ai.content, "Check the earnings date.");
        assert_eq!(source, ReplySource::Webhook);

        let o = h.orchestrator(
            Some(user(false)),
            Some(Script::Reply(json!({"foo": "bar"}))),
            settings(false),
        );
        let (_, ai, source) = delivered(o.send_message("hi again", None).await);
        assert_eq!(ai.content, stockcoach_types::webhook::FALLBACK_REPLY);
        assert_eq!(source, ReplySource::Fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_webhook_still_completes_turn() {
        let h = Harness::new();
        let o = h.orchestrator(Some(user(false)), Some(Script::Hang), settings(false));
        let (_, ai, source) = delivered(o.send_message("anyone there?", None).await);
        assert_eq!(ai.content, LOST_CONNECTION_REPLY);
        assert_eq!(source, ReplySource::ConnectionLost);
    }

    #[tokio::test]
    async fn test_past_session_is_read_only() {
        let h = Harness::new();
        h.remote
            .push_row("user-1", Message::from_user("user-1", "old question", noon(2024, 3, 1)));
        let o = h.orchestrator(Some(user(false)), None, settings(false));
        o.load(None).await;

        assert!(o.select_date("2024-03-01").await);
        let before = o.view().await;
        assert_eq!(before.state, SessionState::ViewingPastSession);

        let outcome = o.send_message("new question", None).await;
        assert_eq!(
            outcome,
            SendOutcome::Rejected {
                reason: SendRejection::ReadOnlySession
            }
        );
        let after = o.view().await;
        assert_eq!(after.messages, before.messages);
        assert_eq!(h.remote.rows("user-1").len(), 1);
    }

    #[tokio::test]
    async fn test_load_selects_today_over_past_history() {
        let h = Harness::new();
        h.remote
            .push_row("user-1", Message::from_user("user-1", "new year", noon(2024, 1, 1)));
        let o = h.orchestrator(Some(user(false)), None, settings(true));

        let view = o.load(None).await;
        assert_eq!(view.selected_date, "2024-03-10");
        assert_eq!(view.current_date, "2024-03-10");
        assert!(!view.has_today_messages);
        assert!(view.can_create_new_chat);
        assert!(view.messages.is_empty());
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.history[0].date, "2024-01-01");
    }

    #[tokio::test]
    async fn test_allowance_exhausted_rejects_send() {
        let h = Harness::new();
        for i in 0..100 {
            h.remote.push_row(
                "user-1",
                Message::from_user("user-1", format!("q{i}"), noon(2024, 2, 1)),
            );
        }
        let o = h.orchestrator(Some(user(false)), None, settings(false));
        let view = o.load(None).await;
        assert_eq!(view.remaining_messages, Some(0));

        let outcome = o.send_message("one more", None).await;
        assert_eq!(
            outcome,
            SendOutcome::Rejected {
                reason: SendRejection::AllowanceExhausted
            }
        );
        assert_eq!(h.remote.rows("user-1").len(), 100);
        assert!(o.view().await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_admin_is_not_limited() {
        let h = Harness::new();
        for i in 0..100 {
            h.remote.push_row(
                "user-1",
                Message::from_user("user-1", format!("q{i}"), noon(2024, 2, 1)),
            );
        }
        let o = h.orchestrator(Some(user(true)), None, settings(false));
        assert_eq!(o.load(None).await.remaining_messages, None);
        assert!(o.send_message("one more", None).await.is_delivered());
    }

    #[tokio::test]
    async fn test_profile_update_keeps_conversation() {
        let h = Harness::new();
        for i in 0..99 {
            h.remote.push_row(
                "user-1",
                Message::from_user("user-1", format!("q{i}"), noon(2024, 2, 1)),
            );
        }
        let o = h.orchestrator(Some(user(false)), None, settings(false));
        o.load(None).await;
        assert!(o.send_message("last allowed", None).await.is_delivered());
        assert_eq!(o.view().await.remaining_messages, Some(0));

        assert!(!o.update_user(user(false)));
        assert!(o.update_user(user(true)));
        assert_eq!(o.user().map(|u| u.is_admin), Some(true));

        let view = o.view().await;
        assert_eq!(view.remaining_messages, None);
        assert_eq!(view.messages.len(), 2);
        assert!(o.send_message("one more", None).await.is_delivered());
        assert_eq!(o.view().await.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_unauthenticated_is_a_no_op() {
        let h = Harness::new();
        let o = h.orchestrator(None, None, settings(true));
        let view = o.load(None).await;
        assert!(view.messages.is_empty());
        assert!(!view.can_create_new_chat);

        assert_eq!(
            o.send_message("hello", None).await,
            SendOutcome::Rejected {
                reason: SendRejection::Unauthenticated
            }
        );
        assert_eq!(o.clear_messages().await, NewSessionOutcome::Unauthenticated);
        assert!(h.remote.rows("user-1").is_empty());
    }

    #[tokio::test]
    async fn test_one_session_per_day_until_date_advances() {
        let h = Harness::new();
        let o = h.orchestrator(Some(user(false)), None, settings(true));

        // First load seeds today's welcome message.
        let view = o.load(None).await;
        assert_eq!(view.messages.len(), 1);
        assert!(!view.can_create_new_chat);
        assert_eq!(o.clear_messages().await, NewSessionOutcome::DailyLimitReached);

        h.clock.advance(TimeDelta::days(1));
        assert!(o.view().await.can_create_new_chat);
        assert_eq!(o.clear_messages().await, NewSessionOutcome::Started);

        let view = o.view().await;
        assert_eq!(view.selected_date, "2024-03-11");
        assert_eq!(view.messages.len(), 1);
        assert!(!view.can_create_new_chat);
        assert_eq!(view.history.len(), 2);
    }

    #[tokio::test]
    async fn test_admin_reset_keeps_one_welcome_today() {
        let h = Harness::new();
        let o = h.orchestrator(Some(user(true)), None, settings(true));
        o.load(None).await;
        o.send_message("hello", None).await;

        assert_eq!(o.clear_messages().await, NewSessionOutcome::Started);
        assert_eq!(o.clear_messages().await, NewSessionOutcome::Started);

        let view = o.view().await;
        assert_eq!(view.messages.len(), 1);
        assert!(view.messages[0].is_ai);
        // Removed rows are gone remotely too.
        assert_eq!(h.remote.rows("user-1").len(), 1);
    }

    #[tokio::test]
    async fn test_select_unknown_date_is_refused() {
        let h = Harness::new();
        let o = h.orchestrator(Some(user(false)), None, settings(false));
        o.load(None).await;
        assert!(!o.select_date("2023-12-25").await);
        assert!(o.select_date("2024-03-10").await);
        assert_eq!(o.view().await.selected_date, "2024-03-10");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_send_is_rejected() {
        let h = Harness::new();
        let o = h.orchestrator(Some(user(false)), Some(Script::Hang), settings(false));
        o.load(None).await;

        let (first, second) = tokio::join!(
            o.send_message("first", None),
            o.send_message("second", None)
        );
        assert!(first.is_delivered());
        assert_eq!(
            second,
            SendOutcome::Rejected {
                reason: SendRejection::SendInFlight
            }
        );
        assert_eq!(o.view().await.messages.len(), 2);

        // The guard is released once the first turn completes.
        assert!(o.send_message("third", None).await.is_delivered());
    }

    #[tokio::test]
    async fn test_image_is_attached_as_data_url() {
        let h = Harness::new();
        let o = h.orchestrator(Some(user(false)), None, settings(false));
        let image = ImageAttachment::new("image/png", vec![0x89, 0x50, 0x4e, 0x47]).unwrap();

        let (u, _, _) = delivered(o.send_message("what's this chart?", Some(image)).await);
        assert_eq!(u.image_url.as_deref(), Some("data:image/png;base64,iVBORw=="));
    }

    #[tokio::test]
    async fn test_remote_outage_shows_cached_history_with_warning() {
        let h = Harness::new();
        let o = h.orchestrator(Some(user(false)), None, settings(false));
        o.send_message("hello", None).await;

        h.remote.set_fail_reads(true);
        let o = h.orchestrator(Some(user(false)), None, settings(false));
        let view = o.load(None).await;
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.history_warning.as_deref(), Some(HISTORY_UNAVAILABLE_WARNING));
        // Counted locally while the remote store is down.
        assert_eq!(view.remaining_messages, Some(99));
    }
}
