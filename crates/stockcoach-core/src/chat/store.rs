//! Message store adapter: remote store + local cache.
//!
//! Reads prefer the remote store and fall back to the local cache; writes go
//! to the local cache first (full snapshot, write-through) and then to the
//! remote store. Remote failures are reported, never rolled back; the
//! local cache is the durable fallback of record.

use std::collections::HashMap;
use std::sync::Arc;

use stockcoach_types::error::RepositoryError;
use stockcoach_types::message::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::repository::message::RemoteMessageRepository;
use crate::storage::kv_store::KvStore;

/// Cache namespace of per-user message snapshots.
pub const MESSAGES_NAMESPACE: &str = "messages";

/// Where a loaded history came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    Cache,
    /// Nothing anywhere; a welcome message was seeded.
    Seeded,
    /// Nothing anywhere and seeding is disabled.
    Empty,
}

/// Result of [`MessageStore::load`].
#[derive(Debug, Clone)]
pub struct LoadedHistory {
    pub messages: Vec<Message>,
    pub source: LoadSource,
    /// Set when the remote read failed (as opposed to returning no rows).
    pub remote_error: Option<String>,
}

/// Outcome of a persistence event. Both halves are best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub cache_error: Option<String>,
    pub remote_error: Option<String>,
}

impl SaveReport {
    pub fn is_clean(&self) -> bool {
        self.cache_error.is_none() && self.remote_error.is_none()
    }
}

/// Persists one user's messages to the remote store and the local cache.
pub struct MessageStore<R: RemoteMessageRepository, K: KvStore> {
    remote: Arc<R>,
    cache: Arc<K>,
}

impl<R: RemoteMessageRepository, K: KvStore> MessageStore<R, K> {
    pub fn new(remote: Arc<R>, cache: Arc<K>) -> Self {
        Self { remote, cache }
    }

    /// Load a user's history.
    ///
    /// 1. Remote rows, if there is at least one. The cache is rewritten with
    ///    them, keeping cached `image_url`s of the same ids.
    /// 2. Otherwise the cached snapshot.
    /// 3. Otherwise `seed` (persisted), or nothing.
    pub async fn load(&self, user_id: &str, seed: Option<Message>) -> LoadedHistory {
        let mut remote_error = None;

        match self.remote.get_messages(user_id).await {
            Ok(rows) if !rows.is_empty() => {
                let cached = self.read_cache(user_id).await.unwrap_or_default();
                let messages = reconcile(rows, &cached);
                if let Err(e) = self.write_cache(user_id, &messages).await {
                    warn!(user_id = %user_id, error = %e, "failed to refresh message cache");
                }
                debug!(
                    user_id = %user_id,
                    count = messages.len(),
                    "loaded history from remote store"
                );
                return LoadedHistory {
                    messages,
                    source: LoadSource::Remote,
                    remote_error,
                };
            }
            Ok(_) => {
                debug!(user_id = %user_id, "remote store has no history, trying cache");
            }
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "failed to load remote history, trying cache"
                );
                remote_error = Some(e.to_string());
            }
        }

        if let Some(mut messages) = self.read_cache(user_id).await {
            if !messages.is_empty() {
                messages.sort_by_key(|m| m.timestamp);
                debug!(user_id = %user_id, count = messages.len(), "loaded history from cache");
                return LoadedHistory {
                    messages,
                    source: LoadSource::Cache,
                    remote_error,
                };
            }
        }

        match seed {
            Some(welcome) => {
                info!(user_id = %user_id, "no history found, seeding welcome message");
                let messages = vec![welcome.clone()];
                let report = self.save(user_id, &welcome, &messages).await;
                if !report.is_clean() {
                    warn!(
                        user_id = %user_id,
                        ?report,
                        "seeded welcome message was not fully persisted"
                    );
                }
                LoadedHistory {
                    messages,
                    source: LoadSource::Seeded,
                    remote_error,
                }
            }
            None => LoadedHistory {
                messages: Vec::new(),
                source: LoadSource::Empty,
                remote_error,
            },
        }
    }

    /// Persist one new message.
    ///
    /// `snapshot` is the full in-memory list (already containing `message`)
    /// and replaces the cached copy before the remote insert is attempted.
    pub async fn save(&self, user_id: &str, message: &Message, snapshot: &[Message]) -> SaveReport {
        let mut report = SaveReport::default();

        if let Err(e) = self.write_cache(user_id, snapshot).await {
            warn!(
                user_id = %user_id,
                message_id = %message.id,
                error = %e,
                "failed to mirror messages to cache"
            );
            report.cache_error = Some(e.to_string());
        }

        if let Err(e) = self.remote.save_message(user_id, message).await {
            warn!(
                user_id = %user_id,
                message_id = %message.id,
                error = %e,
                "failed to save message remotely"
            );
            report.remote_error = Some(e.to_string());
        }

        report
    }

    /// Remove messages (the admin session reset) and mirror the new snapshot.
    pub async fn remove(&self, user_id: &str, ids: &[Uuid], snapshot: &[Message]) -> SaveReport {
        let mut report = SaveReport::default();

        if let Err(e) = self.write_cache(user_id, snapshot).await {
            warn!(user_id = %user_id, error = %e, "failed to mirror messages to cache");
            report.cache_error = Some(e.to_string());
        }

        if !ids.is_empty() {
            match self.remote.delete_messages(user_id, ids).await {
                Ok(removed) => {
                    info!(user_id = %user_id, removed, "removed messages from remote store");
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "failed to remove messages remotely");
                    report.remote_error = Some(e.to_string());
                }
            }
        }

        report
    }

    /// Lifetime count of user-authored messages.
    ///
    /// Counted by the remote store; falls back to `local` when it is unreachable.
    pub async fn count_user_messages(&self, user_id: &str, local: &[Message]) -> u32 {
        match self.remote.count_user_messages(user_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "failed to count remote messages, counting locally"
                );
                local.iter().filter(|m| !m.is_ai).count() as u32
            }
        }
    }

    /// The cached snapshot; `None` when absent or unreadable.
    async fn read_cache(&self, user_id: &str) -> Option<Vec<Message>> {
        let value = match self.cache.get(MESSAGES_NAMESPACE, user_id).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "failed to read message cache");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(messages) => Some(messages),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "discarding unreadable message cache");
                None
            }
        }
    }

    async fn write_cache(
        &self,
        user_id: &str,
        snapshot: &[Message],
    ) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(snapshot)
            .map_err(|e| RepositoryError::Cache(format!("failed to serialize messages: {e}")))?;
        self.cache.set(MESSAGES_NAMESPACE, user_id, &value).await
    }
}

/// Remote rows are authoritative; cached copies only contribute `image_url`,
/// which the remote schema does not carry.
fn reconcile(rows: Vec<Message>, cached: &[Message]) -> Vec<Message> {
    let images: HashMap<Uuid, &str> = cached
        .iter()
        .filter_map(|m| m.image_url.as_deref().map(|url| (m.id, url)))
        .collect();

    rows.into_iter()
        .map(|mut m| {
            if m.image_url.is_none() {
                m.image_url = images.get(&m.id).map(|url| url.to_string());
            }
            m
        })
        .collect()
}
