//! In-memory fakes of the core ports, for unit tests.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stockcoach_types::error::{ExchangeError, GeoError, RepositoryError};
use stockcoach_types::message::Message;
use stockcoach_types::webhook::WebhookRequest;
use uuid::Uuid;

use crate::chat::exchange::WebhookTransport;
use crate::repository::message::RemoteMessageRepository;
use crate::storage::kv_store::KvStore;
use crate::timezone::{GeoLocation, GeoLookup};

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<HashMap<(String, String), serde_json::Value>>>,
    fail: Arc<AtomicBool>,
}

impl MemoryKvStore {
    pub fn contains(&self, namespace: &str, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .contains_key(&(namespace.to_string(), key.to_string()))
    }

    pub fn insert_raw(&self, namespace: &str, key: &str, value: serde_json::Value) {
        self.entries
            .lock()
            .unwrap()
            .insert((namespace.to_string(), key.to_string()), value);
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<serde_json::Value> {
        self.entries
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

impl KvStore for MemoryKvStore {
    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Cache("cache unavailable".to_string()));
        }
        Ok(self.raw(namespace, key))
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Cache("cache unavailable".to_string()));
        }
        self.insert_raw(namespace, key, value.clone());
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), RepositoryError> {
        self.entries
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RemoteMessageRepository
// ---------------------------------------------------------------------------

/// Remote store fake. Drops `image_url` on save, like the real row schema.
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    rows: Arc<Mutex<HashMap<String, Vec<Message>>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryRemoteStore {
    pub fn set_fail_reads(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn rows(&self, user_id: &str) -> Vec<Message> {
        self.rows
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn push_row(&self, user_id: &str, message: Message) {
        let mut message = message;
        message.image_url = None;
        self.rows
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push(message);
    }
}

impl RemoteMessageRepository for MemoryRemoteStore {
    async fn save_message(&self, user_id: &str, message: &Message) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        self.push_row(user_id, message.clone());
        Ok(())
    }

    async fn get_messages(&self, user_id: &str) -> Result<Vec<Message>, RepositoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        let mut rows = self.rows(user_id);
        rows.sort_by_key(|m| m.timestamp);
        Ok(rows)
    }

    async fn count_user_messages(&self, user_id: &str) -> Result<u32, RepositoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        Ok(self.rows(user_id).iter().filter(|m| !m.is_ai).count() as u32)
    }

    async fn delete_messages(&self, user_id: &str, ids: &[Uuid]) -> Result<u64, RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        let mut rows = self.rows.lock().unwrap();
        let Some(list) = rows.get_mut(user_id) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|m| !ids.contains(&m.id));
        Ok((before - list.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// GeoLookup
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct StaticGeoLookup {
    location: Option<GeoLocation>,
    calls: Arc<AtomicUsize>,
}

impl StaticGeoLookup {
    pub fn ok(timezone: &str, utc_offset: &str) -> Self {
        Self {
            location: Some(GeoLocation {
                timezone: timezone.to_string(),
                utc_offset: utc_offset.to_string(),
                country_code: None,
            }),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            location: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeoLookup for StaticGeoLookup {
    async fn lookup(&self, _ip: Option<IpAddr>) -> Result<GeoLocation, GeoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.location
            .clone()
            .ok_or_else(|| GeoError::Request("network unreachable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// WebhookTransport
// ---------------------------------------------------------------------------

/// What the scripted webhook does on every call.
#[derive(Clone)]
pub enum Script {
    Reply(serde_json::Value),
    Status(u16),
    NetworkError,
    Hang,
}

#[derive(Clone)]
pub struct ScriptedTransport {
    script: Script,
    requests: Arc<Mutex<Vec<WebhookRequest>>>,
}

impl ScriptedTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<WebhookRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl WebhookTransport for ScriptedTransport {
    async fn post_json(
        &self,
        request: &WebhookRequest,
    ) -> Result<serde_json::Value, ExchangeError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            Script::Reply(body) => Ok(body.clone()),
            Script::Status(status) => Err(ExchangeError::Http {
                status: *status,
                body: String::new(),
            }),
            Script::NetworkError => Err(ExchangeError::Network("connection refused".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ExchangeError::Network("unreachable".to_string()))
            }
        }
    }
}
