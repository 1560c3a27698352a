//! Application state wiring the chat core to its infrastructure.
//!
//! One `ChatOrchestrator` per user id is created on first use and cached, so
//! the in-memory message list and the single-flight guard are shared by all
//! requests of that user, whatever profile headers they carry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use stockcoach_core::chat::exchange::AiBackend;
use stockcoach_core::chat::orchestrator::{ChatOrchestrator, ChatSettings};
use stockcoach_core::chat::store::MessageStore;
use stockcoach_core::clock::{Clock, SystemClock};
use stockcoach_core::timezone::TimezoneResolver;
use stockcoach_infra::config::load_config;
use stockcoach_infra::filesystem::cache::FileKvStore;
use stockcoach_infra::filesystem::resolve_data_dir;
use stockcoach_infra::geo::ipapi::IpApiLookup;
use stockcoach_infra::sqlite::message::SqliteMessageRepository;
use stockcoach_infra::sqlite::pool::{DatabasePool, database_url};
use stockcoach_infra::webhook::client::HttpWebhookTransport;
use stockcoach_infra::webhook::transcription::TranscriptionClient;
use stockcoach_types::config::CoachConfig;
use stockcoach_types::user::CurrentUser;

/// The orchestrator pinned to the concrete infra implementations.
pub type ConcreteOrchestrator = ChatOrchestrator<
    SqliteMessageRepository,
    FileKvStore,
    IpApiLookup,
    Arc<HttpWebhookTransport>,
>;

/// Shared application state, used by both CLI commands and REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoachConfig>,
    pub data_dir: PathBuf,
    pub transcription: Arc<TranscriptionClient>,
    remote: Arc<SqliteMessageRepository>,
    cache: Arc<FileKvStore>,
    geo: Arc<IpApiLookup>,
    webhook: Option<Arc<HttpWebhookTransport>>,
    clock: Arc<dyn Clock>,
    chats: Arc<DashMap<String, Arc<ConcreteOrchestrator>>>,
}

impl AppState {
    /// Initialize from the default data directory.
    pub async fn init() -> anyhow::Result<Self> {
        Self::with_data_dir(&resolve_data_dir()).await
    }

    /// Initialize from `data_dir`: load config, open the database, wire clients.
    pub async fn with_data_dir(data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let config = load_config(data_dir).await;

        let db_pool = DatabasePool::new(&database_url(data_dir)).await?;

        let webhook = HttpWebhookTransport::from_config(&config).map(Arc::new);
        if webhook.is_none() {
            tracing::info!("no webhook configured, AI replies will be canned");
        }

        Ok(Self {
            transcription: Arc::new(TranscriptionClient::from_config(&config)),
            remote: Arc::new(SqliteMessageRepository::new(db_pool)),
            cache: Arc::new(FileKvStore::new(data_dir.join("cache"))),
            geo: Arc::new(IpApiLookup::new(config.geo_lookup_url.clone())),
            webhook,
            clock: Arc::new(SystemClock),
            chats: Arc::new(DashMap::new()),
            config: Arc::new(config),
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn webhook_configured(&self) -> bool {
        self.webhook.is_some()
    }

    /// Attach admin status from the configured admin list.
    pub fn with_admin_flag(&self, mut user: CurrentUser) -> CurrentUser {
        user.is_admin = user.is_admin || self.config.is_admin_email(&user.email);
        user
    }

    /// The cached orchestrator for `user.id`, created on first use.
    ///
    /// A changed profile (name, skill level, admin flag) is applied to the
    /// cached orchestrator in place.
    pub fn orchestrator_for(&self, user: CurrentUser) -> Arc<ConcreteOrchestrator> {
        let chat = Arc::clone(
            self.chats
                .entry(user.id.clone())
                .or_insert_with(|| Arc::new(self.build_orchestrator(user.clone())))
                .value(),
        );
        chat.update_user(user);
        chat
    }

    fn build_orchestrator(&self, user: CurrentUser) -> ConcreteOrchestrator {
        let store = MessageStore::new(self.remote.clone(), self.cache.clone());
        let timezone = TimezoneResolver::new(
            self.geo.clone(),
            self.cache.clone(),
            self.clock.clone(),
            user.id.clone(),
            self.config.geo_cache_ttl_hours,
        );
        let ai = AiBackend::from_transport(
            self.webhook.clone(),
            Duration::from_secs(self.config.webhook_timeout_secs),
            Duration::from_millis(self.config.mock_delay_ms),
        );
        ChatOrchestrator::new(
            Some(user),
            store,
            timezone,
            ai,
            ChatSettings::from_config(&self.config),
        )
    }
}
