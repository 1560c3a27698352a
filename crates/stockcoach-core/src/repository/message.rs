//! Remote message repository trait definition.
//!
//! One row per message, keyed by user id. The remote store is the
//! authoritative history when it answers with at least one row.

use stockcoach_types::error::RepositoryError;
use stockcoach_types::message::Message;
use uuid::Uuid;

/// Repository trait for remote chat message persistence.
///
/// The remote row carries `id`, `sender_id`, `content`, `is_ai` and the
/// creation timestamp; `image_url` is not persisted remotely.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait RemoteMessageRepository: Send + Sync {
    /// Insert one message row for `user_id`.
    fn save_message(
        &self,
        user_id: &str,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All messages of a user, ordered by creation time ASC.
    fn get_messages(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Number of user-authored (non-AI) messages ever stored for a user.
    fn count_user_messages(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;

    /// Delete the given messages of a user. Returns the number of rows removed.
    fn delete_messages(
        &self,
        user_id: &str,
        ids: &[Uuid],
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
