//! Persistent state: program snapshots and subscriber records.
//!
//! ## Layout
//!
//! ```text
//! {state_dir}/
//! ├── config.toml              # Application configuration
//! ├── subscribers.json         # Subscriptions + per-user preferences
//! └── snapshots/
//!     ├── meisengeige.json     # Last persisted listing per source
//!     └── kinderkino.json
//! ```
//!
//! All writes are atomic (temp file, then rename), so a crash mid-write
//! leaves the previous state intact.

pub mod snapshots;
pub mod subscribers;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::locale::Lang;
use crate::models::{Film, ProgramSnapshot};

// Re-export for convenience
pub use snapshots::JsonSnapshotStore;
pub use subscribers::{JsonSubscriberStore, VERSION_UNSEEN};

/// Source that legacy single-source subscriber records are upgraded to.
pub const LEGACY_DEFAULT_SOURCE: &str = "meisengeige";

/// Metadata about a snapshot write.
#[derive(Debug, Clone)]
pub struct SnapshotSummary {
    pub source_id: String,
    pub film_count: usize,
    pub timestamp: DateTime<Utc>,
    pub location: String,
}

/// Trait for snapshot storage backends.
///
/// At most one snapshot is retained per source.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Last persisted snapshot for the source. Missing or unreadable state
    /// reads as `None`; the load path never fails the cycle.
    async fn load(&self, source_id: &str) -> Result<Option<ProgramSnapshot>>;

    /// Persist a new snapshot with a fresh timestamp, atomically replacing
    /// any prior snapshot for the source.
    async fn save(&self, source_id: &str, films: &[Film]) -> Result<SnapshotSummary>;
}

/// Trait for subscriber storage backends.
///
/// Every mutating operation is atomic with respect to its own
/// read-modify-write cycle and safe to call from concurrent chat sessions.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Subscribe a chat to a source. Returns `false` if already subscribed.
    async fn add_subscription(&self, chat_id: i64, source_id: &str) -> Result<bool>;

    /// Unsubscribe a chat from a source. Returns `false` if not subscribed.
    /// The record is deleted entirely when its source set becomes empty.
    async fn remove_subscription(&self, chat_id: i64, source_id: &str) -> Result<bool>;

    /// Sources the chat is subscribed to; empty if no record.
    async fn user_sources(&self, chat_id: i64) -> Result<Vec<String>>;

    /// With a source: membership test. Without: "has at least one
    /// subscription".
    async fn is_subscribed(&self, chat_id: i64, source_id: Option<&str>) -> Result<bool>;

    /// All chats subscribed to the source.
    async fn subscribers_for_source(&self, source_id: &str) -> Result<BTreeSet<i64>>;

    /// Count for one source, or total distinct subscribers if omitted.
    async fn subscriber_count(&self, source_id: Option<&str>) -> Result<usize>;

    async fn set_language(&self, chat_id: i64, language: Lang) -> Result<()>;

    /// Stored language, or the configured fallback when unset.
    async fn language(&self, chat_id: i64) -> Result<Lang>;

    async fn has_language_set(&self, chat_id: i64) -> Result<bool>;

    async fn set_version(&self, chat_id: i64, version: &str) -> Result<()>;

    /// Last product version the user was notified about, or the
    /// [`VERSION_UNSEEN`] sentinel.
    async fn version(&self, chat_id: i64) -> Result<String>;

    /// Legacy: subscribe to the historical default source.
    async fn add_subscriber(&self, chat_id: i64) -> Result<bool>;

    /// Legacy: delete the whole record regardless of which sources are
    /// present.
    async fn remove_subscriber(&self, chat_id: i64) -> Result<bool>;

    /// Legacy: all chat IDs with any subscription.
    async fn all_subscribers(&self) -> Result<BTreeSet<i64>>;
}
