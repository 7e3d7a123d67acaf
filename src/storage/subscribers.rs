//! Subscriber persistence.
//!
//! One JSON document holds the subscription records and the per-user
//! preferences. A single mutex serializes every read-modify-write cycle, so
//! concurrent chat sessions cannot lose updates, and each mutation is
//! written out atomically before the operation returns.
//!
//! The loader also understands the older persisted shape, a flat list of
//! chat IDs: `{"subscribers": [123, 456]}`. Those are upgraded in-memory to
//! records subscribed to the legacy default source before any operation
//! proceeds.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::locale::Lang;
use crate::models::{Preferences, Subscription};
use crate::storage::{LEGACY_DEFAULT_SOURCE, SubscriberStore};

/// Sentinel version "older than any real version".
pub const VERSION_UNSEEN: &str = "0.0.0";

/// Persisted document, as read. The `subscribers` field accepts both the
/// current record map and the legacy flat list.
#[derive(Debug, Deserialize)]
struct FileIn {
    #[serde(default)]
    subscribers: RawSubscribers,
    #[serde(default)]
    preferences: BTreeMap<i64, Preferences>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSubscribers {
    Records(BTreeMap<i64, Subscription>),
    Legacy(Vec<i64>),
}

impl Default for RawSubscribers {
    fn default() -> Self {
        RawSubscribers::Records(BTreeMap::new())
    }
}

/// Persisted document, as written. Always the current format.
#[derive(Debug, Serialize)]
struct FileOut<'a> {
    subscribers: &'a BTreeMap<i64, Subscription>,
    preferences: &'a BTreeMap<i64, Preferences>,
}

#[derive(Debug, Default)]
struct State {
    /// Invariant: every record has a non-empty source set.
    subscriptions: BTreeMap<i64, Subscription>,
    preferences: BTreeMap<i64, Preferences>,
}

/// Upgrade a loaded document to the in-memory state.
///
/// Idempotent: a document already in the current format passes through
/// unchanged, apart from lifting inline record languages into preferences
/// and dropping empty-source records (which are equivalent to absence).
fn migrate(file: FileIn) -> State {
    let mut preferences = file.preferences;

    let subscriptions = match file.subscribers {
        RawSubscribers::Legacy(chat_ids) => {
            log::info!(
                "Migrating {} subscriber(s) from the legacy flat-list format",
                chat_ids.len()
            );
            chat_ids
                .into_iter()
                .map(|chat_id| {
                    (
                        chat_id,
                        Subscription {
                            sources: vec![LEGACY_DEFAULT_SOURCE.to_string()],
                            language: None,
                        },
                    )
                })
                .collect()
        }
        RawSubscribers::Records(records) => {
            let mut subscriptions = BTreeMap::new();
            for (chat_id, mut record) in records {
                if let Some(language) = record.language.take() {
                    let prefs = preferences.entry(chat_id).or_default();
                    if prefs.language.is_none() {
                        prefs.language = Some(language);
                    }
                }
                if record.sources.is_empty() {
                    // Equivalent to absence; normalized away at load.
                    log::debug!("Dropping empty-source record for chat {chat_id}");
                    continue;
                }
                subscriptions.insert(chat_id, record);
            }
            subscriptions
        }
    };

    State {
        subscriptions,
        preferences,
    }
}

/// Filesystem-backed subscriber store.
pub struct JsonSubscriberStore {
    path: PathBuf,
    default_language: Lang,
    state: Mutex<State>,
}

impl JsonSubscriberStore {
    /// Open (or initialize) the store under the given state directory.
    ///
    /// An undecodable document is treated as empty, matching the snapshot
    /// load policy; hard I/O errors other than "not found" are propagated.
    pub async fn open(state_dir: impl AsRef<Path>, default_language: Lang) -> Result<Self> {
        let path = state_dir.as_ref().join("subscribers.json");

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<FileIn>(&bytes) {
                Ok(file) => migrate(file),
                Err(e) => {
                    log::warn!(
                        "Unreadable subscriber state at {}: {e}. Starting empty.",
                        path.display()
                    );
                    State::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(e) => return Err(AppError::Io(e)),
        };

        Ok(Self {
            path,
            default_language,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &State) -> Result<()> {
        let out = FileOut {
            subscribers: &state.subscriptions,
            preferences: &state.preferences,
        };
        let bytes = serde_json::to_vec_pretty(&out)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriberStore for JsonSubscriberStore {
    async fn add_subscription(&self, chat_id: i64, source_id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let record = state.subscriptions.entry(chat_id).or_default();

        if record.sources.iter().any(|s| s == source_id) {
            return Ok(false);
        }
        record.sources.push(source_id.to_string());

        self.persist(&state).await?;
        Ok(true)
    }

    async fn remove_subscription(&self, chat_id: i64, source_id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;

        let Some(record) = state.subscriptions.get_mut(&chat_id) else {
            return Ok(false);
        };
        let Some(pos) = record.sources.iter().position(|s| s == source_id) else {
            return Ok(false);
        };
        record.sources.remove(pos);

        let now_empty = record.sources.is_empty();
        if now_empty {
            state.subscriptions.remove(&chat_id);
        }

        self.persist(&state).await?;
        Ok(true)
    }

    async fn user_sources(&self, chat_id: i64) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .get(&chat_id)
            .map(|r| r.sources.clone())
            .unwrap_or_default())
    }

    async fn is_subscribed(&self, chat_id: i64, source_id: Option<&str>) -> Result<bool> {
        let state = self.state.lock().await;
        let Some(record) = state.subscriptions.get(&chat_id) else {
            return Ok(false);
        };
        Ok(match source_id {
            Some(source_id) => record.sources.iter().any(|s| s == source_id),
            None => !record.sources.is_empty(),
        })
    }

    async fn subscribers_for_source(&self, source_id: &str) -> Result<BTreeSet<i64>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|(_, r)| r.sources.iter().any(|s| s == source_id))
            .map(|(chat_id, _)| *chat_id)
            .collect())
    }

    async fn subscriber_count(&self, source_id: Option<&str>) -> Result<usize> {
        let state = self.state.lock().await;
        Ok(match source_id {
            None => state.subscriptions.len(),
            Some(source_id) => state
                .subscriptions
                .values()
                .filter(|r| r.sources.iter().any(|s| s == source_id))
                .count(),
        })
    }

    async fn set_language(&self, chat_id: i64, language: Lang) -> Result<()> {
        let mut state = self.state.lock().await;
        state.preferences.entry(chat_id).or_default().language = Some(language.code().to_string());
        self.persist(&state).await
    }

    async fn language(&self, chat_id: i64) -> Result<Lang> {
        let state = self.state.lock().await;
        Ok(state
            .preferences
            .get(&chat_id)
            .and_then(|p| p.language.as_deref())
            .map(Lang::from_code)
            .unwrap_or(self.default_language))
    }

    async fn has_language_set(&self, chat_id: i64) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state
            .preferences
            .get(&chat_id)
            .is_some_and(|p| p.language.is_some()))
    }

    async fn set_version(&self, chat_id: i64, version: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.preferences.entry(chat_id).or_default().version = Some(version.to_string());
        self.persist(&state).await
    }

    async fn version(&self, chat_id: i64) -> Result<String> {
        let state = self.state.lock().await;
        Ok(state
            .preferences
            .get(&chat_id)
            .and_then(|p| p.version.clone())
            .unwrap_or_else(|| VERSION_UNSEEN.to_string()))
    }

    async fn add_subscriber(&self, chat_id: i64) -> Result<bool> {
        self.add_subscription(chat_id, LEGACY_DEFAULT_SOURCE).await
    }

    async fn remove_subscriber(&self, chat_id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.subscriptions.remove(&chat_id).is_none() {
            return Ok(false);
        }
        self.persist(&state).await?;
        Ok(true)
    }

    async fn all_subscribers(&self) -> Result<BTreeSet<i64>> {
        let state = self.state.lock().await;
        Ok(state.subscriptions.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_store(tmp: &TempDir) -> JsonSubscriberStore {
        JsonSubscriberStore::open(tmp.path(), Lang::Ru)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn add_subscription_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        assert!(store.add_subscription(1, "meisengeige").await.unwrap());
        assert!(!store.add_subscription(1, "meisengeige").await.unwrap());
    }

    #[tokio::test]
    async fn remove_unknown_subscription_is_noop() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        assert!(!store.remove_subscription(1, "meisengeige").await.unwrap());

        store.add_subscription(1, "meisengeige").await.unwrap();
        assert!(!store.remove_subscription(1, "kinderkino").await.unwrap());
        assert!(!store.remove_subscription(2, "meisengeige").await.unwrap());
    }

    #[tokio::test]
    async fn record_disappears_when_last_source_removed() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        store.add_subscription(7, "meisengeige").await.unwrap();
        store.add_subscription(7, "kinderkino").await.unwrap();

        let sources = store.user_sources(7).await.unwrap();
        assert_eq!(sources, vec!["meisengeige", "kinderkino"]);

        assert!(store.remove_subscription(7, "meisengeige").await.unwrap());
        assert!(store.remove_subscription(7, "kinderkino").await.unwrap());

        assert_eq!(store.subscriber_count(None).await.unwrap(), 0);
        assert!(store.user_sources(7).await.unwrap().is_empty());
        assert!(!store.is_subscribed(7, None).await.unwrap());
        assert!(store.all_subscribers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscriptions_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = open_store(&tmp).await;
            store.add_subscription(1, "meisengeige").await.unwrap();
            store.add_subscription(2, "kinderkino").await.unwrap();
            store.set_language(1, Lang::De).await.unwrap();
        }

        let store = open_store(&tmp).await;
        assert!(store.is_subscribed(1, Some("meisengeige")).await.unwrap());
        assert!(store.is_subscribed(2, Some("kinderkino")).await.unwrap());
        assert_eq!(store.language(1).await.unwrap(), Lang::De);
        assert_eq!(store.subscriber_count(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn legacy_flat_list_is_migrated() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("subscribers.json"),
            br#"{"subscribers": [123, 456]}"#,
        )
        .await
        .unwrap();

        let store = open_store(&tmp).await;
        assert_eq!(store.subscriber_count(None).await.unwrap(), 2);
        assert_eq!(
            store.user_sources(123).await.unwrap(),
            vec![LEGACY_DEFAULT_SOURCE]
        );
        assert!(store.is_subscribed(456, Some("meisengeige")).await.unwrap());
    }

    #[tokio::test]
    async fn migration_is_idempotent_across_reopens() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("subscribers.json"),
            br#"{"subscribers": [123]}"#,
        )
        .await
        .unwrap();

        {
            let store = open_store(&tmp).await;
            // Any mutation persists the migrated state in the new format.
            store.add_subscription(456, "kinderkino").await.unwrap();
        }

        let store = open_store(&tmp).await;
        assert_eq!(
            store.user_sources(123).await.unwrap(),
            vec![LEGACY_DEFAULT_SOURCE]
        );
        assert_eq!(store.user_sources(456).await.unwrap(), vec!["kinderkino"]);
    }

    #[tokio::test]
    async fn inline_record_language_is_lifted_into_preferences() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("subscribers.json"),
            br#"{"subscribers": {"9": {"sources": ["meisengeige"], "language": "de"}}}"#,
        )
        .await
        .unwrap();

        let store = open_store(&tmp).await;
        assert_eq!(store.language(9).await.unwrap(), Lang::De);
        assert!(store.has_language_set(9).await.unwrap());

        // Language outlives the subscription record.
        store.remove_subscription(9, "meisengeige").await.unwrap();
        assert!(!store.is_subscribed(9, None).await.unwrap());
        assert_eq!(store.language(9).await.unwrap(), Lang::De);
    }

    #[tokio::test]
    async fn language_can_be_set_before_subscribing() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        store.set_language(5, Lang::En).await.unwrap();
        assert!(!store.is_subscribed(5, None).await.unwrap());
        assert_eq!(store.language(5).await.unwrap(), Lang::En);
        assert_eq!(store.subscriber_count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn language_defaults_to_store_fallback() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSubscriberStore::open(tmp.path(), Lang::En)
            .await
            .unwrap();

        assert_eq!(store.language(1).await.unwrap(), Lang::En);
        assert!(!store.has_language_set(1).await.unwrap());
    }

    #[tokio::test]
    async fn version_defaults_to_sentinel() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        assert_eq!(store.version(1).await.unwrap(), VERSION_UNSEEN);
        store.set_version(1, "1.1.0").await.unwrap();
        assert_eq!(store.version(1).await.unwrap(), "1.1.0");
    }

    #[tokio::test]
    async fn subscribers_for_source_filters_by_source() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        store.add_subscription(1, "meisengeige").await.unwrap();
        store.add_subscription(2, "kinderkino").await.unwrap();
        store.add_subscription(3, "meisengeige").await.unwrap();
        store.add_subscription(3, "kinderkino").await.unwrap();

        let meisengeige = store.subscribers_for_source("meisengeige").await.unwrap();
        assert_eq!(meisengeige, BTreeSet::from([1, 3]));
        assert_eq!(store.subscriber_count(Some("kinderkino")).await.unwrap(), 2);
        assert_eq!(store.subscriber_count(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn legacy_operations() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        assert!(store.add_subscriber(11).await.unwrap());
        assert_eq!(
            store.user_sources(11).await.unwrap(),
            vec![LEGACY_DEFAULT_SOURCE]
        );

        store.add_subscription(11, "kinderkino").await.unwrap();
        // remove_subscriber drops the whole record regardless of sources.
        assert!(store.remove_subscriber(11).await.unwrap());
        assert!(!store.remove_subscriber(11).await.unwrap());
        assert!(store.user_sources(11).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_state_starts_empty() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("subscribers.json"), b"{broken")
            .await
            .unwrap();

        let store = open_store(&tmp).await;
        assert_eq!(store.subscriber_count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_double_tap_yields_one_add() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(open_store(&tmp).await);

        let a = Arc::clone(&store);
        let b = Arc::clone(&store);
        let (first, second) = tokio::join!(
            tokio::spawn(async move { a.add_subscription(1, "meisengeige").await.unwrap() }),
            tokio::spawn(async move { b.add_subscription(1, "meisengeige").await.unwrap() }),
        );

        let results = [first.unwrap(), second.unwrap()];
        assert_eq!(results.iter().filter(|added| **added).count(), 1);
        assert_eq!(store.user_sources(1).await.unwrap(), vec!["meisengeige"]);
    }
}
