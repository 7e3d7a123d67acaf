//! Local filesystem snapshot persistence.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Film, ProgramSnapshot};
use crate::storage::{SnapshotStore, SnapshotSummary};

/// Filesystem-backed snapshot store, one JSON file per source.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    root_dir: PathBuf,
}

impl JsonSnapshotStore {
    /// Create a store rooted at the given state directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path(&self, source_id: &str) -> PathBuf {
        self.root_dir
            .join("snapshots")
            .join(format!("{source_id}.json"))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &PathBuf, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn load(&self, source_id: &str) -> Result<Option<ProgramSnapshot>> {
        let path = self.path(source_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                log::warn!("Failed to read snapshot for {source_id}: {e}. Treating as absent.");
                return Ok(None);
            }
        };

        match serde_json::from_slice::<ProgramSnapshot>(&bytes) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                // A corrupt snapshot is equivalent to no prior snapshot.
                log::warn!("Discarding unreadable snapshot for {source_id}: {e}");
                Ok(None)
            }
        }
    }

    async fn save(&self, source_id: &str, films: &[Film]) -> Result<SnapshotSummary> {
        let snapshot = ProgramSnapshot::new(source_id, films.to_vec());
        let path = self.path(source_id);
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(AppError::Json)?;
        self.write_bytes(&path, &bytes).await?;

        Ok(SnapshotSummary {
            source_id: source_id.to_string(),
            film_count: snapshot.films.len(),
            timestamp: snapshot.timestamp,
            location: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Showtime;
    use tempfile::TempDir;

    fn make_film(title: &str) -> Film {
        Film {
            title: title.to_string(),
            genres: vec!["Drama".into()],
            fsk_rating: Some("FSK 12".into()),
            duration: Some(104),
            description: Some("A film.".into()),
            poster_url: None,
            film_id: None,
            showtimes: vec![Showtime {
                date: "Mo.15.12".into(),
                time: "20:30".into(),
                room: "Kino 2".into(),
                language: Some("OmU".into()),
            }],
        }
    }

    #[tokio::test]
    async fn load_absent_returns_none() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(tmp.path());

        assert!(store.load("meisengeige").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(tmp.path());

        let films = vec![make_film("X"), make_film("Y")];
        let summary = store.save("meisengeige", &films).await.unwrap();
        assert_eq!(summary.film_count, 2);

        let loaded = store.load("meisengeige").await.unwrap().unwrap();
        assert_eq!(loaded.source_id, "meisengeige");
        assert_eq!(loaded.films, films);
    }

    #[tokio::test]
    async fn save_replaces_prior_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(tmp.path());

        store.save("meisengeige", &[make_film("X")]).await.unwrap();
        store.save("meisengeige", &[make_film("Y")]).await.unwrap();

        let loaded = store.load("meisengeige").await.unwrap().unwrap();
        assert_eq!(loaded.films.len(), 1);
        assert_eq!(loaded.films[0].title, "Y");
    }

    #[tokio::test]
    async fn corrupt_snapshot_reads_as_absent() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(tmp.path());

        let path = tmp.path().join("snapshots");
        tokio::fs::create_dir_all(&path).await.unwrap();
        tokio::fs::write(path.join("meisengeige.json"), b"{not json")
            .await
            .unwrap();

        assert!(store.load("meisengeige").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sources_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(tmp.path());

        store.save("meisengeige", &[make_film("X")]).await.unwrap();

        assert!(store.load("kinderkino").await.unwrap().is_none());
        assert!(store.load("meisengeige").await.unwrap().is_some());
    }
}
