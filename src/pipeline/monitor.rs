//! Monitoring cycle: scrape → diff → notify → persist, per source.
//!
//! Sources run strictly sequentially within one invocation; a failure in one
//! source never halts processing of the remaining sources.

use std::time::Duration;

use crate::models::SourceConfig;
use crate::pipeline::{NotificationDispatcher, diff_program};
use crate::services::{ProgramScraper, SourceRegistry};
use crate::storage::{SnapshotStore, SubscriberStore};

/// Result of one source's cycle.
#[derive(Debug)]
pub enum SourceOutcome {
    Completed {
        source_id: String,
        film_count: usize,
        new: usize,
        removed: usize,
        updated: usize,
        sent: usize,
        failed: usize,
    },
    Failed {
        source_id: String,
        stage: &'static str,
        message: String,
    },
}

impl SourceOutcome {
    pub fn source_id(&self) -> &str {
        match self {
            SourceOutcome::Completed { source_id, .. } => source_id,
            SourceOutcome::Failed { source_id, .. } => source_id,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceOutcome::Failed { .. })
    }
}

/// Report over all sources of one monitoring invocation.
#[derive(Debug, Default)]
pub struct MonitorReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl MonitorReport {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

/// Run one monitoring cycle across all registered sources.
///
/// Pass no dispatcher to compute and persist diffs without notifying.
pub async fn run_monitor(
    registry: &SourceRegistry,
    snapshots: &dyn SnapshotStore,
    subscribers: &dyn SubscriberStore,
    dispatcher: Option<&NotificationDispatcher>,
    delay: Duration,
) -> MonitorReport {
    let mut report = MonitorReport::default();

    for (i, source) in registry.list().iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = match registry.scraper(&source.id) {
            Ok(scraper) => {
                run_source_cycle(source, scraper.as_ref(), snapshots, subscribers, dispatcher).await
            }
            Err(e) => SourceOutcome::Failed {
                source_id: source.id.clone(),
                stage: "scrape",
                message: e.to_string(),
            },
        };

        if let SourceOutcome::Failed {
            source_id,
            stage,
            message,
        } = &outcome
        {
            log::error!("Source {source_id} failed during {stage}: {message}");
        }
        report.outcomes.push(outcome);
    }

    report
}

/// Run the cycle for a single source.
pub async fn run_source_cycle(
    source: &SourceConfig,
    scraper: &dyn ProgramScraper,
    snapshots: &dyn SnapshotStore,
    subscribers: &dyn SubscriberStore,
    dispatcher: Option<&NotificationDispatcher>,
) -> SourceOutcome {
    // Scraping. On failure no snapshot is saved, so the next run retries
    // against the same baseline.
    let films = match scraper.scrape().await {
        Ok(films) => films,
        Err(e) => {
            return SourceOutcome::Failed {
                source_id: source.id.clone(),
                stage: "scrape",
                message: e.to_string(),
            };
        }
    };
    log::info!("Fetched {} film(s) from {}", films.len(), source.id);

    // Diffing. The load path reports unreadable state as absent, which makes
    // a first run out of it: everything is reported new.
    let previous = match snapshots.load(&source.id).await {
        Ok(previous) => previous,
        Err(e) => {
            log::warn!("Snapshot load for {} failed: {e}. Treating as absent.", source.id);
            None
        }
    };
    if previous.is_none() {
        log::info!("No previous snapshot for {} (first run)", source.id);
    }
    let diff = diff_program(previous.as_ref(), &films);

    // Notifying. A total dispatch failure never blocks persisting; the
    // source of truth still advances even if no one was told.
    let (mut sent, mut failed) = (0, 0);
    if diff.has_changes() {
        log::info!(
            "Diff for {}: {} new, {} updated, {} removed",
            source.id,
            diff.new_films.len(),
            diff.updated_films.len(),
            diff.removed_films.len()
        );
        if let Some(dispatcher) = dispatcher {
            match dispatcher.dispatch(source, &diff, subscribers).await {
                Ok(stats) => {
                    sent = stats.sent;
                    failed = stats.failed;
                }
                Err(e) => {
                    log::error!("Notification dispatch for {} failed entirely: {e}", source.id);
                }
            }
        }
    } else {
        log::info!("No changes detected for {}", source.id);
    }

    // Persisting. On failure the next cycle recomputes the same diff
    // relative to the stale snapshot: at-least-once notification.
    match snapshots.save(&source.id, &films).await {
        Ok(summary) => SourceOutcome::Completed {
            source_id: source.id.clone(),
            film_count: summary.film_count,
            new: diff.new_films.len(),
            removed: diff.removed_films.len(),
            updated: diff.updated_films.len(),
            sent,
            failed,
        },
        Err(e) => SourceOutcome::Failed {
            source_id: source.id.clone(),
            stage: "persist",
            message: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::locale::Lang;
    use crate::models::{Film, ScraperKind};
    use crate::storage::{JsonSnapshotStore, JsonSubscriberStore};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StubScraper {
        source_id: &'static str,
        films: Result<Vec<Film>>,
    }

    impl StubScraper {
        fn ok(source_id: &'static str, titles: &[&str]) -> Self {
            let films = titles
                .iter()
                .map(|t| Film {
                    title: t.to_string(),
                    genres: vec![],
                    fsk_rating: None,
                    duration: None,
                    description: None,
                    poster_url: None,
                    film_id: None,
                    showtimes: vec![],
                })
                .collect();
            Self {
                source_id,
                films: Ok(films),
            }
        }

        fn failing(source_id: &'static str) -> Self {
            Self {
                source_id,
                films: Err(AppError::scrape(source_id, "connection refused")),
            }
        }
    }

    #[async_trait]
    impl ProgramScraper for StubScraper {
        fn source_id(&self) -> &str {
            self.source_id
        }

        async fn scrape(&self) -> Result<Vec<Film>> {
            match &self.films {
                Ok(films) => Ok(films.clone()),
                Err(_) => Err(AppError::scrape(self.source_id, "connection refused")),
            }
        }
    }

    fn test_source() -> SourceConfig {
        SourceConfig {
            id: "meisengeige".into(),
            name: "Meisengeige".into(),
            url: "https://example.com/".into(),
            venue: "Cinecitta".into(),
            scraper: ScraperKind::Meisengeige,
        }
    }

    async fn stores(tmp: &TempDir) -> (JsonSnapshotStore, JsonSubscriberStore) {
        (
            JsonSnapshotStore::new(tmp.path()),
            JsonSubscriberStore::open(tmp.path(), Lang::Ru).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn first_cycle_reports_everything_new_and_persists() {
        let tmp = TempDir::new().unwrap();
        let (snapshots, subscribers) = stores(&tmp).await;
        let scraper = StubScraper::ok("meisengeige", &["X", "Y"]);

        let outcome =
            run_source_cycle(&test_source(), &scraper, &snapshots, &subscribers, None).await;

        match outcome {
            SourceOutcome::Completed {
                film_count, new, removed, updated, ..
            } => {
                assert_eq!(film_count, 2);
                assert_eq!(new, 2);
                assert_eq!(removed, 0);
                assert_eq!(updated, 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let saved = snapshots.load("meisengeige").await.unwrap().unwrap();
        assert_eq!(saved.films.len(), 2);
    }

    #[tokio::test]
    async fn unchanged_second_cycle_is_quiet() {
        let tmp = TempDir::new().unwrap();
        let (snapshots, subscribers) = stores(&tmp).await;
        let scraper = StubScraper::ok("meisengeige", &["X"]);

        run_source_cycle(&test_source(), &scraper, &snapshots, &subscribers, None).await;
        let outcome =
            run_source_cycle(&test_source(), &scraper, &snapshots, &subscribers, None).await;

        match outcome {
            SourceOutcome::Completed { new, removed, updated, .. } => {
                assert_eq!((new, removed, updated), (0, 0, 0));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn scrape_failure_leaves_baseline_untouched() {
        let tmp = TempDir::new().unwrap();
        let (snapshots, subscribers) = stores(&tmp).await;

        let good = StubScraper::ok("meisengeige", &["X"]);
        run_source_cycle(&test_source(), &good, &snapshots, &subscribers, None).await;

        let bad = StubScraper::failing("meisengeige");
        let outcome =
            run_source_cycle(&test_source(), &bad, &snapshots, &subscribers, None).await;

        match outcome {
            SourceOutcome::Failed { stage, .. } => assert_eq!(stage, "scrape"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        // The previous snapshot is still the baseline for the next run.
        let saved = snapshots.load("meisengeige").await.unwrap().unwrap();
        assert_eq!(saved.films[0].title, "X");
    }

    #[tokio::test]
    async fn removal_shows_up_after_film_disappears() {
        let tmp = TempDir::new().unwrap();
        let (snapshots, subscribers) = stores(&tmp).await;

        let before = StubScraper::ok("meisengeige", &["X", "Z"]);
        run_source_cycle(&test_source(), &before, &snapshots, &subscribers, None).await;

        let after = StubScraper::ok("meisengeige", &["X"]);
        let outcome =
            run_source_cycle(&test_source(), &after, &snapshots, &subscribers, None).await;

        match outcome {
            SourceOutcome::Completed { new, removed, .. } => {
                assert_eq!(new, 0);
                assert_eq!(removed, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
